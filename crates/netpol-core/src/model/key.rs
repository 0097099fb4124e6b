//! Entity keys and their wire-path codec.
//!
//! Every entity the update stream can carry is identified by one variant of
//! [`Key`]. The set of variants is closed; downstream consumers match on it
//! exhaustively. Keys encode to datastore-style paths
//! (`/v1/policy/tier/{tier}/policy/{name}`) for the downstream agent and
//! decode back with anchored regexes.
//!
//! Endpoint keys take part in routing only; the calculator never emits them
//! downstream, but they round-trip through the codec like everything else.

use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A key component that must be non-empty was empty.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    /// A required key component was empty, so no path can be formed.
    #[error("insufficient identifiers: {field} is empty")]
    InsufficientIdentifiers {
        /// Name of the empty component.
        field: &'static str,
    },
}

/// Identifies a policy within a tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    /// Tier the policy belongs to.
    pub tier: String,
    /// Policy name, unique within the tier.
    pub name: String,
}

impl PolicyKey {
    /// Creates a policy key.
    #[must_use]
    pub fn new(tier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            name: name.into(),
        }
    }

    /// Encodes this key as its wire path.
    ///
    /// # Errors
    ///
    /// [`KeyError::InsufficientIdentifiers`] when the tier or name is empty.
    pub fn wire_path(&self) -> Result<String, KeyError> {
        if self.tier.is_empty() {
            return Err(KeyError::InsufficientIdentifiers { field: "tier" });
        }
        if self.name.is_empty() {
            return Err(KeyError::InsufficientIdentifiers { field: "name" });
        }
        Ok(format!(
            "/v1/policy/tier/{}/policy/{}",
            self.tier, self.name
        ))
    }
}

impl Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Policy(tier={}, name={})", self.tier, self.name)
    }
}

/// Identifies an endpoint on the local host.
///
/// Workload endpoints belong to an orchestrated workload; host endpoints are
/// named interfaces of the host itself. Both carry labels and profile
/// references and are treated identically by the active-rules core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EndpointKey {
    /// A workload interface.
    Workload {
        /// Hostname the workload runs on.
        host: String,
        /// Orchestrator that owns the workload.
        orchestrator: String,
        /// Workload identifier within the orchestrator.
        workload: String,
        /// Endpoint name within the workload.
        endpoint: String,
    },
    /// A host interface.
    Host {
        /// Hostname.
        host: String,
        /// Interface name.
        name: String,
    },
}

impl EndpointKey {
    /// Encodes this key as its wire path. Used for routing and diagnostics
    /// only; endpoint keys are never sent downstream.
    ///
    /// # Errors
    ///
    /// [`KeyError::InsufficientIdentifiers`] when any component is empty.
    pub fn wire_path(&self) -> Result<String, KeyError> {
        match self {
            EndpointKey::Workload {
                host,
                orchestrator,
                workload,
                endpoint,
            } => {
                require(host, "host")?;
                require(orchestrator, "orchestrator")?;
                require(workload, "workload")?;
                require(endpoint, "endpoint")?;
                Ok(format!(
                    "/v1/host/{host}/workload/{orchestrator}/{workload}/endpoint/{endpoint}"
                ))
            },
            EndpointKey::Host { host, name } => {
                require(host, "host")?;
                require(name, "name")?;
                Ok(format!("/v1/host/{host}/endpoint/{name}"))
            },
        }
    }
}

impl Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKey::Workload {
                host,
                orchestrator,
                workload,
                endpoint,
            } => write!(
                f,
                "WorkloadEndpoint(host={host}, orchestrator={orchestrator}, \
                 workload={workload}, endpoint={endpoint})"
            ),
            EndpointKey::Host { host, name } => {
                write!(f, "HostEndpoint(host={host}, name={name})")
            },
        }
    }
}

fn require(value: &str, field: &'static str) -> Result<(), KeyError> {
    if value.is_empty() {
        Err(KeyError::InsufficientIdentifiers { field })
    } else {
        Ok(())
    }
}

/// The closed union of entity keys carried by the update stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A policy, keyed by tier and name.
    Policy(PolicyKey),
    /// The rule sets of a profile.
    ProfileRules {
        /// Profile name.
        name: String,
    },
    /// The labels a profile contributes to referencing endpoints.
    ProfileLabels {
        /// Profile name.
        name: String,
    },
    /// The tags of a profile. Carried by the key space but not consumed by
    /// the active-rules core.
    ProfileTags {
        /// Profile name.
        name: String,
    },
    /// A workload or host endpoint.
    Endpoint(EndpointKey),
}

static POLICY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v1/policy/tier/([^/]+)/policy/([^/]+)$").expect("policy path regex is valid")
});

static PROFILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v1/policy/profile/([^/]+)/(rules|labels|tags)$")
        .expect("profile path regex is valid")
});

static WORKLOAD_ENDPOINT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v1/host/([^/]+)/workload/([^/]+)/([^/]+)/endpoint/([^/]+)$")
        .expect("workload endpoint path regex is valid")
});

static HOST_ENDPOINT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v1/host/([^/]+)/endpoint/([^/]+)$").expect("host endpoint path regex is valid")
});

impl Key {
    /// Encodes this key as its wire path.
    ///
    /// # Errors
    ///
    /// [`KeyError::InsufficientIdentifiers`] when a required component is
    /// empty.
    pub fn wire_path(&self) -> Result<String, KeyError> {
        match self {
            Key::Policy(key) => key.wire_path(),
            Key::ProfileRules { name } => profile_path(name, "rules"),
            Key::ProfileLabels { name } => profile_path(name, "labels"),
            Key::ProfileTags { name } => profile_path(name, "tags"),
            Key::Endpoint(key) => key.wire_path(),
        }
    }

    /// Decodes a wire path back into a key. Returns `None` for paths outside
    /// the known key space.
    #[must_use]
    pub fn from_wire_path(path: &str) -> Option<Self> {
        if let Some(caps) = POLICY_PATH.captures(path) {
            return Some(Key::Policy(PolicyKey::new(&caps[1], &caps[2])));
        }
        if let Some(caps) = PROFILE_PATH.captures(path) {
            let name = caps[1].to_string();
            return Some(match &caps[2] {
                "rules" => Key::ProfileRules { name },
                "labels" => Key::ProfileLabels { name },
                _ => Key::ProfileTags { name },
            });
        }
        if let Some(caps) = WORKLOAD_ENDPOINT_PATH.captures(path) {
            return Some(Key::Endpoint(EndpointKey::Workload {
                host: caps[1].to_string(),
                orchestrator: caps[2].to_string(),
                workload: caps[3].to_string(),
                endpoint: caps[4].to_string(),
            }));
        }
        if let Some(caps) = HOST_ENDPOINT_PATH.captures(path) {
            return Some(Key::Endpoint(EndpointKey::Host {
                host: caps[1].to_string(),
                name: caps[2].to_string(),
            }));
        }
        None
    }
}

fn profile_path(name: &str, leaf: &str) -> Result<String, KeyError> {
    require(name, "name")?;
    Ok(format!("/v1/policy/profile/{name}/{leaf}"))
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Policy(key) => key.fmt(f),
            Key::ProfileRules { name } => write!(f, "ProfileRules(name={name})"),
            Key::ProfileLabels { name } => write!(f, "ProfileLabels(name={name})"),
            Key::ProfileTags { name } => write!(f, "ProfileTags(name={name})"),
            Key::Endpoint(key) => key.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_path_round_trips() {
        let key = Key::Policy(PolicyKey::new("default", "allow-db"));
        let path = key.wire_path().expect("path");
        assert_eq!(path, "/v1/policy/tier/default/policy/allow-db");
        assert_eq!(Key::from_wire_path(&path), Some(key));
    }

    #[test]
    fn profile_paths_cover_all_leaves() {
        for (key, leaf) in [
            (
                Key::ProfileRules {
                    name: "prof".to_string(),
                },
                "rules",
            ),
            (
                Key::ProfileLabels {
                    name: "prof".to_string(),
                },
                "labels",
            ),
            (
                Key::ProfileTags {
                    name: "prof".to_string(),
                },
                "tags",
            ),
        ] {
            let path = key.wire_path().expect("path");
            assert_eq!(path, format!("/v1/policy/profile/prof/{leaf}"));
            assert_eq!(Key::from_wire_path(&path), Some(key));
        }
    }

    #[test]
    fn endpoint_paths_round_trip() {
        let workload = Key::Endpoint(EndpointKey::Workload {
            host: "node1".to_string(),
            orchestrator: "cni".to_string(),
            workload: "frontend".to_string(),
            endpoint: "eth0".to_string(),
        });
        let path = workload.wire_path().expect("path");
        assert_eq!(Key::from_wire_path(&path), Some(workload));

        let host = Key::Endpoint(EndpointKey::Host {
            host: "node1".to_string(),
            name: "eth1".to_string(),
        });
        let path = host.wire_path().expect("path");
        assert_eq!(path, "/v1/host/node1/endpoint/eth1");
        assert_eq!(Key::from_wire_path(&path), Some(host));
    }

    #[test]
    fn empty_components_are_rejected() {
        let err = PolicyKey::new("", "x").wire_path().expect_err("tier");
        assert_eq!(err, KeyError::InsufficientIdentifiers { field: "tier" });

        let err = PolicyKey::new("default", "").wire_path().expect_err("name");
        assert_eq!(err, KeyError::InsufficientIdentifiers { field: "name" });

        let err = Key::ProfileRules {
            name: String::new(),
        }
        .wire_path()
        .expect_err("name");
        assert_eq!(err, KeyError::InsufficientIdentifiers { field: "name" });
    }

    #[test]
    fn unknown_paths_decode_to_none() {
        assert_eq!(Key::from_wire_path("/v1/policy/tier/t"), None);
        assert_eq!(Key::from_wire_path("/v1/policy/profile/p/other"), None);
        assert_eq!(Key::from_wire_path("/v2/policy/tier/t/policy/p"), None);
        assert_eq!(Key::from_wire_path(""), None);
    }

    #[test]
    fn display_forms_name_the_entity() {
        assert_eq!(
            PolicyKey::new("default", "allow-db").to_string(),
            "Policy(tier=default, name=allow-db)"
        );
        assert_eq!(
            EndpointKey::Host {
                host: "node1".to_string(),
                name: "eth0".to_string(),
            }
            .to_string(),
            "HostEndpoint(host=node1, name=eth0)"
        );
    }
}
