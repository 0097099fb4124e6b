//! Payload types carried by the update stream.
//!
//! The core treats rules as opaque: it decides *which* rule sets are active,
//! never what a rule means. [`Rule`] is therefore a transparent wrapper over
//! an arbitrary JSON value. Serialisation of every payload is stable JSON
//! with absent optional fields omitted, so the bytes sent downstream for a
//! given value never vary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An opaque rule payload.
///
/// The calculator stores, copies and re-serialises rules; it never inspects
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(pub serde_json::Value);

impl Rule {
    /// Wraps a JSON value as a rule.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A policy: an ordering hint, a selector, and two opaque rule lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Ordering hint for the data plane; lower sorts first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f32>,

    /// Selector source text. Pre-validated upstream; the calculator parses
    /// it and treats a failure as fatal.
    pub selector: String,

    /// Rules applied to traffic entering matching endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound_rules: Vec<Rule>,

    /// Rules applied to traffic leaving matching endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbound_rules: Vec<Rule>,
}

/// The rule sets associated with a profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileRules {
    /// Rules applied to traffic entering referencing endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound_rules: Vec<Rule>,

    /// Rules applied to traffic leaving referencing endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbound_rules: Vec<Rule>,
}

/// The label and profile-reference state of an endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndpointData {
    /// The endpoint's own labels. These win over inherited labels.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Profiles whose labels the endpoint inherits, in priority order:
    /// later entries override earlier ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile_ids: Vec<String>,
}
