//! Active-rules calculation.
//!
//! The [`ActiveRulesCalculator`] consumes the typed update stream and
//! decides, incrementally, which policies and profiles are *active* on this
//! host:
//!
//! - a **policy** is active while its selector matches at least one local
//!   endpoint;
//! - a **profile** is active while at least one local endpoint references it.
//!
//! It owns the authoritative caches of policy and profile-rule payloads, an
//! endpoint-to-profile reference map, and a label-inheritance index joining
//! policy selectors against endpoint labels. Activation transitions and
//! payload changes are pushed to two optional sinks:
//!
//! 1. a [`RuleListener`], which receives the rule lists for active entities
//!    and empty lists on deactivation;
//! 2. an [`AgentSink`], which receives the serialised entity keyed by its
//!    wire path, or a `None` value on deactivation or deletion.
//!
//! Emitted rule lists are snapshots: the calculator clones them out of its
//! caches at emission time and never mutates what it has handed over.
//!
//! All processing is synchronous and single-threaded; every callback fired
//! by an update completes before [`ActiveRulesCalculator::on_update`]
//! returns. A wrapper that serialises calls behind a lock must release it
//! before invoking external sinks.

mod dispatcher;

use std::collections::{HashMap, HashSet};

use crate::index::{InheritanceIndex, MatchSink, ProfileMembership};
use crate::model::{EndpointKey, Key, Payload, Policy, PolicyKey, ProfileRules, Rule, Update};
use crate::selector::Selector;

pub use dispatcher::{Dispatcher, UpdateHandler};

/// Identifies the rule set a [`RuleListener`] update refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleSetId {
    /// A policy's rule set.
    Policy(PolicyKey),
    /// A profile's rule set.
    Profile(String),
}

/// Receives rule updates for entities whose activation state or payload
/// changed.
///
/// For an active entity with a known payload the actual rule lists are
/// passed; for an inactive or unknown one, both lists are empty.
pub trait RuleListener {
    /// The rule set for `id` changed.
    fn update_rules(&mut self, id: &RuleSetId, inbound: Vec<Rule>, outbound: Vec<Rule>);
}

/// Observes individual policy/endpoint match transitions.
pub trait PolicyMatchListener {
    /// `policy` started matching `endpoint`.
    fn on_policy_match_started(&mut self, policy: &PolicyKey, endpoint: &EndpointKey);

    /// `policy` stopped matching `endpoint`.
    fn on_policy_match_stopped(&mut self, policy: &PolicyKey, endpoint: &EndpointKey);
}

/// A serialised update for the downstream data-plane agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUpdate {
    /// Wire path of the entity.
    pub key: String,
    /// Stable JSON form of the entity, or `None` for delete/deactivate.
    pub value: Option<String>,
}

/// Accepts serialised updates bound for the data-plane agent.
///
/// Implementations own their queueing; updates for one key must be delivered
/// in issue order.
pub trait AgentSink {
    /// Delivers one update.
    fn send_update(&mut self, update: AgentUpdate);
}

/// The active-rules calculator. See the module docs.
#[derive(Default)]
pub struct ActiveRulesCalculator {
    index: InheritanceIndex<PolicyKey, EndpointKey>,
    state: ActivationState,
}

/// Everything except the label index: caches, activation sets and sinks.
///
/// Split out so the index can call back into it (as the [`MatchSink`])
/// while the calculator holds both.
#[derive(Default)]
struct ActivationState {
    /// Latest payload of every policy seen and not deleted.
    all_policies: HashMap<PolicyKey, Policy>,
    /// Latest rule sets of every profile seen and not deleted.
    all_profile_rules: HashMap<String, ProfileRules>,
    /// Endpoints currently matched by each active policy.
    policy_endpoints: HashMap<PolicyKey, HashSet<EndpointKey>>,
    /// Endpoints currently referencing each active profile.
    profile_endpoints: HashMap<String, HashSet<EndpointKey>>,
    /// Endpoint-to-profile reference map.
    membership: ProfileMembership,
    rule_listener: Option<Box<dyn RuleListener>>,
    match_listener: Option<Box<dyn PolicyMatchListener>>,
    agent_sink: Option<Box<dyn AgentSink>>,
}

impl ActiveRulesCalculator {
    /// Creates a calculator with no listeners attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the rule listener.
    #[must_use]
    pub fn with_rule_listener(mut self, listener: Box<dyn RuleListener>) -> Self {
        self.state.rule_listener = Some(listener);
        self
    }

    /// Attaches the match listener.
    #[must_use]
    pub fn with_match_listener(mut self, listener: Box<dyn PolicyMatchListener>) -> Self {
        self.state.match_listener = Some(listener);
        self
    }

    /// Attaches the downstream-agent sink.
    #[must_use]
    pub fn with_agent_sink(mut self, sink: Box<dyn AgentSink>) -> Self {
        self.state.agent_sink = Some(sink);
        self
    }

    /// Whether `key` currently matches at least one local endpoint.
    #[must_use]
    pub fn is_policy_active(&self, key: &PolicyKey) -> bool {
        self.state.policy_endpoints.contains_key(key)
    }

    /// Whether at least one local endpoint currently references `name`.
    #[must_use]
    pub fn is_profile_active(&self, name: &str) -> bool {
        self.state.profile_endpoints.contains_key(name)
    }

    /// Applies one update-stream record.
    ///
    /// All listener and sink callbacks caused by the record complete before
    /// this returns.
    ///
    /// # Panics
    ///
    /// On programmer error only: a policy selector that fails to parse
    /// (updates are pre-validated upstream) or a cached payload that fails
    /// to serialise. The event stream is the source of truth; a calculator
    /// that cannot trust it must not keep running.
    pub fn on_update(&mut self, update: &Update) {
        match (&update.key, update.value.as_ref()) {
            (Key::Endpoint(endpoint), Some(Payload::Endpoint(data))) => {
                self.state
                    .update_endpoint_profiles(endpoint, &data.profile_ids);
                self.index.update_labels(
                    endpoint.clone(),
                    data.labels.clone(),
                    data.profile_ids.clone(),
                    &mut self.state,
                );
            },
            (Key::Endpoint(endpoint), None) => {
                self.state.update_endpoint_profiles(endpoint, &[]);
                self.index.delete_labels(endpoint, &mut self.state);
            },
            (Key::ProfileLabels { name }, Some(Payload::ProfileLabels(labels))) => {
                self.index
                    .update_parent_labels(name, labels.clone(), &mut self.state);
            },
            (Key::ProfileLabels { name }, None) => {
                self.index.delete_parent_labels(name, &mut self.state);
            },
            (Key::ProfileRules { name }, Some(Payload::ProfileRules(rules))) => {
                self.state
                    .all_profile_rules
                    .insert(name.clone(), rules.clone());
                if self.state.profile_endpoints.contains_key(name) {
                    tracing::debug!(profile = %name, "profile rules changed while active");
                    self.state.send_profile_update(name);
                }
            },
            (Key::ProfileRules { name }, None) => {
                self.state.all_profile_rules.remove(name);
                if self.state.profile_endpoints.contains_key(name) {
                    tracing::debug!(profile = %name, "profile rules deleted while active");
                    self.state.send_profile_update(name);
                }
            },
            (Key::Policy(key), Some(Payload::Policy(policy))) => {
                self.state.all_policies.insert(key.clone(), policy.clone());
                let selector = Selector::parse(&policy.selector).unwrap_or_else(|err| {
                    tracing::error!(
                        policy = %key,
                        error = %err,
                        "pre-validated selector failed to parse"
                    );
                    panic!("selector {:?} on {key} failed to parse: {err}", policy.selector);
                });
                let was_active = self.state.policy_endpoints.contains_key(key);
                // The index calls back for every pair the new selector
                // gained or lost; a transition into or out of the active
                // state has already been reported when we get back here.
                self.index
                    .update_selector(key.clone(), selector, &mut self.state);
                if was_active && self.state.policy_endpoints.contains_key(key) {
                    tracing::debug!(policy = %key, "policy changed while active");
                    self.state.send_policy_update(key);
                }
            },
            (Key::Policy(key), None) => {
                self.state.all_policies.remove(key);
                // Deactivation rides on the match-stopped callbacks.
                self.index.delete_selector(key, &mut self.state);
            },
            (Key::ProfileTags { .. }, _) => {
                // Tags do not influence active rules.
            },
            (key, _) => {
                tracing::warn!(key = %key, "ignoring update whose payload does not fit its key");
            },
        }
    }
}

impl ActivationState {
    /// Applies an endpoint's new profile list, emitting activation and
    /// deactivation updates for profiles whose endpoint sets became
    /// non-empty or empty.
    fn update_endpoint_profiles(&mut self, endpoint: &EndpointKey, profile_ids: &[String]) {
        let (removed, added) = self.membership.update(endpoint, profile_ids);

        for id in added {
            let newly_active = !self.profile_endpoints.contains_key(&id);
            self.profile_endpoints
                .entry(id.clone())
                .or_default()
                .insert(endpoint.clone());
            if newly_active {
                tracing::debug!(profile = %id, "profile now active");
                self.send_profile_update(&id);
            }
        }

        for id in removed {
            if let Some(endpoints) = self.profile_endpoints.get_mut(&id) {
                endpoints.remove(endpoint);
                if endpoints.is_empty() {
                    self.profile_endpoints.remove(&id);
                    tracing::debug!(profile = %id, "profile no longer active");
                    self.send_profile_update(&id);
                }
            }
        }
    }

    /// Emits the current state of one profile to both sinks.
    fn send_profile_update(&mut self, name: &str) {
        let active = self.profile_endpoints.contains_key(name);
        let rules = self.all_profile_rules.get(name).cloned();
        let key = Key::ProfileRules {
            name: name.to_string(),
        };
        let wire_key = key.wire_path().unwrap_or_else(|err| {
            tracing::error!(profile = %name, error = %err, "cannot encode profile key");
            panic!("profile key {name:?} failed to encode: {err}");
        });
        let id = RuleSetId::Profile(name.to_string());

        match rules {
            Some(rules) if active => {
                if let Some(sink) = self.agent_sink.as_deref_mut() {
                    let value = serde_json::to_string(&rules).unwrap_or_else(|err| {
                        tracing::error!(profile = %name, error = %err, "cannot serialise rules");
                        panic!("profile rules for {name:?} failed to serialise: {err}");
                    });
                    sink.send_update(AgentUpdate {
                        key: wire_key,
                        value: Some(value),
                    });
                }
                if let Some(listener) = self.rule_listener.as_deref_mut() {
                    listener.update_rules(&id, rules.inbound_rules, rules.outbound_rules);
                }
            },
            _ => {
                if let Some(sink) = self.agent_sink.as_deref_mut() {
                    sink.send_update(AgentUpdate {
                        key: wire_key,
                        value: None,
                    });
                }
                if let Some(listener) = self.rule_listener.as_deref_mut() {
                    listener.update_rules(&id, Vec::new(), Vec::new());
                }
            },
        }
    }

    /// Emits the current state of one policy to both sinks.
    fn send_policy_update(&mut self, key: &PolicyKey) {
        let active = self.policy_endpoints.contains_key(key);
        let policy = self.all_policies.get(key).cloned();
        let wire_key = Key::Policy(key.clone()).wire_path().unwrap_or_else(|err| {
            tracing::error!(policy = %key, error = %err, "cannot encode policy key");
            panic!("policy key {key} failed to encode: {err}");
        });
        let id = RuleSetId::Policy(key.clone());

        match policy {
            Some(policy) if active => {
                if let Some(sink) = self.agent_sink.as_deref_mut() {
                    let value = serde_json::to_string(&policy).unwrap_or_else(|err| {
                        tracing::error!(policy = %key, error = %err, "cannot serialise policy");
                        panic!("policy {key} failed to serialise: {err}");
                    });
                    sink.send_update(AgentUpdate {
                        key: wire_key,
                        value: Some(value),
                    });
                }
                if let Some(listener) = self.rule_listener.as_deref_mut() {
                    listener.update_rules(&id, policy.inbound_rules, policy.outbound_rules);
                }
            },
            _ => {
                if let Some(sink) = self.agent_sink.as_deref_mut() {
                    sink.send_update(AgentUpdate {
                        key: wire_key,
                        value: None,
                    });
                }
                if let Some(listener) = self.rule_listener.as_deref_mut() {
                    listener.update_rules(&id, Vec::new(), Vec::new());
                }
            },
        }
    }
}

impl MatchSink<PolicyKey, EndpointKey> for ActivationState {
    fn on_match_started(&mut self, policy: &PolicyKey, endpoint: &EndpointKey) {
        let newly_active = !self.policy_endpoints.contains_key(policy);
        self.policy_endpoints
            .entry(policy.clone())
            .or_default()
            .insert(endpoint.clone());
        if newly_active {
            // The policy payload is always cached here: the index only
            // tracks selectors of policies we have seen.
            tracing::debug!(policy = %policy, "policy now active");
            self.send_policy_update(policy);
        }
        if let Some(listener) = self.match_listener.as_deref_mut() {
            listener.on_policy_match_started(policy, endpoint);
        }
    }

    fn on_match_stopped(&mut self, policy: &PolicyKey, endpoint: &EndpointKey) {
        if let Some(endpoints) = self.policy_endpoints.get_mut(policy) {
            endpoints.remove(endpoint);
            if endpoints.is_empty() {
                self.policy_endpoints.remove(policy);
                tracing::debug!(policy = %policy, "policy no longer active");
                self.send_policy_update(policy);
            }
        }
        if let Some(listener) = self.match_listener.as_deref_mut() {
            listener.on_policy_match_stopped(policy, endpoint);
        }
    }
}

impl UpdateHandler for ActiveRulesCalculator {
    fn on_update(&mut self, update: &Update) {
        // Inherent method; takes priority over this trait method.
        self.on_update(update);
    }
}
