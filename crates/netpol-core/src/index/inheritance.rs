//! Label-inheritance index: joins selectors against endpoint labels.
//!
//! The index maintains the relation
//!
//! ```text
//! { (selector_id, endpoint_id) : selector matches the endpoint's effective labels }
//! ```
//!
//! under streaming updates of endpoints, parent (profile) labels and
//! registered selectors, and reports every transition of a pair into or out
//! of the relation through a [`MatchSink`].
//!
//! An endpoint's *effective* labels start from the label maps of its parent
//! profiles, applied in list order so later parents override earlier ones,
//! with the endpoint's own labels overlaid last. A parent that contributes
//! no labels (not yet seen, or deleted) simply contributes nothing; the
//! reference itself is still tracked so a later parent-label update fans out
//! to the right endpoints.
//!
//! Identifier types are opaque: the index only needs to hash, compare and
//! clone them. The calculator uses policy keys for `S` and endpoint keys for
//! `E`; tests use plain strings.
//!
//! # Delta contract
//!
//! For each pair, emitted events strictly alternate `started`, `stopped`,
//! `started`, … beginning with `started`; a pair whose state did not change
//! produces nothing. All events caused by one public operation are delivered
//! before that operation returns.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::selector::Selector;

/// Receiver for match-set transitions.
///
/// The calculator implements this on its activation state; the index calls
/// it synchronously from inside each mutating operation.
pub trait MatchSink<S, E> {
    /// A pair newly entered the match relation.
    fn on_match_started(&mut self, selector_id: &S, endpoint_id: &E);

    /// A pair newly left the match relation.
    fn on_match_stopped(&mut self, selector_id: &S, endpoint_id: &E);
}

/// The label-inheritance index. See the module docs for the contract.
#[derive(Debug)]
pub struct InheritanceIndex<S, E> {
    /// Endpoints' own labels.
    endpoint_labels: HashMap<E, HashMap<String, String>>,
    /// Endpoints' parent references, in priority order.
    endpoint_parents: HashMap<E, Vec<String>>,
    /// Labels contributed by each parent profile.
    parent_labels: HashMap<String, HashMap<String, String>>,
    /// Reverse index: parent profile to referencing endpoints.
    parent_endpoints: HashMap<String, HashSet<E>>,
    /// Registered selectors.
    selectors: HashMap<S, Selector>,
    /// Current match relation.
    matches: HashMap<S, HashSet<E>>,
}

impl<S, E> Default for InheritanceIndex<S, E> {
    fn default() -> Self {
        Self {
            endpoint_labels: HashMap::new(),
            endpoint_parents: HashMap::new(),
            parent_labels: HashMap::new(),
            parent_endpoints: HashMap::new(),
            selectors: HashMap::new(),
            matches: HashMap::new(),
        }
    }
}

impl<S, E> InheritanceIndex<S, E>
where
    S: Clone + Eq + Hash + Debug,
    E: Clone + Eq + Hash + Debug,
{
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an endpoint's own labels and parent list.
    pub fn update_labels(
        &mut self,
        endpoint: E,
        labels: HashMap<String, String>,
        parent_ids: Vec<String>,
        sink: &mut impl MatchSink<S, E>,
    ) {
        self.reindex_parents(&endpoint, &parent_ids);
        self.endpoint_labels.insert(endpoint.clone(), labels);
        self.endpoint_parents.insert(endpoint.clone(), parent_ids);
        self.scan_endpoint(&endpoint, sink);
    }

    /// Removes an endpoint, stopping any matches it participated in.
    pub fn delete_labels(&mut self, endpoint: &E, sink: &mut impl MatchSink<S, E>) {
        self.reindex_parents(endpoint, &[]);
        self.endpoint_labels.remove(endpoint);
        self.endpoint_parents.remove(endpoint);
        for (selector_id, endpoints) in &mut self.matches {
            if endpoints.remove(endpoint) {
                tracing::debug!(selector = ?selector_id, endpoint = ?endpoint, "match stopped");
                sink.on_match_stopped(selector_id, endpoint);
            }
        }
    }

    /// Sets the labels contributed by a parent profile and rescans every
    /// endpoint referencing it.
    pub fn update_parent_labels(
        &mut self,
        parent_id: &str,
        labels: HashMap<String, String>,
        sink: &mut impl MatchSink<S, E>,
    ) {
        self.parent_labels.insert(parent_id.to_string(), labels);
        self.rescan_parent(parent_id, sink);
    }

    /// Removes a parent profile's labels. Endpoints referencing it keep the
    /// reference and fall back to their remaining label sources.
    pub fn delete_parent_labels(&mut self, parent_id: &str, sink: &mut impl MatchSink<S, E>) {
        if self.parent_labels.remove(parent_id).is_some() {
            self.rescan_parent(parent_id, sink);
        }
    }

    /// Registers or replaces a tracked selector and rescans every known
    /// endpoint against it.
    pub fn update_selector(
        &mut self,
        selector_id: S,
        selector: Selector,
        sink: &mut impl MatchSink<S, E>,
    ) {
        self.selectors.insert(selector_id.clone(), selector);
        self.matches.entry(selector_id.clone()).or_default();
        let endpoints: Vec<E> = self.endpoint_labels.keys().cloned().collect();
        for endpoint in endpoints {
            let effective = self.effective_labels(&endpoint);
            self.evaluate_pair(&selector_id, &endpoint, &effective, sink);
        }
    }

    /// Unregisters a selector, stopping all of its live matches.
    pub fn delete_selector(&mut self, selector_id: &S, sink: &mut impl MatchSink<S, E>) {
        self.selectors.remove(selector_id);
        if let Some(endpoints) = self.matches.remove(selector_id) {
            for endpoint in &endpoints {
                tracing::debug!(selector = ?selector_id, endpoint = ?endpoint, "match stopped");
                sink.on_match_stopped(selector_id, endpoint);
            }
        }
    }

    /// Whether the pair is currently in the match relation.
    #[must_use]
    pub fn is_match(&self, selector_id: &S, endpoint_id: &E) -> bool {
        self.matches
            .get(selector_id)
            .is_some_and(|endpoints| endpoints.contains(endpoint_id))
    }

    /// The endpoint's effective labels: parents first in list order, own
    /// labels overlaid last.
    fn effective_labels(&self, endpoint: &E) -> HashMap<String, String> {
        let mut effective = HashMap::new();
        if let Some(parent_ids) = self.endpoint_parents.get(endpoint) {
            for parent_id in parent_ids {
                if let Some(labels) = self.parent_labels.get(parent_id) {
                    for (key, value) in labels {
                        effective.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        if let Some(own) = self.endpoint_labels.get(endpoint) {
            for (key, value) in own {
                effective.insert(key.clone(), value.clone());
            }
        }
        effective
    }

    /// Updates the parent reverse index to reflect an endpoint's new parent
    /// list.
    fn reindex_parents(&mut self, endpoint: &E, new_parent_ids: &[String]) {
        if let Some(old_parent_ids) = self.endpoint_parents.get(endpoint) {
            for parent_id in old_parent_ids {
                if let Some(endpoints) = self.parent_endpoints.get_mut(parent_id) {
                    endpoints.remove(endpoint);
                    if endpoints.is_empty() {
                        self.parent_endpoints.remove(parent_id);
                    }
                }
            }
        }
        for parent_id in new_parent_ids {
            self.parent_endpoints
                .entry(parent_id.clone())
                .or_default()
                .insert(endpoint.clone());
        }
    }

    /// Re-evaluates every selector against one endpoint.
    fn scan_endpoint(&mut self, endpoint: &E, sink: &mut impl MatchSink<S, E>) {
        let effective = self.effective_labels(endpoint);
        let selector_ids: Vec<S> = self.selectors.keys().cloned().collect();
        for selector_id in selector_ids {
            self.evaluate_pair(&selector_id, endpoint, &effective, sink);
        }
    }

    /// Re-evaluates every endpoint referencing one parent profile.
    fn rescan_parent(&mut self, parent_id: &str, sink: &mut impl MatchSink<S, E>) {
        let Some(endpoints) = self.parent_endpoints.get(parent_id) else {
            return;
        };
        let endpoints: Vec<E> = endpoints.iter().cloned().collect();
        for endpoint in endpoints {
            self.scan_endpoint(&endpoint, sink);
        }
    }

    /// Recomputes one pair and emits the delta, if any.
    fn evaluate_pair(
        &mut self,
        selector_id: &S,
        endpoint: &E,
        effective: &HashMap<String, String>,
        sink: &mut impl MatchSink<S, E>,
    ) {
        let Some(selector) = self.selectors.get(selector_id) else {
            return;
        };
        let now_matches = selector.evaluate(effective);
        let endpoints = self.matches.entry(selector_id.clone()).or_default();
        let was_matching = endpoints.contains(endpoint);
        if now_matches && !was_matching {
            endpoints.insert(endpoint.clone());
            tracing::debug!(selector = ?selector_id, endpoint = ?endpoint, "match started");
            sink.on_match_started(selector_id, endpoint);
        } else if !now_matches && was_matching {
            endpoints.remove(endpoint);
            tracing::debug!(selector = ?selector_id, endpoint = ?endpoint, "match stopped");
            sink.on_match_stopped(selector_id, endpoint);
        }
    }
}
