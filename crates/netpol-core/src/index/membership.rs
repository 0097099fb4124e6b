//! Endpoint-to-profile reference tracking.
//!
//! Each endpoint lists the profiles it references, in priority order. The
//! multiset tracks those lists and a global reference count per profile ID,
//! so a caller can tell both *which* profiles an update added or removed for
//! one endpoint and *whether* any endpoint still references a given profile.

use std::collections::{HashMap, HashSet};

use crate::model::EndpointKey;

/// Tracks which profile IDs each endpoint references.
///
/// Repeated IDs within one endpoint's list count once; the reference counts
/// are per referencing endpoint, not per list entry.
#[derive(Debug, Default)]
pub struct ProfileMembership {
    endpoint_ids: HashMap<EndpointKey, Vec<String>>,
    reference_counts: HashMap<String, usize>,
}

impl ProfileMembership {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the profile list for `endpoint`, returning the IDs that
    /// dropped out and the IDs that are new, as sets.
    ///
    /// Deleting an endpoint is `update(key, &[])`.
    pub fn update(
        &mut self,
        endpoint: &EndpointKey,
        ids: &[String],
    ) -> (HashSet<String>, HashSet<String>) {
        let old: HashSet<String> = self
            .endpoint_ids
            .get(endpoint)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        let new: HashSet<String> = ids.iter().cloned().collect();

        let removed: HashSet<String> = old.difference(&new).cloned().collect();
        let added: HashSet<String> = new.difference(&old).cloned().collect();

        for id in &added {
            *self.reference_counts.entry(id.clone()).or_insert(0) += 1;
        }
        for id in &removed {
            if let Some(count) = self.reference_counts.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    self.reference_counts.remove(id);
                }
            }
        }

        if ids.is_empty() {
            self.endpoint_ids.remove(endpoint);
        } else {
            self.endpoint_ids.insert(endpoint.clone(), ids.to_vec());
        }

        (removed, added)
    }

    /// The number of endpoints currently referencing `id`.
    #[must_use]
    pub fn reference_count(&self, id: &str) -> usize {
        self.reference_counts.get(id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str) -> EndpointKey {
        EndpointKey::Host {
            host: "node1".to_string(),
            name: name.to_string(),
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|&n| n.to_string()).collect()
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|&n| n.to_string()).collect()
    }

    #[test]
    fn first_update_adds_everything() {
        let mut map = ProfileMembership::new();
        let (removed, added) = map.update(&endpoint("eth0"), &ids(&["a", "b"]));
        assert!(removed.is_empty());
        assert_eq!(added, set(&["a", "b"]));
        assert_eq!(map.reference_count("a"), 1);
        assert_eq!(map.reference_count("b"), 1);
    }

    #[test]
    fn update_returns_symmetric_difference() {
        let mut map = ProfileMembership::new();
        map.update(&endpoint("eth0"), &ids(&["a", "b"]));
        let (removed, added) = map.update(&endpoint("eth0"), &ids(&["b", "c"]));
        assert_eq!(removed, set(&["a"]));
        assert_eq!(added, set(&["c"]));
        assert_eq!(map.reference_count("a"), 0);
        assert_eq!(map.reference_count("b"), 1);
        assert_eq!(map.reference_count("c"), 1);
    }

    #[test]
    fn repeated_ids_count_once() {
        let mut map = ProfileMembership::new();
        let (_, added) = map.update(&endpoint("eth0"), &ids(&["a", "a", "a"]));
        assert_eq!(added, set(&["a"]));
        assert_eq!(map.reference_count("a"), 1);

        let (removed, _) = map.update(&endpoint("eth0"), &ids(&[]));
        assert_eq!(removed, set(&["a"]));
        assert_eq!(map.reference_count("a"), 0);
    }

    #[test]
    fn counts_aggregate_across_endpoints() {
        let mut map = ProfileMembership::new();
        map.update(&endpoint("eth0"), &ids(&["shared"]));
        map.update(&endpoint("eth1"), &ids(&["shared"]));
        assert_eq!(map.reference_count("shared"), 2);

        let (removed, _) = map.update(&endpoint("eth0"), &ids(&[]));
        assert_eq!(removed, set(&["shared"]));
        assert_eq!(map.reference_count("shared"), 1);
    }

    #[test]
    fn unchanged_list_is_a_no_op() {
        let mut map = ProfileMembership::new();
        map.update(&endpoint("eth0"), &ids(&["a"]));
        let (removed, added) = map.update(&endpoint("eth0"), &ids(&["a"]));
        assert!(removed.is_empty());
        assert!(added.is_empty());
        assert_eq!(map.reference_count("a"), 1);
    }
}
