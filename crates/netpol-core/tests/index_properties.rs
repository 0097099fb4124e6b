//! Property tests for the label-inheritance index: after an arbitrary
//! sequence of operations, the set of outstanding match-started events must
//! equal the match relation recomputed from scratch, and per-pair events
//! must strictly alternate.

use std::collections::{HashMap, HashSet};

use netpol_core::index::{InheritanceIndex, MatchSink};
use netpol_core::selector::Selector;
use proptest::prelude::*;

/// Tracks outstanding matches, asserting strict alternation as it goes.
#[derive(Debug, Default)]
struct LiveSet {
    live: HashSet<(String, String)>,
}

impl MatchSink<String, String> for LiveSet {
    fn on_match_started(&mut self, selector_id: &String, endpoint_id: &String) {
        assert!(
            self.live.insert((selector_id.clone(), endpoint_id.clone())),
            "duplicate match-started for ({selector_id}, {endpoint_id})"
        );
    }

    fn on_match_stopped(&mut self, selector_id: &String, endpoint_id: &String) {
        assert!(
            self.live.remove(&(selector_id.clone(), endpoint_id.clone())),
            "match-stopped without start for ({selector_id}, {endpoint_id})"
        );
    }
}

/// Mirror of the index inputs, used to recompute the expected relation.
#[derive(Debug, Default)]
struct Model {
    endpoint_labels: HashMap<String, HashMap<String, String>>,
    endpoint_parents: HashMap<String, Vec<String>>,
    parent_labels: HashMap<String, HashMap<String, String>>,
    selectors: HashMap<String, String>,
}

impl Model {
    fn effective_labels(&self, endpoint: &str) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        if let Some(parents) = self.endpoint_parents.get(endpoint) {
            for parent in parents {
                if let Some(contributed) = self.parent_labels.get(parent) {
                    labels.extend(contributed.clone());
                }
            }
        }
        if let Some(own) = self.endpoint_labels.get(endpoint) {
            labels.extend(own.clone());
        }
        labels
    }

    fn expected_matches(&self) -> HashSet<(String, String)> {
        let mut expected = HashSet::new();
        for (selector_id, text) in &self.selectors {
            let selector = Selector::parse(text).expect("pool selector parses");
            for endpoint in self.endpoint_labels.keys() {
                if selector.evaluate(&self.effective_labels(endpoint)) {
                    expected.insert((selector_id.clone(), endpoint.clone()));
                }
            }
        }
        expected
    }
}

#[derive(Debug, Clone)]
enum Op {
    UpdateLabels {
        endpoint: String,
        labels: Vec<(String, String)>,
        parents: Vec<String>,
    },
    DeleteLabels {
        endpoint: String,
    },
    UpdateParentLabels {
        parent: String,
        labels: Vec<(String, String)>,
    },
    DeleteParentLabels {
        parent: String,
    },
    UpdateSelector {
        id: String,
        text: String,
    },
    DeleteSelector {
        id: String,
    },
}

const SELECTOR_POOL: &[&str] = &[
    "all()",
    "has(role)",
    r#"role == "db""#,
    r#"env != "prod""#,
    r#"role in {"db", "web"}"#,
    r#"zone not in {"a"}"#,
    r#"has(role) && env == "prod""#,
    r#"role == "db" || zone == "a""#,
    "!has(env)",
];

fn arb_endpoint() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["e0", "e1", "e2", "e3"]).prop_map(str::to_string)
}

fn arb_parent() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["p0", "p1", "p2"]).prop_map(str::to_string)
}

fn arb_selector_id() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["s0", "s1", "s2"]).prop_map(str::to_string)
}

fn arb_labels() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["role", "env", "zone"]).prop_map(str::to_string),
            prop::sample::select(vec!["db", "web", "prod", "a"]).prop_map(str::to_string),
        ),
        0..3,
    )
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_endpoint(), arb_labels(), prop::collection::vec(arb_parent(), 0..3)).prop_map(
            |(endpoint, labels, parents)| Op::UpdateLabels {
                endpoint,
                labels,
                parents,
            }
        ),
        arb_endpoint().prop_map(|endpoint| Op::DeleteLabels { endpoint }),
        (arb_parent(), arb_labels())
            .prop_map(|(parent, labels)| Op::UpdateParentLabels { parent, labels }),
        arb_parent().prop_map(|parent| Op::DeleteParentLabels { parent }),
        (
            arb_selector_id(),
            prop::sample::select(SELECTOR_POOL.to_vec()).prop_map(str::to_string)
        )
            .prop_map(|(id, text)| Op::UpdateSelector { id, text }),
        arb_selector_id().prop_map(|id| Op::DeleteSelector { id }),
    ]
}

fn label_map(pairs: &[(String, String)]) -> HashMap<String, String> {
    pairs.iter().cloned().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// After any operation sequence, outstanding started-events equal the
    /// relation recomputed from scratch.
    #[test]
    fn outstanding_matches_equal_recomputed_relation(
        ops in prop::collection::vec(arb_op(), 1..40),
    ) {
        let mut index = InheritanceIndex::new();
        let mut sink = LiveSet::default();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::UpdateLabels { endpoint, labels, parents } => {
                    model.endpoint_labels.insert(endpoint.clone(), label_map(&labels));
                    model.endpoint_parents.insert(endpoint.clone(), parents.clone());
                    index.update_labels(endpoint, label_map(&labels), parents, &mut sink);
                },
                Op::DeleteLabels { endpoint } => {
                    model.endpoint_labels.remove(&endpoint);
                    model.endpoint_parents.remove(&endpoint);
                    index.delete_labels(&endpoint, &mut sink);
                },
                Op::UpdateParentLabels { parent, labels } => {
                    model.parent_labels.insert(parent.clone(), label_map(&labels));
                    index.update_parent_labels(&parent, label_map(&labels), &mut sink);
                },
                Op::DeleteParentLabels { parent } => {
                    model.parent_labels.remove(&parent);
                    index.delete_parent_labels(&parent, &mut sink);
                },
                Op::UpdateSelector { id, text } => {
                    model.selectors.insert(id.clone(), text.clone());
                    let selector = Selector::parse(&text).expect("pool selector parses");
                    index.update_selector(id, selector, &mut sink);
                },
                Op::DeleteSelector { id } => {
                    model.selectors.remove(&id);
                    index.delete_selector(&id, &mut sink);
                },
            }

            // The invariant holds at every quiescent point, not just at the
            // end of the sequence.
            prop_assert_eq!(&sink.live, &model.expected_matches());
        }

        for (selector_id, endpoint_id) in &sink.live {
            prop_assert!(index.is_match(selector_id, endpoint_id));
        }
    }
}
