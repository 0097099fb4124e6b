//! # netpol-core
//!
//! Incremental active-rules core for a network-policy control plane.
//!
//! Given a stream of typed updates describing policies, profiles and local
//! endpoints, this crate decides which policies and profiles are *active* on
//! the host — match at least one local endpoint — and emits precise
//! activation, deactivation and payload-change events for the data-plane
//! agent to act on.
//!
//! ## Features
//!
//! - **Selector language**: a small boolean expression DSL over endpoint
//!   labels, with a canonicalising parser, stable content identifiers and a
//!   short-circuiting evaluator
//! - **Label inheritance**: endpoints inherit labels from the profiles they
//!   reference; the index joins selectors against effective labels and
//!   emits match deltas
//! - **Active-rules calculation**: policies activate when their selector
//!   first matches an endpoint, profiles when first referenced; rule
//!   payloads are pushed to listeners as immutable snapshots
//!
//! Everything is in-memory and single-threaded; state is rebuilt from the
//! update stream on restart.
//!
//! ## Example
//!
//! ```rust
//! use netpol_core::calc::ActiveRulesCalculator;
//! use netpol_core::model::{
//!     EndpointData, EndpointKey, Key, Payload, Policy, PolicyKey, Update,
//! };
//!
//! let mut calc = ActiveRulesCalculator::new();
//!
//! calc.on_update(&Update::set(
//!     Key::Policy(PolicyKey::new("default", "isolate-db")),
//!     Payload::Policy(Policy {
//!         order: Some(10.0),
//!         selector: r#"role == "db""#.to_string(),
//!         inbound_rules: vec![],
//!         outbound_rules: vec![],
//!     }),
//! ));
//!
//! calc.on_update(&Update::set(
//!     Key::Endpoint(EndpointKey::Host {
//!         host: "node1".to_string(),
//!         name: "eth0".to_string(),
//!     }),
//!     Payload::Endpoint(EndpointData {
//!         labels: [("role".to_string(), "db".to_string())].into(),
//!         profile_ids: vec![],
//!     }),
//! ));
//!
//! assert!(calc.is_policy_active(&PolicyKey::new("default", "isolate-db")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod calc;
pub mod index;
pub mod model;
pub mod selector;

pub use calc::{ActiveRulesCalculator, Dispatcher, UpdateHandler};
pub use model::{Key, Policy, PolicyKey, ProfileRules, Update};
pub use selector::Selector;
