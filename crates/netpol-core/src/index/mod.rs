//! Incremental indexes over endpoints, profiles and selectors.

mod inheritance;
mod membership;

pub use inheritance::{InheritanceIndex, MatchSink};
pub use membership::ProfileMembership;
