//! Typed update-stream records.
//!
//! The datastore watcher (out of scope here) turns raw watch events into
//! [`Update`] records: a [`Key`] plus either the entity's new payload or
//! `None` for a tombstone. The payload union is closed, mirroring the key
//! union; a record whose payload kind does not match its key kind is a
//! watcher bug and is ignored with a warning rather than trusted.

use std::collections::HashMap;

use super::key::Key;
use super::policy::{EndpointData, Policy, ProfileRules};

/// The payload carried by an [`Update`], one variant per key kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Payload for [`Key::Policy`].
    Policy(Policy),
    /// Payload for [`Key::ProfileRules`].
    ProfileRules(ProfileRules),
    /// Payload for [`Key::ProfileLabels`].
    ProfileLabels(HashMap<String, String>),
    /// Payload for [`Key::Endpoint`].
    Endpoint(EndpointData),
}

/// One record of the update stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// The entity the record concerns.
    pub key: Key,
    /// The entity's latest payload, or `None` when it was deleted.
    pub value: Option<Payload>,
}

impl Update {
    /// A record setting `key` to `payload`.
    #[must_use]
    pub const fn set(key: Key, payload: Payload) -> Self {
        Self {
            key,
            value: Some(payload),
        }
    }

    /// A tombstone record deleting `key`.
    #[must_use]
    pub const fn delete(key: Key) -> Self {
        Self { key, value: None }
    }
}
