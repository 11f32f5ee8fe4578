//! Cross-process cache invalidation.
//!
//! After a successful persist the registry publishes an
//! [`InvalidationEvent`]. Peers sharing the same store receive it through
//! whatever transport backs the [`InvalidationChannel`] and reload the named
//! definition before their next read. Delivery is eventual and the transport
//! owns retries, so publishing cannot fail from the registry's side.

pub mod broadcaster;
pub mod listener;

use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

pub use broadcaster::LocalBroadcaster;
pub use listener::InvalidationListener;

/// Record type an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    InvertedIndex,
    InvertedIndexDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationKind {
    /// The record was written; reload it.
    Update,
    /// The record is gone; evict it.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub category: CacheCategory,
    pub kind: InvalidationKind,
    /// Definition name as persisted; receivers look it up case-insensitively.
    pub name: String,
    /// Instance id of the registry that published the event.
    pub origin: String,
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} '{}' from {}",
            self.kind, self.category, self.name, self.origin
        )
    }
}

pub trait InvalidationChannel: Send + Sync + Debug {
    fn publish(&self, event: InvalidationEvent);
}

/// Channel for a registry that has no peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChannel;

impl InvalidationChannel for NoopChannel {
    fn publish(&self, event: InvalidationEvent) {
        log::trace!("Dropping invalidation event {event}, no peers");
    }
}
