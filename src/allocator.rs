//! Storage location allocation for new segments.
//!
//! Every segment occupies one external storage object named
//! `KYLIN_II_` followed by ten characters from `0-9A-Z`. The allocator keeps
//! the set of identifiers this process knows to be taken and regenerates on
//! collision.
//!
//! In [`ReservationMode::Local`] that set is only as complete as the
//! definitions this process has loaded: two processes allocating before either
//! one's invalidation reaches the other can pick the same identifier, and the
//! external storage system has to reject the duplicate. With
//! [`ReservationMode::Store`] each identifier is also claimed through an
//! insert-if-absent record in the resource store, which closes that race.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::config::ReservationMode;
use crate::error::{RegistryError, Result};
use crate::model::RESOURCE_SUFFIX;
use crate::store::ResourceStore;

pub const STORAGE_LOCATION_PREFIX: &str = "KYLIN_II_";
pub const STORAGE_LOCATION_BODY_LENGTH: usize = 10;
pub const STORAGE_LOCATION_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Metadata key on an external storage object naming the registry
/// deployment that created it.
pub const STORAGE_METADATA_KEY: &str = "KYLIN_HOST";

/// Store root for reservation records in [`ReservationMode::Store`].
pub const STORAGE_RESERVATION_ROOT: &str = "/invertedindex_storage";

/// Source of candidate identifier bodies.
pub trait LocationGenerator: Send + Debug {
    /// Return a body of [`STORAGE_LOCATION_BODY_LENGTH`] characters drawn
    /// from [`STORAGE_LOCATION_ALPHABET`].
    fn next_body(&mut self) -> String;
}

#[derive(Debug)]
pub struct RandomLocationGenerator {
    rng: StdRng,
}

impl RandomLocationGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomLocationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationGenerator for RandomLocationGenerator {
    fn next_body(&mut self) -> String {
        (0..STORAGE_LOCATION_BODY_LENGTH)
            .map(|_| {
                let idx = self.rng.random_range(0..STORAGE_LOCATION_ALPHABET.len());
                STORAGE_LOCATION_ALPHABET[idx] as char
            })
            .collect()
    }
}

/// Whether `id` has the prefix and a well-formed body.
pub fn is_valid_storage_location(id: &str) -> bool {
    match id.strip_prefix(STORAGE_LOCATION_PREFIX) {
        Some(body) => {
            body.len() == STORAGE_LOCATION_BODY_LENGTH
                && body.bytes().all(|b| STORAGE_LOCATION_ALPHABET.contains(&b))
        }
        None => false,
    }
}

pub fn reservation_path(id: &str) -> String {
    format!("{STORAGE_RESERVATION_ROOT}/{id}{RESOURCE_SUFFIX}")
}

#[derive(Debug)]
struct AllocatorState {
    used: HashSet<String>,
    generator: Box<dyn LocationGenerator>,
}

/// Hands out collision-free storage identifiers.
///
/// Generation, the uniqueness check and the insert all happen under one lock
/// over the whole set.
#[derive(Debug)]
pub struct StorageLocationAllocator {
    state: Mutex<AllocatorState>,
    max_attempts: usize,
    reservation: ReservationMode,
    store: Arc<dyn ResourceStore>,
    owner: String,
}

impl StorageLocationAllocator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        owner: impl Into<String>,
        max_attempts: usize,
        reservation: ReservationMode,
        generator: Box<dyn LocationGenerator>,
    ) -> Self {
        Self {
            state: Mutex::new(AllocatorState {
                used: HashSet::new(),
                generator,
            }),
            max_attempts,
            reservation,
            store,
            owner: owner.into(),
        }
    }

    /// Generate a fresh identifier and mark it used.
    pub fn allocate(&self) -> Result<String> {
        let mut state = self.state.lock();
        for _ in 0..self.max_attempts {
            let id = format!("{STORAGE_LOCATION_PREFIX}{}", state.generator.next_body());
            if !is_valid_storage_location(&id) {
                return Err(RegistryError::internal(format!(
                    "location generator produced malformed identifier '{id}'"
                )));
            }
            if state.used.contains(&id) {
                log::debug!("Storage location {id} already in use, regenerating");
                continue;
            }
            if self.reservation == ReservationMode::Store && !self.reserve(&id)? {
                log::debug!("Storage location {id} reserved by another process, regenerating");
                // Remember it so this process does not try it again.
                state.used.insert(id);
                continue;
            }
            state.used.insert(id.clone());
            return Ok(id);
        }

        Err(RegistryError::AllocatorExhausted {
            attempts: self.max_attempts,
        })
    }

    fn reserve(&self, id: &str) -> Result<bool> {
        let record = json!({
            "storage_location_identifier": id,
            STORAGE_METADATA_KEY: self.owner,
            "reserved_at": chrono::Utc::now().timestamp_millis(),
        });
        let bytes = serde_json::to_vec(&record)?;
        self.store.put_if_absent(&reservation_path(id), &bytes)
    }

    /// Mark identifiers seen on loaded segments as used.
    pub fn register<'a, I: IntoIterator<Item = &'a str>>(&self, ids: I) {
        let mut state = self.state.lock();
        state.used.extend(ids.into_iter().map(str::to_string));
    }

    /// Forget identifiers, making them eligible again locally.
    pub fn release<'a, I: IntoIterator<Item = &'a str>>(&self, ids: I) {
        let mut state = self.state.lock();
        for id in ids {
            state.used.remove(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().used.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
