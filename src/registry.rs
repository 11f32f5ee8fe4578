//! The index definition registry.
//!
//! A [`Registry`] caches every index definition persisted under
//! `/invertedindex`, commits mutations back to the resource store, and keeps
//! peers in sync through the invalidation channel.
//!
//! # Consistency
//!
//! Mutations work on a copy of the definition. The copy is written to the
//! store first; only when the write succeeds does it replace the cached entry
//! and get announced to peers. A failed write leaves cache, store and peers
//! exactly as they were.
//!
//! Concurrent writers to the same definition are last-writer-wins at the
//! store. Within one process, loads and commits of the same record path are
//! serialized by a per-path lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::allocator::{
    LocationGenerator, RandomLocationGenerator, STORAGE_LOCATION_PREFIX, STORAGE_METADATA_KEY,
    StorageLocationAllocator,
};
use crate::cache::DefinitionCache;
use crate::catalog::DescriptorCatalog;
use crate::config::RegistryConfig;
use crate::dictionary::{DictionaryGateway, DictionaryInfo};
use crate::error::{RegistryError, Result};
use crate::factory::SegmentFactory;
use crate::invalidation::{
    CacheCategory, InvalidationChannel, InvalidationEvent, InvalidationKind, NoopChannel,
};
use crate::model::{
    ColumnRef, INDEX_RESOURCE_ROOT, IndexDefinition, IndexDescriptor, RESOURCE_SUFFIX, Segment,
};
use crate::store::{self, ResourceStore};

/// External collaborators a registry is wired to.
#[derive(Debug)]
pub struct RegistryContext {
    pub store: Arc<dyn ResourceStore>,
    pub dictionaries: Arc<dyn DictionaryGateway>,
    pub descriptors: Arc<dyn DescriptorCatalog>,
    pub channel: Arc<dyn InvalidationChannel>,
    pub generator: Box<dyn LocationGenerator>,
}

impl RegistryContext {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        dictionaries: Arc<dyn DictionaryGateway>,
        descriptors: Arc<dyn DescriptorCatalog>,
    ) -> Self {
        Self {
            store,
            dictionaries,
            descriptors,
            channel: Arc::new(NoopChannel),
            generator: Box::new(RandomLocationGenerator::new()),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn InvalidationChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn LocationGenerator>) -> Self {
        self.generator = generator;
        self
    }
}

/// A record that could not be loaded during a bulk load.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: String,
    pub error: RegistryError,
}

/// Outcome of [`Registry::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct Registry {
    instance_id: String,
    config: RegistryConfig,
    store: Arc<dyn ResourceStore>,
    dictionaries: Arc<dyn DictionaryGateway>,
    descriptors: Arc<dyn DescriptorCatalog>,
    cache: DefinitionCache,
    allocator: Arc<StorageLocationAllocator>,
    factory: SegmentFactory,
    path_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Registry {
    /// Build a registry and load every persisted definition.
    ///
    /// Records that fail to decode are skipped and listed in the returned
    /// report. Only a failure to enumerate the store aborts construction.
    pub fn open(config: RegistryConfig, context: RegistryContext) -> Result<(Self, LoadReport)> {
        config.validate()?;
        let instance_id = uuid::Uuid::new_v4().simple().to_string();
        log::info!(
            "Initializing index registry {instance_id} with config {}",
            config.metadata_url
        );

        let allocator = Arc::new(StorageLocationAllocator::new(
            context.store.clone(),
            config.metadata_url.clone(),
            config.max_allocation_attempts,
            config.reservation,
            context.generator,
        ));
        let registry = Self {
            cache: DefinitionCache::new(
                CacheCategory::InvertedIndex,
                instance_id.clone(),
                context.channel,
            ),
            factory: SegmentFactory::new(allocator.clone()),
            allocator,
            instance_id,
            config,
            store: context.store,
            dictionaries: context.dictionaries,
            descriptors: context.descriptors,
            path_locks: Mutex::new(HashMap::new()),
        };

        let report = registry.load_all()?;
        Ok((registry, report))
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn storage_location_prefix() -> &'static str {
        STORAGE_LOCATION_PREFIX
    }

    /// Metadata key under which external storage objects record the
    /// deployment that owns them.
    pub fn storage_metadata_key() -> &'static str {
        STORAGE_METADATA_KEY
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn list(&self) -> Vec<Arc<IndexDefinition>> {
        self.cache.values()
    }

    pub fn get(&self, name: &str) -> Option<Arc<IndexDefinition>> {
        self.cache.get(name)
    }

    pub fn find_by_descriptor(&self, descriptor_name: &str) -> Vec<Arc<IndexDefinition>> {
        let wanted = descriptor_name.to_uppercase();
        self.cache
            .values()
            .into_iter()
            .filter(|def| def.descriptor.to_uppercase() == wanted)
            .collect()
    }

    pub fn is_location_in_use(&self, storage_location: &str) -> bool {
        self.allocator.contains(storage_location)
    }

    /// Descriptor of `definition`. A definition pointing at a descriptor the
    /// catalog does not know is a corrupted state.
    pub fn descriptor(&self, definition: &IndexDefinition) -> Result<IndexDescriptor> {
        self.descriptors
            .descriptor(&definition.descriptor)?
            .ok_or_else(|| {
                RegistryError::corrupted(format!(
                    "descriptor {} of index {} does not exist",
                    definition.descriptor, definition.name
                ))
            })
    }

    /// Dictionary recorded for `column` on a segment.
    ///
    /// `Ok(None)` if the segment has no dictionary for the column yet. An
    /// error if the recorded path no longer resolves.
    pub fn dictionary(
        &self,
        definition: &IndexDefinition,
        segment_uuid: &str,
        column: &ColumnRef,
    ) -> Result<Option<DictionaryInfo>> {
        let segment = find_segment(definition, segment_uuid)?;
        let Some(path) = segment.dictionary_path(column) else {
            return Ok(None);
        };

        match self.dictionaries.info(path)? {
            Some(info) => Ok(Some(info)),
            None => Err(RegistryError::corrupted(format!(
                "no dictionary found by {path}, invalid index state; segment {} of {}, column {column}",
                segment.name, definition.name
            ))),
        }
    }

    /// Dimension columns of a segment that still lack a dictionary.
    pub fn missing_dictionaries(
        &self,
        definition: &IndexDefinition,
        segment_uuid: &str,
    ) -> Result<Vec<ColumnRef>> {
        let descriptor = self.descriptor(definition)?;
        let segment = find_segment(definition, segment_uuid)?;
        Ok(segment
            .missing_dictionaries(&descriptor)
            .into_iter()
            .cloned()
            .collect())
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Construct a NEW segment for `definition`. Only the storage location is
    /// reserved; appending and persisting are left to the caller.
    pub fn create_segment(
        &self,
        definition: &IndexDefinition,
        start_date: i64,
        end_date: i64,
    ) -> Result<Segment> {
        self.factory.create(definition, start_date, end_date)
    }

    /// Build a dictionary for every dimension column of the definition's
    /// descriptor, record the paths on the segment and persist the whole
    /// definition once.
    ///
    /// The caller's `definition` is not modified. If any build or the final
    /// persist fails, nothing becomes visible in the cache.
    pub fn attach_dictionaries(
        &self,
        definition: &IndexDefinition,
        segment_uuid: &str,
        fact_columns_path: &str,
    ) -> Result<Arc<IndexDefinition>> {
        let descriptor = self.descriptor(definition)?;
        let mut updated = definition.clone();
        let segment = updated.segment_mut(segment_uuid).ok_or_else(|| {
            RegistryError::not_found(format!(
                "segment {segment_uuid} of index {}",
                definition.name
            ))
        })?;

        for column in descriptor.dimension_columns() {
            let info = self
                .dictionaries
                .build(&descriptor.model_name, column, fact_columns_path)?;
            log::debug!("Built dictionary {} for {column}", info.resource_path);
            segment.put_dictionary_path(column, info.resource_path);
        }

        self.commit(updated)
    }

    /// Persist `definition` as a whole, replacing whatever is stored.
    pub fn update(&self, definition: IndexDefinition) -> Result<Arc<IndexDefinition>> {
        log::info!("Updating index definition '{}'", definition.name);
        let saved = self.commit(definition)?;
        log::info!(
            "Index definition with {} segments is saved",
            saved.segments.len()
        );
        Ok(saved)
    }

    /// Drop a definition from this process's cache and free its storage
    /// locations locally. The persisted record is untouched.
    ///
    /// Locations of segments removed by earlier updates are not freed here;
    /// they stay in use for the life of the process.
    pub fn evict(&self, definition: &IndexDefinition) {
        let cached = self.cache.remove_local(&definition.name);
        self.allocator.release(definition.storage_locations());
        if let Some(cached) = cached {
            self.allocator.release(cached.storage_locations());
        }
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Load every record under the index root. Per-record failures are
    /// logged and reported, never propagated.
    pub fn load_all(&self) -> Result<LoadReport> {
        let paths = self.store.list(INDEX_RESOURCE_ROOT, RESOURCE_SUFFIX)?;
        log::debug!(
            "Loading index definitions from {}",
            self.store.readable_path(INDEX_RESOURCE_ROOT)
        );

        let mut report = LoadReport::default();
        for path in paths {
            match self.load_record(&path) {
                Ok(_) => report.loaded += 1,
                Err(error) => {
                    log::error!("Error during load index definition {path}: {error}");
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        log::debug!(
            "Loaded {} index definition(s), {} failed",
            report.loaded,
            report.failures.len()
        );
        Ok(report)
    }

    /// Re-read one definition from the store.
    ///
    /// Errors are returned and the cached entry is kept. If the record no
    /// longer exists the entry is evicted and `None` returned.
    pub fn reload(&self, name: &str) -> Result<Option<Arc<IndexDefinition>>> {
        let path = self.record_path(name);
        match self.load_record(&path) {
            Ok(definition) => Ok(Some(definition)),
            Err(e) if e.is_not_found() => {
                if let Some(cached) = self.cache.remove_local(name) {
                    log::info!("Index definition {} was removed from the store", cached.name);
                    self.allocator.release(cached.storage_locations());
                }
                Ok(None)
            }
            Err(e) => {
                log::error!("Error during reload of index definition {path}: {e}");
                Err(e)
            }
        }
    }

    /// React to an event from the invalidation channel. Events published by
    /// this instance or for another category are ignored. A failed reload
    /// keeps the previous entry.
    pub fn apply_invalidation(&self, event: &InvalidationEvent) {
        if event.origin == self.instance_id || event.category != CacheCategory::InvertedIndex {
            return;
        }
        log::debug!("Registry {} applying {event}", self.instance_id);

        match event.kind {
            InvalidationKind::Update => {
                if let Err(e) = self.reload(&event.name) {
                    log::warn!(
                        "Keeping cached index definition {} after failed reload: {e}",
                        event.name
                    );
                }
            }
            InvalidationKind::Drop => {
                if let Some(cached) = self.cache.remove_local(&event.name) {
                    self.allocator.release(cached.storage_locations());
                }
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Path a cached definition was loaded from, or the path its name maps to.
    fn record_path(&self, name: &str) -> String {
        self.cache
            .path_of(name)
            .unwrap_or_else(|| IndexDefinition::concat_resource_path(name))
    }

    /// Run `f` holding the lock for `path`. The lock entry is dropped again
    /// once nobody else holds or waits for it.
    fn with_path_lock<T>(&self, path: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .path_locks
            .lock()
            .entry(path.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };

        let mut locks = self.path_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
        result
    }

    fn load_record(&self, path: &str) -> Result<Arc<IndexDefinition>> {
        self.with_path_lock(path, || -> Result<Arc<IndexDefinition>> {
            log::debug!("Loading index definition {}", self.store.readable_path(path));
            let definition: IndexDefinition = store::read_json(self.store.as_ref(), path)?
                .ok_or_else(|| RegistryError::not_found(path.to_string()))?;
            definition
                .validate()
                .map_err(|e| RegistryError::decode(path, e.to_string()))?;

            let definition = Arc::new(definition);
            // Registered before the name check: a clashing record's
            // locations stay in use.
            self.allocator.register(definition.storage_locations());
            self.cache
                .put_local(definition.clone(), path)
                .map_err(|owner| {
                    RegistryError::decode(
                        path,
                        format!(
                            "index name {} is already loaded from {owner}",
                            definition.name
                        ),
                    )
                })?;
            Ok(definition)
        })
    }

    /// Persist and cache `definition`. Locations of segments dropped from the
    /// definition stay registered; only eviction frees locations.
    fn commit(&self, mut definition: IndexDefinition) -> Result<Arc<IndexDefinition>> {
        definition.validate()?;
        let path = self.record_path(&definition.name);

        self.with_path_lock(&path, || -> Result<Arc<IndexDefinition>> {
            definition.last_modified = chrono::Utc::now().timestamp_millis();
            store::write_json(self.store.as_ref(), &path, &definition)?;

            let definition = Arc::new(definition);
            self.allocator.register(definition.storage_locations());
            self.cache.put(definition.clone(), &path);
            Ok(definition)
        })
    }
}

fn find_segment<'a>(definition: &'a IndexDefinition, segment_uuid: &str) -> Result<&'a Segment> {
    definition.segment(segment_uuid).ok_or_else(|| {
        RegistryError::not_found(format!(
            "segment {segment_uuid} of index {}",
            definition.name
        ))
    })
}
