use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use ii_registry::allocator::{STORAGE_LOCATION_BODY_LENGTH, STORAGE_LOCATION_PREFIX};
use ii_registry::error::{RegistryError, Result};
use ii_registry::model::FULL_BUILD_SEGMENT_NAME;
use ii_registry::{
    ColumnRef, DictionaryGateway, DictionaryInfo, IndexDefinition, IndexDescriptor,
    LocalBroadcaster, LocationGenerator, MemoryResourceStore, Registry, RegistryConfig,
    RegistryContext, ReservationMode, ResourceStore, StoreDescriptorCatalog,
};
use parking_lot::Mutex;

const JAN_2020: i64 = 1_577_836_800_000;
const FEB_2020: i64 = 1_580_515_200_000;

// Dictionary gateway that "builds" by recording a path per column.
#[derive(Debug, Default)]
struct MockDictionaryGateway {
    built: Mutex<HashMap<String, DictionaryInfo>>,
    calls: AtomicUsize,
}

impl DictionaryGateway for MockDictionaryGateway {
    fn build(&self, model_name: &str, column: &ColumnRef, _source: &str) -> Result<DictionaryInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let info = DictionaryInfo {
            resource_path: format!("/dict/{}/{}/{model_name}.dict", column.table, column.column),
            model_name: model_name.to_string(),
            column: column.clone(),
            cardinality: 10,
        };
        self.built
            .lock()
            .insert(info.resource_path.clone(), info.clone());
        Ok(info)
    }

    fn info(&self, resource_path: &str) -> Result<Option<DictionaryInfo>> {
        Ok(self.built.lock().get(resource_path).cloned())
    }
}

// Memory store whose writes can be switched off.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryResourceStore,
    fail_puts: AtomicBool,
}

impl ResourceStore for FlakyStore {
    fn list(&self, root: &str, suffix: &str) -> Result<Vec<String>> {
        self.inner.list(root, suffix)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(path)
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RegistryError::persist(path, "store unavailable"));
        }
        self.inner.put(path, data)
    }

    fn put_if_absent(&self, path: &str, data: &[u8]) -> Result<bool> {
        self.inner.put_if_absent(path, data)
    }

    fn delete(&self, path: &str) -> Result<bool> {
        self.inner.delete(path)
    }
}

#[derive(Debug)]
struct FixedGenerator(VecDeque<&'static str>);

impl LocationGenerator for FixedGenerator {
    fn next_body(&mut self) -> String {
        if self.0.len() > 1 {
            self.0.pop_front().unwrap_or_default().to_string()
        } else {
            self.0.front().copied().unwrap_or_default().to_string()
        }
    }
}

fn sales_descriptor() -> IndexDescriptor {
    IndexDescriptor::new("SALES_MODEL", "SALES_MODEL")
        .with_column(ColumnRef::new("SALES", "REGION"))
        .with_column(ColumnRef::new("SALES", "SELLER"))
        .with_metric(ColumnRef::new("SALES", "PRICE"))
}

fn context(store: Arc<dyn ResourceStore>, gateway: Arc<MockDictionaryGateway>) -> RegistryContext {
    let catalog = StoreDescriptorCatalog::new(store.clone());
    catalog.save(&sales_descriptor()).unwrap();
    RegistryContext::new(store, gateway, Arc::new(catalog))
}

fn open(context: RegistryContext) -> Registry {
    Registry::open(RegistryConfig::new("kylin_metadata"), context)
        .unwrap()
        .0
}

#[test]
fn test_get_is_case_insensitive() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = open(context(store, Arc::default()));

    registry.update(IndexDefinition::new("foo", "SALES_MODEL"))?;

    let lower = registry.get("foo").unwrap();
    let upper = registry.get("FOO").unwrap();
    assert!(Arc::ptr_eq(&lower, &upper));
    assert_eq!(lower.resource_path(), "/invertedindex/foo.json");
    assert!(registry.get("bar").is_none());
    Ok(())
}

#[test]
fn test_mixed_case_record_keeps_its_path() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let def = IndexDefinition::new("sales_ii", "SALES_MODEL");
    store.put("/invertedindex/sales_ii.json", &serde_json::to_vec(&def)?)?;
    let registry = open(context(store.clone(), Arc::default()));

    let reloaded = registry.reload("SALES_II")?.unwrap();
    assert_eq!(reloaded.name, "sales_ii");
    assert!(registry.get("Sales_II").is_some());

    let mut changed = (*reloaded).clone();
    let segment = registry.create_segment(&changed, 0, 0)?;
    changed.segments.push(segment);
    registry.update(changed)?;

    assert_eq!(
        store.list("/invertedindex", ".json")?,
        vec!["/invertedindex/sales_ii.json"]
    );
    let again = registry.reload("sales_ii")?.unwrap();
    assert_eq!(again.segments.len(), 1);
    Ok(())
}

#[test]
fn test_find_by_descriptor() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = open(context(store, Arc::default()));

    registry.update(IndexDefinition::new("A", "SALES_MODEL"))?;
    registry.update(IndexDefinition::new("B", "sales_model"))?;
    registry.update(IndexDefinition::new("C", "OTHER_MODEL"))?;

    let mut names: Vec<String> = registry
        .find_by_descriptor("Sales_Model")
        .iter()
        .map(|d| d.name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(registry.list().len(), 3);
    Ok(())
}

#[test]
fn test_full_build_segment_name() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = open(context(store, Arc::default()));
    let def = IndexDefinition::new("A", "SALES_MODEL");

    let full = registry.create_segment(&def, 0, 0)?;
    let ranged = registry.create_segment(&def, JAN_2020, FEB_2020)?;

    assert_eq!(full.name, FULL_BUILD_SEGMENT_NAME);
    assert_eq!(ranged.name, "20200101000000_20200201000000");
    assert_ne!(full.name, ranged.name);
    assert!(registry.create_segment(&def, FEB_2020, JAN_2020).is_err());
    Ok(())
}

#[test]
fn test_storage_locations_are_unique() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = open(context(store, Arc::default()));
    let def = IndexDefinition::new("A", "SALES_MODEL");

    let mut seen = HashSet::new();
    for _ in 0..500 {
        let segment = registry.create_segment(&def, 0, 0)?;
        let id = segment.storage_location_identifier;
        let body = id.strip_prefix(STORAGE_LOCATION_PREFIX).unwrap();
        assert_eq!(body.len(), STORAGE_LOCATION_BODY_LENGTH);
        assert!(body.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(seen.insert(id));
    }
    Ok(())
}

#[test]
fn test_reload_is_idempotent() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = open(context(store, Arc::default()));

    let mut def = IndexDefinition::new("A", "SALES_MODEL");
    let segment = registry.create_segment(&def, JAN_2020, FEB_2020)?;
    def.segments.push(segment);
    registry.update(def)?;

    let first = registry.reload("a")?.unwrap();
    let first_bytes = serde_json::to_vec(&*first)?;
    let second = registry.reload("A")?.unwrap();
    let second_bytes = serde_json::to_vec(&*second)?;

    assert_eq!(first_bytes, second_bytes);
    assert_eq!(serde_json::to_vec(&*registry.get("A").unwrap())?, first_bytes);
    Ok(())
}

#[test]
fn test_startup_skips_malformed_records() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let good = IndexDefinition::new("GOOD", "SALES_MODEL");
    store.put(&good.resource_path(), &serde_json::to_vec(&good)?)?;
    let blank = IndexDefinition::new("", "SALES_MODEL");
    store.put("/invertedindex/BLANK.json", &serde_json::to_vec(&blank)?)?;
    store.put("/invertedindex/GARBAGE.json", b"{ not json")?;

    let (registry, report) =
        Registry::open(RegistryConfig::new("kylin_metadata"), context(store, Arc::default()))?;

    let names: Vec<String> = registry.list().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["GOOD"]);
    assert_eq!(report.loaded, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, RegistryError::Decode { .. })));
    let mut failed: Vec<&str> = report.failures.iter().map(|f| f.path.as_str()).collect();
    failed.sort();
    assert_eq!(
        failed,
        vec!["/invertedindex/BLANK.json", "/invertedindex/GARBAGE.json"]
    );
    Ok(())
}

#[test]
fn test_attach_dictionaries_is_all_or_nothing() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    let gateway = Arc::new(MockDictionaryGateway::default());
    let hub = Arc::new(LocalBroadcaster::new());
    let events = hub.subscribe();
    let registry = open(context(store.clone(), gateway.clone()).with_channel(hub));

    let mut def = IndexDefinition::new("A", "SALES_MODEL");
    let segment = registry.create_segment(&def, JAN_2020, FEB_2020)?;
    let uuid = segment.uuid.clone();
    def.segments.push(segment);
    let saved = registry.update(def)?;
    assert!(events.try_recv().is_ok());

    store.fail_puts.store(true, Ordering::SeqCst);
    let err = registry
        .attach_dictionaries(&saved, &uuid, "/fact/sales")
        .unwrap_err();
    assert!(matches!(err, RegistryError::Persist { .. }));

    // Both dimension columns were built, none of it is visible.
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    let cached = registry.get("A").unwrap();
    assert!(cached.segment(&uuid).unwrap().dictionaries.is_empty());
    assert!(events.try_recv().is_err());

    // A retry after the store recovers goes through.
    store.fail_puts.store(false, Ordering::SeqCst);
    let attached = registry.attach_dictionaries(&saved, &uuid, "/fact/sales")?;
    assert_eq!(attached.segment(&uuid).unwrap().dictionaries.len(), 2);
    assert!(registry.missing_dictionaries(&attached, &uuid)?.is_empty());
    let info = registry
        .dictionary(&attached, &uuid, &ColumnRef::new("SALES", "REGION"))?
        .unwrap();
    assert_eq!(info.resource_path, "/dict/SALES/REGION/SALES_MODEL.dict");
    assert!(registry
        .dictionary(&attached, &uuid, &ColumnRef::new("SALES", "PRICE"))?
        .is_none());
    Ok(())
}

#[test]
fn test_failed_update_changes_nothing() -> Result<()> {
    let store = Arc::new(FlakyStore::default());
    let registry = open(context(store.clone(), Arc::default()));
    let original = registry.update(IndexDefinition::new("A", "SALES_MODEL"))?;

    store.fail_puts.store(true, Ordering::SeqCst);
    let mut changed = (*original).clone();
    let segment = registry.create_segment(&changed, 0, 0)?;
    changed.segments.push(segment);
    assert!(registry.update(changed).is_err());

    let cached = registry.get("A").unwrap();
    assert!(Arc::ptr_eq(&cached, &original));
    assert!(cached.segments.is_empty());
    Ok(())
}

#[test]
fn test_evicted_locations_can_be_reused() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let generator = FixedGenerator(VecDeque::from(["AAAAAAAAAA", "BBBBBBBBBB", "AAAAAAAAAA"]));
    let registry = open(context(store, Arc::default()).with_generator(Box::new(generator)));

    let mut def = IndexDefinition::new("A", "SALES_MODEL");
    let segment = registry.create_segment(&def, 0, 0)?;
    def.segments.push(segment);
    let saved = registry.update(def)?;
    assert_eq!(saved.segments[0].storage_location_identifier, "KYLIN_II_AAAAAAAAAA");

    registry.evict(&saved);
    assert!(registry.get("A").is_none());
    assert!(!registry.is_location_in_use("KYLIN_II_AAAAAAAAAA"));

    let other = IndexDefinition::new("B", "SALES_MODEL");
    let b = registry.create_segment(&other, 0, 0)?;
    let a = registry.create_segment(&other, 0, 0)?;
    assert_eq!(b.storage_location_identifier, "KYLIN_II_BBBBBBBBBB");
    assert_eq!(a.storage_location_identifier, "KYLIN_II_AAAAAAAAAA");
    Ok(())
}

#[test]
fn test_store_reservation_prevents_cross_process_collisions() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let config = RegistryConfig::builder("kylin_metadata")
        .reservation(ReservationMode::Store)
        .build()?;

    // Both "processes" draw the same candidates, neither has seen the
    // other's segments.
    let open_peer = || {
        let generator = FixedGenerator(VecDeque::from(["AAAAAAAAAA", "BBBBBBBBBB"]));
        let context = context(store.clone(), Arc::default()).with_generator(Box::new(generator));
        Registry::open(config.clone(), context).map(|(r, _)| r)
    };
    let first = open_peer()?;
    let second = open_peer()?;

    let def = IndexDefinition::new("A", "SALES_MODEL");
    let a = first.create_segment(&def, 0, 0)?;
    let b = second.create_segment(&def, 0, 0)?;
    assert_eq!(a.storage_location_identifier, "KYLIN_II_AAAAAAAAAA");
    assert_eq!(b.storage_location_identifier, "KYLIN_II_BBBBBBBBBB");
    Ok(())
}

#[test]
fn test_concurrent_segment_creation_is_unique() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = Arc::new(open(context(store, Arc::default())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                let def = IndexDefinition::new("A", "SALES_MODEL");
                (0..100)
                    .map(|_| {
                        registry
                            .create_segment(&def, 0, 0)
                            .unwrap()
                            .storage_location_identifier
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(registry.is_location_in_use(&id));
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 800);
    Ok(())
}

#[test]
fn test_concurrent_update_and_reload_agree() -> Result<()> {
    let store = Arc::new(MemoryResourceStore::new());
    let registry = Arc::new(open(context(store.clone(), Arc::default())));
    registry.update(IndexDefinition::new("A", "SALES_MODEL"))?;

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mut created = Vec::new();
                for _ in 0..25 {
                    let mut def = (*registry.get("A").unwrap()).clone();
                    let segment = registry.create_segment(&def, JAN_2020, FEB_2020).unwrap();
                    created.push(segment.storage_location_identifier.clone());
                    def.segments.push(segment);
                    registry.update(def).unwrap();
                }
                created
            })
        })
        .collect();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    assert!(registry.reload("A").unwrap().is_some());
                }
            })
        })
        .collect();

    let mut created = Vec::new();
    for writer in writers {
        created.extend(writer.join().unwrap());
    }
    for reader in readers {
        reader.join().unwrap();
    }

    let cached = registry.get("A").unwrap();
    let stored: IndexDefinition =
        serde_json::from_slice(&store.get("/invertedindex/A.json")?.unwrap())?;
    assert_eq!(*cached, stored);
    assert!(cached
        .storage_locations()
        .all(|loc| registry.is_location_in_use(loc)));
    // Segments lost to last-writer-wins keep their locations.
    assert_eq!(created.len(), 100);
    assert!(created.iter().all(|loc| registry.is_location_in_use(loc)));
    Ok(())
}
