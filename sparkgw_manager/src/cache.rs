//! Watch cache of SparkApplications.
//!
//! The cache is split into partitions, one per watched namespace, or a single partition
//! covering the whole cluster when no namespace is configured. Each partition has exactly
//! one [CacheWriter], fed by a watch loop, while any number of [CacheReader]s read from it.
//! A re-list is built aside and swapped in on `InitDone`, so a reader sees either the old
//! or the new snapshot, never a mix.

use ::std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use ::sparkgw_common::application::SparkApplication;
use ::tracing::{debug, info};

pub use ::kube::runtime::watcher::Event;

/// (namespace, name)
type ObjectKey = (String, String);
type Snapshot = BTreeMap<ObjectKey, SparkApplication>;

#[derive(Debug)]
struct Partition {
    /// `None` for the partition watching every namespace
    scope: Option<String>,
    objects: RwLock<Snapshot>,
    synced: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl Partition {
    fn covers(&self, namespace: &str) -> bool {
        self.scope.as_deref().map_or(true, |scope| scope == namespace)
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        f(&objects)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> T) -> T {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut objects)
    }
}

/// Create the cache for `namespaces`, an empty list meaning every namespace.
pub fn watch_cache(namespaces: &[String]) -> (CacheReader, Vec<CacheWriter>) {
    let scopes = if namespaces.is_empty() {
        vec![None]
    } else {
        namespaces.iter().cloned().map(Some).collect()
    };
    let partitions: Vec<Arc<Partition>> = scopes
        .into_iter()
        .map(|scope| {
            Arc::new(Partition {
                scope,
                objects: RwLock::default(),
                synced: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
            })
        })
        .collect();
    let writers = partitions
        .iter()
        .map(|partition| CacheWriter {
            partition: Arc::clone(partition),
            relist: None,
        })
        .collect();
    let reader = CacheReader {
        partitions: partitions.into(),
    };
    (reader, writers)
}

/// Read-only view of the whole cache, cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheReader {
    partitions: Arc<[Arc<Partition>]>,
}

impl CacheReader {
    fn partition(&self, namespace: &str) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|partition| partition.covers(namespace))
            .map(Arc::as_ref)
    }

    /// Whether some partition watches `namespace`.
    pub fn covers(&self, namespace: &str) -> bool {
        self.partition(namespace).is_some()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<SparkApplication> {
        self.partition(namespace)?.read(|objects| {
            objects
                .get(&(namespace.to_owned(), name.to_owned()))
                .cloned()
        })
    }

    /// Applications of `namespace` ordered by name, empty for an unwatched namespace.
    pub fn list(&self, namespace: &str) -> Vec<SparkApplication> {
        self.partition(namespace)
            .map(|partition| {
                partition.read(|objects| {
                    objects
                        .iter()
                        .filter(|((ns, _), _)| ns == namespace)
                        .map(|(_, app)| app.clone())
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Every partition finished its initial list and none is failing repeatedly.
    pub fn is_ready(&self, max_failures: u32) -> bool {
        self.partitions.iter().all(|partition| {
            partition.synced.load(Ordering::Acquire)
                && partition.consecutive_failures.load(Ordering::Acquire) < max_failures
        })
    }
}

/// The single writer of one partition.
#[derive(Debug)]
pub struct CacheWriter {
    partition: Arc<Partition>,
    /// snapshot being rebuilt between `Init` and `InitDone`
    relist: Option<Snapshot>,
}

impl CacheWriter {
    /// Namespace watched by this writer, `None` for all namespaces.
    pub fn scope(&self) -> Option<&str> {
        self.partition.scope.as_deref()
    }

    pub fn apply(&mut self, event: Event<SparkApplication>) {
        self.partition
            .consecutive_failures
            .store(0, Ordering::Release);
        match event {
            Event::Apply(app) => {
                if let Some(key) = object_key(&app) {
                    debug!("Cache apply {}/{}", key.0, key.1);
                    self.partition.write(|objects| objects.insert(key, app));
                }
            }
            Event::Delete(app) => {
                if let Some(key) = object_key(&app) {
                    debug!("Cache delete {}/{}", key.0, key.1);
                    self.partition.write(|objects| objects.remove(&key));
                }
            }
            Event::Init => {
                self.relist = Some(Snapshot::new());
            }
            Event::InitApply(app) => {
                if let Some(key) = object_key(&app) {
                    self.relist.get_or_insert_with(Snapshot::new).insert(key, app);
                }
            }
            Event::InitDone => {
                let snapshot = self.relist.take().unwrap_or_default();
                let size = snapshot.len();
                self.partition.write(|objects| *objects = snapshot);
                self.partition.synced.store(true, Ordering::Release);
                info!(
                    "Cache of {} synced with {} applications",
                    self.scope().unwrap_or("all namespaces"),
                    size
                );
            }
        }
    }

    /// Count a failed watch attempt, returning the number of consecutive failures.
    pub fn record_failure(&self) -> u32 {
        self.partition
            .consecutive_failures
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }
}

fn object_key(app: &SparkApplication) -> Option<ObjectKey> {
    match (&app.metadata.namespace, &app.metadata.name) {
        (Some(namespace), Some(name)) => Some((namespace.clone(), name.clone())),
        _ => None,
    }
}
