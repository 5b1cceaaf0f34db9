use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pfindex::{
    CollisionPolicy, FilenameTemplate, IndexError, IndexMonitor, IndexStore, Lookup, LookupCache,
    RefreshOutcome, SourceLibrary, SourceRecord, build_index,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Photothèque en mémoire pilotée par le test
struct FakeLibrary {
    modified: Mutex<DateTime<Utc>>,
    records: Mutex<Vec<SourceRecord>>,
    fail: AtomicBool,
    enumerations: AtomicUsize,
    delay: Duration,
}

impl FakeLibrary {
    fn new(records: Vec<SourceRecord>) -> Arc<Self> {
        Arc::new(Self {
            modified: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            records: Mutex::new(records),
            fail: AtomicBool::new(false),
            enumerations: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    fn slow(records: Vec<SourceRecord>, delay: Duration) -> Arc<Self> {
        let mut library = Self::new(records);
        Arc::get_mut(&mut library).unwrap().delay = delay;
        library
    }

    fn touch(&self, records: Vec<SourceRecord>) {
        let mut modified = self.modified.lock().unwrap();
        *modified += chrono::Duration::seconds(1);
        *self.records.lock().unwrap() = records;
    }
}

#[async_trait]
impl SourceLibrary for FakeLibrary {
    fn location(&self) -> &str {
        "/tmp/Fake Library.photoslibrary"
    }

    async fn last_modified(&self) -> pfindex::Result<DateTime<Utc>> {
        Ok(*self.modified.lock().unwrap())
    }

    async fn records(&self) -> pfindex::Result<Vec<SourceRecord>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndexError::Source("library locked".into()));
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

fn record(id: &str, date: &str, name: &str) -> SourceRecord {
    SourceRecord {
        identifier: id.to_string(),
        captured_at: Some(date.to_string()),
        original_filename: Some(name.to_string()),
        ..Default::default()
    }
}

fn sample_records() -> Vec<SourceRecord> {
    vec![
        record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
        record("B", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
        record("C", "2024-01-02T10:11:12.345678Z", "IMG_0002.HEIC"),
    ]
}

fn create_monitor(library: Arc<FakeLibrary>) -> (TempDir, IndexMonitor) {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::for_library(dir.path(), library.location());
    let lookup = LookupCache::new(store.index_path());
    let monitor = IndexMonitor::new(
        library,
        store,
        FilenameTemplate::default(),
        CollisionPolicy::Quality,
        lookup,
    );
    (dir, monitor)
}

#[test]
fn test_rebuild_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let template = FilenameTemplate::default();

    let first = build_index(&sample_records(), &template, CollisionPolicy::Quality);
    first
        .write_to(&dir.path().join("i1.json"), &dir.path().join("c1.json"))
        .unwrap();
    let second = build_index(&sample_records(), &template, CollisionPolicy::Quality);
    second
        .write_to(&dir.path().join("i2.json"), &dir.path().join("c2.json"))
        .unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("i1.json")).unwrap(),
        std::fs::read(dir.path().join("i2.json")).unwrap()
    );
    assert_eq!(
        std::fs::read(dir.path().join("c1.json")).unwrap(),
        std::fs::read(dir.path().join("c2.json")).unwrap()
    );
}

#[test]
fn test_collision_is_recorded_without_crash() {
    let built = build_index(
        &sample_records(),
        &FilenameTemplate::default(),
        CollisionPolicy::Quality,
    );
    let key = "20240101T000000000000Z-IMG_0001.JPG";

    assert_eq!(built.collisions[key], vec!["A".to_string(), "B".to_string()]);
    assert_eq!(built.index[key], pfindex::IndexEntry::Single("B".into()));
    assert!(built.index.contains_key("20240102T101112345678Z-IMG_0002.jpg"));
}

#[tokio::test]
async fn test_first_refresh_builds_then_stays_fresh() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library.clone());

    let outcome = monitor.ensure_fresh().await.unwrap();
    assert_eq!(
        outcome,
        RefreshOutcome::Rebuilt {
            entries: 2,
            collisions: 1,
            skipped: 0
        }
    );
    assert!(monitor.store().index_path().exists());
    assert!(monitor.store().collisions_path().exists());
    assert!(monitor.metadata().is_some());

    assert_eq!(monitor.ensure_fresh().await.unwrap(), RefreshOutcome::Fresh);
    assert_eq!(monitor.rebuild_count(), 1);
    assert_eq!(library.enumerations.load(Ordering::SeqCst), 1);

    assert_eq!(
        monitor
            .lookup()
            .lookup("20240102T101112345678Z-IMG_0002.jpg")
            .await,
        Lookup::Found("C".into())
    );
}

#[tokio::test]
async fn test_library_change_triggers_rebuild() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library.clone());
    monitor.ensure_fresh().await.unwrap();

    library.touch(vec![record("D", "2024-03-01T00:00:00Z", "IMG_0003.JPG")]);

    assert!(matches!(
        monitor.ensure_fresh().await.unwrap(),
        RefreshOutcome::Rebuilt { entries: 1, .. }
    ));
    assert_eq!(
        monitor
            .lookup()
            .lookup("20240301T000000000000Z-IMG_0003.JPG")
            .await,
        Lookup::Found("D".into())
    );
    assert_eq!(
        monitor
            .lookup()
            .lookup("20240102T101112345678Z-IMG_0002.jpg")
            .await,
        Lookup::NotFound
    );
}

#[tokio::test]
async fn test_missing_index_file_is_stale() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library);
    monitor.ensure_fresh().await.unwrap();

    std::fs::remove_file(monitor.store().index_path()).unwrap();
    assert!(matches!(
        monitor.ensure_fresh().await.unwrap(),
        RefreshOutcome::Rebuilt { .. }
    ));
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library.clone());
    monitor.ensure_fresh().await.unwrap();
    let before = std::fs::read(monitor.store().index_path()).unwrap();

    library.touch(Vec::new());
    library.fail.store(true, Ordering::SeqCst);

    assert!(monitor.ensure_fresh().await.is_err());
    assert_eq!(std::fs::read(monitor.store().index_path()).unwrap(), before);
    assert_eq!(monitor.rebuild_count(), 1);

    let leftovers = std::fs::read_dir(monitor.store().dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    // La photothèque redevient lisible : l'index suit
    library.fail.store(false, Ordering::SeqCst);
    assert!(matches!(
        monitor.ensure_fresh().await.unwrap(),
        RefreshOutcome::Rebuilt { entries: 0, .. }
    ));
}

#[tokio::test]
async fn test_concurrent_refreshes_collapse() {
    let library = FakeLibrary::slow(sample_records(), Duration::from_millis(50));
    let (_dir, monitor) = create_monitor(library.clone());

    let (a, b, c) = tokio::join!(
        monitor.ensure_fresh(),
        monitor.ensure_fresh(),
        monitor.ensure_fresh()
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    let rebuilt = outcomes
        .iter()
        .filter(|o| matches!(o, RefreshOutcome::Rebuilt { .. }))
        .count();
    assert_eq!(rebuilt, 1);
    assert_eq!(library.enumerations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_force_rebuild_ignores_freshness() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library);
    monitor.ensure_fresh().await.unwrap();

    assert!(matches!(
        monitor.force_rebuild().await.unwrap(),
        RefreshOutcome::Rebuilt { .. }
    ));
    assert_eq!(monitor.rebuild_count(), 2);
}

#[tokio::test]
async fn test_periodic_task_builds_on_start() {
    let library = FakeLibrary::new(sample_records());
    let (_dir, monitor) = create_monitor(library);

    let handle = monitor.spawn_periodic(Duration::from_secs(3600));
    for _ in 0..100 {
        if monitor.rebuild_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert_eq!(monitor.rebuild_count(), 1);
    assert!(!monitor.lookup().is_empty().await);
}
