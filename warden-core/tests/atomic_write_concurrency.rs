//! Writers racing on one path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serial_test::serial;
use tempfile::TempDir;
use warden_config::constants::atomic_write::SANDBOXED_FS_ENV;
use warden_config::{AtomicWriteConfig, WriteMode};
use warden_core::atomic_write::{AtomicWriter, SessionState, WriteLockRegistry};

fn writer(mode: WriteMode) -> AtomicWriter {
    let config = AtomicWriteConfig {
        mode,
        ..AtomicWriteConfig::default()
    };
    AtomicWriter::with_registry(&config, Arc::new(WriteLockRegistry::new()))
}

fn payload(id: u8) -> Vec<u8> {
    vec![b'a' + id; 64 * 1024 + usize::from(id)]
}

fn no_temporaries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .expect("temp dir is readable")
        .filter_map(Result::ok)
        .all(|entry| !entry.file_name().to_string_lossy().starts_with(".warden-"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_interleave() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("project.sb3");
    let writer = writer(WriteMode::Atomic);
    let open_sessions = Arc::new(AtomicUsize::new(0));
    let max_open = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8_u8)
        .map(|id| {
            let writer = writer.clone();
            let target = target.clone();
            let open_sessions = Arc::clone(&open_sessions);
            let max_open = Arc::clone(&max_open);
            tokio::spawn(async move {
                let mut session = writer.open(&target).await.expect("open");
                let now = open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
                max_open.fetch_max(now, Ordering::SeqCst);

                for chunk in payload(id).chunks(4096) {
                    session.write(chunk.to_vec()).await.expect("write");
                    tokio::task::yield_now().await;
                }
                open_sessions.fetch_sub(1, Ordering::SeqCst);
                session.finish().await.expect("finish");
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("writer task");
    }

    assert_eq!(max_open.load(Ordering::SeqCst), 1);
    let written = std::fs::read(&target).expect("target exists");
    assert!(
        (0..8_u8).any(|id| written == payload(id)),
        "final content is exactly one writer's payload"
    );
    assert!(writer.registry().is_empty());
    assert!(no_temporaries(dir.path()));
}

#[tokio::test]
async fn aborted_session_leaves_previous_content() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("settings.json");
    std::fs::write(&target, b"{\"v2\":{}}").expect("seed");
    let writer = writer(WriteMode::Atomic);

    let mut session = writer.open(&target).await.expect("open");
    session.write(b"{\"v2\":{\"locale\":".to_vec()).await.expect("write");
    session.abort("serialization failed").await;

    assert_eq!(std::fs::read(&target).expect("read"), b"{\"v2\":{}}");
    assert!(no_temporaries(dir.path()));
    assert!(!writer.registry().is_locked(&target));
}

#[tokio::test]
async fn queued_writer_proceeds_after_a_failed_one() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("queue.txt");
    let writer = writer(WriteMode::Atomic);

    let mut first = writer.open(&target).await.expect("open first");
    let second = {
        let writer = writer.clone();
        let target = target.clone();
        tokio::spawn(async move { writer.write_file(&target, b"second".to_vec()).await })
    };
    while writer.registry().waiting(&target) == 0 {
        tokio::task::yield_now().await;
    }

    first.write(b"first".to_vec()).await.expect("write");
    assert_ne!(first.state(), SessionState::Errored);
    drop(first);

    second.await.expect("second task").expect("second write");
    assert_eq!(std::fs::read(&target).expect("read"), b"second");
    assert!(writer.registry().is_empty());
}

#[tokio::test]
async fn global_registry_serializes_independent_writers() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("shared.txt");
    let one = AtomicWriter::new(&AtomicWriteConfig::default());
    let two = AtomicWriter::new(&AtomicWriteConfig::default());

    let held = one.open(&target).await.expect("open");
    assert!(two.registry().is_locked(&target));
    held.finish().await.expect("finish");
    assert!(!two.registry().is_locked(&target));
}

#[test]
#[serial]
fn sandbox_marker_switches_auto_mode_in_place() {
    // SAFETY: serialized with other env-mutating tests.
    unsafe { std::env::set_var(SANDBOXED_FS_ENV, "1") };
    let sandboxed = WriteMode::Auto.resolve();
    unsafe { std::env::remove_var(SANDBOXED_FS_ENV) };
    let normal = WriteMode::Auto.resolve();

    assert_eq!(sandboxed, WriteMode::InPlace);
    assert_eq!(normal, WriteMode::Atomic);
}
