//! Integration tests for the source watcher against a real directory.

use std::fs;
use std::time::Duration;

use hotbed_core::SourceWatcher;
use tempfile::TempDir;
use tokio::time::timeout;

const SETTLE: Duration = Duration::from_millis(300);

#[tokio::test]
async fn test_burst_of_writes_yields_one_change() {
    let temp = TempDir::new().unwrap();
    let mut watcher = SourceWatcher::new(temp.path(), "rs", SETTLE).unwrap();
    let path = temp.path().join("burst.rs");

    for i in 0..5 {
        fs::write(&path, format!("// revision {i}\n")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let change = timeout(Duration::from_secs(5), watcher.next_change())
        .await
        .expect("no change reported")
        .expect("watcher closed");
    assert_eq!(change.source.file_name(), "burst.rs");
    assert_eq!(change.source.text, "// revision 4\n");

    let second = timeout(SETTLE * 4, watcher.next_change()).await;
    assert!(second.is_err(), "burst produced more than one change");
}

#[tokio::test]
async fn test_other_extensions_ignored() {
    let temp = TempDir::new().unwrap();
    let mut watcher = SourceWatcher::new(temp.path(), "rs", SETTLE).unwrap();

    fs::write(temp.path().join("notes.txt"), "ignore me").unwrap();
    fs::write(temp.path().join(".hidden.rs"), "// hidden").unwrap();

    let change = timeout(SETTLE * 4, watcher.next_change()).await;
    assert!(change.is_err());
}

#[tokio::test]
async fn test_existing_files_not_reported_until_edited() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.rs");
    fs::write(&path, "// v1\n").unwrap();

    let mut watcher = SourceWatcher::new(temp.path(), "rs", SETTLE).unwrap();
    let existing = watcher.scan_existing().unwrap();
    assert_eq!(existing.len(), 1);

    // Make sure the edit gets a strictly newer timestamp on coarse filesystems.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    fs::write(&path, "// v2\n").unwrap();

    let change = timeout(Duration::from_secs(5), watcher.next_change())
        .await
        .expect("no change reported")
        .expect("watcher closed");
    assert_eq!(change.source.text, "// v2\n");
}
