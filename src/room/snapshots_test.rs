use super::*;
use crate::store::{MemoryStore, StatePath};
use serde_json::json;
use tokio::time::{Duration, timeout};

fn shared(store: &MemoryStore) -> Arc<dyn SharedState> {
    Arc::new(store.connect())
}

fn paths() -> RoomPaths {
    RoomPaths::new("room01").unwrap()
}

async fn next_snapshots(manager: &mut SnapshotManager) -> Vec<Snapshot> {
    timeout(Duration::from_millis(200), manager.next_change())
        .await
        .expect("snapshot update timed out")
        .expect("snapshot subscription closed")
        .to_vec()
}

async fn next_files(docs: &mut DocumentSync) -> Vec<FileEntry> {
    timeout(Duration::from_millis(200), docs.next_change())
        .await
        .expect("file update timed out")
        .expect("file subscription closed")
        .to_vec()
}

#[tokio::test]
async fn save_records_user_time_and_files() {
    let store = MemoryStore::new();
    let mut manager = SnapshotManager::new(shared(&store), paths(), "User-abcd");
    manager.open().await.unwrap();

    let files = vec![
        FileEntry { id: "f1".into(), name: "main.py".into(), content: "print(1)".into() },
        FileEntry { id: "f2".into(), name: "util.py".into(), content: String::new() },
    ];
    let before = now_ms();
    let id = manager.save_snapshot(&files).await.unwrap();

    let list = next_snapshots(&mut manager).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
    assert_eq!(list[0].user, "User-abcd");
    assert!(list[0].created_at >= before);
    assert_eq!(
        list[0].files,
        vec![
            FileBody { name: "main.py".into(), content: "print(1)".into() },
            FileBody { name: "util.py".into(), content: String::new() },
        ]
    );
}

#[tokio::test]
async fn snapshots_are_sorted_newest_first() {
    let store = MemoryStore::new();
    let writer = store.connect();
    let versions = StatePath::parse("rooms/room01/versions").unwrap();
    for (key, ts) in [("a", 2000), ("b", 3000), ("c", 1000)] {
        writer
            .write(&versions.child(key).unwrap(), json!({"user": "u", "createdAt": ts, "files": []}))
            .await
            .unwrap();
    }

    let mut manager = SnapshotManager::new(shared(&store), paths(), "User-x");
    manager.open().await.unwrap();
    let ids: Vec<&str> = manager.snapshots().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["b", "a", "c"]);
}

#[tokio::test]
async fn restore_replaces_file_set_with_fresh_ids() {
    let store = MemoryStore::new();
    let mut docs = DocumentSync::new(shared(&store), paths());
    docs.open().await.unwrap();
    let old_id = docs.create_file("old.py").await.unwrap().unwrap();
    let _ = next_files(&mut docs).await;

    let snapshot = Snapshot {
        id: "snap".into(),
        user: "User-x".into(),
        created_at: 1,
        files: vec![
            FileBody { name: "a.py".into(), content: "A".into() },
            FileBody { name: "b.py".into(), content: "B".into() },
        ],
    };
    let manager = SnapshotManager::new(shared(&store), paths(), "User-x");
    manager.restore_snapshot(&snapshot, &mut docs).await.unwrap();
    assert!(docs.active_id().is_none());

    // wipe, then one push per file
    assert!(next_files(&mut docs).await.is_empty());
    let _ = next_files(&mut docs).await;
    let files = next_files(&mut docs).await;

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["a.py", "b.py"]);
    assert!(files.iter().all(|f| f.id != old_id));
    assert_eq!(files[1].content, "B");
    assert_eq!(docs.active_id(), Some(files[0].id.as_str()));
}

#[tokio::test]
async fn snapshot_survives_later_edits() {
    let store = MemoryStore::new();
    let mut docs = DocumentSync::new(shared(&store), paths());
    docs.open().await.unwrap();
    let id = docs.create_file("main.py").await.unwrap().unwrap();
    let _ = next_files(&mut docs).await;
    docs.update_content(&id, "v1").unwrap();

    let mut manager = SnapshotManager::new(shared(&store), paths(), "User-x");
    manager.open().await.unwrap();
    manager.save_snapshot(docs.files()).await.unwrap();
    let _ = next_snapshots(&mut manager).await;

    docs.update_content(&id, "v2").unwrap();
    tokio::task::yield_now().await;
    assert_eq!(manager.snapshots()[0].files[0].content, "v1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pending_edits_do_not_survive_restore() {
    let store = MemoryStore::new();
    let mut docs = DocumentSync::new(shared(&store), paths());
    docs.open().await.unwrap();
    let old_id = docs.create_file("old.py").await.unwrap().unwrap();
    for i in 0..20 {
        docs.update_content(&old_id, &"x".repeat(i)).unwrap();
    }

    let snapshot = Snapshot {
        id: "snap".into(),
        user: "User-x".into(),
        created_at: 1,
        files: vec![FileBody { name: "a.py".into(), content: "A".into() }],
    };
    let manager = SnapshotManager::new(shared(&store), paths(), "User-x");
    manager.restore_snapshot(&snapshot, &mut docs).await.unwrap();
    docs.flush().await;

    let reader = store.connect();
    let old = StatePath::parse(&format!("rooms/room01/files/{old_id}")).unwrap();
    assert_eq!(reader.read(&old).await.unwrap(), None);
    let files = reader.read(&StatePath::parse("rooms/room01/files").unwrap()).await.unwrap().unwrap();
    assert_eq!(files.as_object().map(serde_json::Map::len), Some(1));
}
