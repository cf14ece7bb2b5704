use super::*;
use crate::store::{MemoryStore, StoreConnection};
use tokio::time::{Duration, timeout};

fn tracker(store: &MemoryStore, id: &str) -> (Arc<StoreConnection>, PresenceTracker) {
    let conn = Arc::new(store.connect());
    let paths = RoomPaths::new("room01").unwrap();
    let identity = SessionIdentity::from_parts(id, "#3b82f6");
    let shared: Arc<dyn SharedState> = conn.clone();
    (conn, PresenceTracker::new(shared, paths, identity))
}

async fn next_ids(tracker: &mut PresenceTracker) -> Vec<String> {
    let list = timeout(Duration::from_millis(200), tracker.next_update())
        .await
        .expect("presence update timed out")
        .expect("presence closed");
    list.iter().map(|p| p.id.clone()).collect()
}

#[tokio::test]
async fn join_lists_self() {
    let store = MemoryStore::new();
    let (_conn, mut alice) = tracker(&store, "aaaa0001");
    alice.join().await.unwrap();

    assert_eq!(alice.participants().len(), 1);
    assert_eq!(alice.participants()[0].name, "User-aaaa");
}

#[tokio::test]
async fn second_participant_is_seen_by_first() {
    let store = MemoryStore::new();
    let (_a, mut alice) = tracker(&store, "aaaa0001");
    let (_b, mut bob) = tracker(&store, "bbbb0002");
    alice.join().await.unwrap();
    bob.join().await.unwrap();

    assert_eq!(next_ids(&mut alice).await, ["aaaa0001", "bbbb0002"]);
    assert_eq!(bob.participants().len(), 2);
}

#[tokio::test]
async fn disconnect_removes_entry_for_others() {
    let store = MemoryStore::new();
    let (_a, mut alice) = tracker(&store, "aaaa0001");
    let (bob_conn, mut bob) = tracker(&store, "bbbb0002");
    alice.join().await.unwrap();
    bob.join().await.unwrap();
    assert_eq!(next_ids(&mut alice).await.len(), 2);

    bob_conn.disconnect();
    assert_eq!(next_ids(&mut alice).await, ["aaaa0001"]);
}

#[tokio::test]
async fn leave_removes_entry_immediately() {
    let store = MemoryStore::new();
    let (_a, mut alice) = tracker(&store, "aaaa0001");
    let (_b, mut bob) = tracker(&store, "bbbb0002");
    alice.join().await.unwrap();
    bob.join().await.unwrap();
    assert_eq!(next_ids(&mut alice).await.len(), 2);

    bob.leave().await.unwrap();
    assert!(bob.participants().is_empty());
    assert_eq!(next_ids(&mut alice).await, ["aaaa0001"]);
}

#[tokio::test]
async fn next_update_before_join_is_none() {
    let store = MemoryStore::new();
    let (_conn, mut alice) = tracker(&store, "aaaa0001");
    assert!(alice.next_update().await.is_none());
}
