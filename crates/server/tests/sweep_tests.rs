//! Integration tests for the expiry sweeper.

use async_trait::async_trait;
use ember_core::{Post, PostId, RankKind, RecommendOutcome, ReportOutcome};
use ember_server::sweep::{spawn_sweeper, sweep_once};
use ember_store::{
    ActivePage, ExtensionPolicy, MemoryStore, PostStore, StoreError, StoreResult,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;

/// Create a post whose predicted expiry already lies in the past while
/// its record is still alive. This is exactly the index staleness the
/// sweeper exists to clean up.
async fn create_stale(store: &dyn PostStore, content: &str) -> PostId {
    let mut post = Post::new(content.to_string(), Duration::seconds(60));
    post.created_at = OffsetDateTime::now_utc() - Duration::hours(2);
    store.create(&post).await.unwrap();
    post.id
}

async fn create_fresh(store: &dyn PostStore, content: &str) -> PostId {
    let post = Post::new(content.to_string(), Duration::seconds(600));
    store.create(&post).await.unwrap();
    post.id
}

#[tokio::test]
async fn test_sweep_once_prunes_stale_entries() {
    let store = MemoryStore::new();
    let stale = create_stale(&store, "stale").await;
    let fresh = create_fresh(&store, "fresh").await;

    let pruned = sweep_once(&store, OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(pruned, 1);

    let page = store.active_page(0, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.ids, vec![fresh.clone()]);

    let ranking = store.ranking_page(RankKind::Views, 10).await.unwrap();
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].0, fresh);

    // The sweep prunes indexes only; record lifetimes are the backend's
    assert!(store.fetch(&stale).await.unwrap().is_some());

    // Nothing stale remains for a second pass
    let pruned = sweep_once(&store, OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(pruned, 0);
}

#[tokio::test]
async fn test_sweep_once_on_empty_store() {
    let store = MemoryStore::new();
    let pruned = sweep_once(&store, OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(pruned, 0);
}

#[tokio::test]
async fn test_sweeper_prunes_on_ticks() {
    let store: Arc<dyn PostStore> = Arc::new(MemoryStore::new());
    create_stale(store.as_ref(), "stale").await;
    let fresh = create_fresh(store.as_ref(), "fresh").await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_sweeper(
        store.clone(),
        std::time::Duration::from_millis(20),
        shutdown_rx,
    );

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    loop {
        let page = store.active_page(0, 10).await.unwrap();
        if page.total == 1 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sweeper never pruned the stale entry"
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();

    let page = store.active_page(0, 10).await.unwrap();
    assert_eq!(page.ids, vec![fresh]);
}

#[tokio::test]
async fn test_sweeper_stops_when_sender_drops() {
    let store: Arc<dyn PostStore> = Arc::new(MemoryStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_sweeper(
        store,
        std::time::Duration::from_millis(10),
        shutdown_rx,
    );

    drop(shutdown_tx);
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}

/// Delegates to a memory store but refuses every expiry scan.
struct FailingStore {
    inner: MemoryStore,
}

#[async_trait]
impl PostStore for FailingStore {
    async fn create(&self, post: &Post) -> StoreResult<()> {
        self.inner.create(post).await
    }

    async fn fetch(&self, id: &PostId) -> StoreResult<Option<Post>> {
        self.inner.fetch(id).await
    }

    async fn bump_views(&self, id: &PostId) -> StoreResult<(u64, u64)> {
        self.inner.bump_views(id).await
    }

    async fn recommend(
        &self,
        id: &PostId,
        policy: &ExtensionPolicy,
    ) -> StoreResult<RecommendOutcome> {
        self.inner.recommend(id, policy).await
    }

    async fn report(&self, id: &PostId, blind_threshold: u64) -> StoreResult<ReportOutcome> {
        self.inner.report(id, blind_threshold).await
    }

    async fn write_tags(&self, id: &PostId, tags: &[String]) -> StoreResult<bool> {
        self.inner.write_tags(id, tags).await
    }

    async fn active_page(&self, offset: u64, count: u64) -> StoreResult<ActivePage> {
        self.inner.active_page(offset, count).await
    }

    async fn ranking_page(&self, kind: RankKind, limit: u64) -> StoreResult<Vec<(PostId, u64)>> {
        self.inner.ranking_page(kind, limit).await
    }

    async fn expiring_before(&self, _deadline: OffsetDateTime) -> StoreResult<Vec<PostId>> {
        Err(StoreError::Unavailable("expiry scan refused".to_string()))
    }

    async fn prune_index_entries(&self, ids: &[PostId]) -> StoreResult<()> {
        self.inner.prune_index_entries(ids).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_sweeper_survives_scan_failures() {
    let store: Arc<dyn PostStore> = Arc::new(FailingStore {
        inner: MemoryStore::new(),
    });
    create_stale(store.as_ref(), "stale").await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_sweeper(
        store.clone(),
        std::time::Duration::from_millis(10),
        shutdown_rx,
    );

    // Let several failing ticks elapse
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();

    // Failed scans must not prune anything
    let page = store.active_page(0, 10).await.unwrap();
    assert_eq!(page.total, 1);
}
