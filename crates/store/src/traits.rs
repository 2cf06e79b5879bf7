//! Post store trait definitions.

use crate::error::StoreResult;
use async_trait::async_trait;
use ember_core::{Post, PostId, RankKind, RecommendOutcome, ReportOutcome};
use time::{Duration, OffsetDateTime};

/// Lifetime extension policy applied by [`PostStore::recommend`].
///
/// Built from the board configuration so the store stays free of
/// config parsing concerns.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionPolicy {
    /// Extend at every exact multiple of this recommendation count.
    pub threshold: u64,
    /// How much lifetime each extension adds.
    pub extension: Duration,
}

/// One page of the active listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivePage {
    /// Post ids, newest first.
    pub ids: Vec<PostId>,
    /// Total number of entries in the active index.
    pub total: u64,
}

/// Storage behind the board.
///
/// Expiry is the backend's concern: an expired post is indistinguishable
/// from one that never existed. Methods that mutate a post never
/// resurrect a dead record. Index entries may briefly outlive their
/// record between sweeps; readers resolve that by hydrating through
/// [`PostStore::fetch`] or [`PostStore::bump_views`] and skipping misses.
#[async_trait]
pub trait PostStore: Send + Sync + 'static {
    /// Persist a fresh post and seed every index in one atomic batch.
    ///
    /// The record gets the post's `ttl_seconds` as its lifetime. The
    /// active index scores by creation time, the expiring index by the
    /// predicted expiry time, and both rank indexes start at zero.
    async fn create(&self, post: &Post) -> StoreResult<()>;

    /// Read a post without counting a view.
    ///
    /// Returns `Ok(None)` when the post is expired or never existed.
    /// `ttl_seconds` in the returned post reflects the remaining
    /// lifetime at read time.
    async fn fetch(&self, id: &PostId) -> StoreResult<Option<Post>>;

    /// Count one view and refresh the view ranking.
    ///
    /// Returns the view count after the increment and the remaining
    /// lifetime in seconds. Fails with `NotFound` when the post is
    /// gone; status never blocks a view.
    async fn bump_views(&self, id: &PostId) -> StoreResult<(u64, u64)>;

    /// Count one recommendation, extending the lifetime when the new
    /// count lands on a multiple of `policy.threshold`.
    ///
    /// Blinded posts reject the recommendation (`accepted == false`)
    /// and keep their count. Extension only applies while the post is
    /// still alive, and rewrites the expiring index score to the new
    /// predicted expiry. Fails with `NotFound` when the post is gone.
    async fn recommend(
        &self,
        id: &PostId,
        policy: &ExtensionPolicy,
    ) -> StoreResult<RecommendOutcome>;

    /// Count one report, blinding the post once the count reaches
    /// `blind_threshold`.
    ///
    /// The count keeps accruing after blinding. `blinded` in the
    /// outcome reflects the status after this operation. Fails with
    /// `NotFound` when the post is gone.
    async fn report(&self, id: &PostId, blind_threshold: u64) -> StoreResult<ReportOutcome>;

    /// Attach tags to an existing post.
    ///
    /// Must not touch counters, status or the remaining lifetime.
    /// Returns `false` when the post expired in the meantime.
    async fn write_tags(&self, id: &PostId, tags: &[String]) -> StoreResult<bool>;

    /// Page through the active index, newest first.
    async fn active_page(&self, offset: u64, count: u64) -> StoreResult<ActivePage>;

    /// Read the top of a rank index, highest score first.
    async fn ranking_page(&self, kind: RankKind, limit: u64) -> StoreResult<Vec<(PostId, u64)>>;

    /// Ids whose predicted expiry lies at or before `deadline`.
    async fn expiring_before(&self, deadline: OffsetDateTime) -> StoreResult<Vec<PostId>>;

    /// Remove the given ids from all four indexes atomically.
    async fn prune_index_entries(&self, ids: &[PostId]) -> StoreResult<()>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> StoreResult<()>;

    /// Get the name of this store backend.
    ///
    /// Returns a static string identifier (e.g., "redis", "memory").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;
}
