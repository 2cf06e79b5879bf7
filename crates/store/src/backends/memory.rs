//! In-memory post store.
//!
//! Mirrors the redis backend's semantics on plain maps: records expire
//! lazily when a read or write finds them past their deadline, while
//! index entries stay behind for the sweeper to prune, exactly like a
//! TTL'd redis hash outliving its sorted-set members. Intended for
//! tests and single-node development.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ActivePage, ExtensionPolicy, PostStore};
use async_trait::async_trait;
use ember_core::{Post, PostId, PostStatus, RankKind, RecommendOutcome, ReportOutcome};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::{Duration, OffsetDateTime};

struct Record {
    post: Post,
    deadline: OffsetDateTime,
}

#[derive(Default)]
struct Indexes {
    active: HashMap<PostId, i64>,
    expiring: HashMap<PostId, i64>,
    rank_views: HashMap<PostId, i64>,
    rank_recs: HashMap<PostId, i64>,
}

impl Indexes {
    fn rank(&self, kind: RankKind) -> &HashMap<PostId, i64> {
        match kind {
            RankKind::Views => &self.rank_views,
            RankKind::Recs => &self.rank_recs,
        }
    }
}

#[derive(Default)]
struct State {
    records: HashMap<PostId, Record>,
    indexes: Indexes,
}

/// In-memory post store.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("memory store mutex was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, post: &Post) -> StoreResult<()> {
        if post.ttl_seconds == 0 {
            return Err(StoreError::Config(
                "post lifetime must be positive".to_string(),
            ));
        }
        let now = OffsetDateTime::now_utc();
        let ttl = post.ttl_seconds as i64;
        let mut guard = self.lock();
        let state = &mut *guard;
        let id = post.id.clone();
        state.indexes.active.insert(id.clone(), post.created_ts());
        state
            .indexes
            .expiring
            .insert(id.clone(), post.created_ts() + ttl);
        state
            .indexes
            .rank_views
            .insert(id.clone(), post.views as i64);
        state
            .indexes
            .rank_recs
            .insert(id.clone(), post.recommendations as i64);
        state.records.insert(
            id,
            Record {
                post: post.clone(),
                deadline: now + Duration::seconds(ttl),
            },
        );
        Ok(())
    }

    async fn fetch(&self, id: &PostId) -> StoreResult<Option<Post>> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock();
        let State { records, .. } = &mut *guard;
        Ok(live_record(records, id, now).map(|record| snapshot(record, now)))
    }

    async fn bump_views(&self, id: &PostId) -> StoreResult<(u64, u64)> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock();
        let State { records, indexes } = &mut *guard;
        let record = live_record(records, id, now)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.post.views += 1;
        indexes.rank_views.insert(id.clone(), record.post.views as i64);
        Ok((record.post.views, remaining_secs(record.deadline, now) as u64))
    }

    async fn recommend(
        &self,
        id: &PostId,
        policy: &ExtensionPolicy,
    ) -> StoreResult<RecommendOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock();
        let State { records, indexes } = &mut *guard;
        let record = live_record(records, id, now)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if record.post.status == PostStatus::Blinded {
            return Ok(RecommendOutcome {
                accepted: false,
                recommendations: record.post.recommendations,
                ttl_seconds: remaining_secs(record.deadline, now) as u64,
                extended: false,
            });
        }
        record.post.recommendations += 1;
        let mut ttl = remaining_secs(record.deadline, now);
        let mut extended = false;
        if policy.threshold > 0
            && record.post.recommendations % policy.threshold == 0
            && ttl > 0
        {
            record.deadline += policy.extension;
            ttl += policy.extension.whole_seconds();
            indexes
                .expiring
                .insert(id.clone(), now.unix_timestamp() + ttl);
            extended = true;
        }
        indexes
            .rank_recs
            .insert(id.clone(), record.post.recommendations as i64);
        Ok(RecommendOutcome {
            accepted: true,
            recommendations: record.post.recommendations,
            ttl_seconds: ttl.max(0) as u64,
            extended,
        })
    }

    async fn report(&self, id: &PostId, blind_threshold: u64) -> StoreResult<ReportOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock();
        let State { records, .. } = &mut *guard;
        let record = live_record(records, id, now)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.post.reports += 1;
        if record.post.reports >= blind_threshold {
            record.post.status = PostStatus::Blinded;
        }
        Ok(ReportOutcome {
            reports: record.post.reports,
            blinded: record.post.status == PostStatus::Blinded,
        })
    }

    async fn write_tags(&self, id: &PostId, tags: &[String]) -> StoreResult<bool> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.lock();
        let State { records, .. } = &mut *guard;
        match live_record(records, id, now) {
            Some(record) => {
                record.post.tags = tags.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_page(&self, offset: u64, count: u64) -> StoreResult<ActivePage> {
        let guard = self.lock();
        let mut entries: Vec<(&PostId, &i64)> = guard.indexes.active.iter().collect();
        // Highest score first, ties broken like ZREVRANGE (reverse lex)
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));
        let total = entries.len() as u64;
        let ids = entries
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .map(|(id, _)| id.clone())
            .collect();
        Ok(ActivePage { ids, total })
    }

    async fn ranking_page(&self, kind: RankKind, limit: u64) -> StoreResult<Vec<(PostId, u64)>> {
        let guard = self.lock();
        let mut entries: Vec<(&PostId, &i64)> = guard.indexes.rank(kind).iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));
        Ok(entries
            .into_iter()
            .take(limit as usize)
            .map(|(id, score)| (id.clone(), (*score).max(0) as u64))
            .collect())
    }

    async fn expiring_before(&self, deadline: OffsetDateTime) -> StoreResult<Vec<PostId>> {
        let deadline_ts = deadline.unix_timestamp();
        let guard = self.lock();
        let mut entries: Vec<(&PostId, &i64)> = guard
            .indexes
            .expiring
            .iter()
            .filter(|(_, score)| **score <= deadline_ts)
            .collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        Ok(entries.into_iter().map(|(id, _)| id.clone()).collect())
    }

    async fn prune_index_entries(&self, ids: &[PostId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock();
        for id in ids {
            guard.indexes.active.remove(id);
            guard.indexes.expiring.remove(id);
            guard.indexes.rank_views.remove(id);
            guard.indexes.rank_recs.remove(id);
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Look up a record, removing it first if its deadline has passed.
/// Index entries are left for the sweeper, matching redis TTL behavior.
fn live_record<'a>(
    records: &'a mut HashMap<PostId, Record>,
    id: &PostId,
    now: OffsetDateTime,
) -> Option<&'a mut Record> {
    if let Some(record) = records.get(id)
        && record.deadline <= now
    {
        records.remove(id);
        return None;
    }
    records.get_mut(id)
}

fn snapshot(record: &Record, now: OffsetDateTime) -> Post {
    let mut post = record.post.clone();
    post.ttl_seconds = remaining_secs(record.deadline, now) as u64;
    post
}

/// Remaining whole seconds until `deadline`, rounding partial seconds
/// up the way redis TTL reports them. Never negative.
fn remaining_secs(deadline: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let remaining = deadline - now;
    let mut secs = remaining.whole_seconds();
    if remaining.is_positive() && remaining.subsec_nanoseconds() > 0 {
        secs += 1;
    }
    secs.max(0)
}
