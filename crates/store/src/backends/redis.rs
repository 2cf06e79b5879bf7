//! Redis-backed post store.
//!
//! Records live in hashes under `post:{id}` with a native TTL, so Redis
//! itself retires expired posts. The four indexes are sorted sets:
//!
//! - `posts:active` scored by creation time
//! - `posts:expiring` scored by predicted expiry time
//! - `posts:rank:views` and `posts:rank:recs` scored by counter value
//!
//! Every read-modify-write runs as a Lua script so counter updates,
//! status checks and lifetime extensions are one atomic step. Each
//! script starts with an EXISTS guard because a bare HINCRBY would
//! resurrect an expired record as a one-field hash.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ActivePage, ExtensionPolicy, PostStore};
use async_trait::async_trait;
use ember_core::{Post, PostId, PostStatus, RankKind, RecommendOutcome, ReportOutcome};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

/// Counts a view and rewrites the view rank score.
/// KEYS: record, rank:views. ARGV: id.
const VIEW_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {-1, -1}
end
local views = redis.call('HINCRBY', KEYS[1], 'views', 1)
redis.call('ZADD', KEYS[2], views, ARGV[1])
return {views, redis.call('TTL', KEYS[1])}
"#;

/// Counts a recommendation, extending the lifetime on threshold multiples.
/// KEYS: record, rank:recs, expiring. ARGV: id, threshold, extension_secs, now_ts.
/// Returns {code, recs, ttl, extended} where code is -1 missing, 1 blinded, 0 counted.
const RECOMMEND_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {-1, 0, 0, 0}
end
if redis.call('HGET', KEYS[1], 'status') == 'blinded' then
  local recs = tonumber(redis.call('HGET', KEYS[1], 'recommendations'))
  return {1, recs, redis.call('TTL', KEYS[1]), 0}
end
local recs = redis.call('HINCRBY', KEYS[1], 'recommendations', 1)
local ttl = redis.call('TTL', KEYS[1])
local extended = 0
if recs % tonumber(ARGV[2]) == 0 and ttl > 0 then
  ttl = ttl + tonumber(ARGV[3])
  redis.call('EXPIRE', KEYS[1], ttl)
  redis.call('ZADD', KEYS[3], tonumber(ARGV[4]) + ttl, ARGV[1])
  extended = 1
end
redis.call('ZADD', KEYS[2], recs, ARGV[1])
return {0, recs, ttl, extended}
"#;

/// Counts a report and blinds the post at the threshold. HSET does not
/// touch the key's TTL, so blinding never changes the lifetime.
/// KEYS: record. ARGV: blind_threshold.
const REPORT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {-1, -1}
end
local reports = redis.call('HINCRBY', KEYS[1], 'reports', 1)
local blinded = 0
if reports >= tonumber(ARGV[1]) then
  redis.call('HSET', KEYS[1], 'status', 'blinded')
  blinded = 1
end
return {reports, blinded}
"#;

/// Writes the tags field if the record still exists.
/// KEYS: record. ARGV: tags as a JSON array string.
const TAGS_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], 'tags', ARGV[1])
return 1
"#;

/// Redis post store.
pub struct RedisStore {
    manager: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
    active_key: String,
    expiring_key: String,
    rank_views_key: String,
    rank_recs_key: String,
    view_script: Script,
    recommend_script: Script,
    report_script: Script,
    tags_script: Script,
}

impl RedisStore {
    /// Connect to Redis and prepare the scripts.
    pub async fn connect(
        url: &str,
        prefix: Option<String>,
        op_timeout: Duration,
    ) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(classify)?;
        let manager = ConnectionManager::new(client).await.map_err(classify)?;
        let prefix = match prefix {
            Some(p) if !p.is_empty() => format!("{p}:"),
            _ => String::new(),
        };
        Ok(Self {
            active_key: format!("{prefix}posts:active"),
            expiring_key: format!("{prefix}posts:expiring"),
            rank_views_key: format!("{prefix}posts:rank:views"),
            rank_recs_key: format!("{prefix}posts:rank:recs"),
            manager,
            prefix,
            op_timeout,
            view_script: Script::new(VIEW_SCRIPT),
            recommend_script: Script::new(RECOMMEND_SCRIPT),
            report_script: Script::new(REPORT_SCRIPT),
            tags_script: Script::new(TAGS_SCRIPT),
        })
    }

    fn record_key(&self, id: &PostId) -> String {
        format!("{}post:{}", self.prefix, id)
    }

    fn rank_key(&self, kind: RankKind) -> &str {
        match kind {
            RankKind::Views => &self.rank_views_key,
            RankKind::Recs => &self.rank_recs_key,
        }
    }

    /// Run a redis future under the per-operation timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(res) => res.map_err(classify),
            Err(_) => Err(StoreError::Unavailable(format!(
                "{op} timed out after {:?}",
                self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl PostStore for RedisStore {
    #[instrument(skip(self, post), fields(backend = "redis", post_id = %post.id))]
    async fn create(&self, post: &Post) -> StoreResult<()> {
        if post.ttl_seconds == 0 {
            return Err(StoreError::Config(
                "post lifetime must be positive".to_string(),
            ));
        }
        let record_key = self.record_key(&post.id);
        let created_at = post
            .created_at
            .format(&Rfc3339)
            .map_err(|e| StoreError::Data(format!("post {}: created_at: {e}", post.id)))?;
        let tags = serde_json::to_string(&post.tags)
            .map_err(|e| StoreError::Data(format!("post {}: tags: {e}", post.id)))?;
        let fields: [(&str, String); 9] = [
            ("id", post.id.as_str().to_string()),
            ("content", post.content.clone()),
            ("created_at", created_at),
            ("created_ts", post.created_ts().to_string()),
            ("tags", tags),
            ("views", post.views.to_string()),
            ("recommendations", post.recommendations.to_string()),
            ("reports", post.reports.to_string()),
            ("status", post.status.as_str().to_string()),
        ];

        let ttl = post.ttl_seconds as i64;
        let created_ts = post.created_ts();
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&record_key, &fields)
            .ignore()
            .expire(&record_key, ttl)
            .ignore()
            .zadd(&self.active_key, post.id.as_str(), created_ts)
            .ignore()
            .zadd(&self.expiring_key, post.id.as_str(), created_ts + ttl)
            .ignore()
            .zadd(&self.rank_views_key, post.id.as_str(), 0)
            .ignore()
            .zadd(&self.rank_recs_key, post.id.as_str(), 0)
            .ignore();
        self.bounded("create", pipe.query_async(&mut conn)).await
    }

    #[instrument(skip(self), fields(backend = "redis", post_id = %id))]
    async fn fetch(&self, id: &PostId) -> StoreResult<Option<Post>> {
        let record_key = self.record_key(id);
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().hgetall(&record_key).ttl(&record_key);
        let (map, ttl): (HashMap<String, String>, i64) = self
            .bounded("fetch", pipe.query_async(&mut conn))
            .await?;
        if map.is_empty() {
            return Ok(None);
        }
        post_from_map(id, &map, ttl).map(Some)
    }

    #[instrument(skip(self), fields(backend = "redis", post_id = %id))]
    async fn bump_views(&self, id: &PostId) -> StoreResult<(u64, u64)> {
        let record_key = self.record_key(id);
        let mut conn = self.manager.clone();
        let (views, ttl): (i64, i64) = self
            .bounded(
                "bump_views",
                self.view_script
                    .key(&record_key)
                    .key(&self.rank_views_key)
                    .arg(id.as_str())
                    .invoke_async(&mut conn),
            )
            .await?;
        if views == -1 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok((views as u64, ttl.max(0) as u64))
    }

    #[instrument(skip(self, policy), fields(backend = "redis", post_id = %id))]
    async fn recommend(
        &self,
        id: &PostId,
        policy: &ExtensionPolicy,
    ) -> StoreResult<RecommendOutcome> {
        let record_key = self.record_key(id);
        let now_ts = OffsetDateTime::now_utc().unix_timestamp();
        let mut conn = self.manager.clone();
        let (code, recs, ttl, extended): (i64, i64, i64, i64) = self
            .bounded(
                "recommend",
                self.recommend_script
                    .key(&record_key)
                    .key(&self.rank_recs_key)
                    .key(&self.expiring_key)
                    .arg(id.as_str())
                    .arg(policy.threshold)
                    .arg(policy.extension.whole_seconds())
                    .arg(now_ts)
                    .invoke_async(&mut conn),
            )
            .await?;
        if code == -1 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(RecommendOutcome {
            accepted: code == 0,
            recommendations: recs.max(0) as u64,
            ttl_seconds: ttl.max(0) as u64,
            extended: extended == 1,
        })
    }

    #[instrument(skip(self), fields(backend = "redis", post_id = %id))]
    async fn report(&self, id: &PostId, blind_threshold: u64) -> StoreResult<ReportOutcome> {
        let record_key = self.record_key(id);
        let mut conn = self.manager.clone();
        let (reports, blinded): (i64, i64) = self
            .bounded(
                "report",
                self.report_script
                    .key(&record_key)
                    .arg(blind_threshold)
                    .invoke_async(&mut conn),
            )
            .await?;
        if reports == -1 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(ReportOutcome {
            reports: reports as u64,
            blinded: blinded == 1,
        })
    }

    #[instrument(skip(self, tags), fields(backend = "redis", post_id = %id))]
    async fn write_tags(&self, id: &PostId, tags: &[String]) -> StoreResult<bool> {
        let record_key = self.record_key(id);
        let encoded = serde_json::to_string(tags)
            .map_err(|e| StoreError::Data(format!("post {id}: tags: {e}")))?;
        let mut conn = self.manager.clone();
        let written: i64 = self
            .bounded(
                "write_tags",
                self.tags_script
                    .key(&record_key)
                    .arg(encoded)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(written == 1)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn active_page(&self, offset: u64, count: u64) -> StoreResult<ActivePage> {
        let mut conn = self.manager.clone();
        if count == 0 {
            let total: u64 = self
                .bounded("active_page", conn.zcard(&self.active_key))
                .await?;
            return Ok(ActivePage {
                ids: Vec::new(),
                total,
            });
        }
        let start = offset as isize;
        let stop = (offset + count - 1) as isize;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrevrange(&self.active_key, start, stop)
            .zcard(&self.active_key);
        let (members, total): (Vec<String>, u64) = self
            .bounded("active_page", pipe.query_async(&mut conn))
            .await?;
        let ids = members
            .iter()
            .map(|m| {
                PostId::parse(m).map_err(|e| StoreError::Data(format!("active index: {e}")))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(ActivePage { ids, total })
    }

    #[instrument(skip(self), fields(backend = "redis", kind = %kind))]
    async fn ranking_page(&self, kind: RankKind, limit: u64) -> StoreResult<Vec<(PostId, u64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let key = self.rank_key(kind);
        let mut conn = self.manager.clone();
        let scored: Vec<(String, f64)> = self
            .bounded(
                "ranking_page",
                conn.zrevrange_withscores(key, 0, (limit - 1) as isize),
            )
            .await?;
        scored
            .into_iter()
            .map(|(member, score)| {
                let id = PostId::parse(&member)
                    .map_err(|e| StoreError::Data(format!("rank index: {e}")))?;
                Ok((id, score.max(0.0) as u64))
            })
            .collect()
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn expiring_before(&self, deadline: OffsetDateTime) -> StoreResult<Vec<PostId>> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = self
            .bounded(
                "expiring_before",
                conn.zrangebyscore(&self.expiring_key, "-inf", deadline.unix_timestamp()),
            )
            .await?;
        members
            .iter()
            .map(|m| {
                PostId::parse(m).map_err(|e| StoreError::Data(format!("expiring index: {e}")))
            })
            .collect()
    }

    #[instrument(skip(self, ids), fields(backend = "redis", count = ids.len()))]
    async fn prune_index_entries(&self, ids: &[PostId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let members: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        let mut conn = self.manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrem(&self.active_key, &members)
            .ignore()
            .zrem(&self.expiring_key, &members)
            .ignore()
            .zrem(&self.rank_views_key, &members)
            .ignore()
            .zrem(&self.rank_recs_key, &members)
            .ignore();
        self.bounded("prune_index_entries", pipe.query_async(&mut conn))
            .await
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let _: String = self
            .bounded("health_check", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn classify(e: redis::RedisError) -> StoreError {
    if e.is_io_error() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Redis(e)
    }
}

/// Build a post from its hash fields plus the TTL read in the same
/// transaction. Missing or malformed fields are corruption, not absence.
fn post_from_map(id: &PostId, map: &HashMap<String, String>, ttl: i64) -> StoreResult<Post> {
    let field = |name: &str| -> StoreResult<&String> {
        map.get(name)
            .ok_or_else(|| StoreError::Data(format!("post {id}: missing field {name}")))
    };
    let counter = |name: &str| -> StoreResult<u64> {
        field(name)?
            .parse::<u64>()
            .map_err(|e| StoreError::Data(format!("post {id}: field {name}: {e}")))
    };
    let created_at = OffsetDateTime::parse(field("created_at")?, &Rfc3339)
        .map_err(|e| StoreError::Data(format!("post {id}: field created_at: {e}")))?;
    let tags: Vec<String> = serde_json::from_str(field("tags")?)
        .map_err(|e| StoreError::Data(format!("post {id}: field tags: {e}")))?;
    let status = PostStatus::parse(field("status")?)
        .map_err(|e| StoreError::Data(format!("post {id}: {e}")))?;
    Ok(Post {
        id: id.clone(),
        content: field("content")?.clone(),
        created_at,
        tags,
        views: counter("views")?,
        recommendations: counter("recommendations")?,
        reports: counter("reports")?,
        status,
        ttl_seconds: ttl.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map(id: &PostId) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), id.as_str().to_string());
        map.insert("content".to_string(), "hello".to_string());
        map.insert(
            "created_at".to_string(),
            "2026-01-05T12:00:00Z".to_string(),
        );
        map.insert("created_ts".to_string(), "1767614400".to_string());
        map.insert("tags".to_string(), r#"["a","b"]"#.to_string());
        map.insert("views".to_string(), "3".to_string());
        map.insert("recommendations".to_string(), "7".to_string());
        map.insert("reports".to_string(), "1".to_string());
        map.insert("status".to_string(), "active".to_string());
        map
    }

    #[test]
    fn test_post_from_map_roundtrip() {
        let id = PostId::generate();
        let post = post_from_map(&id, &sample_map(&id), 42).unwrap();
        assert_eq!(post.id, id);
        assert_eq!(post.content, "hello");
        assert_eq!(post.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(post.views, 3);
        assert_eq!(post.recommendations, 7);
        assert_eq!(post.reports, 1);
        assert_eq!(post.status, PostStatus::Active);
        assert_eq!(post.ttl_seconds, 42);
    }

    #[test]
    fn test_post_from_map_clamps_negative_ttl() {
        let id = PostId::generate();
        let post = post_from_map(&id, &sample_map(&id), -2).unwrap();
        assert_eq!(post.ttl_seconds, 0);
    }

    #[test]
    fn test_post_from_map_missing_field_is_data_error() {
        let id = PostId::generate();
        let mut map = sample_map(&id);
        map.remove("status");
        match post_from_map(&id, &map, 10) {
            Err(StoreError::Data(msg)) => assert!(msg.contains("status")),
            other => panic!("expected data error, got {other:?}"),
        }
    }

    #[test]
    fn test_post_from_map_rejects_bad_counter() {
        let id = PostId::generate();
        let mut map = sample_map(&id);
        map.insert("views".to_string(), "many".to_string());
        assert!(matches!(
            post_from_map(&id, &map, 10),
            Err(StoreError::Data(_))
        ));
    }
}
