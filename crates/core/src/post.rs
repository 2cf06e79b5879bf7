//! Post types: identifiers, statuses, the post record and counter outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Prefix every post identifier carries.
const ID_PREFIX: &str = "post_";

/// Number of hex characters following the prefix.
const ID_HEX_LEN: usize = 12;

/// Unique identifier for a post.
///
/// Rendered as `post_` followed by the first 12 hex characters of a
/// random UUID, e.g. `post_3fa4c81be02d`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Generate a new random post ID.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("{ID_PREFIX}{}", &hex[..ID_HEX_LEN]))
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let suffix = s
            .strip_prefix(ID_PREFIX)
            .ok_or_else(|| crate::Error::InvalidPostId(format!("missing prefix: {s}")))?;
        if suffix.len() != ID_HEX_LEN || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidPostId(format!(
                "expected {ID_HEX_LEN} hex characters after prefix: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostId({})", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Moderation status of a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Visible and open to recommendations.
    Active,
    /// Hidden from listings after crossing the report threshold.
    Blinded,
}

impl PostStatus {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "blinded" => Ok(Self::Blinded),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blinded => "blinded",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which leaderboard a ranking read targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankKind {
    /// Ordered by view count.
    Views,
    /// Ordered by recommendation count.
    Recs,
}

impl RankKind {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "views" => Ok(Self::Views),
            "recs" => Ok(Self::Recs),
            _ => Err(crate::Error::UnknownRankKind(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Recs => "recs",
        }
    }
}

impl fmt::Display for RankKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A post as served to clients.
///
/// `ttl_seconds` is a snapshot of the remaining lifetime at read time,
/// never negative. An expired post is never represented; it is simply
/// absent from the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    /// Post identifier.
    pub id: PostId,
    /// Trimmed content.
    pub content: String,
    /// When the post was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Tags attached after creation (empty until a tagger writes them).
    pub tags: Vec<String>,
    /// Number of times the post has been read.
    pub views: u64,
    /// Number of recommendations received.
    pub recommendations: u64,
    /// Number of reports received. Keeps accruing after blinding.
    pub reports: u64,
    /// Moderation status.
    pub status: PostStatus,
    /// Remaining lifetime in seconds at the time of the read.
    pub ttl_seconds: u64,
}

impl Post {
    /// Create a fresh post with zeroed counters and the given lifetime.
    ///
    /// `content` must already be validated via [`validate_content`].
    pub fn new(content: String, lifetime: Duration) -> Self {
        Self {
            id: PostId::generate(),
            content,
            created_at: OffsetDateTime::now_utc(),
            tags: Vec::new(),
            views: 0,
            recommendations: 0,
            reports: 0,
            status: PostStatus::Active,
            ttl_seconds: lifetime.whole_seconds().max(0) as u64,
        }
    }

    /// Creation time as unix seconds.
    pub fn created_ts(&self) -> i64 {
        self.created_at.unix_timestamp()
    }
}

/// Result of a recommend operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecommendOutcome {
    /// Whether the recommendation was counted. False when the post is blinded.
    pub accepted: bool,
    /// Recommendation count after the operation.
    pub recommendations: u64,
    /// Remaining lifetime in seconds after the operation.
    pub ttl_seconds: u64,
    /// Whether this recommendation crossed an extension threshold.
    pub extended: bool,
}

/// Result of a report operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Report count after the operation.
    pub reports: u64,
    /// Whether the post is blinded after the operation.
    pub blinded: bool,
}

/// Validate and normalize raw post content.
///
/// Trims surrounding whitespace, then requires 1..=[`crate::MAX_CONTENT_CHARS`]
/// characters. Returns the trimmed content.
pub fn validate_content(raw: &str) -> crate::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidContent(
            "content must not be empty".to_string(),
        ));
    }
    let chars = trimmed.chars().count();
    if chars > crate::MAX_CONTENT_CHARS {
        return Err(crate::Error::InvalidContent(format!(
            "content is {chars} characters, maximum is {}",
            crate::MAX_CONTENT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let id = PostId::generate();
        assert!(id.as_str().starts_with("post_"));
        assert_eq!(id.as_str().len(), "post_".len() + 12);
        assert!(
            id.as_str()["post_".len()..]
                .bytes()
                .all(|b| b.is_ascii_hexdigit())
        );
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = PostId::generate();
        let parsed = PostId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_parse_rejects_bad_input() {
        assert!(PostId::parse("3fa4c81be02d").is_err());
        assert!(PostId::parse("post_").is_err());
        assert!(PostId::parse("post_3fa4c81be02").is_err());
        assert!(PostId::parse("post_3fa4c81be02dz").is_err());
        assert!(PostId::parse("post_3fa4c81bg02d").is_err());
        assert!(PostId::parse("").is_err());
    }

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(PostStatus::parse("active").unwrap(), PostStatus::Active);
        assert_eq!(PostStatus::parse("blinded").unwrap(), PostStatus::Blinded);
        assert!(PostStatus::parse("deleted").is_err());
        assert_eq!(PostStatus::Active.as_str(), "active");
        assert_eq!(PostStatus::Blinded.as_str(), "blinded");
    }

    #[test]
    fn test_rank_kind_parse() {
        assert_eq!(RankKind::parse("views").unwrap(), RankKind::Views);
        assert_eq!(RankKind::parse("recs").unwrap(), RankKind::Recs);
        assert!(RankKind::parse("reports").is_err());
    }

    #[test]
    fn test_new_post_defaults() {
        let post = Post::new("hello".to_string(), Duration::seconds(600));
        assert_eq!(post.content, "hello");
        assert_eq!(post.views, 0);
        assert_eq!(post.recommendations, 0);
        assert_eq!(post.reports, 0);
        assert_eq!(post.status, PostStatus::Active);
        assert_eq!(post.ttl_seconds, 600);
        assert!(post.tags.is_empty());
    }

    #[test]
    fn test_validate_content_trims() {
        assert_eq!(validate_content("  hi there  ").unwrap(), "hi there");
    }

    #[test]
    fn test_validate_content_rejects_empty() {
        assert!(validate_content("").is_err());
        assert!(validate_content("   \t\n ").is_err());
    }

    #[test]
    fn test_validate_content_length_is_chars_not_bytes() {
        let ok: String = "å".repeat(200);
        assert_eq!(validate_content(&ok).unwrap().chars().count(), 200);
        let too_long: String = "å".repeat(201);
        assert!(validate_content(&too_long).is_err());
    }

    #[test]
    fn test_post_serializes_rfc3339() {
        let post = Post::new("hello".to_string(), Duration::seconds(600));
        let json = serde_json::to_value(&post).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.contains('T'));
        assert_eq!(json["status"], "active");
        assert_eq!(json["id"].as_str().unwrap(), post.id.as_str());
    }
}
