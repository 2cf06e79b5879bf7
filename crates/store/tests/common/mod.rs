use ember_core::Post;
use time::{Duration, OffsetDateTime};

/// Build a post with the default 600 second lifetime.
#[allow(dead_code)]
pub fn sample_post(content: &str) -> Post {
    Post::new(content.to_string(), Duration::seconds(600))
}

/// Build a post whose creation time is shifted `offset_secs` into the
/// past, so ordering and expiry-prediction tests get distinct scores.
#[allow(dead_code)]
pub fn backdated_post(content: &str, offset_secs: i64) -> Post {
    let mut post = Post::new(content.to_string(), Duration::seconds(600));
    post.created_at = OffsetDateTime::now_utc() - Duration::seconds(offset_secs);
    post
}
