//! Tagging collaborator boundary.
//!
//! Tag generation lives outside this system; the server only owns the seam.
//! A [`Tagger`] computes tags for freshly created content, and a detached
//! task writes them back onto the record. The write-back is best-effort:
//! every failure path leaves the post with its empty default tags.

use async_trait::async_trait;
use ember_core::PostId;
use ember_store::PostStore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Produces tags for post content.
#[async_trait]
pub trait Tagger: Send + Sync + 'static {
    /// Compute tags for the given content.
    async fn tags_for(&self, content: &str) -> anyhow::Result<Vec<String>>;
}

/// Spawn the detached tag write-back task for a freshly created post.
///
/// The write-back sets only the `tags` field, never counters or the
/// remaining lifetime. Failures are logged and swallowed.
pub fn spawn_tag_write_back(
    tagger: Arc<dyn Tagger>,
    store: Arc<dyn PostStore>,
    post_id: PostId,
    content: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tags = match tagger.tags_for(&content).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(
                    post_id = %post_id,
                    error = %e,
                    "Tagger failed, post keeps empty tags"
                );
                return;
            }
        };

        if tags.is_empty() {
            tracing::debug!(post_id = %post_id, "Tagger returned no tags");
            return;
        }

        match store.write_tags(&post_id, &tags).await {
            Ok(true) => {
                tracing::debug!(post_id = %post_id, count = tags.len(), "Tags written");
            }
            Ok(false) => {
                tracing::debug!(post_id = %post_id, "Post expired before tags were written");
            }
            Err(e) => {
                tracing::warn!(post_id = %post_id, error = %e, "Tag write-back failed");
            }
        }
    })
}
