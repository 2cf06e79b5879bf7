//! Post lifecycle and engagement handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    POST_VIEWS, POSTS_BLINDED, POSTS_CREATED, RECOMMENDATIONS, REPORTS, TTL_EXTENSIONS,
};
use crate::state::AppState;
use crate::tagger::spawn_tag_write_back;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use ember_core::post::validate_content;
use ember_core::{Post, PostId, PostStatus, RankKind};
use ember_store::{ExtensionPolicy, StoreError};
use serde::{Deserialize, Serialize};

/// Request body for creating a post.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    /// Raw post content. Trimmed and length-checked before storage.
    pub content: String,
}

/// One page of the active listing.
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    /// Active-index cardinality, which counts blinded posts too.
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Outcome of a recommend call.
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    /// False when the post is blinded and the recommendation was refused.
    pub success: bool,
    pub recommendations: u64,
    pub ttl_seconds: u64,
    pub extended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a report call.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub reports: u64,
    pub blinded: bool,
    pub message: String,
}

/// Parse a post id from a path segment.
///
/// A malformed id is reported the same way as a missing post.
fn parse_id(raw: &str) -> ApiResult<PostId> {
    PostId::parse(raw).map_err(|_| ApiError::NotFound(format!("post {raw} not found")))
}

/// Fetch a post and count the read as a view.
///
/// Every read path that returns post bodies goes through here, so listing
/// and ranking reads bump the view counter exactly like direct lookups.
/// Returns `None` when the post is expired or never existed.
async fn hydrate_post(state: &AppState, id: &PostId) -> ApiResult<Option<Post>> {
    let Some(mut post) = state.store.fetch(id).await? else {
        return Ok(None);
    };

    match state.store.bump_views(id).await {
        Ok((views, ttl_seconds)) => {
            post.views = views;
            post.ttl_seconds = ttl_seconds;
            POST_VIEWS.inc();
            Ok(Some(post))
        }
        // The record can expire between the fetch and the increment.
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/posts - Create a post.
#[tracing::instrument(skip(state, body), fields(post_id))]
pub async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let content = validate_content(&body.content)?;

    let post = Post::new(content, state.config.board.default_lifetime());
    tracing::Span::current().record("post_id", post.id.as_str());

    state.store.create(&post).await?;
    POSTS_CREATED.inc();
    tracing::info!(ttl_seconds = post.ttl_seconds, "Post created");

    if let Some(tagger) = &state.tagger {
        spawn_tag_write_back(
            tagger.clone(),
            state.store.clone(),
            post.id.clone(),
            post.content.clone(),
        );
    }

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/posts/{id} - Fetch a single post, counting the read as a view.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    let id = parse_id(&id)?;

    let post = hydrate_post(&state, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;

    Ok(Json(post))
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    /// Page number, starting at 1.
    pub page: Option<u64>,
    /// Posts per page (default and cap come from the board config).
    pub per_page: Option<u64>,
}

/// GET /api/v1/posts - List active posts, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<Json<PostListResponse>> {
    let board = &state.config.board;

    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::BadRequest("page must be at least 1".to_string()));
    }

    let per_page = params
        .per_page
        .unwrap_or(board.default_page_size)
        .min(board.page_size_cap);
    if per_page == 0 {
        return Err(ApiError::BadRequest(
            "per_page must be at least 1".to_string(),
        ));
    }

    let offset = (page - 1).saturating_mul(per_page);
    let active = state.store.active_page(offset, per_page).await?;

    let mut posts = Vec::with_capacity(active.ids.len());
    for id in &active.ids {
        // Index entries can outlive their record between sweeps; skip those.
        // Blinded posts stay indexed but are hidden from the listing.
        if let Some(post) = hydrate_post(&state, id).await?
            && post.status == PostStatus::Active
        {
            posts.push(post);
        }
    }

    Ok(Json(PostListResponse {
        posts,
        total: active.total,
        page,
        per_page,
    }))
}

/// POST /api/v1/posts/{id}/recommend - Recommend a post.
#[tracing::instrument(skip(state), fields(post_id = %id))]
pub async fn recommend_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecommendResponse>> {
    let id = parse_id(&id)?;
    let board = &state.config.board;

    let policy = ExtensionPolicy {
        threshold: board.extension_threshold,
        extension: board.extension(),
    };

    let outcome = state.store.recommend(&id, &policy).await?;

    if outcome.accepted {
        RECOMMENDATIONS.inc();
        if outcome.extended {
            TTL_EXTENSIONS.inc();
            tracing::info!(
                recommendations = outcome.recommendations,
                ttl_seconds = outcome.ttl_seconds,
                "Post lifetime extended"
            );
        }
    }

    let message = if !outcome.accepted {
        Some("blinded posts cannot be recommended".to_string())
    } else if outcome.extended {
        Some(format!(
            "lifetime extended by {} seconds",
            board.extension_ttl_secs
        ))
    } else {
        None
    };

    Ok(Json(RecommendResponse {
        success: outcome.accepted,
        recommendations: outcome.recommendations,
        ttl_seconds: outcome.ttl_seconds,
        extended: outcome.extended,
        message,
    }))
}

/// POST /api/v1/posts/{id}/report - Report a post.
#[tracing::instrument(skip(state), fields(post_id = %id))]
pub async fn report_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let id = parse_id(&id)?;
    let threshold = state.config.board.blind_threshold;

    let outcome = state.store.report(&id, threshold).await?;
    REPORTS.inc();

    // Counters only grow, so exactly one report lands on the threshold.
    if outcome.blinded && outcome.reports == threshold {
        POSTS_BLINDED.inc();
        tracing::warn!(reports = outcome.reports, "Post blinded");
    }

    let message = if outcome.blinded {
        "post hidden after reaching the report threshold".to_string()
    } else {
        "report recorded".to_string()
    };

    Ok(Json(ReportResponse {
        success: true,
        reports: outcome.reports,
        blinded: outcome.blinded,
        message,
    }))
}

/// Query parameters for rankings.
#[derive(Debug, Deserialize)]
pub struct RankingParams {
    /// Maximum entries to return (default and cap come from the board config).
    pub limit: Option<u64>,
}

/// GET /api/v1/posts/ranking/{kind} - Top posts by views or recommendations.
///
/// Hydration goes through the shared read path, so a ranking read also
/// counts a view against every returned post. Blinded posts are not
/// filtered here; rankings show them, listings do not.
pub async fn get_ranking(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<RankingParams>,
) -> ApiResult<Json<Vec<Post>>> {
    let kind = RankKind::parse(&kind)?;
    let board = &state.config.board;

    let limit = params
        .limit
        .unwrap_or(board.default_ranking_limit)
        .min(board.ranking_limit_cap);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let entries = state.store.ranking_page(kind, limit).await?;

    let mut posts = Vec::with_capacity(entries.len());
    for (id, _score) in &entries {
        if let Some(post) = hydrate_post(&state, id).await? {
            posts.push(post);
        }
    }

    Ok(Json(posts))
}
