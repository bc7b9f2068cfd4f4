use axum::{
    extract::State,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use model::entities::{bbs_cmt, bbs_post, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::{debug, info, instrument, trace};
use validator::Validate;

use crate::auth::{flash, CurrentUser, RequireUser};
use crate::errors::AppError;
use crate::extract::{not_blank, PathParam, ValidForm, ValidQuery};
use crate::schemas::{AppState, CachedData, CommentView, PageQuery, PostSummary, RECENT_POSTS_KEY};
use crate::templates::render_page;

/// Form body for opening a topic
#[derive(Debug, Deserialize, Validate)]
pub struct NewPostForm {
    #[validate(
        length(min = 1, max = 80, message = "Title must be between 1 and 80 characters"),
        custom(function = "not_blank", message = "Title must not be blank")
    )]
    pub title: String,
    #[validate(
        length(min = 1, max = 20000, message = "Content must not be empty"),
        custom(function = "not_blank", message = "Content must not be empty")
    )]
    pub content: String,
    /// Checkbox; present when ticked
    pub anonymous: Option<String>,
}

/// Form body for replying to a topic
#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(
        length(min = 1, max = 5000, message = "Reply must not be empty"),
        custom(function = "not_blank", message = "Reply must not be empty")
    )]
    pub content: String,
    pub anonymous: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/new", get(new_post_form).post(create_post))
        .route("/post/:post_id", get(show_post))
        .route("/post/:post_id/comment", post(create_comment))
}

async fn summarize<C: ConnectionTrait>(
    db: &C,
    rows: Vec<(bbs_post::Model, Option<user::Model>)>,
) -> Result<Vec<PostSummary>, DbErr> {
    let mut posts = Vec::with_capacity(rows.len());
    for (post, author) in rows {
        let reply_count = bbs_cmt::Entity::find()
            .filter(bbs_cmt::Column::PostId.eq(post.id))
            .count(db)
            .await?;
        posts.push(PostSummary::new(post, author.as_ref(), reply_count));
    }
    Ok(posts)
}

/// One page of topics, most recently active first, and the page count.
pub async fn post_page<C: ConnectionTrait>(
    db: &C,
    page: u64,
    per_page: u64,
) -> Result<(Vec<PostSummary>, u64), DbErr> {
    let paginator = bbs_post::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(bbs_post::Column::UpdatedAt)
        .order_by_desc(bbs_post::Column::Id)
        .paginate(db, per_page.max(1));

    let num_pages = paginator.num_pages().await?;
    let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((summarize(db, rows).await?, num_pages.max(1)))
}

/// Topics of `author`, newest first. Anonymous topics are left out unless
/// `include_anonymous` is set.
pub async fn posts_by<C: ConnectionTrait>(
    db: &C,
    author: &user::Model,
    include_anonymous: bool,
) -> Result<Vec<PostSummary>, DbErr> {
    let mut query = bbs_post::Entity::find()
        .filter(bbs_post::Column::AuthorId.eq(author.id))
        .order_by_desc(bbs_post::Column::CreatedAt);
    if !include_anonymous {
        query = query.filter(bbs_post::Column::Anonymous.eq(false));
    }

    let rows = query
        .all(db)
        .await?
        .into_iter()
        .map(|post| (post, Some(author.clone())))
        .collect();
    summarize(db, rows).await
}

/// First page of topics, served from the cache when possible.
pub async fn recent_posts(state: &AppState) -> Result<Vec<PostSummary>, DbErr> {
    if let Some(CachedData::RecentPosts(posts)) = state.cache.get(RECENT_POSTS_KEY).await {
        trace!("Recent posts served from cache");
        return Ok(posts);
    }

    let (posts, _) = post_page(&state.db, 1, state.config.per_page).await?;
    state
        .cache
        .insert(RECENT_POSTS_KEY.to_string(), CachedData::RecentPosts(posts.clone()))
        .await;
    Ok(posts)
}

pub async fn forget_recent_posts(state: &AppState) {
    state.cache.invalidate(RECENT_POSTS_KEY).await;
}

/// Paginated topic listing
#[instrument(skip_all)]
pub async fn list_posts(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = query.page.unwrap_or(1);
    debug!("Listing topics, page {}", page);

    let (posts, num_pages) = post_page(&state.db, page, state.config.per_page).await?;
    if page > num_pages {
        return Err(AppError::NotFound);
    }

    let context = json!({
        "posts": posts,
        "page": page,
        "num_pages": num_pages,
        "prev_page": (page > 1).then(|| page - 1),
        "next_page": (page < num_pages).then(|| page + 1),
    });
    render_page(&state, &session, &current, "bbs/list", context).await
}

/// A topic with its replies in floor order
#[instrument(skip(state, session, current))]
pub async fn show_post(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    PathParam(post_id): PathParam<i32>,
) -> Result<Html<String>, AppError> {
    let (post, author) = bbs_post::Entity::find_by_id(post_id)
        .find_also_related(user::Entity)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    let comments: Vec<CommentView> = bbs_cmt::Entity::find()
        .filter(bbs_cmt::Column::PostId.eq(post_id))
        .find_also_related(user::Entity)
        .order_by_asc(bbs_cmt::Column::Floor)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(cmt, author)| CommentView::new(cmt, author.as_ref()))
        .collect();
    debug!("Topic {} has {} replies", post_id, comments.len());

    let summary = PostSummary::new(post.clone(), author.as_ref(), comments.len() as u64);
    let context = json!({
        "post": post,
        "author_name": summary.author_name,
        "author_urlname": summary.author_urlname,
        "comments": comments,
    });
    render_page(&state, &session, &current, "bbs/post", context).await
}

#[instrument(skip_all)]
pub async fn new_post_form(
    State(state): State<AppState>,
    session: Session,
    current: CurrentUser,
    RequireUser(_user): RequireUser,
) -> Result<Html<String>, AppError> {
    render_page(&state, &session, &current, "bbs/new", json!({})).await
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    ValidForm(form): ValidForm<NewPostForm>,
) -> Result<Redirect, AppError> {
    let title = form.title.trim();

    let now = Utc::now().naive_utc();
    let post = bbs_post::ActiveModel {
        author_id: Set(user.id),
        title: Set(title.to_string()),
        content: Set(form.content),
        anonymous: Set(form.anonymous.is_some()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Topic {} opened by {}", post.id, user);
    forget_recent_posts(&state).await;
    flash(&session, "message", "Topic posted").await?;
    Ok(Redirect::to(&format!("/bbs/post/{}", post.id)))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = post_id))]
pub async fn create_comment(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    PathParam(post_id): PathParam<i32>,
    ValidForm(form): ValidForm<CommentForm>,
) -> Result<Redirect, AppError> {

    let now = Utc::now().naive_utc();
    let author_id = user.id;
    let anonymous = form.anonymous.is_some();
    let content = form.content;

    let floor = state
        .db
        .transaction::<_, i32, AppError>(move |txn| {
            Box::pin(async move {
                let post = bbs_post::Entity::find_by_id(post_id)
                    .one(txn)
                    .await?
                    .ok_or(AppError::NotFound)?;

                let floor = bbs_cmt::next_floor(txn, post.id).await?;
                bbs_cmt::ActiveModel {
                    post_id: Set(post.id),
                    author_id: Set(author_id),
                    content: Set(content),
                    anonymous: Set(anonymous),
                    floor: Set(floor),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let mut post: bbs_post::ActiveModel = post.into();
                post.updated_at = Set(now);
                post.update(txn).await?;

                Ok(floor)
            })
        })
        .await?;

    info!("Reply on floor {} of topic {} by {}", floor, post_id, user);
    forget_recent_posts(&state).await;
    flash(&session, "message", "Reply posted").await?;
    Ok(Redirect::to(&format!("/bbs/post/{}#floor-{}", post_id, floor)))
}
