use std::collections::HashMap;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db;
use crate::db::models::{Comment, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::upload;

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 5000;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePostForm {
    pub title: String,
    pub text: String,
    pub username: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePostForm {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct LikeForm {
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentForm {
    pub user: Option<String>,
    pub text: String,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/posts/{id}/like", post(toggle_like))
        .route("/api/posts/{id}/comment", post(create_comment))
}

// -- Handlers --

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    let posts = query_posts(&conn)?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    // A malformed id is a client error, not a missing post.
    if uuid::Uuid::parse_str(&id).is_err() {
        return Err(AppError::BadRequest("Invalid post id".into()));
    }

    let conn = state.db.get()?;
    let mut post = conn
        .query_row(
            "SELECT id, username, title, body, image, created_at FROM posts WHERE id = ?1",
            params![id],
            post_from_row,
        )
        .map_err(|_| AppError::NotFound("Post not found"))?;

    post.comments = query_post_comments(&conn, &id)?;
    post.liked_by = query_likers(&conn, &id)?;
    post.likes = post.liked_by.len() as i64;

    Ok(Json(post))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    req: Request,
) -> AppResult<Response> {
    let form: CreatePostForm = upload::read_body(req).await?;
    user.ensure_matches(form.username.as_deref())?;

    let title = form.title.trim().to_string();
    let text = form.text.trim().to_string();
    if title.is_empty() && text.is_empty() {
        return Err(AppError::BadRequest("Post needs a title or some text".into()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LEN
        )));
    }
    if text.len() > MAX_BODY_LEN {
        return Err(AppError::BadRequest(format!(
            "Text must be {} characters or less",
            MAX_BODY_LEN
        )));
    }

    let post_id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO posts (id, username, title, body, image, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post_id,
                user.username,
                title,
                text,
                form.image,
                db::now_timestamp()
            ],
        )?;
    }

    state.notifier.posts_updated();
    Ok((StatusCode::CREATED, Json(json!({ "message": "Post created" }))).into_response())
}

async fn update_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(form): Json<UpdatePostForm>,
) -> AppResult<Json<Value>> {
    // Partial update of title/text only. Updating an unknown id is a no-op
    // that still reports success, as the original API did.
    {
        let conn = state.db.get()?;
        conn.execute(
            "UPDATE posts SET title = COALESCE(?1, title), body = COALESCE(?2, body) \
             WHERE id = ?3",
            params![form.title, form.text, id],
        )?;
    }

    state.notifier.posts_updated();
    Ok(Json(json!({ "message": "Post updated" })))
}

async fn delete_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    {
        let mut conn = state.db.get()?;
        // Comments and likes go with the post in one transaction; a crash
        // cannot leave orphans behind.
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM post_likes WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        tx.commit()?;
    }

    state.notifier.posts_updated();
    Ok(Json(json!({ "message": "Post and comments deleted" })))
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(form): Json<LikeForm>,
) -> AppResult<Json<Value>> {
    user.ensure_matches(form.username.as_deref())?;

    let likes = {
        let mut conn = state.db.get()?;
        // Remove-if-present / add-if-absent inside one transaction, so two
        // concurrent toggles from the same user cannot double-count.
        let tx = conn.transaction()?;

        let _: String = tx
            .query_row("SELECT id FROM posts WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .map_err(|_| AppError::NotFound("Post not found"))?;

        let removed = tx.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND username = ?2",
            params![id, user.username],
        )?;
        if removed == 0 {
            tx.execute(
                "INSERT INTO post_likes (post_id, username, created_at) VALUES (?1, ?2, ?3)",
                params![id, user.username, db::now_timestamp()],
            )?;
        }

        let likes: i64 = tx.query_row(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        likes
    };

    state.notifier.posts_updated();
    Ok(Json(json!({ "likes": likes })))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(form): Json<CreateCommentForm>,
) -> AppResult<Json<Value>> {
    user.ensure_matches(form.user.as_deref())?;

    let text = form.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    // The post id is taken as given; comments on unknown posts are allowed
    // and simply never surface in the feed.
    let comment_id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO comments (id, post_id, username, body, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![comment_id, id, user.username, text, db::now_timestamp()],
        )?;
    }

    state.notifier.posts_updated();
    Ok(Json(json!({ "message": "Comment added" })))
}

// -- Query helpers --

fn post_from_row(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user: row.get(1)?,
        title: row.get(2)?,
        text: row.get(3)?,
        image: row.get(4)?,
        created_at: row.get(5)?,
        likes: 0,
        liked_by: Vec::new(),
        comments: Vec::new(),
    })
}

/// The full feed, newest first, with comments and likers attached. All
/// comments and likes are fetched once and bucketed by post id rather than
/// queried per post.
fn query_posts(conn: &rusqlite::Connection) -> Result<Vec<Post>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, username, title, body, image, created_at FROM posts \
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let mut posts: Vec<Post> = stmt
        .query_map([], post_from_row)?
        .collect::<Result<_, _>>()?;

    let mut comments: HashMap<String, Vec<Comment>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT id, post_id, username, body, created_at FROM comments \
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([], comment_from_row)?;
    for comment in rows {
        let comment = comment?;
        comments
            .entry(comment.post_id.clone())
            .or_default()
            .push(comment);
    }

    let mut likers: HashMap<String, Vec<String>> = HashMap::new();
    let mut stmt = conn
        .prepare("SELECT post_id, username FROM post_likes ORDER BY created_at ASC, rowid ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (post_id, username) = row?;
        likers.entry(post_id).or_default().push(username);
    }

    for post in &mut posts {
        if let Some(list) = comments.remove(&post.id) {
            post.comments = list;
        }
        if let Some(list) = likers.remove(&post.id) {
            post.likes = list.len() as i64;
            post.liked_by = list;
        }
    }

    Ok(posts)
}

fn comment_from_row(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_post_comments(
    conn: &rusqlite::Connection,
    post_id: &str,
) -> Result<Vec<Comment>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, username, body, created_at FROM comments \
         WHERE post_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<_, _>>()?;
    Ok(comments)
}

fn query_likers(conn: &rusqlite::Connection, post_id: &str) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT username FROM post_likes WHERE post_id = ?1 \
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let likers = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(likers)
}

// -- Tests --
