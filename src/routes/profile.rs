use axum::extract::{Path, Request, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::upload;

#[derive(Deserialize)]
pub struct ProfileUpdateForm {
    pub bio: Option<String>,
    pub language: Option<String>,
    pub avatar: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/profile/{username}",
            get(get_profile).put(update_profile),
        )
        // Same resource under the alternate path some clients use.
        .route("/api/users/{username}", get(get_profile))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;

    let (bio, avatar, language) = conn
        .query_row(
            "SELECT bio, avatar, language FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .map_err(|_| AppError::NotFound("User not found"))?;

    let posts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;

    Ok(Json(json!({
        "username": username,
        "bio": bio.unwrap_or_default(),
        "avatar": avatar.unwrap_or_default(),
        "language": language,
        "posts": posts,
    })))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    req: Request,
) -> AppResult<Json<Value>> {
    // A profile is only editable by its owner.
    if user.username != username {
        return Err(AppError::Unauthorized);
    }

    let form: ProfileUpdateForm = upload::read_body(req).await?;

    let updated = {
        let conn = state.db.get()?;
        conn.execute(
            "UPDATE users SET \
                bio = COALESCE(?1, bio), \
                language = COALESCE(?2, language), \
                avatar = COALESCE(?3, avatar) \
             WHERE username = ?4",
            params![form.bio, form.language, form.avatar, username],
        )?
    };
    if updated == 0 {
        return Err(AppError::NotFound("User not found"));
    }

    state.notifier.posts_updated();
    Ok(Json(json!({ "message": "Profile updated" })))
}
