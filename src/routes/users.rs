use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::session_token;
use crate::state::AppState;
use crate::upload;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/logout", post(logout))
}

// -- Handlers --

async fn register(State(state): State<AppState>, req: Request) -> AppResult<Response> {
    let form: RegisterForm = upload::read_body(req).await?;

    let username = form.username.trim().to_string();
    let email = form.email.trim().to_string();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest(
            "username, email and password are required".into(),
        ));
    }

    let conn = state.db.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = password::hash(&form.password)?;
    let user_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, avatar) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, username, email, password_hash, form.avatar],
    )?;

    tracing::info!("registered user {}", username);
    Ok((StatusCode::CREATED, Json(json!({ "username": username }))).into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> AppResult<Response> {
    let user = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT id, username, password_hash, avatar FROM users WHERE email = ?1",
            params![form.email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    avatar: row.get(3)?,
                })
            },
        )
        // An unknown email and a wrong password are indistinguishable
        // to the caller.
        .map_err(|_| AppError::Unauthorized)?
    };

    if !password::verify(&form.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = session::create(&state.db, &user.id, state.config.auth.session_hours)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "username": user.username,
            "avatar": user.avatar.unwrap_or_default(),
            "token": token,
        })),
    )
        .into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        session::delete(&state.db, &token)?;
    }

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_sets_max_age_in_seconds() {
        let cookie = session_cookie("plazita_session", "tok", 2);
        assert!(cookie.starts_with("plazita_session=tok;"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie("plazita_session");
        assert!(cookie.starts_with("plazita_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
