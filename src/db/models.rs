use serde::Serialize;

/// The slice of a user row the login flow reads. The password hash never
/// leaves the server; profile fields are queried where they are served.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// A post as the API serves it: the stored row plus its liker set and
/// comment list. `likes` is always the size of `likedBy`.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: String,
    pub user: String,
    pub title: String,
    pub text: String,
    pub image: Option<String>,
    pub created_at: String,
    pub likes: i64,
    #[serde(rename = "likedBy")]
    pub liked_by: Vec<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user: String,
    pub text: String,
    pub created_at: String,
}
