//! Page data loaders.
//!
//! Each loader builds its own client for the request and makes only the calls
//! its page needs. The todo list imports the caller's `pb_auth` cookie; the
//! blog pages are public and stay anonymous. How a
//! failed fetch is reported is decided per page: the todo and blog lists fall
//! back to an empty list with a message, a single post reports not-found.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    collections::{POSTS, TODOS},
    model::{Post, Todo, User},
    pocketbase::{ListOptions, PocketBase},
};

pub const LOGIN_PATH: &str = "/login";
pub const BLOG_PAGE_SIZE: u32 = 50;
pub const BLOG_LOAD_ERROR: &str = "Failed to load blog posts";
pub const POST_NOT_FOUND: &str = "Blog post not found";
const NEWEST_FIRST: &str = "-created";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The page needs a session and the request has none.
    #[error("redirect to {0}")]
    Redirect(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
}

impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        match self {
            // 303 See Other
            Self::Redirect(location) => Redirect::to(location).into_response(),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({"status": "fail", "message": message})),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodosPage {
    pub todos: Vec<Todo>,
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogPage {
    pub posts: Vec<Post>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPage {
    pub post: Post,
}

/// Fresh client for one request, carrying the cookie's session if any.
pub fn request_client(backend_url: &str, cookie: Option<&str>) -> PocketBase {
    let client = PocketBase::new(backend_url);
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        client.auth_store().load_from_cookie(cookie);
    }
    client
}

/// `/`: the caller's todos, newest first. Requires a session.
pub async fn load_todos(backend_url: &str, cookie: Option<&str>) -> Result<TodosPage, LoadError> {
    let Some(cookie) = cookie.filter(|c| !c.is_empty()) else {
        return Err(LoadError::Redirect(LOGIN_PATH));
    };
    let client = request_client(backend_url, Some(cookie));
    if !client.auth_store().is_valid() {
        return Err(LoadError::Redirect(LOGIN_PATH));
    }
    let user = client.auth_store().record();

    match client.collection(TODOS).full_list::<Todo>(Some(NEWEST_FIRST), None).await {
        Ok(todos) => Ok(TodosPage { todos, user, error: None }),
        Err(err) => {
            tracing::error!(error = %err, "error fetching todos");
            Ok(TodosPage {
                todos: Vec::new(),
                user,
                error: Some(err.to_string()),
            })
        }
    }
}

/// `/blog`: first page of posts, newest first. Posts are public, so the
/// request goes out without a session.
pub async fn load_blog(backend_url: &str) -> BlogPage {
    let client = PocketBase::new(backend_url);
    let options = ListOptions::page(1, BLOG_PAGE_SIZE).sort(NEWEST_FIRST);

    match client.collection(POSTS).list::<Post>(&options).await {
        Ok(page) => BlogPage {
            posts: page.items,
            error: None,
        },
        Err(err) => {
            tracing::error!(error = %err, "error loading posts");
            BlogPage {
                posts: Vec::new(),
                error: Some(BLOG_LOAD_ERROR.to_string()),
            }
        }
    }
}

/// `/blog/{id}`: one post; any failure is reported as not-found.
pub async fn load_post(backend_url: &str, id: &str) -> Result<PostPage, LoadError> {
    let client = PocketBase::new(backend_url);
    match client.collection(POSTS).get_one::<Post>(id).await {
        Ok(post) => Ok(PostPage { post }),
        Err(err) => {
            tracing::error!(error = %err, post_id = id, "error loading post");
            Err(LoadError::NotFound(POST_NOT_FOUND))
        }
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
