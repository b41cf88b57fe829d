use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::{
    collections::TODOS,
    error::AppError,
    loader::{self, BlogPage, LoadError, PostPage, TodosPage},
    model::{AuthCookie, CurrentUser, NewTodo, Todo, TodoPatch},
    pocketbase::PocketBase,
    schema::{CreateTodoSchema, LoginSchema, RegisterSchema, UpdateTodoSchema},
    session::{mirror_to_cookie, AuthSession, CookieSink},
    AppState,
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "Todo list and blog over PocketBase";

    Json(json!({
        "status": "success",
        "message": MESSAGE
    }))
}

// Page data for the todo list; redirects to /login without a session
pub async fn todos_page(
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
) -> Result<Json<TodosPage>, LoadError> {
    loader::load_todos(&data.config.server_url, cookie.0.as_deref())
        .await
        .map(Json)
}

pub async fn blog_page(State(data): State<Arc<AppState>>) -> Json<BlogPage> {
    Json(loader::load_blog(&data.config.server_url).await)
}

pub async fn blog_post_page(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
) -> Result<Json<PostPage>, LoadError> {
    loader::load_post(&data.config.server_url, &id)
        .await
        .map(Json)
}

/// Session manager for one request whose listener records the cookie to send back.
fn mirrored_session(data: &AppState, cookie: Option<&str>) -> (AuthSession, CookieSink) {
    let client = loader::request_client(&data.config.server_url, cookie);
    let sink = CookieSink::default();
    mirror_to_cookie(client.auth_store(), &sink);
    (AuthSession::new(client), sink)
}

fn with_cookie(jar: CookieJar, sink: &CookieSink) -> CookieJar {
    match sink.take() {
        Some(cookie) => jar.add(cookie),
        None => jar,
    }
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginSchema>,
) -> Result<impl IntoResponse, AppError> {
    let (session, sink) = mirrored_session(&data, None);
    let state = session.login(&body.email, &body.password).await?;

    let response = json!({"status": "success", "data": {"user": state.record}});
    Ok((with_cookie(jar, &sink), Json(response)))
}

pub async fn register(
    State(data): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<RegisterSchema>,
) -> Result<impl IntoResponse, AppError> {
    let (session, sink) = mirrored_session(&data, None);
    let state = session
        .register(&body.email, &body.password, &body.password_confirm)
        .await?;

    let response = json!({"status": "success", "data": {"user": state.record}});
    Ok((StatusCode::CREATED, with_cookie(jar, &sink), Json(response)))
}

pub async fn logout(
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (session, sink) = mirrored_session(&data, cookie.0.as_deref());
    session.logout();

    (with_cookie(jar, &sink), Json(json!({"status": "success"})))
}

/// Client acting as the request's session.
fn session_client(data: &AppState, cookie: &AuthCookie) -> PocketBase {
    loader::request_client(&data.config.server_url, cookie.0.as_deref())
}

pub async fn get_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
) -> Result<impl IntoResponse, AppError> {
    let todo: Todo = session_client(&data, &cookie).collection(TODOS).get_one(&id).await?;

    Ok(Json(json!({"status": "success", "data": {"todo": todo}})))
}

// The owner is always the session user, which is what the create rule demands
pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    let new_todo = NewTodo {
        name: body.name,
        description: body.description,
        completed: body.completed,
        user: current.user.id,
    };
    let todo: Todo = session_client(&data, &cookie)
        .collection(TODOS)
        .create(&new_todo)
        .await?;
    tracing::info!(todo_id = %todo.id, "todo created");

    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "success", "data": {"todo": todo}})),
    ))
}

pub async fn update_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
    Json(body): Json<UpdateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    let patch = TodoPatch::from(body);
    let todo: Todo = session_client(&data, &cookie)
        .collection(TODOS)
        .update(&id, &patch)
        .await?;

    Ok(Json(json!({"status": "success", "data": {"todo": todo}})))
}

pub async fn delete_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(cookie): Extension<AuthCookie>,
) -> Result<impl IntoResponse, AppError> {
    session_client(&data, &cookie).collection(TODOS).delete(&id).await?;
    tracing::info!(todo_id = %id, "todo deleted");

    Ok(StatusCode::NO_CONTENT)
}
