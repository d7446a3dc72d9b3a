use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Query params understood by the list endpoint, mirroring the public test
/// API's `_limit` plus a `_delay` knob for exercising client timeouts.
#[derive(Deserialize)]
pub struct ListParams {
    #[serde(rename = "_limit")]
    pub limit: Option<usize>,
    #[serde(rename = "_delay")]
    pub delay_ms: Option<u64>,
}

pub struct AppState {
    todos: RwLock<BTreeMap<u64, Todo>>,
    next_id: AtomicU64,
}

pub type Db = Arc<AppState>;

/// Router over empty state.
pub fn app() -> Router {
    app_with_seed(0)
}

/// Router pre-populated with `count` todos (ids `1..=count`, even ids
/// completed) so list/limit behavior is exercisable out of the box.
pub fn app_with_seed(count: u64) -> Router {
    let mut todos = BTreeMap::new();
    for id in 1..=count {
        todos.insert(
            id,
            Todo {
                id,
                title: format!("Todo {id}"),
                completed: id % 2 == 0,
            },
        );
    }
    let state: Db = Arc::new(AppState {
        todos: RwLock::new(todos),
        next_id: AtomicU64::new(count + 1),
    });
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).put(replace_todo).patch(update_todo).delete(delete_todo),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

async fn list_todos(
    State(db): State<Db>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Todo>> {
    if let Some(ms) = params.delay_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    let todos = db.todos.read().await;
    let limit = params.limit.unwrap_or(usize::MAX);
    Json(todos.values().take(limit).cloned().collect())
}

async fn create_todo(
    State(db): State<Db>,
    Json(input): Json<CreateTodo>,
) -> (StatusCode, Json<Todo>) {
    let id = db.next_id.fetch_add(1, Ordering::SeqCst);
    let todo = Todo {
        id,
        title: input.title,
        completed: input.completed,
    };
    db.todos.write().await.insert(id, todo.clone());
    (StatusCode::CREATED, Json(todo))
}

async fn get_todo(State(db): State<Db>, Path(id): Path<u64>) -> Result<Json<Todo>, StatusCode> {
    let todos = db.todos.read().await;
    todos.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn replace_todo(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<CreateTodo>,
) -> Result<Json<Todo>, StatusCode> {
    let mut todos = db.todos.write().await;
    let todo = todos.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    todo.title = input.title;
    todo.completed = input.completed;
    Ok(Json(todo.clone()))
}

async fn update_todo(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, StatusCode> {
    let mut todos = db.todos.write().await;
    let todo = todos.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    Ok(Json(todo.clone()))
}

async fn delete_todo(State(db): State<Db>, Path(id): Path<u64>) -> Result<StatusCode, StatusCode> {
    let mut todos = db.todos.write().await;
    todos
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}
