use axum::{
    extract::{FromRequest, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use todos_api::v1::{
    sort_lists, sort_todos, List, ListDetail, ListId, NewList, NewTodo, Notice, RenameList,
    TodoId, TodoStatusUpdate,
};
use tracing::info;

use crate::{
    error::ApiError,
    session::Session,
    storage::{Backend, Storage},
    validation::{error_for_list_name, error_for_todo_name},
    AppState, LISTS_PATH,
};

type ApiResult<T> = Result<T, ApiError>;

/// JSON request body; malformed input is answered with a `Problem`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct Body<T>(T);

pub fn router<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/lists", get(get_lists::<B>).post(create_list::<B>))
        .route("/lists/:list_id", get(get_list::<B>).post(rename_list::<B>))
        .route("/lists/:list_id/delete", post(delete_list::<B>))
        .route("/lists/:list_id/complete", post(complete_all_todos::<B>))
        .route("/lists/:list_id/todos", post(create_todo::<B>))
        .route("/lists/:list_id/todos/:todo_id", post(update_todo_status::<B>))
        .route("/lists/:list_id/todos/:todo_id/delete", post(delete_todo::<B>))
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .is_some_and(|value| value == "XMLHttpRequest")
}

async fn load_list<S: Storage>(storage: &mut S, list_id: ListId) -> ApiResult<List> {
    storage
        .find_list(list_id)
        .await?
        .ok_or(ApiError::ListNotFound)
}

async fn get_lists<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<List>>> {
    let mut storage = state.backend.open(&session).await?;
    let lists = storage.all_lists().await;
    storage.disconnect().await;

    Ok(Json(sort_lists(lists?)))
}

async fn create_list<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Body(input): Body<NewList>,
) -> ApiResult<(StatusCode, Json<Notice>)> {
    let mut storage = state.backend.open(&session).await?;
    let result = create_list_in(&mut storage, input.list_name.trim()).await;
    storage.disconnect().await;
    result?;

    Ok((
        StatusCode::CREATED,
        Json(Notice::new("The list has been created.")),
    ))
}

async fn create_list_in<S: Storage>(storage: &mut S, name: &str) -> ApiResult<()> {
    if let Some(error) = error_for_list_name(storage, name).await? {
        return Err(ApiError::Invalid(error));
    }

    storage.create_list(name).await?;

    info!(name, "created list");

    Ok(())
}

async fn get_list<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path(list_id): Path<ListId>,
) -> ApiResult<Json<ListDetail>> {
    let mut storage = state.backend.open(&session).await?;
    let result = list_detail(&mut storage, list_id).await;
    storage.disconnect().await;

    result.map(Json)
}

async fn list_detail<S: Storage>(storage: &mut S, list_id: ListId) -> ApiResult<ListDetail> {
    let list = load_list(storage, list_id).await?;
    let todos = storage.find_todos_for_list(list_id).await?;

    Ok(ListDetail {
        list,
        todos: sort_todos(todos),
    })
}

async fn rename_list<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path(list_id): Path<ListId>,
    Body(input): Body<RenameList>,
) -> ApiResult<Json<Notice>> {
    let mut storage = state.backend.open(&session).await?;
    let result = rename_list_in(&mut storage, list_id, input.list_name.trim()).await;
    storage.disconnect().await;
    result?;

    Ok(Json(Notice::new("The list has been updated.")))
}

async fn rename_list_in<S: Storage>(storage: &mut S, list_id: ListId, name: &str) -> ApiResult<()> {
    load_list(storage, list_id).await?;

    if let Some(error) = error_for_list_name(storage, name).await? {
        return Err(ApiError::Invalid(error));
    }

    storage.rename_list(list_id, name).await?;

    info!(list_id, name, "renamed list");

    Ok(())
}

async fn delete_list<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path(list_id): Path<ListId>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let mut storage = state.backend.open(&session).await?;
    let result = storage.delete_list(list_id).await;
    storage.disconnect().await;
    result?;

    info!(list_id, "deleted list");

    if is_xhr(&headers) {
        return Ok(LISTS_PATH.into_response());
    }

    Ok(Json(Notice::new("The list has been deleted.")).into_response())
}

async fn complete_all_todos<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path(list_id): Path<ListId>,
) -> ApiResult<Json<Notice>> {
    let mut storage = state.backend.open(&session).await?;
    let result = complete_all_in(&mut storage, list_id).await;
    storage.disconnect().await;
    result?;

    Ok(Json(Notice::new("All todos have been completed.")))
}

async fn complete_all_in<S: Storage>(storage: &mut S, list_id: ListId) -> ApiResult<()> {
    load_list(storage, list_id).await?;
    storage.complete_all_todos(list_id).await?;

    info!(list_id, "completed all todos");

    Ok(())
}

async fn create_todo<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path(list_id): Path<ListId>,
    Body(input): Body<NewTodo>,
) -> ApiResult<(StatusCode, Json<Notice>)> {
    let mut storage = state.backend.open(&session).await?;
    let result = create_todo_in(&mut storage, list_id, input.todo_name.trim()).await;
    storage.disconnect().await;
    result?;

    Ok((StatusCode::CREATED, Json(Notice::new("The todo was added."))))
}

async fn create_todo_in<S: Storage>(storage: &mut S, list_id: ListId, name: &str) -> ApiResult<()> {
    load_list(storage, list_id).await?;

    if let Some(error) = error_for_todo_name(name) {
        return Err(ApiError::Invalid(error));
    }

    storage.create_todo(list_id, name).await?;

    info!(list_id, name, "created todo");

    Ok(())
}

async fn delete_todo<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path((list_id, todo_id)): Path<(ListId, TodoId)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let mut storage = state.backend.open(&session).await?;
    let result = delete_todo_in(&mut storage, list_id, todo_id).await;
    storage.disconnect().await;
    result?;

    if is_xhr(&headers) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Ok(Json(Notice::new("The todo has been deleted.")).into_response())
}

async fn delete_todo_in<S: Storage>(
    storage: &mut S,
    list_id: ListId,
    todo_id: TodoId,
) -> ApiResult<()> {
    load_list(storage, list_id).await?;
    storage.delete_todo(list_id, todo_id).await?;

    info!(list_id, todo_id, "deleted todo");

    Ok(())
}

async fn update_todo_status<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(session): Extension<Session>,
    Path((list_id, todo_id)): Path<(ListId, TodoId)>,
    Body(status): Body<TodoStatusUpdate>,
) -> ApiResult<Json<Notice>> {
    let mut storage = state.backend.open(&session).await?;
    let result = update_todo_status_in(&mut storage, list_id, todo_id, status.completed).await;
    storage.disconnect().await;
    result?;

    Ok(Json(Notice::new("The todo has been updated.")))
}

async fn update_todo_status_in<S: Storage>(
    storage: &mut S,
    list_id: ListId,
    todo_id: TodoId,
    completed: bool,
) -> ApiResult<()> {
    load_list(storage, list_id).await?;
    storage
        .update_todo_status(list_id, todo_id, completed)
        .await?;

    info!(list_id, todo_id, completed, "updated todo status");

    Ok(())
}
