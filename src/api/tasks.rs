//! Task and grouping endpoints.

use super::actor::Actor;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::server::AppState;
use crate::error::{AppError, AppResult};
use crate::identifier::{TaskIdentifier, parse_identifier};
use crate::types::{NewTask, Task, TaskDetail, TaskFilter, TaskStatus, TaskUpdate};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

pub(super) async fn create_task(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<NewTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let outcome = state.db.create_task(&actor, input)?;
    state.notify(&outcome.notifications);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

pub(super) async fn list_tasks(
    State(state): State<AppState>,
    Actor(_): Actor,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(state.db.list_tasks(&filter)?))
}

pub(super) async fn get_task(
    State(state): State<AppState>,
    Actor(_): Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<TaskDetail>> {
    let detail = state
        .db
        .get_task_detail(id)?
        .ok_or_else(|| AppError::task_not_found(id))?;
    Ok(Json(detail))
}

pub(super) async fn get_task_by_identifier(
    State(state): State<AppState>,
    Actor(_): Actor,
    ApiPath(task_id): ApiPath<String>,
) -> AppResult<Json<Task>> {
    let task = state
        .db
        .get_task_by_identifier(&task_id)?
        .ok_or_else(|| AppError::task_identifier_not_found(&task_id))?;
    Ok(Json(task))
}

pub(super) async fn update_task(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<TaskUpdate>,
) -> AppResult<Json<Task>> {
    let outcome = state.db.update_task(&actor, id, update)?;
    state.notify(&outcome.notifications);
    Ok(Json(outcome.value))
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    status: TaskStatus,
}

pub(super) async fn update_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> AppResult<Json<Task>> {
    let outcome = state.db.update_status(&actor, id, request.status)?;
    state.notify(&outcome.notifications);
    Ok(Json(outcome.value))
}

pub(super) async fn approve_task(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Task>> {
    let outcome = state.db.approve_task(&actor, id)?;
    state.notify(&outcome.notifications);
    Ok(Json(outcome.value))
}

pub(super) async fn delete_task(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.db.delete_task(&actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateGroupRequest {
    title: Option<String>,
    task_ids: Option<Vec<i64>>,
}

pub(super) async fn create_super_task(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(request): ApiJson<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let title = request.title.ok_or_else(|| AppError::missing_field("title"))?;
    let task_ids = request
        .task_ids
        .ok_or_else(|| AppError::missing_field("task_ids"))?;

    let outcome = state.db.create_super_task(&actor, &title, &task_ids)?;
    state.notify(&outcome.notifications);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupMutationRequest {
    super_task_id: Option<i64>,
    task_id: Option<i64>,
    action: Option<String>,
}

pub(super) async fn mutate_group(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(request): ApiJson<GroupMutationRequest>,
) -> AppResult<Json<Task>> {
    let action = request.action.ok_or_else(|| AppError::missing_field("action"))?;
    let task_id = request.task_id.ok_or_else(|| AppError::missing_field("task_id"))?;

    let task = match action.as_str() {
        "add" => {
            let super_task_id = request
                .super_task_id
                .ok_or_else(|| AppError::missing_field("super_task_id"))?;
            let outcome = state
                .db
                .add_task_to_super_task(&actor, super_task_id, task_id)?;
            state.notify(&outcome.notifications);
            outcome.value
        }
        "remove" => state.db.remove_task_from_super_task(&actor, task_id)?,
        _ => {
            return Err(AppError::invalid_value(
                "action",
                "action must be \"add\" or \"remove\"",
            ));
        }
    };
    Ok(Json(task))
}

pub(super) async fn parse_task_identifier(
    ApiPath(task_id): ApiPath<String>,
) -> AppResult<Json<TaskIdentifier>> {
    let parsed = parse_identifier(&task_id).map_err(|e| {
        AppError::invalid_value("task_id", "Not a task identifier").with_details(e.to_string())
    })?;
    Ok(Json(parsed))
}
