use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::http::context::Payload;
use crate::records::store::{self, Record};
use crate::state::AppState;

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateRecord {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecord {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub records: Vec<Record>,
    pub count: usize,
}

pub async fn list(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<RecordList>> {
    let records = store::list(state.db.pool(), caller.id()).await?;
    Ok(Json(RecordList {
        count: records.len(),
        records,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Payload(req): Payload<CreateRecord>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let title = validate_title(&req.title)?;
    let record = store::insert(state.db.pool(), caller.id(), title, &req.content).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Record>> {
    store::find(state.db.pool(), caller.id(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn update(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Payload(req): Payload<UpdateRecord>,
) -> ApiResult<Json<Record>> {
    if req.title.is_none() && req.content.is_none() {
        return Err(ApiError::Validation(
            "Provide at least one of: title, content".to_string(),
        ));
    }
    let title = req.title.as_deref().map(validate_title).transpose()?;

    store::update(state.db.pool(), caller.id(), &id, title, req.content.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if store::delete(state.db.pool(), caller.id(), &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

fn validate_title(title: &str) -> Result<&str, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title)
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Record {} not found", id))
}
