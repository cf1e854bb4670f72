//! Shift report endpoints.

use super::{AppState, AuthUser};
use crate::db::models::{EditEntry, Report};
use crate::db::reports::NewReport;
use crate::error::{ApiError, ApiResult};
use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize)]
pub struct ReportRequest {
    pub title: String,
    pub content: String,
    pub shift_date: String,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<Report>> {
    let report = state
        .db
        .reports()
        .create(NewReport {
            title: &request.title,
            content: &request.content,
            author_id: &user.id,
            author_name: &user.username,
            shift_date: &request.shift_date,
            status: "submitted",
            incident_id: None,
        })
        .await?;

    Ok(Json(report))
}

/// Admins see every report; everyone else only their own.
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Report>>> {
    let reports = if user.is_admin() {
        state.db.reports().list_all().await?
    } else {
        state.db.reports().list_by_author(&user.id).await?
    };
    Ok(Json(reports))
}

/// Reports organized into year/month folders.
pub async fn folders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<BTreeMap<String, Vec<Report>>>> {
    let reports = if user.is_admin() {
        state.db.reports().list_all().await?
    } else {
        state.db.reports().list_by_author(&user.id).await?
    };

    let mut folders: BTreeMap<String, Vec<Report>> = BTreeMap::new();
    for report in reports {
        let created = chrono::DateTime::from_timestamp(report.created_at, 0)
            .unwrap_or_else(chrono::Utc::now);
        let folder = format!("Berichte/{}/{}", created.format("%Y"), created.format("%B"));
        folders.entry(folder).or_default().push(report);
    }

    Ok(Json(folders))
}

/// Edit a report (author or admin), recording old and new values in the
/// edit history.
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<Report>> {
    let existing = state
        .db
        .reports()
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("report"))?;

    if existing.author_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let mut changes = BTreeMap::new();
    changes.insert(
        "title".to_string(),
        (Some(existing.title), request.title.clone()),
    );
    changes.insert(
        "content".to_string(),
        (Some(existing.content), request.content.clone()),
    );
    changes.insert(
        "shift_date".to_string(),
        (Some(existing.shift_date), request.shift_date.clone()),
    );

    let edit = EditEntry {
        edited_by: user.id.clone(),
        edited_by_name: user.username.clone(),
        edited_at: chrono::Utc::now().timestamp(),
        changes,
    };

    let updated = state
        .db
        .reports()
        .update_content(&id, &request.title, &request.content, &request.shift_date, edit)
        .await?
        .ok_or(ApiError::NotFound("report"))?;

    Ok(Json(updated))
}
