//! Incident endpoints.
//!
//! Every mutation persists first and broadcasts only after the write is
//! acknowledged, with the full entity as the payload.

use super::{AppState, AuthUser};
use crate::db::incidents::{IncidentUpdate, NewIncident};
use crate::db::models::{GeoPoint, Incident};
use crate::db::reports::NewReport;
use crate::error::{ApiError, ApiResult};
use crate::state::{Event, Target};
use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct CreateIncidentRequest {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub location: GeoPoint,
    pub address: String,
    #[serde(default)]
    pub images: Vec<String>,
}

fn validate_priority(priority: &str) -> ApiResult<()> {
    if ["high", "medium", "low"].contains(&priority) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("unknown priority: {priority}")))
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateIncidentRequest>,
) -> ApiResult<Json<Incident>> {
    validate_priority(&request.priority)?;

    let incident = state
        .db
        .incidents()
        .create(NewIncident {
            title: &request.title,
            description: &request.description,
            priority: &request.priority,
            location: request.location,
            address: &request.address,
            reported_by: &user.id,
            images: &request.images,
        })
        .await?;

    state.hub.presence.touch_on_activity(&user.id);
    state
        .hub
        .publish(&Event::NewIncident(incident.clone()), &Target::Broadcast);

    Ok(Json(incident))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> ApiResult<Json<Vec<Incident>>> {
    Ok(Json(state.db.incidents().list_all().await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Incident>> {
    state
        .db
        .incidents()
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("incident"))
}

#[derive(Deserialize)]
pub struct UpdateIncidentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateIncidentRequest>,
) -> ApiResult<Json<Incident>> {
    if !user.can_manage_incidents() {
        return Err(ApiError::Forbidden);
    }
    if let Some(priority) = request.priority.as_deref() {
        validate_priority(priority)?;
    }

    let incident = state
        .db
        .incidents()
        .update(
            &id,
            IncidentUpdate {
                title: request.title,
                description: request.description,
                priority: request.priority,
                status: request.status,
                address: request.address,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("incident"))?;

    state.hub.presence.touch_on_activity(&user.id);
    state
        .hub
        .publish(&Event::IncidentUpdated(incident.clone()), &Target::Broadcast);

    Ok(Json(incident))
}

/// Assign the incident to the caller and move it to `in_progress`.
pub async fn assign(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Incident>> {
    if !user.can_manage_incidents() {
        return Err(ApiError::Forbidden);
    }

    let incident = state
        .db
        .incidents()
        .assign(&id, &user.id, &user.username)
        .await?
        .ok_or(ApiError::NotFound("incident"))?;

    state.hub.presence.touch_on_activity(&user.id);
    state.hub.publish(
        &Event::IncidentAssigned {
            incident_id: incident.id.clone(),
            assigned_to: user.username.clone(),
            incident: incident.clone(),
        },
        &Target::Broadcast,
    );

    Ok(Json(incident))
}

/// Complete an incident: archive it as a report, delete it from the active
/// set, and announce the completion.
pub async fn complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !user.can_manage_incidents() {
        return Err(ApiError::Forbidden);
    }

    let incident = state
        .db
        .incidents()
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("incident"))?;

    let now = chrono::Utc::now();
    let content = format!(
        "Vorfall abgeschlossen:\n\nTitel: {}\nBeschreibung: {}\nOrt: {}\nPriorität: {}\n\n\
         Abgeschlossen von: {}\nDatum: {}",
        incident.title,
        incident.description,
        incident.address,
        incident.priority,
        user.username,
        now.format("%d.%m.%Y %H:%M"),
    );

    let archive = state
        .db
        .reports()
        .create(NewReport {
            title: &format!("Archiv: {}", incident.title),
            content: &content,
            author_id: &user.id,
            author_name: &user.username,
            shift_date: &now.format("%Y-%m-%d").to_string(),
            status: "archived",
            incident_id: Some(&incident.id),
        })
        .await?;

    if !state.db.incidents().delete(&id).await? {
        return Err(ApiError::NotFound("incident"));
    }

    state.hub.presence.touch_on_activity(&user.id);
    state.hub.publish(
        &Event::IncidentCompleted {
            incident_id: id,
            completed_by: user.username.clone(),
            archived_as: archive.id.clone(),
        },
        &Target::Broadcast,
    );

    Ok(Json(json!({
        "status": "success",
        "message": "incident completed and archived",
        "archive_id": archive.id,
    })))
}

/// Remove an incident without completing it (admin correction, no broadcast).
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if !state.db.incidents().delete(&id).await? {
        return Err(ApiError::NotFound("incident"));
    }

    Ok(Json(
        json!({"status": "success", "message": "incident deleted"}),
    ))
}
