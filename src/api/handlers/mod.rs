use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::breeds::BreedValidator;
use crate::db::{Database, Page};
use crate::error::{Entity, Error};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// JSON body returned with every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map a domain error to its HTTP status.
///
/// Rule violations go back to the client as-is. Storage failures are logged
/// server-side and the client only sees a generic message.
fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidField { .. } | Error::InvalidBreed(_) | Error::InvalidTargetCount(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::CatAssigned { .. }
        | Error::CatBusy { .. }
        | Error::AlreadyAssigned { .. }
        | Error::MissionAssigned
        | Error::MissionComplete
        | Error::MissionLocked
        | Error::TargetLocked
        | Error::IncompleteTargets { .. } => StatusCode::CONFLICT,
        Error::ValidationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if let Error::Storage(_) = e {
        tracing::error!("Internal error: {}", e);
        "Internal server error".to_string()
    } else {
        tracing::warn!("Rejected request: {}", e);
        e.to_string()
    };

    (
        status,
        Json(ErrorBody {
            error: message,
            kind: e.kind().to_string(),
        }),
    )
}

fn not_found(entity: Entity) -> ApiError {
    api_error(Error::NotFound(entity))
}

// ============================================================
// Extractors
// ============================================================

/// JSON body whose parse failures come back as `invalid_field` error bodies.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| api_error(Error::invalid("body", rejection.body_text())))
    }
}

/// Path parameters; a malformed id is an `invalid_field` error.
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| api_error(Error::invalid("path", rejection.body_text())))
    }
}

pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| api_error(Error::invalid("query", rejection.body_text())))
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Cats
// ============================================================

/// Query parameters for paginated lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        }
    }
}

pub async fn list_cats(
    State(db): State<Database>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Cat>>, ApiError> {
    db.get_all_cats(query.page()).map(Json).map_err(api_error)
}

pub async fn get_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Cat>, ApiError> {
    db.get_cat(id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| not_found(Entity::Cat))
}

pub async fn create_cat(
    State(db): State<Database>,
    State(breeds): State<BreedValidator>,
    ApiJson(input): ApiJson<CreateCatInput>,
) -> Result<(StatusCode, Json<Cat>), ApiError> {
    db.register_cat(&breeds, input)
        .await
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(api_error)
}

/// Full update: every editable field must be supplied.
pub async fn replace_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateCatInput>,
) -> Result<Json<Cat>, ApiError> {
    db.update_cat(id, input.into())
        .map(Json)
        .map_err(api_error)
}

pub async fn update_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateCatInput>,
) -> Result<Json<Cat>, ApiError> {
    db.update_cat(id, input).map(Json).map_err(api_error)
}

pub async fn delete_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    db.delete_cat(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

pub async fn get_cat_availability(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CatAvailability>, ApiError> {
    db.cat_availability(id).map(Json).map_err(api_error)
}

// ============================================================
// Missions
// ============================================================

/// Query parameters for listing missions.
#[derive(Debug, Default, Deserialize)]
pub struct ListMissionsQuery {
    pub complete: Option<bool>,
    pub cat_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list_missions(
    State(db): State<Database>,
    ApiQuery(query): ApiQuery<ListMissionsQuery>,
) -> Result<Json<Vec<MissionDetails>>, ApiError> {
    let filter = MissionFilter {
        complete: query.complete,
        cat_id: query.cat_id,
    };
    let page = Page {
        limit: query.limit,
        offset: query.offset.unwrap_or(0),
    };

    db.get_all_missions(&filter, page)
        .and_then(|missions| db.with_cat_details(missions))
        .map(Json)
        .map_err(api_error)
}

pub async fn get_mission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MissionDetails>, ApiError> {
    let mission = db
        .get_mission(id)
        .map_err(api_error)?
        .ok_or_else(|| not_found(Entity::Mission))?;
    db.mission_details(mission).map(Json).map_err(api_error)
}

pub async fn create_mission(
    State(db): State<Database>,
    ApiJson(input): ApiJson<CreateMissionInput>,
) -> Result<(StatusCode, Json<MissionDetails>), ApiError> {
    db.create_mission(input)
        .and_then(|m| db.mission_details(m))
        .map(|m| (StatusCode::CREATED, Json(m)))
        .map_err(api_error)
}

pub async fn replace_mission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ReplaceMissionInput>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.update_mission(id, input.into())
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn update_mission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateMissionInput>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.update_mission(id, input)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_mission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    db.delete_mission(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

pub async fn assign_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AssignCatInput>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.assign_cat(id, input.cat_id)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn unassign_cat(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.unassign_cat(id)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn complete_mission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.complete_mission(id)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

// ============================================================
// Targets
// ============================================================

pub async fn add_target(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateTargetInput>,
) -> Result<(StatusCode, Json<MissionDetails>), ApiError> {
    db.add_target(id, input)
        .and_then(|m| db.mission_details(m))
        .map(|m| (StatusCode::CREATED, Json(m)))
        .map_err(api_error)
}

/// Patch a target's name, country, or notes, and optionally complete it.
pub async fn update_target(
    State(db): State<Database>,
    ApiPath((id, target_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(input): ApiJson<UpdateTargetInput>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.update_target(id, target_id, input)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn remove_target(
    State(db): State<Database>,
    ApiPath((id, target_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.remove_target(id, target_id)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}

pub async fn complete_target(
    State(db): State<Database>,
    ApiPath((id, target_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<MissionDetails>, ApiError> {
    db.complete_target(id, target_id)
        .and_then(|m| db.mission_details(m))
        .map(Json)
        .map_err(api_error)
}
