use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{jwt::AuthUser, repo::User, role::Role},
    error::ApiError,
    logs::{
        dto::{AddEntryRequest, CreatedEntryResponse, EntryResponse, ListQuery, UpdateEntryRequest},
        duration::{format_hhmm, net_work_minutes, parse_date, parse_time},
        policy::{can_access, AccessPolicy, Operation},
        repo,
    },
    state::AppState,
};

pub fn log_routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_entries).post(add_entry))
        .route("/logs/:id", put(update_entry).delete(delete_entry))
}

fn policy(state: &AppState) -> AccessPolicy {
    AccessPolicy {
        senior_can_write: state.config.senior_can_write,
    }
}

/// Owner's role drives the senior rules, so policy checks on foreign rows
/// need a user lookup first.
async fn owner_role(state: &AppState, owner_id: Uuid) -> Result<Role, ApiError> {
    let owner = User::find_by_id(&state.db, owner_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(owner.role)
}

#[instrument(skip(state, payload))]
pub async fn add_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<CreatedEntryResponse>), ApiError> {
    let owner_id = payload.user_id.unwrap_or(auth.id);

    if owner_id != auth.id {
        // Filing on someone else's behalf is a write against their rows.
        let role = owner_role(&state, owner_id).await?;
        if !can_access(auth.id, auth.role, owner_id, role, Operation::Update, policy(&state)) {
            warn!(actor = %auth.id, owner = %owner_id, "add entry denied");
            return Err(ApiError::Unauthorized);
        }
    }

    let work_date = parse_date(&payload.date)?;
    let clock_in = parse_time(&payload.clock_in)?;
    let clock_out = parse_time(&payload.clock_out)?;
    let minutes = net_work_minutes(clock_in, clock_out);

    let id = repo::insert(
        &state.db,
        owner_id,
        work_date,
        clock_in,
        clock_out,
        minutes,
        payload.task_description.trim(),
    )
    .await?;

    info!(entry = %id, owner = %owner_id, "entry added");
    Ok((
        StatusCode::CREATED,
        Json(CreatedEntryResponse {
            id,
            work_duration: format_hhmm(minutes),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEntryRequest>,
) -> Result<Json<CreatedEntryResponse>, ApiError> {
    let entry = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let role = if entry.user_id == auth.id {
        auth.role
    } else {
        owner_role(&state, entry.user_id).await?
    };
    if !can_access(auth.id, auth.role, entry.user_id, role, Operation::Update, policy(&state)) {
        warn!(actor = %auth.id, entry = %id, "update denied");
        return Err(ApiError::Unauthorized);
    }

    let work_date = parse_date(&payload.date)?;
    let clock_in = parse_time(&payload.clock_in)?;
    let clock_out = parse_time(&payload.clock_out)?;
    let minutes = net_work_minutes(clock_in, clock_out);

    repo::update(
        &state.db,
        id,
        entry.user_id,
        work_date,
        clock_in,
        clock_out,
        minutes,
        payload.task_description.trim(),
    )
    .await?;

    info!(entry = %id, "entry updated");
    Ok(Json(CreatedEntryResponse {
        id,
        work_duration: format_hhmm(minutes),
    }))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let entry = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let role = if entry.user_id == auth.id {
        auth.role
    } else {
        owner_role(&state, entry.user_id).await?
    };
    if !can_access(auth.id, auth.role, entry.user_id, role, Operation::Delete, policy(&state)) {
        warn!(actor = %auth.id, entry = %id, "delete denied");
        return Err(ApiError::Unauthorized);
    }

    // Users stay owner-scoped at the SQL level as well.
    let scope = (auth.role == Role::User).then_some(auth.id);
    if !repo::delete(&state.db, id, scope).await? {
        return Err(ApiError::NotFound);
    }

    info!(entry = %id, "entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let rows = match auth.role {
        Role::User => repo::list_own(&state.db, auth.id).await?,
        Role::Senior => {
            if let Some(target) = query.user_id {
                // The target must itself be visible to a senior.
                if target != auth.id {
                    let role = owner_role(&state, target).await?;
                    if !can_access(auth.id, auth.role, target, role, Operation::Read, policy(&state)) {
                        return Err(ApiError::Unauthorized);
                    }
                }
            }
            repo::list_for_senior(&state.db, auth.id, query.user_id).await?
        }
        Role::Admin => repo::list_all(&state.db, query.user_id).await?,
    };

    Ok(Json(rows.into_iter().map(EntryResponse::from).collect()))
}
