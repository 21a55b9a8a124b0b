//! HTTP endpoint handlers. Each one unpacks the request, calls the engine and
//! shapes the response; all business rules live in the engine.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ulid::Ulid;

use crate::model::*;

use super::error::ApiError;
use super::params::*;
use super::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> &'static str {
    "ok"
}

// ── Surfaces ─────────────────────────────────────────────

pub async fn create_surface(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<SurfaceParams>,
) -> ApiResult<(StatusCode, Json<SurfaceInfo>)> {
    let (name, minute_price) = params.require_all()?;
    let surface = state.engine.create_surface(name, minute_price).await?;
    Ok((StatusCode::CREATED, Json(surface)))
}

pub async fn list_surfaces(State(state): State<AppState>) -> Json<Vec<SurfaceInfo>> {
    Json(state.engine.list_surfaces())
}

pub async fn get_surface(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<SurfaceInfo>> {
    Ok(Json(state.engine.get_surface(id)?))
}

pub async fn update_surface(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<SurfaceParams>,
) -> ApiResult<Json<SurfaceInfo>> {
    let (name, minute_price) = params.require_all()?;
    Ok(Json(state.engine.update_surface(id, name, minute_price).await?))
}

pub async fn patch_surface(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<SurfaceParams>,
) -> ApiResult<Json<SurfaceInfo>> {
    let surface = state
        .engine
        .patch_surface(id, params.name, params.minute_price)
        .await?;
    Ok(Json(surface))
}

pub async fn delete_surface(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_surface(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Courts ───────────────────────────────────────────────

pub async fn create_court(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<CourtParams>,
) -> ApiResult<(StatusCode, Json<CourtInfo>)> {
    let (name, surface_id) = params.require_all()?;
    let court = state.engine.create_court(name, surface_id).await?;
    Ok((StatusCode::CREATED, Json(court)))
}

pub async fn list_courts(State(state): State<AppState>) -> ApiResult<Json<Vec<CourtInfo>>> {
    Ok(Json(state.engine.list_courts().await?))
}

pub async fn get_court(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<CourtInfo>> {
    Ok(Json(state.engine.get_court(id).await?))
}

pub async fn update_court(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<CourtParams>,
) -> ApiResult<Json<CourtInfo>> {
    let (name, surface_id) = params.require_all()?;
    Ok(Json(state.engine.update_court(id, name, surface_id).await?))
}

pub async fn patch_court(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<CourtParams>,
) -> ApiResult<Json<CourtInfo>> {
    let court = state
        .engine
        .patch_court(id, params.name, params.surface_id)
        .await?;
    Ok(Json(court))
}

pub async fn delete_court(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_court(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Customers ────────────────────────────────────────────

pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<CustomerParams>,
) -> ApiResult<(StatusCode, Json<CustomerInfo>)> {
    let (phone, name) = params.require_phone()?;
    let customer = state.engine.create_customer(phone, name).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<CustomerInfo>> {
    Json(state.engine.list_customers())
}

pub async fn get_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<CustomerInfo>> {
    Ok(Json(state.engine.get_customer(id)?))
}

pub async fn get_customer_by_phone(
    State(state): State<AppState>,
    ApiPath(phone): ApiPath<String>,
) -> ApiResult<Json<CustomerInfo>> {
    Ok(Json(state.engine.find_customer_by_phone(&phone)?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<CustomerParams>,
) -> ApiResult<Json<CustomerInfo>> {
    let (phone, name) = params.require_phone()?;
    Ok(Json(state.engine.update_customer(id, phone, name).await?))
}

pub async fn patch_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<CustomerParams>,
) -> ApiResult<Json<CustomerInfo>> {
    let customer = state
        .engine
        .patch_customer(id, params.phone_number, params.name)
        .await?;
    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Reservations ─────────────────────────────────────────

pub async fn create_reservation(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<ReservationParams>,
) -> ApiResult<(StatusCode, Json<ReservationInfo>)> {
    let request = NewReservation::try_from(params)?;
    let reservation = state.engine.create_reservation(request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn list_reservations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ReservationInfo>>> {
    Ok(Json(state.engine.list_reservations().await?))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<Json<ReservationInfo>> {
    Ok(Json(state.engine.get_reservation(id).await?))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<ReservationParams>,
) -> ApiResult<Json<ReservationInfo>> {
    let request = NewReservation::try_from(params)?;
    Ok(Json(state.engine.update_reservation(id, request).await?))
}

pub async fn patch_reservation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
    ApiJson(params): ApiJson<ReservationPatchParams>,
) -> ApiResult<Json<ReservationInfo>> {
    Ok(Json(state.engine.patch_reservation(id, params.into()).await?))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Ulid>,
) -> ApiResult<StatusCode> {
    state.engine.delete_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reservations_by_court(
    State(state): State<AppState>,
    ApiPath(court_id): ApiPath<Ulid>,
) -> ApiResult<Json<Vec<ReservationInfo>>> {
    Ok(Json(state.engine.reservations_by_court(court_id).await?))
}

pub async fn reservations_by_phone(
    State(state): State<AppState>,
    ApiPath(phone): ApiPath<String>,
) -> ApiResult<Json<Vec<ReservationInfo>>> {
    Ok(Json(state.engine.reservations_by_phone(&phone).await?))
}

pub async fn future_reservations_by_phone(
    State(state): State<AppState>,
    ApiPath(phone): ApiPath<String>,
) -> ApiResult<Json<Vec<ReservationInfo>>> {
    Ok(Json(state.engine.future_reservations_by_phone(&phone).await?))
}
