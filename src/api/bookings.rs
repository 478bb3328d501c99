//! Booking routes.

use super::{
    AppState,
    dto::{
        ApiJson, ApiPath, ApiQuery, AvailabilityQuery, BookingListQuery, CalendarQuery,
        CreateBookingRequest, ReplaceBookingPackagesRequest, StatusRequest,
    },
    error::{ApiError, ApiResult},
};
use crate::{
    core::{
        bookings::{
            self, BookingOutcome, BookingStatusOutcome, BookingSummary, BookingView, NewBooking,
        },
        capacity::{self, Availability, DailyLoad},
        lifecycle::StatusChange,
        reconcile::ReconcileSummary,
    },
    errors::Error,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, put},
};

/// Booking routes, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/availability", get(availability))
        .route("/bookings/calendar", get(calendar))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/bookings/{id}/status", patch(set_booking_status))
        .route("/bookings/{id}/packages", put(replace_booking_packages))
}

/// GET /bookings?startDate=&endDate=
async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> ApiResult<Json<Vec<BookingSummary>>> {
    let bookings = bookings::list_bookings(&state.db, query.start_date, query.end_date).await?;
    Ok(Json(bookings))
}

/// GET /bookings/availability?date=
async fn availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> ApiResult<Json<Availability>> {
    let availability = capacity::availability(&state.db, state.capacity, query.date).await?;
    Ok(Json(availability))
}

/// GET /bookings/calendar?start=&end=
async fn calendar(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CalendarQuery>,
) -> ApiResult<Json<Vec<DailyLoad>>> {
    let loads = capacity::calendar(&state.db, query.start, query.end).await?;
    Ok(Json(loads))
}

/// GET /bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<BookingView>> {
    bookings::get_booking(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::BookingNotFound { id }.into())
}

/// POST /bookings
async fn create_booking(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingView>)> {
    let new_booking = NewBooking::try_from(body)?;
    match bookings::create_booking(&state.db, state.capacity, new_booking).await? {
        BookingOutcome::Created(booking) => Ok((StatusCode::CREATED, Json(booking))),
        BookingOutcome::Rejected(rejection) => Err(ApiError::CapacityExceeded(rejection)),
    }
}

/// DELETE /bookings/{id}
async fn delete_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    bookings::delete_booking(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /bookings/{id}/status
async fn set_booking_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Json<StatusChange<i64>>> {
    match bookings::set_booking_status(&state.db, state.capacity, id, body.status).await? {
        BookingStatusOutcome::Changed(change) => Ok(Json(change)),
        BookingStatusOutcome::Rejected(rejection) => Err(ApiError::CapacityExceeded(rejection)),
    }
}

/// PUT /bookings/{id}/packages
async fn replace_booking_packages(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ReplaceBookingPackagesRequest>,
) -> ApiResult<Json<ReconcileSummary>> {
    let desired = body.into_desired()?;
    let summary = bookings::replace_booking_packages(&state.db, id, desired).await?;
    Ok(Json(summary))
}
