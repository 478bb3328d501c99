//! Request bodies, query strings and their conversion into core inputs.
//!
//! Money arrives as decimals and is converted to cents here; a child id that is
//! absent or `0` becomes [`DesiredChild::New`].

use super::error::{ApiError, ApiResult};
use crate::{
    core::{
        bookings::{BookingPackageLine, NewBooking},
        money,
        orders::{NewOrder, OrderFields, OrderReplacement, PackageLine, StatisticsFilter},
        reconcile::DesiredChild,
    },
    entities::Status,
    errors::{Error, Result},
};
use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};

/// JSON body extractor whose rejections use the service's error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query-string extractor whose rejections use the service's error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor; a malformed id is a 400 with the service's error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Parses `YYYY-MM-DD`, or a datetime whose time part is dropped.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

fn de_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date `{raw}`")))
}

fn de_opt_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date `{raw}`"))),
    }
}

const fn pending() -> Status {
    Status::Pending
}

const fn confirmed() -> Status {
    Status::Confirmed
}

// ========== Orders ==========

/// Caller-owned order fields shared by create and update bodies.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFieldsRequest {
    #[serde(default)]
    form_id: Option<String>,
    #[serde(default)]
    merchant_id: Option<String>,
    customer_name: String,
    #[serde(default)]
    reference_number: Option<String>,
    #[serde(default = "pending")]
    status: Status,
    #[serde(default)]
    subtotal: Decimal,
    #[serde(default)]
    deposit_paid: Decimal,
    #[serde(default)]
    balance_due: Decimal,
    #[serde(default)]
    grand_total: Decimal,
}

impl TryFrom<OrderFieldsRequest> for OrderFields {
    type Error = Error;

    fn try_from(request: OrderFieldsRequest) -> Result<Self> {
        Ok(Self {
            form_id: request.form_id,
            merchant_id: request.merchant_id,
            customer_name: request.customer_name,
            reference_number: request.reference_number,
            status: request.status,
            subtotal_cents: money::to_cents("subtotal", request.subtotal)?,
            deposit_paid_cents: money::to_cents("depositPaid", request.deposit_paid)?,
            balance_due_cents: money::to_cents("balanceDue", request.balance_due)?,
            grand_total_cents: money::to_cents("grandTotal", request.grand_total)?,
        })
    }
}

/// One line item of an order body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPackageRequest {
    #[serde(default, alias = "orderPackageId")]
    id: Option<i64>,
    package_id: String,
    #[serde(default)]
    package_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderPackageRequest {
    fn into_line(self) -> Result<(Option<i64>, PackageLine)> {
        let line = PackageLine {
            package_id: self.package_id,
            package_name: self.package_name,
            quantity: self.quantity,
            unit_price_cents: money::to_cents("unitPrice", self.unit_price)?,
        };
        Ok((self.id, line))
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    fields: OrderFieldsRequest,
    #[serde(default, alias = "orderPackages")]
    packages: Vec<OrderPackageRequest>,
}

impl TryFrom<CreateOrderRequest> for NewOrder {
    type Error = Error;

    fn try_from(request: CreateOrderRequest) -> Result<Self> {
        let packages = request
            .packages
            .into_iter()
            .map(|p| p.into_line().map(|(_, line)| line))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            fields: request.fields.try_into()?,
            packages,
        })
    }
}

/// Body of `PUT /orders/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    id: String,
    #[serde(flatten)]
    fields: OrderFieldsRequest,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    version: Option<i64>,
    #[serde(default, alias = "orderPackages")]
    packages: Option<Vec<OrderPackageRequest>>,
}

impl UpdateOrderRequest {
    /// Converts the body into a replacement for the order at `path_id`.
    ///
    /// The body must carry the id of the order it replaces; one that differs
    /// from the path is rejected.
    pub fn into_replacement(self, path_id: &str) -> ApiResult<OrderReplacement> {
        if self.id != path_id {
            return Err(ApiError::BadRequest(format!(
                "Order id mismatch: path {path_id}, body {}",
                self.id
            )));
        }

        let packages = self
            .packages
            .map(|packages| {
                packages
                    .into_iter()
                    .map(|p| {
                        let (id, line) = p.into_line()?;
                        DesiredChild::from_wire(id, line)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(OrderReplacement {
            fields: self.fields.try_into()?,
            created_at: self.created_at,
            version: self.version,
            packages,
        })
    }
}

/// Body of the status endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    /// Target status; unknown values fail to decode
    pub status: Status,
}

/// Query of `GET /orders`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    /// Only orders of this form
    pub form_id: Option<String>,
}

/// Query of `GET /orders/statistics`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    form_id: Option<String>,
    merchant_id: Option<String>,
}

impl From<StatisticsQuery> for StatisticsFilter {
    fn from(query: StatisticsQuery) -> Self {
        Self {
            form_id: query.form_id,
            merchant_id: query.merchant_id,
        }
    }
}

// ========== Bookings ==========

/// One package of a booking body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPackageRequest {
    #[serde(default, alias = "bookingPackageId")]
    id: Option<i64>,
    package_id: String,
    #[serde(default)]
    package_name: String,
    quantity: i32,
    #[serde(default)]
    no_of_pax: i32,
    unit_price: Decimal,
}

impl BookingPackageRequest {
    fn into_line(self) -> Result<(Option<i64>, BookingPackageLine)> {
        let line = BookingPackageLine {
            package_id: self.package_id,
            package_name: self.package_name,
            quantity: self.quantity,
            no_of_pax: self.no_of_pax,
            unit_price_cents: money::to_cents("unitPrice", self.unit_price)?,
        };
        Ok((self.id, line))
    }
}

/// Body of `POST /bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    order_id: String,
    #[serde(deserialize_with = "de_date")]
    booking_date: NaiveDate,
    pax_count: i32,
    #[serde(default = "confirmed")]
    status: Status,
    #[serde(default)]
    packages: Vec<BookingPackageRequest>,
}

impl TryFrom<CreateBookingRequest> for NewBooking {
    type Error = Error;

    fn try_from(request: CreateBookingRequest) -> Result<Self> {
        let packages = request
            .packages
            .into_iter()
            .map(|p| p.into_line().map(|(_, line)| line))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            order_id: request.order_id,
            booking_date: request.booking_date,
            pax_count: request.pax_count,
            status: request.status,
            packages,
        })
    }
}

/// Body of `PUT /bookings/{id}/packages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceBookingPackagesRequest {
    #[serde(alias = "bookingPackages")]
    packages: Vec<BookingPackageRequest>,
}

impl ReplaceBookingPackagesRequest {
    /// Desired package collection.
    pub fn into_desired(self) -> Result<Vec<DesiredChild<BookingPackageLine>>> {
        self.packages
            .into_iter()
            .map(|p| {
                let (id, line) = p.into_line()?;
                DesiredChild::from_wire(id, line)
            })
            .collect()
    }
}

/// Query of `GET /bookings`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    /// Inclusive lower bound
    #[serde(default, deserialize_with = "de_opt_date")]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound
    #[serde(default, deserialize_with = "de_opt_date")]
    pub end_date: Option<NaiveDate>,
}

/// Query of `GET /bookings/availability`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Date to inspect
    #[serde(deserialize_with = "de_date")]
    pub date: NaiveDate,
}

/// Query of `GET /bookings/calendar`.
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// First date, inclusive
    #[serde(deserialize_with = "de_date")]
    pub start: NaiveDate,
    /// Last date, inclusive
    #[serde(deserialize_with = "de_date")]
    pub end: NaiveDate,
}
