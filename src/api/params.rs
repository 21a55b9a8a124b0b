use axum::extract::{FromRequest, FromRequestParts};
use serde::Deserialize;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Ms, NewReservation, ReservationChange};

use super::error::ApiError;

/// `Json` whose rejection renders as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejection renders as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

fn required<T>(value: Option<T>, message: &'static str) -> Result<T, EngineError> {
    value.ok_or(EngineError::Validation(message))
}

/// Body of surface create, update and patch. Create and update need every field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceParams {
    pub name: Option<String>,
    pub minute_price: Option<u32>,
}

impl SurfaceParams {
    pub fn require_all(self) -> Result<(String, u32), EngineError> {
        Ok((
            required(self.name, "name is required")?,
            required(self.minute_price, "minutePrice is required")?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtParams {
    pub name: Option<String>,
    pub surface_id: Option<Ulid>,
}

impl CourtParams {
    pub fn require_all(self) -> Result<(String, Ulid), EngineError> {
        Ok((
            required(self.name, "name is required")?,
            required(self.surface_id, "surfaceId is required")?,
        ))
    }
}

/// Customer body. `name` stays optional even on create.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerParams {
    pub phone_number: Option<String>,
    pub name: Option<String>,
}

impl CustomerParams {
    pub fn require_phone(self) -> Result<(String, Option<String>), EngineError> {
        Ok((
            required(self.phone_number, "phoneNumber is required")?,
            self.name,
        ))
    }
}

/// Reservation create / full update body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationParams {
    pub court_id: Option<Ulid>,
    pub customer_phone_number: Option<String>,
    pub customer_name: Option<String>,
    pub is_doubles: Option<bool>,
    pub starts_at: Option<Ms>,
    pub ends_at: Option<Ms>,
}

impl TryFrom<ReservationParams> for NewReservation {
    type Error = EngineError;

    fn try_from(p: ReservationParams) -> Result<Self, Self::Error> {
        Ok(NewReservation {
            court_id: required(p.court_id, "courtId is required")?,
            phone_number: required(p.customer_phone_number, "customerPhoneNumber is required")?,
            customer_name: Some(required(p.customer_name, "customerName is required")?),
            doubles: required(p.is_doubles, "isDoubles is required")?,
            starts_at: required(p.starts_at, "startsAt is required")?,
            ends_at: required(p.ends_at, "endsAt is required")?,
        })
    }
}

/// Reservation patch body: any subset of fields, plus `createdAt`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatchParams {
    pub court_id: Option<Ulid>,
    pub customer_phone_number: Option<String>,
    pub customer_name: Option<String>,
    pub is_doubles: Option<bool>,
    pub starts_at: Option<Ms>,
    pub ends_at: Option<Ms>,
    pub created_at: Option<Ms>,
}

impl From<ReservationPatchParams> for ReservationChange {
    fn from(p: ReservationPatchParams) -> Self {
        ReservationChange {
            court_id: p.court_id,
            phone_number: p.customer_phone_number,
            customer_name: p.customer_name,
            doubles: p.is_doubles,
            starts_at: p.starts_at,
            ends_at: p.ends_at,
            created_at: p.created_at,
        }
    }
}
