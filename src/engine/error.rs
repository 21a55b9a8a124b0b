use ulid::Ulid;

use crate::model::RecordKind;

#[derive(Debug)]
pub enum EngineError {
    NotFound(RecordKind, Ulid),
    PhoneNotFound(String),
    /// Carries the id of the reservation the request collided with.
    Conflict(Ulid),
    DuplicateSurfaceName(String),
    DuplicatePhoneNumber(String),
    Validation(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(kind, id) => write!(f, "{kind} with id {id} not found"),
            EngineError::PhoneNotFound(phone) => {
                write!(f, "customer with phone number {phone} not found")
            }
            EngineError::Conflict(id) => {
                write!(f, "reservation is overlapping with existing reservation {id}")
            }
            EngineError::DuplicateSurfaceName(name) => {
                write!(f, "surface with name {name:?} already exists")
            }
            EngineError::DuplicatePhoneNumber(phone) => {
                write!(f, "customer with phone number {phone} already exists")
            }
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
