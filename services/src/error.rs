use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Error taxonomy for the attendance services.
///
/// `NotFound` and `ResourceExhausted` surface to the caller as
/// terminal outcomes. `Conflict` is mostly a signal: the evaluator and
/// the closer recover it locally (see [`crate::attendance::scan_at`]),
/// and only QR issuance ever reports it outward. `Database` wraps
/// transient storage failures; every write is conditional, so retrying
/// the whole operation is safe.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("storage error: {0}")]
    Database(#[from] DbErr),
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
