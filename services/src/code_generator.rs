use rand::Rng;
use sea_orm::DatabaseConnection;

use crate::error::ServiceError;
use db::models::qr_code;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;
/// The code space only holds ~900k values, so collisions get likelier
/// as codes accumulate. Bounded retries instead of spinning forever.
pub const MAX_ATTEMPTS: u32 = 32;

/// Draws a 6-digit numeric code that no existing QR code uses.
///
/// The check here keeps collisions rare; the unique index on the
/// `qr_codes.code` column is what actually guarantees uniqueness under
/// concurrent issuance.
pub async fn generate(db: &DatabaseConnection) -> Result<String, ServiceError> {
    for _ in 0..MAX_ATTEMPTS {
        let code = rand::thread_rng()
            .gen_range(CODE_MIN..=CODE_MAX)
            .to_string();
        if qr_code::Model::get_by_code(db, &code).await?.is_none() {
            return Ok(code);
        }
        log::debug!("attendance code {code} already in use, redrawing");
    }

    Err(ServiceError::ResourceExhausted(format!(
        "no unused attendance code found after {MAX_ATTEMPTS} attempts"
    )))
}
