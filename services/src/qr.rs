use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use std::future::Future;

use crate::clock::Clock;
use crate::code_generator;
use crate::error::{ServiceError, is_unique_violation};
use db::models::{qr_code, session};

/// External rendering/upload collaborator. Given the code value and
/// the URL the rendered QR should encode, returns a reference to the
/// stored image. The services never touch image bytes themselves.
pub trait QrImageUploader: Send + Sync {
    fn upload(
        &self,
        code: &str,
        target_url: &str,
    ) -> impl Future<Output = Result<Option<String>, ServiceError>> + Send;
}

/// Uploader that skips rendering entirely (tests, headless setups).
pub struct NullUploader;

impl QrImageUploader for NullUploader {
    async fn upload(&self, _code: &str, _target_url: &str) -> Result<Option<String>, ServiceError> {
        Ok(None)
    }
}

pub async fn issue_code<U: QrImageUploader>(
    db: &DatabaseConnection,
    session_id: i64,
    validity: Duration,
    target_url: &str,
    uploader: &U,
    clock: &impl Clock,
) -> Result<qr_code::Model, ServiceError> {
    issue_code_at(db, session_id, validity, target_url, uploader, clock.now()).await
}

/// Issuance with the validity window and QR target URL taken from the
/// process configuration. `Config::init` must have run.
pub async fn issue_code_from_config<U: QrImageUploader>(
    db: &DatabaseConnection,
    session_id: i64,
    uploader: &U,
    clock: &impl Clock,
) -> Result<qr_code::Model, ServiceError> {
    let config = common::config::Config::get();
    issue_code_at(
        db,
        session_id,
        Duration::hours(config.code_validity_hours),
        &config.qr_target_url,
        uploader,
        clock.now(),
    )
    .await
}

/// Issues a fresh attendance code for a session: draws a collision-free
/// code value, persists it with the given validity window, and attaches
/// the rendered image reference if the uploader produces one.
pub async fn issue_code_at<U: QrImageUploader>(
    db: &DatabaseConnection,
    session_id: i64,
    validity: Duration,
    target_url: &str,
    uploader: &U,
    now: DateTime<Utc>,
) -> Result<qr_code::Model, ServiceError> {
    if session::Model::get_by_id(db, session_id).await?.is_none() {
        return Err(ServiceError::NotFound("Session"));
    }

    let code = code_generator::generate(db).await?;

    // The generator already checked for collisions, but a concurrent
    // issuance can still win the insert; the unique index catches it.
    let qr = match qr_code::Model::create(db, session_id, &code, validity, now).await {
        Ok(qr) => qr,
        Err(e) if is_unique_violation(&e) => {
            return Err(ServiceError::Conflict(format!(
                "attendance code {code} already in use"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("issued attendance code for session {session_id}, expires {}", qr.expired_at);

    match uploader.upload(&code, target_url).await? {
        Some(url) => Ok(qr_code::Model::set_image_url(db, qr.id, &url).await?),
        None => Ok(qr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::teacher;
    use db::test_utils::setup_test_db;

    struct FakeUploader;

    impl QrImageUploader for FakeUploader {
        async fn upload(
            &self,
            code: &str,
            target_url: &str,
        ) -> Result<Option<String>, ServiceError> {
            Ok(Some(format!("https://img.test/qrcodes/{code}?to={target_url}")))
        }
    }

    async fn seed_session(db: &DatabaseConnection) -> session::Model {
        let t = teacher::Model::create(db, "lect1", "lect1@test.com")
            .await
            .unwrap();
        session::Model::create(db, t.id, "Lecture 1").await.unwrap()
    }

    #[tokio::test]
    async fn issue_for_missing_session_is_not_found() {
        let db = setup_test_db().await;
        let res = issue_code_at(
            &db,
            424242,
            Duration::hours(3),
            "https://app.test",
            &NullUploader,
            Utc::now(),
        )
        .await;
        assert!(matches!(res, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn issue_persists_validity_window() {
        let db = setup_test_db().await;
        let sess = seed_session(&db).await;
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap();

        let qr = issue_code_at(
            &db,
            sess.id,
            Duration::hours(3),
            "https://app.test",
            &NullUploader,
            now,
        )
        .await
        .unwrap();

        assert_eq!(qr.session_id, sess.id);
        assert_eq!(qr.created_at, now);
        assert_eq!(qr.expired_at, now + Duration::hours(3));
        assert!(qr.image_url.is_none());
    }

    #[tokio::test]
    async fn issue_from_config_uses_configured_window_and_target() {
        use crate::clock::FixedClock;
        use common::config::Config;

        std::env::set_var("DATABASE_PATH", "data/test.db");
        std::env::set_var("QR_TARGET_URL", "https://app.test/scan");
        std::env::set_var("CODE_VALIDITY_HOURS", "2");
        Config::init(".env.test");

        let db = setup_test_db().await;
        let sess = seed_session(&db).await;
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap();

        let qr = issue_code_from_config(&db, sess.id, &FakeUploader, &FixedClock(now))
            .await
            .unwrap();

        assert_eq!(qr.expired_at, now + Duration::hours(2));
        let url = qr.image_url.expect("image reference stored");
        assert!(url.contains("app.test/scan"));
    }

    #[tokio::test]
    async fn issue_attaches_uploaded_image_reference() {
        let db = setup_test_db().await;
        let sess = seed_session(&db).await;

        let qr = issue_code_at(
            &db,
            sess.id,
            Duration::hours(3),
            "https://app.test",
            &FakeUploader,
            Utc::now(),
        )
        .await
        .unwrap();

        let url = qr.image_url.expect("image reference stored");
        assert!(url.contains(&qr.code));
    }
}
