use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;

use crate::clock::Clock;
use crate::error::{ServiceError, is_unique_violation};
use db::models::attendance_record::{self, Status};
use db::models::{qr_code, student};

/// Window after a code's creation during which a scan counts as
/// on-time. Scans after it but before expiry count as late.
pub const GRACE_PERIOD_MINUTES: i64 = 15;

/// Outcome of a scan attempt. A (session, student) pair moves from
/// unscanned into Present or Late exactly once; every later scan
/// reports `AlreadyRecorded` no matter when it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Present,
    Late,
    Expired,
    AlreadyRecorded,
}

impl ScanOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ScanOutcome::Present => "Scanned successfully, you are on time",
            ScanOutcome::Late => "Scanned successfully, but you are late",
            ScanOutcome::Expired => "QR code expired",
            ScanOutcome::AlreadyRecorded => "Already scanned",
        }
    }
}

/// How the scanned code is referenced: by QR id (the scan deep-link)
/// or by the human-enterable code value.
#[derive(Debug, Clone, Copy)]
pub enum CodeRef<'a> {
    Id(i64),
    Value(&'a str),
}

async fn resolve(
    db: &DatabaseConnection,
    code: CodeRef<'_>,
) -> Result<Option<qr_code::Model>, ServiceError> {
    let qr = match code {
        CodeRef::Id(id) => qr_code::Model::get_by_id(db, id).await?,
        CodeRef::Value(value) => qr_code::Model::get_by_code(db, value).await?,
    };
    Ok(qr)
}

pub async fn scan(
    db: &DatabaseConnection,
    code: CodeRef<'_>,
    student_id: i64,
    clock: &impl Clock,
) -> Result<ScanOutcome, ServiceError> {
    scan_at(db, code, student_id, clock.now()).await
}

/// The attendance state machine: turns a (code, student, timestamp)
/// tuple into at most one ledger row.
pub async fn scan_at(
    db: &DatabaseConnection,
    code: CodeRef<'_>,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, ServiceError> {
    let Some(qr) = resolve(db, code).await? else {
        return Err(ServiceError::NotFound("QR code"));
    };

    // Duplicate check before any expiry logic: a student who scanned
    // while the code was valid must never be told "expired" later.
    if attendance_record::Model::find(db, qr.session_id, student_id)
        .await?
        .is_some()
    {
        return Ok(ScanOutcome::AlreadyRecorded);
    }

    let on_time_deadline = qr.created_at + Duration::minutes(GRACE_PERIOD_MINUTES);
    let (status, outcome) = if now <= on_time_deadline {
        (Status::Present, ScanOutcome::Present)
    } else if !qr.is_expired(now) {
        (Status::Late, ScanOutcome::Late)
    } else {
        return Ok(ScanOutcome::Expired);
    };

    // The pre-check above is only a fast path. The ledger's composite
    // key settles concurrent scans; losing that race degrades to
    // "already recorded" instead of erroring.
    match attendance_record::Model::create(db, qr.session_id, student_id, status, now).await {
        Ok(_) => Ok(outcome),
        Err(e) if is_unique_violation(&e) => Ok(ScanOutcome::AlreadyRecorded),
        Err(e) => Err(e.into()),
    }
}

/// One roster row in a session report; `status` is `None` while the
/// student is unscanned.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub student_id: i64,
    pub username: String,
    pub status: Option<Status>,
}

/// Every student with their recorded status for the session.
pub async fn session_roster(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<Vec<RosterEntry>, ServiceError> {
    if db::models::session::Model::get_by_id(db, session_id)
        .await?
        .is_none()
    {
        return Err(ServiceError::NotFound("Session"));
    }

    let records: HashMap<i64, Status> = attendance_record::Model::list_by_session(db, session_id)
        .await?
        .into_iter()
        .map(|r| (r.student_id, r.status))
        .collect();

    let entries = student::Model::get_all(db)
        .await?
        .into_iter()
        .map(|s| RosterEntry {
            status: records.get(&s.id).copied(),
            student_id: s.id,
            username: s.username,
        })
        .collect();

    Ok(entries)
}

/// Teacher correction: overwrites the status of an existing record,
/// bypassing the scan state machine entirely.
pub async fn correct(
    db: &DatabaseConnection,
    session_id: i64,
    student_id: i64,
    status: Status,
) -> Result<attendance_record::Model, ServiceError> {
    attendance_record::Model::set_status(db, session_id, student_id, status)
        .await?
        .ok_or(ServiceError::NotFound("Attendance record"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::{session, teacher};
    use db::test_utils::setup_test_db;

    struct Ctx {
        session: session::Model,
        qr: qr_code::Model,
        issued_at: DateTime<Utc>,
    }

    async fn setup(db: &DatabaseConnection) -> Ctx {
        let t = teacher::Model::create(db, "lect1", "lect1@test.com")
            .await
            .unwrap();
        let session = session::Model::create(db, t.id, "Lecture 1").await.unwrap();
        let issued_at = Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap();
        let qr = qr_code::Model::create(db, session.id, "123456", Duration::hours(3), issued_at)
            .await
            .unwrap();
        Ctx {
            session,
            qr,
            issued_at,
        }
    }

    async fn new_student(db: &DatabaseConnection, name: &str) -> i64 {
        student::Model::create(db, name, &format!("{name}@test.com"))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn scan_at_creation_instant_is_present() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        let outcome = scan_at(&db, CodeRef::Value("123456"), stu, ctx.issued_at)
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Present);

        let rec = attendance_record::Model::find(&db, ctx.session.id, stu)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, Status::Present);
    }

    #[tokio::test]
    async fn scan_on_grace_deadline_is_present_and_one_second_after_is_late() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let deadline = ctx.issued_at + Duration::minutes(GRACE_PERIOD_MINUTES);

        let on_time = new_student(&db, "on_time").await;
        assert_eq!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), on_time, deadline)
                .await
                .unwrap(),
            ScanOutcome::Present
        );

        let late = new_student(&db, "late").await;
        assert_eq!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), late, deadline + Duration::seconds(1))
                .await
                .unwrap(),
            ScanOutcome::Late
        );
        let rec = attendance_record::Model::find(&db, ctx.session.id, late)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, Status::Late);
    }

    #[tokio::test]
    async fn scan_after_expiry_creates_no_record() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "sleeper").await;

        let after_expiry = ctx.qr.expired_at + Duration::seconds(1);
        assert_eq!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), stu, after_expiry)
                .await
                .unwrap(),
            ScanOutcome::Expired
        );
        assert!(
            attendance_record::Model::find(&db, ctx.session.id, stu)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn rescan_after_expiry_still_reports_already_recorded() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        assert_eq!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), stu, ctx.issued_at)
                .await
                .unwrap(),
            ScanOutcome::Present
        );

        // duplicate scan long after expiry must not flip to Expired
        let way_later = ctx.qr.expired_at + Duration::hours(2);
        assert_eq!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), stu, way_later)
                .await
                .unwrap(),
            ScanOutcome::AlreadyRecorded
        );

        let rec = attendance_record::Model::find(&db, ctx.session.id, stu)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, Status::Present);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found_and_writes_nothing() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        let by_value = scan_at(&db, CodeRef::Value("999999"), stu, ctx.issued_at).await;
        assert!(matches!(by_value, Err(ServiceError::NotFound(_))));

        let by_id = scan_at(&db, CodeRef::Id(ctx.qr.id + 100), stu, ctx.issued_at).await;
        assert!(matches!(by_id, Err(ServiceError::NotFound(_))));

        assert!(
            attendance_record::Model::list_by_session(&db, ctx.session.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn concurrent_scans_by_one_student_yield_a_single_record() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        let (a, b) = tokio::join!(
            scan_at(&db, CodeRef::Id(ctx.qr.id), stu, ctx.issued_at),
            scan_at(&db, CodeRef::Id(ctx.qr.id), stu, ctx.issued_at),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut outcomes = [a, b];
        outcomes.sort_by_key(|o| *o as u8);
        assert_eq!(outcomes, [ScanOutcome::Present, ScanOutcome::AlreadyRecorded]);

        assert_eq!(
            attendance_record::Model::list_by_session(&db, ctx.session.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn scan_reads_time_from_the_injected_clock() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        let clock = crate::clock::FixedClock(ctx.issued_at + Duration::minutes(5));
        assert_eq!(
            scan(&db, CodeRef::Id(ctx.qr.id), stu, &clock).await.unwrap(),
            ScanOutcome::Present
        );

        let rec = attendance_record::Model::find(&db, ctx.session.id, stu)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.created_at, clock.0);
    }

    #[tokio::test]
    async fn roster_reports_unscanned_students_with_no_status() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let present = new_student(&db, "present").await;
        let unscanned = new_student(&db, "unscanned").await;

        scan_at(&db, CodeRef::Id(ctx.qr.id), present, ctx.issued_at)
            .await
            .unwrap();

        let roster = session_roster(&db, ctx.session.id).await.unwrap();
        assert_eq!(roster.len(), 2);

        let by_id: HashMap<i64, Option<Status>> =
            roster.into_iter().map(|e| (e.student_id, e.status)).collect();
        assert_eq!(by_id[&present], Some(Status::Present));
        assert_eq!(by_id[&unscanned], None);
    }

    #[tokio::test]
    async fn correction_overwrites_and_requires_existing_record() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let stu = new_student(&db, "stud1").await;

        let missing = correct(&db, ctx.session.id, stu, Status::Present).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        scan_at(&db, CodeRef::Id(ctx.qr.id), stu, ctx.issued_at)
            .await
            .unwrap();
        let updated = correct(&db, ctx.session.id, stu, Status::Absent)
            .await
            .unwrap();
        assert_eq!(updated.status, Status::Absent);
    }
}
