use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashSet;

use crate::clock::Clock;
use crate::error::{ServiceError, is_unique_violation};
use db::models::attendance_record::{self, Status};
use db::models::{session, student};

/// Result of an end-of-session sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CloseReport {
    pub session_id: i64,
    /// Absent records the sweep created on this call.
    pub newly_absent: u64,
    /// Students whose absent write failed; the sweep kept going and a
    /// later close retries them.
    pub failed: Vec<i64>,
}

pub async fn close(
    db: &DatabaseConnection,
    session_id: i64,
    clock: &impl Clock,
) -> Result<CloseReport, ServiceError> {
    close_at(db, session_id, clock.now()).await
}

#[derive(Debug)]
enum SweepWrite {
    Created,
    /// A scan landed between the roster diff and this insert; the
    /// student is recorded, not failed.
    AlreadyRecorded,
}

async fn mark_absent(
    db: &DatabaseConnection,
    session_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<SweepWrite, sea_orm::DbErr> {
    match attendance_record::Model::create(db, session_id, student_id, Status::Absent, now).await {
        Ok(_) => Ok(SweepWrite::Created),
        Err(e) if is_unique_violation(&e) => Ok(SweepWrite::AlreadyRecorded),
        Err(e) => Err(e),
    }
}

/// Closes a session: back-fills an Absent record for every roster
/// student with no ledger entry, then marks the session closed.
///
/// Closing an already-closed session re-runs the sweep, which finds
/// nothing left to do, so the call is idempotent and also heals
/// partial failures from an earlier attempt.
pub async fn close_at(
    db: &DatabaseConnection,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<CloseReport, ServiceError> {
    if session::Model::get_by_id(db, session_id).await?.is_none() {
        return Err(ServiceError::NotFound("Session"));
    }

    let roster: Vec<i64> = student::Model::get_all(db)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let recorded: HashSet<i64> = attendance_record::Model::list_by_session(db, session_id)
        .await?
        .into_iter()
        .map(|r| r.student_id)
        .collect();

    let mut newly_absent = 0u64;
    let mut failed = Vec::new();
    for student_id in roster.into_iter().filter(|id| !recorded.contains(id)) {
        match mark_absent(db, session_id, student_id, now).await {
            Ok(SweepWrite::Created) => newly_absent += 1,
            Ok(SweepWrite::AlreadyRecorded) => {}
            // One student's failed write must not abort the rest of
            // the sweep.
            Err(e) => {
                log::warn!(
                    "failed to mark student {student_id} absent for session {session_id}: {e}"
                );
                failed.push(student_id);
            }
        }
    }

    // Flip the flag only after the sweep ran; a failure here leaves
    // the session open for a retry.
    session::Model::close(db, session_id)
        .await?
        .ok_or(ServiceError::NotFound("Session"))?;

    log::info!(
        "closed session {session_id}: {newly_absent} marked absent, {} failed",
        failed.len()
    );

    Ok(CloseReport {
        session_id,
        newly_absent,
        failed,
    })
}
