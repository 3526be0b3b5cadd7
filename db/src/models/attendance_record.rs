use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};

/// Attendance status for one (session, student) pair. A single tagged
/// value — exactly one variant holds at a time, so the invalid
/// flag combinations the old boolean representation permitted cannot
/// be expressed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "absent")]
    Absent,
}

/// The attendance ledger: at most one row per (session, student),
/// enforced by the composite primary key. `create` is the only write
/// path for new rows; a later scan never overwrites an existing row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: i64,

    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id((session_id, student_id)).one(db).await
    }

    /// Conditional insert: fails with a unique-constraint error when a
    /// row already exists for the pair. Callers treat that error as
    /// "already recorded", not as a hard failure.
    pub async fn create(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: i64,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            status: Set(status),
            created_at: Set(now),
        }
        .insert(db)
        .await
    }

    pub async fn list_by_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .all(db)
            .await
    }

    /// Explicit status overwrite for teacher corrections. This is the
    /// only path that changes an existing row; scans never reach it.
    pub async fn set_status(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: i64,
        status: Status,
    ) -> Result<Option<Self>, DbErr> {
        let Some(record) = Self::find(db, session_id, student_id).await? else {
            return Ok(None);
        };

        let mut active: ActiveModel = record.into();
        active.status = Set(status);
        active.update(db).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{session, student, teacher};
    use crate::test_utils::setup_test_db;

    async fn seed(db: &DatabaseConnection) -> (session::Model, student::Model) {
        let t = teacher::Model::create(db, "lect1", "lect1@test.com")
            .await
            .unwrap();
        let s = session::Model::create(db, t.id, "Lecture 1").await.unwrap();
        let stu = student::Model::create(db, "stud1", "stud1@test.com")
            .await
            .unwrap();
        (s, stu)
    }

    #[tokio::test]
    async fn second_insert_for_pair_hits_unique_constraint() {
        let db = setup_test_db().await;
        let (sess, stu) = seed(&db).await;
        let now = Utc::now();

        Model::create(&db, sess.id, stu.id, Status::Present, now)
            .await
            .unwrap();
        let dup = Model::create(&db, sess.id, stu.id, Status::Late, now).await;
        assert!(matches!(
            dup.unwrap_err().sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ));

        // the original row is untouched
        let row = Model::find(&db, sess.id, stu.id).await.unwrap().unwrap();
        assert_eq!(row.status, Status::Present);
    }

    #[tokio::test]
    async fn set_status_overwrites_existing_row_only() {
        let db = setup_test_db().await;
        let (sess, stu) = seed(&db).await;

        assert!(
            Model::set_status(&db, sess.id, stu.id, Status::Present)
                .await
                .unwrap()
                .is_none()
        );

        Model::create(&db, sess.id, stu.id, Status::Late, Utc::now())
            .await
            .unwrap();
        let updated = Model::set_status(&db, sess.id, stu.id, Status::Absent)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, Status::Absent);
    }

    #[tokio::test]
    async fn list_by_session_is_scoped() {
        let db = setup_test_db().await;
        let (sess, stu) = seed(&db).await;
        let t2 = teacher::Model::create(&db, "lect2", "lect2@test.com")
            .await
            .unwrap();
        let other = session::Model::create(&db, t2.id, "Lecture 2")
            .await
            .unwrap();

        Model::create(&db, sess.id, stu.id, Status::Present, Utc::now())
            .await
            .unwrap();

        assert_eq!(Model::list_by_session(&db, sess.id).await.unwrap().len(), 1);
        assert!(
            Model::list_by_session(&db, other.id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
