use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};

/// A teacher-initiated attendance window for a class meeting.
///
/// Title and owner are immutable after creation; only the `closed`
/// flag mutates, and only through the close path.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
    #[sea_orm(has_many = "super::qr_code::Entity")]
    QrCodes,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::qr_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QrCodes.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        teacher_id: i64,
        title: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            teacher_id: Set(teacher_id),
            title: Set(title.to_owned()),
            closed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn get_all(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        Entity::find().all(db).await
    }

    /// Marks the session closed. Closing an already-closed session
    /// returns the row unchanged.
    pub async fn close(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        let Some(session) = Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        if session.closed {
            return Ok(Some(session));
        }

        let mut active: ActiveModel = session.into();
        active.closed = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(db).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::teacher;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn close_is_idempotent() {
        let db = setup_test_db().await;

        let t = teacher::Model::create(&db, "lect1", "lect1@test.com")
            .await
            .unwrap();
        let s = Model::create(&db, t.id, "Lecture 1").await.unwrap();
        assert!(!s.closed);

        let closed = Model::close(&db, s.id).await.unwrap().unwrap();
        assert!(closed.closed);

        let again = Model::close(&db, s.id).await.unwrap().unwrap();
        assert!(again.closed);
        assert_eq!(again.updated_at, closed.updated_at);
    }

    #[tokio::test]
    async fn close_missing_session_returns_none() {
        let db = setup_test_db().await;
        assert!(Model::close(&db, 9999).await.unwrap().is_none());
    }
}
