use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, Set};

/// A time-bounded, unique-coded artifact students scan to register
/// attendance. One session accumulates many codes over time, but
/// typically only one is inside its validity window.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "qr_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    /// Six-digit numeric code, unique across all codes ever issued.
    pub code: String,
    /// Reference to the rendered image, filled in after upload.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts a new code for a session. `expired_at` is derived from
    /// `now + validity`; a non-positive validity window is rejected so
    /// `expired_at > created_at` always holds. A duplicate code value
    /// surfaces as a unique-constraint error from the store.
    pub async fn create(
        db: &DatabaseConnection,
        session_id: i64,
        code: &str,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        if validity <= Duration::zero() {
            return Err(DbErr::Custom(
                "QR code validity window must be positive".into(),
            ));
        }

        ActiveModel {
            session_id: Set(session_id),
            code: Set(code.to_owned()),
            image_url: Set(None),
            created_at: Set(now),
            expired_at: Set(now + validity),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn get_by_code(db: &DatabaseConnection, code: &str) -> Result<Option<Self>, DbErr> {
        Entity::find().filter(Column::Code.eq(code)).one(db).await
    }

    pub async fn set_image_url(
        db: &DatabaseConnection,
        id: i64,
        image_url: &str,
    ) -> Result<Self, DbErr> {
        let Some(qr) = Entity::find_by_id(id).one(db).await? else {
            return Err(DbErr::RecordNotFound(format!("QR code ID {id} not found")));
        };

        let mut active: ActiveModel = qr.into();
        active.image_url = Set(Some(image_url.to_owned()));
        active.update(db).await
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}
