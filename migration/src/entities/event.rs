use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub creator_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub category: String,
    pub entry_fee: i64,
    pub yes_pool: i64,
    pub no_pool: i64,
    pub max_participants: Option<i32>,
    pub is_private: bool,
    /// open | closed | resolved | cancelled
    pub status: String,
    /// yes | no
    pub outcome: Option<String>,
    pub end_date: DateTimeUtc,
    pub ending_soon_notified: bool,
    pub created_at: DateTimeUtc,
    pub resolved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
