use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "pipeline_runs")]
pub struct Model {
    /// UUID v4 assigned when the run starts
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_name: String,

    /// running, succeeded or failed
    pub status: String,

    pub message: Option<String>,

    pub started_at: String,

    pub finished_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stage_checks::Entity")]
    StageChecks,
}

impl Related<super::stage_checks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageChecks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
