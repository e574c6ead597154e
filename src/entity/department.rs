//! Department entity
//!
//! Table: oa_department
//!
//! `parent_path` is the materialized ancestor chain, `:a:b` for a department
//! under `b` which is under root `a`. Roots have an empty path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oa_department")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Department name (unique across all departments)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// Parent department id (None for roots)
    #[sea_orm(nullable)]
    pub parent_id: Option<String>,

    /// Colon-delimited ancestor ids, fixed at creation
    pub parent_path: String,

    pub level: i32,

    /// User id of the department leader
    pub leader_id: String,

    pub create_at: i64,
    pub update_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Department tree node (API response)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepartmentTree {
    pub id: String,
    pub name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
    #[serde(rename = "parentPath")]
    pub parent_path: String,
    pub level: i32,
    #[serde(rename = "leaderId")]
    pub leader_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<String>,
    /// Members, only filled by the members view
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub users: Vec<super::user::UserResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<DepartmentTree>,
}

impl From<Model> for DepartmentTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
            parent_path: model.parent_path,
            level: model.level,
            leader_id: model.leader_id,
            leader: None,
            users: Vec::new(),
            children: Vec::new(),
        }
    }
}
