//! User entity
//!
//! Table: oa_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    /// Never logged in
    Inactive = 0,
    /// Normal
    Active = 1,
    /// Disabled
    Disabled = 2,
}

impl From<i32> for UserStatus {
    fn from(value: i32) -> Self {
        match value {
            0 => UserStatus::Inactive,
            1 => UserStatus::Active,
            2 => UserStatus::Disabled,
            _ => UserStatus::Inactive,
        }
    }
}

impl From<UserStatus> for i32 {
    fn from(status: UserStatus) -> Self {
        status as i32
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oa_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Login name (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// bcrypt hash
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// 0 = inactive, 1 = active, 2 = disabled
    pub status: i32,

    /// Bootstrap administrator flag
    pub is_system: bool,

    pub create_at: i64,
    pub update_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn user_status(&self) -> UserStatus {
        UserStatus::from(self.status)
    }
}

/// User response (no password)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub status: i32,
    #[serde(rename = "isSystem")]
    pub is_system: bool,
}

impl From<Model> for UserResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            status: model.status,
            is_system: model.is_system,
        }
    }
}
