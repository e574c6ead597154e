//! Todo entity
//!
//! Table: oa_todo
//!
//! Executor assignments live inside the todo row, so finishing one executor
//! and recomputing the todo status is a single write. `executor_ids` mirrors
//! the executor user ids for list filtering.

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    #[sea_orm(num_value = 1)]
    InProgress,
    #[sea_orm(num_value = 2)]
    Finish,
    #[sea_orm(num_value = 3)]
    Cancel,
    /// Only ever derived at read time
    #[sea_orm(num_value = 4)]
    Timeout,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "createAt", default)]
    pub create_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TodoRecords(pub Vec<TodoRecord>);

/// Per-executor assignment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTodo {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    pub status: TodoStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct UserTodos(pub Vec<UserTodo>);

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oa_todo")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub creator_id: String,

    pub title: String,

    /// Unix seconds
    pub deadline_at: i64,

    #[sea_orm(column_name = "description", column_type = "Text")]
    pub desc: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub records: TodoRecords,

    #[sea_orm(column_type = "JsonBinary")]
    pub executes: UserTodos,

    pub executor_ids: String,

    pub status: TodoStatus,

    pub create_at: i64,
    pub update_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Status as shown to callers: past the deadline reads as Timeout
    pub fn effective_status(&self, now: i64) -> TodoStatus {
        if now > self.deadline_at {
            TodoStatus::Timeout
        } else {
            self.status
        }
    }

    pub fn is_executor(&self, user_id: &str) -> bool {
        self.executes.0.iter().any(|e| e.user_id == user_id)
    }
}

/// Todo list item (API response)
#[derive(Clone, Debug, Serialize)]
pub struct TodoListItem {
    pub id: String,
    #[serde(rename = "creatorId")]
    pub creator_id: String,
    pub title: String,
    #[serde(rename = "deadlineAt")]
    pub deadline_at: i64,
    pub desc: String,
    pub status: TodoStatus,
}

impl TodoListItem {
    pub fn from_model(m: Model, now: i64) -> Self {
        let status = m.effective_status(now);
        Self {
            id: m.id,
            creator_id: m.creator_id,
            title: m.title,
            deadline_at: m.deadline_at,
            desc: m.desc,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(deadline_at: i64) -> Model {
        Model {
            id: "t1".to_string(),
            creator_id: "u1".to_string(),
            title: "weekly report".to_string(),
            deadline_at,
            desc: String::new(),
            records: TodoRecords::default(),
            executes: UserTodos(vec![UserTodo {
                user_id: "u2".to_string(),
                user_name: String::new(),
                status: TodoStatus::InProgress,
            }]),
            executor_ids: super::super::encode_ids(&["u2".to_string()]),
            status: TodoStatus::InProgress,
            create_at: 0,
            update_at: 0,
        }
    }

    #[test]
    fn test_timeout_is_derived() {
        let todo = sample(100);
        assert_eq!(todo.effective_status(100), TodoStatus::InProgress);
        assert_eq!(todo.effective_status(101), TodoStatus::Timeout);
        assert_eq!(todo.status, TodoStatus::InProgress);
    }

    #[test]
    fn test_is_executor() {
        let todo = sample(100);
        assert!(todo.is_executor("u2"));
        assert!(!todo.is_executor("u1"));
    }
}
