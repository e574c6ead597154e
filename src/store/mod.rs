//! Repository traits
//!
//! Services only talk to these traits. `sql` backs them with SeaORM,
//! `memory` with in-process maps (used by `database.type = "memory"` and by
//! tests).

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;

use crate::entity::{approval, chatlog, department, department_user, todo, user};
use crate::error::{AppError, AppResult};

pub use memory::MemoryStore;
pub use sql::SqlStore;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// 1-based pagination
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count: u64,
}

pub fn default_page() -> u64 {
    1
}

pub fn default_count() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: default_page(),
            count: default_count(),
        }
    }
}

impl Page {
    pub fn new(page: u64, count: u64) -> Self {
        Self { page, count }
    }

    pub fn limit(&self) -> u64 {
        match self.count {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip. Must fit a signed 64-bit SQL offset.
    pub fn offset(&self) -> AppResult<u64> {
        (self.page.max(1) - 1)
            .checked_mul(self.limit())
            .filter(|offset| *offset <= i64::MAX as u64)
            .ok_or_else(|| AppError::Validation(format!("page {} is out of range", self.page)))
    }

    /// Slice an already-sorted in-memory result
    pub fn apply<T>(&self, items: Vec<T>) -> AppResult<Vec<T>> {
        let skip = usize::try_from(self.offset()?).unwrap_or(usize::MAX);
        Ok(items
            .into_iter()
            .skip(skip)
            .take(self.limit() as usize)
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Substring match on the login name
    pub name: Option<String>,
    pub page: Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalFilter {
    /// Submitted by the user
    Submitted,
    /// The user participates but did not submit
    Audit,
}

#[derive(Debug, Clone)]
pub struct ApprovalQuery {
    pub user_id: String,
    pub filter: ApprovalFilter,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct TodoQuery {
    /// Creator or executor
    pub user_id: String,
    /// Deadline window, inclusive
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct ChatlogQuery {
    pub conversation_id: String,
    /// Send time window, inclusive
    pub start_send_time: Option<i64>,
    pub end_send_time: Option<i64>,
    /// 0 = no limit
    pub limit: u64,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: user::Model) -> AppResult<()>;
    async fn find(&self, id: &str) -> AppResult<Option<user::Model>>;
    async fn find_by_name(&self, name: &str) -> AppResult<Option<user::Model>>;
    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<user::Model>>;
    async fn update(&self, user: user::Model) -> AppResult<()>;
    async fn delete(&self, id: &str) -> AppResult<()>;
    /// Page of users ordered by name, plus the total match count
    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<user::Model>, u64)>;
}

#[async_trait]
pub trait DepartmentRepo: Send + Sync {
    async fn insert(&self, dep: department::Model) -> AppResult<()>;
    async fn find(&self, id: &str) -> AppResult<Option<department::Model>>;
    async fn find_by_name(&self, name: &str) -> AppResult<Option<department::Model>>;
    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<department::Model>>;
    async fn all(&self) -> AppResult<Vec<department::Model>>;
    async fn update(&self, dep: department::Model) -> AppResult<()>;
    async fn delete(&self, id: &str) -> AppResult<()>;
}

#[async_trait]
pub trait DepartmentUserRepo: Send + Sync {
    async fn insert_many(&self, edges: Vec<department_user::Model>) -> AppResult<()>;
    /// First membership edge of the user, if any
    async fn find_by_user(&self, user_id: &str) -> AppResult<Option<department_user::Model>>;
    async fn list_by_dep(&self, dep_id: &str) -> AppResult<Vec<department_user::Model>>;
    async fn delete_by_dep(&self, dep_id: &str) -> AppResult<()>;
    async fn delete_by_user(&self, user_id: &str) -> AppResult<()>;
}

#[async_trait]
pub trait ApprovalRepo: Send + Sync {
    async fn insert(&self, approval: approval::Model) -> AppResult<()>;
    async fn find(&self, id: &str) -> AppResult<Option<approval::Model>>;
    /// Replace the row only if its stored version is still `expected_version`.
    /// Returns false when another writer got there first.
    async fn update_versioned(
        &self,
        approval: approval::Model,
        expected_version: i64,
    ) -> AppResult<bool>;
    /// Newest first
    async fn list(&self, query: &ApprovalQuery) -> AppResult<(Vec<approval::Model>, u64)>;
}

#[async_trait]
pub trait TodoRepo: Send + Sync {
    async fn insert(&self, todo: todo::Model) -> AppResult<()>;
    async fn find(&self, id: &str) -> AppResult<Option<todo::Model>>;
    async fn update(&self, todo: todo::Model) -> AppResult<()>;
    async fn delete(&self, id: &str) -> AppResult<()>;
    /// Newest first
    async fn list(&self, query: &TodoQuery) -> AppResult<(Vec<todo::Model>, u64)>;
}

#[async_trait]
pub trait ChatlogRepo: Send + Sync {
    async fn insert(&self, log: chatlog::Model) -> AppResult<()>;
    /// Oldest first
    async fn list(&self, query: &ChatlogQuery) -> AppResult<Vec<chatlog::Model>>;
}

/// Every repository the services need
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepo>,
    pub departments: Arc<dyn DepartmentRepo>,
    pub members: Arc<dyn DepartmentUserRepo>,
    pub approvals: Arc<dyn ApprovalRepo>,
    pub todos: Arc<dyn TodoRepo>,
    pub chatlogs: Arc<dyn ChatlogRepo>,
}

impl Stores {
    pub fn sql(db: DatabaseConnection) -> Self {
        let store = Arc::new(SqlStore::new(db));
        Self {
            users: store.clone(),
            departments: store.clone(),
            members: store.clone(),
            approvals: store.clone(),
            todos: store.clone(),
            chatlogs: store,
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            users: store.clone(),
            departments: store.clone(),
            members: store.clone(),
            approvals: store.clone(),
            todos: store.clone(),
            chatlogs: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::new(1, 10).offset().unwrap(), 0);
        assert_eq!(Page::new(3, 10).offset().unwrap(), 20);
        assert_eq!(Page::new(0, 10).offset().unwrap(), 0);
        assert_eq!(Page::new(1, 0).limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(Page::new(1, 1000).limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_apply() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(
            Page::new(3, 10).apply(items.clone()).unwrap(),
            vec![20, 21, 22, 23, 24]
        );
        assert!(Page::new(4, 10).apply(items).unwrap().is_empty());
    }

    #[test]
    fn test_huge_page_is_rejected() {
        assert!(matches!(
            Page::new(u64::MAX, 10).offset(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Page::new(u64::MAX, 10).apply(vec![1, 2, 3]),
            Err(AppError::Validation(_))
        ));

        let last_ok = i64::MAX as u64 / 10 + 1;
        assert!(Page::new(last_ok, 10).offset().is_ok());
        assert!(Page::new(last_ok + 1, 10).offset().is_err());
    }
}
