//! In-memory repositories
//!
//! Each table is a map behind its own lock. Insertion order is kept in a
//! sequence counter so "first membership" and "newest first" behave like
//! the SQL store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    ApprovalFilter, ApprovalQuery, ApprovalRepo, ChatlogQuery, ChatlogRepo, DepartmentRepo,
    DepartmentUserRepo, TodoQuery, TodoRepo, UserQuery, UserRepo,
};
use crate::entity::{approval, chatlog, department, department_user, id_pattern, todo, user};
use crate::error::{AppError, AppResult};

/// Row plus its insertion sequence
struct Row<T> {
    seq: u64,
    value: T,
}

struct Table<T> {
    next_seq: u64,
    rows: HashMap<String, Row<T>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            rows: HashMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert(&mut self, id: String, value: T) -> AppResult<()> {
        if self.rows.contains_key(&id) {
            return Err(AppError::Conflict(format!("duplicate id {}", id)));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(id, Row { seq, value });
        Ok(())
    }

    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).map(|r| r.value.clone())
    }

    fn replace(&mut self, id: &str, value: T) -> AppResult<()> {
        match self.rows.get_mut(id) {
            Some(row) => {
                row.value = value;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("row {}", id))),
        }
    }

    /// Matching rows in insertion order
    fn select(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<&Row<T>> = self.rows.values().filter(|r| pred(&r.value)).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.value.clone()).collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Table<user::Model>>,
    departments: RwLock<Table<department::Model>>,
    members: RwLock<Table<department_user::Model>>,
    approvals: RwLock<Table<approval::Model>>,
    todos: RwLock<Table<todo::Model>>,
    chatlogs: RwLock<Table<chatlog::Model>>,
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: user::Model) -> AppResult<()> {
        let mut table = self.users.write().await;
        if table.rows.values().any(|r| r.value.name == user.name) {
            return Err(AppError::Conflict(format!("user name {} exists", user.name)));
        }
        table.insert(user.id.clone(), user)
    }

    async fn find(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.users.read().await.get(id))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .users
            .read()
            .await
            .select(|u| u.name == name)
            .into_iter()
            .next())
    }

    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        Ok(self.users.read().await.select(|u| ids.contains(&u.id)))
    }

    async fn update(&self, user: user::Model) -> AppResult<()> {
        let id = user.id.clone();
        self.users.write().await.replace(&id, user)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.users.write().await.rows.remove(id);
        Ok(())
    }

    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<user::Model>, u64)> {
        let mut users = self.users.read().await.select(|u| match &query.name {
            Some(name) => u.name.contains(name.as_str()),
            None => true,
        });
        users.sort_by(|a, b| a.name.cmp(&b.name));
        let total = users.len() as u64;
        Ok((query.page.apply(users)?, total))
    }
}

#[async_trait]
impl DepartmentRepo for MemoryStore {
    async fn insert(&self, dep: department::Model) -> AppResult<()> {
        let mut table = self.departments.write().await;
        if table.rows.values().any(|r| r.value.name == dep.name) {
            return Err(AppError::Conflict(format!("department name {} exists", dep.name)));
        }
        table.insert(dep.id.clone(), dep)
    }

    async fn find(&self, id: &str) -> AppResult<Option<department::Model>> {
        Ok(self.departments.read().await.get(id))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<department::Model>> {
        Ok(self
            .departments
            .read()
            .await
            .select(|d| d.name == name)
            .into_iter()
            .next())
    }

    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<department::Model>> {
        Ok(self.departments.read().await.select(|d| ids.contains(&d.id)))
    }

    async fn all(&self) -> AppResult<Vec<department::Model>> {
        Ok(self.departments.read().await.select(|_| true))
    }

    async fn update(&self, dep: department::Model) -> AppResult<()> {
        let id = dep.id.clone();
        self.departments.write().await.replace(&id, dep)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.departments.write().await.rows.remove(id);
        Ok(())
    }
}

#[async_trait]
impl DepartmentUserRepo for MemoryStore {
    async fn insert_many(&self, edges: Vec<department_user::Model>) -> AppResult<()> {
        let mut table = self.members.write().await;
        for edge in edges {
            table.insert(edge.id.clone(), edge)?;
        }
        Ok(())
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Option<department_user::Model>> {
        Ok(self
            .members
            .read()
            .await
            .select(|m| m.user_id == user_id)
            .into_iter()
            .next())
    }

    async fn list_by_dep(&self, dep_id: &str) -> AppResult<Vec<department_user::Model>> {
        Ok(self.members.read().await.select(|m| m.dep_id == dep_id))
    }

    async fn delete_by_dep(&self, dep_id: &str) -> AppResult<()> {
        self.members
            .write()
            .await
            .rows
            .retain(|_, r| r.value.dep_id != dep_id);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> AppResult<()> {
        self.members
            .write()
            .await
            .rows
            .retain(|_, r| r.value.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl ApprovalRepo for MemoryStore {
    async fn insert(&self, approval: approval::Model) -> AppResult<()> {
        self.approvals
            .write()
            .await
            .insert(approval.id.clone(), approval)
    }

    async fn find(&self, id: &str) -> AppResult<Option<approval::Model>> {
        Ok(self.approvals.read().await.get(id))
    }

    async fn update_versioned(
        &self,
        approval: approval::Model,
        expected_version: i64,
    ) -> AppResult<bool> {
        let mut table = self.approvals.write().await;
        match table.rows.get_mut(&approval.id) {
            Some(row) if row.value.version == expected_version => {
                row.value = approval;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, query: &ApprovalQuery) -> AppResult<(Vec<approval::Model>, u64)> {
        let pattern = id_pattern(&query.user_id);
        let mut items = self.approvals.read().await.select(|a| match query.filter {
            ApprovalFilter::Submitted => a.user_id == query.user_id,
            ApprovalFilter::Audit => {
                a.user_id != query.user_id && a.participation.contains(&pattern)
            }
        });
        items.reverse();
        items.sort_by(|a, b| b.create_at.cmp(&a.create_at));
        let total = items.len() as u64;
        Ok((query.page.apply(items)?, total))
    }
}

#[async_trait]
impl TodoRepo for MemoryStore {
    async fn insert(&self, todo: todo::Model) -> AppResult<()> {
        self.todos.write().await.insert(todo.id.clone(), todo)
    }

    async fn find(&self, id: &str) -> AppResult<Option<todo::Model>> {
        Ok(self.todos.read().await.get(id))
    }

    async fn update(&self, todo: todo::Model) -> AppResult<()> {
        let id = todo.id.clone();
        self.todos.write().await.replace(&id, todo)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.todos.write().await.rows.remove(id);
        Ok(())
    }

    async fn list(&self, query: &TodoQuery) -> AppResult<(Vec<todo::Model>, u64)> {
        let pattern = id_pattern(&query.user_id);
        let mut items = self.todos.read().await.select(|t| {
            (t.creator_id == query.user_id || t.executor_ids.contains(&pattern))
                && query.start_time.map_or(true, |s| t.deadline_at >= s)
                && query.end_time.map_or(true, |e| t.deadline_at <= e)
        });
        items.reverse();
        items.sort_by(|a, b| b.create_at.cmp(&a.create_at));
        let total = items.len() as u64;
        Ok((query.page.apply(items)?, total))
    }
}

#[async_trait]
impl ChatlogRepo for MemoryStore {
    async fn insert(&self, log: chatlog::Model) -> AppResult<()> {
        self.chatlogs.write().await.insert(log.id.clone(), log)
    }

    async fn list(&self, query: &ChatlogQuery) -> AppResult<Vec<chatlog::Model>> {
        let mut items = self.chatlogs.read().await.select(|c| {
            c.conversation_id == query.conversation_id
                && query.start_send_time.map_or(true, |s| c.send_time >= s)
                && query.end_send_time.map_or(true, |e| c.send_time <= e)
        });
        items.sort_by_key(|c| c.send_time);
        if query.limit > 0 {
            items.truncate(query.limit as usize);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::approval::{ApprovalStatus, ApprovalType, Approvers};
    use crate::store::Page;

    fn approval(id: &str, user_id: &str, participation: &str, create_at: i64) -> approval::Model {
        approval::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            no: "00000000000".to_string(),
            approval_type: ApprovalType::General,
            status: ApprovalStatus::Processed,
            title: String::new(),
            summary: String::new(),
            reason: String::new(),
            approval_id: String::new(),
            approval_idx: 0,
            approvers: Approvers::default(),
            participation: participation.to_string(),
            payload: None,
            version: 0,
            finish_at: 0,
            finish_day: 0,
            finish_month: 0,
            finish_year: 0,
            create_at,
            update_at: create_at,
        }
    }

    #[tokio::test]
    async fn test_update_versioned_rejects_stale_version() {
        let store = MemoryStore::default();
        ApprovalRepo::insert(&store, approval("a1", "u1", ",l,u1,", 1))
            .await
            .unwrap();

        let mut next = approval("a1", "u1", ",l,u1,", 1);
        next.version = 1;
        assert!(store.update_versioned(next.clone(), 0).await.unwrap());
        // Second writer still holds version 0
        assert!(!store.update_versioned(next, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_approval_list_filters() {
        let store = MemoryStore::default();
        ApprovalRepo::insert(&store, approval("a1", "u1", ",l,u1,", 1)).await.unwrap();
        ApprovalRepo::insert(&store, approval("a2", "u2", ",u1,u2,", 2)).await.unwrap();
        ApprovalRepo::insert(&store, approval("a3", "u2", ",l,u2,", 3)).await.unwrap();

        let submitted = ApprovalQuery {
            user_id: "u1".to_string(),
            filter: ApprovalFilter::Submitted,
            page: Page::default(),
        };
        let (items, total) = ApprovalRepo::list(&store, &submitted).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, "a1");

        let audit = ApprovalQuery {
            filter: ApprovalFilter::Audit,
            ..submitted
        };
        let (items, _) = ApprovalRepo::list(&store, &audit).await.unwrap();
        assert_eq!(items.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["a2"]);
    }

    #[tokio::test]
    async fn test_first_membership_wins() {
        let store = MemoryStore::default();
        let edge = |id: &str, dep: &str| department_user::Model {
            id: id.to_string(),
            dep_id: dep.to_string(),
            user_id: "u1".to_string(),
            create_at: 0,
        };
        store
            .insert_many(vec![edge("e1", "d1"), edge("e2", "d2")])
            .await
            .unwrap();
        let found = store.find_by_user("u1").await.unwrap().unwrap();
        assert_eq!(found.dep_id, "d1");
    }
}
