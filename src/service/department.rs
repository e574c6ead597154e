//! Department management

use serde::Deserialize;
use std::collections::HashMap;

use super::{dept_tree, new_id, now_unix};
use crate::entity::department::{self, DepartmentTree};
use crate::entity::department_user;
use crate::entity::user::UserResponse;
use crate::error::{AppError, AppResult, OptionExt};
use crate::store::Stores;

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub level: i32,
    #[serde(rename = "leaderId")]
    pub leader_id: String,
}

/// Parent and path are fixed at creation and cannot be edited
#[derive(Debug, Deserialize)]
pub struct EditDepartmentRequest {
    pub id: String,
    pub name: Option<String>,
    pub level: Option<i32>,
    #[serde(rename = "leaderId")]
    pub leader_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetDepartmentUsersRequest {
    #[serde(rename = "depId")]
    pub dep_id: String,
    #[serde(rename = "userIds", default)]
    pub user_ids: Vec<String>,
}

#[derive(Clone)]
pub struct DepartmentService {
    stores: Stores,
}

impl DepartmentService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Whole hierarchy as a forest
    pub async fn soa(&self) -> AppResult<Vec<DepartmentTree>> {
        let deps = self.stores.departments.all().await?;
        Ok(dept_tree::build_forest(deps))
    }

    pub async fn info(&self, id: &str) -> AppResult<DepartmentTree> {
        let dep = self
            .stores
            .departments
            .find(id)
            .await?
            .ok_or_not_found(format!("department {}", id))?;
        let leader = self.stores.users.find(&dep.leader_id).await?;

        let mut tree = DepartmentTree::from(dep);
        tree.leader = leader.map(|u| u.name);
        Ok(tree)
    }

    /// Create a department and enrol its leader as a member
    pub async fn create(&self, req: CreateDepartmentRequest) -> AppResult<String> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("department name is required".to_string()));
        }
        if self.stores.departments.find_by_name(&name).await?.is_some() {
            return Err(AppError::Validation(format!("department {} already exists", name)));
        }
        self.stores
            .users
            .find(&req.leader_id)
            .await?
            .ok_or_not_found(format!("leader {}", req.leader_id))?;

        let parent_id = req.parent_id.filter(|p| !p.is_empty());
        let parent_path = match &parent_id {
            Some(pid) => {
                let parent = self
                    .stores
                    .departments
                    .find(pid)
                    .await?
                    .ok_or_not_found(format!("parent department {}", pid))?;
                dept_tree::append_child_path(&parent.parent_path, &parent.id)
            }
            None => String::new(),
        };

        let now = now_unix();
        let id = new_id();
        self.stores
            .departments
            .insert(department::Model {
                id: id.clone(),
                name: name.clone(),
                parent_id,
                parent_path,
                level: req.level,
                leader_id: req.leader_id.clone(),
                create_at: now,
                update_at: now,
            })
            .await?;

        self.stores
            .members
            .insert_many(vec![department_user::Model {
                id: new_id(),
                dep_id: id.clone(),
                user_id: req.leader_id,
                create_at: now,
            }])
            .await?;

        tracing::info!("Created department {} ({})", name, id);
        Ok(id)
    }

    pub async fn edit(&self, req: EditDepartmentRequest) -> AppResult<()> {
        let mut dep = self
            .stores
            .departments
            .find(&req.id)
            .await?
            .ok_or_not_found(format!("department {}", req.id))?;

        if let Some(name) = req.name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::Validation("department name is required".to_string()));
            }
            if let Some(other) = self.stores.departments.find_by_name(&name).await? {
                if other.id != dep.id {
                    return Err(AppError::Validation(format!(
                        "department {} already exists",
                        name
                    )));
                }
            }
            dep.name = name;
        }
        if let Some(level) = req.level {
            dep.level = level;
        }
        if let Some(leader_id) = req.leader_id {
            self.stores
                .users
                .find(&leader_id)
                .await?
                .ok_or_not_found(format!("leader {}", leader_id))?;
            dep.leader_id = leader_id;
        }

        dep.update_at = now_unix();
        self.stores.departments.update(dep).await
    }

    /// Delete a department that has no members besides its leader.
    /// Deleting a missing department succeeds.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let Some(dep) = self.stores.departments.find(id).await? else {
            return Ok(());
        };

        let members = self.stores.members.list_by_dep(id).await?;
        let only_leader = members.iter().all(|m| m.user_id == dep.leader_id);
        if members.len() > 1 || !only_leader {
            return Err(AppError::Validation(format!(
                "department {} still has members",
                dep.name
            )));
        }

        self.stores.members.delete_by_dep(id).await?;
        self.stores.departments.delete(id).await?;
        tracing::info!("Deleted department {} ({})", dep.name, id);
        Ok(())
    }

    /// Replace the member set of a department
    pub async fn set_users(&self, req: SetDepartmentUsersRequest) -> AppResult<()> {
        self.stores
            .departments
            .find(&req.dep_id)
            .await?
            .ok_or_not_found(format!("department {}", req.dep_id))?;

        let mut user_ids = req.user_ids;
        user_ids.sort();
        user_ids.dedup();

        self.stores.members.delete_by_dep(&req.dep_id).await?;

        let now = now_unix();
        let edges = user_ids
            .into_iter()
            .map(|user_id| department_user::Model {
                id: new_id(),
                dep_id: req.dep_id.clone(),
                user_id,
                create_at: now,
            })
            .collect();
        self.stores.members.insert_many(edges).await
    }

    /// Lineage from the root down to the department, with its members
    pub async fn members(&self, id: &str) -> AppResult<DepartmentTree> {
        let dep = self
            .stores
            .departments
            .find(id)
            .await?
            .ok_or_not_found(format!("department {}", id))?;

        let user_ids: Vec<String> = self
            .stores
            .members
            .list_by_dep(id)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        let users: Vec<UserResponse> = self
            .stores
            .users
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

        let ancestor_ids = dept_tree::ancestor_chain(&dep.parent_path);
        let resolved: HashMap<String, department::Model> = self
            .stores
            .departments
            .find_many(&ancestor_ids)
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let mut tree = dept_tree::lineage(dep, &resolved);
        let mut leaf = &mut tree;
        while !leaf.children.is_empty() {
            leaf = &mut leaf.children[0];
        }
        leaf.users = users;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::user;

    async fn service_with_users(ids: &[&str]) -> (DepartmentService, Stores) {
        let stores = Stores::memory();
        for id in ids {
            stores
                .users
                .insert(user::Model {
                    id: id.to_string(),
                    name: format!("name-{}", id),
                    password: String::new(),
                    status: 1,
                    is_system: false,
                    create_at: 0,
                    update_at: 0,
                })
                .await
                .unwrap();
        }
        (DepartmentService::new(stores.clone()), stores)
    }

    fn create(name: &str, parent: Option<&str>, leader: &str) -> CreateDepartmentRequest {
        CreateDepartmentRequest {
            name: name.to_string(),
            parent_id: parent.map(str::to_string),
            level: 0,
            leader_id: leader.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_builds_path_and_enrols_leader() {
        let (svc, stores) = service_with_users(&["a", "b"]).await;
        let root = svc.create(create("hq", None, "a")).await.unwrap();
        let child = svc.create(create("eng", Some(&root), "b")).await.unwrap();

        let child_dep = stores.departments.find(&child).await.unwrap().unwrap();
        assert_eq!(child_dep.parent_path, format!(":{}", root));

        let members = stores.members.list_by_dep(&child).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "b");

        let forest = svc.soa().await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].id, child);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (svc, _) = service_with_users(&["a"]).await;
        svc.create(create("hq", None, "a")).await.unwrap();
        let err = svc.create(create("hq", None, "a")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_only_when_leader_is_sole_member() {
        let (svc, _) = service_with_users(&["a", "b"]).await;
        let id = svc.create(create("hq", None, "a")).await.unwrap();

        svc.set_users(SetDepartmentUsersRequest {
            dep_id: id.clone(),
            user_ids: vec!["a".to_string(), "b".to_string()],
        })
        .await
        .unwrap();
        assert!(matches!(svc.delete(&id).await, Err(AppError::Validation(_))));

        svc.set_users(SetDepartmentUsersRequest {
            dep_id: id.clone(),
            user_ids: vec!["a".to_string()],
        })
        .await
        .unwrap();
        svc.delete(&id).await.unwrap();
        assert!(matches!(svc.info(&id).await, Err(AppError::NotFound(_))));
        // Deleting again is a no-op
        svc.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_rechecks_name() {
        let (svc, _) = service_with_users(&["a"]).await;
        let hq = svc.create(create("hq", None, "a")).await.unwrap();
        svc.create(create("ops", None, "a")).await.unwrap();

        let err = svc
            .edit(EditDepartmentRequest {
                id: hq.clone(),
                name: Some("ops".to_string()),
                level: None,
                leader_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        svc.edit(EditDepartmentRequest {
            id: hq.clone(),
            name: Some("head office".to_string()),
            level: Some(1),
            leader_id: None,
        })
        .await
        .unwrap();
        let info = svc.info(&hq).await.unwrap();
        assert_eq!(info.name, "head office");
        assert_eq!(info.leader.as_deref(), Some("name-a"));
    }

    #[tokio::test]
    async fn test_members_view_is_lineage() {
        let (svc, _) = service_with_users(&["a", "b", "c"]).await;
        let hq = svc.create(create("hq", None, "a")).await.unwrap();
        let eng = svc.create(create("eng", Some(&hq), "b")).await.unwrap();
        svc.set_users(SetDepartmentUsersRequest {
            dep_id: eng.clone(),
            user_ids: vec!["b".to_string(), "c".to_string()],
        })
        .await
        .unwrap();

        let tree = svc.members(&eng).await.unwrap();
        assert_eq!(tree.id, hq);
        assert!(tree.users.is_empty());
        assert_eq!(tree.children.len(), 1);
        let leaf = &tree.children[0];
        assert_eq!(leaf.id, eng);
        let mut names: Vec<&str> = leaf.users.iter().map(|u| u.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["name-b", "name-c"]);
    }
}
