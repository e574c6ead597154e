//! To-dos with per-executor completion

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{new_id, now_unix};
use crate::entity::encode_ids;
use crate::entity::todo::{self, TodoListItem, TodoRecord, TodoRecords, TodoStatus, UserTodo, UserTodos};
use crate::error::{AppError, AppResult, OptionExt};
use crate::store::{default_count, default_page, Page, Stores, TodoQuery};

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(rename = "deadlineAt")]
    pub deadline_at: i64,
    #[serde(default)]
    pub desc: String,
    /// Empty assigns the todo to its creator
    #[serde(rename = "executeIds", default)]
    pub execute_ids: Vec<String>,
    #[serde(default)]
    pub records: Vec<TodoRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EditTodoRequest {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "deadlineAt")]
    pub deadline_at: Option<i64>,
    pub desc: Option<String>,
    /// Replaces the executor set; executors that stay keep their status
    #[serde(rename = "executeIds")]
    pub execute_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct FinishTodoRequest {
    #[serde(rename = "todoId")]
    pub todo_id: String,
    /// Executor being marked finished, defaults to the caller
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    #[serde(rename = "todoId")]
    pub todo_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct TodoListRequest {
    #[serde(rename = "startTime")]
    pub start_time: Option<i64>,
    #[serde(rename = "endTime")]
    pub end_time: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct TodoListResponse {
    pub count: u64,
    pub list: Vec<TodoListItem>,
}

#[derive(Debug, Serialize)]
pub struct TodoInfo {
    pub id: String,
    #[serde(rename = "creatorId")]
    pub creator_id: String,
    #[serde(rename = "creatorName")]
    pub creator_name: String,
    pub title: String,
    #[serde(rename = "deadlineAt")]
    pub deadline_at: i64,
    pub desc: String,
    pub records: Vec<TodoRecord>,
    pub executes: Vec<UserTodo>,
    pub status: TodoStatus,
    #[serde(rename = "createAt")]
    pub create_at: i64,
}

/// Drop blanks and repeats, keeping first-seen order
fn normalize_ids(mut ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.retain(|id| !id.is_empty() && seen.insert(id.clone()));
    ids
}

fn executors_of(ids: &[String]) -> Vec<UserTodo> {
    ids.iter()
        .map(|id| UserTodo {
            user_id: id.clone(),
            user_name: String::new(),
            status: TodoStatus::InProgress,
        })
        .collect()
}

fn executor_ids(executes: &[UserTodo]) -> Vec<String> {
    executes.iter().map(|e| e.user_id.clone()).collect()
}

/// Finish iff every executor finished
fn aggregate_status(executes: &[UserTodo]) -> TodoStatus {
    if !executes.is_empty() && executes.iter().all(|e| e.status == TodoStatus::Finish) {
        TodoStatus::Finish
    } else {
        TodoStatus::InProgress
    }
}

#[derive(Clone)]
pub struct TodoService {
    stores: Stores,
}

impl TodoService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    async fn load(&self, id: &str) -> AppResult<todo::Model> {
        self.stores
            .todos
            .find(id)
            .await?
            .ok_or_not_found(format!("todo {}", id))
    }

    pub async fn info(&self, id: &str) -> AppResult<TodoInfo> {
        let todo = self.load(id).await?;

        let mut uids = executor_ids(&todo.executes.0);
        uids.push(todo.creator_id.clone());
        let names: HashMap<String, String> = self
            .stores
            .users
            .find_many(&uids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let creator_name = names.get(&todo.creator_id).cloned().ok_or_else(|| {
            AppError::NotFound(format!("creator {} of todo {}", todo.creator_id, todo.id))
        })?;

        let status = todo.effective_status(now_unix());
        let executes = todo
            .executes
            .0
            .into_iter()
            .map(|mut e| {
                e.user_name = names.get(&e.user_id).cloned().unwrap_or_default();
                e
            })
            .collect();

        Ok(TodoInfo {
            id: todo.id,
            creator_id: todo.creator_id,
            creator_name,
            title: todo.title,
            deadline_at: todo.deadline_at,
            desc: todo.desc,
            records: todo.records.0,
            executes,
            status,
            create_at: todo.create_at,
        })
    }

    pub async fn create(&self, creator_id: &str, req: CreateTodoRequest) -> AppResult<String> {
        if req.title.trim().is_empty() {
            return Err(AppError::Validation("todo title is required".to_string()));
        }

        let mut ids = normalize_ids(req.execute_ids);
        if ids.is_empty() {
            ids.push(creator_id.to_string());
        }

        let now = now_unix();
        let id = new_id();
        self.stores
            .todos
            .insert(todo::Model {
                id: id.clone(),
                creator_id: creator_id.to_string(),
                title: req.title,
                deadline_at: req.deadline_at,
                desc: req.desc,
                records: TodoRecords(req.records),
                executor_ids: encode_ids(&ids),
                executes: UserTodos(executors_of(&ids)),
                status: TodoStatus::InProgress,
                create_at: now,
                update_at: now,
            })
            .await?;

        tracing::info!("Todo {} created by {} for {} executor(s)", id, creator_id, ids.len());
        Ok(id)
    }

    /// Creator only
    pub async fn edit(&self, user_id: &str, req: EditTodoRequest) -> AppResult<()> {
        let mut todo = self.load(&req.id).await?;
        if todo.creator_id != user_id {
            return Err(AppError::Forbidden("only the creator can edit this todo".to_string()));
        }

        if let Some(title) = req.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("todo title is required".to_string()));
            }
            todo.title = title;
        }
        if let Some(deadline_at) = req.deadline_at {
            todo.deadline_at = deadline_at;
        }
        if let Some(desc) = req.desc {
            todo.desc = desc;
        }
        if let Some(ids) = req.execute_ids.map(normalize_ids) {
            if ids.is_empty() {
                return Err(AppError::Validation("a todo needs at least one executor".to_string()));
            }
            let previous: HashMap<String, TodoStatus> = todo
                .executes
                .0
                .iter()
                .map(|e| (e.user_id.clone(), e.status))
                .collect();
            let executes: Vec<UserTodo> = executors_of(&ids)
                .into_iter()
                .map(|mut e| {
                    if let Some(status) = previous.get(&e.user_id) {
                        e.status = *status;
                    }
                    e
                })
                .collect();
            todo.executor_ids = encode_ids(&ids);
            if todo.status != TodoStatus::Cancel {
                todo.status = aggregate_status(&executes);
            }
            todo.executes = UserTodos(executes);
        }

        todo.update_at = now_unix();
        self.stores.todos.update(todo).await
    }

    /// Creator only
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        let todo = self.load(id).await?;
        if todo.creator_id != user_id {
            return Err(AppError::Forbidden("only the creator can delete this todo".to_string()));
        }
        self.stores.todos.delete(id).await
    }

    /// Mark one executor finished; the todo finishes with its last executor
    pub async fn finish(&self, caller_id: &str, req: FinishTodoRequest) -> AppResult<TodoStatus> {
        let mut todo = self.load(&req.todo_id).await?;
        let executor = req.user_id.unwrap_or_else(|| caller_id.to_string());

        let Some(pos) = todo.executes.0.iter().position(|e| e.user_id == executor) else {
            return Err(AppError::Validation(format!(
                "{} is not an executor of todo {}",
                executor, todo.id
            )));
        };
        todo.executes.0[pos].status = TodoStatus::Finish;

        todo.status = aggregate_status(&todo.executes.0);
        todo.update_at = now_unix();
        let status = todo.status;
        self.stores.todos.update(todo).await?;
        Ok(status)
    }

    pub async fn create_record(&self, user_id: &str, req: CreateRecordRequest) -> AppResult<()> {
        let mut todo = self.load(&req.todo_id).await?;
        let user_name = self
            .stores
            .users
            .find(user_id)
            .await?
            .map(|u| u.name)
            .unwrap_or_default();

        let now = now_unix();
        todo.records.0.push(TodoRecord {
            user_id: user_id.to_string(),
            user_name,
            content: req.content,
            image: req.image,
            create_at: now,
        });
        todo.update_at = now;
        self.stores.todos.update(todo).await
    }

    pub async fn list(&self, user_id: &str, req: TodoListRequest) -> AppResult<TodoListResponse> {
        let (items, count) = self
            .stores
            .todos
            .list(&TodoQuery {
                user_id: user_id.to_string(),
                start_time: req.start_time,
                end_time: req.end_time,
                page: Page::new(req.page, req.count),
            })
            .await?;

        let now = now_unix();
        Ok(TodoListResponse {
            count,
            list: items
                .into_iter()
                .map(|t| TodoListItem::from_model(t, now))
                .collect(),
        })
    }
}
