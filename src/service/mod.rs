//! Business services
//!
//! Each service owns a clone of the repository bundle and is shared by the
//! HTTP handlers, the WebSocket session and the assistant intents.

pub mod approval;
pub mod chat;
pub mod department;
pub mod dept_tree;
pub mod todo;
pub mod user;

use crate::error::AppError;

pub use approval::ApprovalService;
pub use chat::ChatService;
pub use department::DepartmentService;
pub use todo::TodoService;
pub use user::UserService;

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A result that may carry a value even though part of producing it failed
#[derive(Debug)]
pub struct Partial<T> {
    pub value: T,
    pub error: Option<AppError>,
}

impl<T> Partial<T> {
    pub fn complete(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn with_error(value: T, error: AppError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }
}
