//! Request handlers module

pub mod approval;
pub mod chat;
pub mod department;
pub mod todo;
pub mod user;
