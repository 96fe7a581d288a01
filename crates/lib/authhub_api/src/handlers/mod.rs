//! Request handlers.

pub mod auth;
pub mod health;
pub mod rbac;
pub mod services;
pub mod users;
