//! 中间件模块

pub mod auth;
pub mod context;

pub use auth::{bearer_token, hook_auth};
pub use context::request_context;
