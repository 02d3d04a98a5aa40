//! Handlers 模块

pub mod broker;
pub mod events;
pub mod health;
pub mod metrics;

pub use broker::*;
pub use events::*;
pub use health::*;
pub use metrics::*;
