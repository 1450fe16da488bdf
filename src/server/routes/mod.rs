//! Route handlers module.

pub mod config;
pub mod events;
pub mod health;
pub mod history;
pub mod rooms;
pub mod stats;
