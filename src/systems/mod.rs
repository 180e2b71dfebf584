//! The AI director and auto-moderation tick phases (§4). Each submodule is
//! one phase or event handler; `runner.rs` sequences them.

pub mod automod;
pub mod categorize;
pub mod connection;
pub mod distance;
pub mod lane;
pub mod obstacle;
pub mod spawn;
