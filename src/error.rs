//! Error taxonomy for the AI traffic director and auto-moderation subsystem.
//!
//! Two kinds matter operationally: [`ConfigurationError`] is fatal and only ever
//! raised once, at startup, before any worker is spawned. [`TickError`] is caught
//! at the boundary of every tick and logged; it must never propagate past a
//! single tick (see the concurrency section of the design doc).

use thiserror::Error;

/// Raised during startup validation. Refusing to start is the only fatal path
/// in this subsystem — everything past startup degrades gracefully instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{violation} kick is enabled but no AI spline was loaded")]
    MissingSplineForKick { violation: &'static str },
    #[error("NoLights kick is enabled but no sun position is available")]
    MissingSunPosition,
}

/// Raised inside a single director / obstacle-detection / auto-moderation tick.
/// Callers catch this at the tick boundary, log it, and let the next tick proceed.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("spawn point search exhausted its travel budget")]
    SpawnSearchExhausted,
    #[error("entry car slot {0} has no client while categorized as a player")]
    InconsistentSlotState(u8),
    #[error("packet send failed: {0}")]
    PacketSendFailure(String),
}
