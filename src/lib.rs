//! AI traffic director and auto-moderation core for a racing-simulation game
//! server (§1 "Scope").
//!
//! Three collaborators run independently against a shared ECS [`World`]:
//! a director tick that keeps the right number of AI identities near
//! players, a fast obstacle-detection tick that keeps them from piling into
//! each other, and an auto-moderation tick that polices human drivers. None
//! of this crate's types touch the network; see [`external`] for the traits
//! production code implements around it.
//!
//! [`World`]: bevy_ecs::prelude::World

pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod external;
pub mod overbooking;
pub mod packets;
pub mod runner;
pub mod selection;
pub mod spline;
pub mod systems;
pub mod test_helpers;
