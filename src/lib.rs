//! framehub library.
//!
//! A typed, in-process publish/subscribe hub for frame-driven applications,
//! plus the ECS resources and systems that plug it into a `bevy_ecs` frame
//! loop. Exposed as a library for the demo binary and integration tests.

pub mod events;
pub mod hub;
pub mod resources;
pub mod systems;
