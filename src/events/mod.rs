//! Sample payload types carried by the hub.
//!
//! The hub itself is generic over payloads; these gameplay events are what the
//! demo binary and the tests post through it.
//!
//! Submodules:
//! - [`combat`] – damage, healing and defeat notifications
pub mod combat;
