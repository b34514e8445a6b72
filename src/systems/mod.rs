//! Engine systems.
//!
//! Submodules overview
//! - [`eventhub`] – flush the event hub once per frame
//! - [`time`] – advance the frame clock

pub mod eventhub;
pub mod time;
