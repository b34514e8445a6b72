//! ECS resources made available to systems.
//!
//! Overview
//! - `eventhub` – the shared [`EventHub`](crate::hub::EventHub) wrapped as a resource
//! - `hubconfig` – INI-backed hub and demo settings
//! - `worldtime` – frame clock
pub mod eventhub;
pub mod hubconfig;
pub mod worldtime;
