//! ECS resource exposing the event hub to systems.
//!
//! The hub is created once at startup and inserted with
//! [`HubResource::new`]; systems read it with `Res<HubResource>` and can hand
//! clones of the inner [`EventHub`] to producer threads.

use bevy_ecs::prelude::Resource;
use std::ops::Deref;

use crate::hub::EventHub;

/// Shared event hub for the world.
#[derive(Resource, Clone)]
pub struct HubResource(pub EventHub);

impl HubResource {
    pub fn new(hub: EventHub) -> Self {
        HubResource(hub)
    }

    /// Clone of the hub for use outside the ECS (producer threads, callbacks).
    pub fn hub(&self) -> EventHub {
        self.0.clone()
    }
}

impl Deref for HubResource {
    type Target = EventHub;

    fn deref(&self) -> &EventHub {
        &self.0
    }
}
