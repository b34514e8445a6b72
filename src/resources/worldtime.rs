//! Frame clock resource.
//!
//! Advanced once per frame by
//! [`update_world_time`](crate::systems::time::update_world_time) before the
//! schedule runs; producers stamp payloads with `frame_count`.

use bevy_ecs::prelude::Resource;

#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct WorldTime {
    /// Seconds since the first frame.
    pub elapsed: f32,
    pub frame_count: u64,
}
