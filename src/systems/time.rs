//! Time update system.
//!
//! Updates the shared [`WorldTime`](crate::resources::worldtime::WorldTime)
//! resource once per frame and advances the frame counter.
use bevy_ecs::prelude::*;

use crate::resources::worldtime::WorldTime;

/// Advance elapsed time and frame count on the `WorldTime` resource.
///
/// `dt` is the frame delta in seconds.
pub fn update_world_time(world: &mut World, dt: f32) {
    let mut wt = world.resource_mut::<WorldTime>();
    wt.elapsed += dt;
    wt.frame_count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_world_time_accumulates() {
        let mut world = World::new();
        world.insert_resource(WorldTime::default());

        update_world_time(&mut world, 0.5);
        update_world_time(&mut world, 0.25);

        let wt = world.resource::<WorldTime>();
        assert_eq!(wt.frame_count, 2);
        assert_eq!(wt.elapsed, 0.75);
    }
}
