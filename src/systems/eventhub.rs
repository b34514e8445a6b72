//! Per-frame event hub driver.
//!
//! [`flush_event_hub`] is the only place queued payloads get delivered. Add
//! it to the frame schedule once, after the systems that produce events for
//! this frame; listeners then run on the schedule's thread.
//!
//! Payloads posted by listeners during the flush are picked up on the next
//! frame.

use bevy_ecs::prelude::*;
use log::trace;

use crate::resources::eventhub::HubResource;
use crate::resources::worldtime::WorldTime;

/// Drain the hub's pending queue and deliver every payload in order.
pub fn flush_event_hub(hub: Res<HubResource>, world_time: Option<Res<WorldTime>>) {
    let drained = hub.flush_all();
    if drained > 0 {
        let (frame, elapsed) = world_time.map_or((0, 0.0), |t| (t.frame_count, t.elapsed));
        trace!(
            "Frame {} ({:.3}s): delivered {} queued event(s).",
            frame, elapsed, drained
        );
    }
}
