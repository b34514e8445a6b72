//! framehub demo entry point.
//!
//! Runs a headless frame loop around an [`EventHub`]:
//! - **bevy_ecs** holds the hub, configuration and frame clock as resources
//!   and runs the per-frame schedule
//! - producer threads post random combat payloads every frame
//! - [`flush_event_hub`] delivers them once per frame to listeners registered
//!   with priorities, filters, one-shot and until-conditions
//!
//! # Main Loop
//!
//! 1. Load `hub.ini` (defaults if missing) and apply CLI overrides
//! 2. Create the hub, register listeners, spawn producers
//! 3. Each frame: advance [`WorldTime`], release the producers, wait for them,
//!    run the schedule (which flushes the hub)
//! 4. Stop producers, flush leftovers, print statistics, dispose the hub
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --release -- --ticks 10 --json
//! ```

use bevy_ecs::prelude::*;
use clap::Parser;
use crossbeam_channel::{Receiver, Sender, bounded};
use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use framehub::events::combat::{Damage, Defeated, Heal};
use framehub::hub::{EventHub, HubError, SubscriptionHandle};
use framehub::resources::eventhub::HubResource;
use framehub::resources::hubconfig::HubConfig;
use framehub::resources::worldtime::WorldTime;
use framehub::systems::eventhub::flush_event_hub;
use framehub::systems::time::update_world_time;

const FRAME_DT: f32 = 1.0 / 60.0;
const TARGETS: u64 = 4;
const START_HEALTH: i64 = 300;

/// framehub demo
#[derive(Parser)]
#[command(version, about = "Frame-driven typed event hub demo.")]
struct Cli {
    /// INI configuration file (default: ./hub.ini).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of frames to run (overrides the config file).
    #[arg(long)]
    ticks: Option<u32>,

    /// Number of producer threads (overrides the config file).
    #[arg(long)]
    producers: Option<u32>,

    /// Print the final hub statistics as JSON.
    #[arg(long)]
    json: bool,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    save_config: bool,
}

type Health = Arc<Mutex<FxHashMap<u64, i64>>>;

/// Wire up the demo's listeners. Returns the handles the main loop may revoke.
fn register_listeners(
    hub: &EventHub,
    health: &Health,
) -> Result<Vec<SubscriptionHandle>, HubError> {
    let mut handles = Vec::new();

    // Health bookkeeping runs before anything that reports on it.
    let bookkeeping = hub.subscribe::<Damage>().with_priority(-10);
    {
        let health = health.clone();
        let poster = hub.clone();
        bookkeeping.register(move |d| {
            let mut health = health.lock().unwrap_or_else(|e| e.into_inner());
            let hp = health.entry(d.target).or_insert(START_HEALTH);
            let was_alive = *hp > 0;
            *hp -= i64::from(d.amount);
            if was_alive && *hp <= 0 {
                // Delivered on the next flush.
                poster.enqueue(Defeated {
                    target: d.target,
                    by: format!("hit of {} on frame {}", d.amount, d.frame),
                });
            }
        })?;
    }
    {
        let health = health.clone();
        hub.subscribe::<Heal>().with_priority(-10).register(move |h| {
            let mut health = health.lock().unwrap_or_else(|e| e.into_inner());
            let hp = health.entry(h.target).or_insert(START_HEALTH);
            if *hp > 0 {
                *hp = (*hp + i64::from(h.amount)).min(START_HEALTH);
            }
        })?;
    }

    hub.subscribe::<Damage>().once().register(|d| {
        info!(
            "First blood: target {} took {} on frame {}",
            d.target, d.amount, d.frame
        )
    })?;

    hub.subscribe::<Damage>()
        .when(|d| d.amount >= 40)
        .register(|d| debug!("Heavy hit: {} on target {}", d.amount, d.target))?;

    handles.push(
        hub.subscribe::<Damage>()
            .when(|d| d.target == 0)
            .until(|d| d.amount >= 45)
            .register(|d| debug!("Tracking target 0 until a crushing blow: took {}", d.amount))?,
    );

    // Deliberately fragile listener; its panics are contained by the hub.
    handles.push(
        hub.subscribe::<Damage>()
            .with_priority(10)
            .register(|d| {
                if d.amount == 13 {
                    panic!("telemetry exporter cannot encode unlucky damage");
                }
            })?,
    );

    hub.subscribe::<Defeated>()
        .register(|d| info!("Target {} defeated ({})", d.target, d.by))?;

    Ok(handles)
}

fn spawn_producer(
    id: u32,
    hub: EventHub,
    events_per_tick: u32,
    frames: Receiver<u64>,
    done: Sender<u32>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame in frames.iter() {
            for _ in 0..events_per_tick {
                let target = fastrand::u64(0..TARGETS);
                if fastrand::u8(0..4) == 0 {
                    hub.enqueue(Heal::new(target, fastrand::u32(5..25)).at_frame(frame));
                } else {
                    hub.enqueue(Damage::new(target, fastrand::u32(1..50)).at_frame(frame));
                }
            }
            if done.send(id).is_err() {
                break;
            }
        }
        debug!("Producer {} stopped.", id);
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = cli.config.map(HubConfig::with_path).unwrap_or_default();
    if let Err(e) = config.load_from_file() {
        warn!("{}; using defaults", e);
    }
    if let Some(ticks) = cli.ticks {
        config.ticks = ticks;
    }
    if let Some(producers) = cli.producers {
        config.producers = producers;
    }

    // Early-exit: write the configuration and quit
    if cli.save_config {
        if let Err(e) = config.save_to_file() {
            error!("{}", e);
            std::process::exit(1);
        }
        println!("Configuration written to {}", config.config_path.display());
        return;
    }

    info!("Hello, world! This is the framehub demo!");

    // --------------- Hub + listeners ---------------
    let hub = EventHub::with_config(&config);
    let health: Health = Arc::new(Mutex::new(FxHashMap::default()));
    let handles = match register_listeners(&hub, &health) {
        Ok(handles) => handles,
        Err(e) => {
            error!("Failed to register listeners: {}", e);
            std::process::exit(1);
        }
    };

    // --------------- ECS world + resources ---------------
    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_resource(HubResource::new(hub.clone()));
    world.insert_resource(config.clone());

    let mut update = Schedule::default();
    update.add_systems(flush_event_hub);

    // --------------- Producers ---------------
    let (done_tx, done_rx) = bounded::<u32>(config.producers as usize);
    let mut frame_txs = Vec::new();
    let mut producers = Vec::new();
    for id in 0..config.producers {
        let (frame_tx, frame_rx) = bounded::<u64>(1);
        frame_txs.push(frame_tx);
        producers.push(spawn_producer(
            id,
            hub.clone(),
            config.events_per_tick,
            frame_rx,
            done_tx.clone(),
        ));
    }
    drop(done_tx);

    // --------------- Main loop ---------------
    for _ in 0..config.ticks {
        update_world_time(&mut world, FRAME_DT);
        let frame = world.resource::<WorldTime>().frame_count;

        let released = frame_txs.iter().filter(|tx| tx.send(frame).is_ok()).count();
        for _ in 0..released {
            if done_rx.recv().is_err() {
                break;
            }
        }

        update.run(&mut world);

        // Stop following target 0 halfway through.
        if frame == u64::from(config.ticks / 2) {
            if let Some(tracker) = handles.first() {
                tracker.dispose();
            }
        }
    }

    drop(frame_txs);
    for producer in producers {
        if producer.join().is_err() {
            error!("A producer thread panicked.");
        }
    }

    // Anything posted by listeners during the last frame.
    hub.flush_all();

    let clock = *world.resource::<WorldTime>();
    info!(
        "Ran {} frame(s), {:.2}s of simulated time.",
        clock.frame_count, clock.elapsed
    );

    let stats = hub.stats();
    if cli.json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize stats: {}", e),
        }
    } else {
        info!(
            "Done: {} enqueued, {} dispatched, {} delivered, {} filtered, {} faults, {} completed",
            stats.enqueued,
            stats.dispatched,
            stats.delivered,
            stats.filtered,
            stats.faults,
            stats.completed
        );
    }

    {
        let health = health.lock().unwrap_or_else(|e| e.into_inner());
        let mut targets: Vec<_> = health.iter().collect();
        targets.sort();
        for (target, hp) in targets {
            info!("Target {}: {} hp", target, hp);
        }
    }

    hub.dispose();
}
