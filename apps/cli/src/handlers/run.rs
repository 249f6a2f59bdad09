use super::load;
use crate::models::args::ConfigArgs;
use anyhow::{Context, Result};
use pinrig::events::{EventReceiverExt, PostedEvent};
use pinrig::kernel::timing::tick_ms;
use pinrig::machine::{Machine, VirtualPlatform};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info};

const TAP_CAPACITY: usize = 4096;

/// Boots a machine on the virtual platform and ticks it against the wall clock,
/// printing every posted event until the duration elapses or Ctrl-C arrives.
///
/// # Errors
/// Returns an error if the config is invalid, the machine can't be built, or a
/// handler fails while running.
pub async fn run(args: &ConfigArgs, duration_ms: Option<u64>, balls_known: Option<u32>) -> Result<()> {
    let config = load(args).context("Failed to load machine config")?;

    let platform = VirtualPlatform::new();
    let mut builder =
        Machine::builder().config(&config).platform(Box::new(platform.clone())).tap_capacity(TAP_CAPACITY);
    if let Some(balls) = balls_known {
        builder = builder.balls_known(balls);
    }
    let mut machine = builder.build().context("Failed to build machine")?;
    let mut tap = machine.tap();

    machine.start().context("Machine failed to start")?;
    print_events(&mut tap);

    let step = Duration::from_millis(tick_ms(machine.hz()));
    let mut ticker = interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let stop = async {
        match duration_ms {
            Some(ms) => sleep_until(started + Duration::from_millis(ms)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(hz = machine.hz(), duration_ms, "Machine running");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let target = duration_ms.map_or(elapsed, |ms| elapsed.min(ms));
                machine.advance(target.saturating_sub(machine.now()))?;
                print_events(&mut tap);
            },
            () = &mut stop => break,
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl+C")?;
                info!("Ctrl+C received, stopping machine");
                break;
            },
        }
    }

    if let Some(ms) = duration_ms {
        machine.advance(ms.saturating_sub(machine.now()))?;
        print_events(&mut tap);
    }

    report(&machine, &platform);
    Ok(())
}

fn print_events(tap: &mut broadcast::Receiver<Arc<PostedEvent>>) {
    for event in tap.drain() {
        if event.args.is_empty() {
            println!("{}", event.name);
        } else {
            let args = serde_json::to_string(&event.args).unwrap_or_default();
            println!("{} {args}", event.name);
        }
    }
}

fn report(machine: &Machine, platform: &VirtualPlatform) {
    for device in machine.ball_devices() {
        debug!(device = %device.name(), status = ?machine.ball_device_status(device.name()), "Final device status");
    }
    let devices: Vec<String> =
        machine.ball_devices().map(|d| format!("{}={}", d.name(), d.balls())).collect();
    println!(
        "Stopped at {} ms: {} ball(s) known, {} driver action(s), devices [{}]",
        machine.now(),
        machine.num_balls_known(),
        platform.actions().len(),
        devices.join(", ")
    );
}
