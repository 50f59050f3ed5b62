//! Watch a HEYKUBE
//!
//! Connects to the first cube in range, prints its version, battery and
//! state, then reports moves as they happen until the cube is solved.
//!
//! Usage: `cargo run --example watch_cube [config.toml]`

use heykube_ble::{BtleTransport, CubeEvent, HeyKube, HeykubeConfig, NotifyOn};
use heykube_core::NotifyFlags;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    let config = match std::env::args().nth(1) {
        Some(path) => HeykubeConfig::load(path)?,
        None => HeykubeConfig::default(),
    };

    let mut cube = HeyKube::new(BtleTransport::new(), config)?;
    let device = cube.connect_first().await?;
    println!("Connected to {} ({})", device.name, device.address);

    let version = cube.read_version().await?;
    let battery = cube.read_battery().await?;
    println!(
        "Firmware {}, battery {:.2} V{}",
        version.version,
        battery.voltage,
        if battery.charging { " (charging)" } else { "" }
    );

    cube.read_cube_state().await?;
    println!("{}", cube.cube().state());

    cube.enable_notifications(NotifyOn::CubeState).await?;
    cube.enable_notifications(NotifyOn::Status(NotifyFlags::SOLUTION))
        .await?;

    let mut last_seq = cube.cube().seq_num();
    while !cube.cube().is_solved() {
        let report = cube.wait_for_notify(Some(last_seq), None).await?;
        match &report.event {
            Some(CubeEvent::CubeState(update)) => {
                println!("seq {:3}  {}  {}", update.seq_num, update.timestamp, update.moves);
                if update.has_gap() {
                    println!("  ({} moves lost)", update.missed);
                }
            }
            Some(CubeEvent::Status(Some(status))) => {
                if let Some(progress) = status.solution {
                    println!("Progress: {} ({})", progress.phase.name(), progress.count);
                }
            }
            _ if report.polled => println!("No news; device at seq {}", report.seq_num),
            _ => {}
        }
        last_seq = report.seq_num;
    }

    println!("Solved!");
    cube.disable_notifications().await?;
    cube.disconnect().await?;
    Ok(())
}
