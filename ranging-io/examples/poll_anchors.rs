//! Poll a UWB module and print anchor events
//!
//! Without arguments a scripted mock module is used, so the demo runs
//! anywhere. With a config file the real channel from `[module]` is opened.
//!
//! ```sh
//! cargo run -p ranging-io --example poll_anchors
//! cargo run -p ranging-io --example poll_anchors -- --config /etc/ranging.toml
//! ```

use ranging_io::{
    ListenerScope, MockTransport, Position, RangingConfig, RangingModule, Result, TagEvent,
};
use std::env;
use std::thread;
use std::time::Duration;

const RUN_TIME: Duration = Duration::from_secs(5);

/// `--config <path>` or `-c <path>`
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.windows(2)
        .find(|w| w[0] == "--config" || w[0] == "-c")
        .map(|w| w[1].clone())
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = match &config_path {
        Some(path) => RangingConfig::from_file(path)?,
        None => RangingConfig::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let mock = MockTransport::spi();
    let module = match config_path {
        Some(path) => {
            log::info!("Using config: {}", path);
            RangingModule::open(config)?
        }
        None => {
            log::info!("No config given, using mock module");
            mock.set_anchors(&[
                (0x0001, Position::new(3000, 4000, 0), 90),
                (0x0002, Position::new(-1500, 0, 2000), 75),
            ]);
            RangingModule::with_transport(Box::new(mock.clone()), config)
        }
    };

    module.subscribe(ListenerScope::AllTags, |event| match event {
        TagEvent::Connected(readings) => {
            for r in readings {
                log::info!("Anchor {:#06x} connected at {} mm", r.id, r.distance_mm);
            }
        }
        TagEvent::Disconnected(readings) => {
            for r in readings {
                log::info!("Anchor {:#06x} disconnected", r.id);
            }
        }
        TagEvent::DataAvailable(readings) => {
            log::debug!("{} anchors updated", readings.len());
        }
        TagEvent::Error { kind, detail } => {
            log::warn!("Poll failed ({:?}): {}", kind, detail);
        }
    });

    module.start_default()?;

    // Script some churn on the mock so every event kind shows up
    thread::sleep(RUN_TIME / 2);
    mock.remove_anchor(0x0002);
    mock.upsert_anchor(0x0007, Position::new(0, 2500, 0), 60);
    thread::sleep(RUN_TIME / 2);

    module.stop()?;

    for id in module.get_tag_ids() {
        println!("{:#06x}: {} mm", id, module.get_distance(id)?);
    }
    let stats = module.stats();
    println!(
        "{} ticks, {} failed ({:.2}%)",
        stats.ticks,
        stats.failures,
        stats.error_rate()
    );
    Ok(())
}
