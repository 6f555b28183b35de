// illumi-packet - Live packet visualization on a WLED strip
// Each captured packet becomes a colored pulse traveling along the LEDs
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

mod capture;
mod classifier;
mod config;
mod ddp;
mod direction;
mod display;
mod engine;
mod packet;
mod pipeline;
mod renderer;
mod staleness;
mod terminal;
mod types;

use capture::PcapSource;
use config::{Args, IllumiConfig};
use ddp::DdpEngine;
use direction::LocalIdentity;
use engine::LedEngine;
use pipeline::{run_pipeline, PulseSettings};
use renderer::Strip;
use terminal::TerminalEngine;

fn init_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(if debug {
            tracing_subscriber::EnvFilter::new("debug")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_strip(config: &IllumiConfig) -> Result<Strip<Box<dyn LedEngine>>> {
    let engine: Box<dyn LedEngine> = match config.sink.as_str() {
        "ddp" => Box::new(DdpEngine::new(
            &config.wled_ip,
            config.total_leds,
            config.fps,
            config.global_brightness,
        )),
        "terminal" => Box::new(TerminalEngine::new(config.total_leds, config.fps)),
        other => bail!("Unknown sink '{}' (expected \"ddp\" or \"terminal\")", other),
    };

    let mut strip = Strip::new(engine, config.total_leds);
    strip.setup()?;
    Ok(strip)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = IllumiConfig::load_with_path(args.cfg.as_deref())?;
    let args_provided = config.merge_with_args(&args);
    init_logging(config.debug);

    if let Some(ref path) = config.config_path {
        info!("Loaded config from {}", path.display());
    }
    if args_provided {
        info!("Command-line arguments override config file values");
    }
    let table = config.category_table()?;

    if args.reset {
        let mut strip = open_strip(&config)?;
        let result = strip.reset();
        strip.close();
        return result;
    }

    let identity = LocalIdentity::discover(&config.interface)?;
    info!(
        "Local identity on {}: ipv4={} ipv6={} mac={}",
        config.interface,
        identity.ipv4,
        identity.ipv6.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string()),
        identity.mac.map(|mac| mac.to_string()).unwrap_or_else(|| "-".to_string()),
    );

    if args.ipaddr {
        let mut strip = open_strip(&config)?;
        let result = strip.show_address(identity.ipv4);
        strip.close();
        return result;
    }

    let mut source = PcapSource::open(&config.capture_config())?;
    let mut strip = open_strip(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let settings = PulseSettings {
        trail: config.trail_length,
        speed: config.speed,
        stale_after: config.stale_after(),
    };
    info!(
        "Sending pulses to {} ({} LEDs, trail {}, speed {})",
        if config.sink == "ddp" { config.wled_ip.as_str() } else { "terminal" },
        config.total_leds,
        settings.trail,
        settings.speed
    );

    let result = run_pipeline(&mut source, &mut strip, &table, &identity, &settings, &running);
    strip.shutdown();

    let stats = result?;
    info!(
        "Stopped: {} pulses, {} disabled, {} stale",
        stats.pulsed, stats.disabled, stats.stale
    );
    Ok(())
}
