// Pipeline Module - Pulls packets, classifies them and casts one pulse per packet
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::capture::{PacketSource, Pull};
use crate::classifier::classify;
use crate::direction::{resolve_direction, LocalIdentity};
use crate::engine::LedEngine;
use crate::packet::PacketEvent;
use crate::renderer::{PulseRequest, Strip};
use crate::staleness::{delay, is_stale};
use crate::types::{Category, CategoryTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSettings {
    pub trail: usize,
    pub speed: usize,
    pub stale_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pulsed(Category),
    Disabled(Category),
    Stale,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub pulsed: u64,
    pub disabled: u64,
    pub stale: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pulsed(_) => self.pulsed += 1,
            Outcome::Disabled(_) => self.disabled += 1,
            Outcome::Stale => self.stale += 1,
        }
    }
}

/// Handles one packet. The animation runs to completion before this returns.
pub fn process_event<E: LedEngine>(
    strip: &mut Strip<E>,
    event: &PacketEvent,
    table: &CategoryTable,
    identity: &LocalIdentity,
    settings: &PulseSettings,
    now: SystemTime,
) -> Result<Outcome> {
    if is_stale(event.captured_at, now, settings.stale_after) {
        debug!("Skipping stale packet ({:?} old)", delay(event.captured_at, now));
        return Ok(Outcome::Stale);
    }

    let category = classify(&event.layers);
    let reverse = resolve_direction(event, identity);
    debug!(
        "{} packet, {} bytes, delay {:?}, {}",
        category,
        event.length,
        delay(event.captured_at, now),
        if reverse { "inbound" } else { "outbound" }
    );

    let meta = table.get(category);
    if !meta.enabled {
        return Ok(Outcome::Disabled(category));
    }

    strip.cast_pulse(&PulseRequest {
        color: meta.color,
        trail: settings.trail,
        speed: settings.speed,
        reverse,
    })?;
    Ok(Outcome::Pulsed(category))
}

/// Runs until the source closes, `running` is cleared, or a render fails.
pub fn run_pipeline<S: PacketSource, E: LedEngine>(
    source: &mut S,
    strip: &mut Strip<E>,
    table: &CategoryTable,
    identity: &LocalIdentity,
    settings: &PulseSettings,
    running: &AtomicBool,
) -> Result<PipelineStats> {
    let mut stats = PipelineStats::default();

    while running.load(Ordering::SeqCst) {
        match source.next_event()? {
            Pull::Packet(event) => {
                let outcome = process_event(strip, &event, table, identity, settings, SystemTime::now())?;
                stats.record(outcome);
            }
            Pull::Idle => strip.idle()?,
            Pull::Closed => break,
        }
    }

    Ok(stats)
}
