// Renderer Module - Frame buffer, commit primitives and the traveling pulse animation
use anyhow::{bail, Context, Result};
use tracing::{error, warn};

use crate::engine::LedEngine;

/// One packet's animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRequest {
    pub color: u32,
    pub trail: usize,
    pub speed: usize,
    // Travel from the far end of the strip towards pixel 0
    pub reverse: bool,
}

/// Scales each 8-bit channel of `color` by `(offset + 1) / trail`, rounding down.
/// `offset == trail - 1` is the leading edge at full brightness.
pub fn gradient(color: u32, offset: usize, trail: usize) -> u32 {
    let num = offset as u32 + 1;
    let den = trail as u32;
    let r = (((color & 0xFF0000) >> 16) * num / den) << 16;
    let g = (((color & 0x00FF00) >> 8) * num / den) << 8;
    let b = (color & 0x0000FF) * num / den;
    r | g | b
}

/// Virtual head positions of a pulse: from `-(trail-1)` while below `leds + trail + speed`.
pub fn pulse_steps(leds: usize, trail: usize, speed: usize) -> impl Iterator<Item = isize> {
    let start = 1 - trail as isize;
    let end = (leds + trail + speed) as isize;
    (start..end).step_by(speed.max(1))
}

// Owns the frame buffer and the strip driver it is committed to
pub struct Strip<E: LedEngine> {
    engine: E,
    frame: Vec<u32>,
}

impl<E: LedEngine> Strip<E> {
    pub fn new(engine: E, led_count: usize) -> Self {
        Strip {
            engine,
            frame: vec![0; led_count],
        }
    }

    pub fn setup(&mut self) -> Result<()> {
        self.engine.init().context("Failed to initialize LED strip")
    }

    pub fn led_count(&self) -> usize {
        self.frame.len()
    }

    #[cfg(test)]
    pub fn frame(&self) -> &[u32] {
        &self.frame
    }

    #[cfg(test)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn clear(&mut self) {
        self.frame.fill(0);
    }

    pub(crate) fn frame_mut(&mut self) -> &mut [u32] {
        &mut self.frame
    }

    fn reverse(&mut self) {
        self.frame.reverse();
    }

    // Copy the frame into the driver's buffer and push it to the strip
    pub(crate) fn commit(&mut self) -> Result<()> {
        let leds = self.engine.leds(0);
        let n = leds.len().min(self.frame.len());
        leds[..n].copy_from_slice(&self.frame[..n]);
        self.engine.render()
    }

    /// Turn every pixel off.
    pub fn reset(&mut self) -> Result<()> {
        self.clear();
        self.commit().context("Error during reset")
    }

    /// Commit, and on failure blank the strip before handing the error back.
    pub(crate) fn commit_or_reset(&mut self, what: &str) -> Result<()> {
        if let Err(err) = self.commit() {
            error!("Render failed during {}: {:#}", what, err);
            if let Err(reset_err) = self.reset() {
                warn!("Reset after render failure also failed: {:#}", reset_err);
            }
            return Err(err.context(format!("Error during {}", what)));
        }
        Ok(())
    }

    /// Animate one pulse across the whole strip. Blocks until the last frame is rendered.
    pub fn cast_pulse(&mut self, request: &PulseRequest) -> Result<()> {
        let PulseRequest { color, trail, speed, reverse } = *request;
        if trail == 0 || speed == 0 {
            bail!("Pulse needs trail >= 1 and speed >= 1 (trail={}, speed={})", trail, speed);
        }

        let leds = self.frame.len() as isize;
        self.clear();

        for head in pulse_steps(self.frame.len(), trail, speed) {
            self.clear();

            for j in 0..trail {
                let t = head + j as isize;
                if 0 <= t && t < leds {
                    self.frame[t as usize] = gradient(color, j, trail);
                }
            }

            if reverse {
                self.reverse();
            }

            self.commit_or_reset("wipe")?;
        }

        Ok(())
    }

    pub fn idle(&mut self) -> Result<()> {
        self.engine.idle()
    }

    /// Best-effort blank and driver teardown.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.reset() {
            warn!("Could not clear strip on shutdown: {:#}", err);
        }
        self.close();
    }

    // Tear down the driver, leaving whatever was last rendered on the strip
    pub fn close(&mut self) {
        if let Err(err) = self.engine.wait() {
            warn!("Waiting for strip failed: {:#}", err);
        }
        self.engine.fini();
    }
}
