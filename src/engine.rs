// Engine Module - LED hardware sink contract and frame pacing
use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

/// Render lifecycle of an LED strip driver.
///
/// `leds(channel)` exposes the driver's own pixel buffer (0xRRGGBB per pixel);
/// `render` pushes that buffer to the strip and may block to pace frames.
pub trait LedEngine {
    fn init(&mut self) -> Result<()>;
    fn render(&mut self) -> Result<()>;
    fn wait(&mut self) -> Result<()>;
    fn fini(&mut self);
    fn leds(&mut self, channel: usize) -> &mut [u32];

    /// Called while no packet is pending. Drivers that need keepalive traffic override it.
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: LedEngine + ?Sized> LedEngine for Box<E> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn render(&mut self) -> Result<()> {
        (**self).render()
    }

    fn wait(&mut self) -> Result<()> {
        (**self).wait()
    }

    fn fini(&mut self) {
        (**self).fini()
    }

    fn leds(&mut self, channel: usize) -> &mut [u32] {
        (**self).leds(channel)
    }

    fn idle(&mut self) -> Result<()> {
        (**self).idle()
    }
}

// Sleeps so consecutive frames are at least 1/fps apart
pub struct FramePacer {
    interval: Duration,
    last_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(fps: f64) -> Self {
        let interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        FramePacer { interval, last_frame: None }
    }

    pub fn pace(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }

    pub fn since_last_frame(&self) -> Option<Duration> {
        self.last_frame.map(|t| t.elapsed())
    }
}
