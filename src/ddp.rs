// DDP Module - WLED strip driver over the DDP protocol
use anyhow::{anyhow, Context, Result};
use ddp_rs::connection::DDPConnection;
use ddp_rs::protocol::{PixelConfig, ID};
use std::net::UdpSocket;
use std::time::Duration;
use tracing::{debug, info};

use crate::engine::{FramePacer, LedEngine};
use crate::types::Rgb;

// WLED DDP timeout is ~1 second, so send keepalive every 500ms to be safe
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

pub struct DdpEngine {
    wled_ip: String,
    connection: Option<DDPConnection>,
    pixels: Vec<u32>,
    frame: Vec<u8>,
    brightness: f64,
    pacer: FramePacer,
}

impl DdpEngine {
    pub fn new(wled_ip: &str, led_count: usize, fps: f64, brightness: f64) -> Self {
        DdpEngine {
            wled_ip: wled_ip.to_string(),
            connection: None,
            pixels: vec![0; led_count],
            frame: vec![0; led_count * 3],
            brightness: brightness.clamp(0.0, 1.0),
            pacer: FramePacer::new(fps),
        }
    }

    fn fill_frame(&mut self) {
        encode_frame(&self.pixels, self.brightness, &mut self.frame);
    }

    fn send(&mut self) -> Result<()> {
        self.fill_frame();
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("DDP connection to {} is not initialized", self.wled_ip))?;
        conn.write(&self.frame)
            .map_err(|e| anyhow!("Failed to send to {}: {:?}", self.wled_ip, e))?;
        Ok(())
    }
}

/// Packs 0xRRGGBB pixels into DDP's RGB byte layout, applying `brightness`.
pub fn encode_frame(pixels: &[u32], brightness: f64, frame: &mut [u8]) {
    for (pixel, out) in pixels.iter().zip(frame.chunks_exact_mut(3)) {
        let mut color = Rgb::from_packed(*pixel);
        if brightness < 1.0 {
            color = color.scaled(brightness);
        }
        out[0] = color.r;
        out[1] = color.g;
        out[2] = color.b;
    }
}

impl LedEngine for DdpEngine {
    fn init(&mut self) -> Result<()> {
        let dest_addr = format!("{}:4048", self.wled_ip);
        info!("Connecting to WLED at {}", dest_addr);

        let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind UDP socket")?;
        let connection = DDPConnection::try_new(&dest_addr, PixelConfig::default(), ID::Default, socket)
            .with_context(|| format!("Failed to open DDP connection to {}", dest_addr))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.pacer.pace();
        self.send()
    }

    fn wait(&mut self) -> Result<()> {
        // UDP writes complete synchronously
        Ok(())
    }

    fn fini(&mut self) {
        self.connection = None;
    }

    fn leds(&mut self, channel: usize) -> &mut [u32] {
        if channel == 0 {
            &mut self.pixels[..]
        } else {
            &mut []
        }
    }

    fn idle(&mut self) -> Result<()> {
        let due = self
            .pacer
            .since_last_frame()
            .map(|elapsed| elapsed >= KEEPALIVE_INTERVAL)
            .unwrap_or(true);
        if due && self.connection.is_some() {
            debug!("DDP keepalive to {}", self.wled_ip);
            self.pacer.pace();
            self.send()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_order() {
        let pixels = [0xFF8000, 0x0000FF, 0x000000];
        let mut frame = [0u8; 9];
        encode_frame(&pixels, 1.0, &mut frame);
        assert_eq!(frame, [0xFF, 0x80, 0x00, 0x00, 0x00, 0xFF, 0, 0, 0]);
    }

    #[test]
    fn test_encode_frame_brightness() {
        let pixels = [0xC86400];
        let mut frame = [0u8; 3];
        encode_frame(&pixels, 0.5, &mut frame);
        assert_eq!(frame, [100, 50, 0]);
    }

    #[test]
    fn test_render_before_init_fails() {
        let mut engine = DdpEngine::new("127.0.0.1", 8, 0.0, 1.0);
        assert_eq!(engine.leds(0).len(), 8);
        assert!(engine.render().is_err());
        // Nothing to keep alive without a connection
        assert!(engine.idle().is_ok());
    }
}
