// Display Module - Static, one-shot strip renderings
use anyhow::{bail, Result};
use std::net::Ipv4Addr;

use crate::engine::LedEngine;
use crate::renderer::Strip;
use crate::types::{GRAY, GREEN};

// 8 bit pixels plus one separator per octet
const OCTET_STRIDE: usize = 9;
pub const ADDRESS_PIXELS: usize = OCTET_STRIDE * 4;

/// Writes the address into `frame`: per octet, MSB first, lit pixel = 1 bit,
/// then a separator pixel.
pub fn paint_address(frame: &mut [u32], addr: Ipv4Addr) {
    frame.fill(0);
    for (i, octet) in addr.octets().iter().enumerate() {
        let base = i * OCTET_STRIDE;
        for bit in 0..8 {
            if (octet >> (7 - bit)) & 1 == 1 {
                frame[base + bit] = GRAY;
            }
        }
        frame[base + OCTET_STRIDE - 1] = GREEN;
    }
}

impl<E: LedEngine> Strip<E> {
    /// Shows `addr` in binary and commits once.
    pub fn show_address(&mut self, addr: Ipv4Addr) -> Result<()> {
        if self.led_count() < ADDRESS_PIXELS {
            bail!(
                "Address display needs {} LEDs, strip has {}",
                ADDRESS_PIXELS,
                self.led_count()
            );
        }
        paint_address(self.frame_mut(), addr);
        self.commit_or_reset("address display")
    }
}
