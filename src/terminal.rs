// Terminal Module - Strip preview drawn with crossterm, for running without hardware
use anyhow::Result;
use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::{execute, queue};
use std::io::{self, Write};

use crate::engine::{FramePacer, LedEngine};
use crate::types::Rgb;

const LIT: char = '█';
const DARK: char = '·';

pub struct TerminalEngine {
    pixels: Vec<u32>,
    pacer: FramePacer,
}

impl TerminalEngine {
    pub fn new(led_count: usize, fps: f64) -> Self {
        TerminalEngine {
            pixels: vec![0; led_count],
            pacer: FramePacer::new(fps),
        }
    }

    fn draw<W: Write>(&self, out: &mut W) -> io::Result<()> {
        queue!(out, MoveToColumn(0))?;
        for &pixel in &self.pixels {
            if pixel == 0 {
                queue!(out, ResetColor, Print(DARK))?;
            } else {
                let Rgb { r, g, b } = Rgb::from_packed(pixel);
                queue!(out, SetForegroundColor(Color::Rgb { r, g, b }), Print(LIT))?;
            }
        }
        queue!(out, ResetColor)?;
        out.flush()
    }
}

impl LedEngine for TerminalEngine {
    fn init(&mut self) -> Result<()> {
        execute!(io::stdout(), Hide)?;
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.pacer.pace();
        self.draw(&mut io::stdout().lock())?;
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        Ok(())
    }

    fn fini(&mut self) {
        let _ = execute!(io::stdout(), ResetColor, Show, Print("\n"));
    }

    fn leds(&mut self, channel: usize) -> &mut [u32] {
        if channel == 0 {
            &mut self.pixels[..]
        } else {
            &mut []
        }
    }
}
