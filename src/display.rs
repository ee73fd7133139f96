//! Sense HAT LED matrix output.
//!
//! The station only ever shows one of a handful of fixed images, so the
//! display is driven by [`DisplayCommand`]s rather than raw pixels. Rendering
//! is fire-and-forget: failures are logged and never reach the scheduler.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{info, warn};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    TrendUp,
    TrendDown,
    TrendFlat,
    InitMessage,
    Clear,
}

pub trait MatrixDisplay {
    fn render(&mut self, command: DisplayCommand);
}

impl<T: MatrixDisplay + ?Sized> MatrixDisplay for Box<T> {
    fn render(&mut self, command: DisplayCommand) {
        (**self).render(command)
    }
}

/// Display stand-in that only logs what would have been shown.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl MatrixDisplay for LogDisplay {
    fn render(&mut self, command: DisplayCommand) {
        info!(?command, "Display");
    }
}

// ---

type Rgb = [u8; 3];

const B: Rgb = [0, 0, 255];
const R: Rgb = [255, 0, 0];
const E: Rgb = [0, 0, 0];

pub const SIDE: usize = 8;

type Image = [Rgb; SIDE * SIDE];

#[rustfmt::skip]
const ARROW_UP: Image = [
    E, E, E, R, R, E, E, E,
    E, E, R, R, R, R, E, E,
    E, R, E, R, R, E, R, E,
    R, E, E, R, R, E, E, R,
    E, E, E, R, R, E, E, E,
    E, E, E, R, R, E, E, E,
    E, E, E, R, R, E, E, E,
    E, E, E, R, R, E, E, E,
];

#[rustfmt::skip]
const ARROW_DOWN: Image = [
    E, E, E, B, B, E, E, E,
    E, E, E, B, B, E, E, E,
    E, E, E, B, B, E, E, E,
    E, E, E, B, B, E, E, E,
    B, E, E, B, B, E, E, B,
    E, B, E, B, B, E, B, E,
    E, E, B, B, B, B, E, E,
    E, E, E, B, B, E, E, E,
];

#[rustfmt::skip]
const BARS: Image = [
    E, E, E, E, E, E, E, E,
    E, E, E, E, E, E, E, E,
    R, R, R, R, R, R, R, R,
    R, R, R, R, R, R, R, R,
    B, B, B, B, B, B, B, B,
    B, B, B, B, B, B, B, B,
    E, E, E, E, E, E, E, E,
    E, E, E, E, E, E, E, E,
];

fn image_for(command: DisplayCommand) -> Image {
    match command {
        DisplayCommand::TrendUp => ARROW_UP,
        DisplayCommand::TrendDown => ARROW_DOWN,
        DisplayCommand::TrendFlat => BARS,
        DisplayCommand::InitMessage => [B; SIDE * SIDE],
        DisplayCommand::Clear => [E; SIDE * SIDE],
    }
}

/// Pack an image into the little-endian RGB565 layout of the HAT framebuffer.
pub fn encode_rgb565(image: &[Rgb; SIDE * SIDE]) -> Vec<u8> {
    // ---
    image
        .iter()
        .flat_map(|[r, g, b]| {
            let pixel = ((*r as u16 >> 3) << 11) | ((*g as u16 >> 2) << 5) | (*b as u16 >> 3);
            pixel.to_le_bytes()
        })
        .collect()
}

/// The HAT's 8x8 matrix exposed as a Linux framebuffer (`rpisense-fb`).
#[derive(Debug)]
pub struct Framebuffer {
    path: PathBuf,
}

impl Framebuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Framebuffer { path: path.into() }
    }

    fn write_image(&self, image: &Image) -> std::io::Result<()> {
        let mut fb = OpenOptions::new().write(true).open(&self.path)?;
        fb.write_all(&encode_rgb565(image))
    }
}

impl MatrixDisplay for Framebuffer {
    fn render(&mut self, command: DisplayCommand) {
        // ---
        if let Err(e) = self.write_image(&image_for(command)) {
            warn!(?command, path = %self.path.display(), "Failed to update LED matrix: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_rgb565_encoding() {
        // ---
        let bytes = encode_rgb565(&ARROW_UP);
        assert_eq!(bytes.len(), SIDE * SIDE * 2);

        // top-left is empty, (0, 3) is red: 0xF800 little-endian
        assert_eq!(&bytes[0..2], &[0x00, 0x00]);
        assert_eq!(&bytes[6..8], &[0x00, 0xF8]);

        // blue is 0x001F
        let bytes = encode_rgb565(&[B; SIDE * SIDE]);
        assert_eq!(&bytes[0..2], &[0x1F, 0x00]);
    }

    #[test]
    fn test_framebuffer_writes_whole_frame() {
        // ---
        let path = std::env::temp_dir().join(format!("pistation-fb-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let mut fb = Framebuffer::new(&path);
        fb.render(DisplayCommand::TrendFlat);

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, encode_rgb565(&BARS));

        fb.render(DisplayCommand::Clear);
        let written = std::fs::read(&path).unwrap();
        assert!(written.iter().all(|b| *b == 0));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_framebuffer_does_not_panic() {
        let mut fb = Framebuffer::new("/nonexistent/pistation/fb1");
        fb.render(DisplayCommand::TrendUp);
    }
}
