//! Built-in frame sources.

use std::fmt;

use lighthouse_core::canvas::empty_image;
use lighthouse_core::{COLS, Event, FrameSource, ImageData, ROWS, Rgb};
use serde::{Deserialize, Serialize};

/// JavaScript key codes sent by the remote input page.
pub mod keys {
    pub const A: i32 = 65;
    pub const D: i32 = 68;
    pub const S: i32 = 83;
    pub const W: i32 = 87;
}

const PRIMARIES: [Rgb; 3] = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];

/// Which animation to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    /// Light every channel of every window one by one, then clear them
    /// column by column.
    #[default]
    Fill,
    /// A white dot steered with W, A, S and D on the remote input page.
    Dot,
    /// A column of light crossing the display, changing colour each pass.
    Sweep,
}

impl AnimationKind {
    /// Whether the animation reacts to remote input.
    pub fn needs_remote_input(self) -> bool {
        matches!(self, Self::Dot)
    }
}

impl fmt::Display for AnimationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => write!(f, "fill"),
            Self::Dot => write!(f, "dot"),
            Self::Sweep => write!(f, "sweep"),
        }
    }
}

// ── Fill ─────────────────────────────────────────────────────────

/// Turns bytes on in row-major order, then off in column-major order.
#[derive(Debug)]
pub struct Fill {
    pixels: Vec<u8>,
    step: usize,
}

impl Fill {
    pub fn new() -> Self {
        Self {
            pixels: lighthouse_core::canvas::empty_image_raw(),
            step: 0,
        }
    }

    fn advance(&mut self) {
        let len = self.pixels.len();
        if self.step < len {
            self.pixels[self.step] = 255;
        } else {
            // Clearing walks columns top to bottom.
            let k = self.step - len;
            let (col, rest) = (k / (ROWS * 3), k % (ROWS * 3));
            let (row, channel) = (rest / 3, rest % 3);
            self.pixels[(row * COLS + col) * 3 + channel] = 0;
        }
        self.step = (self.step + 1) % (2 * len);
    }
}

impl Default for Fill {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for Fill {
    fn next_frame(&mut self, _events: &[Event]) -> ImageData {
        let frame = ImageData::from(self.pixels.as_slice());
        self.advance();
        frame
    }
}

// ── Dot ──────────────────────────────────────────────────────────

/// A single white window moved by remote key presses.
#[derive(Debug, Default)]
pub struct Dot {
    row: usize,
    col: usize,
}

impl Dot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn apply(&mut self, code: i32) {
        match code {
            keys::A => self.col = self.col.saturating_sub(1),
            keys::D => self.col = (self.col + 1).min(COLS - 1),
            keys::W => self.row = self.row.saturating_sub(1),
            keys::S => self.row = (self.row + 1).min(ROWS - 1),
            _ => {}
        }
    }
}

impl FrameSource for Dot {
    fn next_frame(&mut self, events: &[Event]) -> ImageData {
        for code in events.iter().filter_map(Event::pressed_key) {
            self.apply(code);
        }
        let mut image = empty_image();
        image[self.row][self.col] = [255, 255, 255];
        image.into()
    }
}

// ── Sweep ────────────────────────────────────────────────────────

/// One lit column moving left to right.
#[derive(Debug, Default)]
pub struct Sweep {
    frame: usize,
}

impl Sweep {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for Sweep {
    fn next_frame(&mut self, _events: &[Event]) -> ImageData {
        let col = self.frame % COLS;
        let colour = PRIMARIES[(self.frame / COLS) % PRIMARIES.len()];
        self.frame = self.frame.wrapping_add(1);

        let mut image = empty_image();
        for row in image.iter_mut() {
            row[col] = colour;
        }
        image.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lighthouse_core::{Canvas, IMAGE_LEN};

    fn canvas(image: ImageData) -> Canvas {
        Canvas::from_image(image).unwrap()
    }

    #[test]
    fn fill_lights_then_clears() {
        let mut fill = Fill::new();
        assert!(fill.next_frame(&[]).into_inner().iter().all(|&b| b == 0));
        assert_eq!(fill.next_frame(&[]).into_inner()[..2], [255, 0]);

        for _ in 2..IMAGE_LEN {
            fill.next_frame(&[]);
        }
        // Fully lit.
        assert!(fill.next_frame(&[]).into_inner().iter().all(|&b| b == 255));

        // Clearing starts at the top of the first column, then moves down it.
        let c = canvas(fill.next_frame(&[]));
        assert_eq!(c.pixel(0, 0).unwrap(), [0, 255, 255]);
        for _ in 0..2 {
            fill.next_frame(&[]);
        }
        let c = canvas(fill.next_frame(&[]));
        assert_eq!(c.pixel(0, 0).unwrap(), [0, 0, 0]);
        assert_eq!(c.pixel(1, 0).unwrap(), [0, 255, 255]);
        assert_eq!(c.pixel(0, 1).unwrap(), [255, 255, 255]);
    }

    #[test]
    fn dot_follows_keys_and_stays_on_grid() {
        let mut dot = Dot::new();
        let press = |code| Event::key(code, true);

        dot.next_frame(&[press(keys::W), press(keys::A)]);
        assert_eq!(dot.position(), (0, 0));

        dot.next_frame(&[press(keys::S), press(keys::D), press(keys::D)]);
        assert_eq!(dot.position(), (1, 2));

        // Releases are ignored.
        dot.next_frame(&[Event::key(keys::D, false)]);
        assert_eq!(dot.position(), (1, 2));

        let frame = canvas(dot.next_frame(&vec![press(keys::S); 40]));
        assert_eq!(dot.position(), (ROWS - 1, 2));
        assert_eq!(frame.pixel(ROWS - 1, 2).unwrap(), [255, 255, 255]);
        assert_eq!(frame.pixel(0, 0).unwrap(), [0, 0, 0]);
    }

    #[test]
    fn sweep_moves_one_column_per_frame() {
        let mut sweep = Sweep::new();
        let first = canvas(sweep.next_frame(&[]));
        let second = canvas(sweep.next_frame(&[]));
        assert_eq!(first.pixel(5, 0).unwrap(), [255, 0, 0]);
        assert_eq!(second.pixel(5, 0).unwrap(), [0, 0, 0]);
        assert_eq!(second.pixel(5, 1).unwrap(), [255, 0, 0]);

        for _ in 2..COLS {
            sweep.next_frame(&[]);
        }
        // Second pass switches colour.
        let next_pass = canvas(sweep.next_frame(&[]));
        assert_eq!(next_pass.pixel(0, 0).unwrap(), [0, 255, 0]);
    }

    #[test]
    fn dot_frames_always_fit_the_canvas() {
        let mut dot = Dot::new();
        let moves = [keys::D; COLS + 5]
            .into_iter()
            .chain([keys::S; ROWS + 5])
            .map(|code| Event::key(code, true))
            .collect::<Vec<_>>();
        for event in moves {
            let frame = dot.next_frame(&[event]);
            assert_eq!(frame.len(), IMAGE_LEN);
        }
        let corner = canvas(dot.next_frame(&[]));
        assert_eq!(corner.pixel(ROWS - 1, COLS - 1).unwrap(), [255, 255, 255]);
    }

    #[test]
    fn sweep_lights_whole_column_only() {
        let mut sweep = Sweep::new();
        for _ in 0..COLS - 1 {
            sweep.next_frame(&[]);
        }
        let last = canvas(sweep.next_frame(&[]));
        for row in 0..ROWS {
            assert_eq!(last.pixel(row, COLS - 1).unwrap(), [255, 0, 0]);
            assert_eq!(last.pixel(row, COLS - 2).unwrap(), [0, 0, 0]);
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(AnimationKind::default(), AnimationKind::Fill);
        assert_eq!(AnimationKind::Sweep.to_string(), "sweep");
        assert!(AnimationKind::Dot.needs_remote_input());
        assert!(!AnimationKind::Fill.needs_remote_input());
    }
}
