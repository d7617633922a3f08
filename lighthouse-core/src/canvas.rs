//! The fixed-shape pixel canvas sent to the display.
//!
//! Each window of the highrise is one RGB pixel of a 28×14 image. Bytes
//! are stored in (row, column, channel) order with the origin at the top
//! left: row 0 is the top floor, column 0 the first window, channel 0 red.
//! The byte buffer is exactly the wire payload of a PUT request.

use crate::error::LighthouseError;

// ── Constants ────────────────────────────────────────────────────

/// Floors of the display.
pub const ROWS: usize = 14;
/// Windows per floor.
pub const COLS: usize = 28;
/// Colour channels per window (R, G, B).
pub const CHANNELS: usize = 3;
/// Total number of bytes in one image.
pub const IMAGE_LEN: usize = ROWS * COLS * CHANNELS;

/// One pixel: `[red, green, blue]`.
pub type Rgb = [u8; CHANNELS];

/// Nested image form: `ROWS` rows of `COLS` pixels.
pub type NestedImage = Vec<Vec<Rgb>>;

// ── ImageData ────────────────────────────────────────────────────

/// Flattened image elements awaiting shape validation.
///
/// Anything that flattens to a byte sequence converts into `ImageData`;
/// the element count is checked only when the data is written into a
/// [`Canvas`], so nested inputs with ragged rows are accepted as long as
/// the total matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(Vec<u8>);

impl ImageData {
    /// Number of elements after flattening.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for ImageData {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for ImageData {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<Rgb>> for ImageData {
    fn from(pixels: Vec<Rgb>) -> Self {
        Self(pixels.into_iter().flatten().collect())
    }
}

impl From<&[Rgb]> for ImageData {
    fn from(pixels: &[Rgb]) -> Self {
        Self(pixels.iter().flatten().copied().collect())
    }
}

impl From<Vec<Vec<Rgb>>> for ImageData {
    fn from(rows: Vec<Vec<Rgb>>) -> Self {
        Self(rows.into_iter().flatten().flatten().collect())
    }
}

impl From<Vec<Vec<Vec<u8>>>> for ImageData {
    fn from(rows: Vec<Vec<Vec<u8>>>) -> Self {
        Self(rows.into_iter().flatten().flatten().collect())
    }
}

impl From<&Canvas> for ImageData {
    fn from(canvas: &Canvas) -> Self {
        Self(canvas.to_bytes())
    }
}

impl From<Canvas> for ImageData {
    fn from(canvas: Canvas) -> Self {
        Self(canvas.pixels)
    }
}

// ── Canvas ───────────────────────────────────────────────────────

/// A `ROWS × COLS × CHANNELS` byte grid with immutable shape.
///
/// The canvas does no locking of its own; the session serialises access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    /// Always exactly [`IMAGE_LEN`] bytes.
    pixels: Vec<u8>,
}

impl Canvas {
    /// A canvas showing the default frame: every window fully red.
    pub fn new() -> Self {
        Self::filled([255, 0, 0])
    }

    /// A canvas with every window set to `rgb`.
    pub fn filled(rgb: Rgb) -> Self {
        Self {
            pixels: rgb.repeat(ROWS * COLS),
        }
    }

    /// An all-black canvas.
    pub fn empty() -> Self {
        Self {
            pixels: empty_image_raw(),
        }
    }

    /// Build a canvas from any image input, validating its shape.
    pub fn from_image(image: impl Into<ImageData>) -> Result<Self, LighthouseError> {
        let mut canvas = Self::empty();
        canvas.set_image(image)?;
        Ok(canvas)
    }

    /// Replace the whole image.
    ///
    /// Fails with [`LighthouseError::InvalidImageShape`] unless the input
    /// flattens to exactly [`IMAGE_LEN`] elements; the canvas is left
    /// untouched on failure.
    pub fn set_image(&mut self, image: impl Into<ImageData>) -> Result<(), LighthouseError> {
        let data = image.into();
        if data.len() != IMAGE_LEN {
            return Err(LighthouseError::shape(data.len()));
        }
        self.pixels = data.into_inner();
        Ok(())
    }

    /// The raw row-major bytes (the wire payload).
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Owned copy of the raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// The image as rows of pixels.
    pub fn to_nested(&self) -> NestedImage {
        self.pixels
            .chunks_exact(COLS * CHANNELS)
            .map(|row| {
                row.chunks_exact(CHANNELS)
                    .map(|px| [px[0], px[1], px[2]])
                    .collect()
            })
            .collect()
    }

    /// Colour of the window at `(row, col)`.
    pub fn pixel(&self, row: usize, col: usize) -> Result<Rgb, LighthouseError> {
        let offset = Self::offset(row, col)?;
        let px = &self.pixels[offset..offset + CHANNELS];
        Ok([px[0], px[1], px[2]])
    }

    /// Set the window at `(row, col)`.
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: Rgb) -> Result<(), LighthouseError> {
        let offset = Self::offset(row, col)?;
        self.pixels[offset..offset + CHANNELS].copy_from_slice(&rgb);
        Ok(())
    }

    fn offset(row: usize, col: usize) -> Result<usize, LighthouseError> {
        if row >= ROWS || col >= COLS {
            return Err(LighthouseError::PixelOutOfBounds { row, col });
        }
        Ok((row * COLS + col) * CHANNELS)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

// ── Free helpers ─────────────────────────────────────────────────

/// An all-zero image in nested form.
pub fn empty_image() -> NestedImage {
    vec![vec![[0; CHANNELS]; COLS]; ROWS]
}

/// An all-zero image in flat form.
pub fn empty_image_raw() -> Vec<u8> {
    vec![0; IMAGE_LEN]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_is_red() {
        let canvas = Canvas::new();
        assert_eq!(canvas.as_bytes().len(), IMAGE_LEN);
        for px in canvas.as_bytes().chunks(3) {
            assert_eq!(px, [255, 0, 0]);
        }
    }

    #[test]
    fn set_image_keeps_row_major_order() {
        let data: Vec<u8> = (0..IMAGE_LEN).map(|i| (i % 251) as u8).collect();
        let mut canvas = Canvas::new();
        canvas.set_image(data.clone()).unwrap();
        assert_eq!(canvas.to_bytes(), data);

        // (row 1, col 2, channel 0) lives at (1 * 28 + 2) * 3.
        let offset = (COLS + 2) * CHANNELS;
        assert_eq!(canvas.pixel(1, 2).unwrap()[0], data[offset]);
    }

    #[test]
    fn nested_and_flat_inputs_agree() {
        let mut nested = empty_image();
        nested[3][9] = [255, 127, 0];
        let a = Canvas::from_image(nested.clone()).unwrap();

        let flat: Vec<Rgb> = nested.into_iter().flatten().collect();
        let b = Canvas::from_image(flat).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.pixel(3, 9).unwrap(), [255, 127, 0]);
    }

    #[test]
    fn ragged_nested_input_is_accepted_by_total_count() {
        let rows: Vec<Vec<Vec<u8>>> = vec![vec![vec![7; IMAGE_LEN - 3]], vec![vec![1, 2, 3]]];
        let canvas = Canvas::from_image(rows).unwrap();
        assert_eq!(canvas.pixel(ROWS - 1, COLS - 1).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn wrong_length_fails_and_leaves_canvas() {
        let mut canvas = Canvas::new();
        for len in [0, 1, IMAGE_LEN - 1, IMAGE_LEN + 1, 2 * IMAGE_LEN] {
            let err = canvas.set_image(vec![0u8; len]).unwrap_err();
            match err {
                LighthouseError::InvalidImageShape { expected, actual } => {
                    assert_eq!(expected, 1176);
                    assert_eq!(actual, len);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(canvas, Canvas::new());
    }

    #[test]
    fn empty_image_is_zero() {
        let img = empty_image();
        assert_eq!(img.len(), ROWS);
        assert!(img.iter().all(|row| row.len() == COLS));
        assert!(img.iter().flatten().all(|px| *px == [0, 0, 0]));
        assert!(empty_image_raw().iter().all(|&b| b == 0));
        assert_eq!(Canvas::empty().to_nested(), img);
    }

    #[test]
    fn nested_view_matches_bytes() {
        let canvas = Canvas::filled([1, 2, 3]);
        let nested = canvas.to_nested();
        assert_eq!(nested.len(), ROWS);
        assert_eq!(nested[13][27], [1, 2, 3]);
    }

    #[test]
    fn pixel_bounds() {
        let mut canvas = Canvas::empty();
        assert!(canvas.set_pixel(ROWS, 0, [1, 1, 1]).is_err());
        assert!(canvas.set_pixel(0, COLS, [1, 1, 1]).is_err());
        assert!(matches!(
            canvas.pixel(20, 3),
            Err(LighthouseError::PixelOutOfBounds { row: 20, col: 3 })
        ));
        canvas.set_pixel(13, 0, [9, 8, 7]).unwrap();
        assert_eq!(canvas.as_bytes()[13 * COLS * CHANNELS..][..3], [9, 8, 7]);
    }
}
