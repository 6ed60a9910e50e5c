use smart_leds::RGB8;

use crate::{
    frame::{self, BYTES_PER_PIXEL},
    ColorOrder,
};

/// Snapshot of one pixel as stored in a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub color: RGB8,
    /// Raw 5-bit level from the header byte.
    pub brightness: u8,
    /// `brightness` expressed as a percentage of the global level in effect
    /// when the pixel was read. Not necessarily the percentage that was
    /// requested when writing.
    pub brightness_percent: f32,
}

/// Flat byte image of the whole chain, already in wire layout.
///
/// Pixel `i` lives at bytes `4 * i .. 4 * i + 4`. The length never changes
/// after construction. Out-of-range indices are ignored on write and yield
/// `None` on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
    order: ColorOrder,
}

impl PixelBuffer {
    /// Allocates `num_leds` pixels, each a bare header with black color.
    pub fn new(num_leds: usize, order: ColorOrder) -> Self {
        let mut bytes = vec![0; num_leds * BYTES_PER_PIXEL];
        for slot in bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
            slot[0] = frame::header(0);
        }
        Self { bytes, order }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn order(&self) -> ColorOrder {
        self.order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes a color with a raw 5-bit brightness level.
    pub fn set(&mut self, index: usize, color: RGB8, brightness: u8) {
        let order = self.order;
        if let Some(slot) = self.slot_mut(index) {
            slot[0] = frame::header(brightness);
            order.place(slot, color);
        }
    }

    /// Writes a color whose brightness is `percent` of `global`.
    pub fn set_with_brightness(&mut self, index: usize, color: RGB8, percent: u8, global: u8) {
        self.set(index, color, frame::scale_brightness(percent, global));
    }

    /// Reads a pixel back, reconstructing its percentage against `global`.
    pub fn get(&self, index: usize, global: u8) -> Option<Pixel> {
        let slot = self.slot(index)?;
        let brightness = frame::brightness_of(slot[0]);
        Some(Pixel {
            color: self.order.extract(slot),
            brightness,
            brightness_percent: frame::percent_of(brightness, global),
        })
    }

    /// Paints every pixel with the same color and raw brightness.
    pub fn fill(&mut self, color: RGB8, brightness: u8) {
        for index in 0..self.len() {
            self.set(index, color, brightness);
        }
    }

    /// Rotates the chain as a ring. Positive values move every pixel towards
    /// the start of the chain, negative values towards the end.
    pub fn rotate(&mut self, positions: i64) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let shift = positions.rem_euclid(len as i64) as usize;
        self.bytes.rotate_left(shift * BYTES_PER_PIXEL);
    }

    fn slot(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(BYTES_PER_PIXEL)?;
        self.bytes.get(start..start.checked_add(BYTES_PER_PIXEL)?)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(BYTES_PER_PIXEL)?;
        self.bytes.get_mut(start..start.checked_add(BYTES_PER_PIXEL)?)
    }
}
