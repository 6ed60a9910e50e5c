//! Byte-level framing for APA102-style chains.
//!
//! A full transaction is a 32-bit zero start frame, one 4-byte frame per
//! pixel, an optional 4-byte zero reset frame (needed by SK9822 clones) and
//! finally `ceil(n / 16)` zero bytes. The padding exists because every LED
//! forwards the clock half a bit late, so the tail of the chain needs extra
//! clock edges before the last pixel frame arrives.

/// Fixed marker bits in the top of every pixel header.
pub const HEADER_MARKER: u8 = 0b1110_0000;
/// Mask of the 5-bit brightness quintet.
pub const BRIGHTNESS_MASK: u8 = 0b0001_1111;
/// Highest brightness the quintet can carry.
pub const MAX_BRIGHTNESS: u8 = 31;
pub const BYTES_PER_PIXEL: usize = 4;
pub const START_FRAME: [u8; 4] = [0; 4];
pub const RESET_FRAME: [u8; 4] = [0; 4];

/// Builds the header byte `0b111bbbbb`. Brightness is masked to 5 bits.
pub const fn header(brightness: u8) -> u8 {
    HEADER_MARKER | (brightness & BRIGHTNESS_MASK)
}

/// Recovers the brightness quintet from a header byte.
pub const fn brightness_of(header: u8) -> u8 {
    header & BRIGHTNESS_MASK
}

/// Scales a percentage of the global brightness to a 5-bit level.
///
/// Rounds up so any non-zero percentage keeps the pixel lit whenever the
/// global level is non-zero. The result is masked, not saturated, mirroring
/// what the header can hold.
pub fn scale_brightness(percent: u8, global: u8) -> u8 {
    let scaled = (u32::from(percent) * u32::from(global)).div_ceil(100);
    (scaled as u8) & BRIGHTNESS_MASK
}

/// Converts a stored level back into a percentage of the global level.
///
/// This is lossy: `scale_brightness` rounds up, so the value rarely matches
/// the percentage originally requested. A global level of 0 reports 0%.
pub fn percent_of(brightness: u8, global: u8) -> f32 {
    if global == 0 {
        return 0.0;
    }
    f32::from(brightness) * 100.0 / f32::from(global)
}

/// Number of trailing zero bytes needed to clock data through `num_leds`.
pub const fn end_padding_len(num_leds: usize) -> usize {
    num_leds.div_ceil(16)
}

/// Stateless frame builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    reset_frame: bool,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self { reset_frame: true }
    }
}

impl FrameEncoder {
    pub fn new(reset_frame: bool) -> Self {
        Self { reset_frame }
    }

    pub fn has_reset_frame(&self) -> bool {
        self.reset_frame
    }

    /// Total transaction length for a chain of `num_leds` pixels.
    pub fn frame_len(&self, num_leds: usize) -> usize {
        let reset = if self.reset_frame { RESET_FRAME.len() } else { 0 };
        START_FRAME.len() + BYTES_PER_PIXEL * num_leds + reset + end_padding_len(num_leds)
    }

    /// Wraps already laid out pixel bytes into a complete transaction.
    pub fn encode(&self, pixels: &[u8]) -> Vec<u8> {
        let num_leds = pixels.len() / BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(self.frame_len(num_leds));
        out.extend_from_slice(&START_FRAME);
        out.extend_from_slice(pixels);
        if self.reset_frame {
            out.extend_from_slice(&RESET_FRAME);
        }
        out.resize(out.len() + end_padding_len(num_leds), 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_marker_and_quintet() {
        assert_eq!(header(0), 0b1110_0000);
        assert_eq!(header(31), 0xFF);
        assert_eq!(header(32), 0b1110_0000);
        assert_eq!(brightness_of(header(17)), 17);
    }

    #[test]
    fn brightness_rounds_up() {
        assert_eq!(scale_brightness(100, 4), 4);
        assert_eq!(scale_brightness(5, 4), 1);
        assert_eq!(scale_brightness(1, 31), 1);
        assert_eq!(scale_brightness(0, 31), 0);
        assert_eq!(scale_brightness(50, 31), 16);
        assert_eq!(scale_brightness(100, 0), 0);
    }

    #[test]
    fn brightness_masks_to_five_bits() {
        assert_eq!(scale_brightness(200, 31), 62 & BRIGHTNESS_MASK);
    }

    #[test]
    fn percent_reconstruction_is_lossy() {
        let stored = scale_brightness(5, 4);
        assert_eq!(percent_of(stored, 4), 25.0);
        assert_eq!(percent_of(7, 0), 0.0);
    }

    #[test]
    fn padding_covers_half_bit_per_led() {
        assert_eq!(end_padding_len(1), 1);
        assert_eq!(end_padding_len(16), 1);
        assert_eq!(end_padding_len(17), 2);
        assert_eq!(end_padding_len(1024), 64);
    }

    #[test]
    fn encodes_full_transaction() {
        let encoder = FrameEncoder::default();
        let pixels = [0xE1, 1, 2, 3, 0xE2, 4, 5, 6];
        let bytes = encoder.encode(&pixels);

        assert_eq!(bytes.len(), encoder.frame_len(2));
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..12], &pixels);
        assert_eq!(&bytes[12..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn frame_length_formula_holds() {
        for reset in [false, true] {
            let encoder = FrameEncoder::new(reset);
            for n in [1usize, 15, 16, 17, 300, 1024] {
                let expected = 4 + 4 * n + 4 * usize::from(reset) + n.div_ceil(16);
                assert_eq!(encoder.frame_len(n), expected);
                assert_eq!(encoder.encode(&vec![0xE0; 4 * n]).len(), expected);
            }
        }
    }
}
