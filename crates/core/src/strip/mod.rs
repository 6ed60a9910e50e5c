use std::fmt;

use smart_leds::{colors::BLACK, RGB8};

use crate::{
    buffer::{Pixel, PixelBuffer},
    color::{pack_color, unpack_color},
    config::{validate_brightness, StripConfig},
    frame::{FrameEncoder, BYTES_PER_PIXEL},
    transport::{Transport, TransportError},
    ColorOrder, Result,
};

/// Brightness percentage used when a caller does not pick one.
pub const FULL_BRIGHTNESS: u8 = 100;

/// A chain of LEDs bound to one transport.
///
/// Pixel writes only touch the in-memory buffer; nothing reaches the wire
/// until [`Strip::show`]. Indices past the end of the chain are ignored on
/// write and read back as `None`.
pub struct Strip {
    buffer: PixelBuffer,
    encoder: FrameEncoder,
    global_brightness: u8,
    transport: Option<Box<dyn Transport>>,
}

impl Strip {
    /// Validates `config` and takes ownership of `transport`.
    ///
    /// Nothing is written during construction, so a rejected configuration
    /// never produces bus traffic.
    pub fn new(config: &StripConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            num_leds = config.num_leds,
            order = %config.order,
            global_brightness = config.global_brightness,
            transport = ?config.transport,
            "strip configured"
        );
        Ok(Self {
            buffer: PixelBuffer::new(config.num_leds, config.order),
            encoder: FrameEncoder::new(config.reset_frame),
            global_brightness: config.global_brightness,
            transport: Some(transport),
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn color_order(&self) -> ColorOrder {
        self.buffer.order()
    }

    pub fn global_brightness(&self) -> u8 {
        self.global_brightness
    }

    /// Changes the level that later percentage writes scale against.
    /// Pixels already in the buffer keep their stored level.
    pub fn set_global_brightness(&mut self, value: u8) -> Result<()> {
        validate_brightness(value)?;
        self.global_brightness = value;
        Ok(())
    }

    /// Sets a pixel at full (global) brightness.
    pub fn set_pixel(&mut self, index: usize, color: RGB8) {
        self.set_pixel_with_brightness(index, color, FULL_BRIGHTNESS);
    }

    /// Sets a pixel at `percent` of the global brightness.
    pub fn set_pixel_with_brightness(&mut self, index: usize, color: RGB8, percent: u8) {
        self.buffer
            .set_with_brightness(index, color, percent, self.global_brightness);
    }

    /// Sets a pixel from a packed `0xRRGGBB` value.
    pub fn set_pixel_packed(&mut self, index: usize, rgb: u32, percent: u8) {
        self.set_pixel_with_brightness(index, unpack_color(rgb), percent);
    }

    pub fn get_pixel(&self, index: usize) -> Option<Pixel> {
        self.buffer.get(index, self.global_brightness)
    }

    /// Reads a pixel back as `0xRRGGBB` plus its reconstructed percentage.
    pub fn get_pixel_packed(&self, index: usize) -> Option<(u32, f32)> {
        self.get_pixel(index)
            .map(|pixel| (pack_color(pixel.color), pixel.brightness_percent))
    }

    /// Rotates the buffer as a ring, see [`PixelBuffer::rotate`].
    pub fn rotate(&mut self, positions: i64) {
        self.buffer.rotate(positions);
    }

    /// Blanks every pixel and sends the result straight away.
    pub fn clear(&mut self) -> Result<()> {
        self.blank();
        self.show()
    }

    /// Encodes the buffer and sends it as one transaction.
    ///
    /// Transports with a write limit receive consecutive chunks that never
    /// split a pixel frame.
    pub fn show(&mut self) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(TransportError::Released)?;
        let bytes = self.encoder.encode(self.buffer.as_bytes());
        match transport.max_write_len() {
            Some(limit) if bytes.len() > limit => {
                let chunk = (limit / BYTES_PER_PIXEL * BYTES_PER_PIXEL).max(1);
                tracing::trace!(len = bytes.len(), chunk, "sending chunked frame");
                for part in bytes.chunks(chunk) {
                    transport.write(part)?;
                }
            }
            _ => {
                tracing::trace!(len = bytes.len(), "sending frame");
                transport.write(&bytes)?;
            }
        }
        Ok(())
    }

    /// Blanks and flushes the chain, then gives the transport back.
    ///
    /// Calling it again, or after the transport was already released, is a
    /// no-op. A transport reporting that it was never acquired is ignored.
    pub fn teardown(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        let flushed = self.clear();
        let released = match self.transport.take() {
            Some(mut transport) => match transport.release() {
                Err(TransportError::NotAcquired) => {
                    tracing::debug!("transport was not acquired, nothing to release");
                    Ok(())
                }
                other => other,
            },
            None => Ok(()),
        };
        flushed?;
        released?;
        tracing::debug!("strip released");
        Ok(())
    }

    /// Whether [`Strip::teardown`] has already given the transport back.
    pub fn is_released(&self) -> bool {
        self.transport.is_none()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Logs the raw buffer.
    pub fn dump(&self) {
        tracing::debug!(bytes = ?self.buffer.as_bytes(), "pixel buffer");
    }

    fn blank(&mut self) {
        for index in 0..self.len() {
            self.set_pixel(index, BLACK);
        }
    }
}

impl fmt::Debug for Strip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strip")
            .field("num_leds", &self.len())
            .field("order", &self.color_order())
            .field("global_brightness", &self.global_brightness)
            .field("reset_frame", &self.encoder.has_reset_frame())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TransportConfig, transport::MemoryTransport};
    use smart_leds::colors::{BLUE, RED, WHITE};

    fn strip_with(config: StripConfig, transport: MemoryTransport) -> Strip {
        Strip::new(&config, Box::new(transport)).unwrap()
    }

    fn config(num_leds: usize) -> StripConfig {
        StripConfig {
            num_leds,
            global_brightness: 31,
            ..StripConfig::default()
        }
    }

    #[test]
    fn round_trips_colors() {
        let mut strip = strip_with(config(3), MemoryTransport::new());
        strip.set_pixel(0, RGB8::new(1, 2, 3));
        strip.set_pixel_packed(2, 0xABCDEF, FULL_BRIGHTNESS);

        assert_eq!(strip.get_pixel(0).unwrap().color, RGB8::new(1, 2, 3));
        assert_eq!(strip.get_pixel_packed(2), Some((0xABCDEF, 100.0)));
        assert_eq!(strip.get_pixel(1).unwrap().color, BLACK);
        assert!(strip.get_pixel(3).is_none());
    }

    #[test]
    fn partial_percentages_never_go_dark() {
        let mut strip = strip_with(config(1), MemoryTransport::new());
        strip.set_global_brightness(4).unwrap();
        strip.set_pixel_with_brightness(0, WHITE, 5);

        let pixel = strip.get_pixel(0).unwrap();
        assert_eq!(pixel.brightness, 1);
        assert_eq!(pixel.brightness_percent, 25.0);
    }

    #[test]
    fn packed_reads_carry_reconstructed_percentage() {
        let mut strip = strip_with(config(2), MemoryTransport::new());
        strip.set_global_brightness(10).unwrap();
        strip.set_pixel_packed(0, 0x102030, 50);
        strip.set_pixel_packed(1, 0xFFFFFF, 33);

        assert_eq!(strip.get_pixel_packed(0), Some((0x102030, 50.0)));
        // ceil(3.3) = 4 of 10
        assert_eq!(strip.get_pixel_packed(1), Some((0xFFFFFF, 40.0)));
        assert_eq!(strip.get_pixel_packed(2), None);
    }

    #[test]
    fn global_brightness_is_not_retroactive() {
        let mut strip = strip_with(config(2), MemoryTransport::new());
        strip.set_pixel(0, RED);
        strip.set_global_brightness(10).unwrap();
        strip.set_pixel(1, RED);

        assert_eq!(strip.get_pixel(0).unwrap().brightness, 31);
        assert_eq!(strip.get_pixel(1).unwrap().brightness, 10);
        assert!(strip.set_global_brightness(32).is_err());
        assert_eq!(strip.global_brightness(), 10);
    }

    #[test]
    fn show_sends_one_framed_write() {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let mut strip = strip_with(config(2), transport);
        strip.set_pixel(1, RGB8::new(0x11, 0x22, 0x33));
        strip.show().unwrap();

        let expected = [
            0, 0, 0, 0, //
            0xE0, 0, 0, 0, //
            0xFF, 0x33, 0x22, 0x11, //
            0, 0, 0, 0, //
            0,
        ];
        assert_eq!(log.writes(), vec![expected.to_vec()]);
    }

    #[test]
    fn show_respects_color_order_and_reset_setting() {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let config = StripConfig {
            order: ColorOrder::Bgr,
            reset_frame: false,
            ..config(1)
        };
        let mut strip = strip_with(config, transport);
        strip.set_pixel(0, RGB8::new(1, 2, 3));
        strip.show().unwrap();

        assert_eq!(log.last().unwrap(), vec![0, 0, 0, 0, 0xFF, 3, 2, 1, 0]);
    }

    #[test]
    fn show_chunks_on_pixel_boundaries() {
        let transport = MemoryTransport::new().with_max_write_len(10);
        let log = transport.log();
        let mut strip = strip_with(config(5), transport);
        strip.show().unwrap();

        let writes = log.writes();
        assert!(writes.iter().all(|w| w.len() <= 8));
        assert_eq!(log.bytes().len(), 4 + 20 + 4 + 1);
    }

    #[test]
    fn clear_blanks_and_flushes() {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let mut strip = strip_with(config(2), transport);
        strip.set_pixel(0, WHITE);
        strip.clear().unwrap();

        assert_eq!(strip.get_pixel(0).unwrap().color, BLACK);
        assert_eq!(log.write_count(), 1);
    }

    #[test]
    fn transport_errors_surface_from_show() {
        let mut strip = strip_with(config(1), MemoryTransport::new().fail_after(0));
        let err = strip.show().unwrap_err();
        assert!(matches!(err, crate::DotstarError::Transport(_)));
    }

    #[test]
    fn teardown_blanks_flushes_and_releases_once() {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let mut strip = strip_with(config(2), transport);
        strip.set_pixel(1, BLUE);
        strip.teardown().unwrap();

        assert!(log.is_released());
        assert!(strip.is_released());
        assert_eq!(log.write_count(), 1);
        assert_eq!(strip.get_pixel(1).unwrap().color, BLACK);

        strip.teardown().unwrap();
        assert_eq!(log.write_count(), 1);
        assert!(strip.show().is_err());
    }

    struct UnlockedBus;

    impl Transport for UnlockedBus {
        fn write(&mut self, _bytes: &[u8]) -> std::result::Result<(), TransportError> {
            Ok(())
        }

        fn release(&mut self) -> std::result::Result<(), TransportError> {
            Err(TransportError::NotAcquired)
        }
    }

    #[test]
    fn teardown_swallows_not_acquired_release() {
        let mut strip = Strip::new(&config(1), Box::new(UnlockedBus)).unwrap();
        strip.teardown().unwrap();
        assert!(strip.is_released());
    }

    #[test]
    fn teardown_still_releases_when_flush_fails() {
        let transport = MemoryTransport::new().fail_after(0);
        let log = transport.log();
        let mut strip = strip_with(config(1), transport);

        assert!(strip.teardown().is_err());
        assert!(strip.is_released());
        assert!(log.is_released());
    }

    #[test]
    fn invalid_configuration_performs_no_io() {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let config = StripConfig {
            transport: TransportConfig::Spi {
                bus: 7,
                chip_select: None,
                clock_hz: 1,
            },
            ..config(4)
        };
        let err = Strip::new(&config, Box::new(transport)).unwrap_err();

        assert!(err.is_config());
        assert_eq!(log.write_count(), 0);
        assert!(!log.is_released());
    }
}
