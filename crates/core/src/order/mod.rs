use std::fmt;

use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

/// Which byte of a 4-byte pixel frame carries each channel.
///
/// Offset 0 is always the brightness header, so the red/green/blue offsets are
/// a permutation of `1..=3`. The tag names follow the wiring labels printed
/// on strips, not the order bytes appear on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ColorOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ColorOrder {
    pub const ALL: [ColorOrder; 6] = [
        ColorOrder::Rgb,
        ColorOrder::Rbg,
        ColorOrder::Grb,
        ColorOrder::Gbr,
        ColorOrder::Brg,
        ColorOrder::Bgr,
    ];

    /// Resolves a tag case-insensitively. Unknown tags yield `Rgb`.
    pub fn from_tag(tag: &str) -> Self {
        Self::recognize(tag).unwrap_or_else(|| {
            tracing::debug!(tag, "unrecognised color order, using rgb");
            ColorOrder::Rgb
        })
    }

    /// Resolves a tag case-insensitively, returning `None` when unknown.
    pub fn recognize(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|order| order.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ColorOrder::Rgb => "rgb",
            ColorOrder::Rbg => "rbg",
            ColorOrder::Grb => "grb",
            ColorOrder::Gbr => "gbr",
            ColorOrder::Brg => "brg",
            ColorOrder::Bgr => "bgr",
        }
    }

    /// Frame offsets of red, green and blue, in that order.
    pub const fn offsets(self) -> [usize; 3] {
        match self {
            ColorOrder::Rgb => [3, 2, 1],
            ColorOrder::Rbg => [3, 1, 2],
            ColorOrder::Grb => [2, 3, 1],
            ColorOrder::Gbr => [2, 1, 3],
            ColorOrder::Brg => [1, 3, 2],
            ColorOrder::Bgr => [1, 2, 3],
        }
    }

    /// Writes the channels of `color` into a 4-byte frame slot.
    pub(crate) fn place(self, frame: &mut [u8], color: RGB8) {
        let [r, g, b] = self.offsets();
        frame[r] = color.r;
        frame[g] = color.g;
        frame[b] = color.b;
    }

    /// Reads the channels back out of a 4-byte frame slot.
    pub(crate) fn extract(self, frame: &[u8]) -> RGB8 {
        let [r, g, b] = self.offsets();
        RGB8::new(frame[r], frame[g], frame[b])
    }
}

impl From<&str> for ColorOrder {
    fn from(value: &str) -> Self {
        Self::from_tag(value)
    }
}

impl From<String> for ColorOrder {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_order_is_a_permutation_of_channel_offsets() {
        for order in ColorOrder::ALL {
            let mut offsets = order.offsets();
            offsets.sort_unstable();
            assert_eq!(offsets, [1, 2, 3], "{order}");
        }
    }

    #[test]
    fn tags_round_trip_case_insensitively() {
        for order in ColorOrder::ALL {
            assert_eq!(ColorOrder::from_tag(order.tag()), order);
            assert_eq!(ColorOrder::from_tag(&order.tag().to_uppercase()), order);
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_rgb() {
        assert_eq!(ColorOrder::from_tag("xyz"), ColorOrder::Rgb);
        assert_eq!(ColorOrder::from_tag(""), ColorOrder::Rgb);
        assert_eq!(ColorOrder::recognize("xyz"), None);
    }

    #[test]
    fn deserializes_unknown_tag_as_rgb() {
        let order: ColorOrder = serde_json::from_str("\"BGR\"").unwrap();
        assert_eq!(order, ColorOrder::Bgr);
        let order: ColorOrder = serde_json::from_str("\"purple\"").unwrap();
        assert_eq!(order, ColorOrder::Rgb);
        assert_eq!(serde_json::to_string(&ColorOrder::Gbr).unwrap(), "\"gbr\"");
    }

    #[test]
    fn places_channels_at_wired_offsets() {
        let mut frame = [0u8; 4];
        ColorOrder::Grb.place(&mut frame, RGB8::new(1, 2, 3));
        assert_eq!(frame, [0, 3, 1, 2]);
        assert_eq!(ColorOrder::Grb.extract(&frame), RGB8::new(1, 2, 3));
    }
}
