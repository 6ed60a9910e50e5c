use smart_leds::RGB8;

/// Width of each of the three color wheel segments.
const SEGMENT: u32 = 85;

/// Packs three channels into one `0xRRGGBB` value.
pub const fn combine_color(red: u8, green: u8, blue: u8) -> u32 {
    ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

/// Returns `color` as `0xRRGGBB`.
pub const fn pack_color(color: RGB8) -> u32 {
    combine_color(color.r, color.g, color.b)
}

/// Splits a `0xRRGGBB` value. Bits above the low 24 are ignored.
pub const fn unpack_color(rgb: u32) -> RGB8 {
    RGB8 {
        r: ((rgb >> 16) & 0xFF) as u8,
        g: ((rgb >> 8) & 0xFF) as u8,
        b: (rgb & 0xFF) as u8,
    }
}

/// Picks a color from a wheel that runs green -> red -> blue -> green.
///
/// Positions `0..255` cover the whole wheel in three 85-wide linear
/// segments. Anything above 255 is treated as 255, which lands on the same
/// color as position 0.
pub fn wheel(position: u32) -> RGB8 {
    let position = position.min(255);
    if position < SEGMENT {
        let up = (position * 3) as u8;
        RGB8::new(up, 255 - up, 0)
    } else if position < 2 * SEGMENT {
        let up = ((position - SEGMENT) * 3) as u8;
        RGB8::new(255 - up, 0, up)
    } else {
        let up = ((position - 2 * SEGMENT) * 3) as u8;
        RGB8::new(0, up, 255 - up)
    }
}
