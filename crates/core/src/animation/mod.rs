//! Animations the engine can drive, and the built-in ones.

use serde::{Deserialize, Serialize};
use smart_leds::{
    colors::{BLACK, RED, WHITE},
    RGB8,
};

use crate::{
    color::{pack_color, wheel},
    strip::FULL_BRIGHTNESS,
    Strip,
};

/// Marquee period: five lit pixels followed by two dark ones.
const CHASE_PERIOD: usize = 7;
/// Length of the lit segment in the strand test.
const STRAND_LEN: usize = 9;
/// Number of distinct wheel positions a rainbow cycles through.
const WHEEL_SPAN: f64 = 255.0;

/// Position of the engine inside its loop, handed to every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub steps_per_cycle: usize,
    /// Runs from zero to `steps_per_cycle - 1`, then starts over.
    pub current_step: usize,
    /// Starts at zero and grows by one after every full pass.
    pub current_cycle: u64,
}

/// A lighting effect painted one step at a time.
pub trait Animation {
    /// Called once after the strip was cleared, before the first flush.
    fn init(&mut self, _strip: &mut Strip) {}

    /// Paints one step. Returns `true` when the strip must be flushed.
    fn update(&mut self, strip: &mut Strip, step: Step) -> bool;

    /// Called once before the strip is cleared and released.
    fn shutdown(&mut self, _strip: &mut Strip) {}
}

/// Serializable selection of a built-in animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum AnimationKind {
    Solid {
        #[serde(default = "Solid::default_color")]
        color: RGB8,
        #[serde(default = "Solid::default_percent")]
        brightness_percent: u8,
    },
    StrandTest,
    TheaterChase,
    RoundAndRound,
    Rainbow,
}

impl Default for AnimationKind {
    fn default() -> Self {
        AnimationKind::Rainbow
    }
}

impl AnimationKind {
    /// Solid fill using its default color and brightness.
    pub fn solid() -> Self {
        AnimationKind::Solid {
            color: Solid::default_color(),
            brightness_percent: Solid::default_percent(),
        }
    }

    pub fn build(self) -> Box<dyn Animation> {
        match self {
            AnimationKind::Solid {
                color,
                brightness_percent,
            } => Box::new(Solid::new(color, brightness_percent)),
            AnimationKind::StrandTest => Box::new(StrandTest::default()),
            AnimationKind::TheaterChase => Box::new(TheaterChase),
            AnimationKind::RoundAndRound => Box::new(RoundAndRound),
            AnimationKind::Rainbow => Box::new(Rainbow),
        }
    }
}

/// Paints the whole strip once and leaves it alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solid {
    color: RGB8,
    brightness_percent: u8,
}

impl Solid {
    pub fn new(color: RGB8, brightness_percent: u8) -> Self {
        Self {
            color,
            brightness_percent,
        }
    }

    fn default_color() -> RGB8 {
        WHITE
    }

    fn default_percent() -> u8 {
        5
    }
}

impl Default for Solid {
    fn default() -> Self {
        Self::new(Self::default_color(), Self::default_percent())
    }
}

impl Animation for Solid {
    fn init(&mut self, strip: &mut Strip) {
        for index in 0..strip.len() {
            strip.set_pixel_with_brightness(index, self.color, self.brightness_percent);
        }
    }

    fn update(&mut self, _strip: &mut Strip, _step: Step) -> bool {
        false
    }
}

/// A short lit segment wanders down the strip, red then green then blue.
#[derive(Debug, Clone, Default)]
pub struct StrandTest {
    color: u32,
}

impl Animation for StrandTest {
    fn init(&mut self, _strip: &mut Strip) {
        self.color = 0;
    }

    fn update(&mut self, strip: &mut Strip, step: Step) -> bool {
        if step.current_step == 0 {
            // red -> green -> blue -> black
            self.color >>= 8;
        }
        if self.color == 0 {
            self.color = pack_color(RED);
        }
        let len = STRAND_LEN.min(strip.len().saturating_sub(1));
        let head = (step.current_step + len) % step.steps_per_cycle;
        let tail = step.current_step;
        strip.set_pixel_packed(head, self.color, FULL_BRIGHTNESS);
        strip.set_pixel_packed(tail, 0, FULL_BRIGHTNESS);
        true
    }
}

/// Marquee of five lit and two dark pixels, stepping through the wheel.
///
/// For a seamless wrap between cycles `steps_per_cycle` should be a
/// multiple of seven.
#[derive(Debug, Clone, Copy, Default)]
pub struct TheaterChase;

impl Animation for TheaterChase {
    fn update(&mut self, strip: &mut Strip, step: Step) -> bool {
        let offset = step.current_step % CHASE_PERIOD;
        let position = WHEEL_SPAN / step.steps_per_cycle as f64 * step.current_step as f64;
        let color = wheel(position.round_ties_even() as u32);
        for pixel in 0..strip.len() {
            let phase = (pixel + offset) % CHASE_PERIOD;
            if phase < 2 {
                strip.set_pixel(pixel, BLACK);
            } else {
                strip.set_pixel(pixel, color);
            }
        }
        true
    }
}

/// Three red seed pixels, the middle one dimmed, chasing around the ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundAndRound;

impl Animation for RoundAndRound {
    fn init(&mut self, strip: &mut Strip) {
        strip.set_pixel(0, RED);
        strip.set_pixel_with_brightness(1, RED, 5);
        strip.set_pixel(2, RED);
    }

    fn update(&mut self, strip: &mut Strip, _step: Step) -> bool {
        strip.rotate(1);
        true
    }
}

/// One full rainbow stretched across the strip, drifting each step.
///
/// Pixel 0 goes once around the wheel per cycle; the rest follow at an even
/// spacing so the strip always shows the whole wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rainbow;

impl Rainbow {
    /// Wheel position of `pixel` during `step`.
    pub fn index_of(pixel: usize, num_leds: usize, step: Step) -> u32 {
        let scale = WHEEL_SPAN / num_leds as f64;
        let start = WHEEL_SPAN / step.steps_per_cycle as f64 * step.current_step as f64;
        (start + pixel as f64 * scale).round_ties_even() as u32 % 255
    }
}

impl Animation for Rainbow {
    fn update(&mut self, strip: &mut Strip, step: Step) -> bool {
        let num_leds = strip.len();
        for pixel in 0..num_leds {
            strip.set_pixel(pixel, wheel(Self::index_of(pixel, num_leds, step)));
        }
        true
    }
}
