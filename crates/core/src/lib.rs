//! Core library for driving APA102-style LED chains.
//!
//! The crate turns a buffer of (color, brightness) pixels into the exact
//! byte stream a clock/data LED chain expects, and runs simple step-based
//! animations on top of it. Each module owns one piece of that pipeline:
//! colors and wiring orders, the pixel buffer, framing, the strip that owns
//! a transport, and the engine that schedules animation steps.

pub mod animation;
pub mod buffer;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod order;
pub mod strip;
pub mod transport;

pub use animation::{
    Animation, AnimationKind, Rainbow, RoundAndRound, Solid, Step, StrandTest, TheaterChase,
};
pub use buffer::{Pixel, PixelBuffer};
pub use color::{combine_color, pack_color, unpack_color, wheel};
pub use config::{AppConfig, Cycles, Pin, ScheduleConfig, StripConfig, TransportConfig};
pub use engine::{AnimationEngine, CancelToken, EngineState, RunReport};
pub use error::{DotstarError, Result};
pub use frame::FrameEncoder;
pub use order::ColorOrder;
pub use strip::Strip;
pub use transport::{
    BitBangTransport, MemoryTransport, NoChipSelect, StreamTransport, Transport, TransportError,
    WriteLog,
};
