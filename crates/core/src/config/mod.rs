use std::{fmt, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    animation::AnimationKind, frame::MAX_BRIGHTNESS, ColorOrder, DotstarError, Result,
};

/// Longest chain a single transaction is allowed to address.
pub const MAX_LEDS: usize = 1024;
/// Highest BCM GPIO number exposed on the header.
pub const MAX_GPIO: u8 = 27;
pub const DEFAULT_CLOCK_HZ: u32 = 8_000_000;

/// Hardware SPI controllers as `(bus, sclk, mosi)` GPIO numbers.
const SPI_PORTS: [(u8, u8, u8); 2] = [(0, 11, 10), (1, 21, 20)];

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strip: StripConfig,
    pub animation: AnimationKind,
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading configuration");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.strip.validate()?;
        self.schedule.validate()
    }
}

/// GPIO line identified by its BCM number. Checked once when built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Pin(u8);

impl Pin {
    pub fn new(number: u8) -> Result<Self> {
        if number > MAX_GPIO {
            return Err(DotstarError::config(format!(
                "GPIO {number} does not exist (max {MAX_GPIO})"
            )));
        }
        Ok(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Pin {
    type Error = DotstarError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Pin> for u8 {
    fn from(value: Pin) -> Self {
        value.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// How bytes reach the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Hardware SPI controller.
    Spi {
        #[serde(default)]
        bus: u8,
        #[serde(default)]
        chip_select: Option<Pin>,
        #[serde(default = "default_clock_hz")]
        clock_hz: u32,
    },
    /// Software serial bus on two arbitrary GPIO lines.
    BitBang {
        data: Pin,
        clock: Pin,
        #[serde(default)]
        chip_select: Option<Pin>,
        #[serde(default = "default_clock_hz")]
        clock_hz: u32,
    },
}

fn default_clock_hz() -> u32 {
    DEFAULT_CLOCK_HZ
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Spi {
            bus: 0,
            chip_select: None,
            clock_hz: DEFAULT_CLOCK_HZ,
        }
    }
}

impl TransportConfig {
    pub fn clock_hz(&self) -> u32 {
        match self {
            TransportConfig::Spi { clock_hz, .. } | TransportConfig::BitBang { clock_hz, .. } => {
                *clock_hz
            }
        }
    }

    pub fn chip_select(&self) -> Option<Pin> {
        match self {
            TransportConfig::Spi { chip_select, .. }
            | TransportConfig::BitBang { chip_select, .. } => *chip_select,
        }
    }

    /// Checks that the pins and bus form a usable combination.
    pub fn validate(&self) -> Result<()> {
        if self.clock_hz() == 0 {
            return Err(DotstarError::config("clock rate must be non-zero"));
        }
        match *self {
            TransportConfig::Spi {
                bus, chip_select, ..
            } => {
                let (_, sclk, mosi) = SPI_PORTS
                    .iter()
                    .copied()
                    .find(|(id, _, _)| *id == bus)
                    .ok_or_else(|| {
                        DotstarError::config(format!("SPI bus {bus} does not exist"))
                    })?;
                if let Some(cs) = chip_select {
                    if cs.number() == sclk || cs.number() == mosi {
                        return Err(DotstarError::config(format!(
                            "chip select {cs} is already used by SPI bus {bus}"
                        )));
                    }
                }
            }
            TransportConfig::BitBang {
                data,
                clock,
                chip_select,
                ..
            } => {
                if data == clock {
                    return Err(DotstarError::config(format!(
                        "data and clock cannot share {data}"
                    )));
                }
                if let Some(cs) = chip_select {
                    if cs == data || cs == clock {
                        return Err(DotstarError::config(format!(
                            "chip select cannot reuse {cs}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Everything needed to build a strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub num_leds: usize,
    pub order: ColorOrder,
    /// Global brightness, 0..=31.
    pub global_brightness: u8,
    /// Emit the 4-byte reset frame SK9822 clones need.
    pub reset_frame: bool,
    pub transport: TransportConfig,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            num_leds: 8,
            order: ColorOrder::Rgb,
            global_brightness: 4,
            reset_frame: true,
            transport: TransportConfig::default(),
        }
    }
}

impl StripConfig {
    pub fn new(num_leds: usize) -> Self {
        Self {
            num_leds,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_leds == 0 || self.num_leds > MAX_LEDS {
            return Err(DotstarError::config(format!(
                "LED count {} outside 1..={MAX_LEDS}",
                self.num_leds
            )));
        }
        validate_brightness(self.global_brightness)?;
        self.transport.validate()
    }
}

pub(crate) fn validate_brightness(value: u8) -> Result<()> {
    if value > MAX_BRIGHTNESS {
        return Err(DotstarError::config(format!(
            "global brightness {value} outside 0..={MAX_BRIGHTNESS}"
        )));
    }
    Ok(())
}

/// Number of passes the engine makes over its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Cycles {
    Forever,
    Count(u64),
}

impl From<i64> for Cycles {
    /// Negative values (conventionally `-1`) mean run forever.
    fn from(value: i64) -> Self {
        if value < 0 {
            Cycles::Forever
        } else {
            Cycles::Count(value as u64)
        }
    }
}

impl From<Cycles> for i64 {
    fn from(value: Cycles) -> Self {
        match value {
            Cycles::Forever => -1,
            Cycles::Count(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

/// Timing of the animation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause after every step, in milliseconds.
    pub pause_ms: u64,
    pub steps_per_cycle: usize,
    pub cycles: Cycles,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            pause_ms: 0,
            steps_per_cycle: 100,
            cycles: Cycles::Forever,
        }
    }
}

impl ScheduleConfig {
    pub fn new(steps_per_cycle: usize, cycles: Cycles, pause: Duration) -> Self {
        Self {
            pause_ms: pause.as_millis().try_into().unwrap_or(u64::MAX),
            steps_per_cycle,
            cycles,
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps_per_cycle == 0 {
            return Err(DotstarError::config("steps per cycle must be at least 1"));
        }
        if self.cycles == Cycles::Count(0) {
            return Err(DotstarError::config(
                "cycle count must be positive or -1 for forever",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitbang(data: u8, clock: u8, chip_select: Option<u8>) -> TransportConfig {
        TransportConfig::BitBang {
            data: Pin::new(data).unwrap(),
            clock: Pin::new(clock).unwrap(),
            chip_select: chip_select.map(|pin| Pin::new(pin).unwrap()),
            clock_hz: DEFAULT_CLOCK_HZ,
        }
    }

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_led_counts_outside_bounds() {
        for n in [0, MAX_LEDS + 1] {
            let err = StripConfig::new(n).validate().unwrap_err();
            assert!(err.is_config());
        }
        StripConfig::new(1).validate().unwrap();
        StripConfig::new(MAX_LEDS).validate().unwrap();
    }

    #[test]
    fn rejects_brightness_above_five_bits() {
        let config = StripConfig {
            global_brightness: 32,
            ..StripConfig::default()
        };
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn rejects_unknown_spi_bus() {
        let config = TransportConfig::Spi {
            bus: 9,
            chip_select: None,
            clock_hz: DEFAULT_CLOCK_HZ,
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("bus 9"));
    }

    #[test]
    fn rejects_chip_select_on_bus_pins() {
        let config = TransportConfig::Spi {
            bus: 0,
            chip_select: Some(Pin::new(11).unwrap()),
            clock_hz: DEFAULT_CLOCK_HZ,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bit_bang_pins_must_differ() {
        bitbang(12, 25, None).validate().unwrap();
        bitbang(12, 25, Some(8)).validate().unwrap();
        assert!(bitbang(25, 25, None).validate().is_err());
        assert!(bitbang(12, 25, Some(12)).validate().is_err());
    }

    #[test]
    fn rejects_missing_gpio() {
        assert!(Pin::new(28).is_err());
        assert!(serde_json::from_str::<Pin>("40").is_err());
    }

    #[test]
    fn zero_clock_rate_is_rejected() {
        let config = TransportConfig::Spi {
            bus: 1,
            chip_select: None,
            clock_hz: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cycles_use_negative_sentinel() {
        assert_eq!(Cycles::from(-1), Cycles::Forever);
        assert_eq!(Cycles::from(3), Cycles::Count(3));
        assert_eq!(i64::from(Cycles::Forever), -1);
    }

    #[test]
    fn schedule_rejects_empty_cycles() {
        let mut schedule = ScheduleConfig::default();
        schedule.steps_per_cycle = 0;
        assert!(schedule.validate().is_err());

        let schedule = ScheduleConfig::new(10, Cycles::Count(0), Duration::ZERO);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn parses_json_document() {
        let json = r#"{
            "strip": {
                "num_leds": 25,
                "order": "BGR",
                "global_brightness": 31,
                "transport": { "method": "bitbang", "data": 12, "clock": 25 }
            },
            "animation": { "name": "rainbow" },
            "schedule": { "steps_per_cycle": 255, "cycles": -1 }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();

        assert_eq!(config.strip.num_leds, 25);
        assert_eq!(config.strip.order, ColorOrder::Bgr);
        assert!(config.strip.reset_frame);
        assert_eq!(config.strip.transport.clock_hz(), DEFAULT_CLOCK_HZ);
        assert_eq!(config.animation, AnimationKind::Rainbow);
        assert_eq!(config.schedule.cycles, Cycles::Forever);
        assert_eq!(config.schedule.pause(), Duration::ZERO);
    }

    #[test]
    fn invalid_json_document_is_rejected() {
        let json = r#"{ "strip": { "num_leds": 2000 } }"#;
        let err = AppConfig::from_json_str(json).unwrap_err();
        assert!(err.is_config());
    }
}
