use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use dotstar_core::{
    AnimationEngine, AnimationKind, AppConfig, CancelToken, ColorOrder, Cycles, DotstarError,
    ScheduleConfig, StreamTransport, Strip, StripConfig, Transport, TransportConfig,
};
use smart_leds::{
    colors::{RED, WHITE},
    RGB8,
};
use tracing_subscriber::EnvFilter;

fn main() -> dotstar_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;

    match cli.command {
        Commands::Run { animation, options } => run_animation(animation, &options, &cancel),
        Commands::Demo { options } => run_demo(&options, &cancel),
        Commands::Pixels { hold_secs, options } => run_pixels(hold_secs, &options, &cancel),
    }
}

fn run_animation(
    animation: Option<AnimationName>,
    options: &StripOptions,
    cancel: &CancelToken,
) -> dotstar_core::Result<()> {
    let mut config = options.resolve()?;
    if let Some(animation) = animation {
        config.animation = animation.kind();
    }
    tracing::info!(
        animation = ?config.animation,
        num_leds = config.strip.num_leds,
        "starting animation"
    );

    let mut engine = AnimationEngine::from_config(&config)?;
    let transport = open_transport(&config.strip, options)?;
    let report = engine.start(transport, cancel)?;
    if report.cancelled {
        tracing::info!("interrupted");
    }
    tracing::info!(
        cycles = report.cycles_completed,
        repaints = report.repaints,
        "animation finished"
    );
    Ok(())
}

fn run_demo(options: &StripOptions, cancel: &CancelToken) -> dotstar_core::Result<()> {
    let config = options.resolve()?;
    let num_leds = config.strip.num_leds;
    let program = [
        (
            "three seconds of white light",
            AnimationKind::solid(),
            ScheduleConfig::new(1, Cycles::Count(1), Duration::from_secs(3)),
        ),
        (
            "twice around the clock",
            AnimationKind::RoundAndRound,
            ScheduleConfig::new(num_leds, Cycles::Count(2), Duration::ZERO),
        ),
        (
            "one strand test of red, green and blue each",
            AnimationKind::StrandTest,
            ScheduleConfig::new(num_leds, Cycles::Count(3), Duration::ZERO),
        ),
        (
            "one slow trip through the rainbow",
            AnimationKind::Rainbow,
            ScheduleConfig::new(255, Cycles::Count(1), Duration::ZERO),
        ),
        (
            "five quick trips through the rainbow",
            AnimationKind::TheaterChase,
            ScheduleConfig::new(35, Cycles::Count(5), Duration::from_millis(40)),
        ),
    ];

    for (label, kind, schedule) in program {
        if cancel.is_cancelled() {
            break;
        }
        tracing::info!("{label}");
        let mut engine = AnimationEngine::new(config.strip.clone(), schedule, kind.build())?;
        engine.start(open_transport(&config.strip, options)?, cancel)?;
    }
    tracing::info!("demo finished");
    Ok(())
}

fn run_pixels(
    hold_secs: u64,
    options: &StripOptions,
    cancel: &CancelToken,
) -> dotstar_core::Result<()> {
    let config = options.resolve()?;
    let mut strip = Strip::new(&config.strip, open_transport(&config.strip, options)?)?;

    let result = (|| -> dotstar_core::Result<()> {
        strip.clear()?;
        strip.set_pixel(12, RED);
        strip.set_pixel(24, WHITE);
        strip.set_pixel(40, RGB8::new(0, 0xFF, 0));
        strip.show()?;
        strip.dump();
        cancel.sleep(Duration::from_secs(hold_secs));
        Ok(())
    })();
    let teardown = strip.teardown();
    result?;
    teardown
}

/// Picks the byte sink for `strip`. Hardware SPI goes through the kernel
/// spidev node; `--dry-run` discards the bytes.
fn open_transport(
    strip: &StripConfig,
    options: &StripOptions,
) -> dotstar_core::Result<Box<dyn Transport>> {
    if options.dry_run {
        tracing::info!("dry run, frames are discarded");
        return Ok(Box::new(StreamTransport::new(std::io::sink())));
    }
    match &strip.transport {
        TransportConfig::Spi {
            bus,
            chip_select,
            clock_hz,
        } => {
            let path = options
                .device
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("/dev/spidev{bus}.0")));
            if let Some(pin) = chip_select {
                tracing::warn!(%pin, "spidev drives its own chip select, ignoring software pin");
            }
            tracing::debug!(clock_hz, path = %path.display(), "using hardware SPI");
            open_spidev(&path, *clock_hz)
        }
        TransportConfig::BitBang { data, clock, .. } => Err(DotstarError::config(format!(
            "bit-banged bus on {data}/{clock} needs a GPIO backend, none is built in"
        ))),
    }
}

#[cfg(target_os = "linux")]
fn open_spidev(path: &Path, clock_hz: u32) -> dotstar_core::Result<Box<dyn Transport>> {
    Ok(Box::new(StreamTransport::open_spidev(path, clock_hz)?))
}

#[cfg(not(target_os = "linux"))]
fn open_spidev(path: &Path, _clock_hz: u32) -> dotstar_core::Result<Box<dyn Transport>> {
    Err(DotstarError::config(format!(
        "{} needs the Linux spidev driver",
        path.display()
    )))
}

fn install_interrupt_handler(cancel: &CancelToken) -> dotstar_core::Result<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel()).map_err(std::io::Error::other)?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive APA102-style LED chains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one animation until it finishes or Ctrl-C is pressed.
    Run {
        /// Animation to play. Defaults to the one in the config file.
        animation: Option<AnimationName>,
        #[command(flatten)]
        options: StripOptions,
    },
    /// Play the built-in showcase of every animation.
    Demo {
        #[command(flatten)]
        options: StripOptions,
    },
    /// Light a few individual pixels, hold them, then clear the strip.
    Pixels {
        /// Seconds to keep the pixels lit.
        #[arg(long, default_value_t = 20)]
        hold_secs: u64,
        #[command(flatten)]
        options: StripOptions,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AnimationName {
    Solid,
    StrandTest,
    TheaterChase,
    RoundAndRound,
    Rainbow,
}

impl AnimationName {
    fn kind(self) -> AnimationKind {
        match self {
            AnimationName::Solid => AnimationKind::solid(),
            AnimationName::StrandTest => AnimationKind::StrandTest,
            AnimationName::TheaterChase => AnimationKind::TheaterChase,
            AnimationName::RoundAndRound => AnimationKind::RoundAndRound,
            AnimationName::Rainbow => AnimationKind::Rainbow,
        }
    }
}

#[derive(Args, Debug)]
struct StripOptions {
    /// JSON configuration file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of LEDs in the chain (1-1024).
    #[arg(short = 'n', long)]
    leds: Option<usize>,
    /// Wiring order: rgb, rbg, grb, gbr, brg or bgr. Unknown values mean rgb.
    #[arg(short, long)]
    order: Option<String>,
    /// Global brightness (0-31).
    #[arg(short, long)]
    brightness: Option<u8>,
    /// Leave out the reset frame SK9822 clones expect.
    #[arg(long)]
    no_reset_frame: bool,
    /// Pause after every step, in milliseconds.
    #[arg(long)]
    pause_ms: Option<u64>,
    /// Steps in one animation cycle.
    #[arg(long)]
    steps: Option<usize>,
    /// Number of cycles, -1 to run until interrupted.
    #[arg(long, allow_hyphen_values = true)]
    cycles: Option<i64>,
    /// spidev node to write to instead of /dev/spidev<bus>.0.
    #[arg(long)]
    device: Option<PathBuf>,
    /// Encode frames but do not touch any hardware.
    #[arg(long)]
    dry_run: bool,
}

impl StripOptions {
    /// Merges the config file (or defaults) with command line overrides.
    fn resolve(&self) -> dotstar_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(leds) = self.leds {
            config.strip.num_leds = leds;
        }
        if let Some(order) = &self.order {
            config.strip.order = ColorOrder::from_tag(order);
        }
        if let Some(brightness) = self.brightness {
            config.strip.global_brightness = brightness;
        }
        if self.no_reset_frame {
            config.strip.reset_frame = false;
        }
        if let Some(pause_ms) = self.pause_ms {
            config.schedule.pause_ms = pause_ms;
        }
        if let Some(steps) = self.steps {
            config.schedule.steps_per_cycle = steps;
        }
        if let Some(cycles) = self.cycles {
            config.schedule.cycles = Cycles::from(cycles);
        }
        config.validate()?;
        Ok(config)
    }
}
