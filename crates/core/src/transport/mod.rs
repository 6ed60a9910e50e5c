//! Byte sinks that carry encoded frames to the chain.
//!
//! The strip only ever needs `write`. How the bytes reach the wire (a kernel
//! SPI node, toggled GPIO lines, or nowhere at all in tests) is the
//! transport's business.

use std::{
    io::Write,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{self, ErrorKind, OutputPin},
};

/// Default transfer limit of the Linux spidev driver.
pub const SPIDEV_BUFSIZ: usize = 4096;

/// Errors raised by a transport collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The bus was never acquired or has already been unlocked.
    #[error("transport is not acquired")]
    NotAcquired,
    /// The transport was released and can no longer write.
    #[error("transport has been released")]
    Released,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A GPIO line of a software bus refused to switch.
    #[error("{line} line failed: {kind:?}")]
    Pin { line: &'static str, kind: ErrorKind },
    #[error("{0}")]
    Message(String),
}

impl TransportError {
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    fn pin<E: digital::Error>(line: &'static str) -> impl Fn(E) -> Self {
        move |err| Self::Pin {
            line,
            kind: err.kind(),
        }
    }
}

/// Synchronous byte sink driving the clock/data pair.
pub trait Transport {
    /// Emits `bytes` in order, blocking until done.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Gives the underlying bus back. Called once during teardown.
    fn release(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Largest single write the transport accepts, if limited.
    fn max_write_len(&self) -> Option<usize> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn release(&mut self) -> Result<(), TransportError> {
        (**self).release()
    }

    fn max_write_len(&self) -> Option<usize> {
        (**self).max_write_len()
    }
}

#[derive(Debug, Default)]
struct LogState {
    writes: Vec<Vec<u8>>,
    released: bool,
}

/// Shared, cloneable view of everything a [`MemoryTransport`] received.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    shared: Arc<Mutex<LogState>>,
}

impl WriteLog {
    /// Every physical write, oldest first.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// The most recent write, if any.
    pub fn last(&self) -> Option<Vec<u8>> {
        self.lock().writes.last().cloned()
    }

    /// All bytes written so far, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().writes.concat()
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport that keeps every write in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    log: WriteLog,
    max_write_len: Option<usize>,
    fail_after: Option<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps each physical write at `limit` bytes.
    pub fn with_max_write_len(mut self, limit: usize) -> Self {
        self.max_write_len = Some(limit);
        self
    }

    /// Accepts `writes` writes, then fails every following one.
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.log.lock();
        if state.released {
            return Err(TransportError::Released);
        }
        if self.fail_after.is_some_and(|limit| state.writes.len() >= limit) {
            return Err(TransportError::msg("simulated bus failure"));
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn release(&mut self) -> Result<(), TransportError> {
        let mut state = self.log.lock();
        if state.released {
            return Err(TransportError::NotAcquired);
        }
        state.released = true;
        Ok(())
    }

    fn max_write_len(&self) -> Option<usize> {
        self.max_write_len
    }
}

/// Forwards frames to any [`Write`] sink, such as a configured spidev node.
#[derive(Debug)]
pub struct StreamTransport<W: Write> {
    sink: Option<W>,
    max_write_len: Option<usize>,
}

/// Bus settings applied to a spidev node: mode 0, 8-bit words, `clock_hz`.
#[cfg(target_os = "linux")]
pub fn spidev_options(clock_hz: u32) -> spidev::SpidevOptions {
    spidev::SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(clock_hz)
        .mode(spidev::SpiModeFlags::SPI_MODE_0)
        .build()
}

#[cfg(target_os = "linux")]
impl StreamTransport<spidev::Spidev> {
    /// Opens and configures a Linux spidev node. Every write there is one
    /// SPI transfer.
    pub fn open_spidev(
        path: impl AsRef<std::path::Path>,
        clock_hz: u32,
    ) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let mut spi = spidev::Spidev::open(path)?;
        spi.configure(&spidev_options(clock_hz))?;
        tracing::debug!(path = %path.display(), clock_hz, "configured spidev node");
        Ok(Self::new(spi).with_max_write_len(SPIDEV_BUFSIZ))
    }
}

impl<W: Write> StreamTransport<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            max_write_len: None,
        }
    }

    pub fn with_max_write_len(mut self, limit: usize) -> Self {
        self.max_write_len = Some(limit);
        self
    }

    /// Hands the sink back, or `None` once released.
    pub fn into_inner(self) -> Option<W> {
        self.sink
    }
}

impl<W: Write> Transport for StreamTransport<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let sink = self.sink.as_mut().ok_or(TransportError::Released)?;
        sink.write_all(bytes)?;
        sink.flush()?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), TransportError> {
        let mut sink = self.sink.take().ok_or(TransportError::NotAcquired)?;
        sink.flush()?;
        Ok(())
    }

    fn max_write_len(&self) -> Option<usize> {
        self.max_write_len
    }
}

/// Placeholder pin for a software bus wired without chip-select.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChipSelect;

impl digital::ErrorType for NoChipSelect {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoChipSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Software serial bus on plain GPIO outputs. Shifts each byte out MSB
/// first, data changing while the clock is low and sampled on the rising
/// edge. An optional chip-select is held low for the length of a write.
#[derive(Debug)]
pub struct BitBangTransport<CLK, DATA, CS, D> {
    clock: CLK,
    data: DATA,
    chip_select: Option<CS>,
    delay: D,
    half_period_ns: u32,
    released: bool,
}

impl<CLK, DATA, D> BitBangTransport<CLK, DATA, NoChipSelect, D>
where
    CLK: OutputPin,
    DATA: OutputPin,
    D: DelayNs,
{
    pub fn new(clock: CLK, data: DATA, delay: D, clock_hz: u32) -> Self {
        Self {
            clock,
            data,
            chip_select: None,
            delay,
            half_period_ns: 500_000_000 / clock_hz.max(1),
            released: false,
        }
    }
}

impl<CLK, DATA, CS, D> BitBangTransport<CLK, DATA, CS, D>
where
    CLK: OutputPin,
    DATA: OutputPin,
    CS: OutputPin,
    D: DelayNs,
{
    /// Frames every write with `chip_select`.
    pub fn with_chip_select<P: OutputPin>(
        self,
        chip_select: P,
    ) -> BitBangTransport<CLK, DATA, P, D> {
        BitBangTransport {
            clock: self.clock,
            data: self.data,
            chip_select: Some(chip_select),
            delay: self.delay,
            half_period_ns: self.half_period_ns,
            released: self.released,
        }
    }

    pub fn half_period(&self) -> Duration {
        Duration::from_nanos(u64::from(self.half_period_ns))
    }

    /// Gives the pins and the delay back.
    pub fn into_parts(self) -> (CLK, DATA, Option<CS>, D) {
        (self.clock, self.data, self.chip_select, self.delay)
    }

    fn select(&mut self, active: bool) -> Result<(), TransportError> {
        match self.chip_select.as_mut() {
            Some(pin) if active => pin.set_low().map_err(TransportError::pin("chip select")),
            Some(pin) => pin.set_high().map_err(TransportError::pin("chip select")),
            None => Ok(()),
        }
    }

    fn shift_out(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for &byte in bytes {
            for bit in (0..8).rev() {
                self.data
                    .set_state((byte & (1 << bit) != 0).into())
                    .map_err(TransportError::pin("data"))?;
                self.pause();
                self.clock.set_high().map_err(TransportError::pin("clock"))?;
                self.pause();
                self.clock.set_low().map_err(TransportError::pin("clock"))?;
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }
}

impl<CLK, DATA, CS, D> Transport for BitBangTransport<CLK, DATA, CS, D>
where
    CLK: OutputPin,
    DATA: OutputPin,
    CS: OutputPin,
    D: DelayNs,
{
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::Released);
        }
        self.select(true)?;
        let result = self.shift_out(bytes);
        self.select(false)?;
        result
    }

    fn release(&mut self) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::NotAcquired);
        }
        self.released = true;
        self.clock.set_low().map_err(TransportError::pin("clock"))?;
        self.data.set_low().map_err(TransportError::pin("data"))?;
        self.select(false)
    }
}
