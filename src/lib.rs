#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` driver runtime for boosted smart-amplifier and haptic-driver
//! ICs with an embedded DSP core.
//!
//! The crate owns the parts every driver of this family repeats:
//!
//! - Reset and firmware boot hand-off, including silicon errata per revision
//! - A guarded power state machine with DSP, standby and hibernation states
//! - The on-device write-sequencer that replays register state after
//!   hibernation, with pure encode/decode of its compact word format
//! - Interrupt-deferred event handling: the ISR only raises an
//!   [`EventSignal`], and [`SmartAmp::process`] does the register work
//! - A timed, checksum-validated speaker calibration
//!
//! Register access goes through the [`RegisterBus`] trait; [`I2cBus`] covers the
//! usual 32-bit big-endian control port over `embedded-hal-async` I²C.
//!
//! ```no_run
//! use embedded_hal::digital::OutputPin;
//! use embedded_hal_async::{delay::DelayNs, i2c::I2c};
//! use smartamp::{Config, EventSignal, FirmwareInfo, I2cBus, PowerRequest, SmartAmp};
//!
//! static SIGNAL: EventSignal = EventSignal::new();
//!
//! async fn bring_up<I, RST, D>(i2c: I, reset: RST, delay: D, fw: &FirmwareInfo<'_>) -> Result<(), smartamp::Error<I::Error>>
//! where
//!   I: I2c,
//!   RST: OutputPin,
//!   D: DelayNs,
//! {
//!   let mut amp = SmartAmp::new(I2cBus::new(i2c, 0x40), reset, delay);
//!   amp.configure(Config::default().with_signal(&SIGNAL))?;
//!   amp.reset().await?;
//!   // stream the firmware image here, then hand over its symbol table
//!   amp.boot(Some(fw)).await?;
//!   amp.power(PowerRequest::PowerUp).await?;
//!
//!   loop {
//!     // GPIO edge handler calls SIGNAL.signal()
//!     let events = amp.process().await;
//!     if !events.is_empty() {
//!       // react to amplifier/boost/temperature events
//!     }
//!   }
//! }
//! ```

#[macro_use]
mod fmt;

mod boot;
mod bus;
mod calibration;
mod config;
mod event;
mod power;
mod reg;
mod rw;
mod symbols;
mod wseq;

#[cfg(test)]
mod sim;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

pub use bus::{I2cBus, RegisterBus};
pub use calibration::{CalibrationData, CalibrationStatus};
pub use config::*;
pub use event::{EventFlags, EventSignal, Mode};
pub use power::PowerRequest;
pub use reg::MailboxCommand;
pub use symbols::{FirmwareInfo, FirmwareSymbol, Symbol, SymbolTable};
pub use wseq::{Entry, Operation, SequenceError, TagLayout, WriteSequence, MAX_ENTRIES, MAX_WORDS};

use symbols::ControlSymbols;

/// Errors that can occur while driving the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// Register transaction failed with the underlying bus error.
  Bus(E),
  /// The reset line could not be driven.
  Gpio,
  /// A bounded poll ran out of attempts.
  TimedOut,
  /// The request is not reachable from the current state. No I/O was done.
  InvalidTransition,
  /// The part identified itself with an id or revision this driver does not know.
  UnsupportedRevision { device_id: u32, revision_id: u32 },
  /// The write-sequence table is full; it was left unchanged.
  ResourceExhausted,
  /// A required firmware control symbol is missing from the symbol table.
  SymbolNotFound(u32),
  /// A persisted write sequence could not be decoded.
  MalformedSequence,
  /// An argument violates the write-sequence encoding rules.
  InvalidArgument,
  /// The device finished calibration with a failure status.
  CalibrationFailed(CalibrationStatus),
}

impl<E> From<SequenceError> for Error<E> {
  fn from(err: SequenceError) -> Self {
    match err {
      SequenceError::Malformed => Error::MalformedSequence,
      SequenceError::Exhausted => Error::ResourceExhausted,
      SequenceError::InvalidArgument => Error::InvalidArgument,
    }
  }
}

/// Driver state. Moves only along the edges of [`PowerRequest::target`] and the
/// lifecycle calls on [`SmartAmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
  Unconfigured,
  Configured,
  Standby,
  PoweredUp,
  DspStandby,
  DspPoweredUp,
  Hibernating,
  Error,
}

/// Driver for one smart-amplifier device.
///
/// The value owns the register bus, the reset line and the delay provider and
/// serializes all register I/O for the device. Create it with
/// [`SmartAmp::new`], hand it a [`Config`], then walk it through
/// [`SmartAmp::reset`], [`SmartAmp::boot`] and [`SmartAmp::power`].
pub struct SmartAmp<B, RST, D> {
  bus: B,
  reset_pin: RST,
  delay: D,
  state: State,
  config: Config,
  wseq: WriteSequence,
  device_id: u32,
  revision_id: u32,
  symbols: Option<ControlSymbols>,
  event_flags: EventFlags,
  calibration: CalibrationData,
}

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  /// Create a driver in the [`State::Unconfigured`] state. No I/O is done.
  pub fn new(bus: B, reset_pin: RST, delay: D) -> Self {
    let config = Config::default();
    Self {
      bus,
      reset_pin,
      delay,
      state: State::Unconfigured,
      wseq: WriteSequence::new(config.tag_layout),
      config,
      device_id: 0,
      revision_id: 0,
      symbols: None,
      event_flags: EventFlags::empty(),
      calibration: CalibrationData::default(),
    }
  }

  /// Store the configuration. Allowed before the first reset only.
  pub fn configure(&mut self, config: Config) -> Result<(), Error<E>> {
    match self.state {
      State::Unconfigured | State::Configured => {
        self.config = config;
        self.wseq = WriteSequence::new(config.tag_layout);
        self.state = State::Configured;
        debug!("configured");
        Ok(())
      }
      _ => Err(Error::InvalidTransition),
    }
  }

  /// Return the driver to its pristine, unconfigured state.
  ///
  /// This is the only way out of [`State::Error`]. The device itself is not
  /// touched; a following [`SmartAmp::reset`] brings it back in line.
  pub fn initialize(&mut self) {
    if let Some(signal) = self.config.signal {
      signal.clear();
    }
    self.config = Config::default();
    self.wseq = WriteSequence::new(self.config.tag_layout);
    self.device_id = 0;
    self.revision_id = 0;
    self.symbols = None;
    self.event_flags = EventFlags::empty();
    self.calibration = CalibrationData::default();
    self.state = State::Unconfigured;
    info!("driver initialized");
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Device identifier read during the last successful reset.
  pub fn device_id(&self) -> u32 {
    self.device_id
  }

  /// Silicon revision read during the last successful reset.
  pub fn revision_id(&self) -> u32 {
    self.revision_id
  }

  pub fn calibration(&self) -> CalibrationData {
    self.calibration
  }

  /// Host-side copy of the persisted write sequence.
  pub fn write_sequence(&self) -> &WriteSequence {
    &self.wseq
  }

  /// Give the peripherals back.
  pub fn release(self) -> (B, RST, D) {
    (self.bus, self.reset_pin, self.delay)
  }
}
