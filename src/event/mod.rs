use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use crate::reg::*;
use crate::{Error, RegisterBus, SmartAmp, State};

mod flags;

pub use flags::EventFlags;

/// Pending-event flag shared between the interrupt handler and the driver.
///
/// [`EventSignal::signal`] is a single atomic store and is safe to call from
/// interrupt context. All register traffic happens later, in
/// [`SmartAmp::process`].
#[derive(Debug)]
pub struct EventSignal {
  pending: AtomicBool,
}

impl EventSignal {
  pub const fn new() -> Self {
    Self { pending: AtomicBool::new(false) }
  }

  /// Mark an interrupt as pending. Call this from the GPIO edge handler.
  pub fn signal(&self) {
    self.pending.store(true, Ordering::Release);
  }

  pub fn is_pending(&self) -> bool {
    self.pending.load(Ordering::Acquire)
  }

  /// Consume the pending flag. An edge raised after this returns is kept.
  pub(crate) fn take(&self) -> bool {
    self.pending.swap(false, Ordering::AcqRel)
  }

  pub(crate) fn clear(&self) {
    self.pending.store(false, Ordering::Release);
  }
}

impl Default for EventSignal {
  fn default() -> Self {
    Self::new()
  }
}

/// What the next [`SmartAmp::process`] call will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
  HandlingControls,
  HandlingEvents,
}

/// One interrupt status bit and what it means.
struct Rule {
  bank: usize,
  mask: u32,
  flag: EventFlags,
  /// Error-release bit to pulse, 0 when the bit needs no release.
  release: u32,
  /// The boost converter must be off while the release is pulsed.
  boost: bool,
}

const fn rule(bank: usize, mask: u32, flag: EventFlags, release: u32, boost: bool) -> Rule {
  Rule { bank, mask, flag, release, boost }
}

const RULES: [Rule; 8] = [
  rule(0, IRQ1_AMP_SHORT_ERR, EventFlags::AMP_ERROR, RLS_AMP_SHORT_ERR, false),
  rule(0, IRQ1_TEMP_ERR, EventFlags::TEMP_ERROR, RLS_TEMP_ERR, false),
  rule(0, IRQ1_TEMP_WARN_RISE, EventFlags::TEMP_WARNING, RLS_TEMP_WARN, false),
  rule(0, IRQ1_BST_SHORT_ERR, EventFlags::BOOST_ERROR, RLS_BST_SHORT_ERR, true),
  rule(0, IRQ1_BST_OVP_ERR, EventFlags::BOOST_ERROR, RLS_BST_OVP_ERR, true),
  rule(0, IRQ1_BST_DCM_UVP_ERR, EventFlags::BOOST_ERROR, RLS_BST_UVP_ERR, true),
  rule(0, IRQ1_WKSRC_STATUS, EventFlags::WAKE_SOURCE, 0, false),
  rule(1, IRQ2_DSP_MBOX_WR, EventFlags::MAILBOX, 0, false),
];

const BANKS: [(Reg, Reg); 2] = [(Reg::IrqStatus1, Reg::IrqMask1), (Reg::IrqStatus2, Reg::IrqMask2)];

/// Result of mapping unmasked status bits through [`RULES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decoded {
  flags: EventFlags,
  release: u32,
  boost: bool,
}

fn decode(pending: [u32; 2]) -> Decoded {
  let mut out = Decoded { flags: EventFlags::empty(), release: 0, boost: false };
  for r in RULES.iter().filter(|r| pending[r.bank] & r.mask != 0) {
    out.flags |= r.flag;
    out.release |= r.release;
    out.boost |= r.boost;
  }
  out
}

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  pub fn mode(&self) -> Mode {
    match self.config.signal {
      Some(signal) if signal.is_pending() => Mode::HandlingEvents,
      _ => Mode::HandlingControls,
    }
  }

  /// Service a pending interrupt.
  ///
  /// Does nothing unless the [`EventSignal`] was raised. Otherwise decodes and
  /// clears the unmasked interrupt status, releases latched amplifier errors,
  /// and calls the registered callback once with everything that was found.
  /// A failure during handling is reported as [`EventFlags::STATE_ERROR`] and
  /// moves the driver to [`State::Error`].
  ///
  /// Returns the flags that were delivered.
  pub async fn process(&mut self) -> EventFlags {
    match self.config.signal {
      Some(signal) if signal.take() => {}
      _ => return EventFlags::empty(),
    }

    if self.handle_interrupts().await.is_err() {
      error!("interrupt handling failed in {}", self.state);
      self.event_flags.insert(EventFlags::STATE_ERROR);
      self.state = State::Error;
    }

    let flags = core::mem::replace(&mut self.event_flags, EventFlags::empty());
    if !flags.is_empty() {
      debug!("delivering events {}", flags);
      if let Some(callback) = self.config.callback {
        callback(flags, self.config.callback_arg);
      }
    }
    flags
  }

  async fn handle_interrupts(&mut self) -> Result<(), Error<E>> {
    let mut pending = [0u32; 2];
    for (bits, (status, mask)) in pending.iter_mut().zip(BANKS) {
      let s = self.read(status).await?;
      let m = self.read(mask).await?;
      *bits = s & !m;
      if *bits != 0 {
        self.write(status, *bits).await?;
      }
    }

    let decoded = decode(pending);
    trace!("irq status {=u32:#x} {=u32:#x}", pending[0], pending[1]);
    if decoded.release != 0 {
      self.release_errors(decoded.release, decoded.boost).await?;
    }
    self.event_flags |= decoded.flags;
    Ok(())
  }

  /// Pulse the error-release bits, with the boost converter off if asked.
  async fn release_errors(&mut self, release: u32, boost: bool) -> Result<(), Error<E>> {
    warn!("releasing amplifier errors {=u32:#x}", release);
    if boost {
      self.update_bits(Reg::BlockEnables, BLOCK_BST_EN, 0).await?;
    }
    self.write(Reg::ErrorRelease, 0).await?;
    self.write(Reg::ErrorRelease, release).await?;
    self.write(Reg::ErrorRelease, 0).await?;
    if boost {
      self.update_bits(Reg::BlockEnables, BLOCK_BST_EN, BLOCK_BST_EN).await?;
    }
    Ok(())
  }
}
