use crate::event::{EventFlags, EventSignal};
use crate::reg;
use crate::wseq::{Operation, TagLayout};

mod timing;

pub use timing::*;

/// Notification callback, invoked from [`crate::SmartAmp::process`] with the
/// collected flags and the opaque argument registered alongside it.
pub type Callback = fn(EventFlags, usize);

/// Register address/value pair.
pub type RegWrite = (u32, u32);

/// Most calibration overrides saved and restored around one calibration run.
pub const MAX_CALIBRATION_OVERRIDES: usize = 8;

/// A known silicon revision and the errata it needs after every boot and wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
  pub id: u32,
  pub errata: &'static [RegWrite],
}

impl Revision {
  pub const fn new(id: u32, errata: &'static [RegWrite]) -> Self {
    Self { id, errata }
  }
}

/// A register kept in the write sequence so it survives hibernation.
///
/// `value` seeds a new entry; an existing entry is refreshed from the live
/// register before every hibernation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistedWrite {
  pub address: u32,
  pub value: u32,
  pub operation: Operation,
}

impl PersistedWrite {
  pub const fn new(address: u32, value: u32, operation: Operation) -> Self {
    Self { address, value, operation }
  }
}

/// Inputs of the calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationParams {
  /// Ambient temperature in °C at the time of calibration.
  pub ambient: u32,
  /// Registers forced for the duration of the measurement and restored after.
  pub overrides: &'static [RegWrite],
}

impl CalibrationParams {
  pub const fn new(ambient: u32, overrides: &'static [RegWrite]) -> Self {
    Self { ambient, overrides }
  }
}

impl Default for CalibrationParams {
  fn default() -> Self {
    Self::new(reg::DEFAULT_AMBIENT, &reg::CALIBRATION_OVERRIDES)
  }
}

/// Everything the driver needs to know about one part and its board.
///
/// Immutable once handed to [`crate::SmartAmp::configure`]. The defaults
/// describe the reference part; sibling parts swap the tables and masks.
///
/// # Example
/// ```no_run
/// use smartamp::{Config, EventFlags, EventSignal, Retry, Timing};
///
/// static SIGNAL: EventSignal = EventSignal::new();
///
/// fn on_event(flags: EventFlags, arg: usize) {
///   let _ = (flags, arg);
/// }
///
/// let config = Config::default()
///   .with_signal(&SIGNAL)
///   .with_callback(on_event, 0)
///   .with_timing(Timing::default().with_boot_done(Retry::new(20, 1)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Config {
  pub callback: Option<Callback>,
  pub callback_arg: usize,
  pub signal: Option<&'static EventSignal>,
  /// Written right after every reset.
  pub baseline: &'static [RegWrite],
  /// Written once the DSP runs, and again after every wake.
  pub post_boot: &'static [RegWrite],
  pub persist: &'static [PersistedWrite],
  pub device_ids: &'static [u32],
  pub revisions: &'static [Revision],
  /// Values for the two interrupt mask registers once the part is up.
  pub irq_masks: [u32; 2],
  /// Wake sources armed before hibernating.
  pub wake_source: u32,
  pub tag_layout: TagLayout,
  pub timing: Timing,
  pub calibration: CalibrationParams,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      callback: None,
      callback_arg: 0,
      signal: None,
      baseline: &reg::BASELINE,
      post_boot: &reg::POST_BOOT,
      persist: &reg::PERSIST,
      device_ids: &reg::SUPPORTED_DEVICE_IDS,
      revisions: &reg::REVISIONS,
      irq_masks: [!reg::IRQ1_UNMASKED, !reg::IRQ2_UNMASKED],
      wake_source: reg::WKSRC_EN_I2C | reg::WKSRC_EN_GPIO1,
      tag_layout: TagLayout::REFERENCE,
      timing: Timing::new(),
      calibration: CalibrationParams::new(reg::DEFAULT_AMBIENT, &reg::CALIBRATION_OVERRIDES),
    }
  }

  pub const fn with_callback(mut self, callback: Callback, arg: usize) -> Self {
    self.callback = Some(callback);
    self.callback_arg = arg;
    self
  }

  pub const fn with_signal(mut self, signal: &'static EventSignal) -> Self {
    self.signal = Some(signal);
    self
  }

  pub const fn with_baseline(mut self, table: &'static [RegWrite]) -> Self {
    self.baseline = table;
    self
  }

  pub const fn with_post_boot(mut self, table: &'static [RegWrite]) -> Self {
    self.post_boot = table;
    self
  }

  pub const fn with_persist(mut self, table: &'static [PersistedWrite]) -> Self {
    self.persist = table;
    self
  }

  pub const fn with_devices(mut self, device_ids: &'static [u32], revisions: &'static [Revision]) -> Self {
    self.device_ids = device_ids;
    self.revisions = revisions;
    self
  }

  pub const fn with_irq_masks(mut self, masks: [u32; 2]) -> Self {
    self.irq_masks = masks;
    self
  }

  pub const fn with_wake_source(mut self, wake_source: u32) -> Self {
    self.wake_source = wake_source;
    self
  }

  pub const fn with_tag_layout(mut self, layout: TagLayout) -> Self {
    self.tag_layout = layout;
    self
  }

  pub const fn with_timing(mut self, timing: Timing) -> Self {
    self.timing = timing;
    self
  }

  pub const fn with_calibration(mut self, params: CalibrationParams) -> Self {
    self.calibration = params;
    self
  }

  pub(crate) fn errata(&self, revision_id: u32) -> Option<&'static [RegWrite]> {
    self.revisions.iter().find(|r| r.id == revision_id).map(|r| r.errata)
  }

  pub(crate) fn supports(&self, device_id: u32, revision_id: u32) -> bool {
    self.device_ids.contains(&device_id) && self.errata(revision_id).is_some()
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
