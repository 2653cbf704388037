/// Bounded polling policy: wait `delay_ms`, read, compare, up to `attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Retry {
  pub attempts: u8,
  pub delay_ms: u32,
}

impl Retry {
  pub const fn new(attempts: u8, delay_ms: u32) -> Self {
    Self { attempts, delay_ms }
  }
}

/// Poll budgets and fixed waits used across reset, boot, power and calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
  /// Reset line held low for at least this long.
  pub reset_hold_ms: u32,
  /// Settle time after releasing reset, before the first register access.
  pub reset_settle_ms: u32,
  pub boot_done: Retry,
  pub ram_init: Retry,
  pub dsp_run: Retry,
  /// Mailbox acknowledgement poll, shared by every acked command.
  pub mailbox_ack: Retry,
  pub power_up: Retry,
  pub power_down: Retry,
  /// Firmware reporting the expected playback state after play/pause.
  pub firmware_state: Retry,
  /// Wakeup command retries out of hibernation. The part NAKs until its
  /// control port is back, so bus errors count as a failed attempt.
  pub wake: Retry,
  pub calibration: Retry,
}

impl Timing {
  pub const fn new() -> Self {
    Self {
      reset_hold_ms: 2,
      reset_settle_ms: 2,
      boot_done: Retry::new(10, 1),
      ram_init: Retry::new(10, 1),
      dsp_run: Retry::new(10, 1),
      mailbox_ack: Retry::new(10, 1),
      power_up: Retry::new(10, 1),
      power_down: Retry::new(10, 1),
      firmware_state: Retry::new(10, 1),
      wake: Retry::new(10, 1),
      calibration: Retry::new(25, 100),
    }
  }

  pub const fn with_boot_done(mut self, retry: Retry) -> Self {
    self.boot_done = retry;
    self
  }

  pub const fn with_power(mut self, up: Retry, down: Retry) -> Self {
    self.power_up = up;
    self.power_down = down;
    self
  }

  pub const fn with_wake(mut self, retry: Retry) -> Self {
    self.wake = retry;
    self
  }

  pub const fn with_calibration(mut self, retry: Retry) -> Self {
    self.calibration = retry;
    self
  }
}

impl Default for Timing {
  fn default() -> Self {
    Self::new()
  }
}
