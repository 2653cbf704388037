use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use crate::reg::MailboxCommand;
use crate::{Error, RegWrite, RegisterBus, SmartAmp, State, Symbol, MAX_CALIBRATION_OVERRIDES};

/// Calibration status reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum CalibrationStatus {
  Waiting = 0,
  Success = 1,
  Error = 2,
  OutOfRange = 3,
}

impl CalibrationStatus {
  pub const fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      0 => Some(Self::Waiting),
      1 => Some(Self::Success),
      2 => Some(Self::Error),
      3 => Some(Self::OutOfRange),
      _ => None,
    }
  }
}

/// Measured load impedance and the conditions it was taken in.
///
/// Only values whose checksum matched are marked valid, and only valid data
/// is ever pushed back to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationData {
  is_valid: bool,
  r: u32,
  ambient: u32,
}

impl CalibrationData {
  /// Check `checksum` against `r` and build the data accordingly.
  pub const fn validated(ambient: u32, r: u32, checksum: u32) -> Self {
    let is_valid = checksum == r.wrapping_add(CalibrationStatus::Success as u32);
    Self { is_valid, r, ambient }
  }

  pub const fn is_valid(&self) -> bool {
    self.is_valid
  }

  /// Measured impedance, in the firmware's fixed-point units.
  pub const fn r(&self) -> u32 {
    self.r
  }

  pub const fn ambient(&self) -> u32 {
    self.ambient
  }

  /// Checksum to store next to `r`, e.g. in product flash.
  pub const fn checksum(&self) -> u32 {
    self.r.wrapping_add(CalibrationStatus::Success as u32)
  }
}

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  /// Measure the load impedance.
  ///
  /// Only allowed while the DSP plays ([`State::DspPoweredUp`]). Playback is
  /// paused, the calibration overrides applied and the firmware re-initialized
  /// in calibration mode. The overrides are restored and playback resumed
  /// whatever the outcome.
  ///
  /// A device-side failure is an error; a checksum mismatch is not, and comes
  /// back as data with [`CalibrationData::is_valid`] unset.
  pub async fn calibrate(&mut self) -> Result<CalibrationData, Error<E>> {
    if self.state != State::DspPoweredUp {
      return Err(Error::InvalidTransition);
    }
    let params = self.config.calibration;
    if params.overrides.len() > MAX_CALIBRATION_OVERRIDES {
      return Err(Error::InvalidArgument);
    }
    info!("calibrating at {} C", params.ambient);

    self.mailbox(MailboxCommand::Pause).await?;

    let mut saved: Vec<RegWrite, MAX_CALIBRATION_OVERRIDES> = Vec::new();
    for &(addr, value) in params.overrides {
      let prior = self.read(addr).await?;
      if saved.push((addr, prior)).is_err() {
        return Err(Error::InvalidArgument);
      }
      self.write(addr, value).await?;
    }

    let measured = self.measure(params.ambient).await;

    self.write_array(&saved).await?;
    self.mailbox(MailboxCommand::Play).await?;

    let data = measured?;
    if data.is_valid() {
      info!("calibration r={=u32:#x}", data.r());
    } else {
      warn!("calibration checksum mismatch");
    }
    self.calibration = data;
    Ok(data)
  }

  async fn measure(&mut self, ambient: u32) -> Result<CalibrationData, Error<E>> {
    self.write_symbol(Symbol::CalAmbient, ambient).await?;
    self.write_symbol(Symbol::CalEnable, 1).await?;
    self.mailbox(MailboxCommand::Reinit).await?;

    let status = self.resolve(Symbol::CalStatus)?;
    let raw = self
      .poll(status, self.config.timing.calibration, |v| {
        matches!(
          CalibrationStatus::from_raw(v),
          Some(CalibrationStatus::Success | CalibrationStatus::Error | CalibrationStatus::OutOfRange)
        )
      })
      .await?;

    match CalibrationStatus::from_raw(raw) {
      Some(CalibrationStatus::Success) => {
        let r = self.read_symbol(Symbol::CalR).await?;
        let checksum = self.read_symbol(Symbol::CalChecksum).await?;
        Ok(CalibrationData::validated(ambient, r, checksum))
      }
      Some(status) => {
        warn!("calibration failed: {}", status);
        Err(Error::CalibrationFailed(status))
      }
      None => Err(Error::CalibrationFailed(CalibrationStatus::Error)),
    }
  }

  /// Install calibration data kept from an earlier run.
  ///
  /// The data is validated against `checksum` like a fresh measurement and is
  /// applied on the next DSP power-up only if it matches. Returns whether it did.
  pub fn set_calibration(&mut self, ambient: u32, r: u32, checksum: u32) -> bool {
    self.calibration = CalibrationData::validated(ambient, r, checksum);
    self.calibration.is_valid()
  }

  /// Push the cached calibration to the firmware and wait for it to take it.
  pub(crate) async fn apply_calibration(&mut self) -> Result<(), Error<E>> {
    let data = self.calibration;
    debug!("applying calibration r={=u32:#x}", data.r());
    self.write_symbol(Symbol::CalAmbient, data.ambient()).await?;
    self.write_symbol(Symbol::CalR, data.r()).await?;
    self.write_symbol(Symbol::CalChecksum, data.checksum()).await?;
    self.mailbox(MailboxCommand::ApplyCalibration).await
  }
}
