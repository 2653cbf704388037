use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::reg::*;
use crate::{Error, RegisterBus, SmartAmp, State, Symbol, SymbolTable};
use crate::symbols::ControlSymbols;

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  /// Hardware reset and bring-up to [`State::Standby`].
  ///
  /// Pulses the reset line, waits for the boot-done flag, checks the device
  /// and revision ids, writes the baseline table and unmasks interrupts.
  /// Everything the driver knew about firmware and the write sequence is
  /// dropped. On failure the state is left as it was.
  pub async fn reset(&mut self) -> Result<(), Error<E>> {
    if matches!(self.state, State::Unconfigured | State::Error) {
      return Err(Error::InvalidTransition);
    }
    info!("reset from {}", self.state);

    let timing = self.config.timing;
    self.reset_pin.set_low().map_err(|_| Error::Gpio)?;
    self.delay.delay_ms(timing.reset_hold_ms).await;
    self.reset_pin.set_high().map_err(|_| Error::Gpio)?;
    self.delay.delay_ms(timing.reset_settle_ms).await;

    self.poll_bits(Reg::IrqStatus4, BOOT_DONE, timing.boot_done).await?;

    let device_id = self.read(Reg::DevId).await?;
    let revision_id = self.read(Reg::RevId).await?;
    if !self.config.supports(device_id, revision_id) {
      warn!("unsupported part {=u32:#x} rev {=u32:#x}", device_id, revision_id);
      return Err(Error::UnsupportedRevision { device_id, revision_id });
    }

    self.write_array(self.config.baseline).await?;
    self.write(Reg::IrqStatus4, BOOT_DONE).await?;
    self.unmask_interrupts().await?;

    self.device_id = device_id;
    self.revision_id = revision_id;
    self.symbols = None;
    self.wseq.clear();
    self.state = State::Standby;
    info!("part {=u32:#x} rev {=u32:#x} in standby", device_id, revision_id);
    Ok(())
  }

  /// Firmware hand-off.
  ///
  /// With `None`, prepares the part for a firmware download: the DSP core is
  /// stopped, its RAM re-initialized and cached calibration re-applied. With
  /// the symbol table of a freshly streamed image, resolves the control
  /// symbols, starts the DSP core and moves to [`State::DspStandby`].
  pub async fn boot(&mut self, firmware: Option<&dyn SymbolTable>) -> Result<(), Error<E>> {
    match firmware {
      None => self.prepare_download().await,
      Some(table) => self.start_firmware(table).await,
    }
  }

  async fn prepare_download(&mut self) -> Result<(), Error<E>> {
    if !matches!(self.state, State::Standby | State::DspStandby) {
      return Err(Error::InvalidTransition);
    }
    debug!("preparing firmware download");

    self.write(Reg::DspCoreControl, 0).await?;
    self.write(Reg::DspRamInit, RAM_INIT_REQ).await?;
    self.poll_bits(Reg::DspRamInitStatus, RAM_INIT_DONE, self.config.timing.ram_init).await?;
    self.update_bits(Reg::PwrMgtCtl, MEM_RDY, MEM_RDY).await?;

    if self.calibration.is_valid() && self.symbols.is_some() {
      self.apply_calibration().await?;
    }

    self.symbols = None;
    self.state = State::Standby;
    Ok(())
  }

  async fn start_firmware(&mut self, table: &dyn SymbolTable) -> Result<(), Error<E>> {
    if self.state != State::Standby {
      return Err(Error::InvalidTransition);
    }
    let symbols = ControlSymbols::resolve(table).map_err(Error::SymbolNotFound)?;
    self.symbols = Some(symbols);

    let result = self.start_dsp().await;
    if result.is_err() {
      self.symbols = None;
    }
    result
  }

  async fn start_dsp(&mut self) -> Result<(), Error<E>> {
    self.apply_errata().await?;
    self.update_bits(Reg::PwrMgtCtl, MEM_RDY, MEM_RDY).await?;
    self.update_bits(Reg::DspCoreControl, DSP_CORE_EN, DSP_CORE_EN).await?;

    let halo = self.resolve(Symbol::HaloState)?;
    self.poll_until_equal(halo, HALO_STATE_RUN, self.config.timing.dsp_run).await?;

    self.write_array(self.config.post_boot).await?;
    self.state = State::DspStandby;
    info!("DSP running");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sim::{self, Sim, FIRMWARE};
  use crate::{Config, FirmwareInfo, FirmwareSymbol, Retry, Timing};

  fn configured(sim: &Sim) -> sim::SimAmp {
    sim.power_on();
    let mut amp = sim.driver();
    amp.configure(Config::default()).unwrap();
    amp
  }

  #[tokio::test]
  async fn reset_waits_for_boot_done_on_third_poll() {
    let sim = Sim::new();
    let mut amp = configured(&sim);
    sim.script(Reg::IrqStatus4, &[0, 0, BOOT_DONE]);

    amp.reset().await.unwrap();
    assert_eq!(amp.state(), State::Standby);
    assert_eq!(sim.reads_of(Reg::IrqStatus4), 3);
    assert_eq!(sim.pin_levels(), [false, true]);
    assert_eq!(amp.device_id(), sim::DEVICE_ID);
    assert_eq!(amp.revision_id(), REV_B2);

    let writes = sim.writes();
    let baseline = amp.config().baseline;
    assert_eq!(writes[..baseline.len()], *baseline);
    assert!(writes.contains(&(Reg::IrqStatus4 as u32, BOOT_DONE)));
    assert_eq!(sim.peek(Reg::IrqMask1), !IRQ1_UNMASKED);
    assert_eq!(sim.peek(Reg::IrqMask2), !IRQ2_UNMASKED);
    // hold + settle + three 1 ms polls
    assert_eq!(sim.elapsed_ms(), 7);
  }

  #[tokio::test]
  async fn reset_times_out_without_boot_done() {
    let sim = Sim::new();
    let mut amp = configured(&sim);
    sim.poke(Reg::IrqStatus4, 0);

    assert_eq!(amp.reset().await, Err(Error::TimedOut));
    assert_eq!(amp.state(), State::Configured);
  }

  #[tokio::test]
  async fn reset_rejects_unknown_revision() {
    let sim = Sim::new();
    let mut amp = configured(&sim);
    sim.poke(Reg::RevId, 0xC0);

    assert_eq!(
      amp.reset().await,
      Err(Error::UnsupportedRevision { device_id: sim::DEVICE_ID, revision_id: 0xC0 })
    );
    assert_eq!(amp.state(), State::Configured);
  }

  #[tokio::test]
  async fn reset_reports_reset_line_failure() {
    let sim = Sim::new();
    let mut amp = configured(&sim);
    sim.fail_pin();
    assert_eq!(amp.reset().await, Err(Error::Gpio));
    assert_eq!(sim.io_count(), 0);
  }

  #[tokio::test]
  async fn reset_needs_configuration_and_no_error() {
    let sim = Sim::new();
    let mut amp = sim.driver();
    assert_eq!(amp.reset().await, Err(Error::InvalidTransition));

    amp.configure(Config::default()).unwrap();
    amp.state = State::Error;
    assert_eq!(amp.reset().await, Err(Error::InvalidTransition));
    assert!(sim.pin_levels().is_empty());
  }

  #[tokio::test]
  async fn boot_resolves_symbols_and_starts_dsp() {
    let sim = Sim::new();
    let mut amp = sim::standby(&sim).await;
    sim.script(sim::HALO_STATE, &[0, HALO_STATE_RUN]);
    sim.clear_log();

    amp.boot(Some(&FIRMWARE)).await.unwrap();
    assert_eq!(amp.state(), State::DspStandby);
    assert_eq!(sim.reads_of(sim::HALO_STATE), 2);
    assert_eq!(sim.peek(Reg::DspCoreControl) & DSP_CORE_EN, DSP_CORE_EN);
    assert_eq!(sim.peek(Reg::PwrMgtCtl) & MEM_RDY, MEM_RDY);

    let writes = sim.writes();
    let errata = amp.config().errata(REV_B2).unwrap();
    assert_eq!(writes[..errata.len()], *errata);
    assert_eq!(writes[writes.len() - amp.config().post_boot.len()..], *amp.config().post_boot);
  }

  #[tokio::test]
  async fn boot_with_missing_symbol_does_no_io() {
    let sim = Sim::new();
    let mut amp = sim::standby(&sim).await;
    let partial = [FirmwareSymbol::new(Symbol::HaloState, sim::HALO_STATE)];
    let before = sim.io_count();

    let result = amp.boot(Some(&FirmwareInfo::new(&partial))).await;
    assert_eq!(result, Err(Error::SymbolNotFound(Symbol::FirmwareState.id())));
    assert_eq!(sim.io_count(), before);
    assert_eq!(amp.state(), State::Standby);
  }

  #[tokio::test]
  async fn boot_times_out_when_dsp_never_runs() {
    let sim = Sim::new();
    let timing = Timing { dsp_run: Retry::new(3, 1), ..Timing::default() };
    let mut amp = sim::standby_with(&sim, Config::default().with_timing(timing)).await;
    sim.poke(sim::HALO_STATE, 0);

    assert_eq!(amp.boot(Some(&FIRMWARE)).await, Err(Error::TimedOut));
    assert_eq!(amp.state(), State::Standby);
    assert!(amp.resolve(Symbol::HaloState).is_err());
  }

  #[tokio::test]
  async fn boot_with_firmware_only_from_standby() {
    let sim = Sim::new();
    let mut amp = sim::dsp_standby(&sim).await;
    assert_eq!(amp.boot(Some(&FIRMWARE)).await, Err(Error::InvalidTransition));
  }

  #[tokio::test]
  async fn prepare_download_reinitializes_ram_and_reapplies_calibration() {
    let sim = Sim::new();
    let mut amp = sim::dsp_standby(&sim).await;
    amp.set_calibration(23, 0x0000_1A2B, 0x0000_1A2C);
    sim.clear_log();

    amp.boot(None).await.unwrap();
    assert_eq!(amp.state(), State::Standby);
    assert_eq!(sim.peek(Reg::DspCoreControl), 0);
    assert_eq!(sim.peek(Reg::DspRamInit), RAM_INIT_REQ);
    assert_eq!(sim.peek(sim::CAL_R), 0x0000_1A2B);
    assert_eq!(sim.mailbox(), [MailboxCommand::ApplyCalibration as u32]);
    assert!(amp.resolve(Symbol::CalR).is_err());

    // symbols are gone, so a second pass has nothing to re-apply
    sim.clear_log();
    amp.boot(None).await.unwrap();
    assert!(sim.mailbox().is_empty());
  }

  #[tokio::test]
  async fn prepare_download_rejected_while_powered() {
    let sim = Sim::new();
    let mut amp = sim::dsp_powered_up(&sim).await;
    let before = sim.io_count();
    assert_eq!(amp.boot(None).await, Err(Error::InvalidTransition));
    assert_eq!(sim.io_count(), before);
  }
}
