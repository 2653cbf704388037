use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::reg::*;
use crate::{Error, RegisterBus, SmartAmp, State, Symbol};

/// Power transitions the application can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRequest {
  PowerUp,
  PowerDown,
  Hibernate,
  Wake,
}

impl PowerRequest {
  pub const ALL: [PowerRequest; 4] = [PowerRequest::PowerUp, PowerRequest::PowerDown, PowerRequest::Hibernate, PowerRequest::Wake];

  /// State reached when this request succeeds from `from`, or `None` when the
  /// request is not allowed there.
  pub const fn target(self, from: State) -> Option<State> {
    use PowerRequest::*;
    use State::*;

    match (self, from) {
      (PowerUp, Standby) => Some(PoweredUp),
      (PowerUp, DspStandby) => Some(DspPoweredUp),
      (PowerDown, PoweredUp) => Some(Standby),
      (PowerDown, DspPoweredUp) => Some(DspStandby),
      (Hibernate, DspStandby) => Some(Hibernating),
      (Wake, Hibernating) => Some(DspStandby),
      (PowerUp | PowerDown | Hibernate | Wake, _) => None,
    }
  }
}

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  /// Run a power transition.
  ///
  /// Requests not allowed from the current state fail with
  /// [`Error::InvalidTransition`] before any I/O. The new state is committed
  /// only when every step succeeded.
  pub async fn power(&mut self, request: PowerRequest) -> Result<(), Error<E>> {
    let Some(next) = request.target(self.state) else {
      warn!("{} not allowed in {}", request, self.state);
      return Err(Error::InvalidTransition);
    };
    debug!("{}: {} -> {}", request, self.state, next);

    match request {
      PowerRequest::PowerUp => self.power_up().await?,
      PowerRequest::PowerDown => self.power_down().await?,
      PowerRequest::Hibernate => self.hibernate().await?,
      PowerRequest::Wake => self.wake().await?,
    }

    self.state = next;
    info!("now {}", next);
    Ok(())
  }

  async fn power_up(&mut self) -> Result<(), Error<E>> {
    let dsp = self.state == State::DspStandby;
    let timing = self.config.timing;

    if dsp {
      self.update_bits(Reg::PwrMgtCtl, MEM_RDY, MEM_RDY).await?;
      self.update_bits(Reg::DspCoreControl, DSP_CORE_EN, DSP_CORE_EN).await?;
    }

    self.update_bits(Reg::GlobalEnables, GLOBAL_EN, GLOBAL_EN).await?;
    self.poll_bits(Reg::IrqStatus1, IRQ1_MSM_PUP_DONE, timing.power_up).await?;
    self.write(Reg::IrqStatus1, IRQ1_MSM_PUP_DONE).await?;

    if dsp {
      if self.calibration.is_valid() {
        self.apply_calibration().await?;
      }
      self.mailbox(MailboxCommand::Play).await?;
      let state = self.resolve(Symbol::FirmwareState)?;
      self.poll_until_equal(state, FW_STATE_ACTIVE, timing.firmware_state).await?;
    }
    Ok(())
  }

  async fn power_down(&mut self) -> Result<(), Error<E>> {
    let timing = self.config.timing;

    if self.state == State::DspPoweredUp {
      self.mailbox(MailboxCommand::Pause).await?;
      let state = self.resolve(Symbol::FirmwareState)?;
      self.poll_until_equal(state, FW_STATE_STANDBY, timing.firmware_state).await?;
    }

    self.update_bits(Reg::GlobalEnables, GLOBAL_EN, 0).await?;
    self.poll_bits(Reg::IrqStatus1, IRQ1_MSM_PDN_DONE, timing.power_down).await?;
    self.write(Reg::IrqStatus1, IRQ1_MSM_PDN_DONE).await?;
    self.update_bits(Reg::BlockEnables, BLOCK_ENABLES_MASK, 0).await
  }

  async fn hibernate(&mut self) -> Result<(), Error<E>> {
    self.read_write_sequence().await?;
    for p in self.config.persist {
      self.update_write_sequence(p.address, p.value, p.operation, true).await?;
    }
    self.flush_write_sequence().await?;

    self.write(Reg::IrqMask1, IRQ_MASK_ALL).await?;
    self.write(Reg::IrqMask2, IRQ_MASK_ALL).await?;
    self.write(Reg::WakeSrcCtl, self.config.wake_source).await?;
    self.mailbox(MailboxCommand::AllowHibernate).await?;
    // the part is asleep before it could acknowledge
    self.write(Reg::DspMbox1, MailboxCommand::Hibernate.into()).await
  }

  async fn wake(&mut self) -> Result<(), Error<E>> {
    let retry = self.config.timing.wake;
    let mut awake = false;
    for attempt in 0..retry.attempts {
      if self.mailbox(MailboxCommand::Wakeup).await.is_ok() {
        awake = true;
        break;
      }
      debug!("wake attempt {} failed", attempt);
      if attempt + 1 < retry.attempts {
        self.delay.delay_ms(retry.delay_ms).await;
      }
    }
    if !awake {
      warn!("part did not wake up");
      return Err(Error::TimedOut);
    }

    self.mailbox(MailboxCommand::PreventHibernate).await?;
    self.apply_errata().await?;
    self.write_array(self.config.post_boot).await?;
    self.unmask_interrupts().await?;
    self.wseq.set_flushed(false);
    Ok(())
  }
}
