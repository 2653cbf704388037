use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::reg::{MailboxCommand, Reg, MBOX_ACK};
use crate::{Error, RegWrite, RegisterBus, Retry, SmartAmp, Symbol};

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  pub(crate) async fn read<A: Into<u32>>(&mut self, addr: A) -> Result<u32, Error<E>> {
    self.bus.read(addr.into()).await.map_err(Error::Bus)
  }

  pub(crate) async fn write<A: Into<u32>>(&mut self, addr: A, value: u32) -> Result<(), Error<E>> {
    self.bus.write(addr.into(), value).await.map_err(Error::Bus)
  }

  /// Read-modify-write of the bits in `mask`.
  pub(crate) async fn update_bits<A: Into<u32>>(&mut self, addr: A, mask: u32, value: u32) -> Result<(), Error<E>> {
    let addr = addr.into();
    let current = self.read(addr).await?;
    self.write(addr, (current & !mask) | (value & mask)).await
  }

  /// Write a table of address/value pairs in order.
  pub(crate) async fn write_array(&mut self, table: &[RegWrite]) -> Result<(), Error<E>> {
    for &(addr, value) in table {
      self.write(addr, value).await?;
    }
    Ok(())
  }

  /// Wait `retry.delay_ms`, read `addr`, and stop once `done` accepts the
  /// value. Returns that value, or [`Error::TimedOut`] after
  /// `retry.attempts` reads.
  pub(crate) async fn poll<A, F>(&mut self, addr: A, retry: Retry, mut done: F) -> Result<u32, Error<E>>
  where
    A: Into<u32>,
    F: FnMut(u32) -> bool,
  {
    let addr = addr.into();
    for _ in 0..retry.attempts {
      self.delay.delay_ms(retry.delay_ms).await;
      let value = self.read(addr).await?;
      if done(value) {
        return Ok(value);
      }
    }
    warn!("poll of {=u32:#x} timed out", addr);
    Err(Error::TimedOut)
  }

  pub(crate) async fn poll_until_equal<A: Into<u32>>(&mut self, addr: A, expected: u32, retry: Retry) -> Result<(), Error<E>> {
    self.poll(addr, retry, |v| v == expected).await.map(|_| ())
  }

  /// Poll until every bit of `mask` reads as set.
  pub(crate) async fn poll_bits<A: Into<u32>>(&mut self, addr: A, mask: u32, retry: Retry) -> Result<(), Error<E>> {
    self.poll(addr, retry, |v| v & mask == mask).await.map(|_| ())
  }

  /// Post a mailbox command and wait for the firmware to consume it.
  pub(crate) async fn mailbox(&mut self, cmd: MailboxCommand) -> Result<(), Error<E>> {
    debug!("mailbox {}", cmd);
    self.write(Reg::DspMbox1, cmd.into()).await?;
    self.poll_until_equal(Reg::DspMbox1, MBOX_ACK, self.config.timing.mailbox_ack).await
  }

  /// Address of a firmware control symbol resolved at boot.
  pub(crate) fn resolve(&self, symbol: Symbol) -> Result<u32, Error<E>> {
    self.symbols.as_ref().map(|s| s.address(symbol)).ok_or(Error::SymbolNotFound(symbol.id()))
  }

  pub(crate) async fn read_symbol(&mut self, symbol: Symbol) -> Result<u32, Error<E>> {
    let addr = self.resolve(symbol)?;
    self.read(addr).await
  }

  pub(crate) async fn write_symbol(&mut self, symbol: Symbol, value: u32) -> Result<(), Error<E>> {
    let addr = self.resolve(symbol)?;
    self.write(addr, value).await
  }

  pub(crate) async fn unmask_interrupts(&mut self) -> Result<(), Error<E>> {
    let [mask1, mask2] = self.config.irq_masks;
    self.write(Reg::IrqMask1, mask1).await?;
    self.write(Reg::IrqMask2, mask2).await
  }

  pub(crate) async fn apply_errata(&mut self) -> Result<(), Error<E>> {
    let errata = self.config.errata(self.revision_id).unwrap_or(&[]);
    self.write_array(errata).await
  }
}
