//! Simulated amplifier for driver tests: a sparse register file with
//! write-one-to-clear status registers, an auto-acking mailbox, scripted
//! read sequences, reactions to writes and injected bus faults.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::reg::*;
use crate::{Config, EventSignal, FirmwareInfo, FirmwareSymbol, RegisterBus, SmartAmp, Symbol};

pub(crate) const DEVICE_ID: u32 = 0x0003_5A40;

pub(crate) const HALO_STATE: u32 = 0x0280_0100;
pub(crate) const FIRMWARE_STATE: u32 = 0x0280_0104;
pub(crate) const POWER_ON_SEQUENCE: u32 = 0x0280_0200;
pub(crate) const CAL_R: u32 = 0x0280_0400;
pub(crate) const CAL_AMBIENT: u32 = 0x0280_0404;
pub(crate) const CAL_STATUS: u32 = 0x0280_0408;
pub(crate) const CAL_CHECKSUM: u32 = 0x0280_040C;
pub(crate) const CAL_ENABLE: u32 = 0x0280_0410;

pub(crate) const SYMBOLS: [FirmwareSymbol; 8] = [
  FirmwareSymbol::new(Symbol::HaloState, HALO_STATE),
  FirmwareSymbol::new(Symbol::FirmwareState, FIRMWARE_STATE),
  FirmwareSymbol::new(Symbol::PowerOnSequence, POWER_ON_SEQUENCE),
  FirmwareSymbol::new(Symbol::CalR, CAL_R),
  FirmwareSymbol::new(Symbol::CalAmbient, CAL_AMBIENT),
  FirmwareSymbol::new(Symbol::CalStatus, CAL_STATUS),
  FirmwareSymbol::new(Symbol::CalChecksum, CAL_CHECKSUM),
  FirmwareSymbol::new(Symbol::CalEnable, CAL_ENABLE),
];

pub(crate) const FIRMWARE: FirmwareInfo<'static> = FirmwareInfo::new(&SYMBOLS);

const W1C: [Reg; 3] = [Reg::IrqStatus1, Reg::IrqStatus2, Reg::IrqStatus4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SimError;

#[derive(Default)]
struct Device {
  regs: BTreeMap<u32, u32>,
  scripts: BTreeMap<u32, VecDeque<u32>>,
  faults: BTreeMap<u32, usize>,
  reactions: Vec<(u32, u32, u32, u32)>,
  irq_line: Option<(u32, &'static EventSignal)>,
  writes: Vec<(u32, u32)>,
  reads: Vec<u32>,
  mailbox: Vec<u32>,
  manual_ack: bool,
  io: usize,
  pin: Vec<bool>,
  fail_pin: bool,
  elapsed_ns: u64,
}

impl Device {
  fn fault(&mut self, addr: u32) -> Result<(), SimError> {
    self.io += 1;
    match self.faults.get_mut(&addr) {
      Some(n) if *n > 0 => {
        *n -= 1;
        Err(SimError)
      }
      _ => Ok(()),
    }
  }
}

/// Handle onto the simulated device, shared by the bus, pin and delay.
#[derive(Clone, Default)]
pub(crate) struct Sim(Rc<RefCell<Device>>);

impl Sim {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn bus(&self) -> SimBus {
    SimBus(self.clone())
  }

  pub(crate) fn driver(&self) -> SmartAmp<SimBus, FakePin, FakeDelay> {
    SmartAmp::new(self.bus(), FakePin::new(self), FakeDelay::new(self))
  }

  pub(crate) fn poke<A: Into<u32>>(&self, addr: A, value: u32) {
    self.0.borrow_mut().regs.insert(addr.into(), value);
  }

  pub(crate) fn peek<A: Into<u32>>(&self, addr: A) -> u32 {
    self.0.borrow().regs.get(&addr.into()).copied().unwrap_or(0)
  }

  /// Values returned by the next reads of `addr`, before falling back to the register.
  pub(crate) fn script<A: Into<u32>>(&self, addr: A, values: &[u32]) {
    self.0.borrow_mut().scripts.insert(addr.into(), values.iter().copied().collect());
  }

  /// Fail the next `count` accesses to `addr`.
  pub(crate) fn fail<A: Into<u32>>(&self, addr: A, count: usize) {
    self.0.borrow_mut().faults.insert(addr.into(), count);
  }

  /// When `value` is written to `trigger`, store `then_value` at `then_addr`.
  pub(crate) fn on_write<A: Into<u32>, T: Into<u32>>(&self, trigger: A, value: u32, then_addr: T, then_value: u32) {
    self.0.borrow_mut().reactions.push((trigger.into(), value, then_addr.into(), then_value));
  }

  /// Assert the interrupt line whenever `trigger` is written.
  pub(crate) fn irq_on_write<A: Into<u32>>(&self, trigger: A, signal: &'static EventSignal) {
    self.0.borrow_mut().irq_line = Some((trigger.into(), signal));
  }

  pub(crate) fn forget_reactions(&self) {
    self.0.borrow_mut().reactions.clear();
  }

  pub(crate) fn set_auto_ack(&self, on: bool) {
    self.0.borrow_mut().manual_ack = !on;
  }

  pub(crate) fn writes(&self) -> Vec<(u32, u32)> {
    self.0.borrow().writes.clone()
  }

  pub(crate) fn clear_log(&self) {
    let mut dev = self.0.borrow_mut();
    dev.writes.clear();
    dev.reads.clear();
    dev.mailbox.clear();
  }

  pub(crate) fn reads_of<A: Into<u32>>(&self, addr: A) -> usize {
    let addr = addr.into();
    self.0.borrow().reads.iter().filter(|&&a| a == addr).count()
  }

  /// Mailbox commands posted so far.
  pub(crate) fn mailbox(&self) -> Vec<u32> {
    self.0.borrow().mailbox.clone()
  }

  /// Register accesses so far, failed ones included.
  pub(crate) fn io_count(&self) -> usize {
    self.0.borrow().io
  }

  pub(crate) fn pin_levels(&self) -> Vec<bool> {
    self.0.borrow().pin.clone()
  }

  pub(crate) fn fail_pin(&self) {
    self.0.borrow_mut().fail_pin = true;
  }

  pub(crate) fn elapsed_ms(&self) -> u64 {
    self.0.borrow().elapsed_ns / 1_000_000
  }

  /// A healthy reference part fresh out of reset.
  pub(crate) fn power_on(&self) {
    self.poke(Reg::DevId, DEVICE_ID);
    self.poke(Reg::RevId, REV_B2);
    self.poke(Reg::IrqStatus4, BOOT_DONE);
    self.poke(Reg::DspRamInitStatus, RAM_INIT_DONE);
    self.poke(HALO_STATE, HALO_STATE_RUN);
    self.poke(POWER_ON_SEQUENCE, crate::TagLayout::REFERENCE.end_word());
    self.on_write(Reg::DspMbox1, MailboxCommand::Play as u32, FIRMWARE_STATE, FW_STATE_ACTIVE);
    self.on_write(Reg::DspMbox1, MailboxCommand::Pause as u32, FIRMWARE_STATE, FW_STATE_STANDBY);
    self.on_write(Reg::GlobalEnables, GLOBAL_EN, Reg::IrqStatus1, IRQ1_MSM_PUP_DONE);
    self.on_write(Reg::GlobalEnables, 0, Reg::IrqStatus1, IRQ1_MSM_PDN_DONE);
  }
}

pub(crate) struct SimBus(Sim);

impl RegisterBus for SimBus {
  type Error = SimError;

  async fn read(&mut self, addr: u32) -> Result<u32, SimError> {
    let mut dev = self.0 .0.borrow_mut();
    dev.fault(addr)?;
    dev.reads.push(addr);
    if let Some(value) = dev.scripts.get_mut(&addr).and_then(VecDeque::pop_front) {
      return Ok(value);
    }
    Ok(dev.regs.get(&addr).copied().unwrap_or(0))
  }

  async fn write(&mut self, addr: u32, value: u32) -> Result<(), SimError> {
    let mut dev = self.0 .0.borrow_mut();
    dev.fault(addr)?;
    dev.writes.push((addr, value));

    if W1C.iter().any(|&r| r as u32 == addr) {
      let cleared = dev.regs.get(&addr).copied().unwrap_or(0) & !value;
      dev.regs.insert(addr, cleared);
    } else if addr == Reg::DspMbox1 as u32 {
      dev.mailbox.push(value);
      let stored = if dev.manual_ack { value } else { MBOX_ACK };
      dev.regs.insert(addr, stored);
    } else {
      dev.regs.insert(addr, value);
    }

    let fired: Vec<(u32, u32)> =
      dev.reactions.iter().filter(|r| r.0 == addr && r.1 == value).map(|r| (r.2, r.3)).collect();
    for (then_addr, then_value) in fired {
      let merged = if W1C.iter().any(|&r| r as u32 == then_addr) {
        dev.regs.get(&then_addr).copied().unwrap_or(0) | then_value
      } else {
        then_value
      };
      dev.regs.insert(then_addr, merged);
    }
    if let Some((_, signal)) = dev.irq_line.filter(|line| line.0 == addr) {
      signal.signal();
    }
    Ok(())
  }
}

pub(crate) struct FakePin(Sim);

impl FakePin {
  pub(crate) fn new(sim: &Sim) -> Self {
    Self(sim.clone())
  }

  fn drive(&mut self, level: bool) -> Result<(), ErrorKind> {
    let mut dev = self.0 .0.borrow_mut();
    if dev.fail_pin {
      return Err(ErrorKind::Other);
    }
    dev.pin.push(level);
    Ok(())
  }
}

impl ErrorType for FakePin {
  type Error = ErrorKind;
}

impl OutputPin for FakePin {
  fn set_low(&mut self) -> Result<(), ErrorKind> {
    self.drive(false)
  }

  fn set_high(&mut self) -> Result<(), ErrorKind> {
    self.drive(true)
  }
}

pub(crate) struct FakeDelay(Sim);

impl FakeDelay {
  pub(crate) fn new(sim: &Sim) -> Self {
    Self(sim.clone())
  }
}

impl DelayNs for FakeDelay {
  async fn delay_ns(&mut self, ns: u32) {
    self.0 .0.borrow_mut().elapsed_ns += u64::from(ns);
  }
}

pub(crate) type SimAmp = SmartAmp<SimBus, FakePin, FakeDelay>;

/// Driver reset into `Standby` against a healthy part.
pub(crate) async fn standby(sim: &Sim) -> SimAmp {
  standby_with(sim, Config::default()).await
}

pub(crate) async fn standby_with(sim: &Sim, config: Config) -> SimAmp {
  sim.power_on();
  let mut amp = sim.driver();
  amp.configure(config).unwrap();
  amp.reset().await.unwrap();
  amp
}

/// Driver booted with [`FIRMWARE`] into `DspStandby`.
pub(crate) async fn dsp_standby(sim: &Sim) -> SimAmp {
  dsp_standby_with(sim, Config::default()).await
}

pub(crate) async fn dsp_standby_with(sim: &Sim, config: Config) -> SimAmp {
  let mut amp = standby_with(sim, config).await;
  amp.boot(Some(&FIRMWARE)).await.unwrap();
  amp
}

/// Driver powered up with the DSP running.
pub(crate) async fn dsp_powered_up(sim: &Sim) -> SimAmp {
  let mut amp = dsp_standby(sim).await;
  amp.power(crate::PowerRequest::PowerUp).await.unwrap();
  amp
}
