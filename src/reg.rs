/******************************************************************************
 * Reference register map for the boosted smart-amplifier family.             *
 * Addresses and masks below are configuration data for the reference part;  *
 * sibling parts differ in values, not in how the driver uses them.          *
 * ========================================================================== *
 *                      Registers, Bitmasks & Mailbox Commands                *
*******************************************************************************/

use crate::config::{PersistedWrite, RegWrite, Revision};
use crate::wseq::Operation;

#[allow(dead_code)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reg {
  // Identification (0x0000..0x0004)
  DevId = 0x0000_0000,
  RevId = 0x0000_0004,

  // Test key gate for errata writes
  TestKeyCtrl = 0x0000_0040,

  // Power management (0x2014..0x2034)
  GlobalEnables = 0x0000_2014,
  BlockEnables = 0x0000_2018,
  ErrorRelease = 0x0000_2034,

  // DSP memory control (0x2900..0x2B08)
  PwrMgtCtl = 0x0000_2900,
  DspRamInit = 0x0000_2B04,
  DspRamInitStatus = 0x0000_2B08,

  // Clocking
  PllClkCtrl = 0x0000_2C04,
  SpClkCtrl = 0x0000_2D00,

  // Wake source control
  WakeSrcCtl = 0x0000_3408,

  // Boost converter
  BstVctrl = 0x0000_3800,
  BstIpk = 0x0000_3808,
  ClassHConfig = 0x0000_3810,

  // DSP input routing
  DspRxSrc = 0x0000_4C40,

  // Amplifier
  AmpDigVol = 0x0000_6000,
  AmpGain = 0x0000_6C04,

  // Interrupt status (0x1_0010..0x1_001C) and masks (0x1_0110..)
  IrqStatus1 = 0x0001_0010,
  IrqStatus2 = 0x0001_0014,
  IrqStatus4 = 0x0001_001C,
  IrqMask1 = 0x0001_0110,
  IrqMask2 = 0x0001_0114,

  // Virtual mailbox into the DSP firmware
  DspMbox1 = 0x0001_3020,

  // DSP core clock / run control
  DspCoreControl = 0x02BC_1000,
}

impl From<Reg> for u32 {
  #[inline]
  fn from(r: Reg) -> Self {
    r as u32
  }
}

// GLOBAL_ENABLES
pub(crate) const GLOBAL_EN: u32 = 1 << 0;

// BLOCK_ENABLES: amplifier, boost converter, monitoring blocks.
pub(crate) const BLOCK_AMP_EN: u32 = 1 << 0;
pub(crate) const BLOCK_BST_EN: u32 = 0b11 << 4;
pub(crate) const BLOCK_VMON_IMON_EN: u32 = 0b11 << 12;
pub(crate) const BLOCK_ENABLES_MASK: u32 = BLOCK_AMP_EN | BLOCK_BST_EN | BLOCK_VMON_IMON_EN;

// PWRMGT_CTL
pub(crate) const MEM_RDY: u32 = 1 << 1;

// DSP_RAM_INIT / DSP_RAM_INIT_STATUS
pub(crate) const RAM_INIT_REQ: u32 = 1 << 0;
pub(crate) const RAM_INIT_DONE: u32 = 1 << 0;

// DSP core control
pub(crate) const DSP_CORE_EN: u32 = 1 << 0;

// IRQ status 4
pub(crate) const BOOT_DONE: u32 = 1 << 1;

// IRQ status 1
pub(crate) const IRQ1_BST_OVP_ERR: u32 = 1 << 6;
pub(crate) const IRQ1_BST_DCM_UVP_ERR: u32 = 1 << 7;
pub(crate) const IRQ1_BST_SHORT_ERR: u32 = 1 << 8;
pub(crate) const IRQ1_MSM_PUP_DONE: u32 = 1 << 17;
pub(crate) const IRQ1_MSM_PDN_DONE: u32 = 1 << 18;
pub(crate) const IRQ1_WKSRC_STATUS: u32 = 1 << 21;
pub(crate) const IRQ1_TEMP_WARN_RISE: u32 = 1 << 29;
pub(crate) const IRQ1_TEMP_ERR: u32 = 1 << 30;
pub(crate) const IRQ1_AMP_SHORT_ERR: u32 = 1 << 31;

// IRQ status 2
pub(crate) const IRQ2_DSP_MBOX_WR: u32 = 1 << 21;

// MSM_ERROR_RELEASE
pub(crate) const RLS_AMP_SHORT_ERR: u32 = 1 << 1;
pub(crate) const RLS_BST_SHORT_ERR: u32 = 1 << 2;
pub(crate) const RLS_BST_OVP_ERR: u32 = 1 << 3;
pub(crate) const RLS_BST_UVP_ERR: u32 = 1 << 4;
pub(crate) const RLS_TEMP_WARN: u32 = 1 << 5;
pub(crate) const RLS_TEMP_ERR: u32 = 1 << 6;

// WAKESRC_CTL
pub(crate) const WKSRC_EN_GPIO1: u32 = 1 << 0;
pub(crate) const WKSRC_EN_I2C: u32 = 1 << 3;

// Interrupt masks applied once the part is up: everything masked except the
// errors handled by the event dispatcher, wake-source and mailbox traffic.
pub(crate) const IRQ1_UNMASKED: u32 = IRQ1_AMP_SHORT_ERR
  | IRQ1_TEMP_ERR
  | IRQ1_TEMP_WARN_RISE
  | IRQ1_BST_SHORT_ERR
  | IRQ1_BST_OVP_ERR
  | IRQ1_BST_DCM_UVP_ERR
  | IRQ1_WKSRC_STATUS;
pub(crate) const IRQ2_UNMASKED: u32 = IRQ2_DSP_MBOX_WR;
pub(crate) const IRQ_MASK_ALL: u32 = 0xFFFF_FFFF;

// Firmware reported states (FW_STATE symbol)
pub(crate) const FW_STATE_STANDBY: u32 = 1;
pub(crate) const FW_STATE_ACTIVE: u32 = 2;

// DSP core run state (HALO_STATE symbol)
pub(crate) const HALO_STATE_RUN: u32 = 2;

// Mailbox acknowledgement: firmware clears the mailbox after consuming a command.
pub(crate) const MBOX_ACK: u32 = 0;

/// Command words understood by the DSP firmware mailbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum MailboxCommand {
  Pause = 1,
  Play = 2,
  Reinit = 3,
  Hibernate = 5,
  Wakeup = 6,
  AllowHibernate = 7,
  PreventHibernate = 8,
  ApplyCalibration = 9,
}

impl From<MailboxCommand> for u32 {
  fn from(cmd: MailboxCommand) -> Self {
    cmd as u32
  }
}

/// Device identifiers this driver knows how to bring up.
pub(crate) const SUPPORTED_DEVICE_IDS: [u32; 2] = [0x0003_5A40, 0x0003_5A41];

pub(crate) const REV_A0: u32 = 0xA0;
pub(crate) const REV_B0: u32 = 0xB0;
pub(crate) const REV_B2: u32 = 0xB2;

const TEST_KEY_UNLOCK_1: RegWrite = (Reg::TestKeyCtrl as u32, 0x0000_0055);
const TEST_KEY_UNLOCK_2: RegWrite = (Reg::TestKeyCtrl as u32, 0x0000_00AA);
const TEST_KEY_LOCK_1: RegWrite = (Reg::TestKeyCtrl as u32, 0x0000_00CC);
const TEST_KEY_LOCK_2: RegWrite = (Reg::TestKeyCtrl as u32, 0x0000_0033);

// Silicon errata, applied after boot and again after every wake.
const ERRATA_A0: [RegWrite; 6] = [
  TEST_KEY_UNLOCK_1,
  TEST_KEY_UNLOCK_2,
  (0x0000_410C, 0x0000_0A11),
  (0x0000_4400, 0x0000_0000),
  TEST_KEY_LOCK_1,
  TEST_KEY_LOCK_2,
];

const ERRATA_B0: [RegWrite; 7] = [
  TEST_KEY_UNLOCK_1,
  TEST_KEY_UNLOCK_2,
  (0x0000_4100, 0x0000_0000),
  (0x0000_4310, 0x0000_0000),
  (0x0000_4400, 0x0000_0000),
  TEST_KEY_LOCK_1,
  TEST_KEY_LOCK_2,
];

const ERRATA_B2: [RegWrite; 5] = [
  TEST_KEY_UNLOCK_1,
  TEST_KEY_UNLOCK_2,
  (0x0000_4310, 0x0000_0000),
  TEST_KEY_LOCK_1,
  TEST_KEY_LOCK_2,
];

pub(crate) const REVISIONS: [Revision; 3] = [
  Revision::new(REV_A0, &ERRATA_A0),
  Revision::new(REV_B0, &ERRATA_B0),
  Revision::new(REV_B2, &ERRATA_B2),
];

// Clocking and boost defaults written after every reset.
pub(crate) const BASELINE: [RegWrite; 4] = [
  (Reg::PllClkCtrl as u32, 0x0000_0430),
  (Reg::SpClkCtrl as u32, 0x0000_0021),
  (Reg::BstVctrl as u32, 0x0000_00AA),
  (Reg::BstIpk as u32, 0x0000_004A),
];

// Amplifier path configuration once the DSP is running.
pub(crate) const POST_BOOT: [RegWrite; 3] = [
  (Reg::AmpDigVol as u32, 0x0000_8000),
  (Reg::AmpGain as u32, 0x0000_0233),
  (Reg::DspRxSrc as u32, 0x0000_0032),
];

// Registers replayed by the write sequencer after hibernation.
pub(crate) const PERSIST: [PersistedWrite; 3] = [
  PersistedWrite::new(Reg::AmpDigVol as u32, 0x0000_8000, Operation::Full),
  PersistedWrite::new(Reg::AmpGain as u32, 0x0000_0233, Operation::L16),
  PersistedWrite::new(Reg::BstVctrl as u32, 0x0000_00AA, Operation::L16),
];

// Calibration runs with the boost fixed and the class-H tracking off.
pub(crate) const CALIBRATION_OVERRIDES: [RegWrite; 2] = [
  (Reg::BstVctrl as u32, 0x0000_0064),
  (Reg::ClassHConfig as u32, 0x0000_0000),
];

pub(crate) const DEFAULT_AMBIENT: u32 = 23;
