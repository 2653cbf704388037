//! Word format of the on-device write sequence.
//!
//! Every instruction is made of 24-bit payload words carried in 32-bit device
//! words. The first word of an instruction holds its tag at the chip's tag
//! shift; the remaining fields are laid out as follows (`S` = tag shift):
//!
//! | kind  | w0                                  | w1                                 | w2           |
//! |-------|-------------------------------------|------------------------------------|--------------|
//! | Full  | tag<<S, addr[31:16]                 | addr[15:0]<<8, value[31:24]        | value[23:0]  |
//! | Addr8 | tag<<S, addr[7:0]<<8, value[31:24]  | value[23:0]                        |              |
//! | L16   | tag<<S, addr[23:8]                  | addr[7:0]<<16, value[15:0]         |              |
//! | H16   | tag<<S, addr[23:8]                  | addr[7:0]<<16, value[31:16]        |              |
//!
//! The stream ends with a single END word: `0xFF<<S | 0xFFFF`.

use super::SequenceError;

const TAG_FULL: u32 = 0x00;
const TAG_ADDR8: u32 = 0x02;
const TAG_L16: u32 = 0x04;
const TAG_H16: u32 = 0x05;
const TAG_END: u32 = 0xFF;

const PAYLOAD_MASK: u32 = 0x00FF_FFFF;
const FIELD16_MASK: u32 = 0x0000_FFFF;

/// Instruction kinds of the write sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
  /// 32-bit address, 32-bit value. Three words.
  Full,
  /// Low address byte only; the upper bits come from the nearest preceding
  /// non-`Addr8` entry. Two words.
  Addr8,
  /// 24-bit address, low half of the value. Two words.
  L16,
  /// 24-bit address, high half of the value. Two words.
  H16,
}

impl Operation {
  pub const fn word_size(self) -> usize {
    match self {
      Operation::Full => 3,
      Operation::Addr8 | Operation::L16 | Operation::H16 => 2,
    }
  }

  const fn tag(self) -> u32 {
    match self {
      Operation::Full => TAG_FULL,
      Operation::Addr8 => TAG_ADDR8,
      Operation::L16 => TAG_L16,
      Operation::H16 => TAG_H16,
    }
  }

  const fn from_tag(tag: u32) -> Option<Self> {
    match tag {
      TAG_FULL => Some(Operation::Full),
      TAG_ADDR8 => Some(Operation::Addr8),
      TAG_L16 => Some(Operation::L16),
      TAG_H16 => Some(Operation::H16),
      _ => None,
    }
  }
}

/// Bit position of the instruction tag inside the first word.
///
/// Parts of this family disagree on where the tag sits, so the position is
/// part of the per-chip configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TagLayout {
  shift: u8,
}

impl TagLayout {
  /// Tag at bit 16, inside the 24-bit payload.
  pub const REFERENCE: Self = Self { shift: 16 };
  /// Tag at bit 24, above the 24-bit payload.
  pub const ALTERNATE: Self = Self { shift: 24 };

  pub const fn shift(self) -> u8 {
    self.shift
  }

  pub const fn end_word(self) -> u32 {
    (TAG_END << self.shift) | FIELD16_MASK
  }

  const fn tag_word(self, op: Operation) -> u32 {
    op.tag() << self.shift
  }

  const fn tag_of(self, word: u32) -> u32 {
    (word >> self.shift) & 0xFF
  }
}

impl Default for TagLayout {
  fn default() -> Self {
    Self::REFERENCE
  }
}

/// Upper 24 address bits shared by an `Addr8` entry and its base.
pub(crate) const fn addr8_base(address: u32) -> u32 {
  address & !0xFF
}

/// Encode one instruction into `out`, returning the number of words used.
///
/// `out` must hold at least `op.word_size()` words.
pub(crate) fn encode_entry(layout: TagLayout, op: Operation, address: u32, value: u32, out: &mut [u32]) -> usize {
  let tag = layout.tag_word(op);
  match op {
    Operation::Full => {
      out[0] = tag | (address >> 16);
      out[1] = ((address & FIELD16_MASK) << 8) | (value >> 24);
      out[2] = value & PAYLOAD_MASK;
    }
    Operation::Addr8 => {
      out[0] = tag | ((address & 0xFF) << 8) | (value >> 24);
      out[1] = value & PAYLOAD_MASK;
    }
    Operation::L16 => {
      out[0] = tag | ((address >> 8) & FIELD16_MASK);
      out[1] = ((address & 0xFF) << 16) | (value & FIELD16_MASK);
    }
    Operation::H16 => {
      out[0] = tag | ((address >> 8) & FIELD16_MASK);
      out[1] = ((address & 0xFF) << 16) | (value >> 16);
    }
  }
  op.word_size()
}

/// Length in words of the instruction whose first word is `w0`.
///
/// `None` marks the END word. Unknown tags are malformed.
pub(crate) fn instruction_len(layout: TagLayout, w0: u32) -> Result<Option<usize>, SequenceError> {
  match layout.tag_of(w0) {
    TAG_END => Ok(None),
    tag => Operation::from_tag(tag).map(|op| Some(op.word_size())).ok_or(SequenceError::Malformed),
  }
}

/// One decoded instruction, or the END marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoded {
  Write { op: Operation, address: u32, value: u32 },
  End,
}

/// Decode the instruction starting at `words[0]`.
///
/// `base` supplies the upper address bits for an `Addr8` instruction.
pub(crate) fn decode_entry(layout: TagLayout, words: &[u32], base: Option<u32>) -> Result<Decoded, SequenceError> {
  let w0 = *words.first().ok_or(SequenceError::Malformed)?;
  let tag = layout.tag_of(w0);
  if tag == TAG_END {
    return Ok(Decoded::End);
  }

  let op = Operation::from_tag(tag).ok_or(SequenceError::Malformed)?;
  if words.len() < op.word_size() {
    return Err(SequenceError::Malformed);
  }

  let w1 = words[1] & PAYLOAD_MASK;
  let (address, value) = match op {
    Operation::Full => {
      let w2 = words[2] & PAYLOAD_MASK;
      ((w0 & FIELD16_MASK) << 16 | w1 >> 8, (w1 & 0xFF) << 24 | w2)
    }
    Operation::Addr8 => {
      let base = base.ok_or(SequenceError::Malformed)?;
      (addr8_base(base) | ((w0 >> 8) & 0xFF), (w0 & 0xFF) << 24 | w1)
    }
    Operation::L16 => ((w0 & FIELD16_MASK) << 8 | w1 >> 16, w1 & FIELD16_MASK),
    Operation::H16 => ((w0 & FIELD16_MASK) << 8 | w1 >> 16, (w1 & FIELD16_MASK) << 16),
  };

  Ok(Decoded::Write { op, address, value })
}
