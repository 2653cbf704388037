use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;

use crate::{Error, RegisterBus, SmartAmp, Symbol};

mod codec;

pub use codec::{Operation, TagLayout};
use codec::{addr8_base, decode_entry, encode_entry, instruction_len, Decoded};

/// Most instructions the on-device table holds.
pub const MAX_ENTRIES: usize = 42;
/// Table size in device words, END word included.
pub const MAX_WORDS: usize = 129;

/// Failures of the pure write-sequence operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
  /// Unknown tag, truncated instruction, `Addr8` without a base, or no END.
  Malformed,
  /// Entry or word capacity would be exceeded.
  Exhausted,
  /// The entry cannot be expressed with the requested operation.
  InvalidArgument,
}

/// One register write of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Entry {
  operation: Operation,
  offset: usize,
  address: u32,
  value: u32,
}

impl Entry {
  pub const fn operation(&self) -> Operation {
    self.operation
  }

  pub const fn word_size(&self) -> usize {
    self.operation.word_size()
  }

  /// Word offset of the entry inside the table.
  pub const fn offset(&self) -> usize {
    self.offset
  }

  pub const fn address(&self) -> u32 {
    self.address
  }

  pub const fn value(&self) -> u32 {
    self.value
  }
}

/// Keep only the half of the value the operation carries.
const fn normalize(op: Operation, value: u32) -> u32 {
  match op {
    Operation::L16 => value & 0x0000_FFFF,
    Operation::H16 => value & 0xFFFF_0000,
    Operation::Full | Operation::Addr8 => value,
  }
}

/// Host copy of the write sequence the boot firmware replays after hibernation.
///
/// Entries keep insertion order; the table tracks whether its current content
/// has been written to the device since the last change or wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSequence {
  entries: Vec<Entry, MAX_ENTRIES>,
  words: usize,
  flushed: bool,
  layout: TagLayout,
}

impl WriteSequence {
  pub const fn new(layout: TagLayout) -> Self {
    Self { entries: Vec::new(), words: 0, flushed: false, layout }
  }

  pub fn entries(&self) -> &[Entry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Words used by the entries, END word excluded.
  pub fn words(&self) -> usize {
    self.words
  }

  pub fn is_flushed(&self) -> bool {
    self.flushed
  }

  pub fn layout(&self) -> TagLayout {
    self.layout
  }

  /// Append a new entry.
  ///
  /// `L16`/`H16` values are cut down to the half they carry. Half-word
  /// addresses must fit in 24 bits, and an `Addr8` address must share its
  /// upper bits with the nearest preceding non-`Addr8` entry.
  pub fn push(&mut self, op: Operation, address: u32, value: u32) -> Result<(), SequenceError> {
    match op {
      Operation::L16 | Operation::H16 if address > 0x00FF_FFFF => return Err(SequenceError::InvalidArgument),
      Operation::Addr8 => match self.base() {
        Some(base) if addr8_base(base) == addr8_base(address) => {}
        _ => return Err(SequenceError::InvalidArgument),
      },
      _ => {}
    }

    // one word stays reserved for END
    if self.entries.len() >= MAX_ENTRIES || self.words + op.word_size() + 1 > MAX_WORDS {
      return Err(SequenceError::Exhausted);
    }

    let entry = Entry { operation: op, offset: self.words, address, value: normalize(op, value) };
    self.entries.push(entry).map_err(|_| SequenceError::Exhausted)?;
    self.words += op.word_size();
    self.flushed = false;
    Ok(())
  }

  /// Position of the entry writing `address` with `op`, if any.
  pub fn find(&self, address: u32, op: Operation) -> Option<usize> {
    self.entries.iter().position(|e| e.operation == op && e.address == address)
  }

  /// Update the entry for `address` in place, or append one.
  ///
  /// Only entries of the same operation kind match. The `flushed` flag is
  /// cleared only when the table actually changes, so repeating a call is a
  /// no-op.
  pub fn update_or_insert(&mut self, address: u32, value: u32, op: Operation) -> Result<(), SequenceError> {
    match self.find(address, op) {
      Some(i) => {
        let value = normalize(op, value);
        let entry = &mut self.entries[i];
        if entry.value != value {
          entry.value = value;
          self.flushed = false;
        }
        Ok(())
      }
      None => self.push(op, address, value),
    }
  }

  /// Encode the table followed by the END word into `out`.
  ///
  /// Returns the number of words written.
  pub fn encode(&self, out: &mut [u32]) -> Result<usize, SequenceError> {
    if out.len() < self.words + 1 {
      return Err(SequenceError::Exhausted);
    }
    let mut at = 0;
    for e in &self.entries {
      at += encode_entry(self.layout, e.operation, e.address, e.value, &mut out[at..]);
    }
    out[at] = self.layout.end_word();
    Ok(at + 1)
  }

  /// Decode a word stream up to its END word.
  ///
  /// The stream must end within [`MAX_WORDS`] words.
  pub fn decode(words: &[u32], layout: TagLayout) -> Result<Self, SequenceError> {
    let words = &words[..words.len().min(MAX_WORDS)];
    let mut seq = Self::new(layout);
    let mut at = 0;

    while at < words.len() {
      match decode_entry(layout, &words[at..], seq.base())? {
        Decoded::End => return Ok(seq),
        Decoded::Write { op, address, value } => {
          seq.push(op, address, value)?;
          at += op.word_size();
        }
      }
    }

    Err(SequenceError::Malformed)
  }

  /// Address of the nearest entry an `Addr8` write would take its upper bits from.
  fn base(&self) -> Option<u32> {
    self.entries.iter().rev().find(|e| e.operation != Operation::Addr8).map(|e| e.address)
  }

  pub(crate) fn set_flushed(&mut self, flushed: bool) {
    self.flushed = flushed;
  }

  pub(crate) fn clear(&mut self) {
    *self = Self::new(self.layout);
  }
}

impl<B, E, RST, D> SmartAmp<B, RST, D>
where
  B: RegisterBus<Error = E>,
  RST: OutputPin,
  D: DelayNs,
{
  /// Replace the host table with the sequence stored on the device.
  ///
  /// The `flushed` flag is kept: reading back does not count as a flush.
  pub async fn read_write_sequence(&mut self) -> Result<(), Error<E>> {
    let base = self.resolve(Symbol::PowerOnSequence)?;
    let layout = self.wseq.layout();

    // END is only recognized where an instruction starts; data words may
    // carry the same bit pattern.
    let mut words = [0u32; MAX_WORDS];
    let mut len = 0;
    while len < MAX_WORDS {
      let w0 = self.read(base + 4 * len as u32).await?;
      words[len] = w0;
      let Some(size) = instruction_len(layout, w0)? else {
        len += 1;
        break;
      };
      let next = (len + size).min(MAX_WORDS);
      for (i, slot) in words.iter_mut().enumerate().take(next).skip(len + 1) {
        *slot = self.read(base + 4 * i as u32).await?;
      }
      len = next;
    }

    let flushed = self.wseq.is_flushed();
    self.wseq = WriteSequence::decode(&words[..len], layout)?;
    self.wseq.set_flushed(flushed);
    debug!("write sequence read back: {} entries", self.wseq.len());
    Ok(())
  }

  /// Update or insert one entry of the write sequence.
  ///
  /// With `refresh`, an existing entry takes the live register value instead
  /// of `value`.
  pub async fn update_write_sequence(&mut self, address: u32, value: u32, op: Operation, refresh: bool) -> Result<(), Error<E>> {
    let value = if refresh && self.wseq.find(address, op).is_some() { self.read(address).await? } else { value };
    self.wseq.update_or_insert(address, value, op)?;
    Ok(())
  }

  /// Write the table and its END word to the device. No I/O when already flushed.
  pub async fn flush_write_sequence(&mut self) -> Result<(), Error<E>> {
    if self.wseq.is_flushed() {
      return Ok(());
    }
    let base = self.resolve(Symbol::PowerOnSequence)?;

    let mut words = [0u32; MAX_WORDS];
    let len = self.wseq.encode(&mut words)?;
    let mut bytes = [0u8; MAX_WORDS * 4];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(&words[..len]) {
      chunk.copy_from_slice(&word.to_be_bytes());
    }

    self.bus.write_block(base, &bytes[..len * 4]).await.map_err(Error::Bus)?;
    self.wseq.set_flushed(true);
    debug!("write sequence flushed: {} words", len);
    Ok(())
  }
}
