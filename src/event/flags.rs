use bitflags::bitflags;

bitflags! {
  /// Semantic events collected by [`crate::SmartAmp::process`].
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct EventFlags: u32 {
    const AMP_ERROR    = 1 << 0;
    const TEMP_ERROR   = 1 << 1;
    const TEMP_WARNING = 1 << 2;
    const BOOST_ERROR  = 1 << 3;
    const WAKE_SOURCE  = 1 << 4;
    const MAILBOX      = 1 << 5;
    /// Event handling itself failed; the driver is now in [`crate::State::Error`].
    const STATE_ERROR  = 1 << 31;
  }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventFlags {
  fn format(&self, f: defmt::Formatter) {
    defmt::write!(f, "EventFlags({=u32:#x})", self.bits())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn union_and_contains() {
    let mut flags = EventFlags::AMP_ERROR | EventFlags::BOOST_ERROR;
    assert!(flags.contains(EventFlags::AMP_ERROR));
    assert!(!flags.contains(EventFlags::AMP_ERROR | EventFlags::MAILBOX));
    flags |= EventFlags::MAILBOX;
    assert_eq!(flags.bits(), 0b10_1001);
    assert!(EventFlags::empty().is_empty());
  }

  #[test]
  fn debug_lists_names() {
    let flags = EventFlags::TEMP_WARNING | EventFlags::STATE_ERROR;
    assert_eq!(std::format!("{:?}", flags), "EventFlags(TEMP_WARNING | STATE_ERROR)");
  }
}
