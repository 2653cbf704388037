/// Firmware control parameters the driver resolves at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Symbol {
  /// DSP core run state.
  HaloState = 1,
  /// Firmware playback state (standby / active).
  FirmwareState = 2,
  /// Base address of the persisted write sequence.
  PowerOnSequence = 3,
  CalR = 4,
  CalAmbient = 5,
  CalStatus = 6,
  CalChecksum = 7,
  CalEnable = 8,
}

impl Symbol {
  /// Every symbol a firmware image must export for the driver to take it.
  pub const REQUIRED: [Symbol; 8] = [
    Symbol::HaloState,
    Symbol::FirmwareState,
    Symbol::PowerOnSequence,
    Symbol::CalR,
    Symbol::CalAmbient,
    Symbol::CalStatus,
    Symbol::CalChecksum,
    Symbol::CalEnable,
  ];

  pub const fn id(self) -> u32 {
    self as u32
  }
}

/// Symbol table exposed by a firmware image once it has been streamed.
///
/// The container parser lives outside this crate; it only has to map symbol
/// ids onto runtime register addresses.
pub trait SymbolTable {
  fn resolve(&self, id: u32) -> Option<u32>;
}

/// One exported firmware symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareSymbol {
  pub id: u32,
  pub address: u32,
}

impl FirmwareSymbol {
  pub const fn new(symbol: Symbol, address: u32) -> Self {
    Self { id: symbol.id(), address }
  }
}

/// Slice-backed [`SymbolTable`] for images parsed ahead of time.
#[derive(Clone, Copy, Debug)]
pub struct FirmwareInfo<'a> {
  symbols: &'a [FirmwareSymbol],
}

impl<'a> FirmwareInfo<'a> {
  pub const fn new(symbols: &'a [FirmwareSymbol]) -> Self {
    Self { symbols }
  }
}

impl SymbolTable for FirmwareInfo<'_> {
  fn resolve(&self, id: u32) -> Option<u32> {
    self.symbols.iter().find(|s| s.id == id).map(|s| s.address)
  }
}

/// Resolved addresses of every [`Symbol::REQUIRED`] control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ControlSymbols {
  addresses: [u32; Symbol::REQUIRED.len()],
}

impl ControlSymbols {
  /// Resolve all required symbols. Fails with the id of the first one missing.
  pub(crate) fn resolve(table: &dyn SymbolTable) -> Result<Self, u32> {
    let mut addresses = [0u32; Symbol::REQUIRED.len()];
    for (slot, symbol) in addresses.iter_mut().zip(Symbol::REQUIRED) {
      *slot = table.resolve(symbol.id()).ok_or(symbol.id())?;
    }
    Ok(Self { addresses })
  }

  pub(crate) fn address(&self, symbol: Symbol) -> u32 {
    // REQUIRED is ordered by id, starting at 1
    self.addresses[symbol.id() as usize - 1]
  }
}
