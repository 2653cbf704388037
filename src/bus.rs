use embedded_hal_async::i2c::{I2c, SevenBitAddress};

/// Word-oriented register access consumed by the driver.
///
/// Addresses and values are 32 bits wide. Implementations only move words;
/// polling, read-modify-write and symbol resolution live on the driver.
#[allow(async_fn_in_trait)]
pub trait RegisterBus {
  /// Transport error surfaced unchanged through [`crate::Error::Bus`].
  type Error;

  /// Read one register.
  async fn read(&mut self, addr: u32) -> Result<u32, Self::Error>;

  /// Write one register.
  async fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error>;

  /// Write a run of big-endian words starting at `addr`.
  ///
  /// The default splits `bytes` into 4-byte words and writes them one by
  /// one with a 4-byte address stride. A trailing partial word is
  /// zero-padded.
  async fn write_block(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error> {
    let mut reg = addr;
    for chunk in bytes.chunks(4) {
      let mut word = [0u8; 4];
      word[..chunk.len()].copy_from_slice(chunk);
      self.write(reg, u32::from_be_bytes(word)).await?;
      reg = reg.wrapping_add(4);
    }
    Ok(())
  }
}

/// Largest block written in a single I²C transaction (payload bytes).
const MAX_BLOCK: usize = 32;

/// [`RegisterBus`] over an `embedded-hal-async` I²C peripheral.
///
/// Frames follow the control-port convention of this chip family: a 4-byte
/// big-endian register address followed by 4-byte big-endian data words.
pub struct I2cBus<I> {
  i2c: I,
  address: SevenBitAddress,
}

impl<I> I2cBus<I> {
  /// Wrap an I²C peripheral talking to the device at `address`.
  pub const fn new(i2c: I, address: SevenBitAddress) -> Self {
    Self { i2c, address }
  }

  /// Give the peripheral back.
  pub fn release(self) -> I {
    self.i2c
  }
}

impl<I: I2c<SevenBitAddress>> RegisterBus for I2cBus<I> {
  type Error = I::Error;

  async fn read(&mut self, addr: u32) -> Result<u32, Self::Error> {
    let mut buf = [0u8; 4];
    self.i2c.write_read(self.address, &addr.to_be_bytes(), &mut buf).await?;
    Ok(u32::from_be_bytes(buf))
  }

  async fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error> {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&addr.to_be_bytes());
    buf[4..].copy_from_slice(&value.to_be_bytes());
    self.i2c.write(self.address, &buf).await
  }

  async fn write_block(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error> {
    let mut buf = [0u8; 4 + MAX_BLOCK];
    let mut reg = addr;
    for chunk in bytes.chunks(MAX_BLOCK) {
      let len = chunk.len();
      buf[..4].copy_from_slice(&reg.to_be_bytes());
      buf[4..4 + len].copy_from_slice(chunk);
      self.i2c.write(self.address, &buf[..4 + len]).await?;
      reg = reg.wrapping_add(len as u32);
    }
    Ok(())
  }
}
