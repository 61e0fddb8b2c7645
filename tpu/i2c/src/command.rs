//! Transfer commands consumed by the master

use heapless::Vec;

use crate::{Direction, I2cError, I2cResult, BUFFER_CAPACITY, RW_MASK, START_BYTE};

/// One leg of a transfer: a header byte and its data buffer
///
/// For a write the buffer holds the bytes to send. For a read its length
/// is the number of bytes to receive and the master fills it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    header: u8,
    buffer: Vec<u8, BUFFER_CAPACITY>,
}

impl TransferCommand {
    /// Build a command from a raw header
    ///
    /// A read header needs at least one byte to receive, except for the
    /// START byte, which is never acknowledged.
    pub fn new(header: u8, buffer: &[u8]) -> I2cResult<Self> {
        check_read_len(header, buffer.len())?;
        let buffer = Vec::from_slice(buffer).map_err(|_| I2cError::BufferTooLarge)?;
        Ok(Self { header, buffer })
    }

    /// Write `data` to the device at `address`
    pub fn write(address: u8, data: &[u8]) -> I2cResult<Self> {
        Self::new(address & !RW_MASK, data)
    }

    /// Read `len` bytes from the device at `address`
    pub fn read(address: u8, len: usize) -> I2cResult<Self> {
        check_read_len(address | RW_MASK, len)?;
        let mut buffer = Vec::new();
        buffer.resize(len, 0).map_err(|_| I2cError::BufferTooLarge)?;
        Ok(Self { header: address | RW_MASK, buffer })
    }

    pub fn header(&self) -> u8 {
        self.header
    }

    pub fn direction(&self) -> Direction {
        Direction::from_header(self.header)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes to send, or bytes received so far for a completed read
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn byte(&self, index: usize) -> u8 {
        self.buffer.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn store(&mut self, index: usize, byte: u8) {
        if let Some(slot) = self.buffer.get_mut(index) {
            *slot = byte;
        }
    }
}

/// An addressed slave drives the first data bit right after its ACK, so
/// a zero length read leaves SDA held low where the STOP should be
fn check_read_len(header: u8, len: usize) -> I2cResult<()> {
    if Direction::from_header(header) == Direction::Read && len == 0 && header != START_BYTE {
        return Err(I2cError::InvalidParameter);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_clears_rw_bit() {
        let cmd = TransferCommand::write(0x65, &[0x11, 0x22]).unwrap();
        assert_eq!(cmd.header(), 0x64);
        assert_eq!(cmd.direction(), Direction::Write);
        assert_eq!(cmd.data(), &[0x11, 0x22]);
    }

    #[test]
    fn test_read_sets_rw_bit_and_sizes_buffer() {
        let cmd = TransferCommand::read(0x64, 8).unwrap();
        assert_eq!(cmd.header(), 0x65);
        assert_eq!(cmd.direction(), Direction::Read);
        assert_eq!(cmd.len(), 8);
    }

    #[test]
    fn test_oversized_buffers_rejected() {
        let big = [0u8; BUFFER_CAPACITY + 1];
        assert_eq!(TransferCommand::write(0x64, &big), Err(I2cError::BufferTooLarge));
        assert_eq!(TransferCommand::read(0x64, BUFFER_CAPACITY + 1), Err(I2cError::BufferTooLarge));
        assert!(TransferCommand::read(0x64, BUFFER_CAPACITY).is_ok());
    }

    #[test]
    fn test_empty_read_rejected() {
        assert_eq!(TransferCommand::read(0x64, 0), Err(I2cError::InvalidParameter));
        assert_eq!(TransferCommand::new(0x65, &[]), Err(I2cError::InvalidParameter));
        // empty writes and the START byte stay valid
        assert!(TransferCommand::new(0x64, &[]).is_ok());
        assert!(TransferCommand::write(0x64, &[]).is_ok());
        assert!(TransferCommand::new(START_BYTE, &[]).is_ok());
    }

    #[test]
    fn test_store_ignores_out_of_range() {
        let mut cmd = TransferCommand::read(0x64, 2).unwrap();
        cmd.store(1, 0xab);
        cmd.store(5, 0xcd);
        assert_eq!(cmd.data(), &[0x00, 0xab]);
        assert_eq!(cmd.byte(9), 0);
    }
}
