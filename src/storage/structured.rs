//! Structured binary I/O with a running CRC32 checksum.
//!
//! All values are little-endian. A writer's checksum covers every byte written
//! through it and is appended as a trailing `u32` on [`StructWriter::close`];
//! [`StructReader::verify_checksum`] reads that trailer and compares it against
//! the bytes consumed so far.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{GroundTruthError, Result};
use crate::storage::{StorageInput, StorageOutput};

/// Elements per chunk when streaming numeric slices.
const CHUNK_ELEMENTS: usize = 8192;

/// A structured writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: Hasher,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: Hasher::new(),
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.update(&[value]);
        Ok(())
    }

    /// Write a u32 value.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.update(&value.to_le_bytes());
        Ok(())
    }

    /// Write a u64 value.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.update(&value.to_le_bytes());
        Ok(())
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.update(value);
        Ok(())
    }

    /// Write a slice of f32 values.
    pub fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        let mut buf = vec![0u8; CHUNK_ELEMENTS.min(values.len()) * 4];
        for chunk in values.chunks(CHUNK_ELEMENTS) {
            let bytes = &mut buf[..chunk.len() * 4];
            LittleEndian::write_f32_into(chunk, bytes);
            self.writer.write_all(bytes)?;
            self.hasher.update(bytes);
        }
        Ok(())
    }

    /// Write a slice of i64 values.
    pub fn write_i64_slice(&mut self, values: &[i64]) -> Result<()> {
        let mut buf = vec![0u8; CHUNK_ELEMENTS.min(values.len()) * 8];
        for chunk in values.chunks(CHUNK_ELEMENTS) {
            let bytes = &mut buf[..chunk.len() * 8];
            LittleEndian::write_i64_into(chunk, bytes);
            self.writer.write_all(bytes)?;
            self.hasher.update(bytes);
        }
        Ok(())
    }

    /// Checksum of the bytes written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Append the checksum trailer, then flush and close the writer.
    pub fn close(mut self) -> Result<()> {
        let checksum = self.checksum();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        self.writer.close()?;
        Ok(())
    }
}

/// A structured reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    hasher: Hasher,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured reader.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            hasher: Hasher::new(),
            position: 0,
            file_size,
        })
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.update(&[value]);
        Ok(value)
    }

    /// Read a u32 value.
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.update(&value.to_le_bytes());
        Ok(value)
    }

    /// Read a u64 value.
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<LittleEndian>()?;
        self.update(&value.to_le_bytes());
        Ok(value)
    }

    /// Read an exact number of raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.update(&bytes);
        Ok(bytes)
    }

    /// Read `count` f32 values.
    pub fn read_f32_slice(&mut self, count: usize) -> Result<Vec<f32>> {
        self.ensure_remaining(count, 4)?;
        let mut values = vec![0f32; count];
        let mut buf = vec![0u8; CHUNK_ELEMENTS.min(count) * 4];
        for chunk in values.chunks_mut(CHUNK_ELEMENTS) {
            let bytes = &mut buf[..chunk.len() * 4];
            self.reader.read_exact(bytes)?;
            self.hasher.update(bytes);
            self.position += bytes.len() as u64;
            LittleEndian::read_f32_into(bytes, chunk);
        }
        Ok(values)
    }

    /// Read `count` i64 values.
    pub fn read_i64_slice(&mut self, count: usize) -> Result<Vec<i64>> {
        self.ensure_remaining(count, 8)?;
        let mut values = vec![0i64; count];
        let mut buf = vec![0u8; CHUNK_ELEMENTS.min(count) * 8];
        for chunk in values.chunks_mut(CHUNK_ELEMENTS) {
            let bytes = &mut buf[..chunk.len() * 8];
            self.reader.read_exact(bytes)?;
            self.hasher.update(bytes);
            self.position += bytes.len() as u64;
            LittleEndian::read_i64_into(bytes, chunk);
        }
        Ok(values)
    }

    /// Read the checksum trailer and compare it with the bytes read so far.
    pub fn verify_checksum(&mut self) -> Result<()> {
        let expected = self.reader.read_u32::<LittleEndian>()?;
        let actual = self.hasher.clone().finalize();
        if expected != actual {
            return Err(GroundTruthError::corrupted(format!(
                "checksum mismatch: stored {expected:#010x}, computed {actual:#010x}"
            )));
        }
        Ok(())
    }

    /// Fails unless `count` elements of `width` bytes are left before EOF.
    fn ensure_remaining(&self, count: usize, width: u64) -> Result<()> {
        let remaining = self.file_size.saturating_sub(self.position);
        let bytes = (count as u64).checked_mul(width).ok_or_else(|| {
            GroundTruthError::corrupted(format!("payload of {count} elements overflows"))
        })?;
        if bytes > remaining {
            return Err(GroundTruthError::corrupted(format!(
                "payload needs {bytes} bytes but only {remaining} remain"
            )));
        }
        Ok(())
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.position += data.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_header_and_payload() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("data.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_raw(b"GTDS").unwrap();
        writer.write_u8(1).unwrap();
        writer.write_u64(3).unwrap();
        writer.write_f32_slice(&[0.5, -1.25, 3.0]).unwrap();
        writer.write_i64_slice(&[-1, 42]).unwrap();
        writer.close().unwrap();

        let input = storage.open_input("data.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        assert_eq!(reader.read_raw(4).unwrap(), b"GTDS");
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u64().unwrap(), 3);
        assert_eq!(reader.read_f32_slice(3).unwrap(), vec![0.5, -1.25, 3.0]);
        assert_eq!(reader.read_i64_slice(2).unwrap(), vec![-1, 42]);
        reader.verify_checksum().unwrap();
    }

    #[test]
    fn test_checksum_detects_flipped_byte() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("data.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_f32_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        writer.close().unwrap();

        let mut bytes = storage.get_raw("data.bin").unwrap();
        bytes[5] ^= 0xff;
        storage.put_raw("data.bin", bytes);

        let input = storage.open_input("data.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        reader.read_f32_slice(4).unwrap();
        let err = reader.verify_checksum().unwrap_err();
        assert!(matches!(err, GroundTruthError::Corrupted(_)));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let storage = MemoryStorage::new_default();
        storage.put_raw("short.bin", vec![0u8; 6]);

        let input = storage.open_input("short.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        assert!(matches!(
            reader.read_f32_slice(4),
            Err(GroundTruthError::Corrupted(_))
        ));
    }

    #[test]
    fn test_overflowing_element_count_is_rejected() {
        let storage = MemoryStorage::new_default();
        storage.put_raw("short.bin", vec![0u8; 16]);

        let input = storage.open_input("short.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        assert!(matches!(
            reader.read_i64_slice(1 << 62),
            Err(GroundTruthError::Corrupted(_))
        ));
        assert!(matches!(
            reader.read_f32_slice(usize::MAX),
            Err(GroundTruthError::Corrupted(_))
        ));
    }
}
