//! Dataset container over a storage backend.
//!
//! On-disk layout of a dataset object (`<key>.ds`), little-endian:
//!
//! | field    | type       |
//! |----------|------------|
//! | magic    | `b"GTDS"`  |
//! | version  | u32        |
//! | dtype    | u8         |
//! | rows     | u64        |
//! | cols     | u64        |
//! | payload  | rows*cols  |
//! | checksum | u32 (CRC32 of everything above) |
//!
//! Writes go to a temp object first and are renamed into place once fully
//! flushed, so a dataset is either absent or complete.

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dataset::matrix::Matrix;
use crate::error::{GroundTruthError, Result};
use crate::storage::file::FileStorage;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{Storage, StorageConfig, StorageInput, StorageLock};

const MAGIC: &[u8; 4] = b"GTDS";
const FORMAT_VERSION: u32 = 1;
const DATASET_SUFFIX: &str = ".ds";
const WRITER_LOCK: &str = "groundtruth";

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").expect("dataset key pattern is valid")
});

/// Element type of a stored dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    I64,
}

impl DType {
    fn code(self) -> u8 {
        match self {
            DType::F32 => 0,
            DType::I64 => 1,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DType::F32),
            1 => Ok(DType::I64),
            other => Err(GroundTruthError::corrupted(format!(
                "unknown dtype code {other}"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::I64 => "i64",
        }
    }

    /// Bytes per element on disk.
    pub fn size(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I64 => 8,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Header information of a stored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub key: String,
    pub dtype: DType,
    pub rows: usize,
    pub cols: usize,
}

/// A keyed collection of matrices.
#[derive(Debug)]
pub struct DatasetContainer {
    storage: Box<dyn Storage>,
}

impl DatasetContainer {
    /// Wrap an existing storage backend.
    pub fn new(storage: Box<dyn Storage>) -> Self {
        DatasetContainer { storage }
    }

    /// Open an existing directory-backed container.
    pub fn open_dir<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let path = path.as_ref();
        let storage = FileStorage::open(path, config).map_err(|_| {
            GroundTruthError::missing_input(format!("container {}", path.display()))
        })?;
        Ok(Self::new(Box::new(storage)))
    }

    /// Open a directory-backed container, creating the directory if needed.
    pub fn create_dir<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        Ok(Self::new(Box::new(FileStorage::new(path, config)?)))
    }

    /// Names of all stored datasets, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_files()?
            .into_iter()
            .filter_map(|name| name.strip_suffix(DATASET_SUFFIX).map(str::to_string))
            .filter(|key| KEY_PATTERN.is_match(key))
            .collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.storage.file_exists(&object_name(key))
    }

    /// Read only the header of a dataset.
    pub fn info(&self, key: &str) -> Result<DatasetInfo> {
        let mut reader = self.open_reader(key)?;
        read_header(key, &mut reader)
    }

    /// Header information for every stored dataset.
    pub fn list(&self) -> Result<Vec<DatasetInfo>> {
        self.keys()?.iter().map(|key| self.info(key)).collect()
    }

    /// Read an `f32` dataset.
    pub fn read_f32(&self, key: &str) -> Result<Matrix<f32>> {
        let mut reader = self.open_reader(key)?;
        let info = read_header(key, &mut reader)?;
        expect_dtype(&info, DType::F32)?;
        let data = reader.read_f32_slice(element_count(&info)?)?;
        reader.verify_checksum()?;
        debug!("read dataset '{key}' ({}x{} f32)", info.rows, info.cols);
        Matrix::new(info.rows, info.cols, data)
    }

    /// Read an `i64` dataset.
    pub fn read_i64(&self, key: &str) -> Result<Matrix<i64>> {
        let mut reader = self.open_reader(key)?;
        let info = read_header(key, &mut reader)?;
        expect_dtype(&info, DType::I64)?;
        let data = reader.read_i64_slice(element_count(&info)?)?;
        reader.verify_checksum()?;
        debug!("read dataset '{key}' ({}x{} i64)", info.rows, info.cols);
        Matrix::new(info.rows, info.cols, data)
    }

    /// Write an `f32` dataset. Fails with `DatasetExists` when the key is
    /// taken and `overwrite` is false.
    pub fn write_f32(&self, key: &str, matrix: &Matrix<f32>, overwrite: bool) -> Result<()> {
        self.write_with(key, DType::F32, matrix.shape(), overwrite, |writer| {
            writer.write_f32_slice(matrix.as_slice())
        })
    }

    /// Write an `i64` dataset. Same collision rules as [`Self::write_f32`].
    pub fn write_i64(&self, key: &str, matrix: &Matrix<i64>, overwrite: bool) -> Result<()> {
        self.write_with(key, DType::I64, matrix.shape(), overwrite, |writer| {
            writer.write_i64_slice(matrix.as_slice())
        })
    }

    /// Copy one dataset verbatim from another container.
    pub fn copy_from(&self, source: &DatasetContainer, key: &str) -> Result<()> {
        validate_key(key)?;
        if !source.contains(key) {
            return Err(GroundTruthError::missing_input(key));
        }

        let name = object_name(key);
        let mut input = source.storage.open_input(&name)?;
        let size = usize::try_from(input.size()?).map_err(|_| {
            GroundTruthError::corrupted(format!("dataset '{key}' is too large to copy"))
        })?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size).map_err(|_| {
            GroundTruthError::corrupted(format!("dataset '{key}' is too large to copy"))
        })?;
        input.read_to_end(&mut bytes)?;
        input.close()?;

        let (temp_name, mut output) = self.storage.create_temp_output(key)?;
        let written = std::io::Write::write_all(&mut output, &bytes)
            .map_err(GroundTruthError::from)
            .and_then(|_| output.close());
        drop(output);
        match written {
            Ok(()) => self.storage.rename_file(&temp_name, &name),
            Err(e) => {
                let _ = self.storage.delete_file(&temp_name);
                Err(e)
            }
        }
    }

    /// Clone phase of copy-then-add augmentation: copy every dataset of
    /// `source` into this container. Returns the copied keys.
    pub fn augment(&self, source: &DatasetContainer) -> Result<Vec<String>> {
        let keys = source.keys()?;
        for key in &keys {
            self.copy_from(source, key)?;
        }
        info!("copied {} existing datasets", keys.len());
        Ok(keys)
    }

    /// Take the exclusive writer lock for this container.
    pub fn lock_writer(&self) -> Result<Box<dyn StorageLock>> {
        self.storage.acquire_lock(WRITER_LOCK)
    }

    fn open_reader(&self, key: &str) -> Result<StructReader<Box<dyn StorageInput>>> {
        validate_key(key)?;
        if !self.contains(key) {
            return Err(GroundTruthError::missing_input(key));
        }
        StructReader::new(self.storage.open_input(&object_name(key))?)
    }

    fn write_with<F>(
        &self,
        key: &str,
        dtype: DType,
        (rows, cols): (usize, usize),
        overwrite: bool,
        payload: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut StructWriter<Box<dyn crate::storage::StorageOutput>>) -> Result<()>,
    {
        validate_key(key)?;
        if !overwrite && self.contains(key) {
            return Err(GroundTruthError::dataset_exists(key));
        }

        let (temp_name, output) = self.storage.create_temp_output(key)?;
        let mut writer = StructWriter::new(output);
        let written = write_header(&mut writer, dtype, rows, cols)
            .and_then(|_| payload(&mut writer))
            .and_then(|_| writer.close());

        match written {
            Ok(()) => {
                self.storage.rename_file(&temp_name, &object_name(key))?;
                debug!("wrote dataset '{key}' ({rows}x{cols} {dtype})");
                Ok(())
            }
            Err(e) => {
                let _ = self.storage.delete_file(&temp_name);
                Err(e)
            }
        }
    }
}

fn object_name(key: &str) -> String {
    format!("{key}{DATASET_SUFFIX}")
}

/// Check that `key` can name a dataset.
pub fn validate_key(key: &str) -> Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(GroundTruthError::invalid_config(format!(
            "invalid dataset key '{key}'"
        )))
    }
}

fn write_header<W: crate::storage::StorageOutput>(
    writer: &mut StructWriter<W>,
    dtype: DType,
    rows: usize,
    cols: usize,
) -> Result<()> {
    writer.write_raw(MAGIC)?;
    writer.write_u32(FORMAT_VERSION)?;
    writer.write_u8(dtype.code())?;
    writer.write_u64(rows as u64)?;
    writer.write_u64(cols as u64)?;
    Ok(())
}

fn read_header<R: StorageInput>(
    key: &str,
    reader: &mut StructReader<R>,
) -> Result<DatasetInfo> {
    let magic = reader.read_raw(MAGIC.len())?;
    if magic != MAGIC {
        return Err(GroundTruthError::corrupted(format!(
            "dataset '{key}' has a bad magic number"
        )));
    }
    let version = reader.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(GroundTruthError::corrupted(format!(
            "dataset '{key}' has unsupported format version {version}"
        )));
    }
    let dtype = DType::from_code(reader.read_u8()?)?;
    let rows = usize::try_from(reader.read_u64()?).map_err(|_| {
        GroundTruthError::corrupted(format!("dataset '{key}' row count overflow"))
    })?;
    let cols = usize::try_from(reader.read_u64()?).map_err(|_| {
        GroundTruthError::corrupted(format!("dataset '{key}' column count overflow"))
    })?;

    Ok(DatasetInfo {
        key: key.to_string(),
        dtype,
        rows,
        cols,
    })
}

fn expect_dtype(info: &DatasetInfo, expected: DType) -> Result<()> {
    if info.dtype != expected {
        return Err(GroundTruthError::shape_mismatch(format!(
            "dataset '{}' holds {} values, expected {expected}",
            info.key, info.dtype
        )));
    }
    Ok(())
}

fn element_count(info: &DatasetInfo) -> Result<usize> {
    info.rows
        .checked_mul(info.cols)
        .filter(|count| count.checked_mul(info.dtype.size()).is_some())
        .ok_or_else(|| {
            GroundTruthError::corrupted(format!("dataset '{}' is too large", info.key))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn memory_container() -> (MemoryStorage, DatasetContainer) {
        let storage = MemoryStorage::new_default();
        let container = DatasetContainer::new(Box::new(storage.clone()));
        (storage, container)
    }

    #[test]
    fn test_write_then_read_f32() {
        let (_storage, container) = memory_container();
        let train = Matrix::from_rows(vec![vec![0.0f32, 0.0], vec![1.0, 0.0]]).unwrap();

        container.write_f32("train", &train, false).unwrap();

        assert_eq!(container.keys().unwrap(), vec!["train"]);
        assert_eq!(container.read_f32("train").unwrap(), train);
        let info = container.info("train").unwrap();
        assert_eq!((info.dtype, info.rows, info.cols), (DType::F32, 2, 2));
    }

    #[test]
    fn test_missing_key_is_missing_input() {
        let (_storage, container) = memory_container();
        assert!(matches!(
            container.read_f32("train"),
            Err(GroundTruthError::MissingInput(_))
        ));
    }

    #[test]
    fn test_dtype_mismatch() {
        let (_storage, container) = memory_container();
        container
            .write_i64("neighbors", &Matrix::filled(1, 2, 3i64).unwrap(), false)
            .unwrap();
        assert!(matches!(
            container.read_f32("neighbors"),
            Err(GroundTruthError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_collision_requires_overwrite() {
        let (_storage, container) = memory_container();
        let m = Matrix::filled(1, 1, 0.5f32).unwrap();
        container.write_f32("test", &m, false).unwrap();

        assert!(matches!(
            container.write_f32("test", &m, false),
            Err(GroundTruthError::DatasetExists(_))
        ));
        container
            .write_f32("test", &Matrix::filled(1, 1, 2.0f32).unwrap(), true)
            .unwrap();
        assert_eq!(container.read_f32("test").unwrap().as_slice(), &[2.0]);
    }

    #[test]
    fn test_no_temp_objects_left_behind() {
        let (storage, container) = memory_container();
        container
            .write_i64("max_distance_neighbors", &Matrix::filled(2, 3, -1i64).unwrap(), false)
            .unwrap();
        assert_eq!(
            storage.list_files().unwrap(),
            vec!["max_distance_neighbors.ds"]
        );
    }

    #[test]
    fn test_corrupted_payload() {
        let (storage, container) = memory_container();
        container
            .write_f32("train", &Matrix::filled(4, 4, 1.0f32).unwrap(), false)
            .unwrap();

        let mut bytes = storage.get_raw("train.ds").unwrap();
        let last = bytes.len() - 5;
        bytes[last] ^= 0x01;
        storage.put_raw("train.ds", bytes);

        assert!(matches!(
            container.read_f32("train"),
            Err(GroundTruthError::Corrupted(_))
        ));
    }

    #[test]
    fn test_oversized_header_is_corrupted() {
        let (storage, container) = memory_container();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.push(DType::I64.code());
        bytes.extend_from_slice(&(1u64 << 62).to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        storage.put_raw("neighbors.ds", bytes);

        assert!(matches!(
            container.read_i64("neighbors"),
            Err(GroundTruthError::Corrupted(_))
        ));
        let (_dst_storage, dest) = memory_container();
        dest.copy_from(&container, "neighbors").unwrap();
        assert!(matches!(
            dest.read_i64("neighbors"),
            Err(GroundTruthError::Corrupted(_))
        ));
    }

    #[test]
    fn test_augment_copies_every_key() {
        let (_src_storage, source) = memory_container();
        source
            .write_f32("train", &Matrix::filled(3, 2, 1.0f32).unwrap(), false)
            .unwrap();
        source
            .write_i64("neighbors", &Matrix::filled(1, 3, 2i64).unwrap(), false)
            .unwrap();

        let (_dst_storage, dest) = memory_container();
        let copied = dest.augment(&source).unwrap();

        assert_eq!(copied, vec!["neighbors", "train"]);
        assert_eq!(dest.read_f32("train").unwrap(), source.read_f32("train").unwrap());
        assert_eq!(
            dest.read_i64("neighbors").unwrap(),
            source.read_i64("neighbors").unwrap()
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let (_storage, container) = memory_container();
        let m = Matrix::filled(1, 1, 0.0f32).unwrap();
        assert!(matches!(
            container.write_f32("../escape", &m, false),
            Err(GroundTruthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_writer_lock_is_exclusive() {
        let (_storage, container) = memory_container();
        let lock = container.lock_writer().unwrap();
        assert!(container.lock_writer().is_err());
        drop(lock);
        assert!(container.lock_writer().is_ok());
    }
}
