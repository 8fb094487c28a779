//! Readers for the `.fvecs` / `.ivecs` / `.bvecs` formats used by the classic
//! ANN benchmark corpora (SIFT, GIST, Deep1B, ...).
//!
//! Every record is a little-endian `u32` dimension followed by that many
//! components (`f32`, `i32` or `u8`). All records in a file must share one
//! dimension.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::dataset::matrix::Matrix;
use crate::error::{GroundTruthError, Result};

/// Supported vector file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VecsFormat {
    Fvecs,
    Ivecs,
    Bvecs,
}

impl VecsFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "fvecs" => Some(VecsFormat::Fvecs),
            "ivecs" => Some(VecsFormat::Ivecs),
            "bvecs" => Some(VecsFormat::Bvecs),
            _ => None,
        }
    }
}

/// Read an `.fvecs` file, keeping at most `limit` vectors.
pub fn read_fvecs<P: AsRef<Path>>(path: P, limit: Option<usize>) -> Result<Matrix<f32>> {
    let (mut reader, len) = open(path.as_ref())?;
    read_records(&mut reader, limit, max_dimension(len, 4), |r, dim, out| {
        let start = out.len();
        out.resize(start + dim, 0.0);
        r.read_f32_into::<LittleEndian>(&mut out[start..])
    })
}

/// Read a `.bvecs` file, widening each byte component to `f32`.
pub fn read_bvecs<P: AsRef<Path>>(path: P, limit: Option<usize>) -> Result<Matrix<f32>> {
    let (mut reader, len) = open(path.as_ref())?;
    let mut bytes = Vec::new();
    read_records(&mut reader, limit, max_dimension(len, 1), |r, dim, out| {
        bytes.resize(dim, 0);
        r.read_exact(&mut bytes)?;
        out.extend(bytes.iter().map(|&b| b as f32));
        Ok(())
    })
}

/// Read an `.ivecs` file, widening each component to `i64`.
pub fn read_ivecs<P: AsRef<Path>>(path: P, limit: Option<usize>) -> Result<Matrix<i64>> {
    let (mut reader, len) = open(path.as_ref())?;
    let mut ints = Vec::new();
    read_records(&mut reader, limit, max_dimension(len, 4), |r, dim, out| {
        ints.resize(dim, 0);
        r.read_i32_into::<LittleEndian>(&mut ints)?;
        out.extend(ints.iter().map(|&v| v as i64));
        Ok(())
    })
}

/// A buffered reader and the file length in bytes.
fn open(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            GroundTruthError::missing_input(path.display().to_string())
        } else {
            GroundTruthError::Io(e)
        }
    })?;
    let len = file.metadata()?.len();
    Ok((BufReader::new(file), len))
}

/// Largest dimension a single record of `width`-byte components can claim in
/// a file of `len` bytes.
fn max_dimension(len: u64, width: u64) -> usize {
    usize::try_from(len.saturating_sub(4) / width).unwrap_or(usize::MAX)
}

/// The next record's dimension, or `None` at a clean end of file.
fn read_dimension<R: Read>(reader: &mut R, row: usize) -> Result<Option<usize>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(LittleEndian::read_u32(&header) as usize)),
        n => Err(GroundTruthError::corrupted(format!(
            "record {row} ends after {n} of 4 dimension bytes"
        ))),
    }
}

fn read_records<R, T, F>(
    reader: &mut R,
    limit: Option<usize>,
    max_dim: usize,
    mut read_body: F,
) -> Result<Matrix<T>>
where
    R: Read,
    T: Copy,
    F: FnMut(&mut R, usize, &mut Vec<T>) -> std::io::Result<()>,
{
    let mut data = Vec::new();
    let mut dim: Option<usize> = None;
    let mut rows = 0usize;

    while limit.is_none_or(|l| rows < l) {
        let Some(record_dim) = read_dimension(reader, rows)? else {
            break;
        };
        if record_dim > max_dim {
            return Err(GroundTruthError::corrupted(format!(
                "record {rows} claims dimension {record_dim}, more than the file holds"
            )));
        }

        match dim {
            None => dim = Some(record_dim),
            Some(d) if d != record_dim => {
                return Err(GroundTruthError::shape_mismatch(format!(
                    "record {rows} has dimension {record_dim}, expected {d}"
                )));
            }
            Some(_) => {}
        }

        read_body(reader, record_dim, &mut data).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                GroundTruthError::corrupted(format!("record {rows} is truncated"))
            } else {
                GroundTruthError::Io(e)
            }
        })?;
        rows += 1;
    }

    Matrix::new(rows, dim.unwrap_or(0), data)
}
