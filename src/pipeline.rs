//! End-to-end runs: read inputs, compute, write results back.
//!
//! Every run reads its inputs completely and computes everything before
//! touching the output container; a missing output directory is only created
//! once there is something to write. Writing then happens under the container's
//! exclusive writer lock as copy-then-add: when the output differs from the
//! input, all existing input datasets are copied first and the new datasets
//! are added afterwards. Output keys that already exist are rejected unless
//! overwriting was requested, and that check runs before any computation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{OutputOptions, RadialConfig, TopKConfig};
use crate::dataset::vecs::{self, VecsFormat};
use crate::dataset::{
    DType, DatasetContainer, DatasetInfo, Matrix, NEIGHBORS_KEY, RADIAL_NEIGHBORS_KEY, TEST_KEY,
    TOPK_DISTANCE_KEY, TOPK_SCORE_KEY, TRAIN_KEY,
};
use crate::error::{GroundTruthError, Result};
use crate::radial::{RadialOutput, RadialThresholdGenerator};
use crate::stats::{NeighborCountStats, ScalarStats};
use crate::topk::{RankThresholdDeriver, TopKOutput};

/// Summary of a radial run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadialRunReport {
    pub input: String,
    pub output: String,
    pub metric: String,
    pub threshold: f32,
    pub max_length: usize,
    pub num_queries: usize,
    pub num_train: usize,
    pub stats: NeighborCountStats,
    pub nan_distances: usize,
    pub copied_keys: Vec<String>,
    pub written_keys: Vec<String>,
    pub duration_ms: u64,
}

/// Summary of a rank-k run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopKRunReport {
    pub input: String,
    pub output: String,
    pub metric: String,
    pub rank: usize,
    pub num_queries: usize,
    pub distance_stats: ScalarStats,
    pub score_stats: ScalarStats,
    pub copied_keys: Vec<String>,
    pub written_keys: Vec<String>,
    pub duration_ms: u64,
}

/// Summary of a vector file import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub source: String,
    pub container: String,
    pub key: String,
    pub format: VecsFormat,
    pub dtype: DType,
    pub rows: usize,
    pub cols: usize,
}

/// Listing of a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub container: String,
    pub datasets: Vec<DatasetInfo>,
}

/// A computed dataset waiting to be written.
enum PendingDataset<'a> {
    F32(&'a str, Matrix<f32>),
    I64(&'a str, Matrix<i64>),
}

impl PendingDataset<'_> {
    fn key(&self) -> &str {
        match self {
            PendingDataset::F32(key, _) | PendingDataset::I64(key, _) => key,
        }
    }

    fn describe(&self) -> (DType, usize, usize) {
        match self {
            PendingDataset::F32(_, m) => (DType::F32, m.rows(), m.cols()),
            PendingDataset::I64(_, m) => (DType::I64, m.rows(), m.cols()),
        }
    }

    fn write(&self, container: &DatasetContainer, overwrite: bool) -> Result<()> {
        match self {
            PendingDataset::F32(key, m) => container.write_f32(key, m, overwrite),
            PendingDataset::I64(key, m) => container.write_i64(key, m, overwrite),
        }
    }
}

/// Where a run writes its datasets.
enum Destination<'a> {
    /// Back into the input container.
    Source,
    /// A separate container that already exists.
    Open(&'a DatasetContainer),
    /// A directory that does not exist yet, created at commit time.
    Pending(&'a Path),
}

impl<'a> Destination<'a> {
    fn from_target(target: Option<&'a DatasetContainer>) -> Self {
        target.map_or(Destination::Source, Destination::Open)
    }

    /// The separate output container, if it already exists.
    fn existing(&self) -> Option<&'a DatasetContainer> {
        match self {
            Destination::Open(target) => Some(*target),
            Destination::Source | Destination::Pending(_) => None,
        }
    }
}

/// Fail with `DatasetExists` if any output key is already present in the
/// input (it would be copied over) or in a separate output container.
fn check_collisions(
    source: &DatasetContainer,
    target: Option<&DatasetContainer>,
    keys: &[&str],
    overwrite: bool,
) -> Result<()> {
    if overwrite {
        return Ok(());
    }
    for key in keys {
        if source.contains(key) || target.is_some_and(|t| t.contains(key)) {
            return Err(GroundTruthError::dataset_exists(format!(
                "'{key}' (pass --overwrite to replace it)"
            )));
        }
    }
    Ok(())
}

/// Write phase: lock, copy existing datasets, add the new ones. Returns the
/// copied keys.
fn commit(
    source: &DatasetContainer,
    destination: Destination<'_>,
    datasets: &[PendingDataset],
    options: &OutputOptions,
) -> Result<Vec<String>> {
    let created;
    let target = match destination {
        Destination::Source => None,
        Destination::Open(target) => Some(target),
        Destination::Pending(path) => {
            created = DatasetContainer::create_dir(path, options.storage.clone())?;
            info!("created output container {}", path.display());
            Some(&created)
        }
    };
    let destination = target.unwrap_or(source);
    let mut lock = if options.storage.use_locking {
        Some(destination.lock_writer()?)
    } else {
        None
    };

    let copied = match target {
        Some(target) => target.augment(source)?,
        None => Vec::new(),
    };
    for dataset in datasets {
        dataset.write(destination, options.overwrite)?;
        info!("wrote '{}'", dataset.key());
    }

    if let Some(lock) = lock.as_mut() {
        lock.release()?;
    }
    Ok(copied)
}

/// Compute the radial neighbor matrix for `source` and write it into
/// `target` (or back into `source` when `target` is `None`).
pub fn radial_between(
    source: &DatasetContainer,
    target: Option<&DatasetContainer>,
    config: &RadialConfig,
    options: &OutputOptions,
) -> Result<RadialRunReport> {
    radial_into(source, Destination::from_target(target), config, options)
}

fn radial_into(
    source: &DatasetContainer,
    destination: Destination<'_>,
    config: &RadialConfig,
    options: &OutputOptions,
) -> Result<RadialRunReport> {
    let start = Instant::now();
    let generator = RadialThresholdGenerator::from_config(config)?;
    check_collisions(
        source,
        destination.existing(),
        &[RADIAL_NEIGHBORS_KEY],
        options.overwrite,
    )?;

    let train = source.read_f32(TRAIN_KEY)?;
    let test = source.read_f32(TEST_KEY)?;
    let RadialOutput {
        neighbors,
        stats,
        nan_distances,
    } = generator.generate(&train, &test)?;

    let datasets = [PendingDataset::I64(RADIAL_NEIGHBORS_KEY, neighbors.into_matrix())];
    let copied_keys = commit(source, destination, &datasets, options)?;

    Ok(RadialRunReport {
        input: String::new(),
        output: String::new(),
        metric: generator.space().to_string(),
        threshold: config.threshold,
        max_length: config.max_length,
        num_queries: test.rows(),
        num_train: train.rows(),
        stats,
        nan_distances,
        copied_keys,
        written_keys: datasets.iter().map(|d| d.key().to_string()).collect(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Derive rank-k thresholds for `source` and write them into `target` (or
/// back into `source`).
pub fn topk_between(
    source: &DatasetContainer,
    target: Option<&DatasetContainer>,
    config: &TopKConfig,
    options: &OutputOptions,
) -> Result<TopKRunReport> {
    topk_into(source, Destination::from_target(target), config, options)
}

fn topk_into(
    source: &DatasetContainer,
    destination: Destination<'_>,
    config: &TopKConfig,
    options: &OutputOptions,
) -> Result<TopKRunReport> {
    let start = Instant::now();
    let deriver = RankThresholdDeriver::from_config(config)?;
    check_collisions(
        source,
        destination.existing(),
        &[TOPK_DISTANCE_KEY, TOPK_SCORE_KEY],
        options.overwrite,
    )?;

    let train = source.read_f32(TRAIN_KEY)?;
    let test = source.read_f32(TEST_KEY)?;
    let neighbors = source.read_i64(NEIGHBORS_KEY)?;
    let output: TopKOutput = deriver.derive(&train, &test, &neighbors)?;

    let datasets = [
        PendingDataset::F32(TOPK_DISTANCE_KEY, output.distance_column()),
        PendingDataset::F32(TOPK_SCORE_KEY, output.score_column()),
    ];
    let copied_keys = commit(source, destination, &datasets, options)?;

    Ok(TopKRunReport {
        input: String::new(),
        output: String::new(),
        metric: config.space()?.to_string(),
        rank: config.rank,
        num_queries: test.rows(),
        distance_stats: output.distance_stats,
        score_stats: output.score_stats,
        copied_keys,
        written_keys: datasets.iter().map(|d| d.key().to_string()).collect(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Open the input container and hand `run` the matching destination. An
/// output directory that does not exist yet is left for `commit` to create.
fn with_containers<T>(
    input: &Path,
    output: &Path,
    options: &OutputOptions,
    run: impl FnOnce(&DatasetContainer, Destination<'_>) -> Result<T>,
) -> Result<T> {
    let source = DatasetContainer::open_dir(input, options.storage.clone())?;
    if same_location(input, output) {
        run(&source, Destination::Source)
    } else if output.is_dir() {
        let target = DatasetContainer::open_dir(output, options.storage.clone())?;
        run(&source, Destination::Open(&target))
    } else {
        run(&source, Destination::Pending(output))
    }
}

/// Radial run between two container directories.
pub fn run_radial<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &RadialConfig,
    options: &OutputOptions,
) -> Result<RadialRunReport> {
    let (input, output) = (input.as_ref(), output.as_ref());
    info!("radial run: {} -> {}", input.display(), output.display());

    let mut report = with_containers(input, output, options, |source, destination| {
        radial_into(source, destination, config, options)
    })?;
    report.input = input.display().to_string();
    report.output = output.display().to_string();
    Ok(report)
}

/// Rank-k run between two container directories.
pub fn run_topk<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &TopKConfig,
    options: &OutputOptions,
) -> Result<TopKRunReport> {
    let (input, output) = (input.as_ref(), output.as_ref());
    info!("rank-k run: {} -> {}", input.display(), output.display());

    let mut report = with_containers(input, output, options, |source, destination| {
        topk_into(source, destination, config, options)
    })?;
    report.input = input.display().to_string();
    report.output = output.display().to_string();
    Ok(report)
}

/// Import a `.fvecs` / `.ivecs` / `.bvecs` file as dataset `key`.
///
/// The format is taken from `format` or guessed from the file extension.
/// `.ivecs` files become `i64` datasets, the other two `f32`.
pub fn import_vecs<P: AsRef<Path>, Q: AsRef<Path>>(
    file: P,
    container: Q,
    key: &str,
    format: Option<VecsFormat>,
    limit: Option<usize>,
    options: &OutputOptions,
) -> Result<ImportReport> {
    let (file, container_path) = (file.as_ref(), container.as_ref());
    let format = format
        .or_else(|| VecsFormat::from_path(file))
        .ok_or_else(|| {
            GroundTruthError::invalid_config(format!(
                "cannot tell the format of {}; pass --format-hint",
                file.display()
            ))
        })?;

    crate::dataset::container::validate_key(key)?;
    if !options.overwrite
        && container_path.is_dir()
        && DatasetContainer::open_dir(container_path, options.storage.clone())?.contains(key)
    {
        return Err(GroundTruthError::dataset_exists(key));
    }

    let dataset = match format {
        VecsFormat::Fvecs => PendingDataset::F32(key, vecs::read_fvecs(file, limit)?),
        VecsFormat::Bvecs => PendingDataset::F32(key, vecs::read_bvecs(file, limit)?),
        VecsFormat::Ivecs => PendingDataset::I64(key, vecs::read_ivecs(file, limit)?),
    };
    let (dtype, rows, cols) = dataset.describe();

    let container = DatasetContainer::create_dir(container_path, options.storage.clone())?;
    let mut lock = if options.storage.use_locking {
        Some(container.lock_writer()?)
    } else {
        None
    };
    dataset.write(&container, options.overwrite)?;
    if let Some(lock) = lock.as_mut() {
        lock.release()?;
    }
    info!(
        "imported {} as '{key}' ({rows}x{cols} {dtype})",
        file.display()
    );

    Ok(ImportReport {
        source: file.display().to_string(),
        container: container_path.display().to_string(),
        key: key.to_string(),
        format,
        dtype,
        rows,
        cols,
    })
}

/// List the datasets of a container directory.
pub fn inspect<P: AsRef<Path>>(container: P, options: &OutputOptions) -> Result<InspectReport> {
    let path: PathBuf = container.as_ref().to_path_buf();
    let container = DatasetContainer::open_dir(&path, options.storage.clone())?;
    Ok(InspectReport {
        container: path.display().to_string(),
        datasets: container.list()?,
    })
}
