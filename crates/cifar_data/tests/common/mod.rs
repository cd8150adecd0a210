#![allow(dead_code)]

use cifar_data::cifar::format::{
    parse_records, DATA_DIR, META_FILE, RECORD_SIZE, TEST_FILE, TRAIN_FILES,
};
use cifar_data::transforms::Transform;
use cifar_data::{Cifar10Options, CifarImage, MiniBatch, Sample, LABELS, PIXEL_VALUES};

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::Path;
use tch::Tensor;
use tempfile::TempDir;

/// Turns an integer record into a sample whose `"labels"` feature is the record itself.
pub struct IdToSample;
impl Transform<i64, Sample> for IdToSample {
    fn apply(&self, input: i64) -> Result<Sample> {
        Ok(Sample::from_single(LABELS, Tensor::from(input)))
    }
}

/// The `"labels"` of a batch produced with [`IdToSample`].
pub fn batch_labels(batch: &MiniBatch) -> Result<Vec<i64>> {
    Ok(Vec::<i64>::try_from(batch.get(LABELS)?)?)
}

pub const CLASS_NAMES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Records per synthetic train file (5 files) and in the test file.
pub const TRAIN_PER_FILE: usize = 8;
pub const TEST_RECORDS: usize = 12;
pub const TRAIN_RECORDS: usize = TRAIN_PER_FILE * 5;

/// One binary record for the record numbered `id` within its partition.
///
/// - label: `id % 10`
/// - red plane: `id + 1` at (x=0, y=0), zero elsewhere, so a flip moves the marker to x=31
/// - green plane: `label * 20` everywhere
/// - blue plane: zero
pub fn record_bytes(id: usize) -> Vec<u8> {
    assert!(id < 255, "marker must fit in a byte");
    let label = (id % 10) as u8;
    let mut bytes = vec![0u8; RECORD_SIZE];
    bytes[0] = label;
    bytes[1] = id as u8 + 1;
    let green = 1 + 1024;
    bytes[green..green + 1024].fill(label * 20);
    bytes
}

/// Writes `<root>/cifar-10-batches-bin/` with small train and test files.
pub fn write_cifar_tree(root: &Path) -> Result<()> {
    let dir = root.join(DATA_DIR);
    fs::create_dir_all(&dir)?;

    for (file_index, file) in TRAIN_FILES.iter().enumerate() {
        let bytes: Vec<u8> = (0..TRAIN_PER_FILE)
            .flat_map(|i| record_bytes(file_index * TRAIN_PER_FILE + i))
            .collect();
        fs::write(dir.join(file), bytes)?;
    }

    let test: Vec<u8> = (0..TEST_RECORDS).flat_map(record_bytes).collect();
    fs::write(dir.join(TEST_FILE), test)?;

    fs::write(dir.join(META_FILE), CLASS_NAMES.join("\n") + "\n\n")?;
    Ok(())
}

/// Writes a `.tar.gz` holding the same tree as [`write_cifar_tree`].
pub fn write_cifar_archive(path: &Path) -> Result<()> {
    let tree = tempfile::tempdir()?;
    write_cifar_tree(tree.path())?;

    let encoder = GzEncoder::new(fs::File::create(path)?, Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(DATA_DIR, tree.path().join(DATA_DIR))?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Decoded records `0..n` without touching the filesystem.
pub fn synthetic_images(n: usize) -> Result<Vec<CifarImage>> {
    let bytes: Vec<u8> = (0..n).flat_map(record_bytes).collect();
    Ok(parse_records(&bytes, Path::new("synthetic.bin"))?)
}

/// A temp dir holding a synthetic dataset, plus options that never touch the network.
pub fn synthetic_dataset() -> Result<(TempDir, Cifar10Options)> {
    let dir = tempfile::tempdir()?;
    write_cifar_tree(dir.path())?;
    let options = Cifar10Options::new(dir.path()).download(false);
    Ok((dir, options))
}

/// Reads `(id, flipped)` back from a `[3, 32, 32]` image tensor in [0, 1].
pub fn marker(pixels: &Tensor) -> (usize, bool) {
    let red = pixels.select(0, 0);
    let left = red.double_value(&[0, 0]);
    if left > 0.0 {
        ((left * 255.0).round() as usize - 1, false)
    } else {
        let right = red.double_value(&[0, 31]);
        ((right * 255.0).round() as usize - 1, true)
    }
}

/// Record ids of every sample in `batch`, in batch order.
pub fn batch_ids(batch: &MiniBatch) -> Result<Vec<usize>> {
    let pixels = batch.get(PIXEL_VALUES)?;
    let n = pixels.size()[0];
    Ok((0..n).map(|i| marker(&pixels.get(i)).0).collect())
}

/// Record ids of every sample the loader yields in one epoch.
pub fn epoch_ids<Raw>(loader: &cifar_data::DataLoader<cifar_data::InMemoryDataset<Raw>>) -> Result<Vec<usize>>
where
    Raw: Clone + Send + Sync + 'static,
{
    let mut ids = Vec::new();
    for batch in loader.iter()? {
        ids.extend(batch_ids(&batch?)?);
    }
    Ok(ids)
}
