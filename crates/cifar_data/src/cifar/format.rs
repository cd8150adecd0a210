//! The CIFAR-10 binary format.
//!
//! Every record is one label byte followed by a 32x32 image stored
//! channel-planar: 1024 red bytes, 1024 green, 1024 blue, rows top to bottom.
//! See <https://www.cs.toronto.edu/~kriz/cifar.html>.

use super::error::CifarError;
use super::CifarImage;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const WIDTH: usize = 32;
pub const HEIGHT: usize = 32;
pub const CHANNELS: usize = 3;
const PLANE: usize = WIDTH * HEIGHT;
pub const RECORD_SIZE: usize = 1 + PLANE * CHANNELS;
pub const RECORDS_PER_FILE: usize = 10_000;
pub const NUM_CLASSES: usize = 10;

/// Directory created by unpacking the official archive.
pub const DATA_DIR: &str = "cifar-10-batches-bin";
pub const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
pub const TEST_FILE: &str = "test_batch.bin";
pub const META_FILE: &str = "batches.meta.txt";

/// Decodes every record of a batch file held in memory.
///
/// `path` only labels errors.
pub fn parse_records(bytes: &[u8], path: &Path) -> Result<Vec<CifarImage>, CifarError> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(CifarError::Truncated {
            path: path.to_path_buf(),
            len: bytes.len(),
            record_size: RECORD_SIZE,
        });
    }

    bytes
        .chunks_exact(RECORD_SIZE)
        .enumerate()
        .map(|(record, chunk)| {
            let label = chunk[0];
            if usize::from(label) >= NUM_CLASSES {
                return Err(CifarError::BadLabel {
                    path: path.to_path_buf(),
                    record,
                    label,
                    num_classes: NUM_CLASSES,
                });
            }
            Ok(CifarImage {
                image: planar_to_rgb(&chunk[1..]),
                label,
            })
        })
        .collect()
}

// Planar RRR..GGG..BBB.. to interleaved RGBRGB..
fn planar_to_rgb(planes: &[u8]) -> RgbImage {
    let (red, rest) = planes.split_at(PLANE);
    let (green, blue) = rest.split_at(PLANE);
    RgbImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| {
        let i = y as usize * WIDTH + x as usize;
        image::Rgb([red[i], green[i], blue[i]])
    })
}

/// Reads and decodes one batch file.
pub fn read_batch_file(path: &Path) -> Result<Vec<CifarImage>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    let records = parse_records(&bytes, path)?;
    debug!(path = %path.display(), records = records.len(), "read CIFAR batch file");
    Ok(records)
}

/// Reads and concatenates several batch files under `dir`, in order.
pub fn read_partition(dir: &Path, files: &[&str]) -> Result<Vec<CifarImage>> {
    let mut records = Vec::with_capacity(files.len() * RECORDS_PER_FILE);
    for file in files {
        records.extend(read_batch_file(&dir.join(file))?);
    }
    Ok(records)
}

/// Class names and their integer labels, in label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    names: Vec<String>,
}

impl ClassMapping {
    /// Builds the mapping from names listed in label order.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            bail!("Class mapping needs at least one class name");
        }
        if names.len() > usize::from(u8::MAX) + 1 {
            bail!("Too many classes for u8 labels: {}", names.len());
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                bail!("Duplicate class name '{}'", name);
            }
        }
        Ok(Self { names })
    }

    /// Parses `batches.meta.txt`: one class name per line, blank lines ignored.
    pub fn from_meta_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read class names from '{}'", path.display()))?;
        Self::from_names(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
        .with_context(|| format!("Invalid class names in '{}'", path.display()))
    }

    /// Label of the class called `name`.
    pub fn label(&self, name: &str) -> Option<u8> {
        self.names.iter().position(|n| n == name).map(|i| i as u8)
    }

    /// Name of the class with `label`.
    pub fn name(&self, label: u8) -> Option<&str> {
        self.names.get(usize::from(label)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(name, label)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: u8, fill: impl Fn(usize) -> u8) -> Vec<u8> {
        let mut bytes = vec![label];
        bytes.extend((0..PLANE * CHANNELS).map(fill));
        bytes
    }

    #[test]
    fn test_parses_planar_records() -> Result<()> {
        let mut bytes = record(3, |i| (i / PLANE) as u8 * 100);
        bytes.extend(record(9, |i| (i % 256) as u8));

        let records = parse_records(&bytes, Path::new("mem.bin"))?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, 3);
        assert_eq!(records[0].image.get_pixel(5, 7).0, [0, 100, 200]);
        assert_eq!(records[1].label, 9);
        // pixel (x=1, y=0) sits at offset 1 of each plane
        assert_eq!(records[1].image.get_pixel(1, 0).0, [1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_rejects_truncated_and_bad_labels() {
        let mut short = record(0, |_| 0);
        short.pop();
        assert!(matches!(
            parse_records(&short, Path::new("short.bin")),
            Err(CifarError::Truncated { len, .. }) if len == RECORD_SIZE - 1
        ));

        let bad = record(10, |_| 0);
        assert!(matches!(
            parse_records(&bad, Path::new("bad.bin")),
            Err(CifarError::BadLabel { label: 10, record: 0, .. })
        ));
    }

    #[test]
    fn test_class_mapping() -> Result<()> {
        let mapping = ClassMapping::from_names(["airplane", "automobile", "bird"])?;

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.label("bird"), Some(2));
        assert_eq!(mapping.name(1), Some("automobile"));
        assert!(mapping.label("truck").is_none());
        assert!(mapping.name(3).is_none());
        assert_eq!(
            mapping.iter().collect::<Vec<_>>(),
            vec![("airplane", 0), ("automobile", 1), ("bird", 2)]
        );

        assert!(ClassMapping::from_names(Vec::<String>::new()).is_err());
        assert!(ClassMapping::from_names(["cat", "cat"]).is_err());
        Ok(())
    }
}
