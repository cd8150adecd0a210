//! Runs the full CIFAR-10 preparation pipeline once and reports what it built.
//!
//! ```text
//! cifar-stats --root CIFAR10 --batch-size 128 --device cuda --subset 5000
//! ```

use anyhow::Result;
use cifar_data::cifar::format::RECORDS_PER_FILE;
use cifar_data::transforms::vision::{Normalize, RandomCrop, RandomHorizontalFlip, ToTensor};
use cifar_data::transforms::{ImageClassificationPipeline, Transform};
use cifar_data::{
    get_loaders, load_raw_with_subsets, load_transformed_with_subsets, parse_device,
    train_mean_std, Cifar10Options, LABELS, PIXEL_VALUES,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dataset directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// JSON file with dataset options; `--root` and `--no-download` override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Batch size for the statistics pass and the loaders
    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    /// cpu, cuda, cuda:N, mps or vulkan
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Only use the first N records of each partition
    #[arg(long)]
    subset: Option<usize>,

    /// Fail instead of downloading a missing dataset
    #[arg(long)]
    no_download: bool,

    /// Also write the computed statistics to this JSON file
    #[arg(long)]
    save_stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let device = parse_device(&args.device)?;

    let mut options = match &args.config {
        Some(path) => Cifar10Options::from_json_file(path)?,
        None => Cifar10Options::default(),
    };
    if let Some(root) = args.root {
        options = options.root(root);
    }
    if args.no_download {
        options = options.download(false);
    }

    let train_subset: Option<Vec<usize>> = args.subset.map(|n| (0..n).collect());
    let test_subset: Option<Vec<usize>> =
        args.subset.map(|n| (0..n.min(RECORDS_PER_FILE)).collect());

    let raw = load_raw_with_subsets(&options, train_subset.as_deref(), test_subset.as_deref())?;
    info!(
        train = raw.train.len(),
        test = raw.test.len(),
        classes = raw.class_to_idx.len(),
        "raw partitions ready"
    );

    let stats = train_mean_std(&raw.train, args.batch_size)?;
    println!("Mean: {:?}", stats.mean);
    println!("Std Dev: {:?}", stats.std);
    if let Some(path) = &args.save_stats {
        stats.to_json_file(path)?;
        info!(path = %path.display(), "saved statistics");
    }

    let train_pipeline = ImageClassificationPipeline::new(
        RandomCrop::new(32, 4)?
            .then(RandomHorizontalFlip::new(0.5)?)
            .then(ToTensor)
            .then(Normalize::from_stats(&stats)?),
    );
    let test_pipeline =
        ImageClassificationPipeline::new(ToTensor.then(Normalize::from_stats(&stats)?));

    let (train, test) = load_transformed_with_subsets(
        &options,
        train_pipeline,
        test_pipeline,
        train_subset.as_deref(),
        test_subset.as_deref(),
    )?;
    let (train_loader, test_loader) = get_loaders(args.batch_size, device, train, test)?;

    for (name, loader) in [("train", &train_loader), ("test", &test_loader)] {
        let start = Instant::now();
        let mut samples = 0i64;
        for batch in loader.iter()? {
            let batch = batch?.to_device(device);
            samples += batch.batch_size()?;
            batch.get(PIXEL_VALUES)?;
            batch.get(LABELS)?;
        }
        println!(
            "{}: {} batches, {} samples in {:.2?}",
            name,
            loader.len(),
            samples,
            start.elapsed()
        );
    }

    for (class, label) in raw.class_to_idx.iter() {
        println!("{:>2} {}", label, class);
    }
    Ok(())
}
