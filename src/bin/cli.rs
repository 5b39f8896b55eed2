use clap::{Args, Parser, Subcommand};
use paged_bloom_rs::{
    BatchOptions, FilterConfigBuilder, PagedBloomFilter, calculate_parameters,
    common::bytes2hr,
};
use serde_json::{Value, json};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the derived filter parameters for a given sizing
    Calc {
        /// Expected number of elements
        #[arg(short, long)]
        expected: usize,

        /// False positive rate (between 0 and 1)
        #[arg(short, long, default_value = "0.01")]
        fpr: f64,
    },

    /// Add a record to a filter file
    Add {
        #[command(flatten)]
        filter: FilterArgs,

        /// Record as a JSON object
        #[arg(short, long)]
        record: String,
    },

    /// Check whether a record might be in a filter file
    Check {
        #[command(flatten)]
        filter: FilterArgs,

        /// Record as a JSON object
        #[arg(short, long)]
        record: String,
    },

    /// Seed a demo filter and run timed operations against it
    Demo {
        /// Path to the filter file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Path to the filter file
    #[arg(short, long)]
    file: PathBuf,

    /// Expected number of elements
    #[arg(short, long, default_value = "10000")]
    expected: usize,

    /// False positive rate (between 0 and 1)
    #[arg(long, default_value = "0.01")]
    fpr: f64,

    /// Comma-separated attribute names, in schema order
    #[arg(short, long, value_delimiter = ',')]
    attributes: Vec<String>,

    /// Override the derived number of hash functions
    #[arg(long)]
    hash_count: Option<usize>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,
}

impl FilterArgs {
    fn open_filter(&self) -> Result<PagedBloomFilter, Box<dyn std::error::Error>> {
        let mut builder = FilterConfigBuilder::default()
            .path(self.file.clone())
            .expected_elements(self.expected)
            .false_positive_rate(self.fpr)
            .attributes(self.attributes.clone());
        if let Some(count) = self.hash_count {
            builder = builder.hash_count(count);
        }
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size_bytes(size);
        }
        let config = builder.build().expect("Failed to build filter config");

        let mut filter = PagedBloomFilter::new(config)?;
        filter.open()?;
        Ok(filter)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Calc { expected, fpr } => {
            let (total_bits, hash_count) = calculate_parameters(*expected, *fpr);
            println!("Derived filter parameters:");
            println!("  Expected elements: {expected}");
            println!("  False positive rate: {fpr}");
            println!("  Bit array size: {total_bits} bits");
            println!("  Hash functions: {hash_count}");
            println!("  File size: {}", bytes2hr(total_bits.div_ceil(8) as u64));
        }
        Commands::Add { filter, record } => {
            let value: Value = serde_json::from_str(record)?;
            let mut filter = filter.open_filter()?;
            filter.add(&value)?;
            filter.close()?;
            println!("Record added");
        }
        Commands::Check { filter, record } => {
            let value: Value = serde_json::from_str(record)?;
            let mut filter = filter.open_filter()?;
            let present = filter.test(&value)?;
            filter.close()?;
            if present {
                println!("Possibly in set");
            } else {
                println!("Definitely not in set");
            }
        }
        Commands::Demo { file } => {
            run_demo(file)?;
        }
    }

    Ok(())
}

fn run_demo(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    const EXPECTED: usize = 1_000_000;
    const FPR: f64 = 0.001;

    let config = FilterConfigBuilder::default()
        .path(file.to_path_buf())
        .expected_elements(EXPECTED)
        .false_positive_rate(FPR)
        .attributes(vec!["email".to_string(), "password".to_string()])
        .chunk_size_bytes(256 * 1024usize)
        .build()
        .expect("Failed to build filter config");

    let mut filter = PagedBloomFilter::new(config)?;
    filter.open()?;

    println!("Demo filter at {}", file.display());
    println!("  Bits: {}", filter.total_bits());
    println!("  Hashes: {}", filter.hash_count());
    println!("  Chunks: {}", filter.total_chunks());
    println!(
        "  File size: {}",
        bytes2hr(filter.params().total_bytes as u64)
    );

    let started = Instant::now();
    for i in 0..100 {
        filter.add(&json!({
            "email": format!("user{i}@example.com"),
            "password": format!("hunter{i:02}"),
        }))?;
    }
    println!("\nAdded 100 records durably in {:?}", started.elapsed());

    let batch: Vec<Value> = (100..10_100)
        .map(|i| {
            json!({
                "email": format!("user{i}@example.com"),
                "password": format!("hunter{i}"),
            })
        })
        .collect();
    let started = Instant::now();
    filter.add_batch(&batch, BatchOptions { dangerously: true })?;
    println!(
        "Added {} records in one dangerous batch in {:?}",
        batch.len(),
        started.elapsed()
    );

    println!("\nSpot checks:");
    let probes = [
        (
            "inserted record",
            json!({"email": "user1@example.com", "password": "hunter01"}),
        ),
        (
            "batched record",
            json!({"email": "user5000@example.com", "password": "hunter5000"}),
        ),
        (
            "never inserted",
            json!({"email": "nobody@example.com", "password": "letmein"}),
        ),
    ];
    for (label, record) in &probes {
        let verdict = if filter.test(record)? {
            "possibly in set"
        } else {
            "definitely not in set"
        };
        println!("  {label}: {verdict}");
    }

    filter.close()?;
    Ok(())
}
