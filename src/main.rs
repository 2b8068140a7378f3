//! bomgraph - Resolve product cells of a workbook corpus into BOM trees.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use bomgraph_core::config::Config;
use bomgraph_core::report::{ClassificationSummary, extract_relationships};
use bomgraph_core::storage::mapping::{mapping_from_workbook, save_mapping};
use bomgraph_core::storage::results::read_results;
use bomgraph_core::storage::{FileIndex, ProductMapper, ResultStore, read_batch_requests};
use bomgraph_core::BatchRunner;

const DEFAULT_OUTPUT: &str = "Logs/log.json";
const DEFAULT_MAPPING: &str = "Mappings/product_mapping.json";

#[derive(Parser)]
#[command(name = "bomgraph")]
#[command(version, about = "Resolve spreadsheet product cells into bill-of-materials trees")]
struct Cli {
    /// Config file (default: the per-user bomgraph/config.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write a DEBUG log to this file, truncated on start
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every request of a batch file and save the trees as JSON
    Resolve {
        /// Control spreadsheet (Product_Id, File, Tab, Cell)
        #[arg(long)]
        batch: Option<PathBuf>,

        /// Folder searched recursively for workbooks
        #[arg(long)]
        base_path: Option<PathBuf>,

        /// Result JSON (default: Logs/log.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Product mapping JSON (default: Mappings/product_mapping.json)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Maximum recursion depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Stop descending at formulas containing `*`
        #[arg(long)]
        stop_on_multiplication: bool,
    },

    /// Generate the product mapping JSON from an "All Products" sheet
    Map {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarize product relationships of a result JSON
    Relationships {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let console = fmt::layer().with_writer(std::io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    );

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("installing log subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }
    init_logging(config.log_file.as_deref())?;

    match cli.command {
        Commands::Resolve {
            batch,
            base_path,
            output,
            mapping,
            max_depth,
            stop_on_multiplication,
        } => {
            config.batch_file = batch.or(config.batch_file);
            config.base_path = base_path.or(config.base_path);
            config.output = output.or(config.output);
            config.mapping = mapping.or(config.mapping);
            if let Some(depth) = max_depth {
                config.resolver.max_recursion_depth = depth;
            }
            if stop_on_multiplication {
                config.resolver.stop_on_multiplication = true;
            }
            resolve(&config)
        }
        Commands::Map { input, output } => map(&input, &output),
        Commands::Relationships { input, output } => relationships(&input, &output),
    }
}

fn resolve(config: &Config) -> Result<()> {
    let Some(batch_file) = config.batch_file.as_deref() else {
        bail!("no batch file: pass --batch or set batch_file in the config");
    };
    let Some(base_path) = config.base_path.as_deref() else {
        bail!("no workbook folder: pass --base-path or set base_path in the config");
    };
    let output = config
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let mapping = config
        .mapping
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPING));

    let base_material = &config.workbooks.base_material_file;
    let mapper = match ProductMapper::load(&mapping, base_material) {
        Ok(mapper) => mapper,
        Err(err) => {
            tracing::error!(path = %mapping.display(), error = %err, "product mapping not loaded");
            ProductMapper::new(Default::default(), base_material)
        }
    };

    let requests = read_batch_requests(batch_file)
        .with_context(|| format!("reading batch file {}", batch_file.display()))?;
    println!("Starting processing of {} products...", requests.len());

    let index = FileIndex::build(base_path)
        .with_context(|| format!("indexing {}", base_path.display()))?;
    let mut runner = BatchRunner::from_config(config, index, mapper);
    let results = runner.run(&requests);

    ResultStore::new(&output)
        .save(&results)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = ClassificationSummary::from_trees(&results);
    println!();
    println!("Final Classification Summary:");
    println!("{}", summary);
    Ok(())
}

fn map(input: &Path, output: &Path) -> Result<()> {
    let mapping = mapping_from_workbook(input)
        .with_context(|| format!("reading products from {}", input.display()))?;
    save_mapping(output, &mapping).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} products to {}",
        mapping.len(),
        output.display()
    );
    Ok(())
}

fn relationships(input: &Path, output: &Path) -> Result<()> {
    let results =
        read_results(input).with_context(|| format!("reading results {}", input.display()))?;
    let summary = extract_relationships(&results);
    let file =
        File::create(output).with_context(|| format!("creating {}", output.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summary)?;
    println!(
        "Wrote relationships for {} products to {}",
        summary.products.len(),
        output.display()
    );
    Ok(())
}
