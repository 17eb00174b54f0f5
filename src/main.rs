use anyhow::Context;
use clap::{Parser, Subcommand};
use reference_alignment::config::{load_config, ConfigFormat};
use reference_alignment::logging::init_logging;
use reference_alignment::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "refalign")]
#[command(about = "Find the reference volume an input was cropped from and reproduce the crop")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Align an input volume against one reference volume
    Shift {
        /// Input volume file, or a directory of image slices
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset inside the input file
        #[arg(long, default_value = "/reference")]
        input_dataset: String,

        /// Reference volume file
        #[arg(short, long)]
        reference: PathBuf,

        /// Dataset inside the reference file
        #[arg(long, default_value = "/reference")]
        reference_dataset: String,

        /// Number of random slices to sample (0 = every slice)
        #[arg(short, long)]
        sampling: Option<usize>,

        /// Treat volumes with different depths as incompatible
        /// (`--strict true` or `--strict false`; the config decides otherwise)
        #[arg(long)]
        strict: Option<bool>,
    },

    /// Search a folder for the reference that best matches the input
    Find {
        /// Input volume file, or a directory of image slices
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset inside the input file
        #[arg(long, default_value = "/reference")]
        input_dataset: String,

        /// Folder searched recursively for candidate files
        #[arg(short = 'S', long)]
        search_folder: PathBuf,

        /// Only consider paths containing this string
        #[arg(short, long)]
        filter: Option<String>,

        /// Number of worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Write the search report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Find the reference and write its cropped training datasets
    Crop {
        /// Input volume file, or a directory of image slices
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset inside the input file
        #[arg(long, default_value = "/reference")]
        input_dataset: String,

        /// Folder searched recursively for candidate files
        #[arg(short = 'S', long)]
        search_folder: PathBuf,

        /// Only consider paths containing this string
        #[arg(short, long)]
        filter: Option<String>,

        /// File holding the label dataset
        #[arg(short, long)]
        labels: Option<PathBuf>,

        /// Output folder for the training file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of worker threads
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Write the default configuration
    Config {
        /// Destination file; `.json` selects JSON, anything else TOML
        #[arg(short, long, default_value = "refalign.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    config.logging = config.logging.clone().with_verbosity(cli.verbose);

    // Held until exit so the file writer flushes.
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Shift {
            input,
            input_dataset,
            reference,
            reference_dataset,
            sampling,
            strict,
        } => {
            apply_shift_overrides(&mut config, sampling, strict);
            handle_shift(&config, &input, &input_dataset, &reference, &reference_dataset)?;
        }
        Commands::Find {
            input,
            input_dataset,
            search_folder,
            filter,
            threads,
            output,
        } => {
            apply_search_overrides(&mut config, filter, threads);
            handle_find(&config, &input, &input_dataset, &search_folder, output)?;
        }
        Commands::Crop {
            input,
            input_dataset,
            search_folder,
            filter,
            labels,
            output,
            threads,
        } => {
            apply_search_overrides(&mut config, filter, threads);
            handle_crop(&config, &input, &input_dataset, search_folder, labels, output)?;
        }
        Commands::Config { output } => {
            handle_config(&config, &output)?;
        }
    }

    Ok(())
}

fn apply_shift_overrides(config: &mut Config, sampling: Option<usize>, strict: Option<bool>) {
    if let Some(sampling) = sampling {
        config.alignment.sample_count = sampling;
    }
    if let Some(strict) = strict {
        config.alignment.strict = strict;
    }
}

fn apply_search_overrides(config: &mut Config, filter: Option<String>, threads: Option<usize>) {
    if let Some(filter) = filter {
        config.search.filter = filter;
    }
    if let Some(threads) = threads {
        config.search.workers = threads;
    }
}

fn input_source(path: &Path, dataset: &str) -> InputSource {
    if path.is_dir() {
        InputSource::ImageStack(path.to_path_buf())
    } else {
        InputSource::Archive {
            path: path.to_path_buf(),
            dataset: dataset.to_string(),
        }
    }
}

fn handle_shift(
    config: &Config,
    input: &Path,
    input_dataset: &str,
    reference: &Path,
    reference_dataset: &str,
) -> anyhow::Result<()> {
    let store = ArchiveStore::new();
    let input = input_source(input, input_dataset).load(&store)?;
    let reference = store.open(reference, reference_dataset)?;

    let aligner = VolumeAligner::from_config(config)?;
    let alignment = aligner.align(
        &input,
        &reference,
        config.alignment.sample_count,
        config.alignment.strict,
    )?;
    println!("{}", serde_json::to_string_pretty(&alignment)?);
    Ok(())
}

fn handle_find(
    config: &Config,
    input: &Path,
    input_dataset: &str,
    search_folder: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store: Arc<dyn VolumeStore> = Arc::new(ArchiveStore::new());
    let input = input_source(input, input_dataset).load(store.as_ref())?;
    let files = scan_candidates(search_folder, &config.search.extension, &config.search.filter)?;
    let candidates: Vec<CandidateRef> = files
        .into_iter()
        .map(|path| CandidateRef::new(path, config.search.reference_dataset.clone()))
        .collect();

    let search = CandidateSearch::from_config(store, config)?;
    let report = search.search(&input, &candidates);

    match &report.winner {
        Some((candidate, alignment)) => println!("Best reference: {} {}", candidate, alignment),
        None => println!("No reference matches the input"),
    }
    if let Some(path) = output {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

fn handle_crop(
    config: &Config,
    input: &Path,
    input_dataset: &str,
    search_folder: PathBuf,
    labels: Option<PathBuf>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let store: Arc<dyn VolumeStore> = Arc::new(ArchiveStore::new());
    let finder = CropFinder::from_config(store, config)?;
    let request = CropRequest {
        input: input_source(input, input_dataset),
        search_folder,
        label_file: labels,
        output_folder: output,
    };

    match finder.run(&request)? {
        Some(report) => {
            println!(
                "The input comes from {} cropped {}",
                report.reference, report.alignment
            );
            println!("Wrote {} to {}", report.written.join(", "), report.output.display());
        }
        None => println!("No reference matches the input, nothing written"),
    }
    Ok(())
}

fn handle_config(config: &Config, output: &Path) -> anyhow::Result<()> {
    let format = match output.extension().and_then(|e| e.to_str()) {
        Some("json") => ConfigFormat::Json,
        _ => ConfigFormat::Toml,
    };
    config.save_to_file(output, format)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}
