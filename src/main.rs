use clap::{Parser, Subcommand};
use imgpress::{config, output, process, report, source};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Shared arguments for commands that run the pipeline.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Image files or directories (searched recursively)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print results as JSON instead of progress lines
    #[arg(long)]
    json: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgpress")]
#[command(about = "Adaptive image compression to AVIF with a JPEG fallback")]
#[command(long_about = "\
Adaptive image compression to AVIF with a JPEG fallback

Each input becomes one file in the output directory:

  photo.png   →  processed/photo.avif       (ffmpeg, libaom-av1)
  photo.png   →  processed/photo.jpg        (if ffmpeg fails: in-process JPEG)
  IMG_01.heic →  processed/IMG_01.jpg       (magick, retried with convert)
  photo.png   →  processed/photo-thumbnail.avif   (thumbnail command)

Accepted inputs: png, jpg/jpeg, webp, heic, heif. Images larger than
3840px on their long edge are scaled down first; thumbnails are a
centered square crop scaled to 240x240. HEIC/HEIF cannot be thumbnailed.

Set RUST_LOG=debug to see every external command.

Run 'imgpress gen-config' to generate a documented imgpress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Output directory
    #[arg(long, default_value = "processed", global = true)]
    output: PathBuf,

    /// Config file (default: ./imgpress.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images to AVIF (or JPEG when the encoder is unavailable)
    Process(BatchArgs),
    /// Create 240x240 AVIF thumbnails
    Thumbnail(BatchArgs),
    /// List files in the output directory
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock imgpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Process(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_batch(&config, &cli.output, args, process::Mode::Compress)
        }
        Command::Thumbnail(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_batch(&config, &cli.output, args, process::Mode::Thumbnail)
        }
        Command::List { json } => {
            let files = report::list_processed(&cli.output)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                output::print_listing(&files);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` flags pick the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<config::Config, config::ConfigError> {
    match path {
        Some(path) => config::load_config_required(path),
        None => config::load_config(Path::new(config::CONFIG_FILENAME)),
    }
}

fn run_batch(
    config: &config::Config,
    output_dir: &Path,
    args: BatchArgs,
    mode: process::Mode,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let inputs = source::discover_inputs(&args.paths)?;
    if inputs.is_empty() {
        let accepted: Vec<&str> = imgpress::imaging::accepted_extensions().collect();
        eprintln!("No images found (accepted: {})", accepted.join(", "));
        return Ok(ExitCode::SUCCESS);
    }

    init_thread_pool(&config.processing);
    let settings = config.pipeline_settings();
    let timeout = config.processing.command_timeout();

    let items = if args.json {
        process::process_batch(&inputs, output_dir, &settings, mode, timeout, None)
    } else {
        let (tx, rx) = std::sync::mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                for line in output::format_process_event(&event) {
                    println!("{}", line);
                }
            }
        });
        let items = process::process_batch(&inputs, output_dir, &settings, mode, timeout, Some(tx));
        printer.join().map_err(|_| "output thread panicked")?;
        items
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::batch_json(&items))?
        );
    } else {
        output::print_batch_summary(&items);
    }

    if items.iter().any(|item| item.outcome.is_err()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down,
/// not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
