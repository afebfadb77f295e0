use clap::{Parser, Subcommand};
use simple_edit::imaging::OutputFormat;
use simple_edit::pipeline::{self, Destination, EditOutcome};
use simple_edit::{config, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simple-edit")]
#[command(about = "Adjust, watermark and re-encode images")]
#[command(long_about = "\
Adjust, watermark and re-encode images

Each input goes through the same fixed pipeline:

  compress → decode → adjust → watermark → encode

  compress    optional pre-compression (compression < 100), at most
              4096 px per side and, best effort, 10 MB
  adjust      opacity, brightness, contrast, saturation, hue, vibrance
  watermark   text or image, anchored to a corner, edge or the center
  encode      original format, or jpeg/png/webp/gif/bmp/tiff/avif

Settings come from stock defaults, then the --settings file, then flags.

Run 'simple-edit gen-config' to generate a documented settings file.")]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override values from the settings file.
#[derive(clap::Args, Clone, Default)]
struct OverrideArgs {
    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Final encode quality (0-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Pre-compression quality (0-100, 100 = off)
    #[arg(long)]
    compression: Option<u32>,

    /// Maximum parallel workers
    #[arg(long)]
    jobs: Option<usize>,
}

impl OverrideArgs {
    /// Overrides as a sparse TOML table for merging over the settings file.
    fn to_toml(&self) -> Result<toml::Value, toml::ser::Error> {
        let mut table = toml::Table::new();
        if let Some(format) = self.format {
            table.insert("format".into(), toml::Value::try_from(format)?);
        }
        if let Some(quality) = self.quality {
            table.insert("quality".into(), toml::Value::Integer(quality.into()));
        }
        if let Some(compression) = self.compression {
            table.insert("compression".into(), toml::Value::Integer(compression.into()));
        }
        if let Some(jobs) = self.jobs {
            let mut processing = toml::Table::new();
            processing.insert("max_processes".into(), toml::Value::Integer(jobs as i64));
            table.insert("processing".into(), toml::Value::Table(processing));
        }
        Ok(toml::Value::Table(table))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Edit one or more images
    Edit {
        /// Input image files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for edited files (<name>-edited.<ext>)
        #[arg(long, default_value = "edited")]
        output: PathBuf,

        /// Print data: URIs instead of writing files
        #[arg(long, conflicts_with = "output")]
        data_uri: bool,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Validate settings without editing anything
    Check,
    /// Print a stock settings file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Edit {
            inputs,
            output: output_dir,
            data_uri,
            overrides,
        } => {
            let settings = config::load_settings(cli.settings.as_deref(), Some(overrides.to_toml()?))?;
            init_thread_pool(&settings.processing);
            let backend = pipeline::backend_for(&settings)?;
            let destination = if data_uri {
                Destination::DataUri
            } else {
                Destination::Directory(output_dir)
            };

            // Progress goes to stderr when stdout carries data URIs.
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_edit_event(&event) {
                        if data_uri {
                            eprintln!("{}", line);
                        } else {
                            println!("{}", line);
                        }
                    }
                }
            });
            let outcomes =
                pipeline::edit_files(&backend, &inputs, &settings, &destination, Some(tx));
            printer.join().ok();

            for outcome in &outcomes {
                if let EditOutcome::DataUri(uri) = outcome {
                    println!("{}", uri);
                }
            }
            if !data_uri {
                output::print_batch_summary(&outcomes);
            }
            let failed = outcomes.iter().filter(|o| o.is_failure()).count();
            if failed > 0 {
                return Err(format!("{} of {} images failed", failed, outcomes.len()).into());
            }
        }
        Command::Check => {
            let settings = config::load_settings(cli.settings.as_deref(), None)?;
            settings.watermark.resolve()?;
            pipeline::backend_for(&settings)?;
            output::print_settings(&settings);
            println!("==> Settings are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
