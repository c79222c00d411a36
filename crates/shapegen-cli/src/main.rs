//! shapegen CLI.
//!
//! Generates Rust server types from a JSON service description.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use shapegen::{Generator, GeneratorConfig};

mod ui;

#[derive(Parser)]
#[command(name = "shapegen")]
#[command(version)]
#[command(about = "Generates Rust server body types, converters and validators from service descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate server types for every service of a description
    Generate {
        #[command(flatten)]
        input: Input,

        /// Output directory for generated code
        #[arg(short, long, default_value = "src/gen")]
        out: PathBuf,

        /// Module holding the services' domain modules
        #[arg(long, default_value = "crate")]
        domain_module: String,

        /// Module, inside each service's domain module, holding view types
        #[arg(long, default_value = "views")]
        views_module: String,

        /// Crate path the generated code imports runtime support from
        #[arg(long, default_value = "shapegen_runtime")]
        runtime_crate: String,

        /// Generate services on parallel threads
        #[arg(long)]
        parallel: bool,
    },

    /// Check a description without generating code
    Check {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// Service description (JSON)
    #[arg(short, long, default_value = "design.json")]
    description: PathBuf,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            input,
            out,
            domain_module,
            views_module,
            runtime_crate,
            parallel,
        } => {
            let config = GeneratorConfig {
                description: input.description,
                out_dir: out,
                domain_module,
                views_module,
                runtime_crate,
                parallel,
            };
            generate(config)
        }
        Commands::Check { input } => check(GeneratorConfig {
            description: input.description,
            ..GeneratorConfig::default()
        }),
    }
}

fn generate(config: GeneratorConfig) -> miette::Result<()> {
    debug!(?config, "generating");
    let start = Instant::now();
    let spinner = ui::spinner("Generating server types...");

    let generator = Generator::new(config);
    let result = generator.generate();
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            ui::error("Generation failed.");
            return Err(e.into());
        }
    };

    for path in &result.files {
        ui::file_line(&path.display().to_string());
    }
    println!();
    ui::success(&format!(
        "{} {} {} {} {}",
        ui::plural(result.services, "service"),
        ui::symbols::DOT,
        ui::plural(result.types, "type"),
        ui::symbols::DOT,
        ui::plural(result.validators, "validator"),
    ));
    ui::timing("Generated", start.elapsed().as_millis());
    Ok(())
}

fn check(config: GeneratorConfig) -> miette::Result<()> {
    let path = config.description.display().to_string();
    let generator = Generator::new(config);

    match generator.check() {
        Ok(desc) => {
            let methods: usize = desc.services.iter().map(|s| s.methods.len()).sum();
            ui::success(&format!("{path} is valid."));
            ui::dim(&format!(
                "{} {} {} {} {}",
                ui::plural(desc.services.len(), "service"),
                ui::symbols::DOT,
                ui::plural(methods, "method"),
                ui::symbols::DOT,
                ui::plural(desc.types.len(), "type"),
            ));
            Ok(())
        }
        Err(e) => {
            ui::error("Invalid description.");
            Err(e.into())
        }
    }
}
