//! `odbx-cli`: move NT11 field output between result container versions.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use odbx_convert::{ExportConfig, ImportConfig, RuntimeError};
use odbx_io::ArtifactPaths;
use odbx_native::{ArchiveDocument, LegacyArchive};
use tracing_subscriber::EnvFilter;

/// Export NT11 from a legacy archive, import it into a current one.
#[derive(Parser, Debug)]
#[command(name = "odbx-cli", version, about)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write mesh.json, steps.json and nt11.jsonl from a legacy archive
    Export {
        /// Legacy archive to read
        #[arg(long, short = 'i')]
        odb: PathBuf,
        /// Output directory
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Comma-separated step names (default: all steps)
        #[arg(long, short = 's')]
        steps: Option<String>,
    },

    /// Rebuild a current archive from an artifact set
    Import {
        #[arg(long)]
        mesh: PathBuf,
        #[arg(long)]
        steps: PathBuf,
        #[arg(long)]
        nt11: PathBuf,
        /// Target archive to create
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Replace the target if it already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Validate an artifact set without writing anything
    Check {
        #[arg(long)]
        mesh: PathBuf,
        #[arg(long)]
        steps: PathBuf,
        #[arg(long)]
        nt11: PathBuf,
    },

    /// Summarize a written target archive
    Inspect {
        target: PathBuf,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> odbx_convert::Result<()> {
    match command {
        Command::Export { odb, out, steps } => {
            let source =
                LegacyArchive::open(&odb).map_err(|e| RuntimeError::new("open source archive", e))?;
            let mut config = ExportConfig::default();
            if let Some(list) = steps {
                config = config.with_step_list(&list);
            }
            let report = odbx_convert::export(&source, &ArtifactPaths::in_dir(&out), &config)?;
            println!("{}", report.format());
            println!("Artifacts written to {}", out.display());
        }
        Command::Import {
            mesh,
            steps,
            nt11,
            out,
            overwrite,
        } => {
            if overwrite && out.exists() {
                tracing::info!(path = %out.display(), "removing existing target");
                fs::remove_file(&out)?;
            }
            let config = ImportConfig::default();
            let backend = odbx_convert::target_archive(&out, &config);
            let paths = ArtifactPaths::new(mesh, steps, nt11);
            let report = odbx_convert::import(&backend, &paths, &config)?;
            println!("{}", report.format());
            println!("Target written to {}", out.display());
        }
        Command::Check { mesh, steps, nt11 } => {
            let report = odbx_convert::check(&ArtifactPaths::new(mesh, steps, nt11))?;
            println!("{}", report.format());
        }
        Command::Inspect { target } => {
            let doc =
                ArchiveDocument::load(&target).map_err(|e| RuntimeError::new("load target", e))?;
            print_inspection(&doc);
        }
    }
    Ok(())
}

fn print_inspection(doc: &ArchiveDocument) {
    println!("name: {}", doc.header.name);
    if !doc.header.analysis_title.is_empty() {
        println!("title: {}", doc.header.analysis_title);
    }
    if !doc.header.description.is_empty() {
        println!("description: {}", doc.header.description);
    }
    if let Some(created) = doc.header.created {
        println!("created: {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("geometry_committed: {}", doc.geometry_committed);
    println!("{}", doc.summary().format());
    for step in &doc.steps {
        println!(
            "step '{}': {} frames, time period {}",
            step.step.name,
            step.frames.len(),
            step.time_period
        );
        for frame in &step.frames {
            let fields: Vec<&str> = frame.field_outputs.iter().map(|f| f.name.as_str()).collect();
            println!(
                "  frame {} (t = {}): {}",
                frame.frame.increment_number,
                frame.frame.frame_value,
                if fields.is_empty() {
                    "-".to_string()
                } else {
                    fields.join(", ")
                }
            );
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 2 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
