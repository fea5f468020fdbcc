//! longtex - export linked markdown notes to LaTeX

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

use longtex::{
    export_note, write_export, CollectingDiagnostics, ExportConfig, ExportRequest, VaultStorage,
};

#[derive(Parser)]
#[command(name = "longtex")]
#[command(version, about = "Export linked markdown notes to a single LaTeX document", long_about = None)]
#[command(after_help = "EXAMPLES:
    longtex export Paper --vault ~/notes      Write ~/notes/output/Paper.tex
    longtex export Paper --fragment           Print the rendered body only
    longtex config                            Show the effective configuration")]
struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export a note and everything it embeds
    Export {
        /// Name of the note to export
        #[arg(value_name = "NOTE")]
        note: String,

        /// Vault directory (defaults to the current directory)
        #[arg(long)]
        vault: Option<PathBuf>,

        /// Output folder inside the vault
        #[arg(short, long)]
        output: Option<String>,

        /// Template file with $key$ placeholders
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Preamble file, included with \input
        #[arg(long)]
        preamble: Option<String>,

        /// Bibliography database
        #[arg(long)]
        bibliography: Option<String>,

        /// Print the rendered body instead of writing a document
        #[arg(long)]
        fragment: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(level)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let mut config = ExportConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {:#}", e);
        ExportConfig::default()
    });

    match command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Export {
            note,
            vault,
            output,
            template,
            preamble,
            bibliography,
            fragment,
        } => {
            if let Some(output) = output {
                config.output_folder = output;
            }
            if let Some(template) = template {
                config.template_file = Some(template);
            }
            if preamble.is_some() {
                config.preamble_file = preamble;
            }
            if bibliography.is_some() {
                config.bibliography_file = bibliography;
            }

            let vault = match vault {
                Some(vault) => vault,
                None => std::env::current_dir().context("Could not determine current directory")?,
            };
            export(&mut config, &vault, note, fragment).await
        }
    }
}

async fn export(
    config: &mut ExportConfig,
    vault: &Path,
    note: String,
    fragment: bool,
) -> Result<()> {
    let storage = VaultStorage::open(vault)
        .with_context(|| format!("Failed to open vault: {}", vault.display()))?;

    let template = match &config.template_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read template: {}", path.display()))?,
        ),
        None => None,
    };

    let diagnostics = CollectingDiagnostics::new();
    let request = ExportRequest {
        address: note,
        template,
        fragment,
    };
    let export = export_note(&storage, &diagnostics, config, &request)
        .await
        .with_context(|| format!("Failed to export {}", request.address))?;

    if fragment {
        println!("{}", export.latex);
    } else {
        let target = write_export(&storage, config, &export).await?;
        let out_dir = storage
            .path_of(&target)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| vault.to_path_buf());
        for media in &export.media {
            let destination = out_dir.join(&config.media_folder).join(media.file_name());
            storage
                .copy_out(media, &destination)
                .await
                .with_context(|| format!("Failed to copy {}", media))?;
        }
        println!("Wrote {}", storage.path_of(&target).display());
    }

    let reported = diagnostics.diagnostics();
    if !reported.is_empty() {
        eprintln!("{} warning(s):", reported.len());
        for diagnostic in &reported {
            eprintln!("  - {}", diagnostic);
        }
    }

    config.add_recent_vault(vault.canonicalize().unwrap_or_else(|_| vault.to_path_buf()));
    if let Err(e) = config.save() {
        tracing::warn!("Could not save configuration: {:#}", e);
    }
    Ok(())
}
