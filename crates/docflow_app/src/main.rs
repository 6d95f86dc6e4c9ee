//! Docflow CLI
//!
//! Entry point for the `docflow` command-line client of the conversion server.

mod platform;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use docflow_core::{ArtifactKind, ProcessMode};
use docflow_logging::level_for_verbosity;

use platform::{initialize_logging, ConfigOverrides, DocflowConfig, EffectRunner, Session};

#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "Submit documents for conversion and track the jobs", version)]
struct Cli {
    /// Server base URL (overrides the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Path to config file (default: ./docflow.ron)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Directory for downloaded archives and artifacts
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server settings
    Info,

    /// Change how many page images the server processes in parallel
    Settings {
        #[arg(long)]
        max_concurrent_images: u32,
    },

    /// List every job the server knows about
    History,

    /// Upload PDF files and track their conversion
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = ModeArg::All)]
        mode: ModeArg,

        /// Return once every upload is accepted instead of waiting for completion
        #[arg(long)]
        no_wait: bool,
    },

    /// Follow jobs the server is still processing until they finish
    Watch,

    /// Stream stage progress and log output of one job
    Detail {
        hash_id: String,
    },

    /// Ask the server to stop a running job
    Stop {
        hash_id: String,
    },

    /// Run a finished job again
    Reprocess {
        hash_id: String,

        #[arg(long)]
        no_wait: bool,
    },

    /// Download one output artifact of a finished job
    Download {
        hash_id: String,

        #[arg(long, value_enum, default_value_t = ArtifactArg::Zip)]
        artifact: ArtifactArg,
    },

    /// Download the outputs of several finished jobs as one archive
    DownloadBatch {
        #[arg(required = true)]
        hash_ids: Vec<String>,
    },

    /// Print the effective configuration as RON
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    All,
    Single,
}

impl From<ModeArg> for ProcessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => ProcessMode::AllPages,
            ModeArg::Single => ProcessMode::CurrentPageOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ArtifactArg {
    Zip,
    Docx,
    Txt,
    Json,
    #[value(name = "images_zip")]
    ImagesZip,
}

impl From<ArtifactArg> for ArtifactKind {
    fn from(artifact: ArtifactArg) -> Self {
        match artifact {
            ArtifactArg::Zip => ArtifactKind::Archive,
            ArtifactArg::Docx => ArtifactKind::Document,
            ArtifactArg::Txt => ArtifactKind::Text,
            ArtifactArg::Json => ArtifactKind::Json,
            ArtifactArg::ImagesZip => ArtifactKind::ImagesArchive,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = DocflowConfig::load(cli.config.as_deref())?.with_overrides(ConfigOverrides {
        server_url: cli.server,
        output_dir: cli.output_dir,
    });
    initialize_logging(config.log_destination, level_for_verbosity(cli.verbose));

    if let Commands::Config = cli.command {
        println!("{}", config.to_ron().context("failed to render config")?);
        return Ok(());
    }

    let runner = EffectRunner::new(config.engine_config())
        .with_context(|| format!("cannot use server {}", config.server_url))?;
    let mut session = Session::new(runner);
    session.bootstrap();

    let outcome = run_command(&mut session, cli.command);
    session.shutdown();
    outcome
}

fn run_command(session: &mut Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Info => session.print_info(),
        Commands::Settings {
            max_concurrent_images,
        } => session.save_settings(max_concurrent_images),
        Commands::History => session.print_history(),
        Commands::Submit {
            files,
            mode,
            no_wait,
        } => session.submit(&files, mode.into(), !no_wait)?,
        Commands::Watch => session.watch(),
        Commands::Detail { hash_id } => session.detail(&hash_id)?,
        Commands::Stop { hash_id } => session.stop(&hash_id)?,
        Commands::Reprocess { hash_id, no_wait } => session.reprocess(&hash_id, !no_wait)?,
        Commands::Download { hash_id, artifact } => session.download(&hash_id, artifact.into())?,
        Commands::DownloadBatch { hash_ids } => session.download_batch(&hash_ids)?,
        Commands::Config => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn submit_defaults_to_all_pages_and_waiting() {
        let cli = Cli::try_parse_from(["docflow", "submit", "a.pdf", "b.pdf"]).expect("parse");
        let Commands::Submit {
            files,
            mode,
            no_wait,
        } = cli.command
        else {
            panic!("expected submit");
        };

        assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
        assert_eq!(ProcessMode::from(mode), ProcessMode::AllPages);
        assert!(!no_wait);
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "docflow",
            "download",
            "abc123",
            "--artifact",
            "images_zip",
            "--server",
            "http://gpu-box:9000",
            "-vv",
        ])
        .expect("parse");

        assert_eq!(cli.server.as_deref(), Some("http://gpu-box:9000"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Download { artifact: ArtifactArg::ImagesZip, .. }
        ));
        assert_eq!(ArtifactKind::from(ArtifactArg::ImagesZip), ArtifactKind::ImagesArchive);
    }

    #[test]
    fn submit_requires_files() {
        assert!(Cli::try_parse_from(["docflow", "submit"]).is_err());
    }
}
