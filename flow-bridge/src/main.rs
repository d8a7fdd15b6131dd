use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use flow_bridge::{commands, util};

#[derive(Debug, Parser)]
#[command(name = "flow-bridge", version, about = "Run Flow documents from the terminal")]
struct Cli {
    /// Config file (defaults to <config_dir>/flow/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a document and speak the message protocol on stdin/stdout.
    Open {
        file: PathBuf,
        /// Workspace root; defaults to the document's directory.
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Create a new, empty document.
    New {
        file: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// Export the shell blocks as a bash script.
    ExportScript {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export the document as Markdown.
    ExportMarkdown {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    fn file(&self) -> &Path {
        match self {
            Command::Open { file, .. }
            | Command::New { file, .. }
            | Command::ExportScript { file, .. }
            | Command::ExportMarkdown { file, .. } => file,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    util::init_tracing();
    let cli = Cli::parse();
    util::install_panic_hook(cli.command.file().display().to_string());

    match cli.command {
        Command::Open { file, workspace } => {
            let config = util::load_config(cli.config)?;
            commands::open(&file, workspace, config).await
        }
        Command::New { file, force } => commands::new_file(&file, force).await,
        Command::ExportScript { file, output } => {
            let written = commands::export_script(&file, output).await?;
            println!("{}", written.display());
            Ok(())
        }
        Command::ExportMarkdown { file, output } => {
            let written = commands::export_markdown(&file, output).await?;
            println!("{}", written.display());
            Ok(())
        }
    }
}
