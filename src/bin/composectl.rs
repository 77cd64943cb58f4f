//! Standalone `composectl` CLI binary.
//!
//! Drives the same core as the HTTP API, printing the tagged output
//! stream to stdout:
//!
//! ```text
//! composectl ls
//! composectl view blog
//! composectl up blog
//! composectl logs blog
//! composectl rm blog
//! ```
//!
//! The stacks directory is discovered the same way the server discovers
//! it (`--stacks-dir`, `/containers`, `/stacks`, `~/.local/containers`).

use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use composectl::compose::pipeline;
use composectl::configuration::get_configuration;
use composectl::env_store::EnvStore;
use composectl::executor::{Executor, OutputStream, StackAction};

#[derive(Parser, Debug)]
#[command(
    name = "composectl",
    version,
    about = "Manage Docker Compose stacks",
    long_about = "composectl: sanitise, enrich and run Docker Compose stacks\n\n\
        Stack documents live in the stacks directory as <name>.yml with an\n\
        enriched <name>.effective.yml next to them; secrets are kept in the\n\
        prod.env store. The verbs below map 1:1 onto the HTTP API."
)]
struct Cli {
    /// Directory holding stack files and the env store
    #[arg(long, value_name = "DIR", global = true)]
    stacks_dir: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List known stacks and their containers
    Ls,
    /// Print a stack's source document (reconstructed when missing)
    View { name: String },
    /// Provision prerequisites and start the stack
    Up { name: String },
    /// Stop and remove the stack's containers
    Down { name: String },
    /// Start the stack's stopped containers
    Start { name: String },
    /// Stop the stack's containers
    Stop { name: String },
    /// Stream container logs for the stack
    Logs { name: String },
    /// Tear the stack down and delete its files
    Rm { name: String },
    /// Print the enriched form of a stack's source document
    Enrich { name: String },
}

enum Streamed {
    Action(StackAction),
    Delete,
}

async fn run_streamed(executor: &Executor, name: &str, verb: Streamed) -> anyhow::Result<()> {
    let (out, mut rx) = OutputStream::channel(64);
    let printer = tokio::spawn(async move {
        use std::io::Write as _;
        let mut stdout = std::io::stdout();
        while let Some(line) = rx.recv().await {
            let _ = stdout.write_all(line.as_bytes());
            let _ = stdout.flush();
        }
    });

    let result = match verb {
        Streamed::Action(action) => executor.run_action(name, action, &out).await,
        Streamed::Delete => executor.delete_stack(name, &out).await,
    };
    drop(out);
    let _ = printer.await;

    // the failure is already on screen as an [ERROR] line
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(dir) = &cli.stacks_dir {
        tracing::debug!("Using stacks directory {}", dir);
    }

    let settings = Arc::new(get_configuration()?);
    let store = Arc::new(Mutex::new(EnvStore::load(
        &settings.env_file,
        &settings.secrets_dir,
    )?));
    let executor = Executor::new(settings.clone(), store.clone());

    match cli.command {
        Commands::Ls => {
            for stack in executor.list_stacks().await? {
                println!("{} ({} containers)", stack.name, stack.containers.len());
                for container in stack.containers {
                    println!("  {} [{}] {}", container.name, container.state, container.image);
                }
            }
        }
        Commands::View { name } => {
            print!("{}", executor.stack_yaml(&name).await?);
        }
        Commands::Enrich { name } => {
            let path = settings.source_path(&name);
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let yaml = {
                let guard = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("env store lock poisoned"))?;
                pipeline::enrich_preview(&raw, &settings, &guard)?
            };
            print!("{yaml}");
        }
        Commands::Up { name } => {
            run_streamed(&executor, &name, Streamed::Action(StackAction::Up)).await?
        }
        Commands::Down { name } => {
            run_streamed(&executor, &name, Streamed::Action(StackAction::Down)).await?
        }
        Commands::Start { name } => {
            run_streamed(&executor, &name, Streamed::Action(StackAction::Start)).await?
        }
        Commands::Stop { name } => {
            run_streamed(&executor, &name, Streamed::Action(StackAction::Stop)).await?
        }
        Commands::Logs { name } => {
            run_streamed(&executor, &name, Streamed::Action(StackAction::Logs)).await?
        }
        Commands::Rm { name } => run_streamed(&executor, &name, Streamed::Delete).await?,
    }

    Ok(())
}
