use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use shoprec::{Commands, Container, ContainerConfig, RecommendationConfig, Router};

#[derive(Parser)]
#[command(name = "shoprec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, default_value = "~/.shoprec")]
    data_dir: String,

    /// JSON settings file; missing keys take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    mock_embeddings: bool,

    #[arg(long, global = true)]
    chroma_url: Option<String>,

    #[arg(long, global = true)]
    embedding_url: Option<String>,

    #[arg(long, global = true)]
    memory_storage: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = expand_tilde(&cli.data_dir);
    if !cli.memory_storage {
        std::fs::create_dir_all(&data_dir)?;
    }

    let recommendation = match cli.config.as_deref() {
        Some(path) => {
            debug!("Loading settings from {}", path.display());
            RecommendationConfig::from_file(path)?
        }
        None => RecommendationConfig::default(),
    }
    .with_env_overrides();

    let container = Container::new(ContainerConfig {
        data_dir,
        mock_embeddings: cli.mock_embeddings,
        chroma_url: cli.chroma_url,
        embedding_url: cli.embedding_url,
        memory_storage: cli.memory_storage,
        recommendation,
    })
    .await?;

    let router = Router::new(&container);
    let output = router.route(cli.command).await?;
    println!("{}", output);

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
