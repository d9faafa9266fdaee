use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbrank::api::{create_router, AppState, IngestItem};
use kbrank::{Config, DEFAULT_TOP_K};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "TF-IDF knowledge base retrieval", long_about = None)]
struct Cli {
    /// sled database directory
    #[arg(long, env = "KBRANK_DATA_DIR", default_value = "kbrank.db")]
    data_dir: PathBuf,

    /// Documents retrieved per question
    #[arg(long, env = "KBRANK_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the index_and_train / question endpoints
    Serve {
        #[arg(long, env = "KBRANK_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Index documents from a JSON file (array of strings or {text, key} objects)
    Index {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Rank stored documents against a question
    Query {
        #[arg(short, long)]
        question: String,
        /// Overrides --top-k for this query
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print index statistics
    Stats,
}

fn load_input(path: &Path) -> Result<Vec<IngestItem>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn query(state: &AppState, question: &str, k: Option<usize>) -> Result<()> {
    let answer = state.answer(question, k)?;

    println!("Top {} for: \"{}\"", answer.results.len(), answer.question);
    println!();
    for hit in &answer.results {
        let label = hit.key.clone().unwrap_or_else(|| hit.index.to_string());
        println!("{:.4}\t{}", hit.score, label);
    }
    println!();
    println!("{}", answer.context);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config {
        data_dir: cli.data_dir,
        ..Config::default()
    }
    .with_top_k(cli.top_k);
    if let Commands::Serve { bind } = &cli.command {
        config.bind = *bind;
    }
    let state = AppState::open(config)?;

    match cli.command {
        Commands::Serve { .. } => {
            let bind = state.config.bind;
            let app = create_router(Arc::new(state));
            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!(%bind, version = kbrank::VERSION, "server listening");
            axum::serve(listener, app).await?;
        }
        Commands::Index { input } => {
            let response = state.ingest(load_input(&input)?)?;
            println!(
                "Indexed {} documents ({} total)",
                response.indexed, response.total_documents
            );
        }
        Commands::Query { question, k } => query(&state, &question, k)?,
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&state.stats()?)?);
        }
    }

    Ok(())
}
