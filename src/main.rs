use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use synai_catalog::analysis;
use synai_catalog::catalog::{EntityKind, SearchType};
use synai_catalog::config::{AppConfig, CliConfig, FileConfig};
use synai_catalog::{
    CatalogClient, EntityStore, Reconciler, Recommender, SpotifyClient, SqliteEntityStore,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    match EntityKind::from_str(s) {
        Some(EntityKind::AudioFeatures) | None => {
            Err(format!("'{}' is not one of: artist, album, track", s))
        }
        Some(kind) => Ok(kind),
    }
}

fn parse_search_type(s: &str) -> Result<SearchType, String> {
    SearchType::from_str(s).ok_or_else(|| format!("'{}' is not one of: track, artist, album", s))
}

#[derive(Parser, Debug)]
#[clap(name = "synai", about = "Resolve catalog entities and analyze their audio features")]
struct CliArgs {
    /// Path to the SQLite entity database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line options.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Number of read-only database connections.
    #[clap(long)]
    pub read_pool_size: Option<usize>,

    /// Base URL of the remote catalog API.
    #[clap(long)]
    pub spotify_base_url: Option<String>,

    /// Bearer token for the remote catalog API.
    #[clap(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve entity ids, fetching whatever is not stored yet.
    Resolve {
        #[clap(value_parser = parse_kind)]
        kind: EntityKind,
        #[clap(required = true)]
        ids: Vec<String>,
    },
    /// Resolve tracks and record an analysis of them.
    Analyze {
        #[clap(long)]
        user: String,
        #[clap(required = true)]
        track_ids: Vec<String>,
    },
    /// Per-day history of a user's analyses.
    History {
        #[clap(long)]
        user: String,
    },
    /// Latest analysis of a user.
    Dashboard {
        #[clap(long)]
        user: String,
    },
    /// Recommend tracks similar to a stored analysis.
    Recommend {
        analysis_id: i64,
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Search the remote catalog and resolve the hits.
    Search {
        query: String,
        #[clap(long = "type", value_parser = parse_search_type)]
        types: Vec<SearchType>,
        #[clap(long, default_value_t = 10)]
        limit: usize,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            read_pool_size: self.read_pool_size,
            spotify_base_url: self.spotify_base_url.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_reconciler(config: &AppConfig, store: Arc<dyn EntityStore>) -> Result<Arc<Reconciler>> {
    let access_token = config.access_token.as_deref().ok_or_else(|| {
        anyhow!(
            "An access token is required: pass --access-token, \
             set SPOTIFY_ACCESS_TOKEN or access_token in the config file"
        )
    })?;
    let client: Arc<dyn CatalogClient> = Arc::new(SpotifyClient::new(
        &config.spotify_base_url,
        access_token,
        config.reconciler.request_timeout(),
    )?);
    Ok(Arc::new(Reconciler::new(
        store,
        client,
        config.reconciler.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening SQLite entity database at {:?}...", config.db_path);
    let store: Arc<dyn EntityStore> = Arc::new(
        SqliteEntityStore::new(&config.db_path, config.read_pool_size)
            .context("Failed to open entity store")?,
    );

    match cli_args.command {
        Command::Resolve { kind, ids } => {
            let reconciler = build_reconciler(&config, store)?;
            match kind {
                EntityKind::Artist => print_json(&reconciler.resolve_artists(&ids).await?)?,
                EntityKind::Album => print_json(&reconciler.resolve_albums(&ids).await?)?,
                EntityKind::Track => print_json(&reconciler.resolve_tracks(&ids).await?)?,
                EntityKind::AudioFeatures => bail!("Audio features are resolved with their tracks"),
            }
        }
        Command::Analyze { user, track_ids } => {
            let reconciler = build_reconciler(&config, store.clone())?;
            let resolution = reconciler.resolve_tracks(&track_ids).await?;
            if !resolution.not_found.is_empty() {
                warn!(
                    "Skipping {} tracks not found remotely: {}",
                    resolution.not_found.len(),
                    resolution.not_found.join(", ")
                );
            }
            let analysis = analysis::record_analysis(store.as_ref(), &user, &resolution.entities)?;
            print_json(&analysis)?;
        }
        Command::History { user } => {
            print_json(&analysis::history(store.as_ref(), &user)?)?;
        }
        Command::Dashboard { user } => match analysis::dashboard(store.as_ref(), &user)? {
            Some(view) => print_json(&view)?,
            None => bail!("User {} has no analyses yet", user),
        },
        Command::Recommend { analysis_id, limit } => {
            let analysis = store
                .get_analysis(analysis_id)?
                .ok_or_else(|| anyhow!("Analysis {} not found", analysis_id))?;
            let limit = limit.unwrap_or(config.recommendation.limit);
            let reconciler = build_reconciler(&config, store)?;
            let recommender = Recommender::new(reconciler, config.recommendation.clone());
            print_json(&recommender.recommend(&analysis, limit).await?)?;
        }
        Command::Search {
            query,
            types,
            limit,
        } => {
            let reconciler = build_reconciler(&config, store)?;
            print_json(&reconciler.search(&query, &types, limit).await?)?;
        }
    }

    Ok(())
}
