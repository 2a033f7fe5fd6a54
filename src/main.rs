//! # Hourbook: sign-up coordination and hour reports
//!
//! Offline entry points around the interaction layer.
//!
//! Usage:
//!   hourbook init-db                                   # Create / migrate the database
//!   hourbook decode artifact.txt                       # Decode an event artifact
//!   hourbook report --start 01-03-2024 --by gardener   # Print the hour report
//!   hourbook leaderboard --game Dota                   # Print the leaderboard pages
//!   hourbook replay session.jsonl                      # Dry-run recorded interactions

mod router;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hourbook_channels::{LocalPlatform, Services};
use hourbook_core::HourbookConfig;
use hourbook_core::config::{LogConfig, Timeouts};
use hourbook_core::interaction::{RawData, RawInteraction, parse_date};
use hourbook_core::traits::ScoreStore;
use hourbook_core::types::{Category, ReportDimension, UserId};
use hourbook_db::SqliteStore;
use hourbook_reports::{ReportRequest, aggregator, leaderboard, report};
use hourbook_signups::codec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::router::{Dispatched, Router};

#[derive(Parser)]
#[command(
    name = "hourbook",
    version,
    about = "📒 Hourbook: sign-ups, gardener rolls and hour reports"
)]
struct Cli {
    /// Config file (default: ~/.hourbook/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Database path, overriding [database] path
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database and exit
    InitDb,
    /// Decode an event artifact from a text file
    Decode { file: PathBuf },
    /// Aggregate and print the hour report
    Report {
        /// First day, DD-MM-YYYY
        #[arg(long)]
        start: String,
        /// Last day (inclusive), DD-MM-YYYY; defaults to now
        #[arg(long)]
        end: Option<String>,
        /// gardener | game
        #[arg(long, default_value = "gardener")]
        by: String,
    },
    /// Print the prediction leaderboard pages
    Leaderboard {
        /// Dota, CS, MLBB, HoK or Other; omit for the global board
        #[arg(long)]
        game: Option<String>,
    },
    /// Drive recorded interactions (JSON lines) through the dispatcher
    /// against an in-process platform and print the transcript
    Replay {
        file: PathBuf,
        /// Pause between interactions
        #[arg(long, default_value = "50")]
        settle_ms: u64,
        /// Bound for every wait during the replay
        #[arg(long, default_value = "2000")]
        wait_ms: u64,
        /// Identity the in-process platform answers as
        #[arg(long, default_value = "1")]
        bot_id: u64,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn init_logging(log: &LogConfig, verbose: bool) {
    let level = if verbose { "debug" } else { log.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hourbook={level},hourbook_core={level},hourbook_channels={level},\
             hourbook_signups={level},hourbook_reports={level},hourbook_db={level}"
        ))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if log.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<HourbookConfig> {
    let mut config = match &cli.config {
        Some(path) => HourbookConfig::load_from(&expand_path(path))?,
        None => HourbookConfig::load()?,
    };
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log, cli.verbose);

    match &cli.command {
        Commands::InitDb => init_db(&config),
        Commands::Decode { file } => decode(file),
        Commands::Report { start, end, by } => {
            print_report(config, start, end.as_deref(), by).await
        }
        Commands::Leaderboard { game } => print_leaderboard(config, game.as_deref()).await,
        Commands::Replay {
            file,
            settle_ms,
            wait_ms,
            bot_id,
        } => replay(config, file, *settle_ms, *wait_ms, UserId(*bot_id)).await,
    }
}

fn open_store(config: &HourbookConfig) -> Result<Arc<SqliteStore>> {
    let path = config.database.resolved_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn init_db(config: &HourbookConfig) -> Result<()> {
    open_store(config)?;
    println!("✅ Database ready: {}", config.database.resolved_path().display());
    Ok(())
}

fn decode(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let record = codec::decode(&text)?;
    println!("📄 {}", file.display());
    println!("   Category: {}", record.category);
    println!("   Name:     {}", record.name);
    println!("   Time:     {} (<t:{}:F>)", record.scheduled_time, record.scheduled_time);
    println!("   Hours:    {}", record.duration_hours);
    Ok(())
}

/// Services over the on-disk store with an offline platform.
fn offline_services(
    config: HourbookConfig,
    store: Arc<SqliteStore>,
) -> (Services, Arc<LocalPlatform>) {
    let platform = Arc::new(LocalPlatform::new(UserId(0)));
    let services = Services::new(platform.clone(), store.clone(), store, config);
    (services, platform)
}

async fn print_report(
    config: HourbookConfig,
    start: &str,
    end: Option<&str>,
    by: &str,
) -> Result<()> {
    let dimension: ReportDimension = by.parse()?;
    let start = parse_date("start_date", start)?;
    let end = end.map(|e| parse_date("end_date", e)).transpose()?;
    let request =
        ReportRequest::from_dates(dimension, start, end, chrono::Utc::now().timestamp())?;

    let store = open_store(&config)?;
    let (services, _) = offline_services(config, store);
    let aggregate = aggregator::aggregate(
        services.events.clone(),
        &services.config,
        request,
        services.timeouts.query,
    )
    .await;
    for label in &aggregate.skipped {
        println!("⚠️  {label}: query failed, left out of the report");
    }
    let pages = report::report_pages(&aggregate, &services.config);
    for page in pages.pages() {
        println!("{}\n", page.content);
    }
    Ok(())
}

async fn print_leaderboard(config: HourbookConfig, game: Option<&str>) -> Result<()> {
    let game = match game {
        None => None,
        Some(g) if g.eq_ignore_ascii_case("global") => None,
        Some(g) => Some(g.parse::<Category>()?),
    };
    let store = open_store(&config)?;
    let (services, platform) = offline_services(config, store.clone());
    // Offline there is no member cache: registry labels, else the raw id.
    for entry in store.leaderboard(game).await? {
        let name = services
            .config
            .gardener_label(entry.member)
            .map(str::to_string)
            .unwrap_or_else(|| entry.member.to_string());
        platform.set_cached_name(entry.member, &name);
    }
    let pages = leaderboard::leaderboard_pages(&services, game).await?;
    for page in pages.pages() {
        println!("{}\n", page.content);
    }
    Ok(())
}

async fn replay(
    config: HourbookConfig,
    file: &Path,
    settle_ms: u64,
    wait_ms: u64,
    bot: UserId,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let platform = Arc::new(LocalPlatform::new(bot));
    let store = Arc::new(SqliteStore::open_in_memory()?);
    let services = Services::new(platform.clone(), store.clone(), store.clone(), config)
        .with_timeouts(Timeouts::uniform(Duration::from_millis(wait_ms)));
    let router = Router::new(services);

    let mut waits = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut raw: RawInteraction = serde_json::from_str(line)
            .with_context(|| format!("line {}: not an interaction", n + 1))?;
        fill_placeholders(&mut raw, &platform).with_context(|| format!("line {}", n + 1))?;
        let interaction = match raw.decode() {
            Ok(interaction) => interaction,
            Err(e) => {
                println!("❌ line {}: {e}", n + 1);
                continue;
            }
        };
        match router.handle(interaction).await {
            Dispatched::Background(handle) => waits.push(handle),
            Dispatched::Delivered(0) => println!("📭 line {}: no active wait", n + 1),
            Dispatched::Delivered(_) | Dispatched::Done => {}
        }
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
    }

    for wait in waits {
        if let Err(e) = wait.await {
            tracing::error!("❌ Replay wait failed: {e}");
        }
    }

    println!("📜 Transcript");
    for call in platform.calls() {
        println!("   {}", call.describe());
    }
    println!("🗄️  Stored events: {}", store.count_events().await?);
    Ok(())
}

/// Prompt tokens are minted at run time, so recorded component ids may be
/// written as `@last` (first id of the latest prompt) or `@last:N`.
/// A placeholder also supplies the prompt's message when none is given.
fn fill_placeholders(raw: &mut RawInteraction, platform: &LocalPlatform) -> Result<()> {
    let custom_id = match &mut raw.data {
        RawData::Command { .. } => return Ok(()),
        RawData::Button { custom_id }
        | RawData::StringSelect { custom_id, .. }
        | RawData::UserSelect { custom_id, .. }
        | RawData::ModalSubmit { custom_id, .. } => custom_id,
    };
    let Some(rest) = custom_id.strip_prefix("@last") else {
        return Ok(());
    };
    let index = match rest {
        "" => 0,
        other => other
            .strip_prefix(':')
            .and_then(|n| n.parse::<usize>().ok())
            .with_context(|| format!("bad placeholder '{custom_id}'"))?,
    };
    let prompt = platform
        .last_prompt()
        .context("placeholder used before any prompt was sent")?;
    let resolved = prompt
        .custom_ids
        .get(index)
        .with_context(|| format!("latest prompt has no component {index}"))?
        .clone();
    *custom_id = resolved;
    if raw.message.is_none() {
        raw.message = prompt.message;
    }
    Ok(())
}
