use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use async_trait::async_trait;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use opera_abi::sfc::SFC_CONTRACT;
use opera_data::{
    MemCache, RpcStakerSource, StakerInfo, StakerInfoSource, Store, WithdrawRequestList,
};
use opera_repo::{CallQueueContext, ContractCallQueue, Repository, RepositoryConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    db_path: String,
    rpc_url: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "opera-enrich")]
#[command(about = "Off-chain enrichment of Opera transactions and staking data")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long, global = true, default_value = "data/opera.sqlite")]
    db_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Label stored contract calls with their target type and function.
    Classify(ClassifyArgs),
    /// Show published metadata of a validator.
    StakerInfo(StakerInfoArgs),
    /// List withdraw requests of a delegator.
    Withdrawals(WithdrawalsArgs),
    /// Show row counts of the local store.
    Status,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Maximum number of calls to process.
    #[arg(long, default_value_t = 10_000)]
    limit: usize,

    /// Special Fee Contract address.
    #[arg(long)]
    sfc: Option<Address>,
}

#[derive(Args, Debug)]
struct StakerInfoArgs {
    /// Validator id.
    #[arg(long)]
    id: u64,

    /// Staker info contract address.
    #[arg(long)]
    sti: Option<Address>,
}

#[derive(Args, Debug)]
struct WithdrawalsArgs {
    /// Delegator address.
    #[arg(long)]
    address: Address,

    /// Restrict the list to one validator.
    #[arg(long)]
    staker: Option<u64>,

    /// Page cursor from a previous listing.
    #[arg(long)]
    cursor: Option<String>,

    /// Page size; negative values page towards newer requests.
    #[arg(long, default_value_t = 25, allow_negative_numbers = true)]
    count: i32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Stand-in source used when no RPC endpoint is configured.
struct OfflineSource;

#[async_trait]
impl StakerInfoSource for OfflineSource {
    async fn staker_info(&self, _id: U256) -> Result<Option<StakerInfo>> {
        Err(eyre!("OPERA_RPC_URL is not set, staker info can not be pulled"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        db_path: cli.db_path,
        rpc_url: std::env::var("OPERA_RPC_URL").ok(),
    };

    match cli.command {
        Commands::Classify(args) => handle_classify(&ctx, args).await,
        Commands::StakerInfo(args) => handle_staker_info(&ctx, args).await,
        Commands::Withdrawals(args) => handle_withdrawals(&ctx, args),
        Commands::Status => handle_status(&ctx),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn open_store(ctx: &AppContext) -> Result<Arc<Store>> {
    Store::new(&ctx.db_path)
        .map(Arc::new)
        .wrap_err("failed to open SQLite store")
}

fn offline_repository(cfg: RepositoryConfig, store: Arc<Store>) -> Repository {
    let cache = MemCache::new(cfg.cache_eviction, cfg.cache_max_bytes);
    Repository::new(cfg, store, Arc::new(cache), Arc::new(OfflineSource))
}

/// Feeds unclassified calls through the classification queue.
///
/// Ctrl-C stops the feed; the call in flight is finished before exit.
async fn handle_classify(ctx: &AppContext, args: ClassifyArgs) -> Result<()> {
    let store = open_store(ctx)?;
    let cfg = RepositoryConfig {
        sfc_contract: args.sfc.unwrap_or(SFC_CONTRACT),
        ..RepositoryConfig::default()
    };

    let pending = store
        .unclassified_calls(args.limit)
        .wrap_err("failed to load unclassified calls")?;
    if pending.is_empty() {
        info!(db_path = %ctx.db_path, "no unclassified contract calls");
        return Ok(());
    }

    let (sender, receiver) = mpsc::channel(cfg.call_queue_length);
    let stop = CancellationToken::new();
    let tracker = TaskTracker::new();
    let repo = Arc::new(offline_repository(cfg, store));
    let worker = ContractCallQueue::new(repo).spawn(CallQueueContext {
        receiver,
        stop: stop.clone(),
        tracker: tracker.clone(),
    });

    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} calls queued",
        )
        .wrap_err("failed to create progress style")?
        .progress_chars("#>-"),
    );

    for trx in pending {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            sent = sender.send(trx) => {
                if sent.is_err() {
                    break;
                }
                pb.inc(1);
            }
        }
    }
    drop(sender);

    tracker.close();
    tracker.wait().await;
    let stats = worker.await.wrap_err("contract call worker failed")?;
    pb.finish_and_clear();

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Received".to_string(), stats.received.to_string()]);
    table.add_row(vec!["Classified".to_string(), stats.classified.to_string()]);
    table.add_row(vec!["Skipped".to_string(), stats.skipped.to_string()]);
    table.add_row(vec!["Failed".to_string(), stats.failed.to_string()]);
    println!("\n{}\n", table);

    info!(
        received = stats.received,
        classified = stats.classified,
        db_path = %ctx.db_path,
        "classify command completed"
    );
    Ok(())
}

async fn handle_staker_info(ctx: &AppContext, args: StakerInfoArgs) -> Result<()> {
    let rpc_url = ctx
        .rpc_url
        .as_deref()
        .ok_or_else(|| eyre!("OPERA_RPC_URL is required for staker-info command"))?;
    let sti = args
        .sti
        .ok_or_else(|| eyre!("--sti is required, no staker info contract is configured"))?;

    let provider =
        ProviderBuilder::new().on_http(rpc_url.parse().wrap_err("invalid RPC URL format")?);
    let source = RpcStakerSource::new(provider, sti)?;
    let head = source.check_connectivity().await?;
    info!(block = head, "connected to RPC endpoint");

    let cfg = RepositoryConfig {
        sti_contract: sti,
        ..RepositoryConfig::default()
    };
    let cache = MemCache::new(cfg.cache_eviction, cfg.cache_max_bytes);
    let repo = Repository::new(cfg, open_store(ctx)?, Arc::new(cache), Arc::new(source));

    let id = U256::from(args.id);
    let Some(info) = repo.retrieve_staker_info(id).await else {
        println!("validator #{} has no published information", args.id);
        return Ok(());
    };

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Field", "Value"]);
    let na = || "N/A".to_string();
    table.add_row(vec!["Validator".to_string(), format!("#{}", args.id)]);
    table.add_row(vec!["Name".to_string(), info.name.unwrap_or_else(na)]);
    table.add_row(vec!["Website".to_string(), info.website.unwrap_or_else(na)]);
    table.add_row(vec!["Contact".to_string(), info.contact.unwrap_or_else(na)]);
    table.add_row(vec!["Logo".to_string(), info.logo_url.unwrap_or_else(na)]);
    println!("\n{}\n", table);

    Ok(())
}

fn handle_withdrawals(ctx: &AppContext, args: WithdrawalsArgs) -> Result<()> {
    let repo = offline_repository(RepositoryConfig::default(), open_store(ctx)?);
    let list = repo.withdraw_requests(
        &args.address,
        args.staker.map(U256::from),
        args.cursor.as_deref(),
        args.count,
    )?;

    match args.output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&list)
                    .wrap_err("failed to serialize withdraw requests")?
            );
        }
        OutputFormat::Table => print_withdrawals_table(&list),
    }

    info!(
        address = %args.address,
        items = list.items.len(),
        total = list.total,
        "withdrawals command completed"
    );
    Ok(())
}

fn print_withdrawals_table(list: &WithdrawRequestList) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Request", "Validator", "Amount", "Created", "Withdrawn"]);

    for request in &list.items {
        table.add_row(vec![
            request.request_id.to_string(),
            format!("#{}", request.staker_id),
            format_ftm(request.amount),
            format_time(request.created_time),
            request
                .withdraw_time
                .map(format_time)
                .unwrap_or_else(|| "pending".to_string()),
        ]);
    }

    println!("\n{}", table);
    println!(
        "{} of {} requests, first {}, last {}{}{}\n",
        list.items.len(),
        list.total,
        list.first.as_deref().unwrap_or("-"),
        list.last.as_deref().unwrap_or("-"),
        if list.is_start { ", at start" } else { "" },
        if list.is_end { ", at end" } else { "" },
    );
}

fn handle_status(ctx: &AppContext) -> Result<()> {
    let store = open_store(ctx)?;
    let counts = store.counts().wrap_err("failed to query row counts")?;

    // in-memory databases have no file
    let db_size_str = if ctx.db_path == ":memory:" {
        "N/A (in-memory)".to_string()
    } else {
        match std::fs::metadata(&ctx.db_path) {
            Ok(metadata) => format!("{} MB", metadata.len() / 1_000_000),
            Err(_) => "N/A (file not found)".to_string(),
        }
    };

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Database Path", ctx.db_path.as_str()]);
    table.add_row(vec!["DB Size", &db_size_str]);
    table.add_row(vec!["Transactions", &counts.transactions.to_string()]);
    table.add_row(vec!["Classified Calls", &counts.classified.to_string()]);
    table.add_row(vec!["Accounts", &counts.accounts.to_string()]);
    table.add_row(vec!["Contracts", &counts.contracts.to_string()]);
    table.add_row(vec!["Withdraw Requests", &counts.withdraw_requests.to_string()]);
    println!("\n{}\n", table);

    info!(
        transactions = counts.transactions,
        classified = counts.classified,
        db_path = %ctx.db_path,
        "status command completed"
    );
    Ok(())
}

/// Formats a Wei amount as FTM with 6 decimals.
fn format_ftm(wei: U256) -> String {
    let unit = U256::from(1_000_000_000_000_000_000u128);
    let scale = U256::from(1_000_000u64);

    let whole = wei / unit;
    let fractional = ((wei % unit) * scale) / unit;
    format!("{whole}.{:06} FTM", fractional.to::<u64>())
}

fn format_time(unix: u64) -> String {
    i64::try_from(unix)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
