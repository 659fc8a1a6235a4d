use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use tokio::task;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vsr_voting_power::account_fetcher::VsrAccountFetcher;
use vsr_voting_power::aggregator::PowerAggregator;
use vsr_voting_power::config::Config;
use vsr_voting_power::deserializers::RegistrarConfig;
use vsr_voting_power::multiplier::create_model;
use vsr_voting_power::report::{BatchReport, ReferenceCheck};
use vsr_voting_power::vsr_interface::DecodeError;

/// Deviation above which a reference check is logged as a warning
const REFERENCE_TOLERANCE_PERCENT: f64 = 1.0;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_from_file(&config_path)?;

    // Initialize logging system first
    init_logging(&config.output.log_dir)?;

    print_banner();

    info!("Configuration loaded from: {}", config_path);
    info!("RPC URL: {}", config.rpc.url);
    info!("Layout: {}", config.layout.variant);
    info!("Wallets to compute: {}", config.wallets.len());
    for wallet in &config.wallets {
        info!("  - {} ({})", wallet.name.as_deref().unwrap_or("-"), wallet.address);
    }

    let workers = config.worker_threads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("failed to build rayon thread pool")?;
    info!("Worker threads: {}", workers);

    let started = Instant::now();
    let registry = config.layout_registry()?;
    let variant = config.layout_variant();
    let layout = registry.resolve(&variant)?.clone();
    let policy = config.multiplier_policy()?;
    info!("Multiplier policy: {}", policy.description());
    let program_id = config.program_id()?;

    let fetcher = Arc::new(VsrAccountFetcher::new(
        &config.rpc.url,
        program_id,
        config.commitment()?,
        Duration::from_secs(config.rpc.timeout_secs),
    ));

    // 🔥 Registrar：优先链上数据，失败时使用配置中的 [registrar]
    let registrar = resolve_registrar(&config, fetcher.clone()).await?;

    // 🔥 一次性拉取全部 voter 账户（时间点快照）
    let snapshot = {
        let fetcher = fetcher.clone();
        let layout = layout.clone();
        let variant = variant.clone();
        task::spawn_blocking(move || fetcher.fetch_snapshot(&layout, &variant))
            .await
            .context("snapshot fetch task panicked")??
    };

    let decoded = snapshot.decode(&registry, &config.filters);
    let stats = decoded.stats();
    info!(
        "📦 Snapshot @{}: {} voters, {} rejected, {} deposits, {} slots filtered, {} delegated",
        decoded.fetched_at,
        stats.accounts,
        stats.rejected_accounts,
        stats.deposits,
        stats.rejected_slots,
        stats.delegated_accounts
    );

    let aggregator = PowerAggregator::new(
        registrar,
        create_model(policy),
        config.filters.token_decimals,
        decoded.fetched_at,
    );
    let queries = config.wallet_queries()?;
    if queries.is_empty() {
        warn!("⚠️  No [[wallets]] configured, report will only contain snapshot stats");
    }
    let wallets = aggregator.compute_batch(&queries, &decoded);

    for power in &wallets {
        info!(
            wallet = %power.wallet,
            native = power.native_power,
            delegated = power.delegated_power,
            deposits = power.deposits.len(),
            "wallet computed"
        );
    }

    let checks: Vec<ReferenceCheck> = config
        .wallets
        .iter()
        .zip(&wallets)
        .filter_map(|(wallet, power)| {
            wallet
                .expected_native
                .map(|expected| ReferenceCheck::new(&power.wallet, expected, power.native_power))
        })
        .collect();
    for check in &checks {
        if check.deviation_percent.abs() > REFERENCE_TOLERANCE_PERCENT {
            warn!(
                "⚠️  {}: native {:.6} vs expected {:.6} ({:+.2}%)",
                check.wallet, check.actual, check.expected, check.deviation_percent
            );
        } else {
            info!(
                "✅ {}: native {:.6} within {:.2}% of expected",
                check.wallet, check.actual, check.deviation_percent.abs()
            );
        }
    }

    let report = BatchReport::new(
        decoded.fetched_at,
        program_id.to_string(),
        layout.name.clone(),
        aggregator.model_name().to_string(),
        registrar,
        stats,
        wallets,
        checks,
    );
    println!("{}", report.format_summary());

    if let Err(e) = report.write_json(&config.output.report_path) {
        error!("❌ Failed to write report: {:#}", e);
        return Err(e);
    }
    info!(
        "✅ Report written to {} in {:.2}s",
        config.output.report_path,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}

async fn resolve_registrar(config: &Config, fetcher: Arc<VsrAccountFetcher>) -> Result<RegistrarConfig> {
    let fallback = config.registrar;

    let Some(address) = config.registrar_address()? else {
        return fallback.ok_or_else(|| {
            anyhow!(DecodeError::RegistrarUnavailable(
                "no [rpc].registrar address and no [registrar] fallback".to_string()
            ))
        });
    };

    let mint_index = config.rpc.voting_mint_index;
    let fetched = task::spawn_blocking(move || fetcher.fetch_registrar(&address, mint_index))
        .await
        .context("registrar fetch task panicked")?;

    match (fetched, fallback) {
        (Ok(registrar), _) => Ok(registrar),
        (Err(e), Some(fallback)) => {
            warn!("⚠️  Registrar {} unavailable ({:#}), using [registrar] from config", address, e);
            Ok(fallback)
        }
        (Err(e), None) => bail!(DecodeError::RegistrarUnavailable(format!("{}: {:#}", address, e))),
    }
}

fn init_logging(log_dir: &str) -> Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(log_dir).ok();

    // File appender with daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "vsr-voting-power.log");

    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Determine log level from environment variable or default to INFO
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // Terminal layer: colored, human-readable
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false)
                .compact(),
        )
        // File layer: JSON format for analysis
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false).json())
        .init();

    // Prevent the guard from being dropped
    std::mem::forget(_guard);

    Ok(())
}

fn print_banner() {
    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║                                                           ║");
    println!("║   🦀 VSR Voting Power - Version 0.1.0                     ║");
    println!("║                                                           ║");
    println!("║   Snapshot voter accounts, decode deposits and lockups   ║");
    println!("║   Native + delegated governance power per wallet         ║");
    println!("║                                                           ║");
    println!("╚═══════════════════════════════════════════════════════════╝\n");
}
