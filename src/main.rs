//! Memecoin signal engine CLI

use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokenpulse::{
    client::{AnalysisClient, MarketDataClient},
    config::Config,
    ingester::DiscoveryFeed,
    model::{HeuristicScorer, RemoteScorer, RugScorer},
    notify::{WebhookConfig, WebhookFormat},
    service::SignalService,
    storage::{Database, SignalStore},
    types::{PositionSizeKind, SignalFilter, SignalStatus, SignalType, TradingSignal},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tokenpulse")]
#[command(about = "Analyzes freshly discovered tokens and pushes trading signals to webhooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signal engine
    Run {
        /// Generate and track signals but suppress webhook delivery
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored signals
    Signals {
        /// Only signals still active
        #[arg(long)]
        active: bool,
    },
    /// Show aggregate signal performance
    Metrics,
    /// Send a synthetic signal to a webhook URL
    TestWebhook {
        url: String,
        /// Payload format: generic, discord or slack
        #[arg(long, default_value = "generic")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => run(config, dry_run).await,
        Commands::Signals { active } => list_signals(config, active).await,
        Commands::Metrics => show_metrics(config).await,
        Commands::TestWebhook { url, format } => test_webhook(config, url, format).await,
    }
}

async fn run(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting tokenpulse signal engine");
    if dry_run {
        tracing::warn!("Running in DRY RUN mode - webhook delivery suppressed");
    }

    let analysis_url = config
        .services
        .analysis_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("services.analysis_url is required to run"))?;
    let market_data_url = config
        .services
        .market_data_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("services.market_data_url is required to run"))?;
    let timeout = config.services.request_timeout_secs;

    let analyzer = Arc::new(AnalysisClient::new(&analysis_url, timeout)?);
    let market_data = Arc::new(MarketDataClient::new(&market_data_url, timeout)?);
    let scorer: Arc<dyn RugScorer> = match &config.services.model_url {
        Some(url) => {
            tracing::info!("Using remote rug model at {}", url);
            Arc::new(RemoteScorer::new(url.clone(), timeout)?)
        }
        None => {
            tracing::warn!("No model endpoint configured, using heuristic scorer");
            Arc::new(HeuristicScorer)
        }
    };

    let store: Arc<dyn SignalStore> = Arc::new(Database::connect(&config.database.path).await?);

    let service = Arc::new(SignalService::new(
        &config,
        analyzer,
        market_data,
        scorer,
        store,
        dry_run,
    )?);
    service.start().await?;

    // Discovery feed, when configured
    if let Some(discovery) = &config.discovery {
        let feed = DiscoveryFeed::new(
            discovery.url.clone(),
            discovery.source.clone(),
            discovery.poll_interval_secs,
        )?;
        let processor = service.queue_processor();
        tokio::spawn(async move {
            if let Err(e) = feed.run(processor).await {
                tracing::error!("Discovery feed error: {}", e);
            }
        });
        tracing::info!("Discovery feed started ({})", discovery.url);
    } else {
        tracing::warn!("No discovery feed configured; waiting for library enqueues only");
    }

    // Periodic stats until ctrl-c
    let stats_service = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = stats_service.queue_stats();
            let metrics = stats_service.get_performance_metrics();
            tracing::info!(
                "Queue: {} pending, {} in flight | Signals: {} active, {} total, {:.0}% win rate",
                stats.queue_size,
                stats.active_analyses,
                metrics.active_signals,
                metrics.total_signals,
                metrics.win_rate * 100.0
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    service.stop().await?;
    Ok(())
}

async fn list_signals(config: Config, active: bool) -> anyhow::Result<()> {
    let store = Database::connect(&config.database.path).await?;
    let state = store.load_state().await?;

    let filter = SignalFilter {
        status: active.then_some(SignalStatus::Active),
        ..Default::default()
    };

    let mut signals: Vec<_> = state.signals.iter().filter(|s| filter.matches(s)).collect();
    signals.sort_by_key(|s| std::cmp::Reverse(s.generated_at));

    println!("\n{:<6} {:<10} {:<6} {:<13} {:<20}", "Type", "Symbol", "Conf", "Status", "Generated");
    println!("{}", "-".repeat(60));
    for signal in signals {
        println!(
            "{:<6} {:<10} {:<6} {:<13} {}",
            signal.signal_type.to_string(),
            signal.symbol,
            signal.confidence,
            format!("{:?}", signal.status).to_lowercase(),
            signal.generated_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

async fn show_metrics(config: Config) -> anyhow::Result<()> {
    let store = Database::connect(&config.database.path).await?;
    let state = store.load_state().await?;

    let recorded: Vec<_> = state.outcomes.iter().filter(|o| o.is_recorded()).collect();
    let wins = recorded
        .iter()
        .filter(|o| o.profit_loss_percent.unwrap_or(0.0) > 0.0)
        .count();
    let total_pnl: f64 = recorded.iter().filter_map(|o| o.profit_loss_percent).sum();

    println!("\n📊 Signal Performance\n");
    println!("Signals stored:    {}", state.signals.len());
    println!("Outcomes recorded: {}", recorded.len());
    if !recorded.is_empty() {
        println!(
            "Win rate:          {:.1}%",
            wins as f64 / recorded.len() as f64 * 100.0
        );
        println!("Total P/L:         {:+.1}%", total_pnl);
    }
    Ok(())
}

async fn test_webhook(config: Config, url: String, format: String) -> anyhow::Result<()> {
    use tokenpulse::notify::WebhookDispatcher;

    let format = match format.as_str() {
        "discord" => WebhookFormat::Discord,
        "slack" => WebhookFormat::Slack,
        _ => WebhookFormat::Generic,
    };

    let dispatcher = WebhookDispatcher::new(config.delivery.clone())?;
    dispatcher.add_endpoint(WebhookConfig::new("test", url, format));

    let now = chrono::Utc::now();
    let signal = TradingSignal {
        id: uuid::Uuid::new_v4(),
        mint: "So11111111111111111111111111111111111111112".to_string(),
        symbol: "TEST".to_string(),
        name: "Test Signal".to_string(),
        signal_type: SignalType::Buy,
        confidence: 75,
        position_size: dec!(2.5),
        position_size_kind: PositionSizeKind::PercentOfBankroll,
        rug_probability: 0.1,
        smart_money_score: 0.8,
        momentum_score: 0.7,
        holder_score: 0.6,
        risk_score: 80.0,
        entry_price: dec!(0.000045),
        target_price: Some(dec!(0.0000585)),
        stop_loss_price: Some(dec!(0.00003825)),
        liquidity_usd: dec!(50000),
        holder_count: 1200,
        top10_holder_percent: 22.0,
        price_change_1h: 30.0,
        reasons: vec!["Test delivery from the tokenpulse CLI".to_string()],
        warnings: vec![],
        generated_at: now,
        expires_at: now + chrono::Duration::hours(6),
        status: SignalStatus::Active,
    };

    let results = dispatcher.dispatch_signal(&signal).await;
    for result in results {
        if result.success {
            println!("✅ Delivered to {} (HTTP {})", result.endpoint_name, result.status.unwrap_or(0));
        } else {
            println!(
                "❌ Failed after {} attempts: {}",
                result.retry_count,
                result.error.unwrap_or_default()
            );
        }
    }
    Ok(())
}
