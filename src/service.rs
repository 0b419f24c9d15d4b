//! Signal service: wires the pipeline and exposes the operating facade
//!
//! Discovery events flow queue -> analysis -> scoring -> generation ->
//! tracking -> webhook delivery. The service owns every component with an
//! explicit `new -> start -> stop` lifecycle and persists state through
//! the storage collaborator.

use crate::client::{MarketDataProvider, TokenAnalyzer};
use crate::config::Config;
use crate::error::Result;
use crate::gate::{CooldownGate, RateGate};
use crate::ingester::{QueueItem, QueueProcessor, QueueStats, QueueWorker};
use crate::model::RugScorer;
use crate::notify::{DispatchResult, WebhookConfig, WebhookDispatcher};
use crate::signals::{
    CorrelationConfig, KellyConfig, SignalConfig, SignalEvent, SignalGenerator, SignalInput,
    SignalTracker,
};
use crate::storage::{PersistedState, SignalStore};
use crate::types::{PerformanceMetrics, SignalFilter, SignalOutcome, TradingSignal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The analysis chain shared by the queue worker and the facade
struct Core {
    generator: SignalGenerator,
    tracker: Arc<SignalTracker>,
    dispatcher: Arc<WebhookDispatcher>,
    store: Arc<dyn SignalStore>,
    analyzer: Arc<dyn TokenAnalyzer>,
    market_data: Arc<dyn MarketDataProvider>,
    scorer: Arc<dyn RugScorer>,
    gate: Arc<dyn RateGate>,
    delivery_chat: String,
    dry_run: bool,
}

impl Core {
    /// Run one analyzed candidate through generation, tracking and delivery
    async fn process_analysis(&self, input: SignalInput) -> Result<Option<TradingSignal>> {
        let mint = input.analysis.mint.clone();

        if let Some(price) = input.market.price_usd.to_f64() {
            self.generator.correlation().record_price(&mint, price);
        }

        let active = self.tracker.get_active_signals();
        let outcomes = self.tracker.recorded_outcomes();

        let Some(signal) = self.generator.generate(&input, &active, &outcomes) else {
            return Ok(None);
        };

        if !self.tracker.add_signal(signal.clone()) {
            debug!("Signal for {} dropped: tracker at capacity", mint);
            return Ok(None);
        }

        if self.dry_run {
            info!(
                "[dry-run] Suppressing delivery of {} signal for {}",
                signal.signal_type, signal.symbol
            );
        } else {
            let results = self.dispatcher.dispatch_signal(&signal).await;
            if results.iter().any(|r| r.success) {
                self.gate.mark_sent(&self.delivery_chat, &signal.mint);
            }
            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                warn!(
                    "{} webhook deliveries failed for signal {}",
                    failed, signal.id
                );
            }
        }

        if let Err(e) = self.save_state().await {
            warn!("State save failed after signal {}: {}", signal.id, e);
        }

        Ok(Some(signal))
    }

    async fn save_state(&self) -> Result<()> {
        let (signals, outcomes) = self.tracker.snapshot();
        let state = PersistedState {
            signals,
            outcomes,
            webhooks: self.dispatcher.list_endpoints(),
        };
        self.store.save_state(&state).await
    }
}

#[async_trait::async_trait]
impl QueueWorker for Core {
    async fn process(&self, item: QueueItem) -> Result<()> {
        debug!("Analyzing {} (from {})", item.mint, item.source);

        let Some(analysis) = self.analyzer.analyze(&item.mint).await? else {
            debug!("No analysis available for {}, skipping", item.mint);
            return Ok(());
        };
        let Some(market) = self.market_data.snapshot(&item.mint).await? else {
            debug!("No market data for {}, skipping", item.mint);
            return Ok(());
        };
        let ml = self.scorer.score(&analysis, &market).await?;

        self.process_analysis(SignalInput {
            analysis,
            ml,
            market,
        })
        .await?;
        Ok(())
    }
}

pub struct SignalService {
    core: Arc<Core>,
    queue: Arc<QueueProcessor>,
}

impl SignalService {
    /// Build the full pipeline from config and the external collaborators
    pub fn new(
        config: &Config,
        analyzer: Arc<dyn TokenAnalyzer>,
        market_data: Arc<dyn MarketDataProvider>,
        scorer: Arc<dyn RugScorer>,
        store: Arc<dyn SignalStore>,
        dry_run: bool,
    ) -> Result<Self> {
        let gate: Arc<dyn RateGate> = Arc::new(CooldownGate::new(
            config.gate.min_send_interval_secs,
            config.gate.token_send_cooldown_secs,
        ));
        let dispatcher = Arc::new(WebhookDispatcher::new(config.delivery.clone())?);
        for endpoint in &config.webhooks {
            dispatcher.add_endpoint(endpoint.clone());
        }
        Self::with_parts(config, analyzer, market_data, scorer, store, dispatcher, gate, dry_run)
    }

    /// Wiring entry point with every component injectable (used by tests)
    #[allow(clippy::too_many_arguments)]
    pub fn with_parts(
        config: &Config,
        analyzer: Arc<dyn TokenAnalyzer>,
        market_data: Arc<dyn MarketDataProvider>,
        scorer: Arc<dyn RugScorer>,
        store: Arc<dyn SignalStore>,
        dispatcher: Arc<WebhookDispatcher>,
        gate: Arc<dyn RateGate>,
        dry_run: bool,
    ) -> Result<Self> {
        let generator = SignalGenerator::new(
            config.signals.clone(),
            config.kelly.clone(),
            config.correlation.clone(),
        )?;
        let tracker = Arc::new(SignalTracker::new(config.tracker.clone()));

        let core = Arc::new(Core {
            generator,
            tracker,
            dispatcher,
            store,
            analyzer,
            market_data,
            scorer,
            gate: gate.clone(),
            delivery_chat: config.queue.delivery_chat.clone(),
            dry_run,
        });

        let queue = Arc::new(QueueProcessor::new(
            config.queue.clone(),
            gate,
            core.clone(),
        ));

        Ok(Self { core, queue })
    }

    /// Restore persisted state and spawn the background tasks
    pub async fn start(&self) -> Result<()> {
        let state = self.core.store.load_state().await?;
        if !state.webhooks.is_empty() {
            self.core.dispatcher.restore_endpoints(state.webhooks);
        }
        if !state.signals.is_empty() || !state.outcomes.is_empty() {
            self.core.tracker.restore(state.signals, state.outcomes);
        }

        // Lifecycle log sink
        let mut events = self.core.tracker.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    SignalEvent::Added { signal } => {
                        debug!("Signal added: {} {}", signal.signal_type, signal.symbol)
                    }
                    SignalEvent::Expired { signal_id, mint } => {
                        info!("Signal {} for {} expired", signal_id, mint)
                    }
                    SignalEvent::OutcomeRecorded {
                        signal_id,
                        profit_loss_percent,
                    } => info!(
                        "Outcome for {}: {:+.1}%",
                        signal_id, profit_loss_percent
                    ),
                }
            }
        });

        self.core.tracker.start_sweeper();
        self.queue.start();
        info!("Signal service started");
        Ok(())
    }

    /// Stop background work (in-flight analyses finish) and save state
    pub async fn stop(&self) -> Result<()> {
        self.queue.stop().await;
        self.core.tracker.stop().await;
        self.core.save_state().await?;
        info!("Signal service stopped");
        Ok(())
    }

    // ---- pipeline facade ----

    /// Hand a discovery event to the queue
    pub fn enqueue_discovery(&self, item: QueueItem) -> bool {
        self.queue.enqueue(item)
    }

    pub fn queue_processor(&self) -> Arc<QueueProcessor> {
        self.queue.clone()
    }

    /// Run one pre-assembled analysis through the decision chain
    pub async fn process_analysis(&self, input: SignalInput) -> Result<Option<TradingSignal>> {
        self.core.process_analysis(input).await
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    // ---- signal queries and lifecycle ----

    pub fn get_active_signals(&self) -> Vec<TradingSignal> {
        self.core.tracker.get_active_signals()
    }

    pub fn get_signals(&self, filter: &SignalFilter) -> Vec<TradingSignal> {
        self.core.tracker.get_signals(filter)
    }

    pub fn acknowledge_signal(&self, id: Uuid) -> bool {
        self.core.tracker.acknowledge_signal(id)
    }

    pub async fn record_outcome(
        &self,
        id: Uuid,
        actual_entry: Decimal,
        actual_exit: Decimal,
    ) -> Result<SignalOutcome> {
        let outcome = self.core.tracker.record_outcome(id, actual_entry, actual_exit)?;
        if let Err(e) = self.core.save_state().await {
            warn!("State save failed after outcome {}: {}", id, e);
        }
        Ok(outcome)
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.core.tracker.calculate_metrics()
    }

    pub fn get_diversification_score(&self) -> f64 {
        self.core
            .generator
            .correlation()
            .diversification_score(&self.core.tracker.get_active_signals())
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SignalEvent> {
        self.core.tracker.subscribe()
    }

    // ---- webhook management ----

    pub async fn add_webhook(&self, endpoint: WebhookConfig) -> Uuid {
        let id = self.core.dispatcher.add_endpoint(endpoint);
        if let Err(e) = self.core.save_state().await {
            warn!("State save failed after webhook add: {}", e);
        }
        id
    }

    pub async fn remove_webhook(&self, id: Uuid) -> bool {
        let removed = self.core.dispatcher.remove_endpoint(id);
        if removed {
            if let Err(e) = self.core.save_state().await {
                warn!("State save failed after webhook remove: {}", e);
            }
        }
        removed
    }

    pub fn set_webhook_enabled(&self, id: Uuid, enabled: bool) -> bool {
        self.core.dispatcher.set_enabled(id, enabled)
    }

    pub fn list_webhooks(&self) -> Vec<WebhookConfig> {
        self.core.dispatcher.list_endpoints()
    }

    /// Deliver a signal directly, bypassing generation. Used by the CLI
    /// webhook test command.
    pub async fn dispatch_signal(&self, signal: &TradingSignal) -> Vec<DispatchResult> {
        self.core.dispatcher.dispatch_signal(signal).await
    }

    // ---- config management ----

    pub fn signal_config(&self) -> SignalConfig {
        self.core.generator.config()
    }

    pub fn set_signal_config(&self, config: SignalConfig) -> Result<()> {
        self.core.generator.set_config(config)
    }

    pub fn kelly_config(&self) -> KellyConfig {
        self.core.generator.kelly().config()
    }

    pub fn set_kelly_config(&self, config: KellyConfig) {
        self.core.generator.kelly().set_config(config);
    }

    pub fn correlation_config(&self) -> CorrelationConfig {
        self.core.generator.correlation().config()
    }

    pub fn set_correlation_config(&self, config: CorrelationConfig) -> Result<()> {
        config
            .validate()
            .map_err(crate::error::BotError::Config)?;
        self.core.generator.correlation().set_config(config);
        Ok(())
    }
}
