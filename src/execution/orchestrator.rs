//! Per-tick execution pipeline.
//!
//! A tick loads the ledger history, derives governance, agent tiers and pair
//! allocations, then walks a small number of candidates strictly in order:
//! pair ban, pair restriction, friction gate, discovery overlay, sizing,
//! dedup, insert-before-submit, long-only safety net, broker submission.
//! Every candidate ends as exactly one ledger row (or a `db_error` outcome
//! when the ledger itself failed).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::coordination::CircuitBreakerView;
use crate::domain::{
    slippage_pips, CloseDetails, Direction, Environment, NewOrder, OrderFinalization, OrderRecord, OrderStatus,
    Signal, SignalSource,
};
use crate::error::{GovexError, Result};
use crate::exchange::{BrokerClient, MarketOrderRequest, PriceQuote};
use crate::governance::{
    allocate, allocate_pairs, friction, market_closed, resolve_roster, sizing, AgentSnapshot,
    AgentStats, DiscoveryContext, DiscoveryLabel, DiscoveryOutcome, DiscoveryRules, FrictionCheck,
    GovernanceConfig, GovernanceSnapshot, GovernanceState, PairAllocation, PairRestrictionMode,
    PairStats, SizeDecision, SizeMultipliers,
};
use crate::persistence::{InsertOutcome, OrderLedger};
use crate::safety::{enforce_long_only, parse_requested_direction, preflight};

use super::context::{PriceCache, TickContext};
use super::idempotency::candidate_key;
use super::quality::execution_quality;
use super::report::{
    BalanceSource, CandidateOutcome, ExecutionSummary, GovernanceSummary, TickReport,
};
use super::retry::{submit_with_retry, RetryPolicy};
use super::selection::{eligible, weighted_pick};

/// Wall clock used for session and dedup decisions
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Invocation parameters for one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickRequest {
    /// Process exactly one candidate, bypassing the weekend guard, the
    /// session budget, the discovery overlay and governance gating (the
    /// candidate is gated as under NORMAL). Pair bans and breakers still apply.
    #[serde(default)]
    pub force: bool,
    /// Trade this pair instead of the signal's choice
    #[serde(default)]
    pub pair: Option<String>,
    /// Only "long" (or nothing) is accepted
    #[serde(default)]
    pub direction: Option<String>,
    /// Run the live preflight and return without evaluating candidates
    #[serde(default)]
    pub preflight: bool,
    /// Re-deliver a previous tick; candidates reuse that tick's keys
    #[serde(default)]
    pub tick_id: Option<Uuid>,
}

/// Inputs shared by every candidate of a tick
struct TickInputs {
    governance: GovernanceSnapshot,
    allocations: BTreeMap<String, PairAllocation>,
    breakers: CircuitBreakerView,
    balance: Decimal,
    history: Vec<OrderRecord>,
}

/// What the candidate loop does after a candidate
enum Flow {
    Next,
    /// A broker call was made; wait before the next one
    Submitted,
    /// Stop processing the tick
    Abort(String),
}

#[derive(Serialize)]
struct CandidatePayload<'a> {
    tick_id: Uuid,
    forced: bool,
    governance_state: GovernanceState,
    effective_state: GovernanceState,
    governance_reasons: &'a [String],
    circuit_breaker: Option<&'a str>,
    agent_tier: &'static str,
    agent_constraints: &'a [String],
    signal_direction: Direction,
    regime: &'static str,
    composite_score: f64,
    pair_allocation: Option<&'a PairAllocation>,
    friction: Option<&'a FrictionCheck>,
    discovery: Option<&'a DiscoveryOutcome>,
    sizing: Option<&'a SizeDecision>,
}

pub struct ExecutionEngine {
    config: AppConfig,
    ledger: Arc<dyn OrderLedger>,
    broker: Arc<dyn BrokerClient>,
    signals: Arc<dyn SignalSource>,
    discovery: DiscoveryRules,
    prices: Mutex<PriceCache>,
    tick_lock: Mutex<()>,
    clock: Clock,
}

impl ExecutionEngine {
    pub fn new(
        config: AppConfig,
        ledger: Arc<dyn OrderLedger>,
        broker: Arc<dyn BrokerClient>,
        signals: Arc<dyn SignalSource>,
    ) -> Self {
        let discovery = DiscoveryRules::curated(
            &config.discovery.blocked_agents,
            config.discovery.max_spread_pips,
        );
        debug!(rules = discovery.rules().len(), "Discovery rules loaded");
        let prices = PriceCache::new(Duration::from_secs(config.execution.price_cache_ttl_secs));
        Self {
            config,
            ledger,
            broker,
            signals,
            discovery,
            prices: Mutex::new(prices),
            tick_lock: Mutex::new(()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests, replays)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.execution.max_retries,
            backoff: Duration::from_millis(self.config.execution.retry_backoff_ms),
        }
    }

    /// Seed for the tick's RNG. Derived from the tick id so a re-delivered
    /// tick draws the same agents and pairs.
    fn tick_seed(&self, tick_id: Uuid) -> u64 {
        let bits = tick_id.as_u128();
        let (hi, lo) = ((bits >> 64) as u64, bits as u64);
        self.config.execution.rng_seed.unwrap_or(0) ^ hi ^ lo.rotate_left(17)
    }

    /// Run one tick. Ticks are serialized; a second caller waits.
    #[instrument(skip(self, request), fields(force = request.force))]
    pub async fn run_tick(&self, request: TickRequest) -> Result<TickReport> {
        let _guard = self.tick_lock.lock().await;

        let direction = parse_requested_direction(request.direction.as_deref())?;
        let pair_override = match request.pair.as_deref() {
            Some(raw) => Some(normalize_pair(raw)?),
            None => None,
        };

        let environment = self.config.execution.environment;
        if self.broker.environment() != environment {
            return Err(GovexError::Validation(format!(
                "broker client targets {} but execution environment is {}",
                self.broker.environment(),
                environment
            )));
        }

        let tick_id = request.tick_id.unwrap_or_else(Uuid::new_v4);
        let now = (self.clock)();
        let mut ctx = TickContext::new(tick_id, now, Some(self.tick_seed(tick_id)));
        info!(%tick_id, session = %ctx.session, %environment, "Tick started");

        let reconciled_closes = self.reconcile_closed_trades().await;

        let limit = self.config.execution.history_limit;
        let (history, filled, (balance, balance_source), breaker_records) = tokio::try_join!(
            self.ledger.recent_orders(environment, limit),
            self.ledger.filled_orders(environment, limit),
            self.fetch_balance(),
            self.ledger.active_circuit_breakers(now),
        )?;

        let governance = GovernanceSnapshot::from_history(&history);
        let agent_stats = AgentStats::aggregate(&filled);
        let agents = resolve_roster(&agent_stats, &self.config.agents.roster);
        let allocations = allocate_pairs(&self.config.execution.pairs, &history);
        let breakers = CircuitBreakerView::new(breaker_records, now);

        info!(
            state = %governance.state,
            reasons = ?governance.reasons,
            agents = agents.len(),
            eligible = agents.iter().filter(|a| a.can_execute).count(),
            breakers = breakers.active().len(),
            "Governance evaluated"
        );

        let mut quote_pairs = self.config.execution.pairs.clone();
        if let Some(pair) = &pair_override {
            if !quote_pairs.contains(pair) {
                quote_pairs.push(pair.clone());
            }
        }
        ctx.quotes = self.refresh_quotes(&quote_pairs).await;

        let mut report = TickReport {
            tick_id,
            forced: request.force,
            started_at: now,
            duration_ms: 0,
            execution: ExecutionSummary {
                environment,
                session: ctx.session,
                budget: ctx.budget,
                candidate_budget: 0,
                balance,
                balance_source,
                pairs: self.config.execution.pairs.clone(),
                dedup_window_secs: self.config.execution.dedup_window_secs,
                max_retries: self.config.execution.max_retries,
            },
            governance: GovernanceSummary {
                state: governance.state,
                reasons: governance.reasons.clone(),
                config: governance.config.clone(),
            },
            agents: agents.clone(),
            pair_allocations: allocations.values().cloned().collect(),
            circuit_breakers: breakers.active().to_vec(),
            preflight: None,
            reconciled_closes,
            candidates: Vec::new(),
            skipped: None,
            aborted: None,
        };

        if environment.is_live() || request.preflight {
            let checks = preflight::run(
                self.ledger.as_ref(),
                self.config.preflight.long_only_cutover,
                &agents,
                &self.config.agents.roster,
            )
            .await?;
            let passed = checks.passed;
            let summary = checks.failure_summary();
            report.preflight = Some(checks);

            if request.preflight {
                report.skipped = Some("preflight only".to_string());
                return Ok(finish(report, &ctx));
            }
            if !passed {
                error!(%tick_id, failures = %summary, "Live preflight failed, refusing tick");
                report.skipped = Some(format!("live preflight failed: {summary}"));
                return Ok(finish(report, &ctx));
            }
        }

        if !request.force && market_closed(now) {
            info!("Market closed, no candidates this tick");
            report.skipped = Some("market closed".to_string());
            return Ok(finish(report, &ctx));
        }

        let candidate_budget = if request.force {
            1
        } else {
            candidate_budget(
                self.config.execution.max_candidates,
                ctx.budget.max_density,
                &governance.config,
                &ctx,
            )
        };
        report.execution.candidate_budget = candidate_budget;
        if candidate_budget == 0 {
            report.skipped = Some(format!("no candidate budget in {} session", ctx.session));
            return Ok(finish(report, &ctx));
        }

        let pool = eligible(&agents);
        if pool.is_empty() {
            warn!("No eligible agents");
            report.skipped = Some("no eligible agents".to_string());
            return Ok(finish(report, &ctx));
        }

        let inputs = TickInputs {
            governance,
            allocations,
            breakers,
            balance,
            history,
        };
        let submit_delay = Duration::from_millis(self.config.execution.submit_delay_ms);

        for index in 0..candidate_budget as usize {
            let Some(agent) = weighted_pick(&pool, &mut ctx.rng) else {
                break;
            };
            let Some(mut signal) =
                self.signals
                    .propose(&agent.agent_id, &self.config.execution.pairs, &mut ctx.rng)
            else {
                debug!(agent = %agent.agent_id, "Agent proposed nothing");
                continue;
            };
            if let Some(pair) = &pair_override {
                signal.pair = pair.clone();
            }

            let (outcome, flow) = self
                .process_candidate(&ctx, &inputs, index, agent, signal, direction, request.force)
                .await;
            info!(
                index,
                agent = %outcome.agent_id,
                pair = %outcome.pair,
                status = %outcome.status,
                units = outcome.units,
                "Candidate finished"
            );
            report.candidates.push(outcome);

            match flow {
                Flow::Next => {}
                Flow::Submitted => {
                    if index + 1 < candidate_budget as usize && !submit_delay.is_zero() {
                        tokio::time::sleep(submit_delay).await;
                    }
                }
                Flow::Abort(reason) => {
                    warn!(%tick_id, %reason, "Tick aborted");
                    report.aborted = Some(reason);
                    break;
                }
            }
        }

        Ok(finish(report, &ctx))
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_candidate(
        &self,
        ctx: &TickContext,
        inputs: &TickInputs,
        index: usize,
        agent: &AgentSnapshot,
        signal: Signal,
        direction: Direction,
        force: bool,
    ) -> (CandidateOutcome, Flow) {
        let pair = signal.pair.clone();
        let environment = self.config.execution.environment;
        let spread = ctx.spread_pips(&pair);

        if signal.direction != direction {
            debug!(agent = %agent.agent_id, %pair, signal = %signal.direction, "Signal direction overridden to long");
        }

        // Breakers and bans hold under force; governance gating does not.
        let breaker = inputs.breakers.trip_for(&pair);
        let (effective_state, effective): (GovernanceState, GovernanceConfig) = match breaker {
            Some(_) => (GovernanceState::Halt, GovernanceState::Halt.config()),
            None if force => (GovernanceState::Normal, GovernanceState::Normal.config()),
            None => (inputs.governance.state, inputs.governance.config.clone()),
        };

        let allocation = inputs
            .allocations
            .get(&pair)
            .cloned()
            .unwrap_or_else(|| allocate(&PairStats::from_history(&pair, &inputs.history)));

        let mut draft = CandidateDraft {
            ctx,
            inputs,
            index,
            agent,
            signal: &signal,
            direction,
            environment,
            force,
            effective_state,
            breaker: breaker.map(|b| b.reason.as_str()),
            allocation: &allocation,
            friction: None,
            discovery: None,
            sizing: None,
            spread,
        };

        if allocation.banned {
            let reasons = prefixed("pair banned", &allocation.reasons);
            return (self.record_policy(&draft, OrderStatus::PairBanned, reasons, 0).await, Flow::Next);
        }

        if restricted_under(effective.pair_mode, &allocation) {
            let mut reasons = vec![format!(
                "pair restricted under {} ({:?})",
                effective_state, effective.pair_mode
            )];
            reasons.extend(allocation.reasons.iter().cloned());
            return (
                self.record_policy(&draft, OrderStatus::PairRestricted, reasons, 0).await,
                Flow::Next,
            );
        }

        let gate = friction::check(&pair, &ctx.budget, effective.friction_k, spread);
        let untradeable = ctx.quote(&pair).map(|q| !q.tradeable).unwrap_or(false);
        let gate_passed = gate.passed() && !untradeable;
        let mut gate_reasons = gate.reasons.clone();
        if untradeable {
            gate_reasons.push("instrument not tradeable at broker".to_string());
        }
        draft.friction = Some(gate);
        if !gate_passed {
            return (self.record_policy(&draft, OrderStatus::Gated, gate_reasons, 0).await, Flow::Next);
        }

        let discovery = self.discovery.classify(
            &DiscoveryContext {
                session: ctx.session,
                regime: signal.regime,
                pair: &pair,
                direction,
                agent_id: &agent.agent_id,
                spread_pips: spread,
                composite_score: signal.composite_score,
            },
            force,
        );
        let blocked_rule = discovery.rule.clone();
        let multiplier = discovery.multiplier;
        let label = discovery.label;
        draft.discovery = Some(discovery);
        if label == DiscoveryLabel::Blocked {
            let reasons = vec![format!(
                "discovery blocked by {}",
                blocked_rule.as_deref().unwrap_or("fallback")
            )];
            return (
                self.record_policy(&draft, OrderStatus::DiscoveryBlocked, reasons, 0).await,
                Flow::Next,
            );
        }

        let decision = sizing::size(
            &pair,
            inputs.balance,
            signal.confidence,
            SizeMultipliers {
                governance: effective.sizing_multiplier,
                pair: allocation.capital_multiplier,
                session: ctx.budget.capital_budget,
                agent: agent.size_multiplier,
                discovery: multiplier,
            },
        );
        let units = decision.units;
        draft.sizing = Some(decision);

        match self.ledger.last_fill_on_pair(&pair, environment).await {
            Ok(Some(last)) if within_window(ctx.now, last, self.config.execution.dedup_window_secs) => {
                let reasons = vec![format!(
                    "{pair} filled at {} within {}s dedup window",
                    last.to_rfc3339(),
                    self.config.execution.dedup_window_secs
                )];
                return (self.record_policy(&draft, OrderStatus::Deduped, reasons, units).await, Flow::Next);
            }
            Ok(_) => {}
            Err(e) => {
                error!(%pair, error = %e, "Dedup lookup failed");
                return (draft.outcome(OrderStatus::DbError, None, units, Vec::new(), Some(e.to_string())), Flow::Next);
            }
        }

        let key = candidate_key(ctx.tick_id, index, &pair, &agent.agent_id, direction);
        let pending = if effective.live_submissions {
            OrderStatus::Submitted
        } else {
            OrderStatus::ShadowEval
        };
        let order = draft.new_order(pending, units, Some(key.clone()), gate_reasons.clone(), None);
        let order_id = order.id;

        match self.ledger.insert_order(&order).await {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::Duplicate) => {
                warn!(%pair, idempotency_key = %key, "Idempotency key already recorded");
                let reasons = vec![format!("idempotency key {key} already recorded")];
                return (
                    self.record_policy(&draft, OrderStatus::IdempotencyConflict, reasons, units).await,
                    Flow::Next,
                );
            }
            Err(e) => {
                error!(%pair, error = %e, "Order insert failed");
                return (draft.outcome(OrderStatus::DbError, None, units, Vec::new(), Some(e.to_string())), Flow::Next);
            }
        }

        let mut outcome = draft.outcome(pending, Some(order_id), units, gate_reasons, None);

        if pending == OrderStatus::ShadowEval {
            let why = match draft.breaker {
                Some(reason) => format!("circuit breaker: {reason}"),
                None => format!("{} governance: shadow evaluation only", effective_state),
            };
            outcome.reasons.push(why);
            return (outcome, Flow::Next);
        }

        if let Err(breach) = enforce_long_only(direction, &pair, units) {
            let message = breach.to_string();
            let details = OrderFinalization {
                error_message: Some(message.clone()),
                ..Default::default()
            };
            if let Err(e) = self.ledger.finalize_order(order_id, OrderStatus::Blocked, &details).await {
                error!(%order_id, error = %e, "Could not finalize blocked order");
            }
            outcome.status = OrderStatus::Blocked;
            outcome.error = Some(message.clone());
            return (outcome, Flow::Abort(message));
        }

        let request = MarketOrderRequest {
            instrument: pair.clone(),
            units,
            client_order_id: Some(key),
        };
        let submission = submit_with_retry(self.broker.as_ref(), &request, self.retry_policy()).await;
        outcome.broker_attempts = submission.attempts;
        let latency_ms = submission.latency.as_millis() as i64;

        match submission.result {
            Ok(fill) => {
                let quoted = ctx.quote(&pair).map(|q: &PriceQuote| q.ask);
                let slippage = quoted
                    .map(|ask| slippage_pips(&pair, direction, ask, fill.price))
                    .unwrap_or(0.0);
                let quality = execution_quality(&pair, slippage, latency_ms, spread);
                let details = OrderFinalization {
                    filled_units: Some(fill.units),
                    entry_price: Some(fill.price),
                    filled_at: Some(fill.time),
                    slippage_pips: Some(slippage),
                    fill_latency_ms: Some(latency_ms),
                    execution_quality: Some(quality),
                    spread_at_entry: spread,
                    broker_order_id: Some(fill.order_id.clone()),
                    broker_trade_id: fill.trade_id.clone(),
                    error_message: None,
                };
                if let Err(e) = self.ledger.finalize_order(order_id, OrderStatus::Filled, &details).await {
                    error!(%order_id, broker_order = %fill.order_id, error = %e, "Fill could not be recorded");
                    outcome.error = Some(e.to_string());
                }
                info!(%pair, units = fill.units, price = %fill.price, slippage, quality, "Order filled");
                outcome.status = OrderStatus::Filled;
                outcome.fill_price = Some(fill.price);
                (outcome, Flow::Submitted)
            }
            Err(broker_error) => {
                let message = broker_error.to_string();
                let details = OrderFinalization {
                    fill_latency_ms: Some(latency_ms),
                    spread_at_entry: spread,
                    error_message: Some(message.clone()),
                    ..Default::default()
                };
                if let Err(e) = self.ledger.finalize_order(order_id, OrderStatus::Rejected, &details).await {
                    error!(%order_id, error = %e, "Rejection could not be recorded");
                }
                warn!(%pair, attempts = submission.attempts, error = %message, "Order rejected");
                outcome.status = OrderStatus::Rejected;
                outcome.error = Some(message.clone());
                if broker_error.is_market_halted() {
                    (outcome, Flow::Abort(format!("market halted: {message}")))
                } else {
                    (outcome, Flow::Submitted)
                }
            }
        }
    }

    /// Persist a terminal row that never reaches the broker.
    async fn record_policy(
        &self,
        draft: &CandidateDraft<'_>,
        status: OrderStatus,
        reasons: Vec<String>,
        units: i64,
    ) -> CandidateOutcome {
        let order = draft.new_order(status, units, None, reasons.clone(), None);
        let id = order.id;
        match self.ledger.insert_order(&order).await {
            Ok(_) => draft.outcome(status, Some(id), units, reasons, None),
            Err(e) => {
                error!(pair = %order.pair, %status, error = %e, "Policy rejection could not be recorded");
                draft.outcome(status, None, units, reasons, Some(e.to_string()))
            }
        }
    }

    /// Attach exits of recently closed broker trades to their filled rows.
    #[instrument(skip(self))]
    async fn reconcile_closed_trades(&self) -> u32 {
        let closed = match self.broker.closed_trades(self.config.execution.reconcile_limit).await {
            Ok(closed) => closed,
            Err(e) => {
                warn!(error = %e, "Closed-trade reconciliation skipped");
                return 0;
            }
        };

        let mut attached = 0;
        for trade in closed {
            let close = CloseDetails {
                broker_trade_id: trade.trade_id.clone(),
                exit_price: trade.exit_price,
                closed_at: trade.closed_at,
            };
            match self.ledger.attach_close(&close).await {
                Ok(true) => attached += 1,
                Ok(false) => {}
                Err(e) => warn!(trade_id = %trade.trade_id, error = %e, "Close could not be attached"),
            }
        }
        if attached > 0 {
            info!(attached, "Reconciled closed trades");
        }
        attached
    }

    async fn fetch_balance(&self) -> Result<(Decimal, BalanceSource)> {
        match self.broker.account_summary().await {
            Ok(summary) if summary.balance > Decimal::ZERO => {
                Ok((summary.balance, BalanceSource::Broker))
            }
            Ok(summary) => {
                warn!(balance = %summary.balance, "Non-positive broker balance, using fallback");
                Ok((self.config.execution.fallback_balance, BalanceSource::Fallback))
            }
            Err(e) => {
                warn!(error = %e, "Account summary unavailable, using fallback balance");
                Ok((self.config.execution.fallback_balance, BalanceSource::Fallback))
            }
        }
    }

    /// Refresh stale quotes for `pairs` and return the fresh snapshot.
    async fn refresh_quotes(&self, pairs: &[String]) -> HashMap<String, PriceQuote> {
        let mut cache = self.prices.lock().await;
        let now = Instant::now();
        let stale = cache.stale_keys_at(pairs, now);
        if !stale.is_empty() {
            match self.broker.pricing(&stale).await {
                Ok(quotes) => {
                    debug!(requested = stale.len(), received = quotes.len(), "Quotes refreshed");
                    for quote in quotes {
                        cache.insert_at(quote.instrument.clone(), quote, now);
                    }
                }
                Err(e) => warn!(error = %e, "Pricing unavailable, continuing without quotes"),
            }
        }
        cache.purge_at(now);
        cache.snapshot_at(now)
    }
}

/// Borrowed state of the candidate being evaluated
struct CandidateDraft<'a> {
    ctx: &'a TickContext,
    inputs: &'a TickInputs,
    index: usize,
    agent: &'a AgentSnapshot,
    signal: &'a Signal,
    direction: Direction,
    environment: Environment,
    force: bool,
    effective_state: GovernanceState,
    breaker: Option<&'a str>,
    allocation: &'a PairAllocation,
    friction: Option<FrictionCheck>,
    discovery: Option<DiscoveryOutcome>,
    sizing: Option<SizeDecision>,
    spread: Option<f64>,
}

impl CandidateDraft<'_> {
    fn payload(&self) -> serde_json::Value {
        let payload = CandidatePayload {
            tick_id: self.ctx.tick_id,
            forced: self.force,
            governance_state: self.inputs.governance.state,
            effective_state: self.effective_state,
            governance_reasons: &self.inputs.governance.reasons,
            circuit_breaker: self.breaker,
            agent_tier: self.agent.effective_tier.as_str(),
            agent_constraints: &self.agent.constraints,
            signal_direction: self.signal.direction,
            regime: self.signal.regime.as_str(),
            composite_score: self.signal.composite_score,
            pair_allocation: Some(self.allocation),
            friction: self.friction.as_ref(),
            discovery: self.discovery.as_ref(),
            sizing: self.sizing.as_ref(),
        };
        serde_json::to_value(&payload).unwrap_or_default()
    }

    fn new_order(
        &self,
        status: OrderStatus,
        units: i64,
        idempotency_key: Option<String>,
        gate_reasons: Vec<String>,
        error_message: Option<String>,
    ) -> NewOrder {
        NewOrder {
            id: Uuid::new_v4(),
            pair: self.signal.pair.clone(),
            requested_units: units,
            status,
            confidence: self.signal.confidence,
            agent_id: self.agent.agent_id.clone(),
            environment: self.environment,
            created_at: self.ctx.now,
            spread_at_entry: self.spread,
            session_label: Some(self.ctx.session.as_str().to_string()),
            regime_label: Some(self.signal.regime.as_str().to_string()),
            gate_result: self.friction.as_ref().map(|f| f.verdict.as_str().to_string()),
            gate_reasons,
            governance_payload: self.payload(),
            idempotency_key,
            error_message,
        }
    }

    fn outcome(
        &self,
        status: OrderStatus,
        order_id: Option<Uuid>,
        units: i64,
        reasons: Vec<String>,
        error: Option<String>,
    ) -> CandidateOutcome {
        CandidateOutcome {
            index: self.index,
            agent_id: self.agent.agent_id.clone(),
            pair: self.signal.pair.clone(),
            direction: self.direction,
            status,
            order_id,
            units,
            discovery: self.discovery.as_ref().map(|d| d.label),
            reasons,
            fill_price: None,
            broker_attempts: 0,
            error,
        }
    }
}

fn finish(mut report: TickReport, ctx: &TickContext) -> TickReport {
    report.duration_ms = ctx.elapsed_ms();
    info!(
        tick_id = %report.tick_id,
        duration_ms = report.duration_ms,
        candidates = report.candidates.len(),
        filled = report.filled(),
        skipped = ?report.skipped,
        aborted = ?report.aborted,
        "Tick finished"
    );
    report
}

/// Candidates allowed this tick:
/// `min(max_candidates, round(density * density_multiplier * aggressiveness))`
pub fn candidate_budget(
    max_candidates: u32,
    max_density: u32,
    governance: &GovernanceConfig,
    ctx: &TickContext,
) -> u32 {
    let raw = max_density as f64
        * governance.density_multiplier
        * governance.aggressiveness.get(ctx.session);
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    (raw.round() as u32).min(max_candidates)
}

fn restricted_under(mode: PairRestrictionMode, allocation: &PairAllocation) -> bool {
    match mode {
        PairRestrictionMode::BannedOnly => false,
        PairRestrictionMode::ExcludeRestricted => allocation.restricted,
        PairRestrictionMode::TopPairsOnly => {
            allocation.restricted || allocation.capital_multiplier < 1.0
        }
    }
}

fn within_window(now: DateTime<Utc>, last: DateTime<Utc>, window_secs: i64) -> bool {
    now.signed_duration_since(last) < chrono::Duration::seconds(window_secs)
}

fn prefixed(head: &str, reasons: &[String]) -> Vec<String> {
    std::iter::once(head.to_string())
        .chain(reasons.iter().cloned())
        .collect()
}

/// Upper-case BASE_QUOTE instrument name
pub fn normalize_pair(raw: &str) -> Result<String> {
    let pair = raw.trim().to_ascii_uppercase().replace('/', "_");
    let mut parts = pair.split('_');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(base), Some(quote), None)
            if base.len() == 3
                && quote.len() == 3
                && base.chars().all(|c| c.is_ascii_alphabetic())
                && quote.chars().all(|c| c.is_ascii_alphabetic())
    );
    if valid {
        Ok(pair)
    } else {
        Err(GovexError::Validation(format!("'{raw}' is not a BASE_QUOTE instrument")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::domain::{Regime, StubSignalSource};
    use crate::exchange::MockBrokerClient;
    use crate::governance::tier::resolve;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn london_open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).unwrap()
    }

    fn inputs(now: DateTime<Utc>) -> TickInputs {
        TickInputs {
            governance: GovernanceSnapshot::from_history(&[]),
            allocations: BTreeMap::new(),
            breakers: CircuitBreakerView::new(Vec::new(), now),
            balance: dec!(10000),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn non_long_candidate_is_blocked_and_aborts_the_tick() {
        let ledger = Arc::new(MemoryLedger::new());
        let mut broker = MockBrokerClient::new();
        broker.expect_submit_market_order().never();
        let engine = ExecutionEngine::new(
            AppConfig::default_config(),
            ledger.clone(),
            Arc::new(broker),
            Arc::new(StubSignalSource),
        );

        let now = london_open();
        let mut ctx = TickContext::new(Uuid::new_v4(), now, Some(1));
        ctx.quotes.insert(
            "EUR_USD".to_string(),
            PriceQuote {
                instrument: "EUR_USD".to_string(),
                bid: dec!(1.08500),
                ask: dec!(1.08508),
                tradeable: true,
                time: now,
            },
        );
        let agent = resolve(&AgentStats::empty("momentum-1"));
        let signal = Signal {
            pair: "EUR_USD".to_string(),
            direction: Direction::Short,
            confidence: 80.0,
            regime: Regime::Trending,
            composite_score: 0.8,
        };

        let (outcome, flow) = engine
            .process_candidate(&ctx, &inputs(now), 0, &agent, signal, Direction::Short, true)
            .await;

        assert_eq!(outcome.status, OrderStatus::Blocked);
        assert!(outcome.error.as_deref().unwrap().contains("submission layer"));
        assert!(matches!(flow, Flow::Abort(ref reason) if reason.contains("short")));

        let rows = ledger.all_orders().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, OrderStatus::Blocked);
        assert_eq!(rows[0].direction, Direction::Long);
        assert!(rows[0].idempotency_key.is_some());
        assert!(rows[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("reached the submission layer"));
    }

    #[test]
    fn pair_names_are_normalized() {
        assert_eq!(normalize_pair(" eur/usd ").unwrap(), "EUR_USD");
        assert_eq!(normalize_pair("gbp_jpy").unwrap(), "GBP_JPY");
        assert!(normalize_pair("EURUSD").is_err());
        assert!(normalize_pair("EU_USD").is_err());
        assert!(normalize_pair("EUR_USD_X").is_err());
    }

    #[test]
    fn budget_scales_with_governance() {
        let ctx = TickContext::new(Uuid::new_v4(), london_open(), Some(1));
        let normal = GovernanceState::Normal.config();
        let halt = GovernanceState::Halt.config();
        assert_eq!(candidate_budget(10, 6, &normal, &ctx), 6);
        assert_eq!(candidate_budget(4, 6, &normal, &ctx), 4);
        assert!(candidate_budget(10, 6, &halt, &ctx) < 6);
        assert_eq!(candidate_budget(10, 0, &normal, &ctx), 0);
    }
}
