mod common;

use chrono::Duration;
use common::*;
use govex::coordination::CircuitBreakerRecord;
use govex::domain::{OrderStatus, Regime};
use govex::error::{BrokerError, GovexError};
use govex::exchange::ClosedTrade;
use govex::execution::{BalanceSource, TickRequest};
use govex::governance::{DiscoveryLabel, GovernanceState};
use rust_decimal_macros::dec;

#[tokio::test]
async fn healthy_tick_fills_long_orders_with_keys() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending), long("GBP_USD", Regime::Ranging)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.governance.state, GovernanceState::Normal);
    assert_eq!(report.execution.candidate_budget, 6);
    assert_eq!(report.execution.balance_source, BalanceSource::Broker);
    assert_eq!(report.filled(), 2);
    assert!(report.aborted.is_none());

    let eur = &report.candidates[0];
    assert_eq!(eur.discovery, Some(DiscoveryLabel::EdgeBoost));
    assert_eq!(eur.fill_price, Some(dec!(1.08508)));
    assert_eq!(report.candidates[1].discovery, Some(DiscoveryLabel::Reduced));

    let rows = new_rows(&h.ledger, london_open()).await;
    assert_eq!(rows.len(), 2);
    let submitted = h.broker.submitted();
    assert_eq!(submitted.len(), 2);
    for row in &rows {
        assert_eq!(row.status, OrderStatus::Filled);
        let key = row.idempotency_key.as_deref().unwrap();
        assert!(key.starts_with("gx-"));
        assert!(submitted.iter().any(|r| r.client_order_id.as_deref() == Some(key)));
        assert!((500..=5000).contains(&row.requested_units));
        assert!(row.execution_quality.is_some());
        assert!(row.broker_trade_id.is_some());
    }
}

#[tokio::test]
async fn banned_pair_is_recorded_without_broker_call() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("AUD_USD", Regime::Trending)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].status, OrderStatus::PairBanned);
    assert!(h.broker.submitted().is_empty());

    let rows = new_rows(&h.ledger, london_open()).await;
    assert_eq!(rows[0].status, OrderStatus::PairBanned);
    assert!(rows[0].idempotency_key.is_none());
    assert!(rows[0].gate_reasons.iter().any(|r| r.contains("banned")));
}

#[tokio::test]
async fn weak_ignition_is_blocked_unless_forced() {
    let mut ignition = long("USD_JPY", Regime::Ignition);
    ignition.composite_score = 0.3;

    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![ignition.clone()],
        london_open(),
    )
    .await;
    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();
    assert_eq!(report.candidates[0].status, OrderStatus::DiscoveryBlocked);
    assert!(report.candidates[0].reasons[0].contains("weak_ignition"));

    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![ignition],
        london_open(),
    )
    .await;
    let report = h
        .engine
        .run_tick(TickRequest {
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.execution.candidate_budget, 1);
    assert_eq!(report.candidates[0].status, OrderStatus::Filled);
    assert_eq!(report.candidates[0].discovery, Some(DiscoveryLabel::Bypassed));
}

#[tokio::test]
async fn same_pair_twice_in_a_tick_is_deduped() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending), long("EUR_USD", Regime::Ranging)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.candidates[0].status, OrderStatus::Filled);
    assert_eq!(report.candidates[1].status, OrderStatus::Deduped);
    assert_eq!(h.broker.submitted().len(), 1);
}

#[tokio::test]
async fn transient_error_is_retried_then_filled() {
    let broker = ScriptedBroker::paper().failing_with(vec![BrokerError::Transient {
        status: 429,
        message: "rate limited".into(),
    }]);
    let h = harness(
        test_config(),
        healthy_history(),
        broker,
        vec![long("GBP_USD", Regime::Breakout)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.candidates[0].status, OrderStatus::Filled);
    assert_eq!(report.candidates[0].broker_attempts, 2);
}

#[tokio::test]
async fn market_halted_aborts_remaining_candidates() {
    let halted = || BrokerError::MarketHalted("MARKET_HALTED".into());
    let broker = ScriptedBroker::paper().failing_with(vec![halted(), halted(), halted()]);
    let h = harness(
        test_config(),
        healthy_history(),
        broker,
        vec![long("EUR_USD", Regime::Trending), long("GBP_USD", Regime::Trending)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].status, OrderStatus::Rejected);
    assert_eq!(report.candidates[0].broker_attempts, 3);
    assert!(report.aborted.as_deref().unwrap().starts_with("market halted"));
    assert_eq!(h.broker.submitted().len(), 3);

    let rows = new_rows(&h.ledger, london_open()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, OrderStatus::Rejected);
    assert!(rows[0].error_message.is_some());
}

#[tokio::test]
async fn permanent_error_rejects_and_continues() {
    let broker = ScriptedBroker::paper()
        .failing_with(vec![BrokerError::Permanent("INSUFFICIENT_MARGIN".into())]);
    let h = harness(
        test_config(),
        healthy_history(),
        broker,
        vec![long("EUR_USD", Regime::Trending), long("GBP_USD", Regime::Trending)],
        london_open(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.candidates[0].status, OrderStatus::Rejected);
    assert_eq!(report.candidates[0].broker_attempts, 1);
    assert_eq!(report.candidates[1].status, OrderStatus::Filled);
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn replayed_tick_records_idempotency_conflict() {
    let broker = ScriptedBroker::paper()
        .failing_with(vec![BrokerError::Permanent("INSUFFICIENT_MARGIN".into())]);
    let h = harness(
        test_config(),
        healthy_history(),
        broker,
        vec![long("EUR_USD", Regime::Trending), long("EUR_USD", Regime::Trending)],
        london_open(),
    )
    .await;

    let tick_id = uuid::Uuid::new_v4();
    let request = TickRequest {
        tick_id: Some(tick_id),
        force: true,
        ..Default::default()
    };

    let first = h.engine.run_tick(request.clone()).await.unwrap();
    assert_eq!(first.candidates[0].status, OrderStatus::Rejected);

    let replay = h.engine.run_tick(request).await.unwrap();
    assert_eq!(replay.tick_id, tick_id);
    assert_eq!(replay.candidates[0].status, OrderStatus::IdempotencyConflict);

    // One broker call in total; one keyed row plus one conflict row.
    assert_eq!(h.broker.submitted().len(), 1);
    let rows = new_rows(&h.ledger, london_open()).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|r| r.idempotency_key.is_some()).count(), 1);
    assert_eq!(
        rows.iter()
            .filter(|r| r.status == OrderStatus::IdempotencyConflict)
            .count(),
        1
    );
}

#[tokio::test]
async fn weekend_is_skipped_unless_forced() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending)],
        saturday(),
    )
    .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();
    assert_eq!(report.skipped.as_deref(), Some("market closed"));
    assert!(report.candidates.is_empty());

    let report = h
        .engine
        .run_tick(TickRequest {
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.filled(), 1);
}

#[tokio::test]
async fn circuit_breaker_applies_halt_config_to_its_pair() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending), long("GBP_USD", Regime::Trending)],
        london_open(),
    )
    .await;
    h.ledger
        .trip_circuit_breaker(CircuitBreakerRecord {
            pair: Some("EUR_USD".into()),
            reason: "news spike".into(),
            tripped_at: london_open() - Duration::minutes(5),
            expires_at: london_open() + Duration::hours(1),
        })
        .await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.governance.state, GovernanceState::Normal);
    assert_eq!(report.circuit_breakers.len(), 1);
    assert_eq!(report.candidates[0].status, OrderStatus::Gated);
    assert_eq!(report.candidates[1].status, OrderStatus::Filled);

    let submitted = h.broker.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].instrument, "GBP_USD");

    let rows = new_rows(&h.ledger, london_open()).await;
    let gated = rows.iter().find(|r| r.pair == "EUR_USD").unwrap();
    assert_eq!(gated.governance_payload["effective_state"], "HALT");
    assert_eq!(gated.gate_result.as_deref(), Some("THROTTLE"));
}

#[tokio::test]
async fn pair_override_and_direction_validation() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("GBP_USD", Regime::Trending)],
        london_open(),
    )
    .await;

    let err = h
        .engine
        .run_tick(TickRequest {
            direction: Some("short".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GovexError::Validation(_)));

    let err = h
        .engine
        .run_tick(TickRequest {
            pair: Some("EURUSD".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GovexError::Validation(_)));

    let report = h
        .engine
        .run_tick(TickRequest {
            pair: Some("eur_usd".into()),
            direction: Some("long".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.candidates[0].pair, "EUR_USD");
    assert_eq!(h.broker.submitted()[0].instrument, "EUR_USD");
}

#[tokio::test]
async fn reconciles_closes_and_falls_back_on_balance() {
    let mut open = closed_trade(
        "momentum-1",
        "EUR_USD",
        govex::domain::Direction::Long,
        0.0,
        "london-open",
        london_open() - Duration::hours(3),
    );
    open.exit_price = None;
    open.closed_at = None;
    open.broker_trade_id = Some("T-77".into());

    let mut history = healthy_history();
    history.push(open);

    let broker = ScriptedBroker::paper()
        .without_balance()
        .with_closed(vec![ClosedTrade {
            trade_id: "T-77".into(),
            instrument: "EUR_USD".into(),
            entry_price: dec!(1.10000),
            exit_price: dec!(1.10120),
            closed_at: london_open() - Duration::hours(1),
        }]);
    let h = harness(test_config(), history, broker, vec![], london_open()).await;

    let report = h.engine.run_tick(TickRequest::default()).await.unwrap();

    assert_eq!(report.reconciled_closes, 1);
    assert_eq!(report.execution.balance_source, BalanceSource::Fallback);
    assert_eq!(report.execution.balance, dec!(100000));

    let closed = h
        .ledger
        .all_orders()
        .await
        .into_iter()
        .find(|o| o.broker_trade_id.as_deref() == Some("T-77"))
        .unwrap();
    assert_eq!(closed.exit_price, Some(dec!(1.10120)));
    assert!(closed.is_closed());
}

#[tokio::test]
async fn adverse_fill_records_positive_slippage_and_lower_quality() {
    let clean = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("EUR_USD", Regime::Trending)],
        london_open(),
    )
    .await;
    clean.engine.run_tick(TickRequest::default()).await.unwrap();
    let clean_row = new_rows(&clean.ledger, london_open()).await.remove(0);

    let slipped = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper().filling_above_ask(dec!(0.00003)),
        vec![long("EUR_USD", Regime::Trending)],
        london_open(),
    )
    .await;
    let report = slipped.engine.run_tick(TickRequest::default()).await.unwrap();
    assert_eq!(report.candidates[0].fill_price, Some(dec!(1.08511)));
    let row = new_rows(&slipped.ledger, london_open()).await.remove(0);

    assert!((clean_row.slippage_pips.unwrap()).abs() < 1e-6);
    assert!((row.slippage_pips.unwrap() - 0.3).abs() < 1e-6);
    assert!(row.execution_quality.unwrap() < clean_row.execution_quality.unwrap());
}

#[tokio::test]
async fn forced_shot_uses_normal_gating_under_throttled_governance() {
    let mut history = healthy_history();
    history.extend(losing_history());
    let h = harness(
        test_config(),
        history,
        ScriptedBroker::paper(),
        vec![long("GBP_USD", Regime::Ranging)],
        london_open(),
    )
    .await;

    let report = h
        .engine
        .run_tick(TickRequest {
            force: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.governance.state, GovernanceState::Throttled);
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].status, OrderStatus::Filled);
    assert_eq!(h.broker.submitted()[0].instrument, "GBP_USD");

    let row = new_rows(&h.ledger, london_open()).await.remove(0);
    assert_eq!(row.governance_payload["governance_state"], "THROTTLED");
    assert_eq!(row.governance_payload["effective_state"], "NORMAL");
    assert_eq!(row.gate_result.as_deref(), Some("PASS"));
}

#[tokio::test]
async fn forced_shot_still_respects_bans_and_breakers() {
    let h = harness(
        test_config(),
        healthy_history(),
        ScriptedBroker::paper(),
        vec![long("AUD_USD", Regime::Ranging), long("EUR_USD", Regime::Trending)],
        london_open(),
    )
    .await;
    h.ledger
        .trip_circuit_breaker(CircuitBreakerRecord {
            pair: Some("EUR_USD".into()),
            reason: "news spike".into(),
            tripped_at: london_open() - Duration::minutes(5),
            expires_at: london_open() + Duration::hours(1),
        })
        .await;
    let forced = || TickRequest {
        force: true,
        ..Default::default()
    };

    let report = h.engine.run_tick(forced()).await.unwrap();
    assert_eq!(report.candidates[0].status, OrderStatus::PairBanned);

    let report = h.engine.run_tick(forced()).await.unwrap();
    assert_eq!(report.candidates[0].status, OrderStatus::Gated);
    assert!(h.broker.submitted().is_empty());
}
