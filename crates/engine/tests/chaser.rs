//! Integration tests for maker-first hedge execution.
//!
//! Drives the order chaser against the scripted gateway and virtual clock:
//! - Fills inside the first dwell
//! - Partial fills and re-quotes
//! - Escalation to market after the timeout
//! - Immediate market orders with a zero timeout

use std::time::Duration;

use delta_hedge_core::{Clock, GatewayError, Side};
use delta_hedge_engine::sim::{GatewayCall, LimitFill, ManualClock, ScriptedGateway};
use delta_hedge_engine::{ChaseOrder, ChasePhase, ChasePolicy, HedgeOrderIntent, OrderChaser};
use rust_decimal_macros::dec;

// =============================================================================
// Helper Functions
// =============================================================================

const PERP: &str = "BTC-PERPETUAL";

fn policy(dwell_secs: u64, timeout_secs: u64) -> ChasePolicy {
    ChasePolicy {
        dwell: Duration::from_secs(dwell_secs),
        timeout: Duration::from_secs(timeout_secs),
    }
}

fn buy(notional: rust_decimal::Decimal) -> HedgeOrderIntent {
    HedgeOrderIntent {
        side: Side::Buy,
        notional,
    }
}

fn market() -> ScriptedGateway {
    let gateway = ScriptedGateway::new();
    gateway.set_book(dec!(31190), dec!(31200));
    gateway
}

// =============================================================================
// Passive fills
// =============================================================================

#[tokio::test]
async fn fill_within_dwell_places_one_limit_and_no_market() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::Full]);
    let clock = ManualClock::new();

    let report = OrderChaser::new(&gateway, &clock, policy(5, 60))
        .execute(PERP, buy(dec!(1560)))
        .await
        .unwrap();

    assert_eq!(gateway.limit_orders(), 1);
    assert!(gateway.market_orders().is_empty());
    assert_eq!(gateway.cancels(), 0);
    assert_eq!(report.passive_filled, dec!(1560));
    assert!(!report.escalated);
    assert_eq!(report.elapsed, Duration::from_secs(5));
}

#[tokio::test]
async fn quotes_join_the_book_post_only() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::Full, LimitFill::Full]);
    let clock = ManualClock::new();
    let chaser = OrderChaser::new(&gateway, &clock, policy(5, 60));

    chaser.execute(PERP, buy(dec!(100))).await.unwrap();
    chaser
        .execute(
            PERP,
            HedgeOrderIntent {
                side: Side::Sell,
                notional: dec!(100),
            },
        )
        .await
        .unwrap();

    let quotes: Vec<GatewayCall> = gateway
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GatewayCall::PlaceLimit { .. }))
        .collect();
    assert_eq!(
        quotes,
        vec![
            GatewayCall::PlaceLimit {
                side: Side::Buy,
                amount: dec!(100),
                price: dec!(31190),
                post_only: true,
            },
            GatewayCall::PlaceLimit {
                side: Side::Sell,
                amount: dec!(100),
                price: dec!(31200),
                post_only: true,
            },
        ]
    );
}

#[tokio::test]
async fn partial_fill_requotes_the_remainder() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::Partial(dec!(600)), LimitFill::Full]);
    let clock = ManualClock::new();

    let report = OrderChaser::new(&gateway, &clock, policy(5, 60))
        .execute(PERP, buy(dec!(1560)))
        .await
        .unwrap();

    let amounts: Vec<_> = gateway
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GatewayCall::PlaceLimit { amount, .. } => Some(amount),
            _ => None,
        })
        .collect();
    assert_eq!(amounts, vec![dec!(1560), dec!(960)]);
    assert_eq!(gateway.cancels(), 1);
    assert_eq!(report.passive_filled, dec!(1560));
    assert!(gateway.market_orders().is_empty());
}

#[tokio::test]
async fn externally_cancelled_order_is_requoted_without_cancel() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::ExternallyCancelled, LimitFill::Full]);
    let clock = ManualClock::new();

    OrderChaser::new(&gateway, &clock, policy(5, 60))
        .execute(PERP, buy(dec!(500)))
        .await
        .unwrap();

    assert_eq!(gateway.limit_orders(), 2);
    assert_eq!(gateway.cancels(), 0);
}

// =============================================================================
// Escalation
// =============================================================================

#[tokio::test]
async fn never_filled_escalates_to_one_market_order_at_timeout() {
    let gateway = market();
    let clock = ManualClock::new();

    let report = OrderChaser::new(&gateway, &clock, policy(5, 60))
        .execute(PERP, buy(dec!(1560)))
        .await
        .unwrap();

    assert_eq!(gateway.limit_orders(), 12);
    assert_eq!(gateway.cancels(), 12);
    assert_eq!(gateway.market_orders(), vec![(Side::Buy, dec!(1560))]);
    assert_eq!(gateway.open_orders(), 0);
    assert!(report.escalated);
    assert_eq!(report.market_filled, dec!(1560));
    assert_eq!(report.elapsed, Duration::from_secs(60));
}

#[tokio::test]
async fn escalation_sends_only_the_unfilled_remainder() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::Partial(dec!(600))]);
    let clock = ManualClock::new();

    let report = OrderChaser::new(&gateway, &clock, policy(5, 10))
        .execute(PERP, buy(dec!(1560)))
        .await
        .unwrap();

    assert_eq!(gateway.limit_orders(), 2);
    assert_eq!(gateway.market_orders(), vec![(Side::Buy, dec!(960))]);
    assert_eq!(report.total_filled(), dec!(1560));
}

#[tokio::test]
async fn zero_timeout_is_a_single_market_order() {
    let gateway = market();
    let clock = ManualClock::new();

    let report = OrderChaser::new(&gateway, &clock, policy(5, 0))
        .execute(
            PERP,
            HedgeOrderIntent {
                side: Side::Sell,
                notional: dec!(250),
            },
        )
        .await
        .unwrap();

    assert_eq!(gateway.limit_orders(), 0);
    assert_eq!(gateway.market_orders(), vec![(Side::Sell, dec!(250))]);
    assert!(clock.sleeps().is_empty());
    assert!(report.escalated);
}

// =============================================================================
// State machine and failures
// =============================================================================

#[tokio::test]
async fn steps_move_through_quoting_and_waiting() {
    let gateway = market();
    gateway.script_limit_fills([LimitFill::Full]);
    let clock = ManualClock::new();
    let chaser = OrderChaser::new(&gateway, &clock, policy(5, 60));

    let order = ChaseOrder::start(PERP, buy(dec!(40)), clock.now());
    assert_eq!(order.phase, ChasePhase::Quoting);

    let order = chaser.step(order).await.unwrap();
    assert_eq!(order.current_order_id(), Some("sim-1"));
    assert_eq!(order.limit_orders, 1);

    let order = chaser.step(order).await.unwrap();
    assert!(order.is_done());
    assert_eq!(order.remaining, dec!(0));
}

#[tokio::test]
async fn failed_status_check_cancels_resting_order() {
    let gateway = market();
    gateway.fail_next("order_status", GatewayError::Timeout("read".into()));
    let clock = ManualClock::new();

    let err = OrderChaser::new(&gateway, &clock, policy(5, 60))
        .execute(PERP, buy(dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Timeout(_)));
    assert_eq!(gateway.cancels(), 1);
    assert_eq!(gateway.open_orders(), 0);
}
