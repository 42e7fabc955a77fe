//! Catalogue swap diffing and the empty-set guard, end to end.

use crate::helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use venuesim::prelude::*;

fn instance_over(instruments: Vec<Instrument>) -> Arc<VenueSimulator> {
    VenueSimulator::new(
        CancellationToken::new(),
        Arc::new(TestPool::default()),
        quiet_config(),
        Arc::new(StaticInstrumentSource(instruments)),
    )
}

#[tokio::test]
async fn test_catalogue_diff_emits_only_additions() {
    let mut two = default_instruments();
    let third = two.pop().unwrap();
    let instance = instance_over(two.clone());
    let mut events = instance.events().unwrap();
    assert_eq!(instance.instruments().len(), 2);

    // Adding one symbol emits exactly one InstrumentUpdate.
    let mut three = two.clone();
    three.push(third.clone());
    instance.set_supported(three.clone()).await;

    let update = next_event_of(&mut events, EventType::InstrumentUpdate).await;
    assert_eq!(update.symbol, third.symbol);
    assert_eq!(update.sequence, 1);
    match &update.payload {
        EventPayload::Instrument(instrument) => assert_eq!(instrument.symbol, third.symbol),
        other => panic!("expected instrument payload, got {other:?}"),
    }

    // Re-applying the identical set emits nothing.
    instance.set_supported(three).await;
    let silence = drain_for(&mut events, Duration::from_millis(100)).await;
    assert!(silence.is_empty());

    instance.shutdown().await;
}

#[tokio::test]
async fn test_catalogue_change_in_place_emits_update() {
    let instance = instance_over(default_instruments());
    let mut events = instance.events().unwrap();

    let mut changed = default_instruments();
    changed[0].min_notional = "10".to_string();
    instance.set_supported(changed).await;

    let update = next_event_of(&mut events, EventType::InstrumentUpdate).await;
    assert_eq!(update.symbol, "BTC-USDT");

    let silence = drain_for(&mut events, Duration::from_millis(100)).await;
    assert!(silence.is_empty());

    instance.shutdown().await;
}

#[tokio::test]
async fn test_all_invalid_swap_is_a_no_op() {
    let instance = instance_over(default_instruments());
    let mut events = instance.events().unwrap();
    assert_eq!(instance.instruments().len(), 3);

    let mut broken = default_instruments();
    for instrument in &mut broken {
        instrument.quantity_increment = "zero".to_string();
    }
    instance.set_supported(broken).await;

    assert_eq!(instance.instruments().len(), 3, "previous catalogue retained");
    let silence = drain_for(&mut events, Duration::from_millis(100)).await;
    assert!(silence.is_empty());

    instance.shutdown().await;
}

#[tokio::test]
async fn test_non_spot_instruments_are_dropped() {
    let mut mixed = default_instruments();
    mixed[2].instrument_type = InstrumentType::Perpetual;
    let instance = instance_over(mixed);
    assert_eq!(instance.instruments().len(), 2);
    instance.shutdown().await;
}
