//! Admission control: backlog bound, argument checks, radio availability.

use crate::mock_link::{MockLink, Recorder};
use bledispatch::adapters::radio::RadioState;
use bledispatch::{
    Code, ConfigError, DispatchError, Dispatcher, DispatcherConfig, LinkOutcome,
    MAX_ATTRIBUTE_LEN, PeripheralAddr, RequestId, RequestKind, RetryBudgets,
};
use std::sync::Arc;

const ADDR: PeripheralAddr = PeripheralAddr::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);
const SVC: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
const RX: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;

fn dispatcher_with(link: MockLink, config: DispatcherConfig, radio: Arc<RadioState>) -> Dispatcher {
    Dispatcher::new(ADDR, config, link, radio).unwrap()
}

#[test]
fn hundred_and_first_read_overflows() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher_with(
        link,
        DispatcherConfig::default().with_retry(RetryBudgets::none()),
        Arc::new(RadioState::available()),
    );
    let rec = Recorder::new();

    let ids: Vec<RequestId> = (0..101).map(|_| d.read(SVC, RX, rec.callback())).collect();
    assert_eq!(d.backlog(), 100);

    // The overflow is delivered before anything else completes.
    let first = rec.responses(1).remove(0);
    assert_eq!(first.id, ids[100]);
    assert_eq!(first.code, Code::Overflow);

    for _ in 0..100 {
        handle.respond(LinkOutcome::ok());
    }
    let executed: Vec<RequestId> = handle.executed().iter().map(|op| op.ticket.id).collect();
    assert_eq!(executed, ids[..100]);
    assert_eq!(handle.overlaps(), 0);

    let rest = rec.responses(100);
    assert!(rest.iter().all(|r| r.code == Code::Success));
    assert_eq!(d.stats().overflowed, 1);
}

#[test]
fn backlog_frees_up_after_completion() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher_with(
        link,
        DispatcherConfig::default().with_max_backlog(2),
        Arc::new(RadioState::available()),
    );
    let rec = Recorder::new();

    d.connect(rec.callback());
    d.read_rssi(rec.callback());
    d.read_rssi(rec.callback());
    assert_eq!(rec.responses(1)[0].code, Code::Overflow);

    handle.respond(LinkOutcome::ok());
    assert_eq!(d.backlog(), 1);
    d.read_rssi(rec.callback());
    assert_eq!(d.backlog(), 2);
    assert_eq!(rec.responses(1)[0].code, Code::Success);
    rec.assert_quiet();
}

#[test]
fn oversized_write_is_illegal_and_never_queued() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher_with(
        link,
        DispatcherConfig::default(),
        Arc::new(RadioState::available()),
    );
    let rec = Recorder::new();

    let payload = vec![0xA5; MAX_ATTRIBUTE_LEN + 1];
    let id = d.write(SVC, RX, &payload, rec.callback());

    let resp = rec.responses(1).remove(0);
    assert_eq!(resp.id, id);
    assert_eq!(resp.kind, RequestKind::Write);
    assert_eq!(resp.code, Code::IllegalArgument);
    assert!(handle.executed().is_empty());
    assert!(d.is_idle());
    assert_eq!(d.stats().illegal, 1);
}

#[test]
fn unsupported_radio_fails_everything_without_dispatch() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher_with(
        link,
        DispatcherConfig::default().with_retry(RetryBudgets::uniform(3)),
        Arc::new(RadioState::unsupported()),
    );
    let rec = Recorder::new();

    d.connect(rec.callback());
    d.read(SVC, RX, rec.callback());
    d.read_rssi(rec.callback());

    let codes: Vec<Code> = rec.responses(3).iter().map(|r| r.code).collect();
    assert_eq!(codes, vec![Code::TransportNotSupported; 3]);
    assert!(handle.executed().is_empty());
    assert_eq!(d.stats().retried, 0);
    assert!(d.is_idle());
}

#[test]
fn radio_switched_off_mid_queue() {
    let radio = Arc::new(RadioState::available());
    let (link, handle) = MockLink::manual();
    let d = dispatcher_with(link, DispatcherConfig::default(), radio.clone());
    let rec = Recorder::new();

    d.connect(rec.callback());
    d.read(SVC, RX, rec.callback());
    d.read_rssi(rec.callback());

    radio.set_enabled(false);
    handle.respond(LinkOutcome::ok());

    let codes: Vec<Code> = rec.responses(3).iter().map(|r| r.code).collect();
    assert_eq!(
        codes,
        vec![Code::Success, Code::TransportDisabled, Code::TransportDisabled]
    );
    assert_eq!(handle.executed().len(), 1);

    radio.set_enabled(true);
    d.read_rssi(rec.callback());
    assert_eq!(handle.executed().len(), 2);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let (link, _handle) = MockLink::manual();
    let err = Dispatcher::new(
        ADDR,
        DispatcherConfig::default().with_max_backlog(0),
        link,
        Arc::new(RadioState::available()),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Config(ConfigError::ValidationFailed(_))
    ));
}

#[test]
fn retrying_disconnect_is_rejected_at_construction() {
    let (link, _handle) = MockLink::manual();
    let retry = RetryBudgets {
        disconnect: 1,
        ..RetryBudgets::default()
    };
    let result = Dispatcher::new(
        ADDR,
        DispatcherConfig::default().with_retry(retry),
        link,
        Arc::new(RadioState::available()),
    );
    assert!(result.is_err());
}
