//! Dispatcher happy paths: serialization, delivery thread, event flow.

use crate::mock_link::{MockLink, Recorder};
use bledispatch::adapters::radio::RadioState;
use bledispatch::{
    Code, Command, DispatchEvent, Dispatcher, DispatcherConfig, EventSink, LinkOutcome,
    PeripheralAddr, RequestKind, ResponseValue, Ticket,
};
use std::sync::{Arc, Mutex};

const ADDR: PeripheralAddr = PeripheralAddr::new([0xC4, 0x7C, 0x8D, 0x6A, 0x3E, 0x01]);
const HRS: u128 = 0x0000180d_0000_1000_8000_00805f9b34fb;
const HRM: u128 = 0x00002a37_0000_1000_8000_00805f9b34fb;

fn dispatcher(link: MockLink) -> Dispatcher {
    Dispatcher::new(
        ADDR,
        DispatcherConfig::default(),
        link,
        Arc::new(RadioState::available()),
    )
    .unwrap()
}

#[derive(Clone, Default)]
struct SharedEvents(Arc<Mutex<Vec<DispatchEvent>>>);

impl EventSink for SharedEvents {
    fn emit(&mut self, event: &DispatchEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[test]
fn executor_is_bound_once_on_construction() {
    let (link, handle) = MockLink::manual();
    let _d = dispatcher(link);
    assert_eq!(handle.binds(), 1);
    assert!(handle.reporter().is_attached());
}

#[test]
fn connect_success_runs_callback_on_delivery_thread() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher(link);
    let rec = Recorder::new();

    let id = d.connect(rec.callback());
    assert_eq!(handle.outstanding().unwrap().command, Command::Connect);

    handle.respond(LinkOutcome::ok());
    let (resp, thread) = rec.take(1).remove(0);
    assert_eq!(resp.id, id);
    assert_eq!(resp.kind, RequestKind::Connect);
    assert_eq!(resp.code, Code::Success);
    assert_eq!(thread, "bledispatch-delivery");
    assert!(d.is_idle());
}

#[test]
fn only_one_operation_outstanding_and_fifo_order() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher(link);
    let rec = Recorder::new();

    let ids: Vec<_> = (0..3).map(|_| d.read(HRS, HRM, rec.callback())).collect();
    assert_eq!(handle.executed().len(), 1);
    assert_eq!(d.backlog(), 3);

    for _ in 0..3 {
        handle.respond(LinkOutcome::ok());
    }
    let executed: Vec<_> = handle.executed().iter().map(|op| op.ticket.id).collect();
    assert_eq!(executed, ids);
    assert_eq!(handle.overlaps(), 0);

    let delivered: Vec<_> = rec.responses(3).iter().map(|r| r.id).collect();
    assert_eq!(delivered, ids);
}

#[test]
fn read_and_rssi_values_reach_callbacks() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher(link);
    let rec = Recorder::new();

    d.read(HRS, HRM, rec.callback());
    d.read_rssi(rec.callback());

    let value = heapless::Vec::from_slice(&[0x16, 0x48]).unwrap();
    handle.respond(LinkOutcome::Success(Some(ResponseValue::Bytes(value))));
    handle.respond(LinkOutcome::Success(Some(ResponseValue::Rssi(-58))));

    let responses = rec.responses(2);
    assert_eq!(responses[0].bytes(), Some(&[0x16, 0x48][..]));
    assert_eq!(responses[1].rssi(), Some(-58));
}

#[test]
fn write_and_subscribe_carry_their_targets() {
    let (link, handle) = MockLink::inline();
    let d = dispatcher(link);
    let rec = Recorder::new();

    d.write(HRS, HRM, &[0x01, 0x00], rec.callback());
    d.subscribe(HRS, HRM, rec.callback());
    d.unsubscribe(HRS, HRM);
    d.disconnect();

    let ops = handle.executed();
    assert_eq!(ops.len(), 4);
    assert_eq!(ops[0].command.payload(), Some(&[0x01, 0x00][..]));
    assert!(ops[..3].iter().all(|op| {
        op.command.target().map(|t| (t.service, t.characteristic)) == Some((HRS, HRM))
    }));
    assert_eq!(ops[3].command, Command::Disconnect);
    assert_eq!(rec.responses(2).len(), 2);
    assert_eq!(d.stats().succeeded, 4);
}

#[test]
fn inline_reporting_executor_neither_deadlocks_nor_recurses() {
    let (link, handle) = MockLink::inline();
    let d = dispatcher(link);
    let rec = Recorder::new();

    let ids: Vec<_> = (0..50).map(|_| d.read_rssi(rec.callback())).collect();
    let delivered: Vec<_> = rec.responses(50).iter().map(|r| r.id).collect();
    assert_eq!(delivered, ids);
    assert_eq!(handle.overlaps(), 0);
    assert!(d.is_idle());
}

#[test]
fn concurrent_producers_are_serialized() {
    let (link, handle) = MockLink::inline();
    let d = Arc::new(dispatcher(link));
    let rec = Recorder::new();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let d = d.clone();
            let callbacks: Vec<_> = (0..25).map(|_| rec.callback()).collect();
            std::thread::spawn(move || {
                for cb in callbacks {
                    d.read_rssi(cb);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let mut ids: Vec<_> = rec.responses(100).iter().map(|r| r.id.get()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 100);
    assert_eq!(handle.overlaps(), 0);
    assert_eq!(handle.executed().len(), 100);
}

#[test]
fn callbacks_may_submit_more_work() {
    let (link, _handle) = MockLink::inline();
    let d = Arc::new(dispatcher(link));
    let rec = Recorder::new();

    let inner = d.clone();
    let follow_up = rec.callback();
    d.connect(move |resp| {
        assert!(resp.is_success());
        inner.read_rssi(follow_up);
    });

    let resp = rec.responses(1).remove(0);
    assert_eq!(resp.kind, RequestKind::ReadRssi);
}

#[test]
fn stray_report_is_counted_and_ignored() {
    let (link, handle) = MockLink::manual();
    let d = dispatcher(link);
    let rec = Recorder::new();

    d.connect(rec.callback());
    let current = d.current().unwrap();
    let stray = Ticket {
        id: current.id,
        attempt: current.attempt + 1,
    };
    handle.reporter().report(stray, LinkOutcome::failed());

    assert_eq!(d.current(), Some(current));
    assert_eq!(d.stats().stale_outcomes, 1);
    rec.assert_quiet();

    handle.respond(LinkOutcome::ok());
    assert_eq!(rec.responses(1)[0].code, Code::Success);
}

#[test]
fn events_reach_custom_sink() {
    let (link, handle) = MockLink::manual();
    let events = SharedEvents::default();
    let d = Dispatcher::with_event_sink(
        ADDR,
        DispatcherConfig::default(),
        link,
        Arc::new(RadioState::available()),
        events.clone(),
    )
    .unwrap();

    d.disconnect();
    handle.respond(LinkOutcome::ok());

    let seen = events.0.lock().unwrap().clone();
    assert!(matches!(seen[0], DispatchEvent::Queued { backlog: 1, .. }));
    assert!(matches!(seen[1], DispatchEvent::Dispatched { .. }));
    assert!(matches!(
        seen[2],
        DispatchEvent::Completed {
            code: Code::Success,
            attempts: 1,
            ..
        }
    ));
}

#[test]
fn stats_serialize_for_reporting() {
    let (link, _handle) = MockLink::inline();
    let d = dispatcher(link);
    let rec = Recorder::new();
    d.connect(rec.callback());
    rec.take(1);

    let stats = d.stats();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.callbacks_run, 1);
    let json = serde_json::to_string(&stats).unwrap();
    assert!(json.contains("\"succeeded\":1"));
}
