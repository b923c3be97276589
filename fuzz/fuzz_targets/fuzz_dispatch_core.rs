//! Fuzz target: `DispatchCore`
//!
//! Decodes arbitrary bytes into a sequence of submissions, executor
//! outcomes, stray reports and radio toggles, and asserts that the core
//! never hands out a second operation while one is outstanding, never
//! exceeds its backlog, and completes every request exactly once.
//!
//! cargo fuzz run fuzz_dispatch_core

#![no_main]

use bledispatch::dispatch::request::Completion;
use bledispatch::{
    CharacteristicRef, Code, Command, DispatchCore, DispatcherConfig, LinkOutcome,
    NullEventSink, Operation, PeripheralAddr, RequestId, RetryBudgets, Ticket, TransportPort,
};
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

struct Radio {
    supported: AtomicBool,
    enabled: AtomicBool,
}

impl TransportPort for Radio {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::Relaxed)
    }
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

const CHR: CharacteristicRef = CharacteristicRef::new(0x1800, 0x2a00);

fn command(byte: u8) -> Command {
    match byte % 7 {
        0 => Command::Connect,
        1 => Command::Disconnect,
        2 => Command::Read(CHR),
        3 => Command::write(CHR, &[byte]).unwrap_or(Command::Connect),
        4 => Command::Subscribe(CHR),
        5 => Command::Unsubscribe(CHR),
        _ => Command::ReadRssi,
    }
}

fn code(byte: u8) -> Code {
    Code::from_i32(-i32::from(byte % 9)).unwrap_or(Code::Failed)
}

fuzz_target!(|data: &[u8]| {
    let Some((&header, data)) = data.split_first() else {
        return;
    };
    let config = DispatcherConfig::default()
        .with_max_backlog(usize::from(header % 16) + 1)
        .with_retry(RetryBudgets::uniform(header >> 6));
    let mut core = DispatchCore::new(PeripheralAddr::new([0; 6]), &config);
    let radio = Radio {
        supported: AtomicBool::new(true),
        enabled: AtomicBool::new(true),
    };
    let mut out: Vec<Completion> = Vec::new();
    let mut events = NullEventSink;
    let mut outstanding: Option<Operation> = None;
    let mut submitted = 0usize;

    for pair in data.chunks(2) {
        let (tag, arg) = (pair[0], pair.get(1).copied().unwrap_or(0));
        let op = match tag % 6 {
            0 | 1 => {
                submitted += 1;
                let request = core.new_request(command(arg), None);
                core.enqueue(request, &radio, &mut out, &mut events)
            }
            2 => outstanding.take().and_then(|current| {
                core.on_outcome(current.ticket, LinkOutcome::ok(), &radio, &mut out, &mut events)
            }),
            3 => outstanding.take().and_then(|current| {
                let outcome = LinkOutcome::Failure(code(arg));
                core.on_outcome(current.ticket, outcome, &radio, &mut out, &mut events)
            }),
            4 => {
                let ticket = Ticket {
                    id: RequestId::new(u64::from(arg)),
                    attempt: u16::from(arg & 3),
                };
                if outstanding.as_ref().map(|o| o.ticket) == Some(ticket) {
                    None
                } else {
                    core.on_outcome(ticket, LinkOutcome::ok(), &radio, &mut out, &mut events)
                }
            }
            _ => {
                let flag = if arg & 1 == 0 { &radio.enabled } else { &radio.supported };
                flag.fetch_xor(true, Ordering::Relaxed);
                None
            }
        };
        if let Some(op) = op {
            assert!(outstanding.is_none(), "two operations outstanding");
            outstanding = Some(op);
        }
        assert!(core.backlog() <= config.max_backlog);
    }

    core.cancel_all(&mut out, &mut events);
    let mut seen = HashSet::new();
    for c in &out {
        assert!(seen.insert(c.response().id), "completed twice");
    }
    assert_eq!(seen.len(), submitted);
});
