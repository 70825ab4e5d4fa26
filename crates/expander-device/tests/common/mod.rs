//! In-memory Output Expander used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use expander_frame::{Frame, HarpCodec, MessageKind, Timestamp};
use expander_registers::{RegisterMap, RegisterValue, WireType};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{duplex, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

/// Timestamp stamped on every simulated reply.
pub const STAMP: Timestamp = Timestamp {
    seconds: 42,
    ticks: 15_625,
};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub who_am_i: u16,
    /// Addresses whose next reply is held back and sent just before the
    /// reply to the following request.
    pub hold_once: HashSet<u8>,
    /// Addresses answered with the error flag set.
    pub reject: HashSet<u8>,
    /// Time spent "processing" each request. While it runs, any further
    /// request arriving on the wire counts as a serialisation violation.
    pub processing: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            who_am_i: 1108,
            hold_once: HashSet::new(),
            reject: HashSet::new(),
            processing: Duration::ZERO,
        }
    }
}

pub struct Simulator {
    pub log: Arc<Mutex<Vec<Frame>>>,
    pub violations: Arc<AtomicUsize>,
    inject: mpsc::Sender<Frame>,
    task: JoinHandle<()>,
}

impl Simulator {
    /// Start a simulator; returns it with the host end of the pipe.
    pub fn spawn(config: SimConfig) -> (Self, DuplexStream) {
        let (host, device) = duplex(4096);
        let log = Arc::new(Mutex::new(Vec::new()));
        let violations = Arc::new(AtomicUsize::new(0));
        let (inject, injected) = mpsc::channel(16);

        let state = State {
            framed: Framed::new(device, HarpCodec::new()),
            registers: initial_registers(config.who_am_i),
            held: Vec::new(),
            log: Arc::clone(&log),
            violations: Arc::clone(&violations),
            config,
        };
        let task = tokio::spawn(state.run(injected));

        (
            Self {
                log,
                violations,
                inject,
                task,
            },
            host,
        )
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<Frame> {
        self.log.lock().unwrap().clone()
    }

    /// Addresses of received requests, skipping the identity read.
    pub fn addresses_after_identity(&self) -> Vec<u8> {
        self.requests().iter().skip(1).map(|f| f.address).collect()
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Emit an unsolicited frame.
    pub async fn emit(&self, frame: Frame) {
        self.inject.send(frame).await.unwrap();
    }

    /// Stop the simulator, closing its end of the pipe.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

struct State {
    framed: Framed<DuplexStream, HarpCodec>,
    registers: HashMap<u8, RegisterValue>,
    held: Vec<Frame>,
    log: Arc<Mutex<Vec<Frame>>>,
    violations: Arc<AtomicUsize>,
    config: SimConfig,
}

impl State {
    async fn run(mut self, mut injected: mpsc::Receiver<Frame>) {
        loop {
            tokio::select! {
                incoming = self.framed.next() => {
                    let Some(Ok(Ok(request))) = incoming else { break };
                    self.handle(request).await;
                }
                Some(frame) = injected.recv() => {
                    if self.framed.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, request: Frame) {
        self.log.lock().unwrap().push(request.clone());

        if !self.config.processing.is_zero() {
            if let Ok(Some(_)) = timeout(self.config.processing, self.framed.next()).await {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
        }

        for late in std::mem::take(&mut self.held) {
            let _ = self.framed.send(late).await;
        }

        let reply = self.respond(&request);
        if self.config.hold_once.remove(&request.address) {
            self.held.push(reply);
        } else {
            let _ = self.framed.send(reply).await;
        }
    }

    fn respond(&mut self, request: &Frame) -> Frame {
        let map = RegisterMap::output_expander();
        let Ok(descriptor) = map.by_address(request.address) else {
            return Frame::new(request.kind, request.address, request.payload_type, Vec::new())
                .with_error()
                .with_timestamp(STAMP);
        };

        if request.kind == MessageKind::Write {
            if let Some(value) = RegisterValue::from_payload(descriptor.wire_type, &request.payload) {
                if !self.config.reject.contains(&request.address) {
                    self.registers.insert(request.address, value);
                }
            }
        }

        let value = self
            .registers
            .get(&request.address)
            .copied()
            .unwrap_or_else(|| zero(descriptor.wire_type));
        let reply = Frame::new(
            request.kind,
            request.address,
            descriptor.wire_type.payload_type(),
            value.to_payload(),
        )
        .with_timestamp(STAMP);

        if self.config.reject.contains(&request.address) {
            reply.with_error()
        } else {
            reply
        }
    }
}

fn zero(wire_type: WireType) -> RegisterValue {
    match wire_type {
        WireType::Byte => RegisterValue::Byte(0),
        WireType::UInt16 => RegisterValue::UInt16(0),
        WireType::Int16 => RegisterValue::Int16(0),
        WireType::Single => RegisterValue::Single(0.0),
        WireType::Int16Pair => RegisterValue::Int16Pair(0, 0),
    }
}

fn initial_registers(who_am_i: u16) -> HashMap<u8, RegisterValue> {
    HashMap::from([
        (0, RegisterValue::UInt16(who_am_i)),
        (1, RegisterValue::Byte(1)),
        (2, RegisterValue::Byte(0)),
        (3, RegisterValue::Byte(0)),
        (4, RegisterValue::Byte(1)),
        (5, RegisterValue::Byte(12)),
        (6, RegisterValue::Byte(0)),
        (7, RegisterValue::Byte(3)),
    ])
}
