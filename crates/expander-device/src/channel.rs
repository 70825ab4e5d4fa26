//! Single-flight command channel.
//!
//! One dispatcher task owns the framed transport. Callers submit commands over
//! a bounded FIFO queue and wait on a oneshot slot for the matching reply.
//! Exactly one command is on the wire at a time; the next is written only
//! after the current exchange resolves (reply, device error, timeout or
//! cancellation).
//!
//! A caller that gives up after its command was written leaves an *orphan*
//! behind. The first later reply matching the orphan is discarded so it can
//! never be taken for the answer to a later command. An exchange that had a
//! matching reply absorbed this way leaves no orphan of its own when it
//! times out: the absorbed frame may well have been its answer, and a fresh
//! orphan would swallow the reply to every retry in turn.

use std::collections::VecDeque;
use std::future;
use std::time::Duration;

use expander_frame::{Decoded, Frame, FrameError, HarpCodec, MessageKind};
use expander_transport::DuplexStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ChannelConfig;
use crate::error::{ExpanderError, Result};

type Reply = Result<Frame>;

struct Request {
    frame: Frame,
    deadline: Instant,
    timeout: Duration,
    reply: oneshot::Sender<Reply>,
}

/// Which replies can answer a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    /// Answered by a read reply or an event for the same address.
    Read,
    /// Answered by a write acknowledgement.
    Write,
}

impl Exchange {
    fn of(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Write => Exchange::Write,
            MessageKind::Read | MessageKind::Event => Exchange::Read,
        }
    }

    fn answered_by(self, frame: &Frame) -> bool {
        match self {
            Exchange::Read => matches!(frame.kind, MessageKind::Read | MessageKind::Event),
            Exchange::Write => frame.kind == MessageKind::Write,
        }
    }
}

#[derive(Debug)]
struct Orphan {
    address: u8,
    exchange: Exchange,
    expires: Instant,
}

enum Wake {
    Abandoned,
    Deadline,
    Shutdown,
    Incoming(Option<std::result::Result<Decoded, FrameError>>),
}

enum Flow {
    Continue,
    Stop,
}

/// Handle to a running dispatcher task.
///
/// Dropping the handle stops the task and releases the transport.
#[derive(Debug)]
pub struct CommandChannel {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Frame>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    reply_timeout: Duration,
}

impl CommandChannel {
    /// Start a dispatcher over `stream`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: DuplexStream>(stream: S, config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        let (requests, queue) = mpsc::channel(config.queue_depth);
        let (events, _) = broadcast::channel(config.event_capacity);
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher {
            framed: Framed::new(stream, HarpCodec::new()),
            queue,
            events: events.clone(),
            orphans: VecDeque::new(),
            orphan_ttl: config.orphan_ttl,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(dispatcher.run());

        Ok(Self {
            requests,
            events,
            shutdown,
            task: Some(task),
            reply_timeout: config.reply_timeout,
        })
    }

    /// Send `frame` and wait for its reply, using the configured timeout.
    pub async fn send(&self, frame: Frame, cancel: Option<&CancellationToken>) -> Result<Frame> {
        self.send_with_timeout(frame, self.reply_timeout, cancel).await
    }

    /// Send `frame` and wait at most `timeout` (queueing included) for its reply.
    pub async fn send_with_timeout(
        &self,
        frame: Frame,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Frame> {
        let address = frame.address;
        let deadline = Instant::now() + timeout;
        let (reply, response) = oneshot::channel();
        let request = Request {
            frame,
            deadline,
            timeout,
            reply,
        };

        let exchange = async {
            self.requests
                .send(request)
                .await
                .map_err(|_| ExpanderError::Disconnected)?;
            response.await.map_err(|_| ExpanderError::Disconnected)?
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        };

        // Dropping `exchange` drops the oneshot receiver, which tells the
        // dispatcher the caller is gone.
        tokio::select! {
            biased;
            _ = cancelled => Err(ExpanderError::Cancelled { address }),
            _ = sleep_until(deadline) => Err(ExpanderError::Timeout { address, after: timeout }),
            result = exchange => result,
        }
    }

    /// Receive every event frame the device emits from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.events.subscribe()
    }

    /// Stop the dispatcher and wait for it to release the transport.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "command channel task failed");
            }
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Dispatcher<S> {
    framed: Framed<S, HarpCodec>,
    queue: mpsc::Receiver<Request>,
    events: broadcast::Sender<Frame>,
    orphans: VecDeque<Orphan>,
    orphan_ttl: Duration,
    shutdown: CancellationToken,
}

impl<S: DuplexStream> Dispatcher<S> {
    async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        loop {
            let flow = tokio::select! {
                _ = shutdown.cancelled() => Flow::Stop,
                request = self.queue.recv() => match request {
                    Some(request) => self.dispatch(request).await,
                    None => Flow::Stop,
                },
                incoming = self.framed.next() => self.idle(incoming),
            };
            if let Flow::Stop = flow {
                break;
            }
        }

        self.queue.close();
        while let Ok(request) = self.queue.try_recv() {
            let _ = request.reply.send(Err(ExpanderError::Disconnected));
        }
        debug!("command channel stopped");
    }

    fn idle(&mut self, incoming: Option<std::result::Result<Decoded, FrameError>>) -> Flow {
        match incoming {
            Some(Ok(Ok(frame))) => {
                if let Some(frame) = self.screen(frame) {
                    if frame.kind != MessageKind::Event {
                        trace!(address = frame.address, kind = %frame.kind, "unmatched frame");
                    }
                }
                Flow::Continue
            }
            Some(Ok(Err(err))) => {
                debug!(%err, "protocol error while idle");
                Flow::Continue
            }
            Some(Err(err)) => {
                warn!(%err, "transport failed");
                Flow::Stop
            }
            None => {
                debug!("transport closed");
                Flow::Stop
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Flow {
        let Request {
            frame,
            deadline,
            timeout,
            mut reply,
        } = request;

        if reply.is_closed() {
            trace!(address = frame.address, "skipping command abandoned in queue");
            return Flow::Continue;
        }

        let address = frame.address;
        let exchange = Exchange::of(frame.kind);
        debug!(address, kind = %frame.kind, "dispatching command");

        if let Err(err) = self.framed.send(frame).await {
            let fatal = !err.is_protocol();
            if fatal {
                warn!(%err, "transport write failed");
                let _ = reply.send(Err(ExpanderError::Disconnected));
                return Flow::Stop;
            }
            let _ = reply.send(Err(err.into()));
            return Flow::Continue;
        }

        let shutdown = self.shutdown.clone();
        let mut absorbed = false;
        loop {
            let wake = tokio::select! {
                _ = reply.closed() => Wake::Abandoned,
                _ = sleep_until(deadline) => Wake::Deadline,
                _ = shutdown.cancelled() => Wake::Shutdown,
                incoming = self.framed.next() => Wake::Incoming(incoming),
            };

            match wake {
                Wake::Abandoned => {
                    debug!(address, "caller abandoned command");
                    if !absorbed {
                        self.orphan(address, exchange);
                    }
                    return Flow::Continue;
                }
                Wake::Deadline => {
                    debug!(address, ?timeout, "command timed out");
                    if !absorbed {
                        self.orphan(address, exchange);
                    }
                    let _ = reply.send(Err(ExpanderError::Timeout {
                        address,
                        after: timeout,
                    }));
                    return Flow::Continue;
                }
                Wake::Shutdown => {
                    let _ = reply.send(Err(ExpanderError::Disconnected));
                    return Flow::Stop;
                }
                Wake::Incoming(Some(Ok(Ok(frame)))) => {
                    let ours = frame.address == address && exchange.answered_by(&frame);
                    let Some(frame) = self.screen(frame) else {
                        absorbed |= ours;
                        continue;
                    };
                    if !ours {
                        if frame.kind != MessageKind::Event {
                            trace!(address = frame.address, kind = %frame.kind, "unmatched frame");
                        }
                        continue;
                    }
                    let result = if frame.error {
                        Err(ExpanderError::Device {
                            address,
                            code: frame.kind.to_byte(true),
                        })
                    } else {
                        Ok(frame)
                    };
                    let _ = reply.send(result);
                    return Flow::Continue;
                }
                Wake::Incoming(Some(Ok(Err(err)))) => {
                    // The damaged frame is taken as this command's reply. No
                    // orphan, so a prompt retry gets its answer.
                    let _ = reply.send(Err(ExpanderError::Protocol(err)));
                    return Flow::Continue;
                }
                Wake::Incoming(Some(Err(err))) => {
                    warn!(%err, "transport failed");
                    let _ = reply.send(Err(ExpanderError::Disconnected));
                    return Flow::Stop;
                }
                Wake::Incoming(None) => {
                    debug!("transport closed");
                    let _ = reply.send(Err(ExpanderError::Disconnected));
                    return Flow::Stop;
                }
            }
        }
    }

    /// Publish events and absorb late replies to abandoned commands.
    ///
    /// Returns the frame if no orphan claimed it. Orphans are always older
    /// than the command in flight, so they get first pick.
    fn screen(&mut self, frame: Frame) -> Option<Frame> {
        if frame.kind == MessageKind::Event {
            // No subscribers is fine.
            let _ = self.events.send(frame.clone());
        }
        if self.take_orphan(&frame) {
            debug!(address = frame.address, kind = %frame.kind, "discarded late reply");
            return None;
        }
        Some(frame)
    }

    fn orphan(&mut self, address: u8, exchange: Exchange) {
        self.orphans.push_back(Orphan {
            address,
            exchange,
            expires: Instant::now() + self.orphan_ttl,
        });
    }

    fn take_orphan(&mut self, frame: &Frame) -> bool {
        let now = Instant::now();
        self.orphans.retain(|orphan| orphan.expires > now);
        match self
            .orphans
            .iter()
            .position(|orphan| orphan.address == frame.address && orphan.exchange.answered_by(frame))
        {
            Some(index) => {
                self.orphans.remove(index);
                true
            }
            None => false,
        }
    }
}
