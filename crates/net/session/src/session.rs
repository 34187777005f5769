//! One duplex chat stream: a read task, a write task and a supervisor.
//!
//! The two loops are independent. A clean end of one (the remote half-closed, or
//! local input ran out) leaves the other running. A failure of either stops its
//! sibling. Once both are done the write side is closed, once.

use crate::{SessionError, metrics::SessionMetrics};
use asynchronous_codec::{FramedRead, FramedWrite};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, SinkExt, StreamExt};
use libp2p::PeerId;
use std::{fmt, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, warn};
use tryst_net_codec::LineCodec;
use tryst_net_discovery::Direction;
use tryst_tasks::{Shutdown, Signal, TaskExecutor, signal};

/// Upper bound for flushing and closing the write side at teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifier of a session, unique within the process. Later sessions have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Public description of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub peer: PeerId,
    pub direction: Direction,
}

/// Notifications for the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened(SessionInfo),
    /// A non-empty line received from the peer, without its terminator.
    Line {
        id: SessionId,
        peer: PeerId,
        line: String,
    },
    Closed(SessionInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// The remote closed its write side.
    Eof,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteEnd {
    /// Local input ran out; the write side is already closed.
    InputClosed,
    Stopped,
}

/// Write half with an idempotent close.
struct Writer<W> {
    framed: FramedWrite<W, LineCodec>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    fn new(io: W) -> Self {
        Self {
            framed: FramedWrite::new(io, LineCodec::default()),
            closed: false,
        }
    }

    /// Writes one line and flushes it.
    async fn send(&mut self, line: &str) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Codec(
                std::io::Error::from(std::io::ErrorKind::BrokenPipe).into(),
            ));
        }
        self.framed.send(line).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.framed.close().await?;
        Ok(())
    }
}

/// Handles the supervisor needs to tear a session down.
struct Loops<W> {
    read_done: oneshot::Receiver<Result<ReadEnd, SessionError>>,
    write_done: oneshot::Receiver<(Writer<W>, Result<WriteEnd, SessionError>)>,
    stop_read: Option<Signal>,
    stop_write: Option<Signal>,
}

/// Spawns the read and write tasks for `stream` and their supervisor.
///
/// `on_closed` runs once both loops are done and the stream is closed.
pub(crate) fn spawn<S, F>(
    executor: &TaskExecutor,
    info: SessionInfo,
    stream: S,
    input: mpsc::Receiver<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
    metrics: SessionMetrics,
    on_closed: F,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    let span = tracing::info_span!("session", id = %info.id, peer = %info.peer, direction = %info.direction);
    let (read_half, write_half) = stream.split();
    let (stop_read, read_stop) = signal();
    let (stop_write, write_stop) = signal();
    let (read_tx, read_done) = oneshot::channel();
    let (write_tx, write_done) = oneshot::channel();

    let reader = FramedRead::new(read_half, LineCodec::default());
    let read_info = info.clone();
    let read_metrics = metrics.clone();
    executor.spawn(
        "session-read",
        async move {
            let res = read_loop(reader, &read_info, &events, &read_metrics, read_stop).await;
            let _ = read_tx.send(res);
        }
        .instrument(span.clone()),
    );

    let mut writer = Writer::new(write_half);
    executor.spawn(
        "session-write",
        async move {
            let mut input = input;
            let res = write_loop(&mut writer, &mut input, &metrics, write_stop).await;
            let _ = write_tx.send((writer, res));
        }
        .instrument(span.clone()),
    );

    let loops = Loops {
        read_done,
        write_done,
        stop_read: Some(stop_read),
        stop_write: Some(stop_write),
    };
    let shutdown = executor.on_shutdown_signal().clone();
    executor.spawn(
        "session-supervisor",
        async move {
            supervise(loops, shutdown).await;
            on_closed();
        }
        .instrument(span),
    )
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: FramedRead<R, LineCodec>,
    info: &SessionInfo,
    events: &mpsc::UnboundedSender<SessionEvent>,
    metrics: &SessionMetrics,
    mut stop: Shutdown,
) -> Result<ReadEnd, SessionError> {
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop => return Ok(ReadEnd::Stopped),
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) if line.is_empty() => {}
            Some(Ok(line)) => {
                metrics.lines_received_total.increment(1);
                let _ = events.send(SessionEvent::Line {
                    id: info.id,
                    peer: info.peer,
                    line,
                });
            }
            Some(Err(err)) => return Err(err.into()),
            None => return Ok(ReadEnd::Eof),
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    writer: &mut Writer<W>,
    input: &mut mpsc::Receiver<String>,
    metrics: &SessionMetrics,
    mut stop: Shutdown,
) -> Result<WriteEnd, SessionError> {
    loop {
        let line = tokio::select! {
            biased;
            _ = &mut stop => return Ok(WriteEnd::Stopped),
            line = input.recv() => line,
        };

        let Some(line) = line else {
            writer.close().await?;
            return Ok(WriteEnd::InputClosed);
        };

        tokio::select! {
            biased;
            _ = &mut stop => return Ok(WriteEnd::Stopped),
            res = writer.send(&line) => res?,
        }
        metrics.lines_sent_total.increment(1);
    }
}

async fn supervise<W: AsyncWrite + Unpin>(mut loops: Loops<W>, mut shutdown: Shutdown) {
    let mut read_finished = false;
    let mut write_finished = false;
    let mut stopping = false;
    let mut writer = None;

    while !(read_finished && write_finished) {
        tokio::select! {
            res = &mut loops.read_done, if !read_finished => {
                read_finished = true;
                match res.unwrap_or(Err(SessionError::Aborted)) {
                    Ok(ReadEnd::Eof) => info!("Peer closed its side of the stream"),
                    Ok(ReadEnd::Stopped) => debug!("Read loop stopped"),
                    Err(err) => {
                        warn!(%err, "Session read failed");
                        fire(&mut loops.stop_write);
                    }
                }
            }
            res = &mut loops.write_done, if !write_finished => {
                write_finished = true;
                let res = match res {
                    Ok((w, res)) => {
                        writer = Some(w);
                        res
                    }
                    Err(_) => Err(SessionError::Aborted),
                };
                match res {
                    Ok(WriteEnd::InputClosed) => debug!("Local input closed"),
                    Ok(WriteEnd::Stopped) => debug!("Write loop stopped"),
                    Err(err) => {
                        warn!(%err, "Session write failed");
                        fire(&mut loops.stop_read);
                    }
                }
            }
            _ = &mut shutdown, if !stopping => {
                stopping = true;
                fire(&mut loops.stop_read);
                fire(&mut loops.stop_write);
            }
        }
    }

    if let Some(mut writer) = writer {
        match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "Failed to close stream"),
            Err(_) => debug!("Timed out closing stream"),
        }
    }
}

fn fire(signal: &mut Option<Signal>) {
    if let Some(signal) = signal.take() {
        signal.fire();
    }
}
