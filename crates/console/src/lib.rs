//! Terminal front end for chat sessions.
//!
//! The [`ConsoleBridge`] forwards every line typed locally to one active session and
//! prints every line received from any session. The active session is the most
//! recently opened one still accepting input; when it closes, the next most recent
//! one takes over.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod input;

pub use input::{LineInput, spawn_reader, stdin};

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use tryst_net_session::{SessionEvent, SessionEvents, SessionId, SessionRegistry};
use tryst_tasks::Shutdown;

/// Printed before each input line.
pub const PROMPT: &str = "> ";

/// Renders a received line: green text, then the prompt.
pub fn display_line(line: &str) -> String {
    format!("\x1b[32m{line}\n\x1b[0m{PROMPT}")
}

/// Pairs local input and output with the session registry.
pub struct ConsoleBridge<R, W> {
    input: R,
    output: W,
    registry: SessionRegistry,
    events: SessionEvents,
    active: Option<SessionId>,
}

impl<R, W> ConsoleBridge<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W, registry: SessionRegistry, events: SessionEvents) -> Self {
        Self {
            input,
            output,
            registry,
            events,
            active: None,
        }
    }

    /// Runs until `shutdown` resolves or local input ends.
    ///
    /// Input and output failures end the bridge only; sessions keep running.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        if let Err(err) = self.write(PROMPT).await {
            warn!(%err, "Failed to write to console");
            return;
        }

        let mut lines = (&mut self.input).lines();
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(event) = self.events.recv() => {
                    if let Err(err) = Self::on_event(&mut self.output, event).await {
                        warn!(%err, "Failed to write to console");
                        break;
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        Self::forward(&self.registry, &mut self.active, line).await;
                        if let Err(err) = Self::write_to(&mut self.output, PROMPT).await {
                            warn!(%err, "Failed to write to console");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Console input closed");
                        break;
                    }
                    Err(err) => {
                        warn!(%err, "Failed to read console input");
                        break;
                    }
                },
            }
        }
        debug!("Console bridge stopped");
    }

    async fn on_event(output: &mut W, event: SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Line { line, .. } => Self::write_to(output, &display_line(&line)).await,
            SessionEvent::Opened(info) => {
                debug!(session = %info.id, peer = %info.peer, "Session available");
                Ok(())
            }
            SessionEvent::Closed(info) => {
                debug!(session = %info.id, peer = %info.peer, "Session gone");
                Ok(())
            }
        }
    }

    async fn forward(registry: &SessionRegistry, active: &mut Option<SessionId>, line: String) {
        let Some(target) = registry.newest() else {
            warn!("No active session, dropping input");
            return;
        };

        if *active != Some(target.id) {
            info!(session = %target.id, peer = %target.peer, "Chatting with peer");
            *active = Some(target.id);
        }

        if let Err(err) = registry.send(target.id, line).await {
            warn!(peer = %target.peer, %err, "Failed to send line");
        }
    }

    async fn write(&mut self, text: &str) -> io::Result<()> {
        Self::write_to(&mut self.output, text).await
    }

    async fn write_to(output: &mut W, text: &str) -> io::Result<()> {
        output.write_all(text.as_bytes()).await?;
        output.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::PeerId;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream, duplex};
    use tokio_util::compat::TokioAsyncReadCompatExt;
    use tryst_net_discovery::Direction;
    use tryst_tasks::TaskManager;

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct Harness {
        stdin: DuplexStream,
        stdout: DuplexStream,
        registry: SessionRegistry,
        _manager: TaskManager,
    }

    fn harness() -> Harness {
        let manager = TaskManager::current();
        let executor = manager.executor();
        let (registry, events) = SessionRegistry::new(executor.clone());
        let (stdin, bridge_in) = duplex(1024);
        let (bridge_out, stdout) = duplex(1024);

        let bridge = ConsoleBridge::new(BufReader::new(bridge_in), bridge_out, registry.clone(), events);
        executor.spawn("console", bridge.run(executor.on_shutdown_signal().clone()));

        Harness {
            stdin,
            stdout,
            registry,
            _manager: manager,
        }
    }

    async fn read_exact(stream: &mut DuplexStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(TIMEOUT, stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    async fn read_line(stream: &mut DuplexStream) -> String {
        let mut line = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            tokio::time::timeout(TIMEOUT, stream.read_exact(&mut byte))
                .await
                .unwrap()
                .unwrap();
            if byte[0] == b'\n' {
                return String::from_utf8(line).unwrap();
            }
            line.push(byte[0]);
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(display_line("hi"), "\x1b[32mhi\n\x1b[0m> ");
    }

    #[tokio::test]
    async fn received_lines_are_displayed() {
        let mut h = harness();
        assert_eq!(read_exact(&mut h.stdout, 2).await, PROMPT);

        let (local, mut remote) = duplex(1024);
        h.registry.open(PeerId::random(), Direction::Inbound, local.compat());
        remote.write_all(b"hello\n").await.unwrap();

        let expected = display_line("hello");
        assert_eq!(read_exact(&mut h.stdout, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn input_goes_to_newest_session() {
        let mut h = harness();
        let (old_local, mut old_remote) = duplex(1024);
        let (new_local, mut new_remote) = duplex(1024);
        h.registry.open(PeerId::random(), Direction::Inbound, old_local.compat());
        let newest = h.registry.open(PeerId::random(), Direction::Outbound, new_local.compat());

        h.stdin.write_all(b"to the newest\n").await.unwrap();
        assert_eq!(read_line(&mut new_remote).await, "to the newest");

        // Once the newest session stops taking input, the previous one takes over.
        h.registry.finish_input(newest);
        h.stdin.write_all(b"to the older\n").await.unwrap();
        assert_eq!(read_line(&mut old_remote).await, "to the older");

        // Prompt at start, then one after each submitted line.
        assert_eq!(read_exact(&mut h.stdout, 6).await, "> > > ");
    }

    #[tokio::test]
    async fn input_without_session_is_dropped() {
        let mut h = harness();
        h.stdin.write_all(b"nobody listens\n").await.unwrap();
        assert_eq!(read_exact(&mut h.stdout, 4).await, "> > ");

        let (local, mut remote) = duplex(1024);
        h.registry.open(PeerId::random(), Direction::Inbound, local.compat());
        h.stdin.write_all(b"now someone does\n").await.unwrap();
        assert_eq!(read_line(&mut remote).await, "now someone does");
    }

    #[tokio::test]
    async fn input_eof_stops_bridge_but_not_sessions() {
        let mut h = harness();
        let (local, mut remote) = duplex(1024);
        let id = h.registry.open(PeerId::random(), Direction::Inbound, local.compat());

        drop(h.stdin);
        // The bridge drops its end of stdout when it stops.
        let mut rest = Vec::new();
        tokio::time::timeout(TIMEOUT, h.stdout.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rest, PROMPT.as_bytes());

        // The session is still usable without the console.
        h.registry.send(id, "direct".to_string()).await.unwrap();
        assert_eq!(read_line(&mut remote).await, "direct");
    }
}
