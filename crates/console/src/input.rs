//! Console input read on a dedicated OS thread.
//!
//! Blocking reads on a terminal cannot be cancelled. Running them on a plain
//! thread instead of the runtime's blocking pool lets the runtime shut down while
//! a read is still pending; the thread dies with the process.

use bytes::Bytes;
use std::io::{self, BufRead, BufReader, Read};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tracing::debug;

/// Lines read ahead of the console.
const LINE_BUFFER: usize = 16;

/// Async view of lines read by a background thread.
pub type LineInput = StreamReader<ReceiverStream<io::Result<Bytes>>, Bytes>;

/// The process's stdin.
pub fn stdin() -> io::Result<LineInput> {
    spawn_reader(io::stdin())
}

/// Reads `source` line by line on a new thread.
///
/// The thread stops at end of input, after a read error, or once the returned
/// reader is dropped and the next line arrives.
pub fn spawn_reader<R>(source: R) -> io::Result<LineInput>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let mut source = BufReader::new(source);
            loop {
                let mut line = Vec::new();
                let chunk = match source.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => Ok(Bytes::from(line)),
                    Err(err) => Err(err),
                };
                let failed = chunk.is_err();
                if tx.blocking_send(chunk).is_err() || failed {
                    break;
                }
            }
            debug!("Console input thread stopped");
        })?;
    Ok(StreamReader::new(ReceiverStream::new(rx)))
}
