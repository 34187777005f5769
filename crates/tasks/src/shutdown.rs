//! Shutdown signalling.
//!
//! [`signal`] returns a [`Signal`] / [`Shutdown`] pair. The [`Shutdown`] half is a
//! cloneable future that resolves once the [`Signal`] is fired or dropped, so every
//! long-running loop can race it against its own suspension points.

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{
    FutureExt,
    future::{FusedFuture, Shared},
};
use tokio::sync::oneshot;

/// Create a linked shutdown signal pair.
pub fn signal() -> (Signal, Shutdown) {
    let (sender, receiver) = oneshot::channel();
    (Signal(sender), Shutdown(receiver.shared()))
}

/// Fires the shutdown for every clone of the paired [`Shutdown`].
///
/// Dropping the signal without firing it has the same effect.
#[derive(Debug)]
pub struct Signal(oneshot::Sender<()>);

impl Signal {
    /// Fire the signal.
    pub fn fire(self) {
        let _ = self.0.send(());
    }
}

/// A future that resolves when the node is shutting down.
#[derive(Debug, Clone)]
#[must_use = "futures do nothing unless polled"]
pub struct Shutdown(Shared<oneshot::Receiver<()>>);

impl Future for Shutdown {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.0.is_terminated() || this.0.poll_unpin(cx).is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
