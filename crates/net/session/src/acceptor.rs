use crate::SessionRegistry;
use futures::{StreamExt, stream::BoxStream};
use libp2p::{PeerId, StreamProtocol};
use tracing::{info, warn};
use tryst_net_discovery::{Direction, Transport, TransportError};
use tryst_tasks::Shutdown;

/// Turns every inbound stream for one protocol into a session.
pub struct InboundAcceptor<S> {
    protocol: StreamProtocol,
    incoming: BoxStream<'static, (PeerId, S)>,
    registry: SessionRegistry,
}

impl<S> InboundAcceptor<S>
where
    S: futures::AsyncRead + futures::AsyncWrite + Unpin + Send + 'static,
{
    /// Registers `protocol` with the transport.
    ///
    /// Fails if the protocol already has a consumer.
    pub fn new<T>(
        transport: &T,
        protocol: StreamProtocol,
        registry: SessionRegistry,
    ) -> Result<Self, TransportError>
    where
        T: Transport<Stream = S>,
    {
        let incoming = transport.incoming(protocol.clone())?;
        Ok(Self {
            protocol,
            incoming,
            registry,
        })
    }

    /// Accepts streams until `shutdown` resolves or the transport stops.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(protocol = %self.protocol, "Accepting inbound streams");
        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = self.incoming.next() => next,
            };

            match next {
                Some((peer, stream)) => {
                    info!(%peer, "Got a new stream");
                    self.registry.open(peer, Direction::Inbound, stream);
                }
                None => {
                    warn!(protocol = %self.protocol, "Inbound stream feed ended");
                    break;
                }
            }
        }
    }
}
