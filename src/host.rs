//! Interfaces the server consumes from the two underlying host identities.

use std::io;

use futures::{future::BoxFuture, AsyncRead, AsyncWrite};
use libp2p_core::Multiaddr;
use libp2p_identity::PeerId;
use libp2p_swarm::StreamProtocol;
use thiserror::Error;

/// The accepting host's view of its own transports.
///
/// The server never dials from this host; it only asks whether the host
/// *could* dial an address. The answer is expected to reflect configured
/// transports and black-hole state, not an actual dial attempt.
pub trait HostCapabilities: Send + Sync + 'static {
    fn can_dial(&self, peer: &PeerId, addr: &Multiaddr) -> bool;
}

impl<F> HostCapabilities for F
where
    F: Fn(&PeerId, &Multiaddr) -> bool + Send + Sync + 'static,
{
    fn can_dial(&self, peer: &PeerId, addr: &Multiaddr) -> bool {
        self(peer, addr)
    }
}

/// The second host identity from which dial backs are performed.
///
/// Implementations must be backed by a peer identity distinct from the host
/// accepting dial requests, with its own keypair, connection table and
/// address book. A dial back must open a fresh connection: reusing a
/// connection the client already has open would prove nothing about the
/// address under test.
pub trait DialBackHost: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Peer id of the dialer identity.
    fn local_peer_id(&self) -> PeerId;

    /// Whether this identity's transports could dial `addr`.
    fn can_dial(&self, peer: &PeerId, addr: &Multiaddr) -> bool;

    /// Register `addr` as a short-lived address-book entry for `peer`.
    fn add_address(&self, peer: &PeerId, addr: Multiaddr);

    /// Establish a fresh connection to `peer` at its registered addresses.
    /// Relayed paths must not be used.
    fn connect(&self, peer: PeerId) -> BoxFuture<'static, io::Result<()>>;

    /// Open an outbound stream to `peer`, negotiated for `protocol`.
    fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> BoxFuture<'static, io::Result<Self::Stream>>;

    /// Close any connection to `peer` and drop its address-book entries.
    fn disconnect(&self, peer: &PeerId);
}

/// A resource scope refused an operation.
#[derive(Debug, Error)]
#[error("stream resource scope: {0}")]
pub struct ScopeError(pub &'static str);

/// Resource accounting scope of an inbound stream.
///
/// Mirrors the per-stream scope of a host resource manager: the handler
/// reserves its message buffer against the scope for the lifetime of the
/// stream and releases it on exit.
pub trait StreamScope: Send + 'static {
    /// Label the stream as belonging to `service`.
    fn set_service(&mut self, service: &str) -> Result<(), ScopeError>;

    /// Reserve `bytes` of memory against this scope.
    fn reserve_memory(&mut self, bytes: usize) -> Result<(), ScopeError>;

    /// Return a previous reservation of `bytes`.
    fn release_memory(&mut self, bytes: usize);
}

/// Scope for hosts that do not account stream resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedScope;

impl StreamScope for UnlimitedScope {
    fn set_service(&mut self, _service: &str) -> Result<(), ScopeError> {
        Ok(())
    }

    fn reserve_memory(&mut self, _bytes: usize) -> Result<(), ScopeError> {
        Ok(())
    }

    fn release_memory(&mut self, _bytes: usize) {}
}
