//! Server side of the AutoNAT v2 dial-back protocol.
//!
//! A client that wants to know whether it is reachable at an address sends a
//! dial request carrying a nonce and a list of candidate addresses. The
//! server picks the first address it considers dialable, optionally makes the
//! client pay for the dial with random "dial data" (so the protocol cannot be
//! used to amplify traffic towards a victim), then dials the address back
//! from a *second* host identity and delivers the nonce on the dial-back
//! protocol. The client matches the nonce to its request and learns whether
//! the address is reachable from the outside.
//!
//! The dial back deliberately runs on a separate identity with its own
//! connection table and address book: answering over the connection the
//! client already has open would prove nothing about the address.
//!
//! The crate is transport-agnostic. Inbound streams are any
//! `AsyncRead + AsyncWrite` value; the two host identities are supplied
//! through the [`HostCapabilities`] and [`DialBackHost`] traits.

use std::time::Duration;

use futures::future::{self, Either};
use futures_timer::Delay;
use libp2p_swarm::StreamProtocol;

mod dial_back;
mod generated;
mod host;
mod policy;
mod protocol;
mod rate_limiter;
mod server;

pub use crate::{
    host::{DialBackHost, HostCapabilities, ScopeError, StreamScope, UnlimitedScope},
    policy::{AmplificationAttackPrevention, DialDataPolicy},
    server::{Config, Error, Event, Server, SERVICE_NAME},
};

/// Protocol name of the inbound dial-request stream.
pub const DIAL_REQUEST_PROTOCOL: StreamProtocol =
    StreamProtocol::new("/libp2p/autonat/2/dial-request");
/// Protocol name of the outbound dial-back stream, opened from the dialer
/// identity.
pub const DIAL_BACK_PROTOCOL: StreamProtocol = StreamProtocol::new("/libp2p/autonat/2/dial-back");

/// 64-bit value chosen by the client and echoed on the dial-back stream, so
/// the client can match dial backs to requests.
pub type Nonce = u64;

/// Resolves to `None` if `fut` does not complete within `timeout`.
pub(crate) async fn with_timeout<F: std::future::Future>(
    timeout: Duration,
    fut: F,
) -> Option<F::Output> {
    futures::pin_mut!(fut);
    match future::select(fut, Delay::new(timeout)).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}
