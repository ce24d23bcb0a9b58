//! The dial-back side of a probe: deliver the nonce over a fresh connection
//! opened from the dialer identity.

use std::time::Duration;

use futures::{
    future::{self, Either},
    AsyncReadExt, AsyncWriteExt,
};
use futures_timer::Delay;
use libp2p_core::Multiaddr;
use libp2p_identity::PeerId;

use crate::{
    generated::structs::DialStatus, host::DialBackHost, protocol::DialBack, with_timeout, Nonce,
    DIAL_BACK_PROTOCOL,
};

/// Wait at most this long for the peer to acknowledge the nonce.
const READ_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial `addr` from the dialer identity and deliver `nonce` on the dial-back
/// protocol.
///
/// The connection exists for this one probe: whatever the outcome, the peer
/// is disconnected and its address-book entries on the dialer are dropped
/// before returning.
pub(crate) async fn dial_back<D: DialBackHost>(
    dialer: &D,
    peer: PeerId,
    addr: Multiaddr,
    nonce: Nonce,
    dial_timeout: Duration,
    stream_timeout: Duration,
) -> DialStatus {
    dialer.add_address(&peer, addr);
    let status = run(dialer, peer, nonce, dial_timeout, stream_timeout).await;
    dialer.disconnect(&peer);
    status
}

async fn run<D: DialBackHost>(
    dialer: &D,
    peer: PeerId,
    nonce: Nonce,
    dial_timeout: Duration,
    stream_timeout: Duration,
) -> DialStatus {
    // Connection establishment and stream negotiation share one budget.
    let mut dial_deadline = Delay::new(dial_timeout);

    match future::select(dialer.connect(peer), &mut dial_deadline).await {
        Either::Left((Ok(()), _)) => {}
        Either::Left((Err(error), _)) => {
            tracing::debug!(%peer, %error, "dial back connection failed");
            return DialStatus::E_DIAL_ERROR;
        }
        Either::Right(_) => {
            tracing::debug!(%peer, "dial back connection timed out");
            return DialStatus::E_DIAL_ERROR;
        }
    }

    let mut stream = match future::select(
        dialer.open_stream(peer, DIAL_BACK_PROTOCOL),
        &mut dial_deadline,
    )
    .await
    {
        Either::Left((Ok(stream), _)) => stream,
        Either::Left((Err(error), _)) => {
            tracing::debug!(%peer, %error, "failed to open dial back stream");
            return DialStatus::E_DIAL_BACK_ERROR;
        }
        Either::Right(_) => {
            tracing::debug!(%peer, "opening dial back stream timed out");
            return DialStatus::E_DIAL_BACK_ERROR;
        }
    };

    match with_timeout(stream_timeout, DialBack { nonce }.write_into(&mut stream)).await {
        Some(Ok(())) => {}
        Some(Err(error)) => {
            tracing::debug!(%peer, %error, "failed to write dial back nonce");
            return DialStatus::E_DIAL_BACK_ERROR;
        }
        None => {
            tracing::debug!(%peer, "writing dial back nonce timed out");
            return DialStatus::E_DIAL_BACK_ERROR;
        }
    }

    // Disconnecting drops buffered writes, so the write alone does not prove
    // the nonce got out. Close the write side and wait for one byte from the
    // peer; a completed read means the message left our send queue. The
    // peer's answer itself carries no information, and a peer that never
    // answers does not turn a delivered nonce into a failure.
    let confirm = async {
        let _ = stream.close().await;
        let mut buf = [0u8; 1];
        let _ = stream.read(&mut buf).await;
    };
    let _ = with_timeout(READ_CONFIRM_TIMEOUT, confirm).await;

    DialStatus::OK
}
