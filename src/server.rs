use std::{io, sync::Mutex, time::Duration};

use futures::{AsyncRead, AsyncWrite};
use libp2p_core::{multiaddr::Protocol, Multiaddr};
use libp2p_identity::PeerId;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

use crate::{
    dial_back,
    generated::structs::{mod_DialResponse::ResponseStatus, DialStatus},
    host::{DialBackHost, HostCapabilities, ScopeError, StreamScope},
    policy::{is_public, AmplificationAttackPrevention, DialDataPolicy},
    protocol::{
        Coder, DialDataRequest, DialRequest, DialResponse, Request, Response, MAX_MSG_SIZE,
        MIN_DIAL_DATA_CHUNK,
    },
    rate_limiter::RateLimiter,
    with_timeout,
};

/// Service label attached to inbound dial-request streams.
pub const SERVICE_NAME: &str = "libp2p.autonatv2";

/// At most this many addresses are considered per request; the rest are
/// ignored.
const MAX_PEER_ADDRESSES: usize = 50;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Global limit on dial requests admitted per minute.
    pub rpm: usize,
    /// Limit on dial requests admitted per minute from a single peer.
    pub per_peer_rpm: usize,
    /// Limit on how many requests per minute may be charged against the
    /// dial-data quota.
    pub dial_data_rpm: usize,
    /// Also probe private, loopback and link-local addresses. Intended for
    /// tests and closed networks.
    pub allow_private_addrs: bool,
    /// Budget for serving a single dial-request stream, end to end.
    pub stream_timeout: Duration,
    /// Budget for establishing the dial-back connection and negotiating its
    /// stream.
    pub dial_back_dial_timeout: Duration,
    /// Budget for delivering the nonce on the dial-back stream.
    pub dial_back_stream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpm: 60,          // one per second
            per_peer_rpm: 12, // one per five seconds
            dial_data_rpm: 12,
            allow_private_addrs: false,
            stream_timeout: Duration::from_secs(60),
            dial_back_dial_timeout: Duration::from_secs(30),
            dial_back_stream_timeout: Duration::from_secs(5),
        }
    }
}

/// Failure while serving a dial-request stream.
///
/// These are the paths on which the stream is reset without a response; a
/// rate-limit rejection or a refused dial is answered on the wire and is not
/// an [`Error`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Resources(#[from] ScopeError),
    #[error("unexpected message type, expected {expected}")]
    UnexpectedMessage { expected: &'static str },
    #[error("dial data message of {0} bytes is too small")]
    DialDataTooSmall(usize),
    #[error("dial request stream timed out")]
    Timeout,
}

/// Outcome summary of one served dial-request stream.
#[derive(Debug)]
pub struct Event {
    /// The peer that asked to be dialed.
    pub client: PeerId,
    /// The submitted addresses that parsed as multiaddrs, capped at the
    /// number of entries the server considers per request.
    pub all_addrs: Vec<Multiaddr>,
    /// The address selected for the dial back, if any survived filtering.
    pub tested_addr: Option<Multiaddr>,
    /// Dial data received from the client, in bytes.
    pub data_amount: usize,
    /// `Ok` if a response was written and the stream closed cleanly.
    pub result: Result<(), Error>,
}

impl Event {
    fn failure(client: PeerId, error: Error) -> Self {
        Event {
            client,
            all_addrs: Vec::new(),
            tested_addr: None,
            data_amount: 0,
            result: Err(error),
        }
    }
}

enum HandleFail {
    /// Answered on the wire; the experiment was not run.
    Rejected,
    DialRefused,
    /// The client misbehaved; reset without answering.
    Reset(Error),
}

/// The AutoNAT v2 server.
///
/// `host` is the identity accepting dial requests; `dialer` is the second
/// identity dial backs are performed from. The caller is responsible for
/// handing every inbound stream negotiated for
/// [`DIAL_REQUEST_PROTOCOL`](crate::DIAL_REQUEST_PROTOCOL) to
/// [`Server::handle_dial_request`], typically one spawned task per stream.
pub struct Server<H, D, R = OsRng> {
    host: H,
    dialer: D,
    limiter: Mutex<RateLimiter>,
    policy: Box<dyn DialDataPolicy>,
    rng: R,
    config: Config,
}

impl<H, D> Server<H, D>
where
    H: HostCapabilities,
    D: DialBackHost,
{
    pub fn new(host: H, dialer: D, config: Config) -> Self {
        Self::with_rng(host, dialer, config, OsRng)
    }
}

impl<H, D, R> Server<H, D, R>
where
    H: HostCapabilities,
    D: DialBackHost,
    R: RngCore + Clone + Send + Sync + 'static,
{
    pub fn with_rng(host: H, dialer: D, config: Config, rng: R) -> Self {
        Self {
            limiter: Mutex::new(RateLimiter::new(
                config.rpm,
                config.per_peer_rpm,
                config.dial_data_rpm,
            )),
            policy: Box::new(AmplificationAttackPrevention),
            host,
            dialer,
            rng,
            config,
        }
    }

    /// Replace the dial-data policy.
    pub fn with_policy(mut self, policy: impl DialDataPolicy) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Serve one inbound dial-request stream.
    ///
    /// `client` and `observed_addr` identify the remote end of the connection
    /// the stream arrived on; `scope` is the stream's resource scope. The
    /// stream is closed on answered paths and dropped unclosed (reset) when
    /// the client is at fault.
    pub async fn handle_dial_request<S, Sc>(
        &self,
        stream: S,
        mut scope: Sc,
        client: PeerId,
        observed_addr: Multiaddr,
    ) -> Event
    where
        S: AsyncRead + AsyncWrite + Unpin,
        Sc: StreamScope,
    {
        if let Err(error) = scope.set_service(SERVICE_NAME) {
            tracing::debug!(peer=%client, %error, "failed to attach stream to service");
            return Event::failure(client, error.into());
        }
        let _reservation = match Reservation::reserve(&mut scope, MAX_MSG_SIZE) {
            Ok(reservation) => reservation,
            Err(error) => {
                tracing::debug!(peer=%client, %error, "failed to reserve memory for stream");
                return Event::failure(client, error.into());
            }
        };

        match with_timeout(
            self.config.stream_timeout,
            self.serve(stream, client, observed_addr),
        )
        .await
        {
            Some(event) => event,
            None => {
                tracing::debug!(peer=%client, "dial request stream timed out");
                Event::failure(client, Error::Timeout)
            }
        }
    }

    async fn serve<S>(&self, stream: S, client: PeerId, observed_addr: Multiaddr) -> Event
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut coder = Coder::new(stream);

        // Admission comes before the request is even parsed.
        if !self.limiter().accept(client) {
            tracing::debug!(peer=%client, "rejecting dial request: rate limit exceeded");
            let result = send_response(coder, rejection(ResponseStatus::E_REQUEST_REJECTED)).await;
            return Event {
                client,
                all_addrs: Vec::new(),
                tested_addr: None,
                data_amount: 0,
                result,
            };
        }
        let _slot = RequestSlot {
            limiter: &self.limiter,
            peer: client,
        };

        let mut all_addrs = Vec::new();
        let mut tested_addr = None;
        let mut data_amount = 0;
        let response = match self
            .serve_admitted(
                &mut coder,
                client,
                &observed_addr,
                &mut all_addrs,
                &mut tested_addr,
                &mut data_amount,
            )
            .await
        {
            Ok(response) => response,
            Err(HandleFail::Rejected) => rejection(ResponseStatus::E_REQUEST_REJECTED),
            Err(HandleFail::DialRefused) => rejection(ResponseStatus::E_DIAL_REFUSED),
            Err(HandleFail::Reset(error)) => {
                // Dropping the stream without a response resets it; a
                // misbehaving client gets nothing to interpret.
                return Event {
                    client,
                    all_addrs,
                    tested_addr,
                    data_amount,
                    result: Err(error),
                };
            }
        };

        let result = send_response(coder, response).await;
        Event {
            client,
            all_addrs,
            tested_addr,
            data_amount,
            result,
        }
    }

    async fn serve_admitted<S>(
        &self,
        coder: &mut Coder<S>,
        client: PeerId,
        observed_addr: &Multiaddr,
        all_addrs: &mut Vec<Multiaddr>,
        tested_addr: &mut Option<Multiaddr>,
        data_amount: &mut usize,
    ) -> Result<DialResponse, HandleFail>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let DialRequest { addrs, nonce } = match coder
            .next()
            .await
            .map_err(|e| HandleFail::Reset(e.into()))?
        {
            Request::Dial(dial_request) => dial_request,
            Request::Data(_) => {
                return Err(HandleFail::Reset(Error::UnexpectedMessage {
                    expected: "DialRequest",
                }))
            }
        };
        all_addrs.extend(addrs.iter().take(MAX_PEER_ADDRESSES).flatten().cloned());

        let Some((addr_idx, addr)) = self.select_dialable_addr(&client, &addrs) else {
            tracing::debug!(peer=%client, "refusing dial request: no dialable address");
            return Err(HandleFail::DialRefused);
        };
        *tested_addr = Some(addr.clone());

        let dial_data_required = self.policy.dial_data_required(observed_addr, &addr);
        // The dial-data quota is charged on every admitted request, not only
        // on those that end up requiring data.
        if !self.limiter().accept_dial_data_request() {
            tracing::debug!(peer=%client, "rejecting dial request: dial data quota exceeded");
            return Err(HandleFail::Rejected);
        }

        if dial_data_required {
            tracing::debug!(peer=%client, addr=%addr, "requiring dial data before dial back");
            *data_amount = self
                .exchange_dial_data(coder, addr_idx)
                .await
                .map_err(HandleFail::Reset)?;
        }

        let dial_status = dial_back::dial_back(
            &self.dialer,
            client,
            addr,
            nonce,
            self.config.dial_back_dial_timeout,
            self.config.dial_back_stream_timeout,
        )
        .await;

        Ok(DialResponse {
            status: ResponseStatus::OK,
            addr_idx,
            dial_status,
        })
    }

    /// The first address that may be probed wins. An address is skipped if it
    /// did not parse, is not public (unless configured otherwise), is
    /// relayed, or if either identity's transports consider it undialable.
    fn select_dialable_addr(
        &self,
        client: &PeerId,
        addrs: &[Option<Multiaddr>],
    ) -> Option<(usize, Multiaddr)> {
        for (idx, addr) in addrs.iter().take(MAX_PEER_ADDRESSES).enumerate() {
            let Some(addr) = addr else { continue };
            if !self.config.allow_private_addrs && !is_public(addr) {
                continue;
            }
            if addr.iter().any(|p| matches!(p, Protocol::P2pCircuit)) {
                continue;
            }
            if !self.dialer.can_dial(client, addr) {
                continue;
            }
            // The accepting host is asked second: its black-hole detector
            // knows whether this IP family currently works from here at all.
            if !self.host.can_dial(client, addr) {
                continue;
            }
            return Some((idx, addr.clone()));
        }
        None
    }

    async fn exchange_dial_data<S>(
        &self,
        coder: &mut Coder<S>,
        addr_idx: usize,
    ) -> Result<usize, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = DialDataRequest::from_rng(addr_idx, self.rng.clone());
        let num_bytes = request.num_bytes;
        coder.send(Response::Data(request)).await?;

        let mut received = 0;
        while received < num_bytes {
            let chunk = match coder.next().await? {
                Request::Data(response) => response.data_count(),
                Request::Dial(_) => {
                    return Err(Error::UnexpectedMessage {
                        expected: "DialDataResponse",
                    })
                }
            };
            received += chunk;
            if chunk < MIN_DIAL_DATA_CHUNK && received < num_bytes {
                return Err(Error::DialDataTooSmall(chunk));
            }
        }
        Ok(received)
    }

    fn limiter(&self) -> std::sync::MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn rejection(status: ResponseStatus) -> DialResponse {
    DialResponse {
        status,
        addr_idx: 0,
        dial_status: DialStatus::UNUSED,
    }
}

async fn send_response<S>(mut coder: Coder<S>, response: DialResponse) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    coder.send(Response::Dial(response)).await?;
    coder.close().await?;
    Ok(())
}

/// Releases the per-peer request slot when the worker exits, however it
/// exits.
struct RequestSlot<'a> {
    limiter: &'a Mutex<RateLimiter>,
    peer: PeerId,
}

impl Drop for RequestSlot<'_> {
    fn drop(&mut self) {
        let mut limiter = match self.limiter.lock() {
            Ok(limiter) => limiter,
            Err(poisoned) => poisoned.into_inner(),
        };
        limiter.complete_request(&self.peer);
    }
}

/// Holds the stream's memory reservation; released on drop.
struct Reservation<'a, S: StreamScope> {
    scope: &'a mut S,
    bytes: usize,
}

impl<'a, S: StreamScope> Reservation<'a, S> {
    fn reserve(scope: &'a mut S, bytes: usize) -> Result<Self, ScopeError> {
        scope.reserve_memory(bytes)?;
        Ok(Self { scope, bytes })
    }
}

impl<S: StreamScope> Drop for Reservation<'_, S> {
    fn drop(&mut self) {
        self.scope.release_memory(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::{channel::mpsc, future::BoxFuture, FutureExt, SinkExt, StreamExt};
    use futures_ringbuf::Endpoint;
    use libp2p_swarm::StreamProtocol;
    use tracing_subscriber::EnvFilter;

    use super::*;
    use crate::{
        generated::structs as proto,
        host::UnlimitedScope,
        protocol::{DialBack, DialDataResponse, DATA_FIELD_LEN_UPPER_BOUND},
        Nonce,
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    fn always_dialable(_: &PeerId, _: &Multiaddr) -> bool {
        true
    }

    type TestServer = Server<fn(&PeerId, &Multiaddr) -> bool, TestDialer>;

    fn test_config() -> Config {
        Config {
            // The scenario addresses come from the documentation ranges.
            allow_private_addrs: true,
            ..Config::default()
        }
    }

    fn test_server(dialer: TestDialer, config: Config) -> Arc<TestServer> {
        Arc::new(Server::new(
            always_dialable as fn(&PeerId, &Multiaddr) -> bool,
            dialer,
            config,
        ))
    }

    #[derive(Clone)]
    struct TestDialer {
        peer_id: PeerId,
        dialable: bool,
        connect_ok: bool,
        dial_back_streams: mpsc::UnboundedSender<Endpoint>,
        added: Arc<Mutex<Vec<(PeerId, Multiaddr)>>>,
        disconnected: Arc<Mutex<Vec<PeerId>>>,
    }

    impl TestDialer {
        fn new() -> (Self, mpsc::UnboundedReceiver<Endpoint>) {
            let (tx, rx) = mpsc::unbounded();
            (
                Self {
                    peer_id: PeerId::random(),
                    dialable: true,
                    connect_ok: true,
                    dial_back_streams: tx,
                    added: Arc::default(),
                    disconnected: Arc::default(),
                },
                rx,
            )
        }
    }

    impl DialBackHost for TestDialer {
        type Stream = Endpoint;

        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        fn can_dial(&self, _peer: &PeerId, _addr: &Multiaddr) -> bool {
            self.dialable
        }

        fn add_address(&self, peer: &PeerId, addr: Multiaddr) {
            self.added.lock().unwrap().push((*peer, addr));
        }

        fn connect(&self, _peer: PeerId) -> BoxFuture<'static, io::Result<()>> {
            let ok = self.connect_ok;
            async move {
                if ok {
                    Ok(())
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ))
                }
            }
            .boxed()
        }

        fn open_stream(
            &self,
            _peer: PeerId,
            _protocol: StreamProtocol,
        ) -> BoxFuture<'static, io::Result<Endpoint>> {
            let streams = self.dial_back_streams.clone();
            async move {
                let (near, far) = Endpoint::pair(4096, 4096);
                streams
                    .unbounded_send(far)
                    .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "listener gone"))?;
                Ok(near)
            }
            .boxed()
        }

        fn disconnect(&self, peer: &PeerId) {
            self.disconnected.lock().unwrap().push(*peer);
        }
    }

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    fn dial_request(addrs: Vec<Multiaddr>, nonce: Nonce) -> Request {
        Request::Dial(DialRequest {
            addrs: addrs.into_iter().map(Some).collect(),
            nonce,
        })
    }

    /// Answer one dial back: read the nonce, acknowledge with a
    /// `DialBackResponse` frame, and return the nonce.
    async fn answer_dial_back(streams: &mut mpsc::UnboundedReceiver<Endpoint>) -> Nonce {
        let mut stream = streams.next().await.unwrap();
        let dial_back = DialBack::read_from(&mut stream).await.unwrap();
        let response = proto::DialBackResponse {
            status: Some(proto::mod_DialBackResponse::DialBackStatus::OK),
        };
        asynchronous_codec::FramedWrite::new(
            &mut stream,
            quick_protobuf_codec::Codec::<proto::DialBackResponse>::new(16),
        )
        .send(response)
        .await
        .unwrap();
        dial_back.nonce
    }

    async fn read_dial_response(coder: &mut Coder<Endpoint>) -> DialResponse {
        match coder.next().await.unwrap() {
            Response::Dial(response) => response,
            Response::Data(_) => panic!("expected dial response"),
        }
    }

    #[tokio::test]
    async fn dial_back_without_dial_data_when_ips_match() {
        init_tracing();
        let (dialer, mut dial_back_streams) = TestDialer::new();
        let server = test_server(dialer, test_config());

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let client = PeerId::random();
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.5/tcp/4001")], 42))
            .await
            .unwrap();

        assert_eq!(answer_dial_back(&mut dial_back_streams).await, 42);

        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        assert_eq!(response.addr_idx, 0);
        assert_eq!(response.dial_status, DialStatus::OK);

        let event = handle.await.unwrap();
        assert!(event.result.is_ok(), "{:?}", event.result);
        assert_eq!(event.client, client);
        assert_eq!(event.tested_addr, Some(addr("/ip4/203.0.113.5/tcp/4001")));
        assert_eq!(event.data_amount, 0);
    }

    #[tokio::test]
    async fn dial_data_demanded_for_differing_ip() {
        init_tracing();
        let (dialer, mut dial_back_streams) = TestDialer::new();
        let server = test_server(dialer, test_config());

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let client = PeerId::random();
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/198.51.100.7/tcp/4001")], 7))
            .await
            .unwrap();

        let data_request = match coder.next().await.unwrap() {
            Response::Data(request) => request,
            Response::Dial(response) => panic!("expected dial data request, got {response:?}"),
        };
        assert_eq!(data_request.addr_idx, 0);
        assert!(
            (crate::protocol::MIN_HANDSHAKE_BYTES..crate::protocol::MAX_HANDSHAKE_BYTES)
                .contains(&data_request.num_bytes)
        );

        let mut remaining = data_request.num_bytes;
        while remaining > 0 {
            let chunk = remaining.min(DATA_FIELD_LEN_UPPER_BOUND);
            coder
                .send(Request::Data(DialDataResponse::new(chunk).unwrap()))
                .await
                .unwrap();
            remaining -= chunk;
        }

        assert_eq!(answer_dial_back(&mut dial_back_streams).await, 7);

        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        assert_eq!(response.dial_status, DialStatus::OK);

        let event = handle.await.unwrap();
        assert!(event.result.is_ok(), "{:?}", event.result);
        assert!(event.data_amount >= data_request.num_bytes);
    }

    #[tokio::test]
    async fn trickled_dial_data_resets_the_stream() {
        init_tracing();
        let (dialer, _dial_back_streams) = TestDialer::new();
        let server = test_server(dialer, test_config());

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let client = PeerId::random();
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/198.51.100.7/tcp/4001")], 7))
            .await
            .unwrap();

        let Response::Data(_) = coder.next().await.unwrap() else {
            panic!("expected dial data request");
        };
        coder
            .send(Request::Data(DialDataResponse::new(50).unwrap()))
            .await
            .unwrap();

        let event = handle.await.unwrap();
        assert!(matches!(event.result, Err(Error::DialDataTooSmall(50))));
        // No response was written before the reset.
        assert!(coder.next::<Response, _>().await.is_err());
    }

    #[tokio::test]
    async fn requests_over_global_limit_are_rejected() {
        init_tracing();
        let (dialer, mut dial_back_streams) = TestDialer::new();
        let server = test_server(
            dialer,
            Config {
                rpm: 1,
                ..test_config()
            },
        );

        // First request uses up the global quota, whatever its outcome.
        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let first = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        PeerId::random(),
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };
        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.5/tcp/4001")], 1))
            .await
            .unwrap();
        assert_eq!(answer_dial_back(&mut dial_back_streams).await, 1);
        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        first.await.unwrap();

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let second = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        PeerId::random(),
                        addr("/ip4/203.0.113.6/tcp/49152"),
                    )
                    .await
            })
        };
        // The rejection arrives without the client sending anything.
        let mut coder = Coder::new(client_end);
        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::E_REQUEST_REJECTED);
        second.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_request_from_same_peer_is_rejected() {
        init_tracing();
        let (dialer, _dial_back_streams) = TestDialer::new();
        let server = test_server(dialer, test_config());
        let client = PeerId::random();

        let (client_end_1, server_end_1) = Endpoint::pair(4096, 4096);
        let first = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end_1,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };
        let mut coder_1 = Coder::new(client_end_1);
        coder_1
            .send(dial_request(vec![addr("/ip4/198.51.100.7/tcp/4001")], 1))
            .await
            .unwrap();
        // Once the dial-data request arrives, the first request is admitted
        // and parked waiting for data.
        let Response::Data(_) = coder_1.next().await.unwrap() else {
            panic!("expected dial data request");
        };

        let (client_end_2, server_end_2) = Endpoint::pair(4096, 4096);
        let second = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end_2,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49153"),
                    )
                    .await
            })
        };
        let mut coder_2 = Coder::new(client_end_2);
        let response = read_dial_response(&mut coder_2).await;
        assert_eq!(response.status, ResponseStatus::E_REQUEST_REJECTED);
        second.await.unwrap();

        // Abandoning the first stream releases the slot.
        drop(coder_1);
        let event = first.await.unwrap();
        assert!(event.result.is_err());
    }

    #[tokio::test]
    async fn refuses_when_no_address_is_dialable() {
        init_tracing();
        let (dialer, _dial_back_streams) = TestDialer::new();
        let added = dialer.added.clone();
        let server = test_server(
            dialer,
            Config {
                allow_private_addrs: false,
                ..test_config()
            },
        );

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let client = PeerId::random();
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/1.2.3.4/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(
                vec![
                    addr("/ip4/192.168.1.2/tcp/4001"),
                    addr("/ip4/127.0.0.1/tcp/4001"),
                    addr("/ip4/1.2.3.4/tcp/4001/p2p-circuit"),
                ],
                1,
            ))
            .await
            .unwrap();

        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::E_DIAL_REFUSED);

        let event = handle.await.unwrap();
        assert!(event.result.is_ok(), "{:?}", event.result);
        assert_eq!(event.tested_addr, None);
        // No dial back was attempted.
        assert!(added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn undialable_peer_gets_dial_error_in_ok_envelope() {
        init_tracing();
        let (mut dialer, _dial_back_streams) = TestDialer::new();
        dialer.connect_ok = false;
        let disconnected = dialer.disconnected.clone();
        let server = test_server(dialer, test_config());

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let client = PeerId::random();
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.5/tcp/4001")], 9))
            .await
            .unwrap();

        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        assert_eq!(response.dial_status, DialStatus::E_DIAL_ERROR);

        let event = handle.await.unwrap();
        assert!(event.result.is_ok(), "{:?}", event.result);
        // The dialer cleaned up the peer it failed to reach.
        assert_eq!(&*disconnected.lock().unwrap(), &[client]);
    }

    #[tokio::test]
    async fn non_dial_request_resets_the_stream() {
        init_tracing();
        let (dialer, _dial_back_streams) = TestDialer::new();
        let server = test_server(dialer, test_config());

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        PeerId::random(),
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };

        let mut coder = Coder::new(client_end);
        coder
            .send(Request::Data(DialDataResponse::new(128).unwrap()))
            .await
            .unwrap();

        let event = handle.await.unwrap();
        assert!(matches!(
            event.result,
            Err(Error::UnexpectedMessage { .. })
        ));
        assert!(coder.next::<Response, _>().await.is_err());
    }

    #[tokio::test]
    async fn silent_client_times_out_and_releases_its_slot() {
        init_tracing();
        let (dialer, mut dial_back_streams) = TestDialer::new();
        let server = test_server(
            dialer,
            Config {
                stream_timeout: Duration::from_millis(100),
                ..test_config()
            },
        );
        let client = PeerId::random();

        let (_client_end, server_end) = Endpoint::pair(4096, 4096);
        let event = server
            .handle_dial_request(
                server_end,
                UnlimitedScope,
                client,
                addr("/ip4/203.0.113.5/tcp/49152"),
            )
            .await;
        assert!(matches!(event.result, Err(Error::Timeout)));

        // The same peer can immediately make a fresh request.
        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        client,
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };
        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.5/tcp/4001")], 5))
            .await
            .unwrap();
        assert_eq!(answer_dial_back(&mut dial_back_streams).await, 5);
        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dial_data_quota_rejections_use_the_rejected_status() {
        init_tracing();
        let (dialer, mut dial_back_streams) = TestDialer::new();
        let server = test_server(
            dialer,
            Config {
                dial_data_rpm: 1,
                ..test_config()
            },
        );

        // First request drains the dial-data quota even though no dial data
        // is demanded for it.
        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let first = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        PeerId::random(),
                        addr("/ip4/203.0.113.5/tcp/49152"),
                    )
                    .await
            })
        };
        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.5/tcp/4001")], 1))
            .await
            .unwrap();
        assert_eq!(answer_dial_back(&mut dial_back_streams).await, 1);
        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::OK);
        first.await.unwrap();

        let (client_end, server_end) = Endpoint::pair(4096, 4096);
        let second = {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .handle_dial_request(
                        server_end,
                        UnlimitedScope,
                        PeerId::random(),
                        addr("/ip4/203.0.113.6/tcp/49152"),
                    )
                    .await
            })
        };
        let mut coder = Coder::new(client_end);
        coder
            .send(dial_request(vec![addr("/ip4/203.0.113.6/tcp/4001")], 2))
            .await
            .unwrap();
        let response = read_dial_response(&mut coder).await;
        assert_eq!(response.status, ResponseStatus::E_REQUEST_REJECTED);
        second.await.unwrap();
    }
}
