use std::io::{self, ErrorKind};

use asynchronous_codec::{Framed, FramedRead, FramedWrite};
use futures::{AsyncRead, AsyncWrite, SinkExt, StreamExt};
use libp2p_core::Multiaddr;
use quick_protobuf_codec::Codec;
use rand::Rng;
use rand_core::RngCore;

use crate::{generated::structs as proto, Nonce};

/// Upper bound for a single framed message on the dial-request stream.
pub(crate) const MAX_MSG_SIZE: usize = 8192;
/// Bounds for the amount of dial data demanded from a client, in bytes. The
/// demanded amount is drawn uniformly from this half-open range.
pub(crate) const MIN_HANDSHAKE_BYTES: usize = 30_000;
pub(crate) const MAX_HANDSHAKE_BYTES: usize = 100_000;
/// Largest data field a client is expected to pack into one
/// `DialDataResponse` message.
pub(crate) const DATA_FIELD_LEN_UPPER_BOUND: usize = 4096;
/// Smallest dial-data message accepted while more data is owed. Clients
/// trickling tiny messages would make the server pay more in framing work
/// than they pay in bandwidth.
pub(crate) const MIN_DIAL_DATA_CHUNK: usize = 100;

fn new_io_invalid_data_err(msg: impl Into<String>) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.into())
}

macro_rules! ok_or_invalid_data {
    ($field:ident) => {
        $field.ok_or_else(|| new_io_invalid_data_err(concat!(stringify!($field), " is missing")))
    };
}

/// Length-delimited protobuf framing over the dial-request stream, typed at
/// the edges.
pub(crate) struct Coder<I> {
    inner: Framed<I, Codec<proto::Message>>,
}

impl<I> Coder<I>
where
    I: AsyncWrite + AsyncRead + Unpin,
{
    pub(crate) fn new(io: I) -> Self {
        Self {
            inner: Framed::new(io, Codec::new(MAX_MSG_SIZE)),
        }
    }

    pub(crate) async fn close(mut self) -> io::Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

impl<I> Coder<I>
where
    I: AsyncRead + Unpin,
{
    pub(crate) async fn next<M, E>(&mut self) -> io::Result<M>
    where
        proto::Message: TryInto<M, Error = E>,
        io::Error: From<E>,
    {
        Ok(self.next_msg().await?.try_into()?)
    }

    async fn next_msg(&mut self) -> io::Result<proto::Message> {
        self.inner
            .next()
            .await
            .ok_or(io::Error::new(
                ErrorKind::UnexpectedEof,
                "no message to read",
            ))?
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }
}

impl<I> Coder<I>
where
    I: AsyncWrite + Unpin,
{
    pub(crate) async fn send<M>(&mut self, msg: M) -> io::Result<()>
    where
        M: Into<proto::Message>,
    {
        self.inner.send(msg.into()).await?;
        Ok(())
    }
}

/// Messages a client may send on the dial-request stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    Dial(DialRequest),
    Data(DialDataResponse),
}

/// Address entries that fail to parse are kept as `None`: the index of an
/// entry is part of the protocol and must keep lining up with the client's
/// original list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DialRequest {
    pub(crate) addrs: Vec<Option<Multiaddr>>,
    pub(crate) nonce: Nonce,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DialDataResponse {
    data_count: usize,
}

impl DialDataResponse {
    pub(crate) fn new(data_count: usize) -> Option<Self> {
        (data_count <= DATA_FIELD_LEN_UPPER_BOUND).then_some(Self { data_count })
    }

    pub(crate) fn data_count(&self) -> usize {
        self.data_count
    }
}

impl TryFrom<proto::Message> for Request {
    type Error = io::Error;

    fn try_from(msg: proto::Message) -> Result<Self, Self::Error> {
        match msg.msg {
            proto::mod_Message::OneOfmsg::dialRequest(proto::DialRequest { addrs, nonce }) => {
                let addrs = addrs
                    .into_iter()
                    .map(|bytes| Multiaddr::try_from(bytes).ok())
                    .collect();
                let nonce = ok_or_invalid_data!(nonce)?;
                Ok(Self::Dial(DialRequest { addrs, nonce }))
            }
            proto::mod_Message::OneOfmsg::dialDataResponse(proto::DialDataResponse { data }) => {
                let data_count = ok_or_invalid_data!(data)?.len();
                Ok(Self::Data(DialDataResponse { data_count }))
            }
            _ => Err(new_io_invalid_data_err(
                "expected dialRequest or dialDataResponse",
            )),
        }
    }
}

impl From<Request> for proto::Message {
    fn from(request: Request) -> Self {
        match request {
            Request::Dial(DialRequest { addrs, nonce }) => {
                let addrs = addrs
                    .into_iter()
                    .map(|addr| addr.map(|a| a.to_vec()).unwrap_or_default())
                    .collect();
                proto::Message {
                    msg: proto::mod_Message::OneOfmsg::dialRequest(proto::DialRequest {
                        addrs,
                        nonce: Some(nonce),
                    }),
                }
            }
            Request::Data(DialDataResponse { data_count }) => {
                debug_assert!(
                    data_count <= DATA_FIELD_LEN_UPPER_BOUND,
                    "data_count too large"
                );
                proto::Message {
                    msg: proto::mod_Message::OneOfmsg::dialDataResponse(proto::DialDataResponse {
                        data: Some(vec![0; data_count]),
                    }),
                }
            }
        }
    }
}

/// Messages the server may send on the dial-request stream.
#[derive(Debug, Clone)]
pub(crate) enum Response {
    Dial(DialResponse),
    Data(DialDataRequest),
}

#[derive(Debug, Clone)]
pub(crate) struct DialDataRequest {
    pub(crate) addr_idx: usize,
    pub(crate) num_bytes: usize,
}

impl DialDataRequest {
    pub(crate) fn from_rng<R: RngCore>(addr_idx: usize, mut rng: R) -> Self {
        let num_bytes = rng.gen_range(MIN_HANDSHAKE_BYTES..MAX_HANDSHAKE_BYTES);
        Self {
            addr_idx,
            num_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DialResponse {
    pub(crate) status: proto::mod_DialResponse::ResponseStatus,
    pub(crate) addr_idx: usize,
    pub(crate) dial_status: proto::DialStatus,
}

impl TryFrom<proto::Message> for Response {
    type Error = io::Error;

    fn try_from(msg: proto::Message) -> Result<Self, Self::Error> {
        match msg.msg {
            proto::mod_Message::OneOfmsg::dialResponse(proto::DialResponse {
                status,
                addrIdx,
                dialStatus,
            }) => {
                let status = ok_or_invalid_data!(status)?;
                let addr_idx = ok_or_invalid_data!(addrIdx)? as usize;
                let dial_status = ok_or_invalid_data!(dialStatus)?;
                Ok(Self::Dial(DialResponse {
                    status,
                    addr_idx,
                    dial_status,
                }))
            }
            proto::mod_Message::OneOfmsg::dialDataRequest(proto::DialDataRequest {
                addrIdx,
                numBytes,
            }) => {
                let addr_idx = ok_or_invalid_data!(addrIdx)? as usize;
                let num_bytes = ok_or_invalid_data!(numBytes)? as usize;
                Ok(Self::Data(DialDataRequest {
                    addr_idx,
                    num_bytes,
                }))
            }
            _ => Err(new_io_invalid_data_err(
                "expected dialResponse or dialDataRequest",
            )),
        }
    }
}

impl From<Response> for proto::Message {
    fn from(response: Response) -> Self {
        match response {
            Response::Dial(DialResponse {
                status,
                addr_idx,
                dial_status,
            }) => proto::Message {
                msg: proto::mod_Message::OneOfmsg::dialResponse(proto::DialResponse {
                    status: Some(status),
                    addrIdx: Some(addr_idx as u32),
                    dialStatus: Some(dial_status),
                }),
            },
            Response::Data(DialDataRequest {
                addr_idx,
                num_bytes,
            }) => proto::Message {
                msg: proto::mod_Message::OneOfmsg::dialDataRequest(proto::DialDataRequest {
                    addrIdx: Some(addr_idx as u32),
                    numBytes: Some(num_bytes as u64),
                }),
            },
        }
    }
}

const DIAL_BACK_MAX_SIZE: usize = 10;

/// The single message of the dial-back protocol.
pub(crate) struct DialBack {
    pub(crate) nonce: Nonce,
}

impl DialBack {
    pub(crate) async fn read_from(io: impl AsyncRead + Unpin) -> io::Result<Self> {
        let proto::DialBack { nonce } =
            FramedRead::new(io, Codec::<proto::DialBack>::new(DIAL_BACK_MAX_SIZE))
                .next()
                .await
                .ok_or(io::Error::from(ErrorKind::UnexpectedEof))??;
        let nonce = ok_or_invalid_data!(nonce)?;
        Ok(Self { nonce })
    }

    pub(crate) async fn write_into(self, io: impl AsyncWrite + Unpin) -> io::Result<()> {
        let msg = proto::DialBack {
            nonce: Some(self.nonce),
        };
        FramedWrite::new(io, Codec::<proto::DialBack>::new(DIAL_BACK_MAX_SIZE))
            .send(msg)
            .await
            .map_err(io::Error::from)
    }
}
