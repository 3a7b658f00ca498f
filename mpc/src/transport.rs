mod config;
mod networking;

pub use config::*;
pub use networking::*;

use std::{io, time::Duration};

use futures::{
    stream::{SplitSink, SplitStream},
    FutureExt, Sink, SinkExt, Stream, StreamExt, TryFutureExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;

/// Error type for channels. Carries ID of the peer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("error while sending message to {0}")]
    Send(usize),
    #[error("error while receiving message from {0}")]
    Recv(usize),
    #[error("timed out waiting for message from {0}")]
    Timeout(usize),
}

/// Wrapper for peer-to-peer connections in multi-party protocol.
pub struct MultipartyTransport<T, Channel> {
    channels: Vec<Option<(SplitSink<Channel, T>, SplitStream<Channel>)>>,
    party_id: usize,
    timeout: Option<Duration>,
}

impl<T, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Create wrapper for given list of connections. All channels but party_id must be present.
    pub fn new(
        channels: impl IntoIterator<Item = Option<Channel>>,
        party_id: usize,
    ) -> Result<Self, io::Error> {
        let channels: Vec<_> = channels.into_iter().collect();
        if party_id >= channels.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("party {} is not among {} channels", party_id, channels.len()),
            ));
        }
        let missing = (0..channels.len()).find(|&j| j != party_id && channels[j].is_none());
        if let Some(j) = missing {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("channel missing for party {}", j),
            ));
        }
        Ok(Self::from_complete(channels, party_id))
    }

    fn from_complete(channels: Vec<Option<Channel>>, party_id: usize) -> Self {
        // Split into unidirectional halves so that sends and receives can wait concurrently.
        let channels = channels.into_iter().map(|x| x.map(|x| x.split())).collect();
        Self {
            channels,
            party_id,
            timeout: None,
        }
    }
}

impl<T, Channel> MultipartyTransport<T, Channel> {
    /// Number of parties participating in multi-party protocol.
    pub fn num_parties(&self) -> usize {
        self.channels.len()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    /// Fail receives that take longer than `timeout`. A timed out session cannot be resumed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<T, E, Channel> MultipartyTransport<T, Channel>
where
    T: Clone,
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send message to party with given ID.
    pub async fn send_to(&mut self, other_id: usize, msg: T) -> Result<(), TransportError> {
        let (sink, _) = self.peer(other_id)?;
        sink.send(msg)
            .await
            .map_err(|_| TransportError::Send(other_id))
    }

    /// Receive message from party with given ID.
    pub async fn receive_from(&mut self, other_id: usize) -> Result<T, TransportError> {
        let timeout = self.timeout;
        let (_, stream) = self.peer(other_id)?;
        receive_with_timeout(stream, other_id, timeout).await
    }

    /// Send message to all parties.
    pub async fn send_to_all(&mut self, msg: T) -> Result<(), TransportError> {
        let party_id = self.party_id;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .enumerate()
                .filter(|(id, _)| *id != party_id)
                .filter_map(|(id, channel)| channel.as_mut().map(|c| (id, c)))
                .map(|(id, (sink, _))| {
                    sink.send(msg.clone())
                        .then(move |x| async move { x.map_err(|_| TransportError::Send(id)) })
                }),
        )
        .await
        .map(|_| ())
    }

    /// Receive messages from all parties.
    pub async fn receive_from_all(&mut self) -> Result<Vec<(usize, T)>, TransportError> {
        let party_id = self.party_id;
        let timeout = self.timeout;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .enumerate()
                .filter(|(id, _)| *id != party_id)
                .filter_map(|(id, channel)| channel.as_mut().map(|c| (id, c)))
                .map(|(id, (_, stream))| {
                    receive_with_timeout(stream, id, timeout).map_ok(move |msg| (id, msg))
                }),
        )
        .await
    }

    /// Concurrently send and receive messages from all parties.
    pub async fn exchange_with_all(&mut self, msg: T) -> Result<Vec<(usize, T)>, TransportError> {
        let party_id = self.party_id;
        let timeout = self.timeout;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .enumerate()
                .filter(|(id, _)| *id != party_id)
                .filter_map(|(id, channel)| channel.as_mut().map(|c| (id, c)))
                .map(|(id, (sink, stream))| {
                    let send_future = sink
                        .send(msg.clone())
                        .then(move |x| async move { x.map_err(|_| TransportError::Send(id)) });
                    let recv_future = receive_with_timeout(stream, id, timeout);
                    futures::future::try_join(send_future, recv_future)
                        .map_ok(move |(_, received_msg)| (id, received_msg))
                }),
        )
        .await
    }

    /// Both halves of the channel to given peer.
    fn peer(
        &mut self,
        other_id: usize,
    ) -> Result<&mut (SplitSink<Channel, T>, SplitStream<Channel>), TransportError> {
        if other_id == self.party_id {
            return Err(TransportError::Send(other_id));
        }
        self.channels
            .get_mut(other_id)
            .and_then(Option::as_mut)
            .ok_or(TransportError::Send(other_id))
    }
}

/// Wait for next message on stream, optionally bounded by timeout.
async fn receive_with_timeout<T, E, S>(
    stream: &mut S,
    other_id: usize,
    timeout: Option<Duration>,
) -> Result<T, TransportError>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    let raw = match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| TransportError::Timeout(other_id))?,
        None => stream.next().await,
    };
    match raw {
        Some(Ok(msg)) => Ok(msg),
        _ => Err(TransportError::Recv(other_id)),
    }
}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<T, C> =
    tokio_serde::Framed<tokio_util::codec::Framed<C, LengthDelimitedCodec>, T, T, Bincode<T, T>>;

/// Length-framed Bincode-encoded tokio's Duplex stream.
pub type BincodeDuplex<T> = BincodeStreamSink<T, DuplexStream>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_bincode<T, C>(channel: C) -> BincodeStreamSink<T, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create bidirectional Bincode-encoded channel.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (wrap_bincode(a), wrap_bincode(b))
}

/// Create in-process channels for testing multiparty protocols.
pub fn mock_multiparty_channels<T>(
    num_parties: usize,
    max_buf_size: usize,
) -> Vec<MultipartyTransport<T, BincodeDuplex<T>>>
where
    T: Clone + Serialize + DeserializeOwned + Unpin,
{
    let mut matrix: Vec<Vec<_>> = (0..num_parties)
        .map(|_| (0..num_parties).map(|_| None).collect())
        .collect();

    for i in 0..num_parties {
        for j in 0..i {
            let (a, b) = bincode_duplex::<T>(max_buf_size);
            matrix[i][j] = Some(a);
            matrix[j][i] = Some(b);
        }
    }

    matrix
        .into_iter()
        .enumerate()
        .map(|(id, row)| MultipartyTransport::from_complete(row, id))
        .collect()
}
