use std::{io, net::SocketAddr, time::Duration};

use futures::{future, stream::FuturesUnordered, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, warn};

use super::{wrap_bincode, BincodeStreamSink, MultipartyTransport, NetworkConfig};

/// Delay in milliseconds after which connection to peer is retried.
const CONNECTION_RETRY_DELAY: u64 = 1000;

/// Handshake magic exchanged on every new connection.
const HANDSHAKE_MAGIC: u32 = 0x5350_445A;

/// Bincode-encoded network channel.
pub type NetChannel<T> = BincodeStreamSink<T, TcpStream>;

/// Establish network connections for multiparty protocol.
/// Parties with lower IDs are accepted, parties with higher IDs are dialed.
pub async fn connect_multiparty<T>(
    config: &NetworkConfig,
    party_id: usize,
) -> Result<MultipartyTransport<T, NetChannel<T>>, io::Error>
where
    T: Serialize + DeserializeOwned,
{
    let parties = &config.parties;
    let this_party = parties.get(party_id).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Party ID out of range")
    })?;
    let listen_for = listen_for_parties(this_party.address, party_id);

    let connect_to = future::try_join_all(
        parties[party_id + 1..]
            .iter()
            .map(|other| connect_to_party(other.address, party_id)),
    );

    let (listen_for, connect_to) = futures::try_join!(listen_for, connect_to)?;
    debug!(party_id, num_parties = parties.len(), "all peers connected");

    let channels = listen_for
        .into_iter()
        .map(Some)
        .chain(std::iter::once(None))
        .chain(connect_to.into_iter().map(Some))
        .map(|x| x.map(wrap_bincode));

    MultipartyTransport::new(channels, party_id)
}

/// Listen for incoming connections from `num_lower` parties with lower IDs.
async fn listen_for_parties(
    addr: SocketAddr,
    num_lower: usize,
) -> Result<Vec<TcpStream>, io::Error> {
    if num_lower == 0 {
        return Ok(Vec::new());
    }

    let listener = TcpListener::bind(addr).await?;
    let mut futures = FuturesUnordered::new();
    let mut connected_parties: Vec<Option<TcpStream>> = (0..num_lower).map(|_| None).collect();

    loop {
        tokio::select! {
            tmp = listener.accept() => {
                let (socket, peer) = tmp?;
                debug!(%peer, "incoming connection");
                futures.push(accept_party(num_lower, socket));
            },
            tmp = futures.next(), if !futures.is_empty() => {
                match tmp {
                    Some(Ok((socket, id))) if connected_parties[id].is_none() => {
                        connected_parties[id] = Some(socket);
                        if connected_parties.iter().all(Option::is_some) {
                            break;
                        }
                    }
                    Some(Err(err)) => warn!(%err, "rejected incoming connection"),
                    _ => {}
                }
            },
        }
    }

    Ok(connected_parties.into_iter().flatten().collect())
}

/// Process incoming connection from party.
async fn accept_party(
    num_lower: usize,
    mut socket: TcpStream,
) -> Result<(TcpStream, usize), io::Error> {
    if socket.read_u32().await? != HANDSHAKE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }

    let party_id = socket.read_u32().await? as usize;
    if party_id >= num_lower {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid party ID"));
    }

    socket.write_u32(HANDSHAKE_MAGIC).await?;
    socket.flush().await?;

    Ok((socket, party_id))
}

/// Connect to party with higher ID.
async fn connect_to_party(addr: SocketAddr, this_party_id: usize) -> Result<TcpStream, io::Error> {
    let mut socket = loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => break socket,
            _ => tokio::time::sleep(Duration::from_millis(CONNECTION_RETRY_DELAY)).await,
        }
    };

    socket.write_u32(HANDSHAKE_MAGIC).await?;
    socket.write_u32(this_party_id as u32).await?;
    socket.flush().await?;

    if socket.read_u32().await? != HANDSHAKE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }

    Ok(socket)
}
