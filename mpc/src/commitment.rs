//! Hash-based commitments and the commit-then-open exchange.

use std::fmt;

use digest::Digest;
use futures::{Sink, Stream};
use rand::{thread_rng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;

use crate::{
    error::{MaliciousError, MpcError},
    transport::MultipartyTransport,
};

/// Length of commitment digest and of the blinding randomness.
pub const COMMITMENT_LEN: usize = 32;

/// Binding and hiding commitment to a byte string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment([u8; COMMITMENT_LEN]);

/// Data needed to check a commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub value: Vec<u8>,
    pub randomness: [u8; COMMITMENT_LEN],
}

/// Message of the commit-then-open exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommitmentMessage {
    Commit(Commitment),
    Open(Opening),
}

impl Commitment {
    /// Does the opening match this commitment made by `party`?
    pub fn verify(&self, party: usize, opening: &Opening) -> bool {
        self.0 == digest(party, &opening.value, &opening.randomness)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment(")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Commit to `value` on behalf of `party`.
///
/// The committer's ID is bound into the digest, so a commitment cannot be replayed by another
/// party.
pub fn commit(party: usize, value: &[u8]) -> (Commitment, Opening) {
    commit_with_rng(party, value, &mut thread_rng())
}

/// Commit to `value` using randomness from `rng`.
pub fn commit_with_rng(
    party: usize,
    value: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> (Commitment, Opening) {
    let mut randomness = [0u8; COMMITMENT_LEN];
    rng.fill_bytes(&mut randomness);
    let commitment = Commitment(digest(party, value, &randomness));
    let opening = Opening {
        value: value.to_vec(),
        randomness,
    };
    (commitment, opening)
}

fn digest(party: usize, value: &[u8], randomness: &[u8; COMMITMENT_LEN]) -> [u8; COMMITMENT_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(randomness);
    hasher.update((party as u64).to_be_bytes());
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value);
    let mut out = [0u8; COMMITMENT_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Commit to `value`, exchange commitments with all parties, then exchange and verify openings.
///
/// No value is revealed before every party's commitment is received. Returns values of all
/// parties indexed by party ID.
pub async fn commit_and_open<M, E, Channel>(
    transport: &mut MultipartyTransport<M, Channel>,
    value: Vec<u8>,
) -> Result<Vec<Vec<u8>>, MpcError>
where
    M: Clone + From<CommitmentMessage> + TryInto<CommitmentMessage>,
    Channel: Stream<Item = Result<M, E>> + Sink<M> + Unpin,
{
    if value.is_empty() {
        return Err(MpcError::contract("cannot commit to an empty value"));
    }
    let party_id = transport.party_id();
    let num_parties = transport.num_parties();
    let (commitment, opening) = commit(party_id, &value);

    let mut commitments = vec![None; num_parties];
    let received = transport
        .exchange_with_all(CommitmentMessage::Commit(commitment).into())
        .await?;
    for (id, msg) in received {
        let msg: Result<CommitmentMessage, _> = msg.try_into();
        match msg {
            Ok(CommitmentMessage::Commit(c)) => commitments[id] = Some(c),
            _ => return Err(MaliciousError::MalformedMessage(id).into()),
        }
    }

    let mut values = vec![Vec::new(); num_parties];
    values[party_id] = value;
    let received = transport
        .exchange_with_all(CommitmentMessage::Open(opening).into())
        .await?;
    for (id, msg) in received {
        let msg: Result<CommitmentMessage, _> = msg.try_into();
        let (Ok(CommitmentMessage::Open(opening)), Some(commitment)) = (msg, commitments[id]) else {
            return Err(MaliciousError::MalformedMessage(id).into());
        };
        if !commitment.verify(id, &opening) {
            return Err(MaliciousError::CommitmentMismatch(id).into());
        }
        values[id] = opening.value;
    }

    Ok(values)
}
