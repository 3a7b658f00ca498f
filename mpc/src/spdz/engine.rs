use async_trait::async_trait;
use digest::Digest;
use futures::{Sink, Stream};
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use tracing::{debug, info, warn};

use crate::{
    commitment::CommitmentMessage,
    dres::DRes,
    error::{MaliciousError, MpcError},
    executor::{BatchReport, ProtocolSuite},
    native::NativeProtocol,
    transport::MultipartyTransport,
    MpcContext, MpcField,
};

use super::{mac_check::check_macs, OpenedValueStore, SpdzDealer, SpdzShare};

/// SPDZ protocol message
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum SpdzMessage<T> {
    /// Everything a party sends in one round: masked own inputs and shares of values being opened.
    Round {
        input_deltas: Vec<T>,
        open_shares: Vec<T>,
    },
    /// Digest of all broadcast input deltas since the last check.
    BroadcastDigest([u8; 32]),
    Commitment(CommitmentMessage),
}

impl<T> From<CommitmentMessage> for SpdzMessage<T> {
    fn from(msg: CommitmentMessage) -> Self {
        SpdzMessage::Commitment(msg)
    }
}

impl<T> TryFrom<SpdzMessage<T>> for CommitmentMessage {
    type Error = SpdzMessage<T>;

    fn try_from(msg: SpdzMessage<T>) -> Result<Self, Self::Error> {
        match msg {
            SpdzMessage::Commitment(msg) => Ok(msg),
            other => Err(other),
        }
    }
}

/// Number of opened values after which a MAC check runs during evaluation.
pub const DEFAULT_MAC_CHECK_THRESHOLD: usize = 100_000;

/// Protocol waiting for the values exchanged in the current round.
enum PendingProtocol<T: MpcField> {
    Input {
        owner: usize,
        mask: SpdzShare<T>,
        out: DRes<SpdzShare<T>>,
    },
    /// Beaver multiplication. `opened` indexes the pair `(x - a, y - b)`.
    Mul {
        a: SpdzShare<T>,
        b: SpdzShare<T>,
        c: SpdzShare<T>,
        opened: usize,
        out: DRes<SpdzShare<T>>,
    },
    Open {
        opened: usize,
        out: DRes<T>,
    },
    /// `opened` indexes `x - r` for a mask `r` known to the receiving party.
    OpenTo {
        opened: usize,
        mask_plain: Option<T>,
        out: DRes<Option<T>>,
    },
}

/// Hash of everything that was broadcast. Parties compare it to detect inconsistent broadcasts.
struct BroadcastTranscript {
    hasher: Sha3_256,
    dirty: bool,
}

impl BroadcastTranscript {
    fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
            dirty: false,
        }
    }

    fn absorb<T: MpcField>(&mut self, sender: usize, value: T) {
        self.hasher.update((sender as u64).to_be_bytes());
        self.hasher.update(value.to_be_bytes());
        self.dirty = true;
    }

    fn take_digest(&mut self) -> Option<[u8; 32]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&self.hasher.finalize_reset());
        Some(digest)
    }
}

/// SPDZ protocol implementation.
///
/// Openings are not verified when they happen. Opened values are collected together with the
/// MAC shares and checked in batches by [`ProtocolSuite::finalize`]. Once a check fails, a
/// peer is lost or preprocessed material runs out, the suite refuses any further work.
pub struct SpdzSuite<T: MpcField, Dealer, Channel> {
    dealer: Dealer,
    transport: MultipartyTransport<SpdzMessage<T>, Channel>,
    store: OpenedValueStore<T>,
    transcript: BroadcastTranscript,
    mac_check_threshold: usize,
    failure: Option<MpcError>,
    checked_values: usize,
}

impl<T, Dealer, Channel> SpdzSuite<T, Dealer, Channel>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    pub fn new(
        dealer: Dealer,
        transport: MultipartyTransport<SpdzMessage<T>, Channel>,
    ) -> Result<Self, MpcError> {
        if dealer.party_id() != transport.party_id()
            || dealer.num_parties() != transport.num_parties()
        {
            return Err(MpcError::contract(format!(
                "dealer is for party {} of {}, transport for party {} of {}",
                dealer.party_id(),
                dealer.num_parties(),
                transport.party_id(),
                transport.num_parties()
            )));
        }
        Ok(Self {
            dealer,
            transport,
            store: OpenedValueStore::new(),
            transcript: BroadcastTranscript::new(),
            mac_check_threshold: DEFAULT_MAC_CHECK_THRESHOLD,
            failure: None,
            checked_values: 0,
        })
    }

    /// Run a MAC check during evaluation once this many values wait for verification.
    pub fn with_mac_check_threshold(mut self, threshold: usize) -> Self {
        self.mac_check_threshold = threshold.max(1);
        self
    }

    /// Number of opened values that passed a MAC check.
    pub fn checked_values(&self) -> usize {
        self.checked_values
    }

    /// Number of opened values waiting for a MAC check.
    pub fn pending_values(&self) -> usize {
        self.store.len()
    }

    fn ensure_active(&self) -> Result<(), MpcError> {
        match self.failure.as_ref().and_then(MpcError::session_failure) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Parties may be out of step after anything but a contract violation, so the session ends.
    fn note_failure(&mut self, err: MpcError) -> MpcError {
        if let Some(failure) = err.session_failure() {
            warn!(party_id = self.transport.party_id(), %err, "aborting session");
            self.failure = Some(failure);
        }
        err
    }
}

impl<T, Dealer, Channel> MpcContext for SpdzSuite<T, Dealer, Channel>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.transport.num_parties()
    }

    fn party_id(&self) -> usize {
        self.transport.party_id()
    }
}

impl<T, E, Dealer, Channel> SpdzSuite<T, Dealer, Channel>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
    Channel: Stream<Item = Result<SpdzMessage<T>, E>> + Sink<SpdzMessage<T>> + Unpin,
{
    async fn execute(
        &mut self,
        batch: Vec<NativeProtocol<SpdzShare<T>>>,
    ) -> Result<BatchReport, MpcError> {
        let party_id = self.party_id();
        let num_parties = self.num_parties();

        let mut pending = Vec::new();
        let mut open_shares: Vec<SpdzShare<T>> = Vec::new();
        let mut own_deltas = Vec::new();
        let mut expected_deltas = vec![0; num_parties];

        for protocol in batch {
            match protocol {
                NativeProtocol::Local(local) => local.evaluate(|x| self.dealer.share_plain(x))?,
                NativeProtocol::Input { owner, value, out } => {
                    let mask = self.dealer.next_input_mask(owner)?;
                    expected_deltas[owner] += 1;
                    if owner == party_id {
                        let value = value
                            .ok_or_else(|| MpcError::contract("input owner must provide value"))?;
                        let plain = mask
                            .plain
                            .ok_or_else(|| MpcError::contract("own input mask without plaintext"))?;
                        own_deltas.push(value - plain);
                    }
                    pending.push(PendingProtocol::Input {
                        owner,
                        mask: mask.share,
                        out,
                    });
                }
                NativeProtocol::Mul { lhs, rhs, out } => {
                    let (a, b, c) = self.dealer.next_beaver_triple()?;
                    let opened = open_shares.len();
                    open_shares.push(lhs.out()? - a);
                    open_shares.push(rhs.out()? - b);
                    pending.push(PendingProtocol::Mul {
                        a,
                        b,
                        c,
                        opened,
                        out,
                    });
                }
                NativeProtocol::Open { x, out } => {
                    pending.push(PendingProtocol::Open {
                        opened: open_shares.len(),
                        out,
                    });
                    open_shares.push(x.out()?);
                }
                NativeProtocol::OpenTo { x, party, out } => {
                    let mask = self.dealer.next_input_mask(party)?;
                    pending.push(PendingProtocol::OpenTo {
                        opened: open_shares.len(),
                        mask_plain: mask.plain,
                        out,
                    });
                    open_shares.push(x.out()? - mask.share);
                }
                NativeProtocol::RandomBit { out } => out.set(self.dealer.next_bit()?)?,
                NativeProtocol::RandomElement { out } => out.set(self.dealer.next_random()?)?,
                NativeProtocol::ExpPipe { len, out } => out.set(self.dealer.next_exp_pipe(len)?)?,
            }
        }

        if pending.is_empty() {
            return Ok(BatchReport { rounds: 0 });
        }

        let mut opened: Vec<T> = open_shares.iter().map(SpdzShare::value).collect();
        let mut deltas = vec![Vec::new(); num_parties];
        let received = self
            .transport
            .exchange_with_all(SpdzMessage::Round {
                input_deltas: own_deltas.clone(),
                open_shares: opened.clone(),
            })
            .await?;
        deltas[party_id] = own_deltas;

        for (id, msg) in received {
            match msg {
                SpdzMessage::Round {
                    input_deltas,
                    open_shares: shares,
                } if input_deltas.len() == expected_deltas[id] && shares.len() == opened.len() => {
                    for (acc, share) in opened.iter_mut().zip(shares) {
                        *acc += share;
                    }
                    deltas[id] = input_deltas;
                }
                _ => return Err(MaliciousError::MalformedMessage(id).into()),
            }
        }

        let mut delta_cursors = vec![0; num_parties];
        for protocol in pending {
            match protocol {
                PendingProtocol::Input { owner, mask, out } => {
                    let delta = deltas[owner][delta_cursors[owner]];
                    delta_cursors[owner] += 1;
                    self.transcript.absorb(owner, delta);
                    out.set(mask + self.dealer.share_plain(delta))?;
                }
                PendingProtocol::Mul {
                    a,
                    b,
                    c,
                    opened: i,
                    out,
                } => {
                    let (e, d) = (opened[i], opened[i + 1]);
                    out.set(c + b * e + a * d + self.dealer.share_plain(e * d))?;
                }
                PendingProtocol::Open { opened: i, out } => out.set(opened[i])?,
                PendingProtocol::OpenTo {
                    opened: i,
                    mask_plain,
                    out,
                } => out.set(mask_plain.map(|r| opened[i] + r))?,
            }
        }

        for (share, value) in open_shares.iter().zip(&opened) {
            self.store.push(*value, share.mac());
        }

        Ok(BatchReport { rounds: 1 })
    }

    /// With more than two parties, a party could send different input deltas to different peers.
    async fn check_broadcasts(&mut self) -> Result<(), MpcError> {
        let digest = match self.transcript.take_digest() {
            Some(digest) if self.num_parties() > 2 => digest,
            _ => return Ok(()),
        };
        let received = self
            .transport
            .exchange_with_all(SpdzMessage::BroadcastDigest(digest))
            .await?;
        for (id, msg) in received {
            match msg {
                SpdzMessage::BroadcastDigest(other) if other == digest => {}
                SpdzMessage::BroadcastDigest(_) => {
                    return Err(MaliciousError::InconsistentBroadcast.into())
                }
                _ => return Err(MaliciousError::MalformedMessage(id).into()),
            }
        }
        Ok(())
    }

    async fn check_opened_values(&mut self) -> Result<(), MpcError> {
        self.check_broadcasts().await?;

        let (values, mac_shares) = self.store.take_pending();
        if values.is_empty() {
            return Ok(());
        }
        debug!(count = values.len(), "checking MACs of opened values");
        let key_share = self.dealer.authentication_key_share();
        check_macs(&mut self.transport, key_share, &values, &mac_shares).await?;
        self.checked_values += values.len();
        Ok(())
    }
}

#[async_trait(?Send)]
impl<T, E, Dealer, Channel> ProtocolSuite for SpdzSuite<T, Dealer, Channel>
where
    T: MpcField,
    Dealer: SpdzDealer<Field = T, Share = SpdzShare<T>>,
    Channel: Stream<Item = Result<SpdzMessage<T>, E>> + Sink<SpdzMessage<T>> + Unpin,
{
    async fn execute_native_batch(
        &mut self,
        batch: Vec<NativeProtocol<SpdzShare<T>>>,
    ) -> Result<BatchReport, MpcError> {
        self.ensure_active()?;
        match self.execute(batch).await {
            Ok(report) => Ok(report),
            Err(err) => Err(self.note_failure(err)),
        }
    }

    async fn finalize(&mut self) -> Result<(), MpcError> {
        self.ensure_active()?;
        match self.check_opened_values().await {
            Ok(()) => {
                info!(checked = self.checked_values, "opened values verified");
                Ok(())
            }
            Err(err) => Err(self.note_failure(err)),
        }
    }

    fn needs_finalize(&self) -> bool {
        self.store.len() >= self.mac_check_threshold
    }
}
