//! Jointly random seeds. Every party commits to a local seed before any seed is revealed,
//! so no party can bias the result as long as one party is honest.

use futures::{Sink, Stream};
use rand::{thread_rng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::trace;

use crate::{
    commitment::{commit_and_open, CommitmentMessage},
    error::{MaliciousError, MpcError},
    transport::MultipartyTransport,
};

/// Length of the joint seed in bytes.
pub const SEED_LEN: usize = 32;

/// Agree on a uniformly random seed with all parties.
pub async fn coin_toss<M, E, Channel>(
    transport: &mut MultipartyTransport<M, Channel>,
) -> Result<[u8; SEED_LEN], MpcError>
where
    M: Clone + From<CommitmentMessage> + TryInto<CommitmentMessage>,
    Channel: Stream<Item = Result<M, E>> + Sink<M> + Unpin,
{
    let local: [u8; SEED_LEN] = thread_rng().gen();
    let seeds = commit_and_open(transport, local.to_vec()).await?;

    let mut joint = [0u8; SEED_LEN];
    for (party, seed) in seeds.iter().enumerate() {
        if seed.len() != SEED_LEN {
            return Err(MaliciousError::MalformedMessage(party).into());
        }
        for (acc, byte) in joint.iter_mut().zip(seed) {
            *acc ^= byte;
        }
    }
    trace!(parties = seeds.len(), "coin toss finished");
    Ok(joint)
}

/// Random generator seeded by [`coin_toss`]. Produces the same stream at every party.
pub async fn shared_rng<M, E, Channel>(
    transport: &mut MultipartyTransport<M, Channel>,
) -> Result<ChaCha20Rng, MpcError>
where
    M: Clone + From<CommitmentMessage> + TryInto<CommitmentMessage>,
    Channel: Stream<Item = Result<M, E>> + Sink<M> + Unpin,
{
    Ok(ChaCha20Rng::from_seed(coin_toss(transport).await?))
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;
    use crate::transport::mock_multiparty_channels;

    async fn toss_all(num_parties: usize) -> Vec<[u8; SEED_LEN]> {
        let transports = mock_multiparty_channels::<CommitmentMessage>(num_parties, 1 << 16);
        futures::future::join_all(
            transports
                .into_iter()
                .map(|mut t| async move { coin_toss(&mut t).await.unwrap() }),
        )
        .await
    }

    #[tokio::test]
    async fn test_parties_agree() {
        for num_parties in [2, 3, 5] {
            let seeds = toss_all(num_parties).await;
            assert!(seeds.iter().all(|s| *s == seeds[0]));
        }
    }

    #[tokio::test]
    async fn test_shared_rng_streams_match() {
        let transports = mock_multiparty_channels::<CommitmentMessage>(3, 1 << 16);
        let outputs = futures::future::join_all(transports.into_iter().map(|mut t| async move {
            let mut rng = shared_rng(&mut t).await.unwrap();
            (0..4).map(|_| rng.next_u64()).collect::<Vec<_>>()
        }))
        .await;
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[1], outputs[2]);
    }

    #[tokio::test]
    async fn test_seed_bytes_uniform() {
        // Chi-square over the high nibble of every seed byte, 15 degrees of freedom.
        const TOSSES: usize = 64;
        let mut counts = [0usize; 16];
        for _ in 0..TOSSES {
            for byte in toss_all(2).await[0] {
                counts[(byte >> 4) as usize] += 1;
            }
        }
        let expected = (TOSSES * SEED_LEN) as f64 / 16.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        // Critical value for p = 0.0001.
        assert!(chi_square < 44.3, "chi-square {}", chi_square);
    }
}
