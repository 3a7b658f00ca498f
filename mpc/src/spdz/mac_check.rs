use futures::{Sink, Stream};
use tracing::debug;

use crate::{
    cointoss::shared_rng,
    commitment::{commit_and_open, CommitmentMessage},
    error::{MaliciousError, MpcError},
    transport::MultipartyTransport,
    MpcField,
};

/// Batched check of MACs on opened values.
///
/// Parties agree on a random challenge `r`, combine the values as `a = sum r^j v_j` and their MAC
/// shares as `g = sum r^j m_j`, then commit to and open `s = g - alpha_i * a`. The shares `s` of
/// honest parties sum to zero.
pub(super) async fn check_macs<T, M, E, Channel>(
    transport: &mut MultipartyTransport<M, Channel>,
    key_share: T,
    values: &[T],
    mac_shares: &[T],
) -> Result<(), MpcError>
where
    T: MpcField,
    M: Clone + From<CommitmentMessage> + TryInto<CommitmentMessage>,
    Channel: Stream<Item = Result<M, E>> + Sink<M> + Unpin,
{
    if values.len() != mac_shares.len() {
        return Err(MpcError::contract("every opened value needs a MAC share"));
    }

    let mut rng = shared_rng(transport).await?;
    let challenge = T::random(&mut rng);

    let (combined_value, combined_mac) = combine(challenge, values, mac_shares);
    let sigma = combined_mac - key_share * combined_value;

    let sigmas = commit_and_open(transport, sigma.to_be_bytes()).await?;
    let mut total = T::zero();
    for (party, bytes) in sigmas.iter().enumerate() {
        total += T::from_be_bytes(bytes).map_err(|_| MaliciousError::MalformedMessage(party))?;
    }

    if total == T::zero() {
        debug!(count = values.len(), "MAC check passed");
        Ok(())
    } else {
        Err(MaliciousError::MacCheckFailed.into())
    }
}

/// Random linear combination of values and of MAC shares with coefficients `r, r^2, ...`.
fn combine<T: MpcField>(challenge: T, values: &[T], mac_shares: &[T]) -> (T, T) {
    let mut power = T::one();
    let mut combined_value = T::zero();
    let mut combined_mac = T::zero();
    for (value, mac) in values.iter().zip(mac_shares) {
        power *= challenge;
        combined_value += power * value;
        combined_mac += power * mac;
    }
    (combined_value, combined_mac)
}

#[cfg(test)]
mod tests {
    use ff::Field;

    use super::*;
    use crate::{fields::Fp97, transport::mock_multiparty_channels};

    #[test]
    fn test_combine() {
        let values = [Fp97::from(1), Fp97::from(2)];
        let macs = [Fp97::from(3), Fp97::from(4)];
        let (value, mac) = combine(Fp97::from(10), &values, &macs);
        assert_eq!(value, Fp97::from(10 + 2 * 100));
        assert_eq!(mac, Fp97::from(30 + 4 * 100));
    }

    async fn run_check(mac_error: Fp97) -> Vec<Result<(), MpcError>> {
        // alpha = 5 + 6, opened values 7 and 8
        let keys = [Fp97::from(5), Fp97::from(6)];
        let values = [Fp97::from(7), Fp97::from(8)];
        let macs = [
            [Fp97::from(40), Fp97::from(1)],
            [
                Fp97::from(77) - Fp97::from(40) + mac_error,
                Fp97::from(88) - Fp97::from(1),
            ],
        ];

        let transports = mock_multiparty_channels::<CommitmentMessage>(2, 1 << 16);
        futures::future::join_all(transports.into_iter().map(|mut t| async move {
            let id = t.party_id();
            check_macs(&mut t, keys[id], &values, &macs[id]).await
        }))
        .await
    }

    #[tokio::test]
    async fn test_valid_macs_pass() {
        for result in run_check(Fp97::zero()).await {
            result.unwrap();
        }
    }

    #[tokio::test]
    async fn test_corrupted_mac_detected() {
        // Detection fails only if the challenge is zero, which happens with probability 1/97.
        // Retry once to keep the test deterministic in practice.
        let mut detected = false;
        for _ in 0..2 {
            let results = run_check(Fp97::from(1)).await;
            if results.iter().all(|r| {
                matches!(
                    r,
                    Err(MpcError::MaliciousBehavior(MaliciousError::MacCheckFailed))
                )
            }) {
                detected = true;
                break;
            }
        }
        assert!(detected);
    }
}
