use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{error::MpcError, fields::MpcField, plaintext::exp_pipe_values};
use crate::{MpcContext, MpcDealer};

use super::{InputMask, SpdzDealer, SpdzShare};

/// Insecure dealer for SPDZ protocol that can be used for tests.
///
/// Parties created with the same seed derive consistent sharings locally, so no dealer process
/// is needed. Never runs out of material.
pub struct FakeSpdzDealer<T> {
    auth_key: FakeAuthKey<T>,
    beaver_triple_gen: FakeShareGenerator<T>,
    bits_gen: FakeShareGenerator<T>,
    exp_pipe_gen: FakeShareGenerator<T>,
    input_masks_gen: Vec<FakeShareGenerator<T>>,
}

impl<T: MpcField> FakeSpdzDealer<T> {
    /// Create new instance.
    pub fn new(num_parties: usize, party_id: usize, seed: u8) -> Self {
        let mut rng = SmallRng::from_seed([seed; 32]);
        let auth_key = FakeAuthKey::random(&mut rng, party_id, num_parties);
        Self {
            auth_key,
            beaver_triple_gen: FakeShareGenerator::new(auth_key, rng.gen()),
            bits_gen: FakeShareGenerator::new(auth_key, rng.gen()),
            exp_pipe_gen: FakeShareGenerator::new(auth_key, rng.gen()),
            input_masks_gen: (0..num_parties)
                .map(|_| FakeShareGenerator::new(auth_key, rng.gen()))
                .collect(),
        }
    }
}

impl<T: MpcField> MpcContext for FakeSpdzDealer<T> {
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.auth_key.num_parties
    }

    fn party_id(&self) -> usize {
        self.auth_key.party_id
    }
}

impl<T: MpcField> MpcDealer for FakeSpdzDealer<T> {
    fn share_plain(&self, x: Self::Field) -> Self::Share {
        SpdzShare::from_plain(x, self.auth_key.share_value, self.auth_key.party_id)
    }

    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError> {
        Ok(self.beaver_triple_gen.beaver_triple())
    }

    fn next_bit(&mut self) -> Result<Self::Share, MpcError> {
        Ok(self.bits_gen.random_bit())
    }

    fn next_random(&mut self) -> Result<Self::Share, MpcError> {
        Ok(self.beaver_triple_gen.random_authenticated_share().0)
    }

    fn next_exp_pipe(&mut self, len: usize) -> Result<Vec<Self::Share>, MpcError> {
        Ok(self.exp_pipe_gen.exp_pipe(len))
    }
}

impl<T: MpcField> SpdzDealer for FakeSpdzDealer<T> {
    fn authentication_key_share(&self) -> Self::Field {
        self.auth_key.share_value
    }

    fn next_input_mask(
        &mut self,
        toward: usize,
    ) -> Result<InputMask<Self::Share, Self::Field>, MpcError> {
        let party_id = self.auth_key.party_id;
        let generator = self
            .input_masks_gen
            .get_mut(toward)
            .ok_or_else(|| MpcError::contract(format!("no party {}", toward)))?;
        let (share, plain) = generator.random_authenticated_share();
        Ok(InputMask {
            share,
            plain: (toward == party_id).then_some(plain),
        })
    }
}

/// Authentication key in plain and its share.
#[derive(Copy, Clone)]
struct FakeAuthKey<T> {
    num_parties: usize,
    party_id: usize,
    share_value: T,
    plain_value: T,
}

impl<T: MpcField> FakeAuthKey<T> {
    /// Generate fake authentication key and its share.
    fn random(rng: &mut impl Rng, party_id: usize, num_parties: usize) -> Self {
        let (share_value, plain_value) = gen_random_raw_share(rng, party_id, num_parties);
        Self {
            num_parties,
            party_id,
            share_value,
            plain_value,
        }
    }
}

/// Insecure generator of SPDZ-shared values.
/// Generators of all parties seeded alike produce sharings of the same values.
struct FakeShareGenerator<T> {
    auth_key: FakeAuthKey<T>,
    rng: SmallRng,
}

impl<T: MpcField> FakeShareGenerator<T> {
    /// Create new generator.
    fn new(auth_key: FakeAuthKey<T>, seed: [u8; 32]) -> Self {
        Self {
            rng: SmallRng::from_seed(seed),
            auth_key,
        }
    }

    /// Generate local unauthenticated share of specified value.
    fn raw_share(&mut self, value: T) -> T {
        gen_raw_share(
            &mut self.rng,
            self.auth_key.party_id,
            self.auth_key.num_parties,
            value,
        )
    }

    /// Generate local authenticated share of specified value.
    fn authenticated_share(&mut self, value: T) -> SpdzShare<T> {
        SpdzShare {
            value: self.raw_share(value),
            mac: self.raw_share(value * self.auth_key.plain_value),
        }
    }

    /// Generate random value and its local authenticated share.
    fn random_authenticated_share(&mut self) -> (SpdzShare<T>, T) {
        let value = T::random(&mut self.rng);
        (self.authenticated_share(value), value)
    }

    fn beaver_triple(&mut self) -> (SpdzShare<T>, SpdzShare<T>, SpdzShare<T>) {
        let (a_share, a_plain) = self.random_authenticated_share();
        let (b_share, b_plain) = self.random_authenticated_share();
        let c_share = self.authenticated_share(a_plain * b_plain);
        (a_share, b_share, c_share)
    }

    fn random_bit(&mut self) -> SpdzShare<T> {
        let value = if self.rng.gen() { T::one() } else { T::zero() };
        self.authenticated_share(value)
    }

    fn exp_pipe(&mut self, len: usize) -> Vec<SpdzShare<T>> {
        let (r, r_inv) = loop {
            let r = T::random(&mut self.rng);
            if let Some(r_inv) = Option::<T>::from(r.invert()) {
                break (r, r_inv);
            }
        };
        exp_pipe_values(r, r_inv, len)
            .into_iter()
            .map(|x| self.authenticated_share(x))
            .collect()
    }
}

/// Generate local unauthenticated share of specified value.
fn gen_raw_share<T: MpcField>(
    mut rng: &mut impl Rng,
    party_id: usize,
    num_parties: usize,
    value: T,
) -> T {
    let start = T::random(&mut rng);
    let step = T::random(&mut rng);
    let share = arithmetic_progression(start, step, party_id as u64);
    let sum = arithmetic_progression_sum(start, step, num_parties as u64);
    if party_id == 0 {
        share + value - sum
    } else {
        share
    }
}

/// Generate random value and its local unauthenticated share.
fn gen_random_raw_share<T: MpcField>(
    mut rng: &mut impl Rng,
    party_id: usize,
    num_parties: usize,
) -> (T, T) {
    let value = T::random(&mut rng);
    (gen_raw_share(rng, party_id, num_parties, value), value)
}

/// Compute n-th term of linear progression.
fn arithmetic_progression<T: MpcField>(start: T, step: T, n: u64) -> T {
    start + step * T::from(n)
}

/// Compute sum of terms 0..n-1 of linear progression.
fn arithmetic_progression_sum<T: MpcField>(start: T, step: T, n: u64) -> T {
    let sum = if n % 2 == 0 {
        T::from(n / 2) * T::from(n - 1)
    } else {
        T::from(n) * T::from((n - 1) / 2)
    };
    start * T::from(n) + step * sum
}

#[cfg(test)]
mod tests {
    use ff::Field;

    use super::*;
    use crate::fields::Mersenne61;

    fn dealers(num_parties: usize) -> Vec<FakeSpdzDealer<Mersenne61>> {
        (0..num_parties)
            .map(|id| FakeSpdzDealer::new(num_parties, id, 3))
            .collect()
    }

    /// Reconstruct value and check its MAC.
    fn open(
        dealers: &[FakeSpdzDealer<Mersenne61>],
        shares: &[SpdzShare<Mersenne61>],
    ) -> Mersenne61 {
        let alpha = dealers
            .iter()
            .fold(Mersenne61::zero(), |acc, d| acc + d.authentication_key_share());
        let value = shares.iter().fold(Mersenne61::zero(), |acc, s| acc + s.value());
        let mac = shares.iter().fold(Mersenne61::zero(), |acc, s| acc + s.mac());
        assert_eq!(mac, alpha * value);
        value
    }

    #[test]
    fn test_arithmetic_progression_sum() {
        let (start, step) = (Mersenne61::from(3), Mersenne61::from(4));
        for n in 1..6u64 {
            let expected = (0..n).fold(Mersenne61::zero(), |acc, i| {
                acc + arithmetic_progression(start, step, i)
            });
            assert_eq!(arithmetic_progression_sum(start, step, n), expected);
        }
    }

    #[test]
    fn test_beaver_triples() {
        for num_parties in [2, 3] {
            let mut dealers = dealers(num_parties);
            for _ in 0..10 {
                let triples: Vec<_> = dealers
                    .iter_mut()
                    .map(|d| d.next_beaver_triple().unwrap())
                    .collect();
                let a = open(&dealers, &triples.iter().map(|t| t.0).collect::<Vec<_>>());
                let b = open(&dealers, &triples.iter().map(|t| t.1).collect::<Vec<_>>());
                let c = open(&dealers, &triples.iter().map(|t| t.2).collect::<Vec<_>>());
                assert_eq!(a * b, c);
            }
        }
    }

    #[test]
    fn test_bits_and_exp_pipes() {
        let mut dealers = dealers(3);
        for _ in 0..10 {
            let bits: Vec<_> = dealers.iter_mut().map(|d| d.next_bit().unwrap()).collect();
            let bit = open(&dealers, &bits);
            assert!(bit == Mersenne61::zero() || bit == Mersenne61::one());
        }

        let pipes: Vec<_> = dealers
            .iter_mut()
            .map(|d| d.next_exp_pipe(3).unwrap())
            .collect();
        let pipe: Vec<_> = (0..4)
            .map(|i| open(&dealers, &pipes.iter().map(|p| p[i]).collect::<Vec<_>>()))
            .collect();
        assert_eq!(pipe[0] * pipe[1], Mersenne61::one());
        assert_eq!(pipe[1] * pipe[1], pipe[2]);
        assert_eq!(pipe[2] * pipe[1], pipe[3]);
    }

    #[test]
    fn test_input_masks() {
        let mut dealers = dealers(3);
        let masks: Vec<_> = dealers
            .iter_mut()
            .map(|d| d.next_input_mask(1).unwrap())
            .collect();
        assert!(masks[0].plain.is_none());
        assert!(masks[2].plain.is_none());
        let value = open(&dealers, &masks.iter().map(|m| m.share).collect::<Vec<_>>());
        assert_eq!(masks[1].plain, Some(value));

        assert!(dealers[0].next_input_mask(3).is_err());
    }
}
