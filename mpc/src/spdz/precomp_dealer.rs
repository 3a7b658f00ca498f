use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::MpcError, plaintext::exp_pipe_values, MpcContext, MpcDealer, MpcField};

use super::{InputMask, SpdzDealer, SpdzShare};

/// Precomputed data for SPDZ protocol.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PrecomputedSpdzData<T> {
    pub num_parties: usize,
    pub party_id: usize,
    pub auth_key: T,
    pub beaver_triples: Vec<(SpdzShare<T>, SpdzShare<T>, SpdzShare<T>)>,
    pub random_bits: Vec<SpdzShare<T>>,
    /// Masks for inputs of every party, indexed by the party that knows the plaintext.
    pub input_masks: Vec<Vec<SpdzShare<T>>>,
    /// Plaintexts of masks for inputs of this party.
    pub input_masks_plain: Vec<T>,
    /// Exponentiation pipes, each of length `exp_pipe_length + 1`.
    pub exp_pipes: Vec<Vec<SpdzShare<T>>>,
}

impl<T> PrecomputedSpdzData<T>
where
    T: Serialize + for<'a> Deserialize<'a>,
{
    /// Load precomputed data from file.
    pub fn load_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        bincode::deserialize_from(reader).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    /// Save precomputed data to file.
    pub fn save_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

/// Position of the next unused item of every kind.
#[derive(Clone, Debug, Default)]
struct Cursors {
    beaver_triples: usize,
    random_bits: usize,
    input_masks: Vec<usize>,
    exp_pipes: usize,
}

/// Dealer for SPDZ protocol that serves precomputed data.
/// Material is consumed in the order it was generated. Running out is an error.
pub struct PrecomputedSpdzDealer<T> {
    data: PrecomputedSpdzData<T>,
    cursors: Cursors,
}

impl<T> PrecomputedSpdzDealer<T>
where
    T: Serialize + for<'a> Deserialize<'a>,
{
    /// Create new dealer given precomputed data.
    pub fn new(data: PrecomputedSpdzData<T>) -> Self {
        let cursors = Cursors {
            input_masks: vec![0; data.input_masks.len()],
            ..Default::default()
        };
        Self { data, cursors }
    }

    /// Create new dealer from file with precomputed data.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(PrecomputedSpdzData::load_file(path)?))
    }

    /// Number of unused triples.
    pub fn remaining_beaver_triples(&self) -> usize {
        self.data.beaver_triples.len() - self.cursors.beaver_triples
    }
}

/// Take the item under `cursor` and advance it.
fn take_next<'a, I>(items: &'a [I], cursor: &mut usize, kind: &str) -> Result<&'a I, MpcError> {
    let item = items
        .get(*cursor)
        .ok_or_else(|| MpcError::ResourceExhaustion(format!("no {} left", kind)))?;
    *cursor += 1;
    Ok(item)
}

impl<T: MpcField> MpcContext for PrecomputedSpdzDealer<T> {
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.data.num_parties
    }

    fn party_id(&self) -> usize {
        self.data.party_id
    }
}

impl<T: MpcField> MpcDealer for PrecomputedSpdzDealer<T> {
    fn share_plain(&self, x: Self::Field) -> Self::Share {
        SpdzShare::from_plain(x, self.data.auth_key, self.party_id())
    }

    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError> {
        take_next(
            &self.data.beaver_triples,
            &mut self.cursors.beaver_triples,
            "beaver triples",
        )
        .copied()
    }

    fn next_bit(&mut self) -> Result<Self::Share, MpcError> {
        take_next(
            &self.data.random_bits,
            &mut self.cursors.random_bits,
            "random bits",
        )
        .copied()
    }

    fn next_exp_pipe(&mut self, len: usize) -> Result<Vec<Self::Share>, MpcError> {
        let pipe = take_next(&self.data.exp_pipes, &mut self.cursors.exp_pipes, "exp pipes")?;
        pipe.get(..=len).map(<[_]>::to_vec).ok_or_else(|| {
            MpcError::contract(format!(
                "requested exp pipe of length {}, precomputed pipes have length {}",
                len,
                pipe.len().saturating_sub(1)
            ))
        })
    }
}

impl<T: MpcField> SpdzDealer for PrecomputedSpdzDealer<T> {
    fn authentication_key_share(&self) -> Self::Field {
        self.data.auth_key
    }

    fn next_input_mask(
        &mut self,
        toward: usize,
    ) -> Result<InputMask<Self::Share, Self::Field>, MpcError> {
        let (masks, cursor) = self
            .data
            .input_masks
            .get(toward)
            .zip(self.cursors.input_masks.get_mut(toward))
            .ok_or_else(|| MpcError::contract(format!("no party {}", toward)))?;
        let index = *cursor;
        let share = *take_next(masks, cursor, "input masks")?;

        let plain = if toward == self.data.party_id {
            let plain = self.data.input_masks_plain.get(index).ok_or_else(|| {
                MpcError::ResourceExhaustion("no input mask plaintexts left".to_string())
            })?;
            Some(*plain)
        } else {
            None
        };
        Ok(InputMask { share, plain })
    }
}

/// Amounts of material to precompute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrecomputeParams {
    pub num_parties: usize,
    pub beaver_triples: usize,
    pub random_bits: usize,
    /// Input masks per party.
    pub input_masks: usize,
    pub exp_pipes: usize,
    pub exp_pipe_length: usize,
}

/// Generator of random SPDZ sharings. Knows the full authentication key.
struct ShareGenerator<T, R> {
    num_parties: usize,
    auth_key: T,
    rng: R,
}

impl<T, R> ShareGenerator<T, R>
where
    T: MpcField,
    R: Rng,
{
    /// Generate random sharing of given value.
    fn share(&mut self, value: T) -> Vec<SpdzShare<T>> {
        let mut shares: Vec<_> = (1..self.num_parties)
            .map(|_| SpdzShare {
                value: T::random(&mut self.rng),
                mac: T::random(&mut self.rng),
            })
            .collect();
        let sum = shares.iter().fold(SpdzShare::default(), |acc, &x| acc + x);
        shares.push(SpdzShare {
            value: value - sum.value,
            mac: value * self.auth_key - sum.mac,
        });
        shares
    }

    /// Generate random sharing of random value.
    fn share_random(&mut self) -> (Vec<SpdzShare<T>>, T) {
        let value = T::random(&mut self.rng);
        (self.share(value), value)
    }

    fn fill_beaver_triples(&mut self, data: &mut [PrecomputedSpdzData<T>], count: usize) {
        for _ in 0..count {
            let (shares_a, a) = self.share_random();
            let (shares_b, b) = self.share_random();
            let shares_ab = self.share(a * b);
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data
                    .beaver_triples
                    .push((shares_a[i], shares_b[i], shares_ab[i]));
            }
        }
    }

    fn fill_random_bits(&mut self, data: &mut [PrecomputedSpdzData<T>], count: usize) {
        for _ in 0..count {
            let bit = T::from(self.rng.gen_range(0..=1u64));
            let shares = self.share(bit);
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.random_bits.push(shares[i]);
            }
        }
    }

    /// Generate input masks whose plaintexts are known to `owner`.
    fn fill_input_masks_for(
        &mut self,
        data: &mut [PrecomputedSpdzData<T>],
        owner: usize,
        count: usize,
    ) {
        for _ in 0..count {
            let (shares, plain) = self.share_random();
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.input_masks[owner].push(shares[i]);
            }
            data[owner].input_masks_plain.push(plain);
        }
    }

    fn fill_exp_pipes(&mut self, data: &mut [PrecomputedSpdzData<T>], count: usize, len: usize) {
        for _ in 0..count {
            let (r, r_inv) = loop {
                let r = T::random(&mut self.rng);
                if let Some(r_inv) = Option::<T>::from(r.invert()) {
                    break (r, r_inv);
                }
            };
            let mut pipes = vec![Vec::with_capacity(len + 1); data.len()];
            for value in exp_pipe_values(r, r_inv, len) {
                for (pipe, share) in pipes.iter_mut().zip(self.share(value)) {
                    pipe.push(share);
                }
            }
            for (party_data, pipe) in data.iter_mut().zip(pipes) {
                party_data.exp_pipes.push(pipe);
            }
        }
    }
}

/// Generate authentication key shares and preprocessed material for every party.
pub fn generate_precomputed<T, R>(
    mut rng: R,
    params: &PrecomputeParams,
) -> Vec<PrecomputedSpdzData<T>>
where
    T: MpcField,
    R: Rng,
{
    let mut data: Vec<PrecomputedSpdzData<T>> = (0..params.num_parties)
        .map(|id| PrecomputedSpdzData {
            num_parties: params.num_parties,
            party_id: id,
            auth_key: T::random(&mut rng),
            input_masks: vec![Vec::new(); params.num_parties],
            ..Default::default()
        })
        .collect();

    let auth_key = data.iter().fold(T::zero(), |acc, x| acc + x.auth_key);

    let mut share_gen = ShareGenerator {
        num_parties: params.num_parties,
        auth_key,
        rng,
    };

    debug!(count = params.beaver_triples, "generating beaver triples");
    share_gen.fill_beaver_triples(&mut data, params.beaver_triples);

    debug!(count = params.random_bits, "generating random bits");
    share_gen.fill_random_bits(&mut data, params.random_bits);

    debug!(count = params.input_masks, "generating input masks");
    for owner in 0..params.num_parties {
        share_gen.fill_input_masks_for(&mut data, owner, params.input_masks);
    }

    debug!(
        count = params.exp_pipes,
        length = params.exp_pipe_length,
        "generating exp pipes"
    );
    share_gen.fill_exp_pipes(&mut data, params.exp_pipes, params.exp_pipe_length);

    data
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::fields::Mersenne127;

    type Fp = Mersenne127;

    fn dealers(params: &PrecomputeParams) -> Vec<PrecomputedSpdzDealer<Fp>> {
        generate_precomputed::<Fp, _>(StdRng::seed_from_u64(1), params)
            .into_iter()
            .map(PrecomputedSpdzDealer::new)
            .collect()
    }

    fn open(dealers: &[PrecomputedSpdzDealer<Fp>], shares: &[SpdzShare<Fp>]) -> Fp {
        let alpha = dealers
            .iter()
            .fold(Fp::zero(), |acc, d| acc + d.authentication_key_share());
        let value = shares.iter().fold(Fp::zero(), |acc, s| acc + s.value());
        let mac = shares.iter().fold(Fp::zero(), |acc, s| acc + s.mac());
        assert_eq!(mac, alpha * value);
        value
    }

    #[test]
    fn test_triples_until_exhausted() {
        let mut dealers = dealers(&PrecomputeParams {
            num_parties: 3,
            beaver_triples: 4,
            ..Default::default()
        });

        for _ in 0..4 {
            let triples: Vec<_> = dealers
                .iter_mut()
                .map(|d| d.next_beaver_triple().unwrap())
                .collect();
            let a = open(&dealers, &triples.iter().map(|t| t.0).collect::<Vec<_>>());
            let b = open(&dealers, &triples.iter().map(|t| t.1).collect::<Vec<_>>());
            let c = open(&dealers, &triples.iter().map(|t| t.2).collect::<Vec<_>>());
            assert_eq!(a * b, c);
        }

        assert_eq!(dealers[0].remaining_beaver_triples(), 0);
        assert!(matches!(
            dealers[0].next_beaver_triple(),
            Err(MpcError::ResourceExhaustion(_))
        ));
        assert!(matches!(
            dealers[0].next_bit(),
            Err(MpcError::ResourceExhaustion(_))
        ));
    }

    #[test]
    fn test_input_masks() {
        let mut dealers = dealers(&PrecomputeParams {
            num_parties: 2,
            input_masks: 2,
            ..Default::default()
        });

        for _ in 0..2 {
            let masks: Vec<_> = dealers
                .iter_mut()
                .map(|d| d.next_input_mask(0).unwrap())
                .collect();
            assert!(masks[1].plain.is_none());
            let value = open(&dealers, &masks.iter().map(|m| m.share).collect::<Vec<_>>());
            assert_eq!(masks[0].plain, Some(value));
        }
        assert!(matches!(
            dealers[0].next_input_mask(0),
            Err(MpcError::ResourceExhaustion(_))
        ));
        assert!(dealers[1].next_input_mask(1).is_ok());
    }

    #[test]
    fn test_exp_pipes() {
        let mut dealers = dealers(&PrecomputeParams {
            num_parties: 2,
            exp_pipes: 1,
            exp_pipe_length: 4,
            ..Default::default()
        });
        let pipes: Vec<_> = dealers
            .iter_mut()
            .map(|d| d.next_exp_pipe(2).unwrap())
            .collect();
        assert_eq!(pipes[0].len(), 3);
        let pipe: Vec<_> = (0..3)
            .map(|i| open(&dealers, &[pipes[0][i], pipes[1][i]]))
            .collect();
        assert_eq!(pipe[0] * pipe[1], Fp::one());
        assert_eq!(pipe[1].square(), pipe[2]);

        assert!(matches!(
            dealers[0].next_exp_pipe(2),
            Err(MpcError::ResourceExhaustion(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let data = generate_precomputed::<Fp, _>(
            StdRng::seed_from_u64(2),
            &PrecomputeParams {
                num_parties: 2,
                beaver_triples: 1,
                ..Default::default()
            },
        );
        let path = std::env::temp_dir().join(format!("spdz-precomp-{}.bin", std::process::id()));
        data[1].save_file(&path).unwrap();
        let mut dealer = PrecomputedSpdzDealer::<Fp>::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(dealer.party_id(), 1);
        assert_eq!(dealer.next_beaver_triple().unwrap(), data[1].beaver_triples[0]);
    }
}
