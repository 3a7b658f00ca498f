use std::{
    marker::PhantomData,
    ops::{Add, Mul, Neg, Sub},
};

use async_trait::async_trait;
use rand::{thread_rng, Rng};

use crate::{
    error::MpcError,
    executor::{BatchReport, ProtocolSuite},
    native::NativeProtocol,
    MpcContext, MpcDealer, MpcField, MpcShare,
};

/// Single-party suite that computes everything in plain.
/// Counts rounds and openings the same way a real suite would spend them.
pub struct PlainSuite<T> {
    num_openings: usize,
    num_rounds: usize,
    _phantom: PhantomData<T>,
}

impl<T: MpcField> PlainSuite<T> {
    pub fn new() -> Self {
        Self {
            num_openings: 0,
            num_rounds: 0,
            _phantom: PhantomData,
        }
    }

    /// Get total count of opened values.
    pub fn num_openings(&self) -> usize {
        self.num_openings
    }

    /// Get total number of rounds.
    pub fn num_rounds(&self) -> usize {
        self.num_rounds
    }
}

impl<T: MpcField> Default for PlainSuite<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MpcField> MpcContext for PlainSuite<T> {
    type Field = T;
    type Share = PlainShare<T>;

    fn num_parties(&self) -> usize {
        1
    }

    fn party_id(&self) -> usize {
        0
    }
}

impl<T: MpcField> MpcDealer for PlainSuite<T> {
    fn share_plain(&self, x: T) -> PlainShare<T> {
        PlainShare(x)
    }

    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError> {
        let mut rng = thread_rng();
        let a = T::random(&mut rng);
        let b = T::random(&mut rng);
        Ok((PlainShare(a), PlainShare(b), PlainShare(a * b)))
    }

    fn next_bit(&mut self) -> Result<Self::Share, MpcError> {
        let bit: bool = thread_rng().gen();
        Ok(PlainShare(if bit { T::one() } else { T::zero() }))
    }

    fn next_random(&mut self) -> Result<Self::Share, MpcError> {
        Ok(PlainShare(T::random(&mut thread_rng())))
    }

    fn next_exp_pipe(&mut self, len: usize) -> Result<Vec<Self::Share>, MpcError> {
        let mut rng = thread_rng();
        let (r, r_inv) = loop {
            let r = T::random(&mut rng);
            if let Some(r_inv) = Option::<T>::from(r.invert()) {
                break (r, r_inv);
            }
        };
        Ok(exp_pipe_values(r, r_inv, len)
            .into_iter()
            .map(PlainShare)
            .collect())
    }
}

/// `[r^-1, r, r^2, ..., r^len]`
pub(crate) fn exp_pipe_values<T: MpcField>(r: T, r_inv: T, len: usize) -> Vec<T> {
    let mut values = Vec::with_capacity(len + 1);
    values.push(r_inv);
    let mut power = T::one();
    for _ in 0..len {
        power *= r;
        values.push(power);
    }
    values
}

#[async_trait(?Send)]
impl<T: MpcField> ProtocolSuite for PlainSuite<T> {
    async fn execute_native_batch(
        &mut self,
        batch: Vec<NativeProtocol<PlainShare<T>>>,
    ) -> Result<BatchReport, MpcError> {
        let interactive = batch.iter().any(NativeProtocol::is_interactive);
        for protocol in batch {
            match protocol {
                NativeProtocol::Local(local) => local.evaluate(PlainShare)?,
                NativeProtocol::Input { owner, value, out } => {
                    if owner != 0 {
                        return Err(MpcError::contract(format!("no party {}", owner)));
                    }
                    let value =
                        value.ok_or_else(|| MpcError::contract("input owner must provide value"))?;
                    out.set(PlainShare(value))?;
                }
                NativeProtocol::Mul { lhs, rhs, out } => {
                    out.set(PlainShare(lhs.out()?.0 * rhs.out()?.0))?
                }
                NativeProtocol::Open { x, out } => {
                    self.num_openings += 1;
                    out.set(x.out()?.0)?;
                }
                NativeProtocol::OpenTo { x, party, out } => {
                    if party != 0 {
                        return Err(MpcError::contract(format!("no party {}", party)));
                    }
                    self.num_openings += 1;
                    out.set(Some(x.out()?.0))?;
                }
                NativeProtocol::RandomBit { out } => out.set(self.next_bit()?)?,
                NativeProtocol::RandomElement { out } => out.set(self.next_random()?)?,
                NativeProtocol::ExpPipe { len, out } => out.set(self.next_exp_pipe(len)?)?,
            }
        }
        if interactive {
            self.num_rounds += 1;
        }
        Ok(BatchReport {
            rounds: interactive as usize,
        })
    }

    async fn finalize(&mut self) -> Result<(), MpcError> {
        Ok(())
    }
}

/// Share of a computation run on a single node. Wraps plaintext value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlainShare<T>(pub T);

impl<T: MpcField> MpcShare for PlainShare<T> {
    type Field = T;

    fn zero() -> Self {
        PlainShare(T::zero())
    }
}

impl<T: MpcField> Add for PlainShare<T> {
    type Output = PlainShare<T>;
    fn add(self, rhs: Self) -> Self::Output {
        PlainShare(self.0 + rhs.0)
    }
}

impl<T: MpcField> Sub for PlainShare<T> {
    type Output = PlainShare<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        PlainShare(self.0 - rhs.0)
    }
}

impl<T: MpcField> Neg for PlainShare<T> {
    type Output = PlainShare<T>;
    fn neg(self) -> Self::Output {
        PlainShare(-self.0)
    }
}

impl<T: MpcField> Mul<T> for PlainShare<T> {
    type Output = PlainShare<T>;
    fn mul(self, rhs: T) -> Self::Output {
        PlainShare(self.0 * rhs)
    }
}
