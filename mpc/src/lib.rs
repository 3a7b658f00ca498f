//! Maliciously secure SPDZ-style MPC engine.
//!
//! Computations are described as lazily expanded trees of sequential and parallel scopes
//! (see [`ProtocolBuilder`]). The [`executor::BatchedEvaluator`] pulls native protocols from
//! the tree into bounded batches and hands each batch to a [`executor::ProtocolSuite`], which
//! runs it in at most one network round.

use std::ops::{Add, Mul, Neg, Sub};

pub mod builder;
pub mod circuits;
pub mod cointoss;
pub mod commitment;
pub mod config;
pub mod dres;
pub mod error;
pub mod executor;
pub mod fields;
pub mod native;
pub mod plaintext;
pub mod spdz;
pub mod transport;

mod tree;

#[cfg(test)]
mod testing;

pub use builder::ProtocolBuilder;
pub use dres::DRes;
pub use error::{MaliciousError, MpcError};
pub use executor::{BatchedEvaluator, EvaluationStats, EvaluationStrategy, ProtocolSuite};
pub use fields::MpcField;

/// Private share of a field element.
/// Sharing is linear, so sums and scaling by public constants need no communication.
pub trait MpcShare:
    Copy
    + Clone
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Self::Field, Output = Self>
{
    /// Field type of value represented by this share.
    type Field: MpcField;

    /// Sharing of zero. Needs no preprocessed material.
    fn zero() -> Self;

    fn double(&self) -> Self {
        *self + *self
    }
}

/// Sharing-based MPC computation context.
pub trait MpcContext {
    /// Field type used by this MPC protocol.
    type Field: MpcField;

    /// Share type used by this MPC protocol.
    type Share: MpcShare<Field = Self::Field>;

    /// Number of parties participating in MPC computation.
    fn num_parties(&self) -> usize;

    /// ID of current party.
    fn party_id(&self) -> usize;
}

/// Supplier of preprocessed material for MPC computation.
/// Every item is consumed exactly once. Running out is fatal.
pub trait MpcDealer: MpcContext {
    /// Sharing of a public value.
    fn share_plain(&self, x: Self::Field) -> Self::Share;

    /// Random sharing of a secret random triple (a, b, c) that satisfies ab = c.
    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError>;

    /// Random sharing of a secret random bit.
    fn next_bit(&mut self) -> Result<Self::Share, MpcError>;

    /// Random sharing of a secret uniformly random field element.
    fn next_random(&mut self) -> Result<Self::Share, MpcError> {
        Ok(self.next_beaver_triple()?.0)
    }

    /// Sharings of `[r^-1, r, r^2, ..., r^len]` for a secret random non-zero `r`.
    fn next_exp_pipe(&mut self, len: usize) -> Result<Vec<Self::Share>, MpcError>;
}
