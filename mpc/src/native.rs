//! Native protocols: the leaves of a protocol tree.
//!
//! Each native protocol is executed by a protocol suite as part of a batch and costs at most
//! one network round. Local protocols never touch the network.

use crate::{dres::DRes, error::MpcError, MpcShare};

/// Protocol that is computed from shares already held by the current party.
pub enum LocalProtocol<S: MpcShare> {
    /// Sharing of a public constant.
    Known { value: S::Field, out: DRes<S> },
    Add { lhs: DRes<S>, rhs: DRes<S>, out: DRes<S> },
    Sub { lhs: DRes<S>, rhs: DRes<S>, out: DRes<S> },
    Neg { x: DRes<S>, out: DRes<S> },
    Sum { terms: Vec<DRes<S>>, out: DRes<S> },
    AddPublic { x: DRes<S>, c: DRes<S::Field>, out: DRes<S> },
    MulPublic { x: DRes<S>, c: DRes<S::Field>, out: DRes<S> },
}

impl<S: MpcShare> LocalProtocol<S> {
    /// Compute the result and write it to the output.
    /// `share_plain` converts a public value into a sharing held by the current party.
    pub fn evaluate(self, share_plain: impl Fn(S::Field) -> S) -> Result<(), MpcError> {
        match self {
            LocalProtocol::Known { value, out } => out.set(share_plain(value)),
            LocalProtocol::Add { lhs, rhs, out } => out.set(lhs.out()? + rhs.out()?),
            LocalProtocol::Sub { lhs, rhs, out } => out.set(lhs.out()? - rhs.out()?),
            LocalProtocol::Neg { x, out } => out.set(-x.out()?),
            LocalProtocol::Sum { terms, out } => {
                let mut acc = S::zero();
                for term in terms {
                    acc = acc + term.out()?;
                }
                out.set(acc)
            }
            LocalProtocol::AddPublic { x, c, out } => out.set(x.out()? + share_plain(c.out()?)),
            LocalProtocol::MulPublic { x, c, out } => out.set(x.out()? * c.out()?),
        }
    }
}

/// Smallest unit of work handed to a protocol suite.
pub enum NativeProtocol<S: MpcShare> {
    Local(LocalProtocol<S>),
    /// Secret input of party `owner`. Only the owner provides `value`.
    Input {
        owner: usize,
        value: Option<S::Field>,
        out: DRes<S>,
    },
    /// Product of two shared values. Consumes one multiplication triple.
    Mul { lhs: DRes<S>, rhs: DRes<S>, out: DRes<S> },
    /// Reveal a shared value to every party.
    Open { x: DRes<S>, out: DRes<S::Field> },
    /// Reveal a shared value to a single party. Other parties receive `None`.
    OpenTo {
        x: DRes<S>,
        party: usize,
        out: DRes<Option<S::Field>>,
    },
    RandomBit { out: DRes<S> },
    RandomElement { out: DRes<S> },
    /// Sharings of `[r^-1, r, r^2, ..., r^len]`.
    ExpPipe { len: usize, out: DRes<Vec<S>> },
}

impl<S: MpcShare> NativeProtocol<S> {
    /// Does the protocol need to exchange messages with other parties?
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            NativeProtocol::Input { .. }
                | NativeProtocol::Mul { .. }
                | NativeProtocol::Open { .. }
                | NativeProtocol::OpenTo { .. }
        )
    }
}

impl<S: MpcShare> From<LocalProtocol<S>> for NativeProtocol<S> {
    fn from(protocol: LocalProtocol<S>) -> Self {
        NativeProtocol::Local(protocol)
    }
}
