//! Numeric building blocks composed from native protocols.

use itertools::{EitherOrBoth, Itertools};

use crate::{dres::out_all, error::MpcError, DRes, MpcShare, ProtocolBuilder};

pub mod linalg;
pub mod logical;

/// Pair up equally long operand lists.
fn zip_operands<S: Clone>(
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
) -> Result<Vec<(DRes<S>, DRes<S>)>, MpcError> {
    lhs.iter()
        .zip_longest(rhs)
        .map(|pair| match pair {
            EitherOrBoth::Both(x, y) => Ok((x.clone(), y.clone())),
            _ => Err(MpcError::contract(format!(
                "operands differ in length: {} and {}",
                lhs.len(),
                rhs.len()
            ))),
        })
        .collect()
}

/// Values of a list produced by a scope, available once the scope is done.
pub fn flatten<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    list: DRes<Vec<DRes<S>>>,
) -> DRes<Vec<S>> {
    builder.seq(move |_| Ok(DRes::ready(out_all(&list.out()?)?)))
}
