//! Boolean operations on shared bits, i.e. sharings of 0 or 1.
//! Results are undefined for sharings of other values.

use ff::Field;

use crate::{error::MpcError, DRes, MpcShare, ProtocolBuilder};

use super::zip_operands;

pub fn and<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, a: &DRes<S>, b: &DRes<S>) -> DRes<S> {
    builder.mul(a, b)
}

/// `a + b - ab`
pub fn or<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, a: &DRes<S>, b: &DRes<S>) -> DRes<S> {
    let (a, b) = (a.clone(), b.clone());
    builder.seq(move |seq| {
        let sum = seq.add(&a, &b);
        let product = seq.mul(&a, &b);
        Ok(seq.sub(&sum, &product))
    })
}

/// `a + b - 2ab`
pub fn xor<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, a: &DRes<S>, b: &DRes<S>) -> DRes<S> {
    let (a, b) = (a.clone(), b.clone());
    builder.seq(move |seq| {
        let sum = seq.add(&a, &b);
        let product = seq.mul(&a, &b);
        let twice = seq.add(&product, &product);
        Ok(seq.sub(&sum, &twice))
    })
}

/// `1 - a`
pub fn not<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, a: &DRes<S>) -> DRes<S> {
    builder.sub_from_public(&DRes::ready(S::Field::one()), a)
}

/// AND with a public bit. Local.
pub fn and_known<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    known: &DRes<S::Field>,
    a: &DRes<S>,
) -> DRes<S> {
    builder.mul_public(known, a)
}

/// XOR with a public bit `c`, computed locally as `a(1 - 2c) + c`.
pub fn xor_known<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    known: &DRes<S::Field>,
    a: &DRes<S>,
) -> DRes<S> {
    let (known, a) = (known.clone(), a.clone());
    builder.seq(move |seq| {
        let c = known.out()?;
        let scaled = seq.mul_public(&DRes::ready(S::Field::one() - c.double()), &a);
        Ok(seq.add_public(&DRes::ready(c), &scaled))
    })
}

/// Apply a binary operation to every pair of bits. All pairs run in parallel.
fn pairwise<S, Op>(
    builder: &mut ProtocolBuilder<'_, S>,
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
    op: Op,
) -> Result<DRes<Vec<DRes<S>>>, MpcError>
where
    S: MpcShare,
    Op: Fn(&mut ProtocolBuilder<'_, S>, &DRes<S>, &DRes<S>) -> DRes<S> + 'static,
{
    let pairs = zip_operands(lhs, rhs)?;
    Ok(builder.par(move |par| {
        let results = pairs.iter().map(|(x, y)| op(par, x, y)).collect();
        Ok(DRes::ready(results))
    }))
}

pub fn and_pairwise<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
) -> Result<DRes<Vec<DRes<S>>>, MpcError> {
    pairwise(builder, lhs, rhs, and)
}

pub fn or_pairwise<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
) -> Result<DRes<Vec<DRes<S>>>, MpcError> {
    pairwise(builder, lhs, rhs, or)
}

pub fn xor_pairwise<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
) -> Result<DRes<Vec<DRes<S>>>, MpcError> {
    pairwise(builder, lhs, rhs, xor)
}

pub fn not_all<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    bits: &[DRes<S>],
) -> DRes<Vec<DRes<S>>> {
    let bits = bits.to_vec();
    builder.par(move |par| Ok(DRes::ready(bits.iter().map(|bit| not(par, bit)).collect())))
}

/// AND of every secret bit with the public bit at the same position. Local.
pub fn and_known_pairwise<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    known: &[S::Field],
    bits: &[DRes<S>],
) -> Result<DRes<Vec<DRes<S>>>, MpcError> {
    let known: Vec<_> = known.iter().map(|&c| DRes::ready(c)).collect();
    let pairs = zip_known(&known, bits)?;
    Ok(builder.par(move |par| {
        let results = pairs.iter().map(|(c, x)| and_known(par, c, x)).collect();
        Ok(DRes::ready(results))
    }))
}

/// XOR of every secret bit with the public bit at the same position. Local.
pub fn xor_known_pairwise<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    known: &[S::Field],
    bits: &[DRes<S>],
) -> Result<DRes<Vec<DRes<S>>>, MpcError> {
    let known: Vec<_> = known.iter().map(|&c| DRes::ready(c)).collect();
    let pairs = zip_known(&known, bits)?;
    Ok(builder.par(move |par| {
        let results = pairs.iter().map(|(c, x)| xor_known(par, c, x)).collect();
        Ok(DRes::ready(results))
    }))
}

fn zip_known<F, S>(
    known: &[DRes<F>],
    bits: &[DRes<S>],
) -> Result<Vec<(DRes<F>, DRes<S>)>, MpcError> {
    if known.len() != bits.len() {
        return Err(MpcError::contract(format!(
            "operands differ in length: {} and {}",
            known.len(),
            bits.len()
        )));
    }
    Ok(known.iter().cloned().zip(bits.iter().cloned()).collect())
}

/// OR of all bits in a list.
pub fn or_of_list<S: MpcShare>(
    _builder: &mut ProtocolBuilder<'_, S>,
    _bits: &[DRes<S>],
) -> Result<DRes<S>, MpcError> {
    Err(MpcError::Unimplemented("or_of_list"))
}

/// OR of all public bits in a list, as a sharing.
pub fn or_of_known_list<S: MpcShare>(
    _builder: &mut ProtocolBuilder<'_, S>,
    _known: &[S::Field],
) -> Result<DRes<S>, MpcError> {
    Err(MpcError::Unimplemented("or_of_known_list"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        circuits::flatten,
        fields::{Fp97, MpcField},
        plaintext::{PlainShare, PlainSuite},
        BatchedEvaluator,
    };

    type Bit = DRes<PlainShare<Fp97>>;

    fn bits(builder: &mut ProtocolBuilder<'_, PlainShare<Fp97>>, values: &[u64]) -> Vec<Bit> {
        values.iter().map(|&v| builder.known(Fp97::from(v))).collect()
    }

    async fn truth_table<Op>(op: Op) -> Vec<u64>
    where
        Op: Fn(&mut ProtocolBuilder<'_, PlainShare<Fp97>>, &Bit, &Bit) -> Bit + 'static,
    {
        let mut suite = PlainSuite::<Fp97>::new();
        let (values, _) = BatchedEvaluator::default()
            .evaluate(&mut suite, move |b| {
                let lhs = bits(b, &[0, 0, 1, 1]);
                let rhs = bits(b, &[0, 1, 0, 1]);
                let results = pairwise(b, &lhs, &rhs, op)?;
                Ok(flatten(b, results))
            })
            .await
            .unwrap();
        values.iter().map(|v| v.0.to_u128() as u64).collect()
    }

    #[tokio::test]
    async fn test_truth_tables() {
        assert_eq!(truth_table(and).await, vec![0, 0, 0, 1]);
        assert_eq!(truth_table(or).await, vec![0, 1, 1, 1]);
        assert_eq!(truth_table(xor).await, vec![0, 1, 1, 0]);
    }

    #[tokio::test]
    async fn test_known_operations() {
        let mut suite = PlainSuite::<Fp97>::new();
        let (values, _) = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let secret = bits(b, &[0, 1, 0, 1]);
                let known = [0u64, 0, 1, 1].map(Fp97::from);
                let anded = and_known_pairwise(b, &known, &secret)?;
                let xored = xor_known_pairwise(b, &known, &secret)?;
                let negated = not_all(b, &secret);
                let anded = flatten(b, anded);
                let xored = flatten(b, xored);
                let negated = flatten(b, negated);
                Ok(b.seq(move |_| {
                    Ok(DRes::ready(vec![anded.out()?, xored.out()?, negated.out()?]))
                }))
            })
            .await
            .unwrap();
        let values: Vec<Vec<u64>> = values
            .iter()
            .map(|row| row.iter().map(|v| v.0.to_u128() as u64).collect())
            .collect();
        assert_eq!(values[0], vec![0, 0, 0, 1]);
        assert_eq!(values[1], vec![0, 1, 1, 0]);
        assert_eq!(values[2], vec![1, 0, 1, 0]);
        // everything is local
        assert_eq!(suite.num_rounds(), 0);
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let mut suite = PlainSuite::<Fp97>::new();
        let result = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let lhs = bits(b, &[0, 1]);
                let rhs = bits(b, &[1]);
                or_pairwise(b, &lhs, &rhs)
            })
            .await;
        assert!(matches!(result, Err(MpcError::ProgrammingContract(_))));
    }

    #[tokio::test]
    async fn test_or_of_list_unimplemented() {
        let mut suite = PlainSuite::<Fp97>::new();
        let result = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let list = bits(b, &[0, 1]);
                or_of_list(b, &list)
            })
            .await;
        assert!(matches!(result, Err(MpcError::Unimplemented(_))));

        let result = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| or_of_known_list(b, &[Fp97::from(1)]))
            .await;
        assert!(matches!(result, Err(MpcError::Unimplemented(_))));
    }
}
