use crate::{error::MpcError, DRes, MpcShare, ProtocolBuilder};

use super::zip_operands;

/// Sum of shared values. Local.
pub fn sum<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, terms: &[DRes<S>]) -> DRes<S> {
    builder.sum(terms)
}

/// Inner product of two shared vectors. All products share one round.
pub fn inner_product<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    lhs: &[DRes<S>],
    rhs: &[DRes<S>],
) -> Result<DRes<S>, MpcError> {
    let pairs = zip_operands(lhs, rhs)?;
    let products = builder.par(move |par| {
        let products: Vec<_> = pairs.iter().map(|(x, y)| par.mul(x, y)).collect();
        Ok(DRes::ready(products))
    });
    Ok(builder.seq(move |seq| Ok(seq.sum(&products.out()?))))
}

/// Product of shared values, multiplied pairwise in a tree of logarithmic depth.
/// Product of no values is one.
pub fn product<S: MpcShare>(builder: &mut ProtocolBuilder<'_, S>, factors: &[DRes<S>]) -> DRes<S> {
    match factors {
        [] => builder.one(),
        [single] => single.clone(),
        _ => {
            let factors = factors.to_vec();
            builder.seq(move |seq| Ok(product_layer(seq, factors)))
        }
    }
}

fn product_layer<S: MpcShare>(
    builder: &mut ProtocolBuilder<'_, S>,
    factors: Vec<DRes<S>>,
) -> DRes<S> {
    if let [single] = factors.as_slice() {
        return single.clone();
    }
    let next = builder.par(move |par| {
        let next: Vec<_> = factors
            .chunks(2)
            .map(|pair| match pair {
                [x, y] => par.mul(x, y),
                _ => pair[0].clone(),
            })
            .collect();
        Ok(DRes::ready(next))
    });
    builder.seq(move |seq| Ok(product_layer(seq, next.out()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields::Fp97, plaintext::PlainSuite, BatchedEvaluator, MpcError};

    fn inputs(
        builder: &mut ProtocolBuilder<'_, crate::plaintext::PlainShare<Fp97>>,
        values: &[u64],
    ) -> Vec<DRes<crate::plaintext::PlainShare<Fp97>>> {
        values
            .iter()
            .map(|&v| builder.input(0, Some(Fp97::from(v))))
            .collect()
    }

    #[tokio::test]
    async fn test_inner_product() {
        let mut suite = PlainSuite::<Fp97>::new();
        let (result, stats) = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let xs = b.par(|par| Ok(DRes::ready(inputs(par, &[1, 2, 3]))));
                Ok(b.seq(move |seq| {
                    let xs = xs.out()?;
                    let ys = inputs(seq, &[4, 5, 6]);
                    let ip = inner_product(seq, &xs, &ys)?;
                    Ok(seq.open(&ip))
                }))
            })
            .await
            .unwrap();
        assert_eq!(result, Fp97::from(32));
        // inputs of xs, each input of ys, products, opening
        assert_eq!(stats.network_rounds, 6);
    }

    #[tokio::test]
    async fn test_inner_product_length_mismatch() {
        let mut suite = PlainSuite::<Fp97>::new();
        let result = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let xs = inputs(b, &[1, 2]);
                let ys = inputs(b, &[3]);
                inner_product(b, &xs, &ys)
            })
            .await;
        assert!(matches!(result, Err(MpcError::ProgrammingContract(_))));
    }

    #[tokio::test]
    async fn test_product_depth() {
        for (count, rounds) in [(1u64, 0usize), (2, 1), (5, 3), (8, 3)] {
            let mut suite = PlainSuite::<Fp97>::new();
            let (result, _) = BatchedEvaluator::default()
                .evaluate(&mut suite, move |b| {
                    let factors: Vec<_> = (1..=count).map(|v| b.known(Fp97::from(v))).collect();
                    Ok(product(b, &factors))
                })
                .await
                .unwrap();
            let expected: u64 = (1..=count).product();
            assert_eq!(result.0, Fp97::from(expected));
            assert_eq!(suite.num_rounds(), rounds);
        }
    }

    #[tokio::test]
    async fn test_empty_product_and_sum() {
        let mut suite = PlainSuite::<Fp97>::new();
        let ((p, s), _) = BatchedEvaluator::default()
            .evaluate(&mut suite, |b| {
                let p = product(b, &[]);
                let s = sum(b, &[]);
                Ok(b.seq(move |_| Ok(DRes::ready((p.out()?, s.out()?)))))
            })
            .await
            .unwrap();
        assert_eq!(p.0, Fp97::from(1));
        assert_eq!(s.0, Fp97::from(0));
    }
}
