//! Helpers for running all parties of a computation inside one test.

use futures::future::join_all;

use crate::{
    error::MpcError,
    executor::{BatchedEvaluator, EvaluationStats, ProtocolSuite},
    spdz::{FakeSpdzDealer, SpdzMessage, SpdzSuite},
    transport::{mock_multiparty_channels, BincodeDuplex},
    DRes, MpcField, ProtocolBuilder,
};

pub(crate) type MockSpdzSuite<T> =
    SpdzSuite<T, FakeSpdzDealer<T>, BincodeDuplex<SpdzMessage<T>>>;

/// SPDZ suites of all parties connected with in-memory channels.
pub(crate) fn spdz_suites<T: MpcField>(num_parties: usize) -> Vec<MockSpdzSuite<T>> {
    mock_multiparty_channels(num_parties, 1 << 20)
        .into_iter()
        .enumerate()
        .map(|(id, transport)| {
            SpdzSuite::new(FakeSpdzDealer::new(num_parties, id, 42), transport).unwrap()
        })
        .collect()
}

/// Evaluate the computation built by `app(party_id)` at every party concurrently.
pub(crate) async fn run_parties<Suite, T, F>(
    suites: Vec<Suite>,
    evaluator: BatchedEvaluator,
    app: impl Fn(usize) -> F,
) -> Vec<(Result<(T, EvaluationStats), MpcError>, Suite)>
where
    Suite: ProtocolSuite,
    T: Clone + 'static,
    F: FnOnce(&mut ProtocolBuilder<'_, Suite::Share>) -> Result<DRes<T>, MpcError> + 'static,
{
    join_all(suites.into_iter().map(|mut suite| {
        let app = app(suite.party_id());
        async move {
            let result = evaluator.evaluate(&mut suite, app).await;
            (result, suite)
        }
    }))
    .await
}
