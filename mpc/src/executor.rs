use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
    builder::ProtocolBuilder,
    dres::DRes,
    error::MpcError,
    native::NativeProtocol,
    tree::{Batch, PullStatus, ProtocolTree},
    MpcContext,
};

/// How the evaluator walks parallel scopes when filling a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// At most one nested scope of each parallel scope contributes to a batch.
    /// Keeps fewer scopes expanded at the cost of more rounds.
    SequentialBatched,
    /// Fill the batch from every runnable child.
    #[default]
    Greedy,
}

/// Outcome of executing one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Network rounds the batch took. Zero for purely local batches.
    pub rounds: usize,
}

/// Executes batches of native protocols for one party.
#[async_trait(?Send)]
pub trait ProtocolSuite: MpcContext {
    /// Run all protocols of the batch and write their outputs. Uses at most one network round.
    async fn execute_native_batch(
        &mut self,
        batch: Vec<NativeProtocol<Self::Share>>,
    ) -> Result<BatchReport, MpcError>;

    /// Verify everything revealed so far. Called when [`ProtocolSuite::needs_finalize`] asks for
    /// it and once after the computation completes.
    async fn finalize(&mut self) -> Result<(), MpcError>;

    /// Does the suite want to run [`ProtocolSuite::finalize`] before continuing?
    fn needs_finalize(&self) -> bool {
        false
    }
}

/// Counters collected while evaluating a computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    pub batches: usize,
    pub native_protocols: usize,
    pub network_rounds: usize,
    pub finalizations: usize,
    /// Largest number of tree nodes held in memory at once.
    pub peak_nodes: usize,
}

/// Evaluates protocol trees batch by batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchedEvaluator {
    batch_capacity: usize,
    strategy: EvaluationStrategy,
}

impl Default for BatchedEvaluator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BATCH_CAPACITY, EvaluationStrategy::default())
    }
}

impl BatchedEvaluator {
    pub const DEFAULT_BATCH_CAPACITY: usize = 4096;

    pub fn new(batch_capacity: usize, strategy: EvaluationStrategy) -> Self {
        Self {
            batch_capacity,
            strategy,
        }
    }

    pub fn batch_capacity(&self) -> usize {
        self.batch_capacity
    }

    pub fn strategy(&self) -> EvaluationStrategy {
        self.strategy
    }

    /// Evaluate computation described by `app` and return its output.
    ///
    /// `app` is the body of the root sequential scope. Output is returned only after the suite
    /// verified every value revealed during the computation.
    pub async fn evaluate<Suite, T, F>(
        &self,
        suite: &mut Suite,
        app: F,
    ) -> Result<(T, EvaluationStats), MpcError>
    where
        Suite: ProtocolSuite,
        T: Clone + 'static,
        F: FnOnce(&mut ProtocolBuilder<'_, Suite::Share>) -> Result<DRes<T>, MpcError> + 'static,
    {
        if self.batch_capacity == 0 {
            return Err(MpcError::contract("batch capacity must be positive"));
        }

        let mut tree = ProtocolTree::new(suite.party_id(), suite.num_parties());
        let mut builder = ProtocolBuilder::new(&mut tree);
        let output = builder.seq(app);
        let root = builder
            .into_children()
            .pop()
            .ok_or_else(|| MpcError::contract("root scope missing"))?;

        let mut stats = EvaluationStats::default();
        loop {
            let mut batch = Batch::new(self.batch_capacity);
            let status = tree.pull(root, &mut batch, self.strategy)?;
            if batch.is_empty() {
                if status == PullStatus::Exhausted {
                    break;
                }
                return Err(MpcError::contract(
                    "protocol tree is not exhausted but has nothing to evaluate",
                ));
            }

            let (nodes, protocols) = batch.into_parts();
            trace!(size = protocols.len(), "executing batch");
            let report = suite.execute_native_batch(protocols).await?;
            for node in &nodes {
                tree.complete(*node)?;
            }

            stats.batches += 1;
            stats.native_protocols += nodes.len();
            stats.network_rounds += report.rounds;

            if suite.needs_finalize() {
                debug!(batches = stats.batches, "intermediate finalization");
                suite.finalize().await?;
                stats.finalizations += 1;
            }
        }

        suite.finalize().await?;
        stats.finalizations += 1;
        stats.peak_nodes = tree.peak_live();

        info!(
            batches = stats.batches,
            protocols = stats.native_protocols,
            rounds = stats.network_rounds,
            "evaluation finished"
        );
        Ok((output.out()?, stats))
    }
}
