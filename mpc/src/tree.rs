use std::{collections::VecDeque, mem};

use crate::{
    builder::ProtocolBuilder, error::MpcError, executor::EvaluationStrategy,
    native::NativeProtocol, MpcShare,
};

pub(crate) type NodeId = usize;

/// Copies the result of an exhausted scope into its deferred output.
pub(crate) type Finisher = Box<dyn FnOnce() -> Result<(), MpcError>>;

/// Deferred body of a scope. Runs once, when the scope is first pulled.
pub(crate) type ScopeFn<S> = dyn FnOnce(&mut ProtocolBuilder<'_, S>) -> Result<Finisher, MpcError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScopeOrder {
    Sequential,
    Parallel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PullStatus {
    /// Node still has work. Some of it may be in the current batch.
    Pending,
    /// Node and all of its descendants completed.
    Exhausted,
}

enum Leaf<S: MpcShare> {
    Ready(NativeProtocol<S>),
    InFlight,
    Done,
}

enum ScopeBody<S: MpcShare> {
    Unexpanded(Box<ScopeFn<S>>),
    Expanded {
        children: VecDeque<NodeId>,
        finisher: Option<Finisher>,
    },
}

enum Node<S: MpcShare> {
    Vacant,
    Leaf(Leaf<S>),
    Scope { order: ScopeOrder, body: ScopeBody<S> },
}

/// Bounded set of native protocols collected by one pull.
pub(crate) struct Batch<S: MpcShare> {
    capacity: usize,
    nodes: Vec<NodeId>,
    protocols: Vec<NativeProtocol<S>>,
}

impl<S: MpcShare> Batch<S> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            nodes: Vec::new(),
            protocols: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.protocols.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    fn is_full(&self) -> bool {
        self.protocols.len() >= self.capacity
    }

    fn push(&mut self, node: NodeId, protocol: NativeProtocol<S>) {
        self.nodes.push(node);
        self.protocols.push(protocol);
    }

    pub(crate) fn into_parts(self) -> (Vec<NodeId>, Vec<NativeProtocol<S>>) {
        (self.nodes, self.protocols)
    }
}

/// Arena holding the expanded part of a protocol tree.
///
/// Scopes expand lazily and exhausted subtrees are released, so only the active frontier
/// lives in memory. Released slots are reused.
pub(crate) struct ProtocolTree<S: MpcShare> {
    nodes: Vec<Node<S>>,
    free: Vec<NodeId>,
    live: usize,
    peak_live: usize,
    party_id: usize,
    num_parties: usize,
}

impl<S: MpcShare> ProtocolTree<S> {
    pub(crate) fn new(party_id: usize, num_parties: usize) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            live: 0,
            peak_live: 0,
            party_id,
            num_parties,
        }
    }

    pub(crate) fn party_id(&self) -> usize {
        self.party_id
    }

    pub(crate) fn num_parties(&self) -> usize {
        self.num_parties
    }

    /// Largest number of nodes that were alive at once.
    pub(crate) fn peak_live(&self) -> usize {
        self.peak_live
    }

    pub(crate) fn insert_leaf(&mut self, protocol: NativeProtocol<S>) -> NodeId {
        self.insert(Node::Leaf(Leaf::Ready(protocol)))
    }

    pub(crate) fn insert_scope(&mut self, order: ScopeOrder, body: Box<ScopeFn<S>>) -> NodeId {
        self.insert(Node::Scope {
            order,
            body: ScopeBody::Unexpanded(body),
        })
    }

    fn insert(&mut self, node: Node<S>) -> NodeId {
        self.live += 1;
        self.peak_live = self.peak_live.max(self.live);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Release an exhausted node. Its children were released when they were exhausted.
    fn release(&mut self, id: NodeId) {
        self.nodes[id] = Node::Vacant;
        self.free.push(id);
        self.live -= 1;
    }

    /// Mark an in-flight leaf as evaluated.
    pub(crate) fn complete(&mut self, id: NodeId) -> Result<(), MpcError> {
        match &mut self.nodes[id] {
            Node::Leaf(leaf @ Leaf::InFlight) => {
                *leaf = Leaf::Done;
                Ok(())
            }
            _ => Err(MpcError::contract("completed protocol that was not in flight")),
        }
    }

    /// Collect ready native protocols below `id` into `batch`, expanding scopes as needed.
    pub(crate) fn pull(
        &mut self,
        id: NodeId,
        batch: &mut Batch<S>,
        strategy: EvaluationStrategy,
    ) -> Result<PullStatus, MpcError> {
        if self.is_scope(id) {
            return self.pull_scope(id, batch, strategy);
        }
        match &mut self.nodes[id] {
            Node::Leaf(Leaf::Done) => Ok(PullStatus::Exhausted),
            Node::Leaf(Leaf::InFlight) => Ok(PullStatus::Pending),
            Node::Leaf(leaf) => {
                if !batch.is_full() {
                    if let Leaf::Ready(protocol) = mem::replace(leaf, Leaf::InFlight) {
                        batch.push(id, protocol);
                    }
                }
                Ok(PullStatus::Pending)
            }
            _ => Err(MpcError::contract("pulled a released protocol node")),
        }
    }

    fn is_scope(&self, id: NodeId) -> bool {
        matches!(self.nodes[id], Node::Scope { .. })
    }

    fn pull_scope(
        &mut self,
        id: NodeId,
        batch: &mut Batch<S>,
        strategy: EvaluationStrategy,
    ) -> Result<PullStatus, MpcError> {
        self.expand(id)?;
        let (order, mut children) = match &mut self.nodes[id] {
            Node::Scope {
                order,
                body: ScopeBody::Expanded { children, .. },
            } => (*order, mem::take(children)),
            _ => return Err(MpcError::contract("scope was not expanded")),
        };

        let status = match order {
            ScopeOrder::Sequential => self.pull_sequential(&mut children, batch, strategy)?,
            ScopeOrder::Parallel => self.pull_parallel(&mut children, batch, strategy)?,
        };

        if let Node::Scope {
            body: ScopeBody::Expanded {
                children: slot,
                finisher,
            },
            ..
        } = &mut self.nodes[id]
        {
            *slot = children;
            if status == PullStatus::Exhausted {
                if let Some(finish) = finisher.take() {
                    finish()?;
                }
            }
        }
        Ok(status)
    }

    /// Only the first unfinished child may run.
    fn pull_sequential(
        &mut self,
        children: &mut VecDeque<NodeId>,
        batch: &mut Batch<S>,
        strategy: EvaluationStrategy,
    ) -> Result<PullStatus, MpcError> {
        while let Some(&child) = children.front() {
            match self.pull(child, batch, strategy)? {
                PullStatus::Exhausted => {
                    children.pop_front();
                    self.release(child);
                }
                PullStatus::Pending => return Ok(PullStatus::Pending),
            }
        }
        Ok(PullStatus::Exhausted)
    }

    /// All children may run. With [`EvaluationStrategy::SequentialBatched`] at most one nested
    /// scope contributes protocols to a batch.
    fn pull_parallel(
        &mut self,
        children: &mut VecDeque<NodeId>,
        batch: &mut Batch<S>,
        strategy: EvaluationStrategy,
    ) -> Result<PullStatus, MpcError> {
        let mut remaining = VecDeque::with_capacity(children.len());
        let mut scope_pulled = false;

        while let Some(child) = children.pop_front() {
            let is_scope = self.is_scope(child);
            let skip = batch.is_full()
                || (is_scope && scope_pulled && strategy == EvaluationStrategy::SequentialBatched);
            if skip {
                remaining.push_back(child);
                continue;
            }

            let before = batch.len();
            match self.pull(child, batch, strategy)? {
                PullStatus::Exhausted => self.release(child),
                PullStatus::Pending => {
                    scope_pulled |= is_scope && batch.len() > before;
                    remaining.push_back(child);
                }
            }
        }

        *children = remaining;
        Ok(if children.is_empty() {
            PullStatus::Exhausted
        } else {
            PullStatus::Pending
        })
    }

    /// Run the body of an unexpanded scope, attaching the protocols it creates as children.
    fn expand(&mut self, id: NodeId) -> Result<(), MpcError> {
        let body = match &mut self.nodes[id] {
            Node::Scope { body, .. } => body,
            _ => return Err(MpcError::contract("expanded a node that is not a scope")),
        };
        let expanded = ScopeBody::Expanded {
            children: VecDeque::new(),
            finisher: None,
        };
        let build = match mem::replace(body, expanded) {
            ScopeBody::Unexpanded(build) => build,
            already_expanded => {
                *body = already_expanded;
                return Ok(());
            }
        };

        let mut builder = ProtocolBuilder::new(self);
        let finish = build(&mut builder)?;
        let new_children = builder.into_children();

        if let Node::Scope {
            body: ScopeBody::Expanded { children, finisher },
            ..
        } = &mut self.nodes[id]
        {
            *children = new_children.into();
            *finisher = Some(finish);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dres::DRes, fields::Fp97, native::LocalProtocol, plaintext::PlainShare};

    type Share = PlainShare<Fp97>;

    fn known(tree: &mut ProtocolTree<Share>, x: u64) -> (NodeId, DRes<Share>) {
        let out = DRes::pending();
        let protocol = LocalProtocol::Known {
            value: Fp97::from(x),
            out: out.clone(),
        };
        (tree.insert_leaf(protocol.into()), out)
    }

    #[test]
    fn test_leaf_lifecycle() {
        let mut tree = ProtocolTree::new(0, 1);
        let (id, _) = known(&mut tree, 1);
        let strategy = EvaluationStrategy::Greedy;

        let mut batch = Batch::new(0);
        assert_eq!(tree.pull(id, &mut batch, strategy).unwrap(), PullStatus::Pending);
        assert!(batch.is_empty());

        let mut batch = Batch::new(1);
        assert_eq!(tree.pull(id, &mut batch, strategy).unwrap(), PullStatus::Pending);
        assert_eq!(batch.len(), 1);
        assert_eq!(tree.pull(id, &mut batch, strategy).unwrap(), PullStatus::Pending);
        assert_eq!(batch.len(), 1);

        tree.complete(id).unwrap();
        assert_eq!(tree.pull(id, &mut batch, strategy).unwrap(), PullStatus::Exhausted);
        assert!(tree.complete(id).is_err());
    }

    #[test]
    fn test_slot_reuse() {
        let mut tree = ProtocolTree::new(0, 1);
        let (first, _) = known(&mut tree, 1);
        tree.release(first);
        let (second, _) = known(&mut tree, 2);
        assert_eq!(first, second);
        assert_eq!(tree.peak_live(), 1);
    }
}
