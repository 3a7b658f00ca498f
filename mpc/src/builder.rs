use ff::Field;

use crate::{
    dres::DRes,
    error::MpcError,
    native::{LocalProtocol, NativeProtocol},
    tree::{Finisher, NodeId, ProtocolTree, ScopeFn, ScopeOrder},
    MpcShare,
};

/// Appends protocols to the scope that is currently being expanded.
///
/// Every operation returns a deferred result immediately. Protocols appended to a sequential
/// scope run in order, one after the other. Protocols appended to a parallel scope may share
/// network rounds. Nested scopes are expanded only when the evaluator first reaches them.
pub struct ProtocolBuilder<'a, S: MpcShare> {
    tree: &'a mut ProtocolTree<S>,
    children: Vec<NodeId>,
}

impl<'a, S: MpcShare> ProtocolBuilder<'a, S> {
    pub(crate) fn new(tree: &'a mut ProtocolTree<S>) -> Self {
        Self {
            tree,
            children: Vec::new(),
        }
    }

    pub(crate) fn into_children(self) -> Vec<NodeId> {
        self.children
    }

    /// Number of parties participating in the computation.
    pub fn num_parties(&self) -> usize {
        self.tree.num_parties()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.tree.party_id()
    }

    /// Append a native protocol.
    pub fn append(&mut self, protocol: NativeProtocol<S>) {
        let id = self.tree.insert_leaf(protocol);
        self.children.push(id);
    }

    fn append_local(&mut self, protocol: LocalProtocol<S>) {
        self.append(protocol.into());
    }

    /// Sub-computation whose children run one after the other.
    /// The body runs when the scope is first evaluated, so it may read results of earlier siblings.
    pub fn seq<T, F>(&mut self, body: F) -> DRes<T>
    where
        T: Clone + 'static,
        F: FnOnce(&mut ProtocolBuilder<'_, S>) -> Result<DRes<T>, MpcError> + 'static,
    {
        self.scope(ScopeOrder::Sequential, body)
    }

    /// Sub-computation whose children are independent and run concurrently.
    pub fn par<T, F>(&mut self, body: F) -> DRes<T>
    where
        T: Clone + 'static,
        F: FnOnce(&mut ProtocolBuilder<'_, S>) -> Result<DRes<T>, MpcError> + 'static,
    {
        self.scope(ScopeOrder::Parallel, body)
    }

    fn scope<T, F>(&mut self, order: ScopeOrder, body: F) -> DRes<T>
    where
        T: Clone + 'static,
        F: FnOnce(&mut ProtocolBuilder<'_, S>) -> Result<DRes<T>, MpcError> + 'static,
    {
        let out = DRes::pending();
        let target = out.clone();
        let build = boxed_scope(move |builder| {
            let inner = body(builder)?;
            let finish: Finisher = Box::new(move || target.set(inner.out()?));
            Ok(finish)
        });
        let id = self.tree.insert_scope(order, build);
        self.children.push(id);
        out
    }

    /// Sharing of a public value.
    pub fn known(&mut self, value: S::Field) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::Known {
            value,
            out: out.clone(),
        });
        out
    }

    /// Secret input of party `owner`. Only the owner passes `Some(value)`.
    pub fn input(&mut self, owner: usize, value: Option<S::Field>) -> DRes<S> {
        let out = DRes::pending();
        self.append(NativeProtocol::Input {
            owner,
            value,
            out: out.clone(),
        });
        out
    }

    pub fn add(&mut self, lhs: &DRes<S>, rhs: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::Add {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            out: out.clone(),
        });
        out
    }

    pub fn sub(&mut self, lhs: &DRes<S>, rhs: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::Sub {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            out: out.clone(),
        });
        out
    }

    pub fn neg(&mut self, x: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::Neg {
            x: x.clone(),
            out: out.clone(),
        });
        out
    }

    /// Sum of any number of shared values in a single local protocol.
    pub fn sum(&mut self, terms: &[DRes<S>]) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::Sum {
            terms: terms.to_vec(),
            out: out.clone(),
        });
        out
    }

    /// `c + x` for public `c`.
    pub fn add_public(&mut self, c: &DRes<S::Field>, x: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::AddPublic {
            x: x.clone(),
            c: c.clone(),
            out: out.clone(),
        });
        out
    }

    /// `c * x` for public `c`.
    pub fn mul_public(&mut self, c: &DRes<S::Field>, x: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append_local(LocalProtocol::MulPublic {
            x: x.clone(),
            c: c.clone(),
            out: out.clone(),
        });
        out
    }

    /// `c - x` for public `c`.
    pub fn sub_from_public(&mut self, c: &DRes<S::Field>, x: &DRes<S>) -> DRes<S> {
        let c = c.clone();
        let x = x.clone();
        self.seq(move |seq| {
            let negated = seq.neg(&x);
            Ok(seq.add_public(&c, &negated))
        })
    }

    /// Product of two shared values. Requires one network round.
    pub fn mul(&mut self, lhs: &DRes<S>, rhs: &DRes<S>) -> DRes<S> {
        let out = DRes::pending();
        self.append(NativeProtocol::Mul {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            out: out.clone(),
        });
        out
    }

    /// Reveal value to all parties. Requires one network round.
    pub fn open(&mut self, x: &DRes<S>) -> DRes<S::Field> {
        let out = DRes::pending();
        self.append(NativeProtocol::Open {
            x: x.clone(),
            out: out.clone(),
        });
        out
    }

    /// Reveal value to `party` only. Every other party gets `None`.
    pub fn open_to(&mut self, x: &DRes<S>, party: usize) -> DRes<Option<S::Field>> {
        let out = DRes::pending();
        self.append(NativeProtocol::OpenTo {
            x: x.clone(),
            party,
            out: out.clone(),
        });
        out
    }

    /// Sharing of a secret uniformly random bit.
    pub fn random_bit(&mut self) -> DRes<S> {
        let out = DRes::pending();
        self.append(NativeProtocol::RandomBit { out: out.clone() });
        out
    }

    /// Sharing of a secret uniformly random field element.
    pub fn random_element(&mut self) -> DRes<S> {
        let out = DRes::pending();
        self.append(NativeProtocol::RandomElement { out: out.clone() });
        out
    }

    /// Sharings of `[r^-1, r, r^2, ..., r^len]` for a secret random non-zero `r`.
    pub fn exp_pipe(&mut self, len: usize) -> DRes<Vec<S>> {
        let out = DRes::pending();
        self.append(NativeProtocol::ExpPipe {
            len,
            out: out.clone(),
        });
        out
    }

    /// Sharing of one.
    pub fn one(&mut self) -> DRes<S> {
        self.known(S::Field::one())
    }
}

/// Force closure signature to be generic over the builder lifetime.
fn boxed_scope<S, F>(build: F) -> Box<ScopeFn<S>>
where
    S: MpcShare,
    F: FnOnce(&mut ProtocolBuilder<'_, S>) -> Result<Finisher, MpcError> + 'static,
{
    Box::new(build)
}
