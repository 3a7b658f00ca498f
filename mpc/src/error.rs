use std::io;

use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a multi-party session.
#[derive(Debug, Error)]
pub enum MpcError {
    /// Another party deviated from the protocol. Never retry the session without re-keying.
    #[error("malicious behavior detected: {0}")]
    MaliciousBehavior(#[from] MaliciousError),

    /// Preprocessed material ran out. Usually means too little material was generated.
    #[error("preprocessed material exhausted: {0}")]
    ResourceExhaustion(String),

    /// Channel to another party failed or timed out.
    #[error(transparent)]
    Network(#[from] TransportError),

    /// Calling code broke an API contract.
    #[error("contract violation: {0}")]
    ProgrammingContract(String),

    /// Operation exists in the API but has no implementation.
    #[error("operation not implemented: {0}")]
    Unimplemented(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MpcError {
    /// Shorthand for a contract violation.
    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        Self::ProgrammingContract(msg.into())
    }

    /// Was the failure caused by an adversarial party?
    pub fn is_malicious(&self) -> bool {
        matches!(self, Self::MaliciousBehavior(_))
    }

    /// Error that later calls on a session report after it failed with `self`.
    /// Contract violations leave the session usable.
    pub(crate) fn session_failure(&self) -> Option<MpcError> {
        match self {
            Self::ProgrammingContract(_) => None,
            Self::MaliciousBehavior(_) => Some(MaliciousError::SessionAborted.into()),
            Self::ResourceExhaustion(msg) => Some(Self::ResourceExhaustion(msg.clone())),
            Self::Network(err) => Some(Self::Network(err.clone())),
            Self::Unimplemented(name) => Some(Self::Unimplemented(name)),
            Self::Io(err) => Some(Self::Io(io::Error::new(err.kind(), err.to_string()))),
        }
    }
}

/// Kinds of detected cheating.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MaliciousError {
    #[error("MAC check on opened values failed")]
    MacCheckFailed,

    #[error("party {0} opened a commitment to a different value")]
    CommitmentMismatch(usize),

    #[error("parties received inconsistent broadcast values")]
    InconsistentBroadcast,

    #[error("party {0} sent a malformed message")]
    MalformedMessage(usize),

    #[error("session was aborted by an earlier failed check")]
    SessionAborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_failure() {
        assert!(MpcError::contract("bad index").session_failure().is_none());
        assert!(matches!(
            MpcError::from(MaliciousError::MacCheckFailed).session_failure(),
            Some(MpcError::MaliciousBehavior(MaliciousError::SessionAborted))
        ));
        assert!(matches!(
            MpcError::from(TransportError::Timeout(2)).session_failure(),
            Some(MpcError::Network(TransportError::Timeout(2)))
        ));
        let failure = MpcError::ResourceExhaustion("beaver triples".into()).session_failure();
        assert!(matches!(
            failure,
            Some(MpcError::ResourceExhaustion(msg)) if msg == "beaver triples"
        ));
    }
}
