//! Crate-wide error type for the verification engine.
//!
//! A flat `derive_more` enum for the engine's semantic failure modes,
//! converted to a `problemo::Problem` at the library boundary via
//! `.gloss()` rather than threaded through every internal signature.

use derive_more::{Display, Error};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

use crate::I;

#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum EngineError {
    /// A query's initial bounds are contradictory before any split is made.
    #[display("query is infeasible: {_0}")]
    InfeasibleQuery(String),

    /// The tableau's basis matrix failed to invert or is the wrong shape.
    #[display("malformed basis")]
    MalformedBasis,

    /// A variable participates in the tableau with no finite bound on either side.
    #[display("variable {_0} is unbounded")]
    UnboundedVariable(I),

    /// An equation was given a relational type that isn't equality after slack conversion.
    #[display("equation {_0} is not an equality constraint")]
    NonEqualityEquation(I),

    /// A `Vec`/`HashMap` growth failed to reserve capacity.
    #[display("allocation failed")]
    AllocationFailure,

    /// A subquery could not be pushed onto the work queue.
    #[display("failed to push subquery {_0} onto the work queue")]
    QueueFailure(u64),

    /// Push to the work queue failed after the queue reported space available.
    #[display("unsuccessful queue push for subquery {_0}")]
    UnsuccessfulQueuePush(u64),

    /// A restored basic assignment disagrees with a direct recomputation beyond tolerance.
    #[display("debugging mismatch: {_0}")]
    DebuggingMismatch(String),

    /// Precision restoration failed to bring the degradation measure back under tolerance.
    #[display("restoration failed after {_0} attempts")]
    RestorationFailed(u32),

    /// Catch-all for ad hoc failures that don't warrant their own variant.
    #[display("{_0}")]
    Other(String),
}

impl EngineError {
    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self::InfeasibleQuery(reason.into())
    }
}

impl From<EngineError> for Problem {
    fn from(err: EngineError) -> Self {
        err.to_string().gloss()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
