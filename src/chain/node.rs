// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Type-erased continuations stored in a chain's node list.
//!
//! The typed builder in [`crate::chain::Chain`] wraps every user closure so that the
//! walker can drive a heterogeneous sequence of steps with a single value type,
//! [`Payload`]. Downcasts happen inside those wrappers, where the static types are
//! still known, so a mismatch there is an engine bug rather than a user error.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::chain::settler::SettleSlot;
use crate::engine::registry::Registration;
use crate::engine::root_state::{ChainId, RootState};
use crate::errors::{ChainError, Rejection};

/// A value moving down the success path.
pub type Payload = Box<dyn Any + Send>;

/// What flows between nodes while a chain is walked.
pub(crate) enum Signal {
    Value(Payload),
    Rejected(Rejection),
}

/// What a value-producing continuation handed back to the walker.
pub(crate) enum Step {
    Value(Payload),
    Chained(ChainParts),
}

pub(crate) type StepResult = Result<Step, Rejection>;

pub(crate) type SuccessFn = Box<dyn FnOnce(Payload) -> StepResult + Send>;
pub(crate) type SuccessVoidFn = Box<dyn FnOnce(Payload) -> Result<(), Rejection> + Send>;
pub(crate) type FailureFn = Box<dyn FnOnce(Rejection) -> StepResult + Send>;
pub(crate) type FailureVoidFn = Box<dyn FnOnce(Rejection) -> Result<Payload, Rejection> + Send>;
pub(crate) type LiftFn = Box<dyn FnOnce(Payload) -> Payload + Send>;
pub(crate) type FinishFn = Box<dyn FnOnce() + Send>;

/// Where an entry function's settler deposits its single outcome.
pub(crate) struct SettleTarget {
    pub(crate) chain_id: ChainId,
    pub(crate) slot: Arc<Mutex<SettleSlot>>,
}

pub(crate) type EntryFn = Box<dyn FnOnce(SettleTarget) + Send>;

/// One continuation in a chain.
///
/// * `OnSuccess` - runs on a value, may yield a nested chain
/// * `OnSuccessVoid` - runs on a value, the chain continues with `()`
/// * `OnFailure` - runs on a rejection, its result resumes the success path
/// * `OnFailureVoid` - runs on a rejection and resumes with "no value"; on the success
///   path `lift` re-wraps the passing value
/// * `OnFinish` - the terminal node, runs on either path
pub(crate) enum Node {
    OnSuccess(SuccessFn),
    OnSuccessVoid(SuccessVoidFn),
    OnFailure(FailureFn),
    OnFailureVoid { handler: FailureVoidFn, lift: LiftFn },
    OnFinish(FinishFn),
}

impl Node {
    pub(crate) fn is_failure_handler(&self) -> bool {
        matches!(self, Node::OnFailure(_) | Node::OnFailureVoid { .. })
    }
}

/// Everything a chain owns before it is walked.
///
/// Dropping the parts of a chain that never ran removes it from the in-flight registry.
pub(crate) struct ChainParts {
    pub(crate) root: Arc<RootState>,
    pub(crate) entry: EntryFn,
    pub(crate) nodes: Vec<Node>,
    pub(crate) has_failure_handler: bool,
    pub(crate) registration: Registration,
}

impl ChainParts {
    pub(crate) fn push(&mut self, node: Node) {
        self.has_failure_handler |= node.is_failure_handler();
        self.nodes.push(node);
    }
}

/// Recover the concrete value from a payload produced by a typed wrapper.
pub(crate) fn take_payload<T: 'static>(payload: Payload) -> Result<T, Rejection> {
    payload.downcast::<T>().map(|value| *value).map_err(|_| {
        Rejection::from(ChainError::InvalidState(format!(
            "continuation expected a value of type {}",
            std::any::type_name::<T>()
        )))
    })
}
