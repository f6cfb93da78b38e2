//! Acquisition state machine
//!
//! One [`AcquisitionContext`] per `acquire` call:
//! IDLE → ACQUIRING → {READY, FAILED}

use crate::types::ContentRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcquisitionState {
    /// Created, nothing started
    Idle,
    /// Discovery, image lookup, quote and downloads in flight
    Acquiring,
    /// Bundle returned to the caller
    Ready,
    /// Terminal failure; every file of the attempt has been removed
    Failed,
}

impl AcquisitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionState::Ready | AcquisitionState::Failed)
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub acquisition_id: Uuid,
    pub old_state: AcquisitionState,
    pub new_state: AcquisitionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Per-call acquisition context
///
/// Passed explicitly into the assembler instead of living in shared state,
/// so concurrent acquisitions stay independent.
#[derive(Debug, Clone)]
pub struct AcquisitionContext {
    pub acquisition_id: Uuid,
    pub request: ContentRequest,
    pub state: AcquisitionState,
    pub transitions: Vec<StateTransition>,
    /// Id of the bundle produced, once READY
    pub bundle_id: Option<Uuid>,
    /// Failure message, once FAILED
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AcquisitionContext {
    pub fn new(request: ContentRequest) -> Self {
        Self {
            acquisition_id: Uuid::new_v4(),
            request,
            state: AcquisitionState::Idle,
            transitions: Vec::new(),
            bundle_id: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: AcquisitionState) -> &StateTransition {
        let transition = StateTransition {
            acquisition_id: self.acquisition_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        self.transitions.push(transition);
        &self.transitions[self.transitions.len() - 1]
    }

    /// Mark READY with the produced bundle
    pub fn complete(&mut self, bundle_id: Uuid) {
        self.bundle_id = Some(bundle_id);
        self.transition_to(AcquisitionState::Ready);
    }

    /// Mark FAILED with a message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.transition_to(AcquisitionState::Failed);
    }

    /// Elapsed time since creation (or until the terminal state)
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}
