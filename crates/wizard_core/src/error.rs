use shared::{
    acquisition::UnmappedAcquisitionSource,
    domain::{Stage, WizardStep},
};
use thiserror::Error;

use crate::navigation::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session initialization failed for stage {stage}: {message}")]
    InitializeFailed { stage: Stage, message: String },
    #[error("session initialization for stage {stage} was superseded")]
    Superseded { stage: Stage },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("cannot jump forward from {current} to {requested}")]
    ForwardJump { requested: String, current: String },
    #[error("step {0} is not part of this sequence")]
    UnknownStep(String),
    #[error("current step {current} has not signalled readiness for completion")]
    NotReadyForCompletion { current: String },
    #[error("a step sequence needs at least one step")]
    EmptySequence,
    #[error("step {0} appears more than once")]
    DuplicateStep(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Acquisition(#[from] UnmappedAcquisitionSource),
    #[error("{operation} failed for stage {stage}: {source:#}")]
    Remote {
        stage: Stage,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("unexpected {stage} payload: {message}")]
    Payload { stage: Stage, message: String },
    #[error("no item is in progress")]
    NoItemInProgress,
    #[error("{operation} is not available at step {current}")]
    StepUnavailable {
        operation: &'static str,
        current: WizardStep,
    },
    #[error("wizard cannot be completed from step {0}")]
    NotReady(String),
    #[error("step {step} no longer validates")]
    Incomplete {
        step: WizardStep,
        errors: ValidationErrors,
    },
}

impl WizardError {
    pub(crate) fn remote(stage: Stage, operation: &'static str, source: anyhow::Error) -> Self {
        Self::Remote {
            stage,
            operation,
            source,
        }
    }
}
