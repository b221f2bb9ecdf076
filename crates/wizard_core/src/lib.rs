pub mod client_search;
pub mod debounce;
pub mod error;
pub mod event_bus;
pub mod navigation;
pub mod session;
pub mod transport;
pub mod wizard;
pub mod workflow;

pub use client_search::{ClientSearch, SearchStatus};
pub use debounce::{DebounceConfig, DebounceStatus, DebouncedAction};
pub use error::{NavigationError, SessionError, WizardError};
pub use event_bus::{event_types, handler_fn, DomainEvent, EventBus, EventHandler, Subscription};
pub use navigation::{Advance, Progress, Retreat, StepDescriptor, StepNavigator, ValidationErrors};
pub use session::{Ownership, SessionCoordinator, SessionPhase};
pub use transport::HttpWorkflowService;
pub use wizard::{
    ClientCreation, ItemOutcome, OrderWizard, Readiness, StepOutcome, WizardConfig, WizardStatus,
};
pub use workflow::{ClientDirectory, UnavailableWorkflowService, WorkflowService};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
