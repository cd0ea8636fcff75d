//! Pipeline Coordinator and its supporting types: stage machine, cancellation, results.

pub mod cancel;
pub mod coordinator;
pub mod result;
pub mod stage;

pub use cancel::CancelSignal;
pub use coordinator::{PipelineSettings, WorkflowPipeline};
pub use result::{ExecutionResult, PlanResult, WorkflowFailure};
pub use stage::{IllegalTransition, Stage, StageMachine};
