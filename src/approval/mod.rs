//! Multi-level approval chain for loan applications

pub mod model;
pub mod service;
pub mod workflow;

pub use model::*;
pub use service::ApprovalWorkflowService;
pub use workflow::{next_level, ApprovalWorkflow, Transition, WorkflowError};
