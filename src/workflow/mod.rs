pub mod campaign_workflow;
pub mod change_detector;
pub mod connection_polling;
pub mod graph;
pub mod lead_workflow;
pub mod monitor_workflow;
pub mod runtime;
pub mod signals;
pub mod time_window;
pub mod timer;

pub use graph::{Edge, Node, RestrictedGraph, WorkflowDefinition};
pub use runtime::{Runtime, SharedRuntime, WorkflowHandle};
pub use signals::Signal;
