pub mod context;
pub mod error;
pub mod executor;
pub mod gate;
pub mod incident;
pub mod notify;
pub mod orchestrator;
pub mod planner;
pub mod postmortem;
pub mod reasoner;
pub mod store;
