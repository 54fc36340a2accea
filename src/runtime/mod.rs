/// Runtime orchestrator module - Gateway

mod orchestrator;

pub use orchestrator::{build_transport, Orchestrator};
