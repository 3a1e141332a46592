// Domain Layer - Pure data model of one supervised run

pub mod error;
pub mod finding;
pub mod invocation;
pub mod run;
pub mod state;

// Re-exports
pub use error::DomainError;
pub use finding::{Finding, FindingKind};
pub use invocation::{Invocation, SupervisorConfig};
pub use run::{RunResult, RunStatus};
pub use state::SupervisorState;
