//! # dygram-engine
//!
//! Execution engine for DyGram state machines: graphs of typed nodes joined by conditional,
//! annotated edges, interpreted step by step with an evolving execution context.
//!
//! ## Architecture
//!
//! - `expression`: the embedded condition and template language.
//! - `condition` and `type_resolver`: pure functions that read edge conditions and node roles
//!   out of a definition.
//! - `topology`: the resolved, indexed view of a definition (names, modules, context grants).
//! - `context`: the mutable, access-checked state shared by every path.
//! - `safety`, `scheduler` and `coordinator`: step budgets and circuit breakers, edge selection
//!   and barriers, failure policy.
//! - `engine`: the driver loop advancing explicit path records, one round per step.
//! - `delegate` and `meta_tools`: the outward seams (task execution, self-inspection and
//!   modification).

pub mod checkpoint_io;
pub mod condition;
#[cfg(test)]
mod condition_test;
pub mod config;
pub mod context;
#[cfg(test)]
mod context_test;
pub mod coordinator;
pub mod delegate;
pub mod engine;
pub mod error;
pub mod expression;
pub mod meta_tools;
pub mod safety;
pub mod scheduler;
pub mod topology;
pub mod type_resolver;
pub mod types;

pub use config::{EngineConfig, ErrorPolicy};
pub use delegate::{CommandDelegate, EchoDelegate, TaskDelegate, TaskRequest};
pub use engine::{Engine, StepReport};
pub use error::{EngineError, ErrorKind, RunError};
pub use expression::{Scope, evaluate, evaluate_condition};
pub use meta_tools::MetaTools;
pub use types::{MachineDefinition, MachineEdge, MachineNode, NodeType, RunResult, RunStatus};
