//! Machine definition and runtime record types.

mod annotation;
mod checkpoint;
mod machine_definition;
#[cfg(test)]
mod machine_definition_test;
mod machine_edge;
mod machine_node;
mod node_type;
#[cfg(test)]
mod node_type_test;
mod path_cursor;
mod run_result;
mod task_outcome;
mod transition_record;

pub use annotation::{Annotation, AnnotationSet, DispatchMode};
pub use checkpoint::Checkpoint;
pub use machine_definition::MachineDefinition;
pub use machine_edge::{ArrowKind, ConditionClause, EdgeCondition, MachineEdge};
pub use machine_node::MachineNode;
pub use node_type::NodeType;
pub use path_cursor::{PathCursor, PathId, PathStatus};
pub use run_result::{RunResult, RunStatus};
pub use task_outcome::{OutcomeStatus, TaskOutcome};
pub use transition_record::TransitionRecord;
