//! Shared data model: workflow states, work items, work types, and
//! custom-field values.

pub mod state;
pub mod value;
pub mod work;
pub mod work_type;

pub use state::WorkflowState;
pub use value::{CustomFieldValue, ValueKind};
pub use work::{Status, WorkItem};
pub use work_type::{AttributeSchema, SchemaError, WorkType};
