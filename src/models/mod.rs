pub mod conversion;
pub mod document;
pub mod identity;
pub mod table;
pub mod workflow_state;

pub use conversion::{ConversionOutcome, ConversionResult};
pub use document::DocumentDescriptor;
pub use identity::EmployeeIdentity;
pub use table::{TableCell, TableLink, TableRow};
pub use workflow_state::{NavigationPhase, WorkflowState, WorkflowStep, WORKFLOW_SCHEMA_VERSION};
