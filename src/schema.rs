//! Workflow schema domain: the validated data model, the loosely-typed decode layer for model
//! output, and the validator that turns one into the other.

pub mod extract;
pub mod raw;
pub mod types;
pub mod validator;

pub use extract::extract_json;
pub use raw::{RawColumn, RawColumnDetail, RawFlowStructure, RawFormula, RawSheet};
pub use types::{
    ColumnSpec, ColumnType, FlowStructure, FormulaDefinition, FormulaPlan, RejectedFormula,
    SheetSpec,
};
pub use validator::{validate_structure, validate_value};
