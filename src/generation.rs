//! Model-driven generation: the structure and formula generators, their fixed instruction
//! templates, and bounded retry around completion calls.

pub mod formula;
pub mod prompts;
pub mod retry;
pub mod structure;

pub use formula::{filter_formulas, parse_formulas, FormulaGenerator, FormulaOutcome};
pub use retry::RetryPolicy;
pub use structure::{parse_structure, StructureGenerator};
