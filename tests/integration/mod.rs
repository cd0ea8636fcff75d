//! Integration tests module
//!
//! Pipeline runs drive the real generators, materializer and project store against the
//! scripted doubles in `test_utils`.

pub mod documentation_roundtrip;
pub mod pipeline_flow;
pub mod schema_validation;
pub mod test_utils;
