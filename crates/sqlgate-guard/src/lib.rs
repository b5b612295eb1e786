//! Post-generation SQL hygiene
//!
//! Two stages sit between a language model's raw answer and the connector
//! that runs it:
//! - [`sanitize`] turns free-form model output into a single bare statement
//! - [`GuardrailPolicy`] applies textual safety checks to that statement
//!
//! Neither stage parses SQL. Both are substring heuristics meant to stop
//! accidental scope creep, not a determined adversary.

mod guardrail;
mod sanitize;

pub use guardrail::{GuardrailPolicy, Violation, COMMENT_MARKERS, MUTATION_TOKENS};
pub use sanitize::sanitize;
