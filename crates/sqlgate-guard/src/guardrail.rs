//! Guardrail evaluation for generated SQL
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. scope: the candidate must mention the target table
//! 2. mutation: write/DDL keywords are rejected (fixed-schema path only)
//! 3. comments: any comment marker is rejected

use thiserror::Error;

/// Space-delimited so identifiers such as `DROPPED` or `UPDATED_AT` do not match.
pub const MUTATION_TOKENS: &[&str] = &[" DROP ", " DELETE ", " UPDATE ", " INSERT "];

/// Line and block comment markers.
pub const COMMENT_MARKERS: &[&str] = &["--", "/*", "*/"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Guardrail blocked: must query {table} only")]
    FixedScope { table: String },

    #[error("Guardrail blocked: must query specified table")]
    TableScope { table: String },

    #[error("Guardrail blocked: mutating statements are not allowed")]
    Mutation { token: String },

    #[error("Guardrail blocked: comments not allowed")]
    Comment { marker: String },
}

impl Violation {
    /// Short label used for logging and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Violation::FixedScope { .. } | Violation::TableScope { .. } => "scope",
            Violation::Mutation { .. } => "mutation",
            Violation::Comment { .. } => "comment",
        }
    }
}

/// Which table the candidate is confined to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    /// Fixed warehouse schema; containment is checked against the uppercased candidate.
    Fixed(String),
    /// A table registered at runtime; containment is checked case-insensitively.
    Registered(String),
}

#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    scope: Scope,
    reject_mutations: bool,
}

impl GuardrailPolicy {
    /// Policy for the fixed-schema path: scope, mutation and comment checks.
    pub fn fixed_schema(table: impl Into<String>) -> Self {
        Self {
            scope: Scope::Fixed(table.into()),
            reject_mutations: true,
        }
    }

    /// Policy for a registered table: scope and comment checks.
    pub fn registered_table(table: impl Into<String>) -> Self {
        Self {
            scope: Scope::Registered(table.into()),
            reject_mutations: false,
        }
    }

    /// Run every check against a sanitized candidate, stopping at the first violation.
    pub fn evaluate(&self, sql: &str) -> Result<(), Violation> {
        let upper = sql.to_uppercase();

        self.check_scope(sql, &upper)?;
        if self.reject_mutations {
            check_mutations(&upper)?;
        }
        check_comments(sql)?;

        tracing::debug!(scope = ?self.scope, "guardrails passed");
        Ok(())
    }

    fn check_scope(&self, sql: &str, upper: &str) -> Result<(), Violation> {
        match &self.scope {
            Scope::Fixed(table) => {
                if !upper.contains(&table.to_uppercase()) {
                    return Err(Violation::FixedScope {
                        table: table.clone(),
                    });
                }
            }
            Scope::Registered(table) => {
                if !sql.to_lowercase().contains(&table.to_lowercase()) {
                    return Err(Violation::TableScope {
                        table: table.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_mutations(upper: &str) -> Result<(), Violation> {
    match MUTATION_TOKENS.iter().find(|tok| upper.contains(*tok)) {
        Some(tok) => Err(Violation::Mutation {
            token: tok.trim().to_string(),
        }),
        None => Ok(()),
    }
}

fn check_comments(sql: &str) -> Result<(), Violation> {
    match COMMENT_MARKERS.iter().find(|marker| sql.contains(*marker)) {
        Some(marker) => Err(Violation::Comment {
            marker: marker.to_string(),
        }),
        None => Ok(()),
    }
}
