//! Prompt templates for SQL generation
//!
//! Templates are plain data: a system instruction fixing the output format and
//! a user message embedding the schema DDL, the question and a constraint
//! list. Placeholders `{ddl}`, `{question}` and `{table}` are substituted in a
//! single pass, so text inside a substituted value is never re-expanded.

use serde::{Deserialize, Serialize};
use sqlgate_connect::ColumnInfo;

use crate::llm::Prompt;

const WAREHOUSE_SYSTEM: &str = "You generate STRICT Snowflake SQL for the provided schema. \
Return ONLY SQL, no commentary, no code fences. \
Use single quotes for string/date literals. \
When filtering by date, compare to a quoted date literal like '2025-05-28'. \
Always alias aggregates (e.g., SUM(UNITS_SOLD) AS TOTAL_UNITS).";

const WAREHOUSE_USER: &str = "Schema:
{ddl}

User question:
{question}

Constraints:
- Query ONLY the {table} table.
- If a channel is mentioned (e.g., Online), filter WHERE CHANNEL = 'Online'.
- If a specific date is mentioned, filter WHERE DATE = 'YYYY-MM-DD'.
- If a month is mentioned, use an explicit BETWEEN 'YYYY-MM-01' AND 'YYYY-MM-31' (or the correct end day).
- Use GROUP BY when aggregating by a dimension like CHANNEL.
- Return only the columns necessary to answer.
";

const EMBEDDED_SYSTEM: &str = "You generate STRICT DuckDB SQL for the provided schema. \
Return ONLY SQL, no commentary, no code fences. \
Use single quotes for string/date literals. \
Always alias aggregates (e.g., SUM(units) AS total_units).";

const EMBEDDED_USER: &str = "Schema:
{ddl}

User question:
{question}

Constraints:
- Query ONLY the table {table}.
- If a date or channel column exists, use it exactly as named.
- Use GROUP BY when aggregating by a dimension.
- Return only necessary columns.
";

/// Default fixed schema for the warehouse `ask` path
pub const DAILY_SALES_DDL: &str = "TABLE DAILY_SALES (
  SALES_ID INT,
  DATE DATE,
  PRODUCT_ID INT,
  ACCOUNT_ID INT,
  USER_ID INT,
  UNITS_SOLD INT,
  CHANNEL STRING,        -- 'Online', 'Hospital', ...
  SALES_TYPE STRING,     -- 'Primary','Secondary','Tertiary'
  DISTRIBUTOR_ID INT,
  CUSTOMER_ID INT,
  LOAD_DATE DATE,
  NET_PRICE FLOAT,
  UNIT_PRICE FLOAT
)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn warehouse() -> Self {
        Self {
            system: WAREHOUSE_SYSTEM.to_string(),
            user: WAREHOUSE_USER.to_string(),
        }
    }

    pub fn embedded() -> Self {
        Self {
            system: EMBEDDED_SYSTEM.to_string(),
            user: EMBEDDED_USER.to_string(),
        }
    }

    pub fn render(&self, table: &str, ddl: &str, question: &str) -> Prompt {
        let vars = [("table", table), ("ddl", ddl), ("question", question)];
        Prompt {
            system: substitute(&self.system, &vars),
            user: substitute(&self.user, &vars),
        }
    }
}

/// Both templates, overridable from config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub warehouse: PromptTemplate,
    pub embedded: PromptTemplate,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            warehouse: PromptTemplate::warehouse(),
            embedded: PromptTemplate::embedded(),
        }
    }
}

/// Target table and DDL for the warehouse `ask` path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSchema {
    pub table: String,
    pub ddl: String,
}

impl Default for FixedSchema {
    fn default() -> Self {
        Self {
            table: "DAILY_SALES".to_string(),
            ddl: DAILY_SALES_DDL.to_string(),
        }
    }
}

/// Column-level DDL for an introspected table
pub fn table_ddl(table: &str, columns: &[ColumnInfo]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("  {} {}", c.name, c.data_type))
        .collect::<Vec<_>>()
        .join("\n");
    format!("TABLE {} (\n{}\n)", table, body)
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
