//! `sqlgate`: call one tool on a running sqlgate server
//!
//! ```bash
//! sqlgate ask total units sold online in May 2025
//! sqlgate calc_kpi --payload '{"metric": "net_revenue"}'
//! sqlgate register_s3_table --payload '{"name": "sales_s3", "uri": "s3://bucket/sales.parquet"}'
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};

const DEFAULT_URL: &str = "http://localhost:8000";

#[derive(Debug, Parser)]
#[command(name = "sqlgate", version, about = "Call a sqlgate tool over HTTP")]
struct Cli {
    /// Tool to call (e.g. ask, ask_s3, query, calc_kpi)
    tool: String,

    /// Plain-text question, used by `ask`
    question: Vec<String>,

    /// Explicit JSON payload
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Base URL of the server
    #[arg(long, env = "SQLGATE_URL", default_value = DEFAULT_URL)]
    url: String,
}

impl Cli {
    fn payload(&self) -> Value {
        if self.tool == "ask" && !self.question.is_empty() {
            let mut payload = Map::new();
            payload.insert(
                "question".to_string(),
                Value::String(self.question.join(" ")),
            );
            return Value::Object(payload);
        }

        match serde_json::from_str::<Value>(&self.payload) {
            Ok(value @ Value::Object(_)) => value,
            _ => Value::Object(Map::new()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/mcp/tools/{}", self.url.trim_end_matches('/'), self.tool)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let endpoint = cli.endpoint();

    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&cli.payload())
        .send()
        .await
        .with_context(|| format!("calling {endpoint}"))?;

    let status = response.status();
    let text = response.text().await.context("reading response body")?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => {
            println!("HTTP {}", status.as_u16());
            println!("Server returned non-JSON response:");
            println!("{text}");
        }
    }
    Ok(())
}
