//! Tool calls end to end: dispatcher, agent, guardrails and connectors

mod common;

use common::{dispatcher, duck, row, temp_file, total_units_row, CannedModel, StubWarehouse};
use serde_json::json;
use sqlgate_connect::Connector;
use sqlgate_server::{ConnectorRegistry, ToolResponse};
use std::sync::Arc;

const MAY_ONLINE_SQL: &str = "SELECT SUM(UNITS_SOLD) AS TOTAL_UNITS FROM DAILY_SALES \
WHERE CHANNEL = 'Online' AND DATE BETWEEN '2025-05-01' AND '2025-05-31'";

fn value(response: &ToolResponse) -> serde_json::Value {
    serde_json::to_value(response).unwrap()
}

#[tokio::test]
async fn test_ask_runs_sanitized_sql_on_warehouse() {
    let warehouse = StubWarehouse::new(vec![total_units_row()]);
    let model = CannedModel::new(&format!("```sql\n{MAY_ONLINE_SQL};\n```"));
    let sources = ConnectorRegistry::new().with(warehouse.clone()).with(duck());
    let tools = dispatcher(sources, model.clone());

    let response = tools
        .call("ask", json!({"question": "total units sold online in May 2025"}))
        .await;

    assert_eq!(
        value(&response),
        json!({
            "sql": MAY_ONLINE_SQL,
            "rows": [{"row": {"TOTAL_UNITS": 1234}}]
        })
    );

    let executed = warehouse.executed();
    assert_eq!(executed, vec![MAY_ONLINE_SQL.to_string()]);
    let sql = &executed[0];
    assert!(sql.contains("DAILY_SALES"));
    assert!(sql.contains("CHANNEL = 'Online'"));
    assert!(sql.contains("'2025-05-01'") && sql.contains("'2025-05-31'"));

    let prompt = model.last_prompt().unwrap();
    assert!(prompt.user.contains("total units sold online in May 2025"));
    assert!(prompt.user.contains("TABLE DAILY_SALES ("));
}

#[tokio::test]
async fn test_ask_mutation_is_blocked_before_execution() {
    let warehouse = StubWarehouse::new(vec![total_units_row()]);
    let model = CannedModel::new("WITH doomed AS (SELECT 1) DELETE FROM DAILY_SALES");
    let sources = ConnectorRegistry::new().with(warehouse.clone());
    let tools = dispatcher(sources, model);

    let response = tools.call("ask", json!({"question": "wipe it"})).await;

    assert_eq!(
        value(&response),
        json!({
            "error": "Guardrail blocked: mutating statements are not allowed",
            "sql": "WITH doomed AS (SELECT 1) DELETE FROM DAILY_SALES"
        })
    );
    assert!(warehouse.executed().is_empty());
    assert!(tools
        .telemetry()
        .render()
        .contains("sqlgate_guardrail_blocks_total{reason=\"mutation\"} 1"));
}

#[tokio::test]
async fn test_ask_comment_is_blocked() {
    let warehouse = StubWarehouse::new(vec![]);
    let model = CannedModel::new("SELECT * FROM DAILY_SALES -- everything");
    let sources = ConnectorRegistry::new().with(warehouse.clone());
    let tools = dispatcher(sources, model);

    let response = tools.call("ask", json!({"question": "all rows"})).await;
    assert!(response.is_error());
    assert_eq!(
        value(&response)["error"],
        "Guardrail blocked: comments not allowed"
    );
    assert!(warehouse.executed().is_empty());
}

#[tokio::test]
async fn test_ask_without_question_never_reaches_model() {
    let model = CannedModel::new("SELECT 1 FROM DAILY_SALES");
    let sources = ConnectorRegistry::new().with(StubWarehouse::new(vec![]));
    let tools = dispatcher(sources, model.clone());

    let response = tools.call("ask", json!({"question": "   "})).await;
    assert_eq!(
        value(&response),
        json!({"error": "Missing required field 'question' for tool 'ask'"})
    );
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_question_reaches_the_model_verbatim() {
    let model = CannedModel::new("SELECT 1 AS n FROM DAILY_SALES");
    let sources = ConnectorRegistry::new().with(StubWarehouse::new(vec![]));
    let tools = dispatcher(sources, model.clone());

    let question = "  units for\n  'Online'  ";
    tools.call("ask", json!({ "question": question })).await;

    let prompt = model.last_prompt().unwrap();
    assert!(prompt.user.contains(question));
}

#[tokio::test]
async fn test_register_then_ask_registered_table() {
    let csv = temp_file("csv", "region,units\nnorth,10\nsouth,5\nnorth,7\n");
    let uri = csv.to_string_lossy().to_string();
    let model = CannedModel::new(
        "SELECT region, SUM(units) AS total_units FROM sales_s3 GROUP BY region ORDER BY region",
    );
    let sources = ConnectorRegistry::new().with(StubWarehouse::new(vec![])).with(duck());
    let tools = dispatcher(sources, model.clone());

    let registered = tools
        .call(
            "register_s3_table",
            json!({"name": "sales_s3", "uri": uri, "format": "csv"}),
        )
        .await;
    let registered = value(&registered);
    assert_eq!(registered["status"], "registered");
    assert_eq!(registered["name"], "sales_s3");
    assert_eq!(registered["format"], "csv");
    assert_eq!(registered["columns"][0]["name"], "region");

    let response = tools
        .call(
            "ask_s3",
            json!({"table": "sales_s3", "question": "units by region"}),
        )
        .await;
    assert_eq!(
        value(&response)["rows"],
        json!([
            {"row": {"region": "north", "total_units": 17}},
            {"row": {"region": "south", "total_units": 5}}
        ])
    );

    // The prompt carried the introspected columns, not the warehouse DDL
    let prompt = model.last_prompt().unwrap();
    assert!(prompt.user.contains("TABLE sales_s3 ("));
    assert!(prompt.user.contains("  units "));
    assert!(!prompt.user.contains("DAILY_SALES"));

    std::fs::remove_file(csv).ok();
}

#[tokio::test]
async fn test_reregistering_a_table_replaces_it() {
    let first = temp_file("csv", "region,units\nnorth,1\n");
    let second = temp_file("csv", "region,units\nwest,40\neast,2\n");
    let model = CannedModel::new("SELECT COUNT(*) AS n FROM sales_s3");
    let sources = ConnectorRegistry::new().with(duck());
    let tools = dispatcher(sources, model);

    for path in [&first, &second] {
        let response = tools
            .call(
                "register_s3_table",
                json!({"name": "sales_s3", "uri": path.to_string_lossy()}),
            )
            .await;
        assert!(!response.is_error(), "{response:?}");
    }

    let response = tools
        .call("ask_s3", json!({"table": "sales_s3", "question": "how many rows"}))
        .await;
    assert_eq!(value(&response)["rows"], json!([{"row": {"n": 2}}]));

    let tables = tools.call("discover_tables", json!({"source": "s3"})).await;
    assert_eq!(value(&tables)["tables"], json!(["sales_s3"]));

    std::fs::remove_file(first).ok();
    std::fs::remove_file(second).ok();
}

#[tokio::test]
async fn test_ask_unregistered_table() {
    let model = CannedModel::new("SELECT * FROM ghost");
    let sources = ConnectorRegistry::new().with(duck());
    let tools = dispatcher(sources, model.clone());

    let response = tools
        .call("ask_s3", json!({"table": "ghost", "question": "anything"}))
        .await;
    let error = value(&response)["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("Unknown table 'ghost'. Did you call register_s3_table?"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_ask_s3_scope_violation() {
    let csv = temp_file("csv", "a\n1\n");
    let model = CannedModel::new("SELECT * FROM other_table");
    let sources = ConnectorRegistry::new().with(duck());
    let tools = dispatcher(sources, model);

    tools
        .call(
            "register_s3_table",
            json!({"name": "events", "uri": csv.to_string_lossy()}),
        )
        .await;
    let response = tools
        .call("ask_s3", json!({"table": "events", "question": "everything"}))
        .await;
    assert_eq!(
        value(&response),
        json!({
            "error": "Guardrail blocked: must query specified table",
            "sql": "SELECT * FROM other_table"
        })
    );

    std::fs::remove_file(csv).ok();
}

#[tokio::test]
async fn test_calc_kpi() {
    let warehouse = StubWarehouse::new(vec![row(json!({"VALUE": 99.5}))]);
    let sources = ConnectorRegistry::new().with(warehouse.clone());
    let tools = dispatcher(sources, CannedModel::new(""));

    let response = tools.call("calc_kpi", json!({"metric": "net_revenue"})).await;
    assert_eq!(value(&response), json!([{"row": {"VALUE": 99.5}}]));
    assert_eq!(
        warehouse.executed(),
        vec![
            "SELECT SUM(price * qty) - SUM(discount) AS VALUE FROM snowflake.sales_orders \
             WHERE status = 'ClosedWon'"
                .to_string()
        ]
    );

    let response = tools.call("calc_kpi", json!({"metric": "churn"})).await;
    assert_eq!(value(&response), json!({"error": "Unknown metric: churn"}));
}

#[tokio::test]
async fn test_query_pass_through_and_backend_error() {
    let sources = ConnectorRegistry::new().with(duck());
    let tools = dispatcher(sources, CannedModel::new(""));

    let response = tools
        .call("query", json!({"source": "s3", "sql": "SELECT 42 AS answer"}))
        .await;
    assert_eq!(value(&response), json!([{"row": {"answer": 42}}]));

    let response = tools
        .call("query", json!({"source": "s3", "sql": "SELECT * FROM missing_table"}))
        .await;
    let body = value(&response);
    assert!(body["error"].as_str().unwrap().contains("missing_table"));
    assert_eq!(body["sql"], "SELECT * FROM missing_table");

    let response = tools
        .call("query", json!({"source": "warehouse", "sql": "SELECT 1"}))
        .await;
    assert_eq!(
        value(&response),
        json!({"error": "Connector 'warehouse' not registered. Available: [\"s3\"]"})
    );
}

#[tokio::test]
async fn test_discovery_tools() {
    let warehouse: Arc<dyn Connector> = StubWarehouse::new(vec![]);
    let sources = ConnectorRegistry::new().with(warehouse).with(duck());
    let tools = dispatcher(sources, CannedModel::new(""));

    let sources = tools.call("discover_sources", json!({})).await;
    assert_eq!(value(&sources), json!({"sources": ["snowflake", "s3"]}));

    let metrics = tools.call("list_metrics", json!({})).await;
    assert_eq!(value(&metrics), json!({"metrics": ["net_revenue"]}));

    let tables = tools
        .call("discover_tables", json!({"source": "snowflake"}))
        .await;
    assert_eq!(
        value(&tables),
        json!({
            "source": "snowflake",
            "capabilities": {"dialect": "snowflake", "streaming": true, "formats": []},
            "tables": ["DAILY_SALES"]
        })
    );
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let model = CannedModel::new("SELECT 1 FROM DAILY_SALES");
    let sources = ConnectorRegistry::new().with(StubWarehouse::panicking());
    let tools = dispatcher(sources, model);

    let response = tools.call("ask", json!({"question": "boom"})).await;
    assert_eq!(value(&response), json!({"error": "internal error"}));

    // The dispatcher keeps serving afterwards
    let response = tools.call("list_metrics", json!({})).await;
    assert!(!response.is_error());
}
