//! End-to-end pipeline tests against the mock LLM and fixture database.

use nlq_gateway::db::{DatabaseClient, MockDatabaseClient, Value};
use nlq_gateway::llm::{LlmResponse, MockLlmClient, ToolCall};
use nlq_gateway::response::ChartType;
use nlq_gateway::safety::ExecutionPolicy;
use nlq_gateway::{Gateway, GatewayResponse, Intent};

fn mock_gateway() -> Gateway {
    Gateway::new(
        Box::new(MockLlmClient::new()),
        Box::new(MockDatabaseClient::with_inventory_fixture()),
    )
}

#[tokio::test]
async fn visualize_query_produces_category_chart() {
    let gateway = mock_gateway();
    let response = gateway
        .handle("Show me the count of products by category")
        .await
        .unwrap();

    let GatewayResponse::Chart(chart) = response else {
        panic!("expected a chart result");
    };

    assert!(matches!(
        chart.chart_type,
        ChartType::Bar | ChartType::Pie | ChartType::Donut
    ));
    assert_eq!(chart.data.len(), 4);
    assert!(chart
        .data
        .iter()
        .all(|row| row.contains_key(&chart.x_axis_key)));
    for key in &chart.y_axis_keys {
        assert!(chart.data.iter().all(|row| row.contains_key(key)));
    }
}

#[tokio::test]
async fn search_query_lists_every_user() {
    let db = MockDatabaseClient::with_inventory_fixture();
    let expected_rows = db
        .execute_query("SELECT * FROM users")
        .await
        .unwrap()
        .row_count;

    let gateway = Gateway::new(Box::new(MockLlmClient::new()), Box::new(db));
    let response = gateway.handle("List all the users").await.unwrap();

    let GatewayResponse::Tabular(tabular) = response else {
        panic!("expected a tabular result");
    };

    assert_eq!(tabular.content.len(), expected_rows);
    assert!(!tabular.message.is_empty());
}

#[tokio::test]
async fn fenced_llm_output_recovers_through_fallback() {
    let gateway = Gateway::new(
        Box::new(MockLlmClient::new().with_fenced_json()),
        Box::new(MockDatabaseClient::with_inventory_fixture()),
    );

    // Classification would also come back fenced, so force the intent.
    let response = gateway
        .handle_with_intent("Show me the count of products by category", Intent::Visualize)
        .await
        .unwrap();

    assert_eq!(response.kind(), "chart");
}

#[tokio::test]
async fn read_only_gateway_refuses_destructive_sql() {
    let llm = MockLlmClient::with_responses(vec![
        LlmResponse::text(r#"{"value": "SEARCH"}"#),
        LlmResponse::with_tool_calls(
            String::new(),
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql".to_string(),
                arguments: serde_json::json!({"query": "DELETE FROM users"}).to_string(),
            }],
        ),
    ]);
    let gateway = Gateway::new(
        Box::new(llm),
        Box::new(MockDatabaseClient::with_inventory_fixture()),
    );

    let err = gateway.handle("Remove all the users").await.unwrap_err();
    assert!(err.to_string().contains("read-only"));
}

#[tokio::test]
async fn read_write_gateway_runs_destructive_sql() {
    let llm = MockLlmClient::with_responses(vec![
        LlmResponse::text(r#"{"value": "SEARCH"}"#),
        LlmResponse::with_tool_calls(
            String::new(),
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql".to_string(),
                arguments: serde_json::json!({"query": "DELETE FROM users"}).to_string(),
            }],
        ),
        LlmResponse::text("All users deleted."),
        LlmResponse::text(
            r#"{"message": "All users deleted.", "query": "Remove all the users", "content": []}"#,
        ),
    ]);
    let gateway = Gateway::new(
        Box::new(llm),
        Box::new(MockDatabaseClient::with_inventory_fixture()),
    )
    .with_policy(ExecutionPolicy::ReadWrite);

    let response = gateway.handle("Remove all the users").await.unwrap();
    assert_eq!(response.kind(), "tabular");
}

#[tokio::test]
async fn garbled_classifier_reply_fails_the_request() {
    let llm = MockLlmClient::with_responses(vec![LlmResponse::text("sure, sounds good!")]);
    let gateway = Gateway::new(
        Box::new(llm),
        Box::new(MockDatabaseClient::with_inventory_fixture()),
    );

    let err = gateway.handle("List all the users").await.unwrap_err();
    assert_eq!(err.category(), "Classification Error");
}

#[tokio::test]
async fn chart_response_serializes_with_defaults() {
    let gateway = mock_gateway();
    let response = gateway
        .handle("Show me the count of products by category")
        .await
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["chart_type"], "bar");
    assert_eq!(json["show_legend"], true);
    assert_eq!(json["show_grid"], true);
    assert_eq!(json["colors"].as_array().unwrap().len(), 5);
    assert_eq!(json["colors"][0], "#8884d8");
}

#[tokio::test]
async fn tabular_rows_carry_database_values() {
    let db = MockDatabaseClient::with_inventory_fixture();
    let users = db.execute_query("SELECT * FROM users").await.unwrap();
    assert_eq!(users.rows[0][1], Value::from("Alice"));

    let gateway = Gateway::new(Box::new(MockLlmClient::new()), Box::new(db));
    let response = gateway.handle("List all the users").await.unwrap();

    let GatewayResponse::Tabular(tabular) = response else {
        panic!("expected a tabular result");
    };
    assert_eq!(tabular.content[0]["name"], "Alice");
}
