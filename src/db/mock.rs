//! Mock database clients for testing.
//!
//! `MockDatabaseClient` serves canned results for a small inventory fixture
//! so the pipeline can be exercised without a live database.
//! `FailingDatabaseClient` errors on every call.

use super::{Column, ColumnInfo, DatabaseClient, ForeignKey, QueryResult, Schema, Table, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
///
/// Pattern-matches incoming SQL against the fixture tables and records every
/// executed statement for later assertions.
pub struct MockDatabaseClient {
    schema: Schema,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a mock client with an empty schema.
    pub fn new() -> Self {
        Self {
            schema: Schema::default(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock client with the given schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock client seeded with the inventory fixture:
    /// 4 categories, 10 products, and a 3-row users table.
    pub fn with_inventory_fixture() -> Self {
        let schema = Schema {
            tables: vec![
                Table {
                    name: "categories".to_string(),
                    columns: vec![
                        Column::new("id", "integer").nullable(false),
                        Column::new("name", "varchar(100)").nullable(false),
                    ],
                    primary_key: vec!["id".to_string()],
                },
                Table {
                    name: "products".to_string(),
                    columns: vec![
                        Column::new("id", "integer").nullable(false),
                        Column::new("category_id", "integer").nullable(false),
                        Column::new("name", "varchar(255)").nullable(false),
                        Column::new("price", "numeric(10,2)"),
                    ],
                    primary_key: vec!["id".to_string()],
                },
                Table {
                    name: "users".to_string(),
                    columns: vec![
                        Column::new("user_id", "uuid").nullable(false),
                        Column::new("name", "varchar(100)").nullable(false),
                        Column::new("dob", "date"),
                        Column::new("email", "varchar(255)").nullable(false),
                    ],
                    primary_key: vec!["user_id".to_string()],
                },
            ],
            foreign_keys: vec![ForeignKey::new(
                "products",
                vec!["category_id".to_string()],
                "categories",
                vec!["id".to_string()],
            )],
        };
        Self::with_schema(schema)
    }

    /// Returns the SQL statements executed so far, in order.
    pub fn executed_statements(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock poisoned").clone()
    }

    fn products_per_category() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("category", "varchar"),
                ColumnInfo::new("product_count", "int8"),
            ],
            vec![
                vec![Value::from("Electronics"), Value::Int(4)],
                vec![Value::from("Books"), Value::Int(3)],
                vec![Value::from("Clothing"), Value::Int(2)],
                vec![Value::from("Toys"), Value::Int(1)],
            ],
        )
    }

    fn users_rows() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("user_id", "uuid"),
                ColumnInfo::new("name", "varchar"),
                ColumnInfo::new("email", "varchar"),
            ],
            vec![
                vec![
                    Value::from("6f1c2a18-1111-4a8e-9c3f-000000000001"),
                    Value::from("Alice"),
                    Value::from("alice@example.com"),
                ],
                vec![
                    Value::from("6f1c2a18-1111-4a8e-9c3f-000000000002"),
                    Value::from("Bob"),
                    Value::from("bob@example.com"),
                ],
                vec![
                    Value::from("6f1c2a18-1111-4a8e-9c3f-000000000003"),
                    Value::from("Carol"),
                    Value::from("carol@example.com"),
                ],
            ],
        )
    }

    fn categories_rows() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("id", "int4"),
                ColumnInfo::new("name", "varchar"),
            ],
            vec![
                vec![Value::Int(1), Value::from("Electronics")],
                vec![Value::Int(2), Value::from("Books")],
                vec![Value::Int(3), Value::from("Clothing")],
                vec![Value::Int(4), Value::from("Toys")],
            ],
        )
    }

    fn products_rows() -> QueryResult {
        let names = [
            "Laptop", "Phone", "Headphones", "Monitor", "Novel", "Cookbook", "Atlas", "T-Shirt",
            "Jacket", "Puzzle",
        ];
        let category_ids = [1, 1, 1, 1, 2, 2, 2, 3, 3, 4];
        let rows = names
            .iter()
            .zip(category_ids.iter())
            .enumerate()
            .map(|(i, (name, cat))| {
                vec![
                    Value::Int(i as i64 + 1),
                    Value::Int(*cat),
                    Value::from(*name),
                    Value::Float(9.99 + i as f64),
                ]
            })
            .collect();

        QueryResult::with_data(
            vec![
                ColumnInfo::new("id", "int4"),
                ColumnInfo::new("category_id", "int4"),
                ColumnInfo::new("name", "varchar"),
                ColumnInfo::new("price", "numeric"),
            ],
            rows,
        )
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executed
            .lock()
            .expect("executed lock poisoned")
            .push(sql.to_string());

        let sql_lower = sql.to_lowercase();

        if !sql_lower.trim_start().starts_with("select") {
            return Ok(QueryResult {
                execution_time: Duration::from_millis(1),
                ..QueryResult::default()
            });
        }

        let result = if sql_lower.contains("count") && sql_lower.contains("group by") {
            Self::products_per_category()
        } else if sql_lower.contains("from users") {
            Self::users_rows()
        } else if sql_lower.contains("from categories") {
            Self::categories_rows()
        } else if sql_lower.contains("from products") {
            Self::products_rows()
        } else {
            QueryResult::with_data(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!("Mock result for: {}", sql))]],
            )
        };

        Ok(QueryResult {
            execution_time: Duration::from_millis(1),
            ..result
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client that fails every operation.
///
/// Used to test error propagation through the pipeline.
#[derive(Debug, Default)]
pub struct FailingDatabaseClient;

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Err(GatewayError::connection("mock connection failure"))
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(GatewayError::execution("mock execution failure"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
