//! Introspected database schema.
//!
//! The schema is read fresh from the target database on every request and
//! rendered as text into the agent's system prompt, so the model only ever
//! reasons about tables that actually exist.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// The complete schema of a database: tables plus their relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders the schema for the agent's system prompt.
    ///
    /// One block per table with PK / NOT NULL / FK annotations inline, then
    /// a relationship summary. Plain text reads better to the model than
    /// raw DDL here.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::from("Database Schema:\n\n");

        for table in &self.tables {
            let _ = writeln!(out, "Table: {}", table.name);
            for column in &table.columns {
                let mut notes = Vec::new();
                if table.primary_key.contains(&column.name) {
                    notes.push("PK".to_string());
                }
                if !column.is_nullable {
                    notes.push("NOT NULL".to_string());
                }
                for fk in self.foreign_keys_from(&table.name, &column.name) {
                    notes.push(format!(
                        "FK -> {}.{}",
                        fk.to_table,
                        fk.to_columns.first().map(String::as_str).unwrap_or("")
                    ));
                }

                if notes.is_empty() {
                    let _ = writeln!(out, "  - {}: {}", column.name, column.data_type);
                } else {
                    let _ = writeln!(
                        out,
                        "  - {}: {} ({})",
                        column.name,
                        column.data_type,
                        notes.join(", ")
                    );
                }
            }
            out.push('\n');
        }

        if !self.foreign_keys.is_empty() {
            out.push_str("Foreign Keys:\n");
            for fk in &self.foreign_keys {
                let _ = writeln!(
                    out,
                    "  - {}.{} -> {}.{}",
                    fk.from_table,
                    fk.from_columns.join(", "),
                    fk.to_table,
                    fk.to_columns.join(", ")
                );
            }
        }

        out
    }

    fn foreign_keys_from<'a>(
        &'a self,
        table: &'a str,
        column: &'a str,
    ) -> impl Iterator<Item = &'a ForeignKey> {
        self.foreign_keys.iter().filter(move |fk| {
            fk.from_table == table && fk.from_columns.iter().any(|c| c == column)
        })
    }
}

/// A single table with its columns and primary key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Column names forming the primary key, in key order.
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Postgres type name, e.g. "integer" or "varchar(255)".
    pub data_type: String,
    pub is_nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
        }
    }

    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }
}

/// A foreign key between two tables. Composite keys keep their columns in
/// constraint order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_schema() -> Schema {
        Schema {
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
            ],
            foreign_keys: vec![ForeignKey::new(
                "products",
                vec!["category_id".to_string()],
                "categories",
                vec!["id".to_string()],
            )],
        }
    }

    #[test]
    fn test_prompt_rendering_annotates_columns() {
        let rendered = inventory_schema().format_for_llm();

        assert!(rendered.contains("Table: categories"));
        assert!(rendered.contains("Table: products"));
        assert!(rendered.contains("id: integer (PK, NOT NULL)"));
        assert!(rendered.contains("category_id: integer (NOT NULL, FK -> categories.id)"));
        assert!(rendered.contains("price: numeric(10,2)\n"));
        assert!(rendered.contains("products.category_id -> categories.id"));
    }

    #[test]
    fn test_empty_schema_renders_header_only() {
        let rendered = Schema::new().format_for_llm();
        assert!(rendered.starts_with("Database Schema:"));
        assert!(!rendered.contains("Foreign Keys:"));
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("price", "numeric(10,2)").nullable(false);
        assert_eq!(col.name, "price");
        assert!(!col.is_nullable);
    }
}
