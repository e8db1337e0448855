//! Response types returned by the gateway.
//!
//! Every query resolves to either a `TabularResult` (rows of data with a
//! short message) or a `ChartResult` (a chart specification a frontend can
//! render directly). Chart specifications are validated after
//! deserialization so malformed LLM output never leaves the gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{GatewayError, Result};

/// Default color palette applied when the LLM omits colors.
pub const DEFAULT_CHART_COLORS: [&str; 5] =
    ["#8884d8", "#82ca9d", "#ffc658", "#ff7c7c", "#8dd1e1"];

/// Chart types supported by the rendering frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Area,
    Pie,
    Donut,
    Radar,
    Radial,
    Composed,
}

impl ChartType {
    /// Returns the chart type as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Area => "area",
            Self::Pie => "pie",
            Self::Donut => "donut",
            Self::Radar => "radar",
            Self::Radial => "radial",
            Self::Composed => "composed",
        }
    }
}

impl FromStr for ChartType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "area" => Ok(Self::Area),
            "pie" => Ok(Self::Pie),
            "donut" => Ok(Self::Donut),
            "radar" => Ok(Self::Radar),
            "radial" => Ok(Self::Radial),
            "composed" => Ok(Self::Composed),
            _ => Err(GatewayError::schema_validation(format!(
                "Unknown chart type: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tabular query result: a message plus rows as JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularResult {
    /// Short natural-language summary of the result.
    pub message: String,
    /// The user's original query.
    pub query: String,
    /// Result rows. Each row is a flat JSON object keyed by column name.
    pub content: Vec<Map<String, Value>>,
}

impl TabularResult {
    /// Parses a tabular result from raw JSON text.
    ///
    /// The row type enforces the structural invariant: every element of
    /// `content` must deserialize as a JSON object. An empty `content` is
    /// a valid result (the query matched nothing).
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            GatewayError::schema_validation(format!("Invalid tabular result: {}", e))
        })
    }
}

/// Chart specification produced for visualization queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    /// The user's original query.
    pub query: String,
    /// Which chart to render.
    pub chart_type: ChartType,
    /// Chart title.
    pub title: String,
    /// One-sentence description of what the chart shows.
    pub description: String,
    /// Data points. Each row is a flat JSON object.
    pub data: Vec<Map<String, Value>>,
    /// Key in each data row used for the x axis (or slice label).
    pub x_axis_key: String,
    /// Keys in each data row plotted as series.
    pub y_axis_keys: Vec<String>,
    /// Series colors as hex strings.
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub show_grid: bool,
}

fn default_colors() -> Vec<String> {
    DEFAULT_CHART_COLORS.iter().map(|c| c.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl ChartResult {
    /// Parses and validates a chart result from raw JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let result: Self = serde_json::from_str(raw).map_err(|e| {
            GatewayError::schema_validation(format!("Invalid chart result: {}", e))
        })?;
        result.validate()?;
        Ok(result)
    }

    /// Checks that the axis keys actually exist in the data.
    ///
    /// An empty `data` is valid (the query may have matched nothing); the
    /// per-row key checks then have nothing to inspect.
    pub fn validate(&self) -> Result<()> {
        if self.y_axis_keys.is_empty() {
            return Err(GatewayError::schema_validation(
                "Chart result has no y axis keys",
            ));
        }

        for (i, row) in self.data.iter().enumerate() {
            if !row.contains_key(&self.x_axis_key) {
                return Err(GatewayError::schema_validation(format!(
                    "Data row {} is missing x axis key '{}'",
                    i, self.x_axis_key
                )));
            }
            for key in &self.y_axis_keys {
                if !row.contains_key(key) {
                    return Err(GatewayError::schema_validation(format!(
                        "Data row {} is missing y axis key '{}'",
                        i, key
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The gateway's final answer to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayResponse {
    Chart(ChartResult),
    Tabular(TabularResult),
}

impl GatewayResponse {
    /// Returns "chart" or "tabular".
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chart(_) => "chart",
            Self::Tabular(_) => "tabular",
        }
    }
}
