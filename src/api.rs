//! Typed models of the databotics backend wire contract. Field names follow
//! the server payloads exactly; loosely-shaped maps stay `serde_json::Value`
//! rather than guessing a stricter schema than the backend promises.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Server-assigned working session for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: String,
    pub null_count: u64,
    pub null_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub row_count: u64,
    pub columns: Vec<ColumnStats>,
    #[serde(default)]
    pub sample_rows: Vec<BTreeMap<String, Value>>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_sample: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateResponse {
    #[serde(default)]
    pub summary: BTreeMap<String, Value>,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, Value>>,
    pub row_count: u64,
}

/// Options for `/clean`; passed through the gateway unmodified as query
/// parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanOptions {
    pub trim_strings: bool,
    pub drop_duplicates: bool,
    /// "lower" or "upper"; omitted from the request when None.
    pub normalize_case: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub timestamp_col: String,
    pub metric_col: String,
    pub dimension_cols: Vec<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub anomalies: Vec<BTreeMap<String, Value>>,
    #[serde(default)]
    pub summary: BTreeMap<String, Value>,
    #[serde(default)]
    pub narrative: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSqlRequest {
    pub question: String,
    pub table: String,
    /// Column name -> type name, taken from the stored profile.
    pub schema: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rows: Option<Vec<BTreeMap<String, Value>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSqlResponse {
    pub sql: String,
    pub explanation: String,
    #[serde(default)]
    pub safety: BTreeMap<String, Value>,
}
