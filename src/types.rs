// Type definitions and enums

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of the backend OSM cache. Read-only; refreshed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub directory: String,
    pub file_count: u64,
    pub total_size_mb: f64,
}

/// Response from the upload precheck: the file was parsed but not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecheckResponse {
    pub filename: String,
    pub headers: Vec<String>,
}

/// Column mapping sent to the processing endpoint.
///
/// Unset optional columns are omitted from the payload entirely rather than
/// sent as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub filename: String,
    pub latitude_col: String,
    pub longitude_col: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_col: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_col: Option<String>,
}

/// Generic acknowledgement carrying an optional server-supplied message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpMessage {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExperimentResponse {
    pub experiment_id: String,
}

/// Summary row from the experiment listing. The backend may attach more
/// fields than we care about; unknown ones are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Full result for one experiment. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// algorithm name -> metric name -> numeric or text value
    #[serde(default)]
    pub evaluation_reports: HashMap<String, HashMap<String, serde_json::Value>>,
    /// Narrative analysis produced by the backend LLM, if any.
    #[serde(default)]
    pub llm_analysis_result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub algorithm: String,
    pub file_path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Three parallel series returned by the K-function endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFunctionAnalysis {
    pub r: Vec<f64>,
    pub k_values: Vec<f64>,
    pub k_expected: Vec<f64>,
}

impl KFunctionAnalysis {
    /// Zip the parallel series into per-distance points for charting.
    /// Truncates to the shortest series if the backend ever disagrees on length.
    pub fn points(&self) -> Vec<KFunctionPoint> {
        self.r
            .iter()
            .zip(self.k_values.iter())
            .zip(self.k_expected.iter())
            .map(|((&r, &observed), &expected)| KFunctionPoint {
                r,
                observed,
                expected,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KFunctionPoint {
    pub r: f64,
    pub observed: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Format a metric value the way the results table shows it: floats to four
/// decimals, everything else verbatim.
pub fn format_metric(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Number(n) => {
            if n.is_f64() {
                format!("{:.4}", n.as_f64().unwrap_or_default())
            } else {
                n.to_string()
            }
        }
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Server-provided human-readable detail, when the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AppError::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message to surface to the user: server detail if present, otherwise
    /// the supplied per-operation fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or(fallback).to_string()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_omits_unset_columns() {
        let req = ProcessRequest {
            filename: "stores.csv".to_string(),
            latitude_col: "lat".to_string(),
            longitude_col: "lon".to_string(),
            id_col: None,
            weight_col: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("id_col"));
        assert!(!obj.contains_key("weight_col"));
        assert_eq!(obj["latitude_col"], "lat");
    }

    #[test]
    fn test_process_request_keeps_set_columns() {
        let req = ProcessRequest {
            filename: "stores.csv".to_string(),
            latitude_col: "lat".to_string(),
            longitude_col: "lon".to_string(),
            id_col: Some("store_id".to_string()),
            weight_col: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["id_col"], "store_id");
        assert!(json.get("weight_col").is_none());
    }

    #[test]
    fn test_experiment_result_tolerates_missing_fields() {
        let result: ExperimentResult = serde_json::from_str("{}").unwrap();
        assert!(result.evaluation_reports.is_empty());
        assert!(result.llm_analysis_result.is_none());
    }

    #[test]
    fn test_visualization_type_field_rename() {
        let viz: Visualization = serde_json::from_str(
            r#"{"algorithm": "kmeans", "file_path": "out/kmeans.png", "type": "partition_map"}"#,
        )
        .unwrap();
        assert_eq!(viz.kind, "partition_map");
    }

    #[test]
    fn test_k_function_points_zip() {
        let analysis = KFunctionAnalysis {
            r: vec![1.0, 2.0],
            k_values: vec![3.1, 12.5],
            k_expected: vec![3.14, 12.57],
        };
        let points = analysis.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].r, 2.0);
        assert_eq!(points[1].observed, 12.5);
        assert_eq!(points[1].expected, 12.57);
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(&serde_json::json!(0.123456)), "0.1235");
        assert_eq!(format_metric(&serde_json::json!(3)), "3");
        assert_eq!(format_metric(&serde_json::json!("n/a")), "n/a");
    }

    #[test]
    fn test_app_error_user_message_prefers_detail() {
        let err = AppError::Api {
            status: 422,
            detail: Some("Column 'lat' not found".to_string()),
        };
        assert_eq!(err.user_message("Processing failed."), "Column 'lat' not found");

        let err = AppError::Api {
            status: 500,
            detail: None,
        };
        assert_eq!(err.user_message("Processing failed."), "Processing failed.");
    }
}
