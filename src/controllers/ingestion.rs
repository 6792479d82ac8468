//! Dataset ingestion pipeline
//!
//! Drives the upload -> column mapping -> server-side processing flow, the
//! OSM cache maintenance actions, and the per-dataset K-function analysis
//! session. Consumes the ApiGateway; never retries on its own.
//!
//! The mapping dialog is a tagged state machine so that an open dialog
//! without a prechecked filename is unrepresentable.

use crate::api::ApiGateway;
use crate::controllers::notify::NotificationChannel;
use crate::types::{AppResult, CacheStatus, KFunctionAnalysis, KFunctionPoint};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MSG_PRECHECK_FAILED: &str = "File precheck failed. Make sure it is a valid CSV file.";
const MSG_COLUMNS_REQUIRED: &str = "Latitude and longitude columns are required.";
const MSG_PROCESSED: &str = "Dataset processed successfully!";
const MSG_PROCESS_FAILED: &str = "Dataset processing failed.";
const MSG_CACHE_CLEARED: &str = "OSM cache cleared.";
const MSG_CACHE_CLEAR_FAILED: &str = "Failed to clear the OSM cache.";
const MSG_INITIAL_LOAD_FAILED: &str = "Failed to load initial page data.";
const MSG_K_FUNCTION_FAILED: &str = "K-function analysis failed.";

/// Column mapping under construction while the dialog is open. Exists only
/// between a successful precheck and commit/close.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMapping {
    pub filename: String,
    pub headers: Vec<String>,
    pub latitude_col: String,
    pub longitude_col: String,
    pub id_col: String,
    pub weight_col: String,
}

impl UploadMapping {
    fn from_precheck(filename: String, headers: Vec<String>) -> Self {
        Self {
            filename,
            headers,
            latitude_col: String::new(),
            longitude_col: String::new(),
            id_col: String::new(),
            weight_col: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingField {
    Latitude,
    Longitude,
    Id,
    Weight,
}

/// Lifecycle of the mapping dialog.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MappingPhase {
    #[default]
    Idle,
    PrecheckPending,
    Open(UploadMapping),
    ProcessingPending(UploadMapping),
}

impl MappingPhase {
    pub fn is_open(&self) -> bool {
        matches!(self, MappingPhase::Open(_) | MappingPhase::ProcessingPending(_))
    }

    pub fn mapping(&self) -> Option<&UploadMapping> {
        match self {
            MappingPhase::Open(m) | MappingPhase::ProcessingPending(m) => Some(m),
            _ => None,
        }
    }
}

/// A file the user picked for upload, held until precheck.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// At most one K-function analysis session is open at a time; analyzing a
/// new dataset replaces it wholesale.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub dataset: String,
    pub points: Option<Vec<KFunctionPoint>>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct DataIngestionController {
    gateway: Arc<ApiGateway>,
    notifier: NotificationChannel,
    pub datasets: Vec<String>,
    pub cache: Option<CacheStatus>,
    pub loading: bool,
    pub page_error: Option<String>,
    pub selected_file: Option<SelectedFile>,
    pub mapping: MappingPhase,
    pub analysis: Option<AnalysisSession>,
}

impl DataIngestionController {
    pub fn new(gateway: Arc<ApiGateway>, notifier: NotificationChannel) -> Self {
        Self {
            gateway,
            notifier,
            datasets: Vec::new(),
            cache: None,
            loading: false,
            page_error: None,
            selected_file: None,
            mapping: MappingPhase::default(),
            analysis: None,
        }
    }

    /// Re-fetch the dataset list and cache status as a unit. Runs after any
    /// mutating action instead of patching state incrementally.
    pub async fn refresh(&mut self) {
        self.loading = true;
        self.page_error = None;
        let outcome = tokio::try_join!(self.gateway.list_datasets(), self.gateway.cache_status());
        self.loading = false;
        match outcome {
            Ok((datasets, cache)) => {
                self.datasets = datasets;
                self.cache = Some(cache);
            }
            Err(e) => {
                warn!("initial data refresh failed: {}", e);
                self.page_error = Some(e.user_message(MSG_INITIAL_LOAD_FAILED));
            }
        }
    }

    pub fn select_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.selected_file = Some(SelectedFile {
            name: name.into(),
            bytes,
        });
    }

    /// Precheck the selected file and open the mapping dialog on success.
    /// Does nothing when no file is selected.
    pub async fn start_upload(&mut self) {
        let Some(file) = self.selected_file.clone() else {
            return;
        };
        self.mapping = MappingPhase::PrecheckPending;
        let outcome = self.gateway.precheck_upload(&file.name, file.bytes).await;
        match outcome {
            Ok(precheck) => {
                info!("precheck accepted {} ({} columns)", precheck.filename, precheck.headers.len());
                self.mapping =
                    MappingPhase::Open(UploadMapping::from_precheck(precheck.filename, precheck.headers));
            }
            Err(e) => {
                self.mapping = MappingPhase::Idle;
                self.notifier.error(e.user_message(MSG_PRECHECK_FAILED));
            }
        }
    }

    /// Pure local edit of a mapping field; no network activity.
    pub fn update_field(&mut self, field: MappingField, value: impl Into<String>) {
        if let MappingPhase::Open(mapping) = &mut self.mapping {
            let value = value.into();
            match field {
                MappingField::Latitude => mapping.latitude_col = value,
                MappingField::Longitude => mapping.longitude_col = value,
                MappingField::Id => mapping.id_col = value,
                MappingField::Weight => mapping.weight_col = value,
            }
        }
    }

    /// Discard the mapping and the selected file without contacting the backend.
    pub fn close_mapping(&mut self) {
        self.mapping = MappingPhase::Idle;
        self.selected_file = None;
    }

    /// Commit the mapping. Incomplete latitude/longitude is a local validation
    /// failure: a warning is emitted and no network call happens. On success
    /// the dialog closes and the full page state is re-fetched; on failure the
    /// dialog stays open with all field choices intact.
    pub async fn commit(&mut self) {
        let MappingPhase::Open(mapping) = self.mapping.clone() else {
            return;
        };
        if mapping.latitude_col.is_empty() || mapping.longitude_col.is_empty() {
            self.notifier.warning(MSG_COLUMNS_REQUIRED);
            return;
        }

        let request = crate::types::ProcessRequest {
            filename: mapping.filename.clone(),
            latitude_col: mapping.latitude_col.clone(),
            longitude_col: mapping.longitude_col.clone(),
            id_col: non_empty(&mapping.id_col),
            weight_col: non_empty(&mapping.weight_col),
        };

        self.mapping = MappingPhase::ProcessingPending(mapping.clone());
        let outcome = self.gateway.process_dataset(&request).await;
        match outcome {
            Ok(ack) => {
                self.close_mapping();
                self.refresh().await;
                self.notifier
                    .success(ack.message.unwrap_or_else(|| MSG_PROCESSED.to_string()));
            }
            Err(e) => {
                // Keep the dialog open with the user's selections for correction.
                self.mapping = MappingPhase::Open(mapping);
                self.notifier.error(e.user_message(MSG_PROCESS_FAILED));
            }
        }
    }

    /// Ask the backend to clear the OSM cache, then re-fetch page state.
    pub async fn clear_cache(&mut self) {
        match self.gateway.clear_cache().await {
            Ok(_) => {
                self.refresh().await;
                self.notifier.success(MSG_CACHE_CLEARED);
            }
            Err(e) => {
                self.notifier.error(e.user_message(MSG_CACHE_CLEAR_FAILED));
            }
        }
    }

    /// Open a K-function analysis session for a dataset. Replaces any
    /// existing session. Opening a session never mutates the dataset list.
    pub async fn analyze(&mut self, dataset: impl Into<String>) {
        let dataset = dataset.into();
        self.analysis = Some(AnalysisSession {
            dataset: dataset.clone(),
            points: None,
            loading: true,
            error: None,
        });
        let outcome = self.gateway.k_function(&dataset).await;
        self.apply_analysis(&dataset, outcome);
    }

    /// Apply a K-function outcome. The session is tagged with the dataset it
    /// was issued for; a response for a stale session is discarded.
    pub fn apply_analysis(&mut self, dataset: &str, outcome: AppResult<KFunctionAnalysis>) {
        let Some(session) = &mut self.analysis else {
            debug!("discarding K-function response for closed session ({})", dataset);
            return;
        };
        if session.dataset != dataset {
            debug!(
                "discarding stale K-function response for {} (current: {})",
                dataset, session.dataset
            );
            return;
        }
        session.loading = false;
        match outcome {
            Ok(analysis) => session.points = Some(analysis.points()),
            Err(e) => {
                warn!("K-function analysis for {} failed: {}", dataset, e);
                session.error = Some(MSG_K_FUNCTION_FAILED.to_string());
            }
        }
    }

    pub fn close_analysis(&mut self) {
        self.analysis = None;
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use std::time::Duration;

    fn controller(url: &str) -> DataIngestionController {
        let gateway = Arc::new(ApiGateway::new(url, Duration::from_secs(5)).unwrap());
        DataIngestionController::new(gateway, NotificationChannel::new(Duration::from_secs(6)))
    }

    fn open_mapping(ctrl: &mut DataIngestionController, lat: &str, lon: &str) {
        let mut mapping = UploadMapping::from_precheck(
            "stores.csv".to_string(),
            vec!["id".to_string(), "lat".to_string(), "lon".to_string()],
        );
        mapping.latitude_col = lat.to_string();
        mapping.longitude_col = lon.to_string();
        ctrl.mapping = MappingPhase::Open(mapping);
    }

    #[tokio::test]
    async fn test_commit_with_missing_latitude_makes_no_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/datasets/process")
            .expect(0)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        open_mapping(&mut ctrl, "", "lon");
        ctrl.commit().await;

        assert!(ctrl.mapping.is_open());
        let n = ctrl.notifier.current().unwrap();
        assert_eq!(n.severity, crate::controllers::Severity::Warning);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_start_upload_without_file_is_a_noop() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/datasets/upload")
            .expect(0)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.start_upload().await;

        assert_eq!(ctrl.mapping, MappingPhase::Idle);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_precheck_success_opens_mapping_and_leaves_datasets_alone() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/datasets/upload")
            .with_status(200)
            .with_body(r#"{"filename": "stores.csv", "headers": ["id", "lat", "lon"]}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.datasets = vec!["existing.csv".to_string()];
        ctrl.select_file("stores.csv", b"id,lat,lon\n".to_vec());
        ctrl.start_upload().await;

        let mapping = ctrl.mapping.mapping().expect("dialog should be open");
        assert_eq!(mapping.filename, "stores.csv");
        assert_eq!(mapping.headers, vec!["id", "lat", "lon"]);
        assert!(mapping.latitude_col.is_empty());
        assert_eq!(ctrl.datasets, vec!["existing.csv"]);
    }

    #[tokio::test]
    async fn test_precheck_failure_returns_to_idle_with_server_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/datasets/upload")
            .with_status(400)
            .with_body(r#"{"detail": "Not a CSV file"}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.select_file("stores.bin", vec![0, 1, 2]);
        ctrl.start_upload().await;

        assert_eq!(ctrl.mapping, MappingPhase::Idle);
        let n = ctrl.notifier.current().unwrap();
        assert_eq!(n.severity, crate::controllers::Severity::Error);
        assert_eq!(n.message, "Not a CSV file");
    }

    #[tokio::test]
    async fn test_commit_success_closes_dialog_and_refreshes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/datasets/process")
            .with_status(200)
            .with_body(r#"{"message": "3 points ingested"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/datasets")
            .with_status(200)
            .with_body(r#"["stores.csv"]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/osm/cache/status")
            .with_status(200)
            .with_body(r#"{"directory": "/tmp/osm", "file_count": 1, "total_size_mb": 0.5}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.select_file("stores.csv", b"id,lat,lon\n".to_vec());
        open_mapping(&mut ctrl, "lat", "lon");
        ctrl.commit().await;

        assert_eq!(ctrl.mapping, MappingPhase::Idle);
        assert!(ctrl.selected_file.is_none());
        assert_eq!(ctrl.datasets, vec!["stores.csv"]);
        assert_eq!(ctrl.cache.as_ref().unwrap().file_count, 1);
        let n = ctrl.notifier.current().unwrap();
        assert_eq!(n.severity, crate::controllers::Severity::Success);
        assert_eq!(n.message, "3 points ingested");
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_dialog_open_with_fields_intact() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/datasets/process")
            .with_status(500)
            .with_body(r#"{"detail": "Worker crashed"}"#)
            .create_async()
            .await;
        let refresh_mock = server
            .mock("GET", "/datasets")
            .expect(0)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        open_mapping(&mut ctrl, "lat", "lon");
        ctrl.update_field(MappingField::Weight, "demand");
        ctrl.commit().await;

        let mapping = ctrl.mapping.mapping().expect("dialog stays open");
        assert_eq!(mapping.latitude_col, "lat");
        assert_eq!(mapping.longitude_col, "lon");
        assert_eq!(mapping.weight_col, "demand");
        let n = ctrl.notifier.current().unwrap();
        assert_eq!(n.message, "Worker crashed");
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_commit_omits_empty_optional_columns() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/datasets/process")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "filename": "stores.csv",
                "latitude_col": "lat",
                "longitude_col": "lon"
            })))
            .with_status(200)
            .with_body(r#"{"message": null}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/datasets")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/osm/cache/status")
            .with_status(200)
            .with_body(r#"{"directory": "/tmp/osm", "file_count": 0, "total_size_mb": 0.0}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        open_mapping(&mut ctrl, "lat", "lon");
        ctrl.commit().await;

        mock.assert_async().await;
        // null server message falls back to the generic success text
        assert_eq!(
            ctrl.notifier.current().unwrap().message,
            "Dataset processed successfully!"
        );
    }

    #[tokio::test]
    async fn test_clear_cache_success_triggers_refresh() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/osm/cache/clear")
            .with_status(200)
            .with_body(r#"{"message": "cleared"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/datasets")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/osm/cache/status")
            .with_status(200)
            .with_body(r#"{"directory": "/tmp/osm", "file_count": 0, "total_size_mb": 0.0}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.clear_cache().await;

        assert_eq!(ctrl.cache.as_ref().unwrap().file_count, 0);
        assert_eq!(
            ctrl.notifier.current().unwrap().severity,
            crate::controllers::Severity::Success
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_sets_page_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/datasets")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/osm/cache/status")
            .with_status(503)
            .with_body("")
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.refresh().await;

        assert!(ctrl.page_error.is_some());
        assert!(!ctrl.loading);
    }

    #[tokio::test]
    async fn test_analyze_success_fills_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/datasets/stores.csv/analysis/k_function")
            .with_status(200)
            .with_body(r#"{"r": [1.0], "k_values": [3.0], "k_expected": [3.14]}"#)
            .create_async()
            .await;

        let mut ctrl = controller(&server.url());
        ctrl.datasets = vec!["stores.csv".to_string()];
        ctrl.analyze("stores.csv").await;

        let session = ctrl.analysis.as_ref().unwrap();
        assert!(!session.loading);
        assert_eq!(session.points.as_ref().unwrap().len(), 1);
        assert!(session.error.is_none());
        // opening an analysis never mutates the dataset list
        assert_eq!(ctrl.datasets, vec!["stores.csv"]);
    }

    #[tokio::test]
    async fn test_stale_analysis_outcome_is_discarded() {
        let server = mockito::Server::new_async().await;
        let mut ctrl = controller(&server.url());

        ctrl.analysis = Some(AnalysisSession {
            dataset: "b.csv".to_string(),
            points: None,
            loading: true,
            error: None,
        });
        let stale = KFunctionAnalysis {
            r: vec![1.0],
            k_values: vec![2.0],
            k_expected: vec![3.0],
        };
        ctrl.apply_analysis("a.csv", Ok(stale));

        let session = ctrl.analysis.as_ref().unwrap();
        assert!(session.loading, "stale response must not settle the session");
        assert!(session.points.is_none());
    }

    #[tokio::test]
    async fn test_analysis_outcome_after_close_is_discarded() {
        let server = mockito::Server::new_async().await;
        let mut ctrl = controller(&server.url());
        ctrl.close_analysis();
        ctrl.apply_analysis(
            "a.csv",
            Err(AppError::Internal("too late".to_string())),
        );
        assert!(ctrl.analysis.is_none());
    }

    #[tokio::test]
    async fn test_update_field_is_local_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/datasets/process").expect(0).create_async().await;

        let mut ctrl = controller(&server.url());
        open_mapping(&mut ctrl, "", "");
        ctrl.update_field(MappingField::Latitude, "lat");
        ctrl.update_field(MappingField::Id, "store_id");

        let mapping = ctrl.mapping.mapping().unwrap();
        assert_eq!(mapping.latitude_col, "lat");
        assert_eq!(mapping.id_col, "store_id");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_close_mapping_discards_state_without_network() {
        let server = mockito::Server::new_async().await;
        let mut ctrl = controller(&server.url());
        ctrl.select_file("stores.csv", b"x".to_vec());
        open_mapping(&mut ctrl, "lat", "lon");
        ctrl.close_mapping();
        assert_eq!(ctrl.mapping, MappingPhase::Idle);
        assert!(ctrl.selected_file.is_none());
    }
}
