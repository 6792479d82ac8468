// TAP backend gateway
//
// One method per backend exchange. Every call is a fresh round trip: no
// caching, no retries. Resilience is the caller's responsibility.
//
// Failure normalization: non-2xx responses become AppError::Api carrying the
// FastAPI-style {"detail": ...} body when one is present; transport and
// decode failures become AppError::Http.

use crate::types::{
    AppError, AppResult, CacheStatus, ChatReply, ExperimentResult, ExperimentSummary,
    KFunctionAnalysis, OpMessage, PrecheckResponse, ProcessRequest, RunExperimentResponse,
    Visualization,
};
use reqwest::multipart;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct ApiGateway {
    client: Client,
    base_url: String,
}

// Error body shape used by the backend. Validation errors can carry a
// structured detail, so accept any JSON value and stringify non-strings.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl ApiGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a response into a typed value, or a uniform API error.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail)
                .map(|d| match d {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                });
            debug!(status = status.as_u16(), ?detail, "backend request failed");
            return Err(AppError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn list_datasets(&self) -> AppResult<Vec<String>> {
        let response = self.client.get(self.endpoint("/datasets")).send().await?;
        Self::decode(response).await
    }

    pub async fn cache_status(&self) -> AppResult<CacheStatus> {
        let response = self
            .client
            .get(self.endpoint("/osm/cache/status"))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn clear_cache(&self) -> AppResult<OpMessage> {
        let response = self
            .client
            .post(self.endpoint("/osm/cache/clear"))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Upload a file for precheck. The backend parses the headers without
    /// persisting anything.
    pub async fn precheck_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<PrecheckResponse> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| AppError::Internal(format!("invalid mime type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(self.endpoint("/datasets/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn process_dataset(&self, request: &ProcessRequest) -> AppResult<OpMessage> {
        let response = self
            .client
            .post(self.endpoint("/datasets/process"))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn run_experiment(
        &self,
        config: &serde_json::Value,
    ) -> AppResult<RunExperimentResponse> {
        let response = self
            .client
            .post(self.endpoint("/experiments/run"))
            .json(config)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn list_experiments(&self) -> AppResult<Vec<ExperimentSummary>> {
        let response = self.client.get(self.endpoint("/experiments")).send().await?;
        Self::decode(response).await
    }

    pub async fn experiment_result(&self, experiment_id: &str) -> AppResult<ExperimentResult> {
        let response = self
            .client
            .get(self.endpoint(&format!("/experiments/results/{}", experiment_id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn visualizations(&self, experiment_id: &str) -> AppResult<Vec<Visualization>> {
        let response = self
            .client
            .get(self.endpoint(&format!(
                "/experiments/results/{}/visualizations",
                experiment_id
            )))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn k_function(&self, dataset_name: &str) -> AppResult<KFunctionAnalysis> {
        let response = self
            .client
            .get(self.endpoint(&format!("/datasets/{}/analysis/k_function", dataset_name)))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn chat(&self, experiment_id: &str, message: &str) -> AppResult<ChatReply> {
        let response = self
            .client
            .post(self.endpoint(&format!("/experiments/results/{}/llm_chat", experiment_id)))
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Build the download link for a partition export. Pure URL construction,
    /// no network call.
    pub fn export_url(&self, experiment_id: &str, algorithm: &str) -> String {
        format!(
            "{}/experiments/results/{}/{}/export",
            self.base_url, experiment_id, algorithm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(url: &str) -> ApiGateway {
        ApiGateway::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_export_url_is_pure_construction() {
        let gw = gateway("http://127.0.0.1:8000/");
        assert_eq!(
            gw.export_url("exp-42", "kmeans"),
            "http://127.0.0.1:8000/experiments/results/exp-42/kmeans/export"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let gw = gateway("http://localhost:8000///");
        assert_eq!(gw.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_list_datasets() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/datasets")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"["stores.csv", "customers.csv"]"#)
            .create_async()
            .await;

        let datasets = gateway(&server.url()).list_datasets().await.unwrap();
        assert_eq!(datasets, vec!["stores.csv", "customers.csv"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cache_status_decodes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/osm/cache/status")
            .with_status(200)
            .with_body(r#"{"directory": "/tmp/osm", "file_count": 3, "total_size_mb": 12.5}"#)
            .create_async()
            .await;

        let status = gateway(&server.url()).cache_status().await.unwrap();
        assert_eq!(status.file_count, 3);
        assert_eq!(status.total_size_mb, 12.5);
    }

    #[tokio::test]
    async fn test_error_detail_is_extracted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/datasets/process")
            .with_status(422)
            .with_body(r#"{"detail": "Column 'lat' not found in file"}"#)
            .create_async()
            .await;

        let request = ProcessRequest {
            filename: "stores.csv".to_string(),
            latitude_col: "lat".to_string(),
            longitude_col: "lon".to_string(),
            id_col: None,
            weight_col: None,
        };
        let err = gateway(&server.url())
            .process_dataset(&request)
            .await
            .unwrap_err();
        match err {
            AppError::Api { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail.as_deref(), Some("Column 'lat' not found in file"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_without_detail_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/datasets")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = gateway(&server.url()).list_datasets().await.unwrap_err();
        match err {
            AppError::Api { status, detail } => {
                assert_eq!(status, 500);
                assert!(detail.is_none());
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_process_dataset_payload_omits_unset_columns() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/datasets/process")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "filename": "stores.csv",
                "latitude_col": "lat",
                "longitude_col": "lon"
            })))
            .with_status(200)
            .with_body(r#"{"message": "Dataset processed"}"#)
            .create_async()
            .await;

        let request = ProcessRequest {
            filename: "stores.csv".to_string(),
            latitude_col: "lat".to_string(),
            longitude_col: "lon".to_string(),
            id_col: None,
            weight_col: None,
        };
        let ack = gateway(&server.url())
            .process_dataset(&request)
            .await
            .unwrap();
        assert_eq!(ack.message.as_deref(), Some("Dataset processed"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_experiment_returns_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/experiments/run")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "dataset": "stores.csv",
                "algorithms": ["kmeans"]
            })))
            .with_status(200)
            .with_body(r#"{"experiment_id": "exp-42"}"#)
            .create_async()
            .await;

        let config = serde_json::json!({
            "dataset": "stores.csv",
            "algorithms": ["kmeans"]
        });
        let ack = gateway(&server.url()).run_experiment(&config).await.unwrap();
        assert_eq!(ack.experiment_id, "exp-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/experiments/results/exp-1/llm_chat")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "message": "why is kmeans worse here?"
            })))
            .with_status(200)
            .with_body(r#"{"reply": "Because the demand surface is multimodal."}"#)
            .create_async()
            .await;

        let reply = gateway(&server.url())
            .chat("exp-1", "why is kmeans worse here?")
            .await
            .unwrap();
        assert_eq!(reply.reply, "Because the demand surface is multimodal.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_precheck_upload_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/datasets/upload")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("multipart/form-data.*".to_string()),
            )
            .with_status(200)
            .with_body(r#"{"filename": "stores.csv", "headers": ["id", "lat", "lon"]}"#)
            .create_async()
            .await;

        let precheck = gateway(&server.url())
            .precheck_upload("stores.csv", b"id,lat,lon\n1,0.5,0.5\n".to_vec())
            .await
            .unwrap();
        assert_eq!(precheck.filename, "stores.csv");
        assert_eq!(precheck.headers, vec!["id", "lat", "lon"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_k_function_series() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/datasets/stores.csv/analysis/k_function")
            .with_status(200)
            .with_body(r#"{"r": [1.0, 2.0], "k_values": [3.0, 13.0], "k_expected": [3.14, 12.57]}"#)
            .create_async()
            .await;

        let analysis = gateway(&server.url()).k_function("stores.csv").await.unwrap();
        assert_eq!(analysis.points().len(), 2);
    }
}
