use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;

use crate::types::{AckResponse, BatchRequest, ReprocessRequest};
use crate::{
    ApiError, FailureKind, FileEntry, FileListResponse, ProgressResponse, ServerSettings,
    StopResponse, UploadResponse,
};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Timeout for JSON calls (info, progress, history, stop, reprocess).
    pub request_timeout: Duration,
    /// Timeout for uploads and artifact downloads.
    pub upload_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7860".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(600),
            max_download_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Every endpoint of the conversion server the client talks to.
#[async_trait::async_trait]
pub trait ConversionApi: Send + Sync {
    async fn server_info(&self) -> Result<ServerSettings, ApiError>;

    async fn save_settings(&self, settings: ServerSettings) -> Result<ServerSettings, ApiError>;

    async fn list_files(&self) -> Result<Vec<FileEntry>, ApiError>;

    /// Uploads one PDF. `mode` is the wire value (`all` or `single`).
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        mode: &str,
    ) -> Result<UploadResponse, ApiError>;

    async fn progress(&self, hash_id: &str) -> Result<ProgressResponse, ApiError>;

    async fn stop(&self, hash_id: &str) -> Result<StopResponse, ApiError>;

    async fn reprocess(&self, hash_id: &str, mode: &str) -> Result<(), ApiError>;

    async fn download_batch(&self, hash_ids: &[String]) -> Result<Vec<u8>, ApiError>;

    /// `artifact` is the path segment, e.g. `docx` or `images_zip`.
    async fn download_artifact(&self, hash_id: &str, artifact: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    settings: ApiSettings,
    base: reqwest::Url,
    client: reqwest::Client,
}

impl ReqwestApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = reqwest::Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("not an http server url: {}", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "server url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        parse_json(response).await
    }

    async fn post_json<B, T>(&self, url: reqwest::Url, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .timeout(self.settings.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        parse_json(response).await
    }

    async fn read_binary(&self, response: reqwest::Response) -> Result<Vec<u8>, ApiError> {
        let response = ensure_success(response).await?;
        let max_bytes = self.settings.max_download_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    format!("download of {content_len} bytes exceeds limit of {max_bytes}"),
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    format!("download exceeds limit of {max_bytes} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl ConversionApi for ReqwestApi {
    async fn server_info(&self) -> Result<ServerSettings, ApiError> {
        self.get_json(self.endpoint(&["info"])?).await
    }

    async fn save_settings(&self, settings: ServerSettings) -> Result<ServerSettings, ApiError> {
        self.post_json(self.endpoint(&["settings"])?, &settings)
            .await
    }

    async fn list_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        let listing: FileListResponse = self.get_json(self.endpoint(&["list_files"])?).await?;
        Ok(listing.files)
    }

    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        mode: &str,
    ) -> Result<UploadResponse, ApiError> {
        let url = self.endpoint(&["upload_and_process"])?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(map_reqwest_error)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("process_mode", mode.to_string());

        let response = self
            .client
            .post(url)
            .timeout(self.settings.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: UploadResponse = parse_json(response).await?;
        if let Some(error) = body.error.clone() {
            return Err(ApiError::new(FailureKind::Application, error));
        }
        if body.hash_id.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::new(
                FailureKind::Decode,
                "upload response carries no hash_id",
            ));
        }
        Ok(body)
    }

    async fn progress(&self, hash_id: &str) -> Result<ProgressResponse, ApiError> {
        self.get_json(self.endpoint(&["progress", hash_id])?).await
    }

    async fn stop(&self, hash_id: &str) -> Result<StopResponse, ApiError> {
        let mut url = self.endpoint(&["stop_processing"])?;
        url.query_pairs_mut().append_pair("hash_id", hash_id);
        self.get_json(url).await
    }

    async fn reprocess(&self, hash_id: &str, mode: &str) -> Result<(), ApiError> {
        let request = ReprocessRequest {
            hash_id,
            process_mode: mode,
        };
        let ack: AckResponse = self
            .post_json(self.endpoint(&["reprocess"])?, &request)
            .await?;
        if let Some(error) = ack.error {
            return Err(ApiError::new(FailureKind::Application, error));
        }
        if ack.success == Some(false) {
            let message = ack
                .message
                .unwrap_or_else(|| "server rejected reprocess".to_string());
            return Err(ApiError::new(FailureKind::Application, message));
        }
        Ok(())
    }

    async fn download_batch(&self, hash_ids: &[String]) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .post(self.endpoint(&["download_batch"])?)
            .timeout(self.settings.upload_timeout)
            .json(&BatchRequest { hash_ids })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_binary(response).await
    }

    async fn download_artifact(&self, hash_id: &str, artifact: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["download", hash_id, artifact])?)
            .timeout(self.settings.upload_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_binary(response).await
    }
}

/// Turns a non-2xx response into `HttpStatus`, keeping the server's error text.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<AckResponse>(&body)
        .ok()
        .and_then(|ack| ack.error.or(ack.message))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {detail}", status.as_u16())
    };
    Err(ApiError::new(FailureKind::HttpStatus(status.as_u16()), message))
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
