//! HttpOracle - scoring oracle backed by a model-hosting sidecar.
//!
//! The sidecar owns the actual model and tokenizer and exposes four JSON
//! endpoints under the configured base URL:
//!
//! | Method | Path | Request | Response |
//! |--------|------|---------|----------|
//! | GET | `/info` | | `{ "vocabulary_size" }` |
//! | POST | `/score` | `{ "text", "temperature" }` | `{ "logits" }` (unscaled) or `{ "probabilities" }` (scaled) |
//! | POST | `/decode` | `{ "token_ids" }` | `{ "texts" }`, one per id |
//! | POST | `/encode` | `{ "text" }` | `{ "token_ids" }` |

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokenwheel_core::distribution::{Distribution, validate_temperature};
use tokenwheel_core::error::{Result, WheelError};
use tokenwheel_core::oracle::ModelOracle;

#[derive(Debug, Deserialize)]
struct InfoResponse {
    vocabulary_size: usize,
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    logits: Option<Vec<f32>>,
    #[serde(default)]
    probabilities: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct DecodeRequest<'a> {
    token_ids: &'a [u32],
}

#[derive(Debug, Deserialize)]
struct DecodeResponse {
    texts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EncodeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse {
    token_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "detail", alias = "error")]
    message: String,
}

/// Oracle that forwards every call to a sidecar over HTTP.
#[derive(Clone)]
pub struct HttpOracle {
    client: Client,
    model_name: String,
    base_url: String,
    vocabulary_size: usize,
}

impl HttpOracle {
    /// Connects to the sidecar and reads the model's vocabulary size.
    ///
    /// # Errors
    ///
    /// `OracleUnavailable` if the sidecar cannot be reached or answers with
    /// anything other than a valid `/info` payload.
    pub async fn connect(
        model_name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            WheelError::oracle_unavailable(format!("Failed to build HTTP client: {err}"))
        })?;

        let mut oracle = Self {
            client,
            model_name: model_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            vocabulary_size: 0,
        };

        let info: InfoResponse = oracle.get("info").await?;
        if info.vocabulary_size == 0 {
            return Err(WheelError::oracle_unavailable(format!(
                "model '{}' reported an empty vocabulary",
                oracle.model_name
            )));
        }
        oracle.vocabulary_size = info.vocabulary_size;

        tracing::info!(
            model = %oracle.model_name,
            base_url = %oracle.base_url,
            vocabulary_size = oracle.vocabulary_size,
            "Connected to scoring sidecar"
        );
        Ok(oracle)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(|err| self.transport_error(path, err))?;
        self.read_json(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|err| self.transport_error(path, err))?;
        self.read_json(path, response).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read sidecar error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        response.json().await.map_err(|err| {
            WheelError::oracle_unavailable(format!(
                "Failed to parse sidecar response from /{path}: {err}"
            ))
        })
    }

    fn transport_error(&self, path: &str, err: reqwest::Error) -> WheelError {
        tracing::warn!(
            model = %self.model_name,
            endpoint = %path,
            error = %err,
            timeout = err.is_timeout(),
            "Sidecar request failed"
        );
        WheelError::oracle_unavailable(format!(
            "Sidecar request to /{path} for model '{}' failed: {err}",
            self.model_name
        ))
    }
}

#[async_trait]
impl ModelOracle for HttpOracle {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    async fn score_next_token(&self, text: &str, temperature: f64) -> Result<Distribution> {
        validate_temperature(temperature)?;
        let response: ScoreResponse = self
            .post("score", &ScoreRequest { text, temperature })
            .await?;
        let distribution = score_to_distribution(response, temperature)?;
        check_vocabulary_size(distribution, self.vocabulary_size)
    }

    async fn decode(&self, token_id: u32) -> Result<String> {
        self.decode_batch(&[token_id])
            .await?
            .pop()
            .ok_or_else(|| WheelError::oracle_unavailable("sidecar returned no text for token"))
    }

    async fn decode_batch(&self, token_ids: &[u32]) -> Result<Vec<String>> {
        if let Some(&bad) = token_ids
            .iter()
            .find(|&&id| id as usize >= self.vocabulary_size)
        {
            return Err(WheelError::invalid_argument(format!(
                "token id {} is outside the vocabulary (size {})",
                bad, self.vocabulary_size
            )));
        }
        if token_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response: DecodeResponse = self.post("decode", &DecodeRequest { token_ids }).await?;
        if response.texts.len() != token_ids.len() {
            return Err(WheelError::oracle_unavailable(format!(
                "sidecar decoded {} texts for {} token ids",
                response.texts.len(),
                token_ids.len()
            )));
        }
        Ok(response.texts)
    }

    async fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let response: EncodeResponse = self.post("encode", &EncodeRequest { text }).await?;
        Ok(response.token_ids)
    }
}

/// Converts a `/score` payload, preferring raw logits when both are present.
fn score_to_distribution(response: ScoreResponse, temperature: f64) -> Result<Distribution> {
    match (response.logits, response.probabilities) {
        (Some(logits), _) => Distribution::from_logits(&logits, temperature),
        (None, Some(probabilities)) => Distribution::from_probabilities(probabilities)
            .map_err(|err| WheelError::oracle_unavailable(format!("sidecar sent {err}"))),
        (None, None) => Err(WheelError::oracle_unavailable(
            "sidecar /score response had neither logits nor probabilities",
        )),
    }
}

/// Every id in a scored distribution must be decodable, so its length has to
/// match the size `/info` reported.
fn check_vocabulary_size(distribution: Distribution, expected: usize) -> Result<Distribution> {
    if distribution.len() != expected {
        return Err(WheelError::oracle_unavailable(format!(
            "sidecar scored {} tokens but reported a vocabulary of {}",
            distribution.len(),
            expected
        )));
    }
    Ok(distribution)
}

fn map_http_error(status: StatusCode, body: String) -> WheelError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|wrapper| wrapper.message)
        .unwrap_or(body);

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        WheelError::invalid_argument(format!("sidecar rejected request ({status}): {message}"))
    } else {
        WheelError::oracle_unavailable(format!("sidecar error ({status}): {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logits_are_temperature_scaled() {
        let response = ScoreResponse {
            logits: Some(vec![1.0, 3.0]),
            probabilities: None,
        };
        let cold = score_to_distribution(response, 0.5).unwrap();
        let neutral = Distribution::from_logits(&[1.0, 3.0], 1.0).unwrap();
        assert!(cold.get(1).unwrap().probability > neutral.get(1).unwrap().probability);
    }

    #[test]
    fn test_probabilities_used_as_is() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"probabilities": [0.25, 0.75]}"#).unwrap();
        let dist = score_to_distribution(response, 2.0).unwrap();
        assert_eq!(dist.get(1).unwrap().probability, 0.75);
    }

    #[test]
    fn test_score_length_must_match_vocabulary() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"probabilities": [0.5, 0.3, 0.2]}"#).unwrap();
        let dist = score_to_distribution(response, 1.0).unwrap();

        let err = check_vocabulary_size(dist.clone(), 2).unwrap_err();
        assert!(matches!(err, WheelError::OracleUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(check_vocabulary_size(dist, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_score_payload() {
        let response: ScoreResponse = serde_json::from_str("{}").unwrap();
        let err = score_to_distribution(response, 1.0).unwrap_err();
        assert!(matches!(err, WheelError::OracleUnavailable(_)));
    }

    #[test]
    fn test_bad_probabilities_are_an_oracle_fault() {
        let response: ScoreResponse =
            serde_json::from_str(r#"{"probabilities": [-1.0]}"#).unwrap();
        assert!(matches!(
            score_to_distribution(response, 1.0),
            Err(WheelError::OracleUnavailable(_))
        ));
    }

    #[test]
    fn test_map_http_error() {
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "token id out of range"}"#.to_string(),
        );
        assert_eq!(
            err,
            WheelError::InvalidArgument(
                "sidecar rejected request (400 Bad Request): token id out of range".to_string()
            )
        );

        let err = map_http_error(StatusCode::SERVICE_UNAVAILABLE, "loading".to_string());
        assert!(err.is_retryable());

        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(err, WheelError::OracleUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_sidecar() {
        // Port 9 (discard) is essentially never serving HTTP locally.
        let result = HttpOracle::connect("gpt2", "http://127.0.0.1:9", Duration::from_millis(500)).await;
        assert!(matches!(result, Err(WheelError::OracleUnavailable(_))));
    }
}
