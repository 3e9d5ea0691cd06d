//! Extraction through an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{DocumentExtractor, ExtractedReport, ExtractionError, ExtractionRequest, parse_extraction};
use crate::config::ExtractionConfig;

const SYSTEM_PROMPT: &str = "You extract structured data from laboratory test reports. \
Respond with a single JSON object and nothing else, using this shape:\n\
{\"patient\": {\"name\": string|null, \"date_of_birth\": \"YYYY-MM-DD\"|null, \"gender\": \"male\"|\"female\"|\"other\"|null},\n \
\"lab_test_date\": \"YYYY-MM-DD\"|null,\n \
\"biomarkers\": [{\"name\": string, \"value\": number, \"unit\": string|null, \"reference_min\": number|null, \
\"reference_max\": number|null, \"flag\": \"low\"|\"normal\"|\"high\"|null}]}\n\
Include every measured value in the report. Use the sample collection date as lab_test_date. \
Report values exactly as printed; do not convert units. Use null for anything not present.";

const USER_PROMPT: &str = "Extract the patient details and all biomarker results from this lab report.";

/// `{base_url}/chat/completions`, whether or not the configured base ends in a slash.
fn chat_completions_url(base_url: &Url) -> Result<Url, url::ParseError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("chat/completions")
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentPart<'a> {
    Text { text: &'a str },
    File { file: FilePart<'a> },
}

#[derive(Debug, Serialize)]
struct FilePart<'a> {
    filename: &'a str,
    file_data: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// The concrete [`DocumentExtractor`] used in production.
pub struct OpenAiExtractor {
    client: Client,
    endpoint: Url,
    default_model: String,
    timeout: Duration,
}

impl OpenAiExtractor {
    pub fn new(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let endpoint = chat_completions_url(&config.base_url)?;
        Ok(Self {
            client,
            endpoint,
            default_model: config.model.clone(),
            timeout: config.timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            warn!(timeout = ?self.timeout, "Extraction request timed out");
            ExtractionError::Timeout
        } else {
            ExtractionError::Upstream {
                status: None,
                message: err.without_url().to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentExtractor for OpenAiExtractor {
    #[instrument(skip(self, request), fields(filename = %request.filename, bytes = request.pdf.len()), err)]
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractedReport, ExtractionError> {
        let model = request.model.unwrap_or(&self.default_model);
        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage::System { content: SYSTEM_PROMPT },
                ChatMessage::User {
                    content: vec![
                        ContentPart::File {
                            file: FilePart {
                                filename: request.filename,
                                file_data: format!("data:application/pdf;base64,{}", STANDARD.encode(request.pdf)),
                            },
                        },
                        ContentPart::Text { text: USER_PROMPT },
                    ],
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.0,
        };

        debug!(model, endpoint = %self.endpoint, "Sending document for extraction");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| text.chars().take(500).collect());
            return Err(ExtractionError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout
            } else {
                ExtractionError::MalformedResponse(e.without_url().to_string())
            }
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ExtractionError::MalformedResponse("response contained no message content".to_string()))?;

        let report = parse_extraction(&content)?;
        debug!(biomarkers = report.biomarkers.len(), "Extraction succeeded");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, timeout: Duration) -> ExtractionConfig {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        ExtractionConfig {
            base_url: format!("{}/v1", server.uri()).parse().unwrap(),
            model: "test-model".to_string(),
            timeout,
            ..Default::default()
        }
    }

    fn request<'a>(model: Option<&'a str>) -> ExtractionRequest<'a> {
        ExtractionRequest {
            pdf: b"%PDF-1.4 test",
            filename: "report.pdf",
            api_key: "sk-test",
            model,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })
    }

    #[test]
    fn test_chat_completions_url_keeps_base_path() {
        for base in ["https://api.example.com/v1", "https://api.example.com/v1/"] {
            let url: Url = base.parse().unwrap();
            assert_eq!(chat_completions_url(&url).unwrap().as_str(), "https://api.example.com/v1/chat/completions");
        }
        let url: Url = "http://localhost:8080".parse().unwrap();
        assert_eq!(chat_completions_url(&url).unwrap().as_str(), "http://localhost:8080/chat/completions");
    }

    #[tokio::test]
    async fn test_successful_extraction() {
        let server = MockServer::start().await;
        let content = r#"{"patient": {"name": "Jane Doe", "date_of_birth": "1980-04-12", "gender": "female"},
            "lab_test_date": "2024-03-05",
            "biomarkers": [{"name": "Glucose", "value": 92, "unit": "mg/dL"}]}"#;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "override-model",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_secs(5))).unwrap();
        let report = extractor.extract(request(Some("override-model"))).await.unwrap();

        assert_eq!(report.patient_name.as_deref(), Some("Jane Doe"));
        assert_eq!(report.gender, Some(Gender::Female));
        assert_eq!(report.biomarkers.len(), 1);
        assert_eq!(report.biomarkers[0].value, 92.0);
    }

    #[tokio::test]
    async fn test_document_sent_as_base64_file_part() {
        let server = MockServer::start().await;
        let expected = format!("data:application/pdf;base64,{}", STANDARD.encode(b"%PDF-1.4 test"));

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(move |req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let part = &body["messages"][1]["content"][0];
                assert_eq!(part["type"], "file");
                assert_eq!(part["file"]["filename"], "report.pdf");
                assert_eq!(part["file"]["file_data"], expected.as_str());
                ResponseTemplate::new(200).set_body_json(completion(r#"{"biomarkers": [{"name": "TSH", "value": 2.1}]}"#))
            })
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_secs(5))).unwrap();
        let report = extractor.extract(request(None)).await.unwrap();
        assert_eq!(report.biomarkers[0].name, "TSH");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_secs(5))).unwrap();
        match extractor.extract(request(None)).await {
            Err(ExtractionError::Upstream { status, message }) => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_model_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Sorry, I cannot read this file.")))
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_secs(5))).unwrap();
        assert!(matches!(
            extractor.extract(request(None)).await,
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_secs(5))).unwrap();
        assert!(matches!(
            extractor.extract(request(None)).await,
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let extractor = OpenAiExtractor::new(&config_for(&server, Duration::from_millis(100))).unwrap();
        assert!(matches!(extractor.extract(request(None)).await, Err(ExtractionError::Timeout)));
    }
}
