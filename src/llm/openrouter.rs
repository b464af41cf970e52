//! OpenRouter (OpenAI-compatible) chat completion client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use super::{CompletionOptions, LlmClient, LlmError, Message, TextStream};
use crate::config::Config;

/// Client for `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    /// Create a client. Fails immediately when no API key is configured.
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
            default_model: default_model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.default_model.clone(),
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CompletionOptions,
        stream: bool,
    ) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        };
        self.http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        tracing::debug!(
            model = options.model.as_deref().unwrap_or(&self.default_model),
            messages = messages.len(),
            "Sending completion request"
        );

        let response = self.request(messages, options, false).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        // OpenRouter reports some upstream failures inside a 200 body.
        if let Some(error) = parsed.error {
            let status = error
                .code
                .as_ref()
                .and_then(serde_json::Value::as_u64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(502);
            return Err(LlmError::from_status(status, &error.message));
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;

        Ok(choice
            .message
            .and_then(|message| message.content)
            .unwrap_or_default())
    }

    async fn stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream, LlmError> {
        let mut source = EventSource::new(self.request(messages, options, true))
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let fragments = async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(message)) => {
                        let data = message.data.trim();
                        if data == "[DONE]" {
                            break;
                        }
                        match serde_json::from_str::<StreamChunk>(data) {
                            Ok(chunk) => {
                                for text in chunk.texts() {
                                    yield Ok(text);
                                }
                            }
                            Err(e) => {
                                yield Err(LlmError::InvalidResponse(e.to_string()));
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(err) => {
                        yield Err(eventsource_error(err).await);
                        break;
                    }
                }
            }
            source.close();
        };

        Ok(Box::pin(fragments))
    }
}

async fn eventsource_error(err: reqwest_eventsource::Error) -> LlmError {
    match err {
        reqwest_eventsource::Error::Transport(e) => LlmError::from(e),
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            LlmError::from_status(status.as_u16(), &body)
        }
        other => LlmError::InvalidResponse(other.to_string()),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    code: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

impl StreamChunk {
    fn texts(self) -> Vec<String> {
        self.choices
            .into_iter()
            .filter_map(|choice| choice.delta.and_then(|delta| delta.content))
            .filter(|text| !text.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ErrorKind;
    use axum::http::{header, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> OpenRouterClient {
        OpenRouterClient::new(Some("test-key".into()), base_url, "test/default-model")
            .expect("client")
    }

    #[test]
    fn missing_key_is_rejected_eagerly() {
        let err = OpenRouterClient::new(None, "http://localhost", "m").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = OpenRouterClient::new(Some("  ".into()), "http://localhost", "m").unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn complete_returns_first_choice_with_default_model() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "choices": [{"message": {"content": format!("model={}", body["model"].as_str().unwrap_or(""))}}]
                }))
            }),
        );
        let client = client(serve(app).await);

        let reply = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .expect("completion");
        assert_eq!(reply, "model=test/default-model");

        let reply = client
            .complete(
                &[Message::user("hi")],
                &CompletionOptions::with_model(Some("other/model".into())),
            )
            .await
            .expect("completion");
        assert_eq!(reply, "model=other/model");
    }

    #[tokio::test]
    async fn rate_limit_status_is_classified() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let client = client(serve(app).await);

        let err = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn error_inside_ok_body_is_surfaced() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"error": {"message": "upstream down", "code": 503}})) }),
        );
        let client = client(serve(app).await);

        let err = client
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_yields_fragments_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let app = Router::new().route(
            "/chat/completions",
            post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }),
        );
        let client = client(serve(app).await);

        let stream = client
            .stream(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .expect("stream");
        let fragments: Vec<String> = stream
            .map(|fragment| fragment.expect("fragment"))
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    }
}
