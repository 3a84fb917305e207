use crate::config::{Config, GenerationConfig};
use crate::events::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

/// Why a completion call produced no reply
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key configured")]
    MissingCredential,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Something that turns a conversation into the next assistant reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError>;
}

/// Body of a chat-completions request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [ChatMessage], generation: &GenerationConfig) -> Self {
        Self {
            model,
            messages,
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            presence_penalty: generation.presence_penalty,
            frequency_penalty: generation.frequency_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pull `choices[0].message.content` out of a response body
fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("no message content in choices".to_string()))
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint
#[derive(Clone)]
pub struct LlmClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.get_api_key(),
            generation: config.generation.clone(),
            client,
        })
    }

    /// Underlying HTTP client, shared with the listings loader
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingCredential)?;
        let payload = CompletionRequest::new(&self.model, &messages, &self.generation);

        log::debug!(
            "POST {} model={} messages={}",
            self.endpoint,
            self.model,
            messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status { status, body });
        }

        extract_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/v1/chat/completions", addr), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn client_for(endpoint: String, api_key: Option<&str>) -> LlmClient {
        let config = Config {
            endpoint,
            api_key: api_key.map(str::to_string),
            api_key_env: "RENTAL_CHAT_TEST_UNSET_VARIABLE".to_string(),
            request_timeout_secs: 5,
            ..Config::default()
        };
        LlmClient::new(&config).unwrap()
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hello")];
        let generation = GenerationConfig::default();
        let body = serde_json::to_value(CompletionRequest::new("gpt-4o", &messages, &generation)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("temperature").is_some());
        assert!(body.get("presence_penalty").is_some());
        assert!(body.get("frequency_penalty").is_some());
    }

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Try the Beach House"}}]}"#;
        assert_eq!(extract_reply(body).unwrap(), "Try the Beach House");
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert!(matches!(
            extract_reply(r#"{"choices":[]}"#),
            Err(CompletionError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_reply("not json"),
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let client = client_for("http://127.0.0.1:9/unused".to_string(), None);
        let result = client.complete(vec![ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(CompletionError::MissingCredential)));
    }

    #[tokio::test]
    async fn posts_transcript_with_bearer_key() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"**Beach House**"}}]}"#,
        )
        .await;
        let client = client_for(endpoint, Some("sk-test"));

        let reply = client
            .complete(vec![ChatMessage::system("sys"), ChatMessage::user("beach?")])
            .await
            .unwrap();
        assert_eq!(reply, "**Beach House**");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""content":"beach?""#));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 429 Too Many Requests",
            r#"{"error":{"message":"slow down"}}"#,
        )
        .await;
        let client = client_for(endpoint, Some("sk-test"));

        let result = client.complete(vec![ChatMessage::user("hi")]).await;
        match result {
            Err(CompletionError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
        server.await.unwrap();
    }
}
