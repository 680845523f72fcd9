//! OpenAI-compatible chat-completions client (Groq by default).

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Model, Response, Role};
use crate::config::ModelConfig;
use crate::models::Usage;

pub struct ChatModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

impl ChatModel {
    /// Build a client from config, reading the API key from the environment.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "No API key found. Set the {} environment variable.",
                config.api_key_env
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(client, config, api_key))
    }

    pub fn with_client(client: Client, config: &ModelConfig, api_key: String) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.id.clone(),
            api_key,
            temperature: config.temperature,
        }
    }

    fn endpoint(&self) -> String {
        completions_url(&self.base_url)
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// The system message that tells the model who it is and what to return.
pub fn system_message(role: &Role) -> String {
    let mut message = String::new();
    let _ = writeln!(message, "{}", role.description());

    if !role.instructions().is_empty() {
        let _ = writeln!(message, "\n<instructions>");
        for instruction in role.instructions() {
            let _ = writeln!(message, "- {instruction}");
        }
        let _ = writeln!(message, "</instructions>");
    }

    let schema = serde_json::to_string_pretty(role.output_schema()).unwrap_or_default();
    let _ = write!(
        message,
        "\nRespond with a single JSON object named {} matching this JSON schema, and nothing else:\n{schema}",
        role.output_name()
    );
    message
}

/// Pull a JSON object out of message content, tolerating a markdown fence.
pub fn extract_payload(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(body.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl Model for ChatModel {
    fn invoke(&self, role: &Role, prompt: &str) -> Result<Response> {
        let system = system_message(role);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &system,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.temperature,
        };

        let started = Instant::now();
        debug!(role = role.name(), model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .with_context(|| format!("Failed to reach model endpoint for {}", role.name()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("Model request for {} failed with {status}: {body}", role.name());
        }

        let body: ChatResponse = response
            .json()
            .context("Failed to decode chat completion response")?;

        let usage = body
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let payload = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .and_then(|content| extract_payload(&content));

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            role = role.name(),
            elapsed_ms,
            tokens = usage.total(),
            has_payload = payload.is_some(),
            "Chat completion finished"
        );

        Ok(Response::new(payload).with_usage(usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::roles;
    use rstest::rstest;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Read one HTTP request: headers plus a Content-Length body.
    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = header_end(&buf) {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer a single request with `status` and `body`. The handle yields
    /// the raw request that was received.
    fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (format!("http://{addr}/openai/v1/"), handle)
    }

    fn local_model(base_url: String) -> ChatModel {
        let config = ModelConfig {
            base_url,
            ..ModelConfig::default()
        };
        let client = Client::builder().no_proxy().build().unwrap();
        ChatModel::with_client(client, &config, "test-key".to_string())
    }

    fn completion(content: Value, usage: Value) -> String {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": usage,
        })
        .to_string()
    }

    #[test]
    fn invoke_fails_on_server_error() {
        let (base_url, server) =
            serve_once("500 Internal Server Error", r#"{"error":"boom"}"#.to_string());

        let err = local_model(base_url)
            .invoke(&roles::developer(), "pong")
            .unwrap_err();
        server.join().unwrap();

        let message = err.to_string();
        assert!(message.contains("500"), "got {message}");
        assert!(message.contains("boom"));
    }

    #[rstest]
    #[case::prose(json!("Sure!"))]
    #[case::no_content(Value::Null)]
    fn invoke_without_json_object_has_no_payload(#[case] content: Value) {
        let body = completion(content, json!({ "prompt_tokens": 3, "completion_tokens": 1 }));
        let (base_url, server) = serve_once("200 OK", body);

        let response = local_model(base_url)
            .invoke(&roles::qa(), "{}")
            .unwrap();
        server.join().unwrap();

        assert!(response.payload().is_none());
        assert_eq!(response.usage(), Usage::new(3, 1));
    }

    #[test]
    fn invoke_extracts_fenced_payload_and_usage() {
        let content = "```json\n{\"reasoning\": \"looks correct\", \"correct\": true}\n```";
        let body = completion(
            json!(content),
            json!({ "prompt_tokens": 120, "completion_tokens": 45, "total_tokens": 165 }),
        );
        let (base_url, server) = serve_once("200 OK", body);

        let response = local_model(base_url)
            .invoke(&roles::qa(), "{\"game_description\": \"pong\"}")
            .unwrap();
        let request = server.join().unwrap();

        assert_eq!(
            response.payload(),
            Some(&json!({ "reasoning": "looks correct", "correct": true }))
        );
        assert_eq!(response.usage(), Usage::new(120, 45));

        let lowered = request.to_lowercase();
        assert!(request.starts_with("POST /openai/v1/chat/completions "));
        assert!(lowered.contains("authorization: bearer test-key"));
        assert!(request.contains("\"json_object\""));
        assert!(request.contains("llama-3.3-70b-versatile"));
    }

    #[rstest]
    #[case::bare(r#"{"correct": true}"#)]
    #[case::padded("\n  {\"correct\": true}  \n")]
    #[case::json_fence("```json\n{\"correct\": true}\n```")]
    #[case::plain_fence("```\n{\"correct\": true}\n```")]
    fn extracts_json_objects(#[case] content: &str) {
        assert_eq!(extract_payload(content), Some(json!({ "correct": true })));
    }

    #[rstest]
    #[case::prose("Sure! Here is your game.")]
    #[case::array("[1, 2, 3]")]
    #[case::truncated(r#"{"code": "<html>"#)]
    #[case::empty("")]
    fn rejects_non_objects(#[case] content: &str) {
        assert_eq!(extract_payload(content), None);
    }

    #[test]
    fn system_message_lists_instructions_and_schema() {
        let role = roles::qa();
        let message = system_message(&role);

        assert!(message.starts_with(role.description()));
        for instruction in role.instructions() {
            assert!(message.contains(&format!("- {instruction}")));
        }
        assert!(message.contains("QAOutput"));
        assert!(message.contains("\"correct\""));
    }

    #[rstest]
    #[case::plain("https://api.groq.com/openai/v1")]
    #[case::trailing_slash("https://api.groq.com/openai/v1/")]
    fn completions_url_joins_cleanly(#[case] base: &str) {
        assert_eq!(
            completions_url(base),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn request_asks_for_json_object() {
        let request = ChatRequest {
            model: "llama-3.3-70b-versatile",
            messages: [
                Message {
                    role: "system",
                    content: "sys",
                },
                Message {
                    role: "user",
                    content: "pong",
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"], json!({ "type": "json_object" }));
        assert_eq!(value["messages"][1], json!({ "role": "user", "content": "pong" }));
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn response_without_content_has_no_payload() {
        let body: ChatResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "role": "assistant" } }] }))
                .unwrap();
        assert!(body.choices[0].message.content.is_none());
        assert!(body.usage.is_none());
    }
}
