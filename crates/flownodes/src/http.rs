use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor, Value};
use serde::Deserialize;
use std::collections::HashMap;

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecuteRequestConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Sent as JSON, or as plain text when it is a string.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// HTTP request activity
pub struct ExecuteRequestExecutor {
    client: reqwest::Client,
}

impl Default for ExecuteRequestExecutor {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ActivityExecutor for ExecuteRequestExecutor {
    type Config = ExecuteRequestConfig;

    async fn execute(&self, ctx: &ActivityContext<ExecuteRequestConfig>) -> Result<(), ActivityError> {
        let activity = ctx.activity();
        let url = activity.url.as_str();
        tracing::info!("{} {}", activity.method, url);

        let mut request = match activity.method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            other => {
                return Err(ActivityError::Configuration(format!(
                    "Unsupported method: {}",
                    other
                )))
            }
        };

        request = match &activity.body {
            Some(serde_json::Value::String(text)) => request.body(text.clone()),
            Some(json) => request.json(json),
            None => request,
        };
        for (key, value) in &activity.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActivityError::caused_by(format!("HTTP request to {} failed", url), e))?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| ActivityError::caused_by("Failed to read response", e))?;
        tracing::info!("Response status: {}", status);

        // JSON bodies are kept structured so later activities can walk them
        let body = match serde_json::from_str::<serde_json::Value>(&body_text) {
            Ok(json) if json.is_object() || json.is_array() => Value::Json(json),
            _ => Value::String(body_text),
        };

        let mut outputs = HashMap::new();
        outputs.insert("status".to_string(), Value::Number(f64::from(status)));
        outputs.insert("body".to_string(), body);
        ctx.set_output_variables(outputs).await
    }
}
