// src/generator.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::template::{Template, TemplateExercise};
use crate::validation::{Error as ValidationError, MIN_FOCUS_LEN};

pub const MIN_GENERATED_EXERCISES: usize = 3;
pub const MAX_GENERATED_EXERCISES: usize = 6;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),
    #[error("Request to the generation service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Generation service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("The model did not return any output.")]
    EmptyOutput,
    #[error("The model output is not a valid template: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("The generated template is unusable: {0}")]
    Schema(String),
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Level {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Goal {
    Bulking,
    Cutting,
    #[default]
    Maintenance,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub focus: String,
    pub level: Level,
    pub goal: Goal,
    pub notes: Option<String>,
}

impl GenerateRequest {
    /// # Errors
    /// `FocusTooShort` when the focus has fewer than three characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.focus.trim().chars().count() < MIN_FOCUS_LEN {
            return Err(ValidationError::FocusTooShort);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTemplate {
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
    pub rest_time: u32,
}

impl GeneratedTemplate {
    /// Rejects output that does not fit a template: blank names, 3 to 6 exercises, positive rest.
    /// # Errors
    /// `Error::Schema` describing the first violation.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Schema("missing template name".to_string()));
        }
        let count = self.exercises.len();
        if !(MIN_GENERATED_EXERCISES..=MAX_GENERATED_EXERCISES).contains(&count) {
            return Err(Error::Schema(format!(
                "expected {MIN_GENERATED_EXERCISES} to {MAX_GENERATED_EXERCISES} exercises, got {count}"
            )));
        }
        if self.exercises.iter().any(|e| e.name.trim().is_empty()) {
            return Err(Error::Schema("exercise without a name".to_string()));
        }
        if self.rest_time == 0 {
            return Err(Error::Schema("rest time must be positive".to_string()));
        }
        Ok(())
    }

    /// A stored template with no assigned days yet.
    #[must_use]
    pub fn into_template(self, id: String) -> Template {
        Template {
            id,
            name: self.name.trim().to_string(),
            exercises: self
                .exercises
                .into_iter()
                .map(|e| TemplateExercise::new(e.name.trim()))
                .collect(),
            assigned_days: Vec::new(),
            rest_time: self.rest_time,
        }
    }
}

/// Turns a description of the desired workout into a template.
#[async_trait]
pub trait TemplateGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedTemplate, Error>;
}

/// Instructions sent to the model.
#[must_use]
pub fn build_prompt(request: &GenerateRequest) -> String {
    let mut prompt = format!(
        "Act as an experienced strength coach and design one workout template.\n\n\
         Workout focus: {}\nExperience level: {}\nPrimary goal: {}\n",
        request.focus.trim(),
        request.level,
        request.goal
    );
    if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str(&format!("Additional notes: {notes}\n"));
    }
    prompt.push_str(&format!(
        "\nReply with a single JSON object and nothing else, shaped as \
         {{\"name\": string, \"exercises\": [{{\"name\": string}}], \"restTime\": integer}}.\n\
         - name: three or four words describing the workout.\n\
         - exercises: between {MIN_GENERATED_EXERCISES} and {MAX_GENERATED_EXERCISES} exercises matching the focus, level and goal. \
         Exercise names only, no sets or reps.\n\
         - restTime: seconds of rest between sets, for example 60, 90, 120 or 180.\n"
    ));
    prompt
}

// Wire types of the generateContent endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

/// Strips a Markdown code fence some models wrap around JSON.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Calls a Gemini-style `generateContent` endpoint that answers in JSON.
#[derive(Clone, Debug)]
pub struct HttpTemplateGenerator {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpTemplateGenerator {
    /// # Errors
    /// `Error::Request` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TemplateGenerator for HttpTemplateGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedTemplate, Error> {
        let url = self.url();
        info!(
            "Requesting template from {} (focus: '{}', level: {}, goal: {})",
            url, request.focus, request.level, request.goal
        );

        let body = ContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_prompt(request)),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            error!(
                "Generation request failed with status: {}. Body: {}",
                status, error_body
            );
            return Err(Error::Status {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let parsed: ContentResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
            .ok_or(Error::EmptyOutput)?;
        debug!("Model output: {}", text);

        let generated: GeneratedTemplate = serde_json::from_str(strip_code_fence(&text))?;
        generated.validate()?;
        info!(
            "Generated template '{}' with {} exercises",
            generated.name,
            generated.exercises.len()
        );
        Ok(generated)
    }
}
