//! Identity verification submission.
//!
//! Sends the ID details, the ID document image and the liveness selfie to the
//! backend as one `multipart/form-data` request. The submission is borrowed,
//! so a rejected or failed request can be retried with the same selfie.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::session::Selfie;

pub const SUBMIT_PATH: &str = "/verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    NationalId,
    Passport,
    DriversLicense,
    VotersCard,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NationalId => "national_id",
            Self::Passport => "passport",
            Self::DriversLicense => "drivers_license",
            Self::VotersCard => "voters_card",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "national_id" | "nin" => Ok(Self::NationalId),
            "passport" => Ok(Self::Passport),
            "drivers_license" | "drivers_licence" => Ok(Self::DriversLicense),
            "voters_card" => Ok(Self::VotersCard),
            other => Err(SubmissionError::Invalid(format!("unknown ID type '{other}'"))),
        }
    }
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct VerificationSubmission {
    pub id_type: IdType,
    pub id_number: String,
    pub id_document: Upload,
    pub selfie: Selfie,
}

impl VerificationSubmission {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if self.id_number.trim().is_empty() {
            return Err(SubmissionError::Invalid("ID number is required".into()));
        }
        if self.id_document.bytes.is_empty() {
            return Err(SubmissionError::Invalid("ID document image is empty".into()));
        }
        if self.selfie.jpeg.is_empty() {
            return Err(SubmissionError::Invalid("selfie image is empty".into()));
        }
        Ok(())
    }

    fn to_form(&self) -> Result<Form, SubmissionError> {
        let id_image = Part::bytes(self.id_document.bytes.clone())
            .file_name(self.id_document.file_name.clone())
            .mime_str(&self.id_document.content_type)?;
        let selfie = Part::bytes(self.selfie.jpeg.clone())
            .file_name("selfie.jpg")
            .mime_str("image/jpeg")?;

        Ok(Form::new()
            .text("idType", self.id_type.as_str())
            .text("idNumber", self.id_number.trim().to_string())
            .part("idImage", id_image)
            .part("selfie", selfie))
    }
}

/// The backend accepted the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub status: u16,
    pub message: Option<String>,
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    Invalid(String),
    #[error("verification rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SubmissionError {
    /// Whether resubmitting the same payload may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Invalid(_) => false,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
        }
    }
}

/// HTTP client for the verification endpoint.
#[derive(Clone)]
pub struct SubmissionClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SubmissionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SubmissionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{SUBMIT_PATH}", self.base_url)
    }

    pub async fn submit(
        &self,
        submission: &VerificationSubmission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        submission.validate()?;
        let form = submission.to_form()?;

        tracing::info!(
            endpoint = %self.endpoint(),
            id_type = %submission.id_type,
            selfie_bytes = submission.selfie.jpeg.len(),
            "submitting verification"
        );

        let mut request = self.http.post(self.endpoint()).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            tracing::warn!(status, error = %e, "failed to read verification response");
            SubmissionError::Transport(e)
        })?;

        let outcome = interpret_response(status, &body);
        match &outcome {
            Ok(_) => tracing::info!(status, "verification accepted"),
            Err(e) => tracing::warn!(status, error = %e, "verification not accepted"),
        }
        outcome
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    message: Option<String>,
    error: Option<String>,
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message.or(m.error))
}

fn interpret_response(status: u16, body: &str) -> Result<SubmissionReceipt, SubmissionError> {
    let message = extract_message(body);
    if (200..300).contains(&status) {
        return Ok(SubmissionReceipt { status, message });
    }
    let message = message.unwrap_or_else(|| {
        let raw = body.trim();
        if raw.is_empty() {
            format!("HTTP {status}")
        } else {
            raw.to_string()
        }
    });
    Err(SubmissionError::Rejected { status, message })
}
