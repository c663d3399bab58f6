//! Delivery collaborators: document rendering and mail dispatch.
//!
//! Both sit behind async traits so the state machine can be driven with
//! fakes in tests. Rendering failures are errors; mail delivery reports a
//! plain `bool` because a missed email never fails an order.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::pipeline::export::{artifact_stem, strip_diagnostics};
use crate::types::{ComputationResult, OrderId, ProductTier};

const MAIL_SUBJECT: &str = "Deine kosmische Analyse ist fertig!";

// ============================================================================
// Document Rendering
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer failed: {0}")]
    Other(String),
}

/// Turns a computed profile into a deliverable document.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render and return the location of the written artifact. The
    /// location is unique per order.
    async fn render(&self, order_id: OrderId, result: &ComputationResult, tier: ProductTier)
        -> Result<PathBuf, RenderError>;

    fn renderer_name(&self) -> &'static str;
}

/// Writes the customer document as JSON into the documents directory.
pub struct JsonDocumentRenderer {
    documents_dir: PathBuf,
}

impl JsonDocumentRenderer {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    fn path_for(&self, order_id: OrderId, result: &ComputationResult, tier: ProductTier) -> PathBuf {
        let stem = artifact_stem(&result.person.name, &result.person.birth_date);
        self.documents_dir.join(format!("{stem}_{tier}_{order_id}.json"))
    }
}

#[async_trait]
impl DocumentRenderer for JsonDocumentRenderer {
    async fn render(
        &self,
        order_id: OrderId,
        result: &ComputationResult,
        tier: ProductTier,
    ) -> Result<PathBuf, RenderError> {
        let path = self.path_for(order_id, result, tier);
        let document = json!({
            "title": format!("Kosmisches Profil für {}", result.person.name),
            "tier": tier,
            "profile": strip_diagnostics(serde_json::to_value(result)?),
        });
        let body = serde_json::to_vec_pretty(&document)?;

        tokio::fs::create_dir_all(&self.documents_dir)
            .await
            .map_err(|source| RenderError::Io {
                path: self.documents_dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, body).await.map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), tier = %tier, "Document rendered");
        Ok(path)
    }

    fn renderer_name(&self) -> &'static str {
        "json"
    }
}

// ============================================================================
// Mail Dispatch
// ============================================================================

/// Sends a rendered document to the customer.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// `true` only if the relay accepted the message.
    async fn send(&self, to_email: &str, to_name: &str, document: &Path) -> bool;

    fn mailer_name(&self) -> &'static str;
}

/// HTTP mailer when an API key is configured, otherwise [`DisabledMailer`].
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    if !config.is_enabled() {
        warn!("No mail API key configured, delivery disabled");
        return Arc::new(DisabledMailer);
    }
    match HttpMailer::new(config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "Failed to build mail client, delivery disabled");
            Arc::new(DisabledMailer)
        }
    }
}

/// Posts a transactional mail request to a relay.
///
/// The relay speaks the common `sender` / `to` / `subject` JSON shape with
/// the key in an `api-key` header. The document travels as a base64
/// attachment.
pub struct HttpMailer {
    http: reqwest::Client,
    relay_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            relay_url: config.relay_url.clone(),
            api_key: config.api_key.clone(),
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        })
    }

    async fn try_send(&self, to_email: &str, to_name: &str, document: &Path) -> Result<(), String> {
        let content = tokio::fs::read(document)
            .await
            .map_err(|e| format!("cannot read {}: {e}", document.display()))?;
        let payload = self.payload(to_email, to_name, document, &content);

        let resp = self
            .http
            .post(&self.relay_url)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("relay returned status {}", resp.status()))
        }
    }

    /// Relay request with the document as a base64 attachment.
    fn payload(&self, to_email: &str, to_name: &str, document: &Path, content: &[u8]) -> serde_json::Value {
        let file_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": to_email, "name": to_name }],
            "subject": MAIL_SUBJECT,
            "htmlContent": greeting_html(to_name),
            "attachment": [{
                "content": STANDARD.encode(content),
                "name": file_name,
            }],
        })
    }
}

fn greeting_html(name: &str) -> String {
    format!(
        "<p>Hallo {},</p>\
         <p>deine persönliche kosmische Analyse ist fertig. Du findest sie im Anhang.</p>\
         <p>Herzliche Grüße</p>",
        escape_html(name)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to_email: &str, to_name: &str, document: &Path) -> bool {
        match self.try_send(to_email, to_name, document).await {
            Ok(()) => {
                info!(to = %to_email, "Document mailed");
                true
            }
            Err(e) => {
                warn!(to = %to_email, error = %e, "Mail delivery failed");
                false
            }
        }
    }

    fn mailer_name(&self) -> &'static str {
        "http"
    }
}

/// Used when no relay key is configured; never delivers.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, to_email: &str, _to_name: &str, document: &Path) -> bool {
        warn!(to = %to_email, document = %document.display(), "Mail delivery disabled, skipping");
        false
    }

    fn mailer_name(&self) -> &'static str {
        "disabled"
    }
}

/// Drop a rendered document. Missing files are not an error.
pub(crate) fn remove_document(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Document removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove document"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PersonInput, ResultMeta};

    fn result() -> ComputationResult {
        ComputationResult::empty(
            PersonInput::new("Anna Müller", "15.06.1990", "14:30", "Bensheim"),
            ResultMeta {
                version: "pro".into(),
                computed_at: chrono::Utc::now(),
                ayanamsa_model: "Lahiri".into(),
                ayanamsa_value: Some(23.85),
            },
        )
    }

    #[tokio::test]
    async fn test_json_renderer_writes_named_document() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = JsonDocumentRenderer::new(dir.path().join("pdfs"));

        let id = uuid::Uuid::new_v4();
        let path = renderer.render(id, &result(), ProductTier::Pro).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("Anna_Mueller_15061990_pro_{id}.json")
        );

        let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["tier"], "pro");
        assert_eq!(doc["profile"]["person"]["name"], "Anna Müller");
    }

    #[tokio::test]
    async fn test_disabled_mailer_never_delivers() {
        assert!(!DisabledMailer.send("anna@example.org", "Anna", Path::new("/nope.json")).await);
    }

    #[tokio::test]
    async fn test_http_mailer_missing_document_is_false() {
        let config = MailConfig {
            api_key: "key".into(),
            relay_url: "http://127.0.0.1:9/smtp/email".into(),
            timeout_secs: 1,
            ..MailConfig::default()
        };
        let mailer = HttpMailer::new(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(!mailer.send("anna@example.org", "Anna", &dir.path().join("missing.json")).await);
    }

    #[test]
    fn test_mail_payload_attaches_document() {
        let config = MailConfig {
            api_key: "key".into(),
            ..MailConfig::default()
        };
        let mailer = HttpMailer::new(&config).unwrap();
        let payload = mailer.payload(
            "anna@example.org",
            "Anna <Müller> & \"Co\"",
            Path::new("/docs/Anna_Mueller_15061990_pro.json"),
            b"{\"tier\":\"pro\"}",
        );

        let attachment = &payload["attachment"][0];
        assert_eq!(attachment["name"], "Anna_Mueller_15061990_pro.json");
        let decoded = STANDARD.decode(attachment["content"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, b"{\"tier\":\"pro\"}");
        assert!(payload.get("textContent").is_none());

        let html = payload["htmlContent"].as_str().unwrap();
        assert!(html.contains("Hallo Anna &lt;Müller&gt; &amp; &quot;Co&quot;,"));
        assert!(!html.contains("<Müller>"));
        assert_eq!(payload["to"][0]["name"], "Anna <Müller> & \"Co\"");
    }

    #[test]
    fn test_mailer_selection() {
        assert_eq!(mailer_from_config(&MailConfig::default()).mailer_name(), "disabled");
        let config = MailConfig {
            api_key: "key".into(),
            ..MailConfig::default()
        };
        assert_eq!(mailer_from_config(&config).mailer_name(), "http");
    }

    #[test]
    fn test_remove_missing_document_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        remove_document(&dir.path().join("gone.json"));
    }
}
