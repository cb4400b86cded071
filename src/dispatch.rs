use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Request body for the chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    /// Base64 photo payload; always empty for voice-derived messages
    image: &'a str,
}

/// Reply from the chat endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    /// Markdown-ish reply text
    pub reply: String,
    /// Reply category reported by the backend ("general", "error", ...)
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Collaborator performing the whole send-and-render-reply cycle.
///
/// The voice pipeline only ever hands over plain text; it does not
/// interpret the reply.
#[cfg_attr(test, mockall::automock)]
pub trait MessageDispatcher {
    /// Sends one user message and returns the backend's reply
    ///
    /// # Errors
    /// Returns error if the message cannot be delivered at all
    fn dispatch(&mut self, text: &str) -> Result<ChatReply>;
}

/// Dispatches messages to the institute chat backend over HTTP.
///
/// POSTs `{"message", "image"}` JSON to `{base_url}/api/chat`. When the
/// backend is unreachable the dispatcher degrades to keyword-routed canned
/// replies instead of failing, so the widget stays useful offline.
pub struct HttpDispatcher {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpDispatcher {
    /// Creates a dispatcher for the given backend base URL
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn post_chat(&self, text: &str) -> Result<ChatReply> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            message: text,
            image: "",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .with_context(|| format!("failed to reach chat backend at {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("chat backend returned status {}", response.status());
        }

        let reply: ChatReply = response
            .json()
            .context("failed to parse chat backend reply")?;

        info!(kind = reply.kind, reply_len = reply.reply.len(), "chat reply received");
        Ok(reply)
    }
}

impl MessageDispatcher for HttpDispatcher {
    fn dispatch(&mut self, text: &str) -> Result<ChatReply> {
        match self.post_chat(text) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(error = %e, "chat backend unavailable, using fallback reply");
                Ok(fallback_reply(text))
            }
        }
    }
}

/// Keyword-routed canned replies used when the backend is unreachable
#[must_use]
pub fn fallback_reply(message: &str) -> ChatReply {
    let lower = message.to_lowercase();

    let reply = if lower.contains("admission") {
        "**Admission Process:**\nFor detailed admission information, please contact the \
         admission office at +91-8192-222245 or visit www.bietdvg.edu"
    } else if lower.contains("fee") {
        "**Fee Structure:**\nFee details vary by program. Please contact the accounts \
         office for current fee structure."
    } else if lower.contains("placement") {
        "**Placements:**\nBIET has excellent placement records with top companies \
         visiting campus. Average package is around 6-7 LPA."
    } else if lower.contains("hostel") {
        "**Hostel Facilities:**\nSeparate hostels for boys and girls with modern \
         amenities, WiFi, and mess facilities."
    } else {
        "I'm currently experiencing connectivity issues. Please try again shortly or \
         contact the institute directly."
    };

    ChatReply {
        reply: reply.to_owned(),
        kind: "general".to_owned(),
    }
}
