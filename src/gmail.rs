use crate::dispatch::{BulkModify, ModifyFailure};
use crate::models;
use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::Gmail;
use google_gmail1::api::{BatchModifyMessagesRequest, Message, MessagePart, Scope};
use google_gmail1::client::GetToken;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use std::time::Duration;
use tracing::debug;

pub const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/";

#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
    timeout: Duration,
}

impl GmailClient {
    /// `timeout` bounds each batchModify call.
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>, timeout: Duration) -> Self {
        Self { hub, timeout }
    }

    /// Builds a hub for the API rooted at `base_url`, normally [`GMAIL_BASE_URL`].
    pub fn connect<A: GetToken + 'static>(
        auth: A,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let mut hub = Gmail::new(hyper::Client::builder().build(connector), auth);
        hub.base_url(format!("{}/", base_url.trim_end_matches('/')));
        Ok(Self::new(hub, timeout))
    }

    pub async fn list_messages(
        &self,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let mut req = self
            .hub
            .users()
            .messages_list("me")
            .max_results(max_results);

        if let Some(token) = &page_token {
            req = req.page_token(token);
        }

        let (_, message_list) = req.doit().await.context("Failed to list messages")?;

        let ids = message_list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        Ok((ids, message_list.next_page_token))
    }

    pub async fn get_message(&self, id: &str) -> Result<models::Record> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .doit()
            .await
            .context(format!("Failed to get message {}", id))?;

        Ok(to_record(id, msg))
    }

    async fn send(
        &self,
        request: &BatchModifyMessagesRequest,
    ) -> std::result::Result<(), ModifyFailure> {
        let result = self
            .hub
            .users()
            .messages_batch_modify(request.clone(), "me")
            .add_scope(Scope::Modify)
            .doit()
            .await;

        match result {
            Ok(_) => {
                debug!(
                    "batchModify of {} ids done",
                    request.ids.as_ref().map_or(0, Vec::len)
                );
                Ok(())
            }
            Err(e) => Err(modify_failure(e).await),
        }
    }
}

#[async_trait]
impl BulkModify for GmailClient {
    async fn batch_modify(
        &self,
        request: &BatchModifyMessagesRequest,
    ) -> std::result::Result<(), ModifyFailure> {
        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(ModifyFailure {
                status: None,
                detail: format!("batchModify timed out after {:?}", self.timeout),
            }),
        }
    }
}

/// Keeps the HTTP status and body when the server answered, otherwise just
/// the error text.
async fn modify_failure(error: google_gmail1::Error) -> ModifyFailure {
    match error {
        google_gmail1::Error::Failure(response) => {
            let status = response.status().as_u16();
            let detail = match hyper::body::to_bytes(response.into_body()).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => e.to_string(),
            };
            ModifyFailure {
                status: Some(status),
                detail,
            }
        }
        // JSON error bodies: {"error": {"code": 400, "message": ...}}
        google_gmail1::Error::BadRequest(body) => ModifyFailure {
            status: body
                .pointer("/error/code")
                .and_then(serde_json::Value::as_u64)
                .and_then(|code| u16::try_from(code).ok()),
            detail: body.to_string(),
        },
        other => ModifyFailure {
            status: None,
            detail: other.to_string(),
        },
    }
}

/// Flattens a message fetched in `full` format: From and Subject headers,
/// the concatenated text/plain parts (snippet when there are none) and the
/// internal date.
pub fn to_record(id: &str, msg: Message) -> models::Record {
    let mut recv_from = String::new();
    let mut subject = String::new();

    if let Some(headers) = msg.payload.as_ref().and_then(|p| p.headers.as_ref()) {
        for header in headers {
            match header.name.as_deref() {
                Some("From") => recv_from = header.value.clone().unwrap_or_default(),
                Some("Subject") => subject = header.value.clone().unwrap_or_default(),
                _ => {}
            }
        }
    }

    let message = msg
        .payload
        .as_ref()
        .and_then(|payload| extract_text_body(payload, "text/plain"))
        .or(msg.snippet)
        .unwrap_or_default();

    models::Record {
        email_id: msg.id.unwrap_or_else(|| id.to_string()),
        recv_from,
        subject,
        message,
        date: msg.internal_date.unwrap_or(0),
    }
}

// Body data arrives already base64-decoded.
fn extract_text_body(part: &MessagePart, mime_type: &str) -> Option<String> {
    if part.mime_type.as_deref() == Some(mime_type) {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
            return Some(String::from_utf8_lossy(data).into_owned());
        }
    }

    if let Some(parts) = &part.parts {
        let mut full_body = String::new();
        for p in parts {
            if let Some(body) = extract_text_body(p, mime_type) {
                full_body.push_str(&body);
            }
        }
        if !full_body.is_empty() {
            return Some(full_body);
        }
    }

    None
}
