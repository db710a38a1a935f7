//! Typed Webex calls on top of the [`RequestExecutor`].
//!
//! Outbound text goes through [`WebexClient::send_chunked`], which splits it
//! to the platform's byte limit and posts the pieces one after another. The
//! pieces of one message are never sent in parallel; the recipient reads
//! them as consecutive messages.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::api::executor::RequestExecutor;
use crate::api::request::{MultipartField, OutboundRequest};
use crate::chunking::split_chunks;
use crate::error::ApiError;

/// A Webex person (only the fields the bridge uses).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// A Webex message (only the fields the bridge uses).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub person_id: String,
    #[serde(default)]
    pub person_email: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A 1:1 conversation with this email address.
    Person(String),
    /// An existing room.
    Room(String),
}

impl Target {
    pub fn person(email: impl Into<String>) -> Self {
        Target::Person(email.into())
    }

    pub fn room(id: impl Into<String>) -> Self {
        Target::Room(id.into())
    }

    fn field(&self) -> (&'static str, &str) {
        match self {
            Target::Person(email) => ("toPersonEmail", email),
            Target::Room(id) => ("roomId", id),
        }
    }
}

/// Webex REST client.
pub struct WebexClient {
    executor: RequestExecutor,
}

impl WebexClient {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// The underlying executor (for `start` / `close`).
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// The bot's own identity.
    pub async fn me(&self) -> Result<Person, ApiError> {
        let value = self.executor.send(&OutboundRequest::get("people/me")).await?;
        decode(value)
    }

    /// Messages in the 1:1 conversation with `person_email`, newest first.
    pub async fn list_direct_messages(
        &self,
        person_email: &str,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let request =
            OutboundRequest::get("messages/direct").with_query("personEmail", person_email);
        let list: ItemList<ChatMessage> = decode(self.executor.send(&request).await?)?;
        Ok(list.items)
    }

    /// Post one markdown message. The caller keeps it under the size limit.
    pub async fn post_text(&self, target: &Target, markdown: &str) -> Result<ChatMessage, ApiError> {
        let (key, value) = target.field();
        let request = OutboundRequest::post("messages").with_json(json!({
            key: value,
            "markdown": markdown,
        }));
        decode(self.executor.send(&request).await?)
    }

    /// Split `text` to `max_bytes` and post each piece in order.
    ///
    /// Stops at the first failed piece and returns its error; pieces already
    /// delivered stay delivered. Returns the number of messages sent.
    pub async fn send_chunked(
        &self,
        target: &Target,
        text: &str,
        max_bytes: usize,
    ) -> Result<usize, ApiError> {
        let chunks = split_chunks(text, max_bytes);
        let total = chunks.len();
        for chunk in &chunks {
            debug!(
                "Sending chunk {}/{total} ({} bytes)",
                chunk.index + 1,
                chunk.byte_len()
            );
            self.post_text(target, &chunk.text).await?;
        }
        Ok(total)
    }

    /// Post a message with a file attachment.
    pub async fn post_file(
        &self,
        target: &Target,
        markdown: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ChatMessage, ApiError> {
        let (key, value) = target.field();
        let request = OutboundRequest::post("messages").with_multipart(vec![
            MultipartField::text(key, value),
            MultipartField::text("markdown", markdown),
            MultipartField::file("files", file_name, "text/plain", bytes),
        ]);
        decode(self.executor.send(&request).await?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_deserializes_from_platform_shape() {
        let person: Person = decode(json!({
            "id": "bot-1",
            "displayName": "Bridge Bot",
            "emails": ["bot@webex.bot"],
            "orgId": "ignored"
        }))
        .unwrap();
        assert_eq!(person.id, "bot-1");
        assert_eq!(person.display_name, "Bridge Bot");
    }

    #[test]
    fn message_list_tolerates_missing_fields() {
        let list: ItemList<ChatMessage> = decode(json!({
            "items": [
                {"id": "m2", "roomId": "r", "personEmail": "me@example.com", "text": "hi"},
                {"id": "m1"}
            ]
        }))
        .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].text.as_deref(), Some("hi"));
        assert_eq!(list.items[1].person_email, "");
    }

    #[test]
    fn missing_items_is_empty_list() {
        let list: ItemList<ChatMessage> = decode(json!({})).unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn target_field_names() {
        assert_eq!(
            Target::person("me@example.com").field(),
            ("toPersonEmail", "me@example.com")
        );
        assert_eq!(Target::room("r1").field(), ("roomId", "r1"));
    }
}
