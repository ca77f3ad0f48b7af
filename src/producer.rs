//! NATS reply publisher for service responses

use crate::types::response::ErrorResponse;
use anyhow::{Context, Result};
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes replies to the inbox of a request
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    /// Create a new reply publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reply with raw bytes
    pub async fn reply_bytes(&self, request: &Message, payload: Vec<u8>) -> Result<()> {
        let Some(reply) = request.reply.clone() else {
            warn!(subject = %request.subject, "Request has no reply subject, dropping response");
            return Ok(());
        };

        let size = payload.len();
        self.client
            .publish(reply.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish reply to {}", reply))?;

        debug!(subject = %request.subject, reply = %reply, bytes = size, "Published reply");
        Ok(())
    }

    /// Reply with a JSON body
    pub async fn reply_json<T: Serialize>(&self, request: &Message, body: &T) -> Result<()> {
        self.reply_bytes(request, encode(body)?).await
    }

    /// Reply with an error body
    pub async fn reply_error(&self, request: &Message, error: &ErrorResponse) -> Result<()> {
        self.reply_json(request, error).await
    }
}

/// JSON-encode a reply body
pub fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(body).context("Failed to encode reply")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_reply() {
        let bytes = encode(&ErrorResponse::no_predictions()).unwrap();
        let decoded: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.error, "No predictions available");
        assert_eq!(decoded.kind, "not_found");
    }
}
