use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Outbound mail queue. Delivery happens elsewhere; callers never wait on it.
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn enqueue(&self, email: OutboundEmail) -> Result<Uuid, StoreError>;
}
