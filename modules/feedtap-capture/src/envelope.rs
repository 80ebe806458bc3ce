// Envelope extraction: raw intercepted exchange → parsed GraphQL documents.
// Pure, never fails. Anything unexpected yields fewer envelopes, not an error.

use feedtap_common::RawExchange;
use serde_json::Value;
use tracing::debug;

/// One parsed JSON document from a GraphQL response body.
pub type Envelope = Value;

/// Streamed GraphQL responses concatenate documents one per line.
pub const DOCUMENT_DELIMITER: char = '\n';

#[derive(Debug, Clone)]
pub struct EnvelopeExtractor {
    graphql_path: String,
}

impl EnvelopeExtractor {
    pub fn new(graphql_path: impl Into<String>) -> Self {
        Self {
            graphql_path: graphql_path.into(),
        }
    }

    /// Whether the exchange targets the GraphQL endpoint. Query strings are ignored.
    pub fn matches_endpoint(&self, url: &str) -> bool {
        url::Url::parse(url)
            .map(|u| u.path() == self.graphql_path)
            .unwrap_or(false)
    }

    /// Every envelope carried by the exchange, in body order.
    pub fn extract(&self, exchange: &RawExchange) -> Vec<Envelope> {
        let Some(body) = exchange.body() else {
            return Vec::new();
        };
        if !self.matches_endpoint(&exchange.url) {
            return Vec::new();
        }
        split_documents(body)
    }
}

/// Split a possibly multi-document body and parse each piece on its own.
/// A piece that fails to parse is skipped; its neighbours survive.
pub fn split_documents(body: &[u8]) -> Vec<Envelope> {
    let text = String::from_utf8_lossy(body);
    let mut envelopes = Vec::new();

    for (index, piece) in text.split(DOCUMENT_DELIMITER).enumerate() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(piece) {
            Ok(doc) => envelopes.push(doc),
            Err(e) => debug!(index, error = %e, "envelope: skipping malformed fragment"),
        }
    }

    envelopes
}
