//! Token metadata URI resolution and fetching.
//!
//! Supported URI forms:
//! - `ipfs://<cid>/<path>` through the configured gateway
//! - `ar://<id>` through `https://arweave.net/`
//! - `data:application/json[;base64],<payload>` decoded inline
//! - `http(s)://` fetched as-is
//!
//! Every failure surfaces as a [`TokenError`] with kind `MetadataError`.

use alloy::primitives::U256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use url::Url;

use crate::tokens::types::TokenError;

const ARWEAVE_GATEWAY: &str = "https://arweave.net/";

/// Where a metadata document lives.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataSource {
    Remote(Url),
    Inline(Value),
}

/// Replace the ERC1155 `{id}` placeholder with the 64-digit lowercase hex id.
pub fn substitute_id(uri: &str, token_id: U256) -> String {
    let hex = format!("{token_id:x}");
    uri.replace("{id}", &format!("{hex:0>64}"))
}

fn gateway_url(uri: &str, gateway: &str) -> Option<String> {
    if let Some(path) = uri.strip_prefix("ipfs://") {
        let path = path.strip_prefix("ipfs/").unwrap_or(path);
        return Some(format!("{gateway}{path}"));
    }
    uri.strip_prefix("ar://")
        .map(|id| format!("{ARWEAVE_GATEWAY}{id}"))
}

/// Rewrite a URI to something fetchable, without fetching it.
pub fn resolve_uri(uri: &str, ipfs_gateway: &str) -> Result<MetadataSource, TokenError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(TokenError::metadata("token URI is empty"));
    }

    if let Some(rest) = uri.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| TokenError::metadata("malformed data URI"))?;
        if !header.starts_with("application/json") {
            return Err(TokenError::metadata(format!(
                "unsupported data URI media type '{header}'"
            )));
        }
        let bytes = if header.ends_with(";base64") {
            STANDARD
                .decode(payload)
                .map_err(|e| TokenError::metadata(format!("invalid base64 metadata: {e}")))?
        } else {
            payload.as_bytes().to_vec()
        };
        let document = serde_json::from_slice(&bytes)
            .map_err(|e| TokenError::metadata(format!("invalid metadata JSON: {e}")))?;
        return Ok(MetadataSource::Inline(document));
    }

    let target = gateway_url(uri, ipfs_gateway).unwrap_or_else(|| uri.to_string());
    let url = Url::parse(&target)
        .map_err(|e| TokenError::metadata(format!("unsupported token URI '{uri}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(MetadataSource::Remote(url)),
        scheme => Err(TokenError::metadata(format!(
            "unsupported token URI scheme '{scheme}'"
        ))),
    }
}

/// Resolve an `image` field the same way as a document URI (no fetch).
pub fn resolve_image(metadata: &Value, ipfs_gateway: &str) -> Option<String> {
    let image = metadata.get("image").and_then(Value::as_str)?;
    if image.starts_with("data:") {
        return Some(image.to_string());
    }
    Some(gateway_url(image, ipfs_gateway).unwrap_or_else(|| image.to_string()))
}

/// Resolve and read a metadata document. Returns the fetched location (if
/// any) and the JSON object.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    uri: &str,
    ipfs_gateway: &str,
) -> Result<(Option<Url>, Value), TokenError> {
    let (location, document) = match resolve_uri(uri, ipfs_gateway)? {
        MetadataSource::Inline(document) => (None, document),
        MetadataSource::Remote(url) => {
            tracing::debug!(host = url.host_str().unwrap_or_default(), "Fetching token metadata");
            let response = client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| TokenError::metadata(format!("failed to fetch metadata: {e}")))?;
            let document = response
                .json::<Value>()
                .await
                .map_err(|e| TokenError::metadata(format!("invalid metadata JSON: {e}")))?;
            (Some(url), document)
        }
    };

    if !document.is_object() {
        return Err(TokenError::metadata("metadata is not a JSON object"));
    }
    Ok((location, document))
}
