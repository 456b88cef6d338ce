use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::DecodeError;

/// A `data:` URI split into its MIME type and still-encoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub body: &'a str,
}

/// Splits `data:<mime>;base64,<body>` without decoding the body.
pub fn parse_data_uri(payload: &str) -> Result<DataUri<'_>, DecodeError> {
    let (header, body) = payload
        .split_once(',')
        .ok_or(DecodeError::MissingSeparator)?;
    let header = header.trim();
    let meta = header.strip_prefix("data:").unwrap_or(header);
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| DecodeError::NotBase64Tagged(header.to_string()))?;
    Ok(DataUri {
        mime,
        body: body.trim(),
    })
}

/**
 * Turns an asset payload into the raw bytes of the mesh bundle.
 *
 * Either the whole body decodes or an error is returned; a partially decoded
 * buffer is never handed out.
 */
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let uri = parse_data_uri(payload)?;
    if uri.body.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = STANDARD.decode(uri.body)?;
    log::debug!("decoded {} bytes of {}", bytes.len(), uri.mime);
    Ok(bytes)
}

/// Encodes bytes the way the authoring tool embeds assets.
pub fn encode_payload(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
