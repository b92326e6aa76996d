//! Data-URL codec: binary blob ⇄ `data:<mime>;base64,<payload>`.
//!
//! Both ends of the pipeline speak data-URLs. The upload arrives as one (or is
//! turned into one), the provider receives its MIME type and base64 payload,
//! and the rendered image leaves as one. Keeping the two directions in a
//! single module means the parser always accepts what the encoder produces.
//!
//! ## Decode rules
//!
//! ```text
//! data:image/png;base64,iVBORw0KGgo…
//! └──┘ └───────┘└─────┘ └──────────┘
//! scheme  mime   marker    payload
//! ```
//!
//! * no `data:` scheme, no `,`, or a header not ending in `;base64` →
//!   [`RenderError::MalformedDataUrl`]
//! * empty MIME type or empty payload → [`RenderError::InvalidPayload`]
//!
//! Extra parameters between the MIME type and the marker
//! (`data:image/png;name=plan.png;base64,…`) are tolerated and dropped.

use crate::error::RenderError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// A `data:<mime>;base64,<payload>` string.
///
/// Construction does not validate; [`decode`] does. This lets a caller hold a
/// user-supplied value and still get the precise decode error later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataUrl(String);

impl DataUrl {
    /// Wrap a string that is expected to be a data-URL.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Assemble a data-URL from an already base64-encoded payload.
    pub fn from_parts(mime_type: &str, payload: &str) -> Self {
        Self(format!("{SCHEME}{mime_type}{BASE64_MARKER},{payload}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split into MIME type and payload. See [`decode`].
    pub fn decode(&self) -> Result<Decoded<'_>, RenderError> {
        decode(self)
    }

    /// Short prefix for log lines; payloads can be megabytes long.
    pub fn preview(&self) -> String {
        const MAX: usize = 50;
        match self.0.char_indices().nth(MAX) {
            Some((cut, _)) => format!("{}…", &self.0[..cut]),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DataUrl {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for DataUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check whether a string uses the `data:` scheme.
pub fn is_data_url(input: &str) -> bool {
    input.starts_with(SCHEME)
}

/// An in-memory binary resource with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// The two halves of a decoded data-URL, borrowed from the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub mime_type: &'a str,
    /// Still base64-encoded; providers take it in this form.
    pub payload: &'a str,
}

/// Read `reader` to the end and encode the bytes as a data-URL.
///
/// Fails with [`RenderError::Read`] if the source errors before EOF.
pub async fn encode<R>(mut reader: R, mime_type: &str) -> Result<DataUrl, RenderError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .await
        .map_err(|source| RenderError::Read { source })?;
    Ok(encode_bytes(mime_type, &bytes))
}

/// Encode an in-memory blob as a data-URL.
pub fn encode_blob(blob: &Blob) -> DataUrl {
    encode_bytes(&blob.mime_type, &blob.bytes)
}

fn encode_bytes(mime_type: &str, bytes: &[u8]) -> DataUrl {
    let payload = STANDARD.encode(bytes);
    debug!(
        "Encoded {} bytes of {} → {} bytes base64",
        bytes.len(),
        mime_type,
        payload.len()
    );
    DataUrl::from_parts(mime_type, &payload)
}

/// Split a data-URL into its MIME type and base64 payload.
pub fn decode(data_url: &DataUrl) -> Result<Decoded<'_>, RenderError> {
    let rest = data_url
        .as_str()
        .strip_prefix(SCHEME)
        .ok_or_else(|| malformed("missing 'data:' scheme"))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' before the payload"))?;

    if !header.ends_with(BASE64_MARKER) {
        return Err(malformed("missing ';base64,' marker"));
    }

    let mime_type = header.split(';').next().unwrap_or_default().trim();

    if mime_type.is_empty() {
        return Err(RenderError::InvalidPayload {
            reason: "empty MIME type".into(),
        });
    }
    if payload.is_empty() {
        return Err(RenderError::InvalidPayload {
            reason: "empty payload".into(),
        });
    }

    Ok(Decoded { mime_type, payload })
}

fn malformed(reason: &str) -> RenderError {
    RenderError::MalformedDataUrl {
        reason: reason.to_string(),
    }
}
