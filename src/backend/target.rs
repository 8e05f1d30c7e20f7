use crate::backend::BackendError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use std::io;
use url::Url;

pub const DEFAULT_SMITHERY_SERVER_URL: &str =
    "https://server.smithery.ai/@luminati-io/brightdata-mcp/mcp";

/// Where the extraction backend lives. Kept behind a trait so the credential
/// encoding can change without touching the dispatcher or the agent.
pub trait ConnectionTarget: Send + Sync {
    fn url(&self) -> Result<Url, BackendError>;
}

/// A fixed endpoint, e.g. a self-hosted MCP server.
#[derive(Debug, Clone)]
pub struct StaticTarget(pub Url);

impl ConnectionTarget for StaticTarget {
    fn url(&self) -> Result<Url, BackendError> {
        Ok(self.0.clone())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    #[serde(rename = "apiToken")]
    pub api_token: String,
    #[serde(rename = "browserAuth")]
    pub browser_auth: String,
    #[serde(rename = "webUnlockerZone")]
    pub web_unlocker_zone: String,
}

/// Hosted MCP gateway target: the credential bundle travels base64-encoded in the
/// `config` query parameter, next to a separate `api_key` parameter.
#[derive(Debug, Clone)]
pub struct SmitheryTarget {
    pub server_url: String,
    pub api_key: String,
    pub credentials: BackendCredentials,
}

impl SmitheryTarget {
    pub fn new(credentials: BackendCredentials, api_key: impl Into<String>) -> Self {
        Self {
            server_url: DEFAULT_SMITHERY_SERVER_URL.to_string(),
            api_key: api_key.into(),
            credentials,
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn encoded_config(&self) -> Result<String, BackendError> {
        let json = to_compat_json(&self.credentials)?;
        Ok(STANDARD.encode(json))
    }
}

impl ConnectionTarget for SmitheryTarget {
    fn url(&self) -> Result<Url, BackendError> {
        // The gateway expects the parameters verbatim, padding and all.
        let raw = format!(
            "{}?config={}&api_key={}",
            self.server_url,
            self.encoded_config()?,
            self.api_key
        );
        Url::parse(&raw).map_err(|e| BackendError::InvalidTarget(e.to_string()))
    }
}

/// Serializes with `", "` / `": "` separators and `\uXXXX` escapes for every
/// non-ASCII character, the layout the gateway's other clients produce.
fn to_compat_json<T: Serialize>(value: &T) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, CompatFormatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| BackendError::InvalidTarget(e.to_string()))?;
    Ok(out)
}

struct CompatFormatter;

impl Formatter for CompatFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units).iter() {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }

    fn write_char_escape<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        char_escape: CharEscape,
    ) -> io::Result<()> {
        let escaped: Vec<u8> = match char_escape {
            CharEscape::Quote => b"\\\"".to_vec(),
            CharEscape::ReverseSolidus => b"\\\\".to_vec(),
            CharEscape::Solidus => b"\\/".to_vec(),
            CharEscape::Backspace => b"\\b".to_vec(),
            CharEscape::FormFeed => b"\\f".to_vec(),
            CharEscape::LineFeed => b"\\n".to_vec(),
            CharEscape::CarriageReturn => b"\\r".to_vec(),
            CharEscape::Tab => b"\\t".to_vec(),
            CharEscape::AsciiControl(byte) => format!("\\u{:04x}", byte).into_bytes(),
        };
        writer.write_all(&escaped)
    }
}
