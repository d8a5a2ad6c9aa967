//! Decoder options and demo-server configuration.
//!
//! Server addresses are given as URLs:
//! - `resp://host[:port]`
//! - `resp://host[:port]?raw_bytes=true&big_numbers_as_text=false`

use crate::error::{Error, Result};

/// Default port of the demo server.
pub const DEFAULT_PORT: u16 = 5000;

/// Default socket read size (64 KB).
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// How decoded strings and integers are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Return simple and bulk strings as raw bytes instead of text.
    pub return_raw_bytes: bool,
    /// Return integers as their exact decimal text.
    pub return_big_numbers_as_text: bool,
}

impl DecoderConfig {
    pub fn builder() -> DecoderConfigBuilder {
        DecoderConfigBuilder::default()
    }

    /// Set an option from untyped input, e.g. a URL query or CLI flag.
    ///
    /// Values must be exactly `true` or `false`.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        let enabled = parse_bool(name, value)?;
        match name {
            "raw_bytes" | "return_raw_bytes" => self.return_raw_bytes = enabled,
            "big_numbers_as_text" | "return_big_numbers_as_text" => {
                self.return_big_numbers_as_text = enabled
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown decoder option: {name}"
                )))
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidArgument(format!(
            "the {name} option has to be a boolean, got {value:?}"
        ))),
    }
}

/// Builder for [`DecoderConfig`].
#[derive(Debug, Default)]
pub struct DecoderConfigBuilder {
    config: DecoderConfig,
}

impl DecoderConfigBuilder {
    pub fn return_raw_bytes(mut self, enabled: bool) -> Self {
        self.config.return_raw_bytes = enabled;
        self
    }

    pub fn return_big_numbers_as_text(mut self, enabled: bool) -> Self {
        self.config.return_big_numbers_as_text = enabled;
        self
    }

    pub fn build(self) -> DecoderConfig {
        self.config
    }
}

/// Configuration of the demo key/value server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum bytes read from a socket per chunk.
    pub read_buffer: usize,
    /// Options applied to every connection's decoder.
    pub decoder: DecoderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            read_buffer: DEFAULT_READ_BUFFER,
            decoder: DecoderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a `resp://` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| Error::InvalidArgument(format!("invalid URL, missing ://: {url}")))?;
        if scheme != "resp" {
            return Err(Error::InvalidArgument(format!(
                "unknown URL scheme: {scheme}"
            )));
        }

        let (authority, query) = split_query(rest);
        let authority = authority.trim_end_matches('/');
        parse_host_port(authority, &mut config.host, &mut config.port)?;

        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| {
                    Error::InvalidArgument(format!("option without value: {pair}"))
                })?;
                if name == "read_buffer" {
                    config.read_buffer = value.parse().map_err(|_| {
                        Error::InvalidArgument(format!("invalid read_buffer: {value}"))
                    })?;
                } else {
                    config.decoder.set_option(name, value)?;
                }
            }
        }

        if config.read_buffer == 0 {
            return Err(Error::InvalidArgument("read_buffer must be positive".into()));
        }
        Ok(config)
    }

    /// Return the listen address as "host:port".
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

// ── URL parsing helpers ────────────────────────────────────────────

/// Split `rest` into (before_query, Some(query)) or (rest, None).
fn split_query(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('?') {
        Some((before, after)) if !after.is_empty() => (before, Some(after)),
        Some((before, _)) => (before, None),
        None => (rest, None),
    }
}

/// Parse `host[:port]` or `[ipv6]:port`.
fn parse_host_port(s: &str, host: &mut String, port: &mut u16) -> Result<()> {
    if s.starts_with('[') {
        let close = s
            .find(']')
            .ok_or_else(|| Error::InvalidArgument(format!("unclosed IPv6 bracket: {s}")))?;
        *host = s[1..close].to_string();
        if let Some(port_str) = s[close + 1..].strip_prefix(':') {
            *port = port_str
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid port: {port_str}")))?;
        }
    } else if let Some((h, p)) = s.rsplit_once(':') {
        *port = p
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("invalid port: {p}")))?;
        *host = h.to_string();
    } else {
        *host = s.to_string();
    }

    if host.is_empty() {
        *host = "127.0.0.1".to_string();
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────
