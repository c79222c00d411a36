//! # Value Validation
//!
//! Pattern and format checks called by generated validators. Both return the
//! structured error directly so the caller can push it into its aggregate.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{internal_error, invalid_format_error, invalid_pattern_error, ServiceError};

// =============================================================================
// Formats
// =============================================================================

/// String formats a value can be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "date-time")]
    DateTime,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "hostname")]
    Hostname,
    #[serde(rename = "ipv4")]
    Ipv4,
    #[serde(rename = "ipv6")]
    Ipv6,
    #[serde(rename = "ip")]
    Ip,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "mac")]
    Mac,
    #[serde(rename = "cidr")]
    Cidr,
    #[serde(rename = "regexp")]
    Regexp,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "rfc1123")]
    Rfc1123,
}

impl Format {
    pub const ALL: [Format; 14] = [
        Format::Date,
        Format::DateTime,
        Format::Uuid,
        Format::Email,
        Format::Hostname,
        Format::Ipv4,
        Format::Ipv6,
        Format::Ip,
        Format::Uri,
        Format::Mac,
        Format::Cidr,
        Format::Regexp,
        Format::Json,
        Format::Rfc1123,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Uuid => "uuid",
            Format::Email => "email",
            Format::Hostname => "hostname",
            Format::Ipv4 => "ipv4",
            Format::Ipv6 => "ipv6",
            Format::Ip => "ip",
            Format::Uri => "uri",
            Format::Mac => "mac",
            Format::Cidr => "cidr",
            Format::Regexp => "regexp",
            Format::Json => "json",
            Format::Rfc1123 => "rfc1123",
        }
    }

    /// Rust path of the variant, used by code generators.
    pub fn variant_name(self) -> &'static str {
        match self {
            Format::Date => "Date",
            Format::DateTime => "DateTime",
            Format::Uuid => "Uuid",
            Format::Email => "Email",
            Format::Hostname => "Hostname",
            Format::Ipv4 => "Ipv4",
            Format::Ipv6 => "Ipv6",
            Format::Ip => "Ip",
            Format::Uri => "Uri",
            Format::Mac => "Mac",
            Format::Cidr => "Cidr",
            Format::Regexp => "Regexp",
            Format::Json => "Json",
            Format::Rfc1123 => "Rfc1123",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown format name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown format {0:?}")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid hostname regex")
});

static URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:\S*$").expect("valid uri regex"));

static MAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("valid mac regex")
});

/// Checks that `value` is formatted as `format`.
///
/// `name` is the field path reported in the error.
pub fn validate_format(name: &str, value: &str, format: Format) -> Result<(), ServiceError> {
    match check_format(value, format) {
        Ok(()) => Ok(()),
        Err(reason) => Err(invalid_format_error(name, value, format, reason)),
    }
}

fn check_format(value: &str, format: Format) -> Result<(), String> {
    match format {
        Format::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::DateTime => chrono::DateTime::parse_from_rfc3339(value)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Rfc1123 => chrono::DateTime::parse_from_rfc2822(value)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Uuid => uuid::Uuid::parse_str(value)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Email => matches_or(&EMAIL, value, "invalid email address"),
        Format::Hostname => {
            if value.len() > 253 {
                return Err("hostname is longer than 253 characters".to_string());
            }
            matches_or(&HOSTNAME, value, "invalid hostname")
        }
        Format::Ipv4 => value
            .parse::<Ipv4Addr>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Ipv6 => value
            .parse::<Ipv6Addr>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Ip => value
            .parse::<IpAddr>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Format::Uri => matches_or(&URI, value, "invalid URI"),
        Format::Mac => matches_or(&MAC, value, "invalid MAC address"),
        Format::Cidr => check_cidr(value),
        Format::Regexp => Regex::new(value).map(|_| ()).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str::<serde_json::Value>(value)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}

fn matches_or(re: &Regex, value: &str, reason: &str) -> Result<(), String> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

fn check_cidr(value: &str) -> Result<(), String> {
    let (addr, prefix) = value
        .split_once('/')
        .ok_or_else(|| "missing prefix length".to_string())?;
    let addr: IpAddr = addr.parse().map_err(|e: std::net::AddrParseError| e.to_string())?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix length {prefix} exceeds {max}"));
    }
    Ok(())
}

// =============================================================================
// Patterns
// =============================================================================

static PATTERNS: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Checks that `value` matches the regular expression `pattern`.
///
/// Compiled expressions are cached. A pattern that does not compile is a
/// server-side bug and yields an internal error.
pub fn validate_pattern(name: &str, value: &str, pattern: &str) -> Result<(), ServiceError> {
    let matched = {
        let mut cache = PATTERNS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !cache.contains_key(pattern) {
            let compiled = Regex::new(pattern).map_err(|e| {
                internal_error(format!("invalid pattern {pattern:?} for {name}: {e}"))
            })?;
            cache.insert(pattern.to_string(), compiled);
        }
        cache[pattern].is_match(value)
    };
    if matched {
        Ok(())
    } else {
        Err(invalid_pattern_error(name, value, pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_roundtrip() {
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>(), Ok(format));
        }
        assert!("bogus".parse::<Format>().is_err());
    }

    #[test]
    fn test_format_serde_names() {
        let f: Format = serde_json::from_str("\"date-time\"").unwrap();
        assert_eq!(f, Format::DateTime);
    }

    #[test]
    fn test_valid_formats() {
        let cases = [
            (Format::Date, "2024-02-29"),
            (Format::DateTime, "2024-02-29T10:00:00Z"),
            (Format::Rfc1123, "Mon, 02 Jan 2006 15:04:05 GMT"),
            (Format::Uuid, "67e55044-10b1-426f-9247-bb680e5fe0c8"),
            (Format::Email, "ops@example.com"),
            (Format::Hostname, "api.example.com"),
            (Format::Ipv4, "10.0.0.1"),
            (Format::Ipv6, "::1"),
            (Format::Ip, "192.168.1.1"),
            (Format::Uri, "https://example.com/x"),
            (Format::Mac, "00:1a:2b:3c:4d:5e"),
            (Format::Cidr, "10.0.0.0/8"),
            (Format::Regexp, "^a+$"),
            (Format::Json, "{\"a\": 1}"),
        ];
        for (format, value) in cases {
            assert!(validate_format("body.x", value, format).is_ok(), "{format} {value}");
        }
    }

    #[test]
    fn test_invalid_formats() {
        let cases = [
            (Format::Date, "2024-02-30"),
            (Format::DateTime, "yesterday"),
            (Format::Uuid, "not-a-uuid"),
            (Format::Email, "nope"),
            (Format::Hostname, "-bad-.com"),
            (Format::Ipv4, "::1"),
            (Format::Cidr, "10.0.0.0/33"),
            (Format::Regexp, "("),
            (Format::Json, "{"),
        ];
        for (format, value) in cases {
            let err = validate_format("body.x", value, format).unwrap_err();
            assert_eq!(err.code, "invalid_format", "{format} {value}");
        }
    }

    #[test]
    fn test_pattern() {
        assert!(validate_pattern("body.a", "abc", "^a").is_ok());
        let err = validate_pattern("body.a", "xyz", "^a").unwrap_err();
        assert_eq!(err.code, "invalid_pattern");
        assert_eq!(
            err.detail,
            "body.a must match the regexp \"^a\" but got value \"xyz\""
        );
    }

    #[test]
    fn test_broken_pattern_is_internal() {
        let err = validate_pattern("body.a", "abc", "(").unwrap_err();
        assert_eq!(err.status, 500);
    }
}
