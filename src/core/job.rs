//! Job abstraction sent to the broker.
//!
//! A job is an opaque body plus optional string headers. Its serialized form is
//! `name:value` pairs joined by `::`, the `:::` separator, then the raw body.
//! Header names and values are restricted so that this framing stays
//! unambiguous: names are non-empty and colon-free, values are non-empty,
//! contain no `::`, and neither start nor end with `:`.

use std::fmt;

use crate::core::ClientError;

const HEADER_SEPARATOR: &[u8] = b"::";
const BODY_SEPARATOR: &[u8] = b":::";

/// A unit of work submitted to the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    headers: Vec<(String, String)>,
    data: Vec<u8>,
}

impl Job {
    /// Create a job with the given body and no headers.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Vec::new(),
            data: data.into(),
        }
    }

    /// Add or replace a header.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Protocol` if `name` or `value` cannot be framed.
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let name = name.into();
        let value = value.into();
        check_header(&name, &value)?;
        if let Some(slot) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.headers.push((name, value));
        }
        Ok(self)
    }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The job body.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serialize the job into the bytes sent over the wire.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + BODY_SEPARATOR.len());
        for (idx, (name, value)) in self.headers.iter().enumerate() {
            if idx > 0 {
                out.extend_from_slice(HEADER_SEPARATOR);
            }
            out.extend_from_slice(name.as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
        }
        out.extend_from_slice(BODY_SEPARATOR);
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse bytes produced by [`Job::serialize`].
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Protocol` if the separator is missing or a header
    /// is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self, ClientError> {
        let split = find(raw, BODY_SEPARATOR)
            .ok_or_else(|| ClientError::Protocol("job is missing the body separator".into()))?;
        let (head, body) = (&raw[..split], &raw[split + BODY_SEPARATOR.len()..]);

        let head = std::str::from_utf8(head)
            .map_err(|e| ClientError::Protocol(format!("job headers are not utf-8: {e}")))?;

        let mut headers = Vec::new();
        if !head.is_empty() {
            for pair in head.split("::") {
                let (name, value) = pair.split_once(':').ok_or_else(|| {
                    ClientError::Protocol(format!("malformed job header `{pair}`"))
                })?;
                headers.push((name.to_owned(), value.to_owned()));
            }
        }

        Ok(Self {
            headers,
            data: body.to_vec(),
        })
    }
}

fn check_header(name: &str, value: &str) -> Result<(), ClientError> {
    if name.is_empty() || name.contains(':') {
        return Err(ClientError::Protocol(format!(
            "job header name `{name}` must be non-empty and contain no `:`"
        )));
    }
    if value.is_empty() || value.contains("::") || value.starts_with(':') || value.ends_with(':') {
        return Err(ClientError::Protocol(format!(
            "job header value `{value}` for `{name}` cannot be framed"
        )));
    }
    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

impl From<&str> for Job {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<String> for Job {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Job {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Job {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job({} headers, {} bytes)",
            self.headers.len(),
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_without_headers() {
        let job = Job::new("hello");
        assert_eq!(job.serialize(), b":::hello".to_vec());
    }

    #[test]
    fn test_serialize_with_headers() {
        let job = Job::new("body")
            .with_header("id", "7")
            .and_then(|job| job.with_header("lang", "rust"))
            .unwrap();
        assert_eq!(job.serialize(), b"id:7::lang:rust:::body".to_vec());
    }

    #[test]
    fn test_with_header_replaces() {
        let job = Job::new("x")
            .with_header("id", "1")
            .and_then(|job| job.with_header("id", "2"))
            .unwrap();
        assert_eq!(job.headers().len(), 1);
        assert_eq!(job.header("id"), Some("2"));
    }

    #[test]
    fn test_parse_keeps_colons_in_body() {
        let job = Job::new("a:b:::c").with_header("k", "v").unwrap();
        let parsed = Job::parse(&job.serialize()).unwrap();
        assert_eq!(parsed.data(), b"a:b:::c");
        assert_eq!(parsed.header("k"), Some("v"));
    }

    #[test]
    fn test_header_values_with_inner_colons_round_trip() {
        let job = Job::new(":body")
            .with_header("url", "http://host:80/a:b")
            .and_then(|job| job.with_header("t", "12:30"))
            .unwrap();
        assert_eq!(Job::parse(&job.serialize()).unwrap(), job);
    }

    #[test]
    fn test_unframeable_headers_rejected() {
        for (name, value) in [
            ("k", "v:"),
            ("k", ":v"),
            ("k", "a::b"),
            ("k", ""),
            ("", "v"),
            ("a:b", "v"),
        ] {
            assert!(
                matches!(
                    Job::new("body").with_header(name, value),
                    Err(ClientError::Protocol(_))
                ),
                "{name:?}={value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(matches!(
            Job::parse(b"no separator"),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn test_string_conversion_matches_new() {
        assert_eq!(Job::from("abc"), Job::new("abc"));
        assert_eq!(Job::from(String::from("abc")), Job::new("abc"));
    }
}
