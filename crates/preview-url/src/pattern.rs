//! # Origin Patterns
//!
//! Compiled matchers for `scheme://host[:port]` origins with `*` wildcards.
//!
//! Patterns are written like URLs: `scheme://[userinfo@]host[:port][/path][?query][#fragment]`.
//! Only the scheme, host and port take part in matching. Userinfo, path,
//! query and fragment are accepted and ignored.
//!
//! | Pattern                            | Matches                                   |
//! |------------------------------------|-------------------------------------------|
//! | `https://example.com`              | `https://example.com` only                |
//! | `http://localhost:*`               | `http://localhost` on any port            |
//! | `https://example-git-*.sanity.dev` | Every branch deployment                   |
//! | `://example.com`                   | `example.com` over any scheme             |
//!
//! A hostname made only of `*` is rejected: it would let the previewed page
//! send the preview secret to any site.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{PreviewUrlError, PreviewUrlResult};

/// A compiled origin matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginPattern {
    /// Lowercased scheme glob, empty for any scheme.
    protocol: String,
    /// Lowercased hostname glob.
    hostname: String,
    /// Port glob, empty for the scheme's default port.
    port: String,
}

impl OriginPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// - `PreviewUrlError::InsecurePattern` if the hostname is only `*`
    /// - `PreviewUrlError::InvalidPattern` if the pattern is malformed
    ///
    /// # Example
    ///
    /// ```rust
    /// use preview_url::OriginPattern;
    ///
    /// let pattern = OriginPattern::parse("http://localhost:*").unwrap();
    /// assert!(pattern.test("http://localhost:3333"));
    /// assert!(!pattern.test("https://localhost:3333"));
    ///
    /// assert!(OriginPattern::parse("https://*").is_err());
    /// ```
    pub fn parse(input: &str) -> PreviewUrlResult<Self> {
        let invalid = |reason: &str| PreviewUrlError::InvalidPattern {
            pattern: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let (protocol, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid("expected scheme://host"))?;

        if !protocol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '*'))
        {
            return Err(invalid("scheme contains invalid characters"));
        }

        let authority = rest
            .split(|c| matches!(c, '/' | '?' | '#'))
            .next()
            .unwrap_or_default();
        let host_port = match authority.rsplit_once('@') {
            Some((_userinfo, host_port)) => host_port,
            None => authority,
        };

        let (hostname, port) = split_host_port(host_port).ok_or_else(|| invalid("malformed host"))?;

        if hostname.is_empty() {
            return Err(invalid("missing hostname"));
        }
        if hostname.chars().all(|c| c == '*') {
            return Err(PreviewUrlError::InsecurePattern {
                pattern: input.to_string(),
            });
        }
        if hostname
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '\\' | '^' | '|'))
        {
            return Err(invalid("hostname contains invalid characters"));
        }
        if !port.chars().all(|c| c.is_ascii_digit() || c == '*') {
            return Err(invalid("port must be numeric or a wildcard"));
        }

        let protocol = protocol.to_ascii_lowercase();
        let port = match (default_port(&protocol), port.parse::<u16>()) {
            (Some(default), Ok(explicit)) if default == explicit => String::new(),
            _ => port.to_string(),
        };

        Ok(Self {
            protocol,
            hostname: hostname.to_ascii_lowercase(),
            port,
        })
    }

    /// Pattern matching exactly the origin of `url`.
    pub fn from_origin(url: &Url) -> Self {
        Self {
            protocol: url.scheme().to_string(),
            hostname: url.host_str().unwrap_or_default().to_string(),
            port: url.port().map(|p| p.to_string()).unwrap_or_default(),
        }
    }

    /// Test an origin string such as `https://example.com:8443`.
    ///
    /// Unparsable input never matches.
    pub fn test(&self, origin: &str) -> bool {
        Url::parse(origin)
            .map(|url| self.test_url(&url))
            .unwrap_or(false)
    }

    /// Test the origin of a parsed URL.
    pub fn test_url(&self, url: &Url) -> bool {
        let port = url.port().map(|p| p.to_string()).unwrap_or_default();

        (self.protocol.is_empty() || glob_match(&self.protocol, url.scheme()))
            && glob_match(&self.hostname, url.host_str().unwrap_or_default())
            && glob_match(&self.port, &port)
    }

    /// Scheme glob, empty when any scheme matches.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Hostname glob.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Port glob, empty when only the default port matches.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl FromStr for OriginPattern {
    type Err = PreviewUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OriginPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.hostname)?;
        if !self.port.is_empty() {
            write!(f, ":{}", self.port)?;
        }
        Ok(())
    }
}

fn split_host_port(host_port: &str) -> Option<(&str, &str)> {
    if let Some(bracketed) = host_port.strip_prefix('[') {
        // IPv6 literal keeps its brackets, as `Url::host_str` does
        let end = bracketed.find(']')?;
        let hostname = &host_port[..end + 2];
        return match &bracketed[end + 1..] {
            "" => Some((hostname, "")),
            rest => rest.strip_prefix(':').map(|port| (hostname, port)),
        };
    }

    Some(match host_port.rsplit_once(':') {
        Some((hostname, port)) => (hostname, port),
        None => (host_port, ""),
    })
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// Match `text` against `pattern`, where `*` matches any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p].eq_ignore_ascii_case(&text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            // Let the last star absorb one more character
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}
