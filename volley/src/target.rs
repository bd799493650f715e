use core::fmt::{self, Display, Formatter};

use http::{header::HeaderValue, uri::Scheme, Uri};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid url \"{url}\": {reason}")]
pub struct TargetError {
    url: String,
    reason: String,
}

impl TargetError {
    fn new<R: Display>(url: &str, reason: R) -> Self {
        Self { url: url.to_string(), reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

/// Scheme, host and port.
///
/// Connections are cached and reused per origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub protocol: Protocol,
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    pub port: u16,
}

impl Display for Origin {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), fmt::Error> {
        let scheme = match self.protocol {
            Protocol::Http => "http",
            Protocol::Https => "https",
        };
        if self.host.contains(':') {
            write!(fmt, "{scheme}://[{}]:{}", self.host, self.port)
        } else {
            write!(fmt, "{scheme}://{}:{}", self.host, self.port)
        }
    }
}

/// A single request-ready endpoint.
#[derive(Debug, Clone)]
pub struct Target {
    pub origin: Origin,
    /// Origin-form request target, i.e. path and query.
    pub path: Uri,
    /// Value for the `Host` header.
    pub host: HeaderValue,
}

impl Target {
    /// Parses an absolute `http` or `https` URL.
    pub fn parse(url: &str) -> Result<Self, TargetError> {
        let uri: Uri = url.trim().parse().map_err(|err| TargetError::new(url, err))?;

        let protocol = match uri.scheme() {
            Some(s) if *s == Scheme::HTTP => Protocol::Http,
            Some(s) if *s == Scheme::HTTPS => Protocol::Https,
            Some(s) => return Err(TargetError::new(url, format!("unsupported scheme \"{s}\""))),
            None => return Err(TargetError::new(url, "missing scheme")),
        };
        let authority = uri
            .authority()
            .ok_or_else(|| TargetError::new(url, "missing host"))?;
        let host = authority.host();
        if host.is_empty() {
            return Err(TargetError::new(url, "missing host"));
        }
        let port = authority.port_u16().unwrap_or(match protocol {
            Protocol::Http => 80,
            Protocol::Https => 443,
        });

        // Drop userinfo, if any.
        let host_port = authority
            .as_str()
            .rsplit_once('@')
            .map_or(authority.as_str(), |(_, v)| v);
        let host_header = HeaderValue::from_str(host_port).map_err(|err| TargetError::new(url, err))?;

        let path = match uri.query() {
            Some(query) => format!("{}?{}", uri.path(), query),
            None => uri.path().to_string(),
        };
        let path: Uri = path.parse().map_err(|err| TargetError::new(url, err))?;

        let origin = Origin {
            protocol,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
        };

        let m = Self { origin, path, host: host_header };

        Ok(m)
    }
}

/// Ordered, immutable collection of targets every worker cycles through.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    targets: Vec<Target>,
}

impl TargetSet {
    #[inline]
    pub const fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Parses every URL, failing on the first invalid one.
    pub fn parse<I, S>(urls: I) -> Result<Self, TargetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = urls
            .into_iter()
            .map(|url| Target::parse(url.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(targets))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[cfg(test)]
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Target> {
        self.targets.get(idx)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_http() {
        let t = Target::parse("http://example.com/a/b?x=1&y=2").unwrap();
        assert_eq!(Protocol::Http, t.origin.protocol);
        assert_eq!("example.com", t.origin.host);
        assert_eq!(80, t.origin.port);
        assert_eq!("/a/b?x=1&y=2", t.path.to_string());
        assert_eq!("example.com", t.host);
    }

    #[test]
    fn test_parse_https_with_port_and_userinfo() {
        let t = Target::parse("https://user:pw@example.com:8443").unwrap();
        assert_eq!(Protocol::Https, t.origin.protocol);
        assert_eq!(8443, t.origin.port);
        assert_eq!("/", t.path.to_string());
        assert_eq!("example.com:8443", t.host);
    }

    #[test]
    fn test_parse_ipv6() {
        let t = Target::parse("http://[::1]:8080/").unwrap();
        assert_eq!("::1", t.origin.host);
        assert_eq!("[::1]:8080", t.host);
        assert_eq!("http://[::1]:8080", t.origin.to_string());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Target::parse("/relative").is_err());
        assert!(Target::parse("ftp://example.com/").is_err());
        assert!(Target::parse("http://exa mple.com/").is_err());
    }

    #[test]
    fn test_set_keeps_order() {
        let set = TargetSet::parse(["http://a/1", "http://b/2"]).unwrap();
        assert_eq!(2, set.len());
        assert_eq!("a", set.get(0).unwrap().origin.host);
        assert_eq!("/2", set.get(1).unwrap().path.to_string());
    }
}
