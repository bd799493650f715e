use core::{num::NonZero, time::Duration};
use std::{fs, io, path::PathBuf};

use bytes::Bytes;
use http::{
    header::{
        HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue, AUTHORIZATION, CONNECTION, CONTENT_TYPE,
        USER_AGENT,
    },
    HeaderMap, Method,
};
use thiserror::Error;

use crate::{
    cmd::{Cmd, OutputFormat},
    engine::{
        http::{Config as HttpConfig, Timeouts},
        Termination,
    },
    expand::{ExpandError, Expander},
    target::{TargetError, TargetSet},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no target: either --url or --urls-file is required")]
    NoUrl,
    #[error("no stopping criterion: either --requests or --duration is required")]
    NoTermination,
    #[error("no targets: the URL list is empty")]
    NoTargets,
    #[error("failed to read \"{}\": {err}", path.display())]
    Read { path: PathBuf, err: io::Error },
    #[error("invalid header \"{0}\": expected \"key=value\"")]
    MalformedHeader(String),
    #[error("invalid header name \"{name}\": {err}")]
    InvalidHeaderName { name: String, err: InvalidHeaderName },
    #[error("invalid header value for \"{name}\": {err}")]
    InvalidHeaderValue { name: String, err: InvalidHeaderValue },
    #[error(transparent)]
    Expand(#[from] ExpandError),
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-request settings, shared by all workers.
    pub http: HttpConfig,
    /// Number of concurrent workers.
    pub concurrency: NonZero<usize>,
    /// Number of threads, never exceeding the concurrency.
    pub threads: NonZero<usize>,
    pub output: OutputFormat,
}

impl TryFrom<Cmd> for Config {
    type Error = ConfigError;

    fn try_from(cmd: Cmd) -> Result<Self, Self::Error> {
        let Cmd {
            url,
            urls_file,
            clients,
            requests,
            duration,
            keep_alive,
            data,
            body,
            content_type,
            auth,
            headers,
            tc,
            tr,
            tw,
            threads,
            tcp_no_delay,
            seed,
            output,
            verbose: _,
        } = cmd;

        let termination = match (requests, duration) {
            (Some(n), None) => Termination::Requests(n),
            (None, Some(secs)) => Termination::Duration(Duration::from_secs(secs.get())),
            // Rejected by the parser already.
            (Some(..), Some(..)) | (None, None) => return Err(ConfigError::NoTermination),
        };

        let urls = load_urls(url.as_deref(), urls_file, seed)?;
        let targets = TargetSet::parse(&urls)?;
        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let body = match (data, body) {
            (Some(path), ..) => Some(read(path)?.into()),
            (None, Some(body)) if !body.is_empty() => Some(Bytes::from(body)),
            (None, ..) => None,
        };

        let method = if body.is_some() { Method::POST } else { Method::GET };
        let headers = build_headers(keep_alive, body.is_some(), content_type, auth, &headers)?;

        let http = HttpConfig {
            targets,
            method,
            body: body.unwrap_or_default(),
            headers,
            keep_alive,
            termination,
            timeouts: Timeouts {
                connect: Duration::from_millis(tc),
                read: Duration::from_millis(tr),
                write: Duration::from_millis(tw),
            },
            tcp_no_delay,
        };

        let m = Self {
            http,
            concurrency: clients,
            threads: threads.min(clients),
            output,
        };

        Ok(m)
    }
}

/// Collects target URLs.
///
/// Only the `--url` value is template-expanded. Lines of the URL file are
/// taken as-is, skipping blank ones.
fn load_urls(url: Option<&str>, urls_file: Option<PathBuf>, seed: Option<u64>) -> Result<Vec<String>, ConfigError> {
    if url.is_none() && urls_file.is_none() {
        return Err(ConfigError::NoUrl);
    }

    let mut urls = Vec::new();
    if let Some(url) = url {
        urls.extend(Expander::new(seed).expand(url)?);
    }
    if let Some(path) = urls_file {
        let data = read(path)?;
        let data = String::from_utf8_lossy(&data);
        urls.extend(
            data.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string),
        );
    }

    Ok(urls)
}

fn read(path: PathBuf) -> Result<Vec<u8>, ConfigError> {
    fs::read(&path).map_err(|err| ConfigError::Read { path, err })
}

/// Builds headers sent with every request.
///
/// Extra headers are applied last, so they override any header set before,
/// including `Authorization`.
fn build_headers(
    keep_alive: bool,
    has_body: bool,
    content_type: Option<String>,
    auth: Option<String>,
    extra: &[String],
) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    let connection = if keep_alive { "keep-alive" } else { "close" };
    headers.insert(CONNECTION, HeaderValue::from_static(connection));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("volley/", env!("CARGO_PKG_VERSION"))),
    );

    if has_body {
        if let Some(v) = content_type {
            headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), &v)?);
        }
    }
    if let Some(v) = auth {
        headers.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &v)?);
    }

    for kv in extra.iter().filter(|kv| !kv.is_empty()) {
        let (name, value) = kv
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedHeader(kv.clone()))?;
        let name = name.trim();
        let value = value.trim();

        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|err| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            err,
        })?;
        headers.insert(key, header_value(name, value)?);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|err| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        err,
    })
}
