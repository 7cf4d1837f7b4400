//! `rtmp[s]://` URL parsing and the log-safe anonymization helper.

/// Default RTMP port, used whenever the URL omits one.
pub const DEFAULT_PORT: u16 = 1935;

/// The pieces of a parsed publish URL: `rtmp[s]://host[:port]/app/key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    /// `true` for `rtmps://`, `false` for `rtmp://`.
    pub secure: bool,
    pub host: String,
    pub port: u16,
    /// The single path segment right after the host (the "application name").
    pub app: String,
    /// Everything after `app/`, unsplit — servers routinely embed slashes
    /// and stream keys of their own devising in here.
    pub key: String,
}

/// Errors parsing an `rtmp[s]://` URL.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlError {
    /// Missing or unrecognized `rtmp://`/`rtmps://` prefix.
    #[error("url is missing the rtmp:// or rtmps:// scheme")]
    MissingScheme,
    /// Nothing between the scheme and the first `/`.
    #[error("url is missing a host")]
    MissingHost,
    /// The `:port` suffix on the host did not parse as a `u16`.
    #[error("url has an invalid port")]
    InvalidPort,
    /// No `/app` segment after the host.
    #[error("url is missing an application name")]
    MissingApp,
    /// No `/key` segment after the app.
    #[error("url is missing a stream key")]
    MissingKey,
}

impl RtmpUrl {
    /// Parses `rtmp[s]://host[:port]/app/key`, defaulting the port to
    /// [`DEFAULT_PORT`] when absent.
    ///
    /// `key` is everything left after `app/` is removed, unsplit: a key that
    /// itself contains `/` is passed through whole, matching every
    /// real-world RTMP ingest server's convention.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let (secure, rest) = if let Some(rest) = raw.strip_prefix("rtmps://") {
            (true, rest)
        } else if let Some(rest) = raw.strip_prefix("rtmp://") {
            (false, rest)
        } else {
            return Err(UrlError::MissingScheme);
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(UrlError::MissingHost);
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| UrlError::InvalidPort)?),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }

        let (app, key) = match path.find('/') {
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => (path, ""),
        };
        if app.is_empty() {
            return Err(UrlError::MissingApp);
        }
        if key.is_empty() {
            return Err(UrlError::MissingKey);
        }

        Ok(Self {
            secure,
            host: host.to_string(),
            port,
            app: app.to_string(),
            key: key.to_string(),
        })
    }

    /// The scheme string (`"rtmp"` or `"rtmps"`).
    pub fn scheme(&self) -> &'static str {
        if self.secure { "rtmps" } else { "rtmp" }
    }

    /// Rebuilds the `tcUrl` sent in the `connect` command object: the URL up
    /// to and including the application name, without the stream key
    pub fn tc_url(&self) -> String {
        format!("{}://{}:{}/{}", self.scheme(), self.host, self.port, self.app)
    }

    /// Renders this URL for logs with the application and key path segments
    /// obscured.
    pub fn anonymize(&self) -> String {
        format!(
            "{}://{}:{}/{}/{}",
            self.scheme(),
            self.host,
            self.port,
            anonymize_segment(&self.app),
            anonymize_segment(&self.key),
        )
    }
}

/// Obscures every character of `segment` except the first two and last two,
/// replacing each with `*`. Segments shorter than 4 characters are returned
/// unchanged rather than fully redacted.
fn anonymize_segment(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let n = chars.len();
    if n < 4 {
        return segment.to_string();
    }
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < 2 || i >= n - 2 { *c } else { '*' })
        .collect()
}

/// Parses `raw` and renders it anonymized in one step, for callers that only
/// ever need the log-safe form.
pub fn anonymize_uri(raw: &str) -> Result<String, UrlError> {
    Ok(RtmpUrl::parse(raw)?.anonymize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_app_key() {
        let url = RtmpUrl::parse("rtmp://localhost:1936/live/stream-key").unwrap();
        assert!(!url.secure);
        assert_eq!(url.host, "localhost");
        assert_eq!(url.port, 1936);
        assert_eq!(url.app, "live");
        assert_eq!(url.key, "stream-key");
    }

    #[test]
    fn defaults_port_when_absent() {
        let url = RtmpUrl::parse("rtmps://example.com/app/key").unwrap();
        assert_eq!(url.port, DEFAULT_PORT);
        assert!(url.secure);
    }

    #[test]
    fn key_keeps_embedded_slashes() {
        let url = RtmpUrl::parse("rtmp://host/app/a/b/c").unwrap();
        assert_eq!(url.app, "app");
        assert_eq!(url.key, "a/b/c");
    }

    #[test]
    fn missing_scheme_is_an_error() {
        assert_eq!(RtmpUrl::parse("http://host/app/key").unwrap_err(), UrlError::MissingScheme);
        assert_eq!(RtmpUrl::parse("host/app/key").unwrap_err(), UrlError::MissingScheme);
    }

    #[test]
    fn missing_app_or_key_is_an_error() {
        assert_eq!(RtmpUrl::parse("rtmp://host").unwrap_err(), UrlError::MissingApp);
        assert_eq!(RtmpUrl::parse("rtmp://host/app").unwrap_err(), UrlError::MissingKey);
    }

    #[test]
    fn anonymizes_youtube_style_url() {
        let got = anonymize_uri("rtmps://a.rtmps.youtube.com:443/live2/AaBb-CcDd-EeFf-GgHh-IiJj").unwrap();
        assert_eq!(got, "rtmps://a.rtmps.youtube.com:443/li*e2/Aa********************Jj");
    }

    #[test]
    fn anonymizes_wowza_style_url() {
        let got = anonymize_uri("rtmp://AaBbCcDdEeFf.wowza.com/app-AaBbCcDd/EeFfGgHh").unwrap();
        assert_eq!(got, "rtmp://AaBbCcDdEeFf.wowza.com/ap********Dd/Ee****Hh");
    }

    #[test]
    fn short_segments_are_left_intact() {
        let got = anonymize_uri("rtmp://host/abc/xyz").unwrap();
        assert_eq!(got, "rtmp://host:1935/abc/xyz");
    }
}
