/// An immutable `{url, body}` pair handed to parse callbacks.
///
/// `url` is the *final* url after redirects, not the one originally
/// requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub body: String,
}

impl Response {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Response {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Naive path joining, deliberately not RFC 3986. Preserved bit-for-bit
    /// because callers may already depend on the exact (non-normalising)
    /// output.
    pub fn url_join(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if let Some(rest) = path.strip_prefix('/') {
            format!("{}/{}", scheme_authority(&self.url), rest)
        } else {
            format!("{}/{}", self.url, path)
        }
    }
}

fn scheme_authority(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let after = scheme_end + 3;
        if let Some(slash) = url[after..].find('/') {
            return url[..after + slash].to_string();
        }
    }
    url.to_string()
}
