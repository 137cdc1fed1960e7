//! Request target decomposition for the `u` and `p` claims

use url::Url;

use crate::error::ShrError;

/// Host and path of the request a signed request is bound to
///
/// Both parts are taken verbatim from the URL text: an explicitly written
/// default port (`:443`) is kept and an empty path stays empty. `Url` is only
/// used to check that the input is an absolute URL with a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    authority: String,
    path: String,
}

impl RequestTarget {
    /// Parse an absolute URL such as `https://login.example.com:443/common/path?x=1`
    pub fn parse(url: &str) -> Result<Self, ShrError> {
        let raw = url.trim();
        let parsed = Url::parse(raw).map_err(|e| ShrError::InvalidUrl(format!("{raw}: {e}")))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ShrError::InvalidUrl(format!("{raw}: missing host")));
        }

        let (_, rest) = raw
            .split_once("://")
            .ok_or_else(|| ShrError::InvalidUrl(format!("{raw}: not hierarchical")))?;

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        // Userinfo is never part of the bound authority
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        if authority.is_empty() {
            return Err(ShrError::InvalidUrl(format!("{raw}: empty authority")));
        }

        let path_end = tail.find(['?', '#']).unwrap_or(tail.len());

        Ok(Self {
            authority: authority.to_string(),
            path: tail[..path_end].to_string(),
        })
    }

    /// `host[:port]` exactly as written
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Path without query or fragment, `None` when the URL has no path
    pub fn path(&self) -> Option<&str> {
        if self.path.is_empty() {
            None
        } else {
            Some(&self.path)
        }
    }
}
