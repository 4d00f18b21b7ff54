use passkey_rp_types::webauthn::CollectedClientData;
use url::Url;

use crate::ProtocolError;

/// Serialize `url` the way clients report origins in client data.
///
/// Tuple origins drop any path and default port. Opaque origins, such as the
/// `android:apk-key-hash:` origins of native apps, are kept verbatim.
pub(crate) fn serialize_origin(url: &Url) -> String {
    let origin = url.origin();
    if origin.is_tuple() {
        origin.ascii_serialization()
    } else {
        url.as_str().to_owned()
    }
}

/// Decides whether the origins in client data may run a ceremony for an RP ID.
///
/// With an explicit list of origins only those are accepted. Without one, any `https` origin
/// whose host is the RP ID or a subdomain of it is.
#[derive(Debug, Clone, Copy)]
pub struct OriginPolicy<'a> {
    rp_id: &'a str,
    origins: &'a [String],
    top_origins: &'a [String],
    allows_insecure_localhost: bool,
}

impl<'a> OriginPolicy<'a> {
    /// A policy for `rp_id` accepting `origins`, and `top_origins` for cross-origin requests.
    pub fn new(rp_id: &'a str, origins: &'a [String], top_origins: &'a [String]) -> Self {
        Self {
            rp_id,
            origins,
            top_origins,
            allows_insecure_localhost: false,
        }
    }

    /// Accept `http://localhost` when the RP ID is `localhost`.
    pub fn allows_insecure_localhost(mut self, is_allowed: bool) -> Self {
        self.allows_insecure_localhost = is_allowed;
        self
    }

    /// Check `origin`, `crossOrigin` and `topOrigin` of `client_data`.
    pub fn verify(&self, client_data: &CollectedClientData) -> Result<(), ProtocolError> {
        if !self.is_allowed(&client_data.origin, self.origins) {
            return Err(ProtocolError::OriginNotAllowed(client_data.origin.clone()));
        }

        if client_data.cross_origin == Some(true) {
            if self.top_origins.is_empty() {
                return Err(ProtocolError::CrossOriginNotAllowed);
            }
            let top_origin = client_data
                .top_origin
                .as_deref()
                .ok_or(ProtocolError::CrossOriginNotAllowed)?;
            if !self.is_allowed(top_origin, self.top_origins) {
                return Err(ProtocolError::OriginNotAllowed(top_origin.to_owned()));
            }
        }
        Ok(())
    }

    fn is_allowed(&self, origin: &str, allowed: &[String]) -> bool {
        if allowed.iter().any(|a| a == origin) {
            return true;
        }
        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        if !allowed.is_empty() {
            let serialized = serialize_origin(&url);
            return allowed.iter().any(|a| *a == serialized);
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        if host == "localhost" && self.rp_id == "localhost" {
            return url.scheme() == "https"
                || (url.scheme() == "http" && self.allows_insecure_localhost);
        }
        url.scheme() == "https" && is_same_or_subdomain(host, self.rp_id)
    }
}

fn is_same_or_subdomain(host: &str, rp_id: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let rp_id = rp_id.to_ascii_lowercase();
    host == rp_id
        || host
            .strip_suffix(rp_id.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}
