use crate::error::*;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use url::Url;

/// Credentials passed on the command line
///
/// Anonymous access is attempted when no username/password is given. The
/// credentials are only sent to the token endpoint named by the registry's
/// authentication challenge, as an HTTP Basic authorization octet.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    basic: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn basic(username: &str, password: &str) -> Self {
        let octet = STANDARD.encode(format!("{}:{}", username, password));
        Credentials { basic: Some(octet) }
    }

    /// Get token based on WWW-Authenticate header
    pub fn challenge(&self, challenge: &AuthChallenge) -> Result<String> {
        let token_url = Url::parse(&challenge.url)?;

        let mut req = ureq::get(token_url.as_str()).set("Accept", "application/json");
        if let Some(octet) = self.basic.as_ref() {
            req = req.set("Authorization", &format!("Basic {}", octet))
        }
        req = req
            .query("scope", &challenge.scope)
            .query("service", &challenge.service);
        match req.call() {
            Ok(res) => {
                let token = res.into_json::<Token>()?;
                Ok(token.token)
            }
            Err(ureq::Error::Status(..)) => Err(Error::AuthorizationFailed(token_url.clone())),
            Err(ureq::Error::Transport(e)) => Err(Error::NetworkError(e)),
        }
    }
}

/// WWW-Authentication challenge
///
/// ```
/// use ocinv::distribution::AuthChallenge;
///
/// let auth = AuthChallenge::from_header(
///   r#"Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:canonical/ubuntu:pull""#,
/// ).unwrap();
///
/// assert_eq!(auth, AuthChallenge {
///   url: "https://ghcr.io/token".to_string(),
///   service: "ghcr.io".to_string(),
///   scope: "repository:canonical/ubuntu:pull".to_string(),
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub url: String,
    pub service: String,
    pub scope: String,
}

impl TryFrom<ureq::Error> for AuthChallenge {
    type Error = crate::error::Error;
    fn try_from(e: ureq::Error) -> Result<Self> {
        match e {
            ureq::Error::Status(401, res) => match res.header("www-authenticate") {
                Some(header) => Self::from_header(header),
                None => Err(Error::UnSupportedAuthHeader("<missing>".to_string())),
            },
            e => Err(e.into()),
        }
    }
}

impl AuthChallenge {
    pub fn from_header(header: &str) -> Result<Self> {
        let err = || Error::UnSupportedAuthHeader(header.to_string());
        let (ty, realm) = header.split_once(' ').ok_or_else(err)?;
        if ty != "Bearer" {
            return Err(err());
        }

        let mut url = None;
        let mut service = None;
        let mut scope = None;
        for param in realm.split(',') {
            let (key, value) = param.split_once('=').ok_or_else(err)?;
            let value = value.trim_matches('"').to_string();
            match key {
                "realm" => url = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => continue,
            }
        }
        Ok(Self {
            url: url.ok_or_else(err)?,
            service: service.ok_or_else(err)?,
            scope: scope.ok_or_else(err)?,
        })
    }
}

#[derive(Deserialize)]
struct Token {
    token: String,
}
