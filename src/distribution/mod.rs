//! Read images from an OCI registry based on [OCI distribution specification](https://github.com/opencontainers/distribution-spec)

mod auth;
mod client;
mod name;
mod reference;

pub use auth::*;
pub use client::Client;
pub use name::Name;
pub use reference::Reference;

pub(crate) use client::is_index_media_type;

use crate::error::*;
use url::Url;

/// Base URL for a registry given as `host[:port]`
///
/// `http` is assumed for localhost, `https` everywhere else. A registry
/// given with an explicit scheme is taken as-is.
pub fn registry_url(registry: &str) -> Result<Url> {
    if registry.contains("://") {
        return Ok(Url::parse(registry)?);
    }
    let url = if registry.starts_with("localhost") {
        format!("http://{}", registry)
    } else {
        format!("https://{}", registry)
    };
    Ok(Url::parse(&url)?)
}
