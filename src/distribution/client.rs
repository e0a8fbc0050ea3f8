use crate::{distribution::*, error::*, Digest};
use oci_spec::{distribution::TagList, image::*};
use serde::Deserialize;
use std::io::Read;
use url::Url;

/// A read-side client for the `/v2/` API endpoints of an OCI registry
pub struct Client {
    agent: ureq::Agent,
    /// URL to registry server
    url: Url,
    /// Credentials for the token endpoint, anonymous when absent
    credentials: Credentials,
    /// Cached token
    token: Option<String>,
}

#[derive(Deserialize)]
struct Catalog {
    repositories: Vec<String>,
}

impl Client {
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Client {
            agent: ureq::Agent::new(),
            url,
            credentials,
            token: None,
        }
    }

    /// Tokens are scoped per repository, so a rejected cached token
    /// triggers one re-challenge before the error surfaces.
    fn call(&mut self, req: ureq::Request) -> Result<ureq::Response> {
        let authorized = match self.token.as_deref() {
            Some(token) => req
                .clone()
                .set("Authorization", &format!("Bearer {}", token)),
            None => req.clone(),
        };
        let challenge = match authorized.call() {
            Ok(res) => return Ok(res),
            Err(e) => AuthChallenge::try_from(e)?,
        };
        let token = self.credentials.challenge(&challenge)?;
        let res = req
            .set("Authorization", &format!("Bearer {}", token))
            .call()?;
        self.token = Some(token);
        Ok(res)
    }

    fn get(&self, url: &Url) -> ureq::Request {
        log::info!("GET {}", url);
        self.agent.get(url.as_str())
    }

    fn head(&self, url: &Url) -> ureq::Request {
        log::info!("HEAD {}", url);
        self.agent.head(url.as_str())
    }

    /// List repositories in the registry.
    ///
    /// ```text
    /// GET /v2/_catalog
    /// ```
    ///
    /// Follows `Link: <..>; rel="next"` pagination until the catalog is
    /// exhausted.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#listing-repositories) for detail.
    pub fn get_catalog(&mut self) -> Result<Vec<String>> {
        let mut url = self.url.join("/v2/_catalog")?;
        let mut repositories = Vec::new();
        loop {
            let res = self.call(self.get(&url))?;
            let next = next_page(&res);
            let page = res.into_json::<Catalog>()?;
            repositories.extend(page.repositories);
            match next {
                Some(rel) => url = self.url.join(&rel)?,
                None => break,
            }
        }
        Ok(repositories)
    }

    /// Get tags of `<name>` repository.
    ///
    /// ```text
    /// GET /v2/<name>/tags/list
    /// ```
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#content-discovery) for detail.
    pub fn get_tags(&mut self, name: &Name) -> Result<Vec<String>> {
        let mut url = self.url.join(&format!("/v2/{}/tags/list", name))?;
        let mut tags = Vec::new();
        loop {
            let res = self.call(self.get(&url))?;
            let next = next_page(&res);
            let page = res.into_json::<TagList>()?;
            tags.extend_from_slice(page.tags());
            match next {
                Some(rel) => url = self.url.join(&rel)?,
                None => break,
            }
        }
        Ok(tags)
    }

    /// Resolve the digest and media type of a manifest without its body.
    ///
    /// ```text
    /// HEAD /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// Some registries omit the `Docker-Content-Digest` header; the manifest
    /// body is fetched and hashed instead.
    pub fn head_manifest(&mut self, name: &Name, reference: &Reference) -> Result<(Digest, String)> {
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", name, reference))?;
        let res = self.call(self.head(&url).set("Accept", &manifest_accept()))?;
        let media_type = res.content_type().to_string();
        match res.header("Docker-Content-Digest") {
            Some(digest) => Ok((Digest::new(digest)?, media_type)),
            None => {
                let res = self.call(self.get(&url).set("Accept", &manifest_accept()))?;
                let media_type = res.content_type().to_string();
                let mut body = Vec::new();
                res.into_reader().read_to_end(&mut body)?;
                Ok((Digest::from_buf_sha256(&body), media_type))
            }
        }
    }

    /// Get manifest for given repository
    ///
    /// ```text
    /// GET /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-manifests) for detail.
    pub fn get_manifest(&mut self, name: &Name, reference: &Reference) -> Result<ImageManifest> {
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", name, reference))?;
        let res = self.call(self.get(&url).set(
            "Accept",
            &format!(
                "{}, {}",
                MediaType::ImageManifest
                    .to_docker_v2s2()
                    .expect("Never fails since ImageManifest is supported"),
                MediaType::ImageManifest,
            ),
        ))?;
        let manifest = ImageManifest::from_reader(res.into_reader())?;
        Ok(manifest)
    }

    /// Get a multi-platform image index for given repository
    ///
    /// ```text
    /// GET /v2/<name>/manifests/<reference>
    /// ```
    pub fn get_index(&mut self, name: &Name, reference: &Reference) -> Result<ImageIndex> {
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", name, reference))?;
        let res = self.call(self.get(&url).set(
            "Accept",
            &format!(
                "{}, {}",
                MediaType::ImageIndex
                    .to_docker_v2s2()
                    .expect("Never fails since ImageIndex is supported"),
                MediaType::ImageIndex,
            ),
        ))?;
        let index = ImageIndex::from_reader(res.into_reader())?;
        Ok(index)
    }

    /// Get blob for given digest
    ///
    /// ```text
    /// GET /v2/<name>/blobs/<digest>
    /// ```
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-blobs) for detail.
    pub fn get_blob(&mut self, name: &Name, digest: &Digest) -> Result<Vec<u8>> {
        let url = self
            .url
            .join(&format!("/v2/{}/blobs/{}", name.as_str(), digest))?;
        let res = self.call(self.get(&url))?;
        let mut bytes = Vec::new();
        res.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Accept header covering both index and single-manifest responses,
/// in OCI and Docker v2s2 spellings.
fn manifest_accept() -> String {
    format!(
        "{}, {}, {}, {}",
        MediaType::ImageIndex,
        MediaType::ImageIndex
            .to_docker_v2s2()
            .expect("Never fails since ImageIndex is supported"),
        MediaType::ImageManifest,
        MediaType::ImageManifest
            .to_docker_v2s2()
            .expect("Never fails since ImageManifest is supported"),
    )
}

/// Whether a Content-Type names a multi-platform index
pub(crate) fn is_index_media_type(media_type: &str) -> bool {
    media_type == MediaType::ImageIndex.to_string()
        || Ok(media_type) == MediaType::ImageIndex.to_docker_v2s2()
}

fn next_page(res: &ureq::Response) -> Option<String> {
    res.header("Link").and_then(parse_next_link)
}

// `Link: </v2/_catalog?last=ubuntu&n=100>; rel="next"`
fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let (target, params) = link.split_once(';')?;
        if params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            Some(
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            )
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link() {
        assert_eq!(
            parse_next_link(r#"</v2/_catalog?last=ubuntu&n=100>; rel="next""#),
            Some("/v2/_catalog?last=ubuntu&n=100".to_string()),
        );
        assert_eq!(
            parse_next_link(r#"</first>; rel="prev", </second>; rel="next""#),
            Some("/second".to_string()),
        );
        assert_eq!(parse_next_link(r#"</v2/_catalog>; rel="prev""#), None);
        assert_eq!(parse_next_link("garbage"), None);
    }

    #[test]
    fn index_media_type() {
        assert!(is_index_media_type("application/vnd.oci.image.index.v1+json"));
        assert!(is_index_media_type(
            "application/vnd.docker.distribution.manifest.list.v2+json"
        ));
        assert!(!is_index_media_type(
            "application/vnd.oci.image.manifest.v1+json"
        ));
    }

    //
    // Following tests need a registry server on localhost:5000.
    // These tests are ignored by default.
    //

    fn test_client() -> Client {
        let url = Url::parse("http://localhost:5000").unwrap();
        Client::new(url, Credentials::anonymous())
    }

    #[test]
    #[ignore]
    fn get_catalog() -> Result<()> {
        let mut client = test_client();
        let catalog = client.get_catalog()?;
        assert!(catalog.contains(&"test_repo".to_string()));
        Ok(())
    }

    #[test]
    #[ignore]
    fn get_tags() -> Result<()> {
        let mut client = test_client();
        let mut tags = client.get_tags(&Name::new("test_repo")?)?;
        tags.sort_unstable();
        assert_eq!(
            tags,
            &["tag1".to_string(), "tag2".to_string(), "tag3".to_string()]
        );
        Ok(())
    }
}
