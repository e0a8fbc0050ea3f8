//! Walk a registry and record what it serves as a flat table
//!
//! One row per (repository, tag, platform, digest) tuple, plus a parent
//! pointer linking platform rows back to their multi-platform index. Rows
//! are written in the order they are observed and never mutated.

use crate::{
    distribution::{self, Client, Credentials, Name, Reference},
    error::*,
    Digest,
};
use oci_spec::image::ImageIndex;
use std::{fs, io::Write, path::Path};

/// Column names of the inventory table
pub const HEADERS: [&str; 6] = [
    "Registry",
    "Name/Namespace",
    "Tag",
    "Platform",
    "Digest",
    "Parent",
];

/// Platform value marking a multi-platform index row
pub const PLATFORM_INDEX: &str = "index";

/// Parent field of a top-level row
const NO_PARENT: &str = "None";

/// One observed fact about an image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    pub registry: String,
    pub repo: Name,
    pub tag: Reference,
    /// `os/arch` pair, or [PLATFORM_INDEX] for a multi-platform index
    pub platform: String,
    pub digest: Digest,
    /// Digest of the enclosing multi-platform index, if any
    pub parent: Option<Digest>,
}

impl RegistryInfo {
    fn tsv_line(&self) -> String {
        let parent = match self.parent.as_ref() {
            Some(digest) => digest.to_string(),
            None => NO_PARENT.to_string(),
        };
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.registry, self.repo, self.tag, self.platform, self.digest, parent
        )
    }
}

/// Write the header and all rows as tab-separated lines
pub fn write_table<W: Write>(w: &mut W, rows: &[RegistryInfo]) -> Result<()> {
    writeln!(w, "{}", HEADERS.join("\t"))?;
    for row in rows {
        writeln!(w, "{}", row.tsv_line())?;
    }
    Ok(())
}

/// Read a table written by [write_table]
///
/// Columns are located by header name, so extra or reordered columns are
/// tolerated; a missing expected column is a hard failure.
pub fn read_table(path: &Path) -> Result<Vec<RegistryInfo>> {
    let text = fs::read_to_string(path)?;
    parse_table(&text, path)
}

fn parse_table(text: &str, path: &Path) -> Result<Vec<RegistryInfo>> {
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split('\t').collect();
    let column = |name: &'static str| -> Result<usize> {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| Error::InvalidTableHeader {
                column: name,
                path: path.to_owned(),
            })
    };
    let registry = column("Registry")?;
    let repo = column("Name/Namespace")?;
    let tag = column("Tag")?;
    let platform = column("Platform")?;
    let digest = column("Digest")?;
    let parent = column("Parent")?;

    let mut rows = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |index: usize| -> Result<&str> {
            fields
                .get(index)
                .copied()
                .ok_or_else(|| Error::InvalidRow(line.to_string()))
        };
        rows.push(RegistryInfo {
            registry: field(registry)?.to_string(),
            repo: Name::new(field(repo)?)?,
            tag: Reference::new(field(tag)?)?,
            platform: field(platform)?.to_string(),
            digest: Digest::new(field(digest)?)?,
            parent: match field(parent)? {
                NO_PARENT => None,
                digest => Some(Digest::new(digest)?),
            },
        });
    }
    Ok(rows)
}

/// Walk every repository and tag of a registry
///
/// A tag resolving to a multi-platform index yields one [PLATFORM_INDEX] row
/// followed by one row per platform entry pointing back at the index digest;
/// entries whose platform contains `unknown` (attestation objects without a
/// runnable image) are dropped. A tag resolving to a single manifest is
/// looked up through its image configuration blob instead.
pub fn scan_registry(registry: &str, credentials: Credentials) -> Result<Vec<RegistryInfo>> {
    log::info!("Connecting to registry: {}", registry);
    let url = distribution::registry_url(registry)?;
    let mut client = Client::new(url, credentials);

    let catalog = client.get_catalog()?;
    log::info!("Found {} repositories", catalog.len());

    let mut rows = Vec::new();
    // Reverse catalog order, kept for output stability with paginated listings
    for repo in catalog.iter().rev() {
        log::info!("Processing repository: {}", repo);
        let name = Name::new(repo)?;
        let tags = client.get_tags(&name)?;
        log::info!("Found {} tags in repository {}", tags.len(), repo);

        for tag in &tags {
            let reference = Reference::new(tag)?;
            let (digest, media_type) = client.head_manifest(&name, &reference)?;
            if distribution::is_index_media_type(&media_type) {
                let index = client.get_index(&name, &reference)?;
                rows.extend(index_rows(registry, &name, &reference, digest, &index)?);
            } else {
                rows.push(image_row(registry, &name, &reference, &mut client)?);
            }
        }
    }
    Ok(rows)
}

/// Rows for a multi-platform index: the index itself first, then one row per
/// runnable platform entry with the index digest as parent
fn index_rows(
    registry: &str,
    repo: &Name,
    tag: &Reference,
    index_digest: Digest,
    index: &ImageIndex,
) -> Result<Vec<RegistryInfo>> {
    let mut rows = vec![RegistryInfo {
        registry: registry.to_string(),
        repo: repo.clone(),
        tag: tag.clone(),
        platform: PLATFORM_INDEX.to_string(),
        digest: index_digest.clone(),
        parent: None,
    }];
    for descriptor in index.manifests() {
        let platform = match descriptor.platform().as_ref() {
            Some(p) => format!("{}/{}", p.os(), p.architecture()),
            None => "unknown".to_string(),
        };
        if platform.contains("unknown") {
            continue;
        }
        rows.push(RegistryInfo {
            registry: registry.to_string(),
            repo: repo.clone(),
            tag: tag.clone(),
            platform,
            digest: Digest::new(descriptor.digest())?,
            parent: Some(index_digest.clone()),
        });
    }
    Ok(rows)
}

/// Row for a single-platform manifest, resolved through its image
/// configuration blob
fn image_row(
    registry: &str,
    repo: &Name,
    tag: &Reference,
    client: &mut Client,
) -> Result<RegistryInfo> {
    let manifest = client.get_manifest(repo, tag)?;
    let config_digest = Digest::new(manifest.config().digest())?;
    let blob = client.get_blob(repo, &config_digest)?;
    let config = serde_json::from_slice::<serde_json::Value>(&blob)?;
    Ok(RegistryInfo {
        registry: registry.to_string(),
        repo: repo.clone(),
        tag: tag.clone(),
        platform: config_platform(&config),
        digest: config_digest,
        parent: None,
    })
}

/// `os/architecture` of an image configuration, `unknown` for absent fields
fn config_platform(config: &serde_json::Value) -> String {
    let os = config.get("os").and_then(|v| v.as_str()).unwrap_or("unknown");
    let arch = config
        .get("architecture")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    format!("{}/{}", os, arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const D1: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const D2: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";
    const D3: &str = "sha256:3333333333333333333333333333333333333333333333333333333333333333";

    fn index_fixture() -> ImageIndex {
        let json = format!(
            r#"{{
              "schemaVersion": 2,
              "manifests": [
                {{
                  "mediaType": "application/vnd.oci.image.manifest.v1+json",
                  "digest": "{D2}",
                  "size": 7143,
                  "platform": {{ "architecture": "amd64", "os": "linux" }}
                }},
                {{
                  "mediaType": "application/vnd.oci.image.manifest.v1+json",
                  "digest": "{D3}",
                  "size": 7143,
                  "platform": {{ "architecture": "unknown", "os": "unknown" }}
                }}
              ]
            }}"#
        );
        ImageIndex::from_reader(json.as_bytes()).unwrap()
    }

    #[test]
    fn index_rows_link_back_to_index_digest() -> Result<()> {
        let rows = index_rows(
            "registry.example",
            &Name::new("canonical/ubuntu")?,
            &Reference::new("22.04")?,
            Digest::new(D1)?,
            &index_fixture(),
        )?;

        // Index row first, parentless; the attestation entry is dropped
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].platform, PLATFORM_INDEX);
        assert_eq!(rows[0].digest, Digest::new(D1)?);
        assert_eq!(rows[0].parent, None);
        assert_eq!(rows[1].platform, "linux/amd64");
        assert_eq!(rows[1].digest, Digest::new(D2)?);
        assert_eq!(rows[1].parent, Some(Digest::new(D1)?));
        Ok(())
    }

    #[test]
    fn config_platforms() {
        let config = serde_json::json!({"os": "linux", "architecture": "arm64"});
        assert_eq!(config_platform(&config), "linux/arm64");

        let config = serde_json::json!({"architecture": "arm64"});
        assert_eq!(config_platform(&config), "unknown/arm64");

        let config = serde_json::json!({});
        assert_eq!(config_platform(&config), "unknown/unknown");
    }

    #[test]
    fn table_round_trip() -> Result<()> {
        let rows = vec![
            RegistryInfo {
                registry: "registry.example".to_string(),
                repo: Name::new("canonical/ubuntu")?,
                tag: Reference::new("22.04")?,
                platform: PLATFORM_INDEX.to_string(),
                digest: Digest::new(D1)?,
                parent: None,
            },
            RegistryInfo {
                registry: "registry.example".to_string(),
                repo: Name::new("canonical/ubuntu")?,
                tag: Reference::new("22.04")?,
                platform: "linux/amd64".to_string(),
                digest: Digest::new(D2)?,
                parent: Some(Digest::new(D1)?),
            },
        ];

        let mut buf = Vec::new();
        write_table(&mut buf, &rows)?;
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Registry\tName/Namespace\tTag\tPlatform\tDigest\tParent\n"));
        assert!(text.ends_with(&format!(
            "registry.example\tcanonical/ubuntu\t22.04\tlinux/amd64\t{D2}\t{D1}\n"
        )));

        let parsed = parse_table(&text, Path::new("index.tsv"))?;
        assert_eq!(parsed, rows);
        Ok(())
    }

    #[test]
    fn table_columns_by_name() -> Result<()> {
        // Reordered and extra columns are fine as long as the expected ones exist
        let text = format!(
            "Extra\tDigest\tParent\tRegistry\tName/Namespace\tTag\tPlatform\n\
             x\t{D1}\tNone\tregistry.example\tubuntu\t24.04\tindex\n"
        );
        let rows = parse_table(&text, Path::new("index.tsv"))?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].platform, "index");
        assert_eq!(rows[0].digest, Digest::new(D1)?);
        Ok(())
    }

    #[test]
    fn table_missing_column() {
        let text = "Registry\tTag\tPlatform\tDigest\tParent\n";
        match parse_table(text, Path::new("index.tsv")) {
            Err(Error::InvalidTableHeader { column, .. }) => {
                assert_eq!(column, "Name/Namespace");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn table_short_row() {
        let text = format!("Registry\tName/Namespace\tTag\tPlatform\tDigest\tParent\nregistry.example\tubuntu\t22.04\tindex\t{D1}\n");
        assert!(matches!(
            parse_table(&text, Path::new("index.tsv")),
            Err(Error::InvalidRow(_))
        ));
    }
}
