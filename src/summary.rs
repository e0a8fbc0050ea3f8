//! Aggregate an inventory table into base-image groups
//!
//! Rows are grouped under their top-level (parentless) digest in two passes:
//! the first registers a group per parentless digest, the second attributes
//! every row's platform and tag to the group its parent (or, failing that,
//! its own digest) belongs to. Each group must encode exactly one `NN.NN`
//! base version across its tags.

use crate::{
    error::*,
    inventory::{RegistryInfo, PLATFORM_INDEX},
};
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io::Write,
};

/// Fixed top-level key of the YAML document
pub const DEFAULT_ROOT: &str = "canonical";

/// Aggregate of all platform/tag information rooted at one parentless digest
///
/// Field order is the YAML key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseImageGroup {
    pub name: String,
    pub os_type: String,
    pub platforms: Vec<String>,
    pub tags: Vec<String>,
}

lazy_static::lazy_static! {
    static ref BASE_VERSION_RE: Regex = Regex::new(r"\d{2}\.\d{2}").unwrap();
}

/// Group rows by parentless digest and infer each group's base version
pub fn summarize(rows: &[RegistryInfo]) -> Result<Vec<BaseImageGroup>> {
    let mut groups: Vec<BaseImageGroup> = Vec::new();
    let mut by_digest: HashMap<String, usize> = HashMap::new();

    // Pass 1: register a group per first-seen parentless digest
    for row in rows {
        if row.parent.is_none() {
            let key = row.digest.to_string();
            if !by_digest.contains_key(&key) {
                by_digest.insert(key, groups.len());
                groups.push(BaseImageGroup {
                    name: format!("{}/{}", row.registry, row.repo),
                    os_type: "unknown".to_string(),
                    platforms: Vec::new(),
                    tags: Vec::new(),
                });
            }
        }
    }

    // Pass 2: attribute rows, preferring the parent digest as lookup key.
    // A row matching no group is an orphan and contributes nothing.
    for row in rows {
        let key = match row.parent.as_ref() {
            Some(parent) if by_digest.contains_key(&parent.to_string()) => parent.to_string(),
            _ => row.digest.to_string(),
        };
        let index = match by_digest.get(&key) {
            Some(index) => *index,
            None => continue,
        };
        let group = &mut groups[index];
        if row.platform != PLATFORM_INDEX && !group.platforms.contains(&row.platform) {
            group.platforms.push(row.platform.clone());
        }
        let tag = row.tag.to_string();
        if !group.tags.contains(&tag) {
            group.tags.push(tag);
        }
    }

    for group in &mut groups {
        group.os_type = infer_os_type(&group.name, &group.tags)?;
    }
    Ok(groups)
}

/// `ubuntu{major}{minor}-container` from the single `NN.NN` pattern the
/// group's tags encode
///
/// Zero or several distinct patterns across the tags violate the base-version
/// invariant and abort the aggregation, naming the group.
fn infer_os_type(name: &str, tags: &[String]) -> Result<String> {
    let versions: BTreeSet<&str> = tags
        .iter()
        .filter_map(|tag| BASE_VERSION_RE.find_iter(tag).last())
        .map(|m| m.as_str())
        .collect();
    if versions.len() != 1 {
        return Err(Error::AmbiguousBaseVersion {
            name: name.to_string(),
            versions: versions.into_iter().map(str::to_string).collect(),
        });
    }
    let version = versions
        .into_iter()
        .next()
        .expect("Never fails, exactly one element");
    let (major, minor) = version
        .split_once('.')
        .expect("Never fails, the pattern contains a dot");
    Ok(format!("ubuntu{}{}-container", major, minor))
}

/// Serialize `{root: [groups, ...]}` as a YAML document
pub fn write_yaml<W: Write>(w: W, root: &str, groups: &[BaseImageGroup]) -> Result<()> {
    let document = BTreeMap::from([(root, groups)]);
    serde_yaml::to_writer(w, &document)?;
    Ok(())
}
