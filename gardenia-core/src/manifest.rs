//! Bundle declaration loader.
//!
//! The declaration is a nested document whose string leaves are `owner/repo`
//! and whose object keys name install subdirectories:
//!
//! ```json
//! {
//!   "pack/tools/start": ["tpope/vim-fugitive", "tpope/vim-surround"],
//!   "pack/lang": { "opt": "rust-lang/rust.vim" }
//! }
//! ```
//!
//! flattens to three [`BundleDescriptor`]s under `pack/tools/start` and
//! `pack/lang/opt`. Arrays fan out under the same subdirectory.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ManifestError;
use crate::types::{is_safe_subdir, BundleDescriptor};

/// File name of the declaration inside the install root.
pub const MANIFEST_FILE: &str = "gardenia.json";

/// One node of the declaration tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeclNode {
    /// `"owner/repo"`
    Leaf(String),
    /// Several nodes sharing the current subdirectory.
    Sequence(Vec<DeclNode>),
    /// Child nodes keyed by subdirectory name. Sorted for a stable order.
    Group(BTreeMap<String, DeclNode>),
}

/// Flatten a declaration tree into bundle descriptors.
pub fn flatten(root: &DeclNode) -> Result<Vec<BundleDescriptor>, ManifestError> {
    let mut bundles = Vec::new();
    descend(root, "", &mut bundles)?;
    Ok(bundles)
}

fn descend(
    node: &DeclNode,
    subdir: &str,
    out: &mut Vec<BundleDescriptor>,
) -> Result<(), ManifestError> {
    match node {
        DeclNode::Leaf(owner_repo) => out.push(BundleDescriptor::parse(owner_repo, subdir)?),
        DeclNode::Sequence(children) => {
            for child in children {
                descend(child, subdir, out)?;
            }
        }
        DeclNode::Group(children) => {
            for (key, child) in children {
                validate_key(key, subdir)?;
                let nested = if subdir.is_empty() {
                    key.clone()
                } else {
                    format!("{subdir}/{key}")
                };
                descend(child, &nested, out)?;
            }
        }
    }
    Ok(())
}

fn validate_key(key: &str, subdir: &str) -> Result<(), ManifestError> {
    if key.is_empty() || !is_safe_subdir(key) {
        return Err(ManifestError::InvalidKey {
            key: key.to_string(),
            subdir: subdir.to_string(),
        });
    }
    Ok(())
}

/// Parse a declaration from JSON text.
pub fn parse_json(path: &Path, contents: &str) -> Result<DeclNode, ManifestError> {
    serde_json::from_str(contents).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a declaration from YAML text.
pub fn parse_yaml(path: &Path, contents: &str) -> Result<DeclNode, ManifestError> {
    serde_yaml::from_str(contents).map_err(|source| ManifestError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and flatten the declaration at `path`.
///
/// `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
pub fn load(path: &Path) -> Result<Vec<BundleDescriptor>, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let root = if is_yaml {
        parse_yaml(path, &contents)?
    } else {
        parse_json(path, &contents)?
    };
    flatten(&root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(text: &str) -> DeclNode {
        parse_json(Path::new("test.json"), text).unwrap()
    }

    #[test]
    fn single_leaf_lands_in_root() {
        let bundles = flatten(&json(r#""tpope/vim-sensible""#)).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].install_subdir, "");
        assert_eq!(bundles[0].repo, "vim-sensible");
    }

    #[test]
    fn nested_keys_join_with_slash() {
        let bundles = flatten(&json(r#"{"pack": {"a": {"start": "o/r"}}}"#)).unwrap();
        assert_eq!(bundles[0].install_subdir, "pack/a/start");
    }

    #[test]
    fn sequence_fans_out_under_same_subdir() {
        let bundles = flatten(&json(r#"{"bundle": ["a/one", "b/two", ["c/three"]]}"#)).unwrap();
        let subdirs: Vec<_> = bundles.iter().map(|b| b.install_subdir.as_str()).collect();
        assert_eq!(subdirs, vec!["bundle", "bundle", "bundle"]);
        let repos: Vec<_> = bundles.iter().map(|b| b.repo.as_str()).collect();
        assert_eq!(repos, vec!["one", "two", "three"]);
    }

    #[test]
    fn group_keys_are_visited_in_sorted_order() {
        let bundles = flatten(&json(r#"{"z": "o/z", "a": "o/a", "m": "o/m"}"#)).unwrap();
        let repos: Vec<_> = bundles.iter().map(|b| b.repo.as_str()).collect();
        assert_eq!(repos, vec!["a", "m", "z"]);
    }

    #[test]
    fn malformed_leaf_names_its_subdir() {
        let err = flatten(&json(r#"{"x": {"y": "no-slash"}}"#)).unwrap_err();
        match err {
            ManifestError::InvalidBundle { value, subdir } => {
                assert_eq!(value, "no-slash");
                assert_eq!(subdir, "x/y");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_string_leaf_is_a_parse_error() {
        let err = parse_json(Path::new("d.json"), r#"{"x": 42}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Json { .. }));
    }

    #[test]
    fn dot_dot_key_is_rejected() {
        let err = flatten(&json(r#"{"..": "o/r"}"#)).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidKey { .. }));
    }

    #[test]
    fn empty_key_segment_is_rejected() {
        let err = flatten(&json(r#"{"pack//start": "o/r"}"#)).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidKey { .. }));
    }

    #[test]
    fn yaml_declaration_flattens_like_json() {
        let yaml = "pack/tools/start:\n  - tpope/vim-fugitive\n  - tpope/vim-surround\n";
        let root = parse_yaml(Path::new("d.yaml"), yaml).unwrap();
        let bundles = flatten(&root).unwrap();
        assert_eq!(bundles.len(), 2);
        assert!(bundles.iter().all(|b| b.install_subdir == "pack/tools/start"));
    }
}
