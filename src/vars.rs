// src/vars.rs

//! Per-package path variables
//!
//! Task definitions refer to package paths through tokens that are
//! substituted before execution:
//!
//! | token    | path                      |
//! |----------|---------------------------|
//! | `$src`   | `<root>/cache/<name>/src` |
//! | `$fetch` | `<root>/cache/<name>/fetch` |
//! | `$cache` | `<root>/cache/<name>`     |
//! | `$out`   | `<root>/store/<name>`     |
//! | `$pkg`   | `<pkgs>/<name>`           |
//! | `$dep`   | `<root>/store`            |

use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved paths for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub cache_dir: PathBuf,
    pub source_dir: PathBuf,
    pub fetch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub package_source_dir: PathBuf,
    pub store_dir: PathBuf,
    /// Names of the packages this one directly depends on
    pub direct_deps: Vec<String>,
}

impl Variables {
    /// Derive the paths of `name` under `root`, with descriptors kept in `pkgs`
    pub fn new(root: &Path, pkgs: &Path, name: &str) -> Self {
        let cache_dir = root.join("cache").join(name);
        let store_dir = root.join("store");

        Self {
            source_dir: cache_dir.join("src"),
            fetch_dir: cache_dir.join("fetch"),
            output_dir: store_dir.join(name),
            package_source_dir: pkgs.join(name),
            cache_dir,
            store_dir,
            direct_deps: Vec::new(),
        }
    }

    /// Substitute path tokens in every element of `tokens`
    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        let expanded: Vec<String> = tokens.iter().map(|t| self.replace_tokens(t)).collect();
        debug!("Expanded {:?} to {:?}", tokens, expanded);
        expanded
    }

    /// Expand `tokens` and join the results into one path
    pub fn join(&self, tokens: &[String]) -> PathBuf {
        self.expand(tokens).iter().collect()
    }

    fn replace_tokens(&self, text: &str) -> String {
        [
            ("$src", &self.source_dir),
            ("$out", &self.output_dir),
            ("$fetch", &self.fetch_dir),
            ("$cache", &self.cache_dir),
            ("$pkg", &self.package_source_dir),
            ("$dep", &self.store_dir),
        ]
        .iter()
        .fold(text.to_string(), |acc, (token, path)| {
            acc.replace(token, &path.to_string_lossy())
        })
    }
}
