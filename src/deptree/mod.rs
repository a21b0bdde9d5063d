// src/deptree/mod.rs

//! Dependency tree and install/uninstall orchestration
//!
//! A [`Tree`] is resolved from a package name by loading its descriptor and,
//! recursively, the descriptors of everything it depends on. Installation
//! walks the tree depth-first (dependencies before dependents) and records
//! who depends on whom in the [`PackageDb`]; removal acts on the root
//! package alone.
//!
//! The database is mutated in memory only. Callers write it back once the
//! whole operation is over, whatever its outcome.

mod node;
mod phases;

pub use node::Node;
pub use phases::Phase;

use crate::db::PackageDb;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Paths and systems shared by every node of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeContext {
    root: PathBuf,
    pkgs_dir: PathBuf,
    host: String,
    target: String,
}

impl TreeContext {
    /// Context for `root`, with descriptors under `<root>/pkgs`
    pub fn new(root: impl Into<PathBuf>, host: &str, target: &str) -> Self {
        let root = root.into();
        Self {
            pkgs_dir: root.join("pkgs"),
            root,
            host: host.to_string(),
            target: target.to_string(),
        }
    }

    /// Read descriptors from `pkgs_dir` instead
    pub fn with_pkgs_dir(mut self, pkgs_dir: impl Into<PathBuf>) -> Self {
        self.pkgs_dir = pkgs_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pkgs_dir(&self) -> &Path {
        &self.pkgs_dir
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Resolved dependency tree of one package, bound to the package database
pub struct Tree<'db> {
    root: Node,
    context: TreeContext,
    db: &'db mut PackageDb,
}

impl<'db> Tree<'db> {
    /// Resolve `name` and its transitive dependencies
    ///
    /// Fails with `Resolve` naming `name` when any descriptor cannot be
    /// loaded or the dependencies form a cycle.
    pub fn new(context: TreeContext, name: &str, db: &'db mut PackageDb) -> Result<Self> {
        debug!("Creating dependency tree for '{}'", name);
        debug!("Packages path: {}", context.pkgs_dir().display());
        debug!("Host: {}, target: {}", context.host(), context.target());

        let root = Node::build(&context, name, &mut Vec::new()).map_err(|e| Error::Resolve {
            package: name.to_string(),
            source: Box::new(e),
        })?;

        Ok(Self { root, context, db })
    }

    /// Install the root package and everything it depends on
    pub fn install(&mut self) -> Result<()> {
        debug!("Install order: {:?}", self.install_order());
        self.root.install(&mut *self.db).inspect_err(|e| {
            error!("Package installation failed: {}", e);
        })
    }

    /// Remove the root package; its dependencies are kept
    pub fn uninstall(&mut self) -> Result<()> {
        self.root.uninstall(&mut *self.db).inspect_err(|e| {
            error!("Package removal failed: {}", e);
        })
    }

    /// Install dependencies and build the root package without installing it
    pub fn build(&mut self) -> Result<()> {
        self.root.build_only(&mut *self.db).inspect_err(|e| {
            error!("Package build failed: {}", e);
        })
    }

    /// Package names in installation order; repeated occurrences are kept
    pub fn install_order(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.root.visit(&mut |node| names.push(node.name()));
        names
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn context(&self) -> &TreeContext {
        &self.context
    }

    pub fn db(&self) -> &PackageDb {
        &*self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn write_package(root: &Path, name: &str, deps: &[&str]) {
        let dir = root.join("pkgs").join(name);
        fs::create_dir_all(&dir).unwrap();
        let manifest = serde_json::json!({
            "name": name,
            "description": format!("{} package", name),
            "dependencies": deps,
        });
        fs::write(dir.join("package.json"), manifest.to_string()).unwrap();
    }

    fn setup(packages: &[(&str, &[&str])]) -> (TempDir, TreeContext) {
        let dir = tempdir().unwrap();
        for (name, deps) in packages {
            write_package(dir.path(), name, deps);
        }
        let context = TreeContext::new(dir.path(), "linux", "linux");
        (dir, context)
    }

    #[test]
    fn test_tree_post_order() {
        let (dir, context) = setup(&[("game", &["raylib", "audio"]), ("raylib", &["glfw"]), ("glfw", &[]), ("audio", &[])]);
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let tree = Tree::new(context, "game", &mut db).unwrap();
        assert_eq!(tree.install_order(), vec!["glfw", "raylib", "audio", "game"]);
        assert_eq!(
            tree.root().variables().direct_deps,
            vec!["raylib".to_string(), "audio".to_string()]
        );
        assert_eq!(tree.root().children().len(), 2);
    }

    #[test]
    fn test_diamond_produces_two_nodes() {
        let (dir, context) = setup(&[("game", &["raylib", "audio"]), ("raylib", &["glfw"]), ("audio", &["glfw"]), ("glfw", &[])]);
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let tree = Tree::new(context, "game", &mut db).unwrap();
        let order = tree.install_order();
        assert_eq!(order.iter().filter(|n| **n == "glfw").count(), 2);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_cycle_detected() {
        let (dir, context) = setup(&[("game", &["raylib"]), ("raylib", &["glfw"]), ("glfw", &["game"])]);
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let err = Tree::new(context, "game", &mut db).err().unwrap();
        match &err {
            Error::Resolve { package, .. } => assert_eq!(package, "game"),
            other => panic!("unexpected error: {other}"),
        }
        match err.root_cause() {
            Error::CyclicDependency(chain) => {
                assert_eq!(chain, &vec!["game", "raylib", "glfw", "game"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let (dir, context) = setup(&[("glfw", &["glfw"])]);
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let err = Tree::new(context, "glfw", &mut db).err().unwrap();
        assert!(matches!(err.root_cause(), Error::CyclicDependency(_)));
    }

    #[test]
    fn test_missing_dependency_descriptor() {
        let (dir, context) = setup(&[("game", &["raylib"])]);
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let err = Tree::new(context, "game", &mut db).err().unwrap();
        assert!(matches!(err, Error::Resolve { .. }));
        assert!(matches!(err.root_cause(), Error::Descriptor { .. }));
    }

    #[test]
    fn test_target_overlay_used_by_nodes() {
        let (dir, context) = setup(&[("glfw", &[])]);
        fs::write(
            dir.path().join("pkgs/glfw/package_linux.json"),
            r#"{"install_phase": [{"command": "mkdir", "path": ["$out", "lib"]}]}"#,
        )
        .unwrap();
        let mut db = PackageDb::new(dir.path().join("db.json"));

        let tree = Tree::new(context, "glfw", &mut db).unwrap();
        assert_eq!(tree.root().descriptor().install_phase.len(), 1);
        assert_eq!(tree.context().target(), "linux");
    }

    #[test]
    fn test_custom_pkgs_dir() {
        let (dir, _) = setup(&[]);
        let pkgs = dir.path().join("elsewhere");
        fs::create_dir_all(pkgs.join("glfw")).unwrap();
        fs::write(pkgs.join("glfw/package.json"), "{}").unwrap();

        let context = TreeContext::new(dir.path(), "linux", "linux").with_pkgs_dir(&pkgs);
        let mut db = PackageDb::new(dir.path().join("db.json"));
        let tree = Tree::new(context, "glfw", &mut db).unwrap();
        assert_eq!(tree.root().variables().package_source_dir, pkgs.join("glfw"));
        assert_eq!(tree.root().variables().output_dir, dir.path().join("store/glfw"));
    }
}
