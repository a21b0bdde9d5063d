// src/deptree/node.rs

//! Dependency node: one occurrence of a package in the tree
//!
//! Nodes are not interned. A package reached through two paths yields two
//! nodes, and the second visit is absorbed by the database/store check.

use super::{TreeContext, phases};
use crate::db::PackageDb;
use crate::error::{Error, Result};
use crate::packages::Descriptor;
use crate::vars::Variables;
use std::fs;
use std::io;
use tracing::{debug, error, info, warn};

/// A package together with the subtrees of its dependencies
#[derive(Debug, Clone)]
pub struct Node {
    descriptor: Descriptor,
    vars: Variables,
    children: Vec<Node>,
}

impl Node {
    /// Resolve `name` and all of its dependencies recursively
    ///
    /// `path` holds the packages currently being resolved above this one;
    /// meeting one of them again is a cycle.
    pub(crate) fn build(context: &TreeContext, name: &str, path: &mut Vec<String>) -> Result<Self> {
        if path.iter().any(|ancestor| ancestor == name) {
            let mut chain = path.clone();
            chain.push(name.to_string());
            return Err(Error::CyclicDependency(chain));
        }

        debug!("Creating node '{}'", name);
        let mut vars = Variables::new(context.root(), context.pkgs_dir(), name);
        let descriptor = Descriptor::load(&vars.package_source_dir, context.target())?;

        path.push(name.to_string());
        let children = descriptor
            .dependencies
            .iter()
            .map(|dep| {
                debug!("Found '{}', appending to '{}'", dep, name);
                Node::build(context, dep, path)
            })
            .collect::<Result<Vec<_>>>();
        path.pop();

        vars.direct_deps = descriptor.dependencies.clone();
        Ok(Self {
            children: children?,
            descriptor,
            vars,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Call `f` on every node, dependencies before dependents
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        for child in &self.children {
            child.visit(f);
        }
        f(self);
    }

    /// Install dependencies depth-first, then this package
    ///
    /// A package with both a database entry and an output directory is
    /// already installed and left alone. If anything fails after that
    /// check, the edges this node recorded toward its children and its own
    /// entry are removed again; installed children stay installed.
    pub(crate) fn install(&self, db: &mut PackageDb) -> Result<()> {
        let name = self.name();

        if self.is_installed(db)? {
            info!("Package '{}' already installed", name);
            return Ok(());
        }

        let mut linked: Vec<&str> = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if let Err(e) = child.install(db) {
                self.rollback(db, &linked);
                return Err(e);
            }
            db.add(name);
            db.add_dep(name, child.name());
            linked.push(child.name());
        }

        info!("Installing {}", name);
        if let Err(e) = phases::install(&self.descriptor, &self.vars) {
            self.rollback(db, &linked);
            return Err(e);
        }

        db.add(name);
        info!("Package '{}' installed", name);
        Ok(())
    }

    /// Dependencies are installed, then this package is only fetched,
    /// unpacked and built; its own database entry is not touched
    pub(crate) fn build_only(&self, db: &mut PackageDb) -> Result<()> {
        for child in &self.children {
            child.install(db)?;
        }

        info!("Building {}", self.name());
        phases::prepare(&self.descriptor, &self.vars)
    }

    /// Remove this package only; its dependencies stay installed
    ///
    /// The database deletion is the gate: while other packages require this
    /// one, nothing on disk is touched.
    pub(crate) fn uninstall(&self, db: &mut PackageDb) -> Result<()> {
        let name = self.name();

        if !self.is_installed(db)? {
            warn!("Package '{}' is not installed", name);
            return Ok(());
        }

        db.del(name)?;

        info!("Uninstalling {}", name);
        phases::uninstall(&self.descriptor, &self.vars)?;

        let out_dir = &self.vars.output_dir;
        fs::remove_dir_all(out_dir).map_err(|e| {
            error!("Failed to remove package's directory '{}'", out_dir.display());
            Error::Io(e)
        })?;

        match fs::remove_dir_all(&self.vars.cache_dir) {
            Ok(()) => debug!("Removed cache {}", self.vars.cache_dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove cache '{}': {}",
                self.vars.cache_dir.display(),
                e
            ),
        }

        info!("Package '{}' removed", name);
        Ok(())
    }

    /// Whether the database and the store agree the package is installed
    fn is_installed(&self, db: &PackageDb) -> Result<bool> {
        let name = self.name();
        let in_db = db.contains(name);
        let in_store = self.vars.output_dir.exists();

        if in_db != in_store {
            error!("Seems there was an error while installing/uninstalling '{}'", name);
            return Err(Error::InconsistentState {
                package: name.to_string(),
                in_db,
                in_store,
            });
        }
        Ok(in_db)
    }

    fn rollback(&self, db: &mut PackageDb, linked: &[&str]) {
        let name = self.name();
        warn!("Rolling back database entry of '{}'", name);

        for dep in linked {
            db.remove_dep(name, dep);
        }
        if let Err(e) = db.del(name) {
            error!("Failed to drop '{}' from database: {}", name, e);
        }
    }
}
