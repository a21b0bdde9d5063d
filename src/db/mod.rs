// src/db/mod.rs

//! Package relation database for raypm
//!
//! This module keeps the persistent record of installed packages:
//! - One entry per installed package name
//! - Sorted `depends_on` / `required_for` adjacency lists per entry
//! - Deletion gated on an empty `required_for` list
//! - JSON persistence with atomic write-back
//!
//! `depends_on` records the install-time intent of a package and is never
//! rewritten when a dependency goes away. `required_for` holds the live
//! back-references and is the only thing consulted before removal.

pub mod models;

use crate::error::{Error, Result};
pub use models::Relations;
use models::{insert_sorted, remove_name};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Package name to relations mapping, persisted as one JSON object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDb {
    entries: BTreeMap<String, Relations>,
    path: PathBuf,
}

impl PackageDb {
    /// Create an empty database bound to `path`
    ///
    /// Nothing is written until [`PackageDb::write`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: BTreeMap::new(),
            path: path.into(),
        }
    }

    /// Open an existing database file
    ///
    /// Fails with `StoreUnreadable` if the file is absent or not valid JSON.
    /// Relation lists are re-sorted and deduplicated on the way in.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Opening package database at: {}", path.display());

        let content = fs::read_to_string(&path).map_err(|e| Error::StoreUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut entries: BTreeMap<String, Relations> =
            serde_json::from_str(&content).map_err(|e| Error::StoreUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        entries.values_mut().for_each(Relations::normalize);

        debug!("Loaded {} package entries", entries.len());
        Ok(Self { entries, path })
    }

    /// Open the database at `path`, or start an empty one if it does not exist yet
    pub fn open_or_new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            Self::open(path)
        } else {
            info!("No package database at {}, starting a new one", path.display());
            Ok(Self::new(path))
        }
    }

    /// Serialize all entries back to the bound path
    ///
    /// Parent directories are created as needed. The file is replaced
    /// atomically so a failed write never truncates the previous state.
    pub fn write(&self) -> Result<()> {
        let persist_err = |source: io::Error| Error::PersistFailed {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(persist_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(persist_err)?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries)
            .map_err(|e| persist_err(io::Error::other(e)))?;
        tmp.write_all(b"\n").map_err(persist_err)?;
        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;

        debug!(
            "Wrote {} package entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Path the database is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Relations> {
        self.entries.get(name)
    }

    /// All entries, ordered by package name
    pub fn entries(&self) -> &BTreeMap<String, Relations> {
        &self.entries
    }

    /// Installed package names in ascending order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ensure an entry for `name` exists; existing edges are never touched
    pub fn add(&mut self, name: &str) {
        if !self.entries.contains_key(name) {
            debug!("Adding '{}' to package database", name);
            self.entries.insert(name.to_string(), Relations::new());
        }
    }

    /// Record that `owner` depends on `dep`
    ///
    /// No-op unless both packages already have entries. Repeated calls
    /// leave both lists unchanged.
    pub fn add_dep(&mut self, owner: &str, dep: &str) {
        if owner == dep {
            warn!("Ignoring self dependency of '{}'", owner);
            return;
        }
        if !(self.entries.contains_key(owner) && self.entries.contains_key(dep)) {
            debug!("Skipping edge {} -> {}: entry missing", owner, dep);
            return;
        }

        if let Some(rel) = self.entries.get_mut(owner) {
            insert_sorted(&mut rel.depends_on, dep);
        }
        if let Some(rel) = self.entries.get_mut(dep) {
            insert_sorted(&mut rel.required_for, owner);
        }
    }

    /// Drop the edge `owner -> dep` from both sides, if present
    pub fn remove_dep(&mut self, owner: &str, dep: &str) {
        if let Some(rel) = self.entries.get_mut(owner) {
            remove_name(&mut rel.depends_on, dep);
        }
        if let Some(rel) = self.entries.get_mut(dep) {
            remove_name(&mut rel.required_for, owner);
        }
    }

    /// Remove the entry for `name`
    ///
    /// Refuses with `RequiredByOthers` while any package still depends on
    /// `name`; the database is left untouched in that case. On success,
    /// `name` is cleared from every remaining `required_for` list. Deleting
    /// an unknown name is a no-op.
    pub fn del(&mut self, name: &str) -> Result<()> {
        let Some(rel) = self.entries.get(name) else {
            return Ok(());
        };

        if !rel.required_for.is_empty() {
            for dependent in &rel.required_for {
                warn!("Package '{}' depends on '{}'", dependent, name);
            }
            return Err(Error::RequiredByOthers {
                package: name.to_string(),
                dependents: rel.required_for.clone(),
            });
        }

        self.entries.remove(name);
        for rel in self.entries.values_mut() {
            remove_name(&mut rel.required_for, name);
        }

        debug!("Removed '{}' from package database", name);
        Ok(())
    }

    /// Pairs `(a, b)` where exactly one side of the edge `a -> b` is recorded
    ///
    /// Edges pointing at names without an entry are not reported: removed
    /// packages may legitimately linger in `depends_on`.
    pub fn symmetry_violations(&self) -> Vec<(String, String)> {
        let mut violations = Vec::new();

        for (name, rel) in &self.entries {
            for dep in &rel.depends_on {
                if let Some(other) = self.entries.get(dep) {
                    if !other.required_for.contains(name) {
                        violations.push((name.clone(), dep.clone()));
                    }
                }
            }
            for dependent in &rel.required_for {
                let recorded = self
                    .entries
                    .get(dependent)
                    .is_some_and(|other| other.depends_on.contains(name));
                if !recorded {
                    violations.push((dependent.clone(), name.clone()));
                }
            }
        }

        violations
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone)]
    enum Op {
        Add(String),
        AddDep(String, String),
        RemoveDep(String, String),
        Del(String),
    }

    // A small alphabet keeps collisions, and so shared edges, frequent
    fn arb_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("game"),
            Just("raylib"),
            Just("glfw"),
            Just("audio"),
            Just("mesa"),
        ]
        .prop_map(String::from)
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            2 => arb_name().prop_map(Op::Add),
            3 => (arb_name(), arb_name()).prop_map(|(owner, dep)| Op::AddDep(owner, dep)),
            1 => (arb_name(), arb_name()).prop_map(|(owner, dep)| Op::RemoveDep(owner, dep)),
            1 => arb_name().prop_map(Op::Del),
        ]
    }

    fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(arb_op(), 0..40)
    }

    fn replay(ops: &[Op]) -> PackageDb {
        let mut db = PackageDb::new("db.json");
        for op in ops {
            match op {
                Op::Add(name) => db.add(name),
                Op::AddDep(owner, dep) => db.add_dep(owner, dep),
                Op::RemoveDep(owner, dep) => db.remove_dep(owner, dep),
                Op::Del(name) => {
                    let _ = db.del(name);
                }
            }
        }
        db
    }

    fn is_canonical(list: &[String]) -> bool {
        list.windows(2).all(|pair| pair[0] < pair[1])
    }

    proptest! {
        #[test]
        fn relations_stay_symmetric_and_sorted(ops in arb_ops()) {
            let db = replay(&ops);
            prop_assert!(db.symmetry_violations().is_empty());
            for (name, rel) in db.entries() {
                prop_assert!(is_canonical(&rel.depends_on), "{} depends_on {:?}", name, rel.depends_on);
                prop_assert!(is_canonical(&rel.required_for), "{} required_for {:?}", name, rel.required_for);
                prop_assert!(!rel.depends_on.contains(name));
            }
        }

        #[test]
        fn repeated_add_dep_changes_nothing(
            ops in arb_ops(),
            owner in arb_name(),
            dep in arb_name(),
        ) {
            let mut db = replay(&ops);
            db.add_dep(&owner, &dep);
            let once = db.clone();
            db.add_dep(&owner, &dep);
            prop_assert_eq!(db, once);
        }

        #[test]
        fn refused_del_leaves_serialized_store_unchanged(ops in arb_ops(), name in arb_name()) {
            let mut db = replay(&ops);
            let before = serde_json::to_vec(db.entries()).unwrap();
            if db.del(&name).is_err() {
                prop_assert_eq!(serde_json::to_vec(db.entries()).unwrap(), before);
            }
        }

        #[test]
        fn write_then_open_is_identity(ops in arb_ops()) {
            let dir = tempdir().unwrap();
            let db = PackageDb {
                path: dir.path().join("db.json"),
                ..replay(&ops)
            };
            db.write().unwrap();
            prop_assert_eq!(PackageDb::open(db.path()).unwrap(), db);
        }
    }
}
