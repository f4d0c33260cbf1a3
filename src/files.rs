//! Migration file copier.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Suffix appended to a target that existed before it was overwritten
pub const BACKUP_SUFFIX: &str = ".beforeMigration";

/// Copies files that are part of a migrated configuration
pub trait MigrationFiles: Send + Sync {
    /// Copy `source` to `target`; a pre-existing target is backed up once
    fn copy(&self, source: &Path, target: &Path) -> Result<()>;

    /// Files under `path` (or `path` itself) accepted by every filter, sorted
    fn filter(&self, path: &Path, filters: &[&dyn FileFilter]) -> Result<Vec<PathBuf>>;

    /// Targets copied so far, mapped to their sources
    fn copied(&self) -> BTreeMap<PathBuf, PathBuf>;
}

/// Predicate over candidate configuration files
pub trait FileFilter: Send + Sync {
    fn accept(&self, path: &Path) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Accepts files whose name matches a pattern
#[derive(Debug, Clone)]
pub struct FileNameFilter(Regex);

impl FileNameFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(Regex::new(pattern)?))
    }
}

impl FileFilter for FileNameFilter {
    fn accept(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.0.is_match(name))
    }
}

fn collect_files(path: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_file() {
        found.push(path.to_path_buf());
        return Ok(());
    }
    let entries =
        fs::read_dir(path).with_context(|| format!("Failed to read directory {:?}", path))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry of {:?}", path))?;
        collect_files(&entry.path(), found)?;
    }
    Ok(())
}

/// Local filesystem implementation
#[derive(Debug, Default)]
pub struct LocalMigrationFiles {
    copied: Mutex<BTreeMap<PathBuf, PathBuf>>,
}

impl LocalMigrationFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backup path for an existing target
    pub fn backup_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }
}

impl MigrationFiles for LocalMigrationFiles {
    fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        let source = fs::canonicalize(source)
            .with_context(|| format!("Source file {:?} does not exist", source))?;

        let replaces_copy = {
            let copied = self
                .copied
                .lock()
                .map_err(|_| anyhow::anyhow!("Copied files registry poisoned"))?;
            if copied.get(target) == Some(&source) {
                debug!("{:?} already copied to {:?}", source, target);
                return Ok(());
            }
            copied.contains_key(target)
        };

        // the backup always holds the pre-migration file
        let backup = Self::backup_path(target);
        if target.exists() && !replaces_copy && !backup.exists() {
            info!("Backing up {:?} to {:?}", target, backup);
            fs::rename(target, &backup)
                .with_context(|| format!("Failed to back up {:?}", target))?;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::copy(&source, target)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, target))?;
        info!("Copied {:?} to {:?}", source, target);

        self.copied
            .lock()
            .map_err(|_| anyhow::anyhow!("Copied files registry poisoned"))?
            .insert(target.to_path_buf(), source);
        Ok(())
    }

    fn filter(&self, path: &Path, filters: &[&dyn FileFilter]) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        collect_files(path, &mut found)?;
        found.retain(|file| filters.iter().all(|filter| filter.accept(file)));
        found.sort();
        debug!("{} files under {:?} passed {} filters", found.len(), path, filters.len());
        Ok(found)
    }

    fn copied(&self) -> BTreeMap<PathBuf, PathBuf> {
        match self.copied.lock() {
            Ok(copied) => copied.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_creates_parents_and_backs_up_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("standalone.xml");
        let target = dir.path().join("target/configuration/standalone.xml");
        fs::write(&source, "<server new/>").unwrap();

        let files = LocalMigrationFiles::new();
        files.copy(&source, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "<server new/>");
        assert!(!LocalMigrationFiles::backup_path(&target).exists());

        fs::write(dir.path().join("target/configuration/domain.xml"), "<domain old/>").unwrap();
        let other = dir.path().join("domain.xml");
        fs::write(&other, "<domain/>").unwrap();
        let existing = dir.path().join("target/configuration/domain.xml");
        files.copy(&other, &existing).unwrap();

        let backup = LocalMigrationFiles::backup_path(&existing);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "<domain old/>");
        assert_eq!(fs::read_to_string(&existing).unwrap(), "<domain/>");
        assert_eq!(files.copied().len(), 2);
    }

    #[test]
    fn repeated_copies_keep_the_original_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("standalone.xml");
        let first = dir.path().join("a.xml");
        let second = dir.path().join("b.xml");
        fs::write(&target, "<original/>").unwrap();
        fs::write(&first, "<a/>").unwrap();
        fs::write(&second, "<b/>").unwrap();

        let files = LocalMigrationFiles::new();
        files.copy(&first, &target).unwrap();
        files.copy(&second, &target).unwrap();

        let backup = LocalMigrationFiles::backup_path(&target);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "<original/>");
        assert_eq!(fs::read_to_string(&target).unwrap(), "<b/>");

        // a rerun with fresh bookkeeping still leaves the backup alone
        LocalMigrationFiles::new().copy(&first, &target).unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "<original/>");
        assert_eq!(fs::read_to_string(&target).unwrap(), "<a/>");
    }

    #[test]
    fn filter_keeps_files_accepted_by_every_filter() {
        let dir = TempDir::new().unwrap();
        let configuration = dir.path().join("standalone/configuration");
        fs::create_dir_all(&configuration).unwrap();
        fs::write(configuration.join("standalone.xml"), "<server/>").unwrap();
        fs::write(configuration.join("standalone-ha.xml"), "<server/>").unwrap();
        fs::write(configuration.join("logging.properties"), "").unwrap();
        fs::write(dir.path().join("domain.xml"), "<domain/>").unwrap();

        let files = LocalMigrationFiles::new();
        let xml = FileNameFilter::new(r"\.xml$").unwrap();
        let all_xml = files.filter(dir.path(), &[&xml]).unwrap();
        assert_eq!(all_xml.len(), 3);

        let standalone = |path: &Path| path.to_string_lossy().contains("standalone-");
        let ha = files.filter(dir.path(), &[&xml, &standalone]).unwrap();
        assert_eq!(ha, vec![configuration.join("standalone-ha.xml")]);

        let single = files.filter(&dir.path().join("domain.xml"), &[]).unwrap();
        assert_eq!(single.len(), 1);
        assert!(files.filter(&dir.path().join("missing"), &[&xml]).is_err());
    }

    #[test]
    fn copy_of_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let files = LocalMigrationFiles::new();

        let err = files
            .copy(&dir.path().join("missing.xml"), &dir.path().join("out.xml"))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(files.copied().is_empty());
    }
}
