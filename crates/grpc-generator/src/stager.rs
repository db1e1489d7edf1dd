// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Executable staging
//!
//! Copies bundled executables into the cache directory so they can be run
//! from a writable, stable location. A staged file is reused until the bundle
//! is rebuilt: its modification time is pinned to the bundle's build
//! timestamp, and anything older is copied again.
//!
//! Copies are written to a temporary file in the cache directory and renamed
//! into place, so a concurrent invocation never runs a half-written binary.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::resources::{BuildTimestamp, Resources};
use crate::targets::TargetRegistry;

const EXE_SUFFIX: &str = ".exe";

/// Stages bundled tools into a cache directory.
#[derive(Debug)]
pub struct Stager<R> {
    cache_dir: PathBuf,
    resources: R,
    platform: Option<Platform>,
    registry: TargetRegistry,
}

impl<R: Resources> Stager<R> {
    /// Stager for the host platform.
    pub fn new(cache_dir: impl Into<PathBuf>, resources: R) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            resources,
            platform: Platform::host(),
            registry: TargetRegistry::builtin(),
        }
    }

    /// Override the platform whose resources are staged.
    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Override the target registry.
    pub fn with_registry(mut self, registry: TargetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Directory staged files are written to.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The resource bundle.
    pub fn resources(&self) -> &R {
        &self.resources
    }

    /// Stage an executable and return its path.
    ///
    /// On Windows the returned path always ends in `.exe`; a previously
    /// staged file without the suffix is renamed.
    pub fn stage(&self, target: &str) -> Result<PathBuf> {
        let staged = self
            .cache_file(target, true)?
            .ok_or_else(|| self.not_staged(target))?;

        if self.is_windows() && !has_exe_suffix(&staged) {
            let moved = self.cache_dir.join(format!("{target}{EXE_SUFFIX}"));
            debug!(from = %staged.display(), to = %moved.display(), "Adding .exe suffix");
            fs::rename(&staged, &moved)?;
            return Ok(moved);
        }

        Ok(staged)
    }

    /// Stage a non-executable resource such as the Python helper script.
    pub fn stage_file(&self, target: &str) -> Result<PathBuf> {
        self.cache_file(target, false)?
            .ok_or_else(|| self.not_staged(target))
    }

    fn not_staged(&self, target: &str) -> Error {
        if self.platform.is_none() {
            return Error::UnsupportedPlatform(std::env::consts::OS.to_string());
        }
        Error::NotStaged {
            target: target.to_string(),
            cache_dir: self.cache_dir.clone(),
        }
    }

    fn is_windows(&self) -> bool {
        self.platform.is_some_and(Platform::is_windows)
    }

    /// Returns `None` when the platform is unsupported and nothing is cached.
    fn cache_file(&self, target: &str, executable: bool) -> Result<Option<PathBuf>> {
        let descriptor = self.registry.lookup(target)?;

        debug!(
            file = target,
            cache_dir = %self.cache_dir.display(),
            "Checking cache"
        );

        let mut path = self.cache_dir.join(target);
        if executable && self.is_windows() && !path.exists() && !target.ends_with(".jar") {
            path = self.cache_dir.join(format!("{target}{EXE_SUFFIX}"));
        }

        let timestamp = self.resources.build_timestamp();
        if is_current(&path, timestamp) {
            debug!(path = %path.display(), "Cache includes file");
            return Ok(Some(path));
        }

        let Some(platform) = self.platform else {
            return Ok(None);
        };
        let Some(resource) = descriptor.resource_for(platform) else {
            return Ok(None);
        };

        let bytes = self
            .resources
            .read(resource)?
            .ok_or_else(|| Error::CorruptBundle(resource.to_string()))?;

        self.write_staged(&path, &bytes, timestamp)?;

        debug!(
            resource,
            path = %path.display(),
            size_bytes = bytes.len(),
            sha256 = %format!("{:x}", Sha256::digest(&bytes)),
            build_timestamp = %timestamp,
            "Copied embedded resource to cache"
        );

        Ok(Some(path))
    }

    fn write_staged(&self, path: &Path, bytes: &[u8], timestamp: BuildTimestamp) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let mut staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempfile_in(&self.cache_dir)?;
        staging.write_all(bytes)?;
        staging.as_file().sync_all()?;

        #[cfg(unix)]
        if !self.is_windows() {
            use std::os::unix::fs::PermissionsExt;
            debug!(path = %path.display(), "Setting owner rwx permissions");
            staging
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o700))?;
        }

        // Set last so the write above cannot bump it.
        staging.as_file().set_modified(timestamp.to_system_time())?;

        staging.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// A staged file is current when it exists and is not older than the bundle.
fn is_current(path: &Path, timestamp: BuildTimestamp) -> bool {
    fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .and_then(|m| m.modified().ok())
        .is_some_and(|modified| modified >= timestamp.to_system_time())
}

fn has_exe_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(EXE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::MemoryResources;
    use crate::targets::{GRPC_PROTOC_SCRIPT, PROTOC, TargetDescriptor};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const STAMP: u64 = 1_700_000_000_000;

    fn bundle() -> MemoryResources {
        MemoryResources::new()
            .with_resource("exe/protoc-linux-x86_64", b"linux-protoc".to_vec())
            .with_resource("exe/protoc-windows-x86_64", b"windows-protoc".to_vec())
            .with_resource("exe/protoc-osx-x86_64", b"mac-protoc".to_vec())
            .with_resource(GRPC_PROTOC_SCRIPT, b"print('hi')".to_vec())
            .with_timestamp(BuildTimestamp::from_millis(STAMP))
    }

    #[test]
    fn test_stage_copies_resource_for_platform() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));

        let path = stager.stage(PROTOC).unwrap();

        assert_eq!(path, cache.path().join(PROTOC));
        assert_eq!(fs::read(&path).unwrap(), b"linux-protoc");
    }

    #[test]
    fn test_stage_pins_mtime_to_build_timestamp() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));

        let path = stager.stage(PROTOC).unwrap();

        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            modified,
            BuildTimestamp::from_millis(STAMP).to_system_time()
        );
    }

    #[test]
    fn test_stage_is_idempotent() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));

        let first = stager.stage(PROTOC).unwrap();
        let second = stager.stage(PROTOC).unwrap();

        assert_eq!(first, second);
        assert_eq!(stager.resources().read_count(), 1);
    }

    #[test]
    fn test_stage_recopies_stale_file() {
        let cache = TempDir::new().unwrap();
        let stale = cache.path().join(PROTOC);
        fs::write(&stale, b"old").unwrap();
        let old_time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(old_time)
            .unwrap();

        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));
        let path = stager.stage(PROTOC).unwrap();

        assert_eq!(fs::read(path).unwrap(), b"linux-protoc");
        assert_eq!(stager.resources().read_count(), 1);
    }

    #[test]
    fn test_stage_keeps_file_newer_than_bundle() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join(PROTOC), b"local build").unwrap();

        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));
        let path = stager.stage(PROTOC).unwrap();

        assert_eq!(fs::read(path).unwrap(), b"local build");
        assert_eq!(stager.resources().read_count(), 0);
    }

    #[test]
    fn test_stage_creates_missing_cache_dir() {
        let root = TempDir::new().unwrap();
        let cache = root.path().join("nested/cache/dir");
        let stager = Stager::new(&cache, bundle()).with_platform(Some(Platform::Linux));

        let path = stager.stage(PROTOC).unwrap();

        assert!(cache.is_dir());
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_sets_owner_rwx() {
        use std::os::unix::fs::PermissionsExt;

        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::MacOs));

        let path = stager.stage(PROTOC).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
        assert_eq!(fs::read(path).unwrap(), b"mac-protoc");
    }

    #[test]
    fn test_stage_windows_adds_exe_suffix() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Windows));

        let path = stager.stage(PROTOC).unwrap();

        assert_eq!(path, cache.path().join("protoc.exe"));
        assert_eq!(fs::read(&path).unwrap(), b"windows-protoc");
        assert!(!cache.path().join(PROTOC).exists());
    }

    #[test]
    fn test_stage_windows_renames_unsuffixed_file() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join(PROTOC), b"current").unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Windows));

        let path = stager.stage(PROTOC).unwrap();

        assert_eq!(path, cache.path().join("protoc.exe"));
        assert_eq!(fs::read(&path).unwrap(), b"current");
        assert!(!cache.path().join(PROTOC).exists());
    }

    #[test]
    fn test_stage_file_never_adds_exe_suffix() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Windows));

        let path = stager.stage_file(GRPC_PROTOC_SCRIPT).unwrap();

        assert_eq!(path, cache.path().join(GRPC_PROTOC_SCRIPT));
    }

    #[test]
    fn test_unknown_target_touches_nothing() {
        let root = TempDir::new().unwrap();
        let cache = root.path().join("cache");
        let stager = Stager::new(&cache, bundle()).with_platform(Some(Platform::Linux));

        let err = stager.stage("protoc-gen-unknown").unwrap_err();

        assert!(matches!(err, Error::UnknownTarget(_)));
        assert!(!cache.exists());
        assert_eq!(stager.resources().read_count(), 0);
    }

    #[test]
    fn test_missing_resource_is_corrupt_bundle() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));

        let err = stager.stage(crate::targets::GRPC_JAVA).unwrap_err();

        assert!(
            matches!(err, Error::CorruptBundle(ref r) if r == "exe/grpc-java-linux-x86_64")
        );
    }

    #[test]
    fn test_unsupported_platform_is_not_staged() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(None);

        let err = stager.stage(PROTOC).unwrap_err();

        assert!(matches!(err, Error::UnsupportedPlatform(_)));
        assert!(!cache.path().join(PROTOC).exists());
    }

    #[test]
    fn test_descriptor_without_platform_resource() {
        static WINDOWS_ONLY: &[TargetDescriptor] = &[TargetDescriptor::new(
            PROTOC,
            &[(Platform::Windows, "exe/protoc-windows-x86_64")],
        )];
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle())
            .with_platform(Some(Platform::Linux))
            .with_registry(TargetRegistry::new(WINDOWS_ONLY));

        let err = stager.stage(PROTOC).unwrap_err();

        assert!(matches!(err, Error::NotStaged { ref target, .. } if target == PROTOC));
    }

    #[test]
    fn test_no_staging_leftovers() {
        let cache = TempDir::new().unwrap();
        let stager = Stager::new(cache.path(), bundle()).with_platform(Some(Platform::Linux));

        stager.stage(PROTOC).unwrap();

        let names: Vec<String> = fs::read_dir(cache.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![PROTOC.to_string()]);
    }
}
