// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource bundle access
//!
//! The bundle holds the per-platform executables, the `timestamp.txt` build
//! stamp and the Python helper script. The stager only reads from it through
//! the [`Resources`] trait, so tests can swap in [`MemoryResources`].

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::targets::GRPC_PROTOC_SCRIPT;

/// Name of the build stamp inside the bundle.
pub const TIMESTAMP_RESOURCE: &str = "timestamp.txt";

/// Unexpanded build-tool macro left in development builds.
const TIMESTAMP_PLACEHOLDER: &str = "${now;long}";

/// Environment variable overriding bundle discovery.
pub const RESOURCE_DIR_ENV: &str = "GRPC_GENERATOR_RESOURCE_DIR";

/// Helper script compiled into the binary.
const EMBEDDED_GRPC_PROTOC: &[u8] = include_bytes!("../resources/grpc_protoc.py");

/// Build time of the resource bundle, in milliseconds since the Unix epoch.
///
/// Staged files older than this are re-copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct BuildTimestamp(u64);

impl BuildTimestamp {
    /// Epoch zero; never forces a recopy.
    pub const EPOCH: BuildTimestamp = BuildTimestamp(0);

    /// Timestamp from milliseconds since the Unix epoch.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Parse the contents of `timestamp.txt`.
    ///
    /// The placeholder and anything that is not a non-negative integer parse
    /// as [`BuildTimestamp::EPOCH`].
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text == TIMESTAMP_PLACEHOLDER {
            return Self::EPOCH;
        }
        text.parse().map(Self).unwrap_or(Self::EPOCH)
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// The timestamp as a filesystem time.
    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.0)
    }
}

impl fmt::Display for BuildTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Read-only view of the bundled resources.
pub trait Resources {
    /// Bytes of the named resource, or `None` if the bundle lacks it.
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Build time of the bundle.
    fn build_timestamp(&self) -> BuildTimestamp {
        match self.read(TIMESTAMP_RESOURCE) {
            Ok(Some(bytes)) => BuildTimestamp::parse(&String::from_utf8_lossy(&bytes)),
            _ => BuildTimestamp::EPOCH,
        }
    }
}

impl<R: Resources + ?Sized> Resources for &R {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).read(name)
    }

    fn build_timestamp(&self) -> BuildTimestamp {
        (**self).build_timestamp()
    }
}

/// Resource bundle laid out as a directory on disk.
///
/// `grpc_protoc.py` falls back to the copy compiled into the binary when the
/// directory does not provide its own.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    /// Bundle rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the bundle directory.
    ///
    /// Search order:
    /// 1. `GRPC_GENERATOR_RESOURCE_DIR`
    /// 2. `resources/` next to the running executable
    /// 3. `../share/grpc-generator/resources` relative to the executable
    /// 4. `/usr/share/grpc-generator/resources`
    /// 5. `./resources`
    pub fn discover() -> Self {
        if let Ok(dir) = std::env::var(RESOURCE_DIR_ENV) {
            let path = PathBuf::from(dir);
            if path.is_dir() {
                return Self::new(path);
            }
            tracing::warn!(
                path = %path.display(),
                "{} does not point to a directory, searching default locations",
                RESOURCE_DIR_ENV
            );
        }

        if let Ok(exe) = std::env::current_exe()
            && let Some(exe_dir) = exe.parent()
        {
            let candidates = [
                exe_dir.join("resources"),
                exe_dir.join("../share/grpc-generator/resources"),
            ];
            for candidate in candidates {
                if candidate.is_dir() {
                    return Self::new(candidate);
                }
            }
        }

        let installed_path = PathBuf::from("/usr/share/grpc-generator/resources");
        if installed_path.is_dir() {
            return Self::new(installed_path);
        }

        // Final fallback
        Self::new("resources")
    }

    /// Root directory of the bundle.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Resources for DirectoryResources {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.root.join(name.trim_start_matches('/'));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if name == GRPC_PROTOC_SCRIPT {
                    Ok(Some(EMBEDDED_GRPC_PROTOC.to_vec()))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// In-memory resource bundle.
///
/// Counts reads of everything except the timestamp so callers can observe
/// how many copies staging performed.
#[derive(Debug, Default)]
pub struct MemoryResources {
    entries: HashMap<String, Vec<u8>>,
    timestamp: BuildTimestamp,
    reads: AtomicUsize,
}

impl MemoryResources {
    /// Empty bundle with an epoch timestamp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource.
    pub fn with_resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(name.into(), bytes.into());
        self
    }

    /// Set the bundle build time.
    pub fn with_timestamp(mut self, timestamp: BuildTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Number of resource reads so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Resources for MemoryResources {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.get(name).cloned())
    }

    fn build_timestamp(&self) -> BuildTimestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            BuildTimestamp::parse("1700000000000\n"),
            BuildTimestamp::from_millis(1_700_000_000_000)
        );
    }

    #[test]
    fn test_parse_placeholder_is_epoch() {
        assert_eq!(BuildTimestamp::parse("${now;long}"), BuildTimestamp::EPOCH);
    }

    #[test]
    fn test_parse_garbage_is_epoch() {
        assert_eq!(BuildTimestamp::parse("yesterday"), BuildTimestamp::EPOCH);
        assert_eq!(BuildTimestamp::parse("-5"), BuildTimestamp::EPOCH);
        assert_eq!(BuildTimestamp::parse(""), BuildTimestamp::EPOCH);
    }

    #[test]
    fn test_timestamp_display() {
        let ts = BuildTimestamp::from_millis(0);
        assert_eq!(ts.to_string(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_directory_read_and_timestamp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("exe")).unwrap();
        fs::write(dir.path().join("exe/protoc-linux-x86_64"), b"ELF").unwrap();
        fs::write(dir.path().join(TIMESTAMP_RESOURCE), "42").unwrap();

        let resources = DirectoryResources::new(dir.path());
        assert_eq!(
            resources.read("/exe/protoc-linux-x86_64").unwrap(),
            Some(b"ELF".to_vec())
        );
        assert_eq!(resources.read("exe/missing").unwrap(), None);
        assert_eq!(resources.build_timestamp(), BuildTimestamp::from_millis(42));
    }

    #[test]
    fn test_directory_missing_timestamp_is_epoch() {
        let dir = TempDir::new().unwrap();
        let resources = DirectoryResources::new(dir.path());
        assert_eq!(resources.build_timestamp(), BuildTimestamp::EPOCH);
    }

    #[test]
    fn test_directory_serves_embedded_script() {
        let dir = TempDir::new().unwrap();
        let resources = DirectoryResources::new(dir.path());
        let script = resources.read(GRPC_PROTOC_SCRIPT).unwrap().unwrap();
        assert!(String::from_utf8_lossy(&script).contains("grpc_tools.protoc"));
    }

    #[test]
    fn test_directory_script_override() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(GRPC_PROTOC_SCRIPT), "print('custom')").unwrap();
        let resources = DirectoryResources::new(dir.path());
        assert_eq!(
            resources.read(GRPC_PROTOC_SCRIPT).unwrap(),
            Some(b"print('custom')".to_vec())
        );
    }

    #[test]
    #[serial]
    fn test_discover_uses_env_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: Tests are marked #[serial] to run sequentially, avoiding env var races
        unsafe { std::env::set_var(RESOURCE_DIR_ENV, dir.path()) };
        let resources = DirectoryResources::discover();
        unsafe { std::env::remove_var(RESOURCE_DIR_ENV) };

        assert_eq!(resources.root(), dir.path());
    }

    #[test]
    fn test_memory_resources_count_reads() {
        let resources = MemoryResources::new().with_resource("a", b"1".to_vec());
        assert_eq!(resources.read("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(resources.read("b").unwrap(), None);
        assert_eq!(resources.read_count(), 2);
    }
}
