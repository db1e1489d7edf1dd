// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host operating system detection.

use std::fmt;

/// Operating system family a bundled executable is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    MacOs,
    /// Linux.
    Linux,
}

impl Platform {
    /// Resolve an operating system name to a platform family.
    ///
    /// Matching is case-insensitive and by prefix, so `"Windows 11"`,
    /// `"Mac OS X"`, `"darwin"` and `"linux"` are all recognized.
    pub fn from_os_name(os_name: &str) -> Option<Self> {
        let os = os_name.trim().to_lowercase();
        if os.starts_with("windows") {
            Some(Platform::Windows)
        } else if os.starts_with("mac") || os.starts_with("darwin") || os.starts_with("osx") {
            Some(Platform::MacOs)
        } else if os.starts_with("linux") {
            Some(Platform::Linux)
        } else {
            None
        }
    }

    /// Platform of the running process, if supported.
    pub fn host() -> Option<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Whether executables on this platform need an `.exe` suffix.
    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::MacOs => write!(f, "macos"),
            Platform::Linux => write!(f, "linux"),
        }
    }
}
