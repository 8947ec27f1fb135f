//! Path conventions used when comparing game hints against processes.
//!
//! Paths are compared as strings, never resolved against the filesystem: the
//! executable hint may name a file inside a compatibility prefix that only a
//! translation layer can see.

/// Separator and case rules of one platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/` separators, case-sensitive comparison.
    Unix,
    /// `\` separators, case-insensitive comparison.
    Windows,
}

/// Install directories shared by too many unrelated programs to be a signal.
const UNIX_BROAD_DIRS: &[&str] = &[
    "/bin",
    "/usr",
    "/usr/bin",
    "/usr/local/bin",
    "/snap/bin",
    "/usr/share",
    "/usr/share/applications",
    "/usr/local/share",
    "/usr/local/share/applications",
    "/lib",
    "/lib64",
    "/usr/lib",
    "/usr/lib64",
];

/// Same idea for Windows, relative to a drive root and lowercased.
const WINDOWS_BROAD_DIRS: &[&str] = &[
    "\\windows",
    "\\windows\\system32",
    "\\program files",
    "\\program files (x86)",
    "\\programdata",
];

impl PathStyle {
    /// The style of the platform we are compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }

    pub fn separator(self) -> char {
        match self {
            PathStyle::Unix => '/',
            PathStyle::Windows => '\\',
        }
    }

    fn ignores_case(self) -> bool {
        matches!(self, PathStyle::Windows)
    }

    /// Rewrite both separator kinds to this platform's separator.
    ///
    /// Blank input normalizes to an empty string.
    pub fn normalize(self, path: &str) -> String {
        if is_blank(path) {
            return String::new();
        }
        let sep = self.separator();
        path.chars()
            .map(|c| if c == '/' || c == '\\' { sep } else { c })
            .collect()
    }

    pub fn paths_equal(self, left: &str, right: &str) -> bool {
        if left.is_empty() || right.is_empty() {
            return false;
        }
        if self.ignores_case() {
            left.to_lowercase() == right.to_lowercase()
        } else {
            left == right
        }
    }

    pub fn contains(self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        if self.ignores_case() {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        } else {
            haystack.contains(needle)
        }
    }

    pub fn starts_with(self, haystack: &str, prefix: &str) -> bool {
        if prefix.is_empty() {
            return false;
        }
        if self.ignores_case() {
            haystack.to_lowercase().starts_with(&prefix.to_lowercase())
        } else {
            haystack.starts_with(prefix)
        }
    }

    /// Whether an install directory is a shared system root.
    ///
    /// Expects a path already passed through [`PathStyle::normalize`].
    pub fn is_install_path_too_broad(self, install_path: &str) -> bool {
        let trimmed = install_path.trim_end_matches(self.separator());
        if trimmed.is_empty() {
            return true;
        }

        match self {
            PathStyle::Unix => UNIX_BROAD_DIRS.contains(&trimmed),
            PathStyle::Windows => {
                let lower = trimmed.to_lowercase();
                let Some(rest) = strip_drive(&lower) else {
                    return false;
                };
                rest.is_empty() || WINDOWS_BROAD_DIRS.contains(&rest)
            }
        }
    }
}

/// `C:\foo` -> `\foo`; `None` when there is no drive letter.
fn strip_drive(path: &str) -> Option<&str> {
    let mut chars = path.chars();
    let letter = chars.next()?;
    if letter.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some(&path[2..])
    } else {
        None
    }
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Launch URLs such as `steam://run/620` are never compared as paths.
pub fn is_protocol_url(text: &str) -> bool {
    !is_blank(text) && text.contains("://")
}

/// Last path segment, accepting either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// File name without its final extension (`steam.exe` -> `steam`).
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// How Wine exposes a host path inside a prefix: `/games/x` -> `Z:\games\x`.
pub fn wine_drive_path(unix_path: &str) -> String {
    format!("Z:{}", unix_path.replace('/', "\\"))
}
