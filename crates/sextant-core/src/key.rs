use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identity of one file across buffers, the pipeline, and the index.
///
/// Internally a normalized path string: `.` and `..` components are folded
/// out and Windows verbatim prefixes simplified before keying, so different
/// spellings of the same file compare equal. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey(Arc<str>);

impl FileKey {
    /// Keys a local file system path.
    pub fn local(path: impl AsRef<Path>) -> Self {
        let simplified = dunce::simplified(path.as_ref());
        let normalized = normalize_components(simplified);
        Self(normalized.to_string_lossy().into_owned().into())
    }

    /// Keys an already-normalized identity.
    ///
    /// Used for explicit `file` fields in artifacts and for synthetic keys in
    /// tests; workspace paths should go through [`FileKey::local`].
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key interpreted as a local path, for disk access.
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.as_ref())
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileKey").field(&&*self.0).finish()
    }
}

impl Serialize for FileKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FileKey::new)
    }
}

fn normalize_components(path: &Path) -> PathBuf {
    let mut prefix: Option<OsString> = None;
    let mut has_root = false;
    let mut stack: Vec<OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = Some(p.as_os_str().to_os_string()),
            Component::RootDir => has_root = true,
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(last) if last != ".." => {
                    stack.pop();
                }
                // `..` at the root stays at the root.
                _ if has_root => {}
                _ => stack.push(OsString::from("..")),
            },
            Component::Normal(segment) => stack.push(segment.to_owned()),
        }
    }

    let mut out = PathBuf::new();
    if let Some(mut prefix) = prefix {
        if has_root {
            prefix.push(std::path::MAIN_SEPARATOR.to_string());
        }
        out.push(prefix);
    } else if has_root {
        out.push(std::path::MAIN_SEPARATOR.to_string());
    }
    out.extend(stack);
    out
}
