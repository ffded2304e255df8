use serde::{Deserialize, Serialize};

/// Contents of `<module>/meta/versions.json` at origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Contents of `<module>/versions/<version>/meta/meta.json` at origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    #[serde(default)]
    pub directory_listing: Vec<DirectoryEntry>,
}

impl DirectoryListing {
    pub fn files(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.directory_listing
            .iter()
            .filter(|e| e.kind == EntryKind::File)
    }
}
