use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size information for a build's main bundle file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MainFileInfo {
    pub size: u64,
}

/// A known game build, as listed by the backend.
///
/// Absent size fields mean "no known target size", which is not the same
/// thing as a known size of zero.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Excluded from listings, but still tracked.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_uncompressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file_info: Option<MainFileInfo>,
}
impl VersionEntry {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            name: None,
            description: None,
            hidden: false,
            total_uncompressed_size: None,
            total_compressed_size: None,
            main_file_info: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_uncompressed_size(mut self, size: u64) -> Self {
        self.total_uncompressed_size = Some(size);
        self
    }

    pub fn with_compressed_size(mut self, size: u64, main_file_size: u64) -> Self {
        self.total_compressed_size = Some(size);
        self.main_file_info = Some(MainFileInfo { size: main_file_size });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Human-readable name, falling back to the UUID.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.uuid.to_string())
    }
}

/// Response body of the backend's `get_versions` command.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Versions {
    pub versions: Vec<VersionEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{"versions":[{"uuid":"6543a2bb-d154-4087-b9ee-3c8aa778580a"}]}"#;
        let versions: Versions = serde_json::from_str(json).unwrap();
        let version = &versions.versions[0];
        assert!(!version.hidden);
        assert_eq!(version.total_uncompressed_size, None);
        assert_eq!(version.main_file_info, None);
        assert_eq!(version.label(), "6543a2bb-d154-4087-b9ee-3c8aa778580a");
    }

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "uuid": "6543a2bb-d154-4087-b9ee-3c8aa778580a",
            "name": "beta-20100104",
            "description": "Original release",
            "hidden": true,
            "total_uncompressed_size": 2000,
            "total_compressed_size": 900,
            "main_file_info": {"size": 100}
        }"#;
        let version: VersionEntry = serde_json::from_str(json).unwrap();
        assert!(version.hidden);
        assert_eq!(version.label(), "beta-20100104");
        assert_eq!(version.main_file_info, Some(MainFileInfo { size: 100 }));
    }
}
