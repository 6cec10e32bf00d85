//! Artifacts as reported by the remote workspace.

use serde::{Deserialize, Serialize};

/// One entry of a workspace inventory listing. A snapshot; may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteArtifact {
    /// Runtime-assigned id, unique within the workspace
    pub id: String,

    pub display_name: String,

    #[serde(rename = "type")]
    pub artifact_type: String,
}

impl RemoteArtifact {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            artifact_type: artifact_type.into(),
        }
    }

    /// Exact, case-sensitive match on name and type
    pub fn matches(&self, display_name: &str, artifact_type: &str) -> bool {
        self.display_name == display_name && self.artifact_type == artifact_type
    }
}

/// A workspace folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFolder {
    pub id: String,
    pub display_name: String,

    /// Unset for top-level folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
}

impl RemoteFolder {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            parent_folder_id: None,
        }
    }
}

/// Find the first artifact in listing order matching name and type.
///
/// When several artifacts share a (name, type) pair the first one wins;
/// listing order is not guaranteed stable between calls.
pub fn find_by_name_and_type<'a>(
    items: &'a [RemoteArtifact],
    display_name: &str,
    artifact_type: &str,
) -> Option<&'a RemoteArtifact> {
    items
        .iter()
        .find(|item| item.matches(display_name, artifact_type))
}

/// The artifact a deployment is driven from, expected to always be present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfArtifact {
    pub display_name: String,

    /// When unset, any artifact with the display name counts as self
    pub artifact_type: Option<String>,
}

impl SelfArtifact {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            artifact_type: None,
        }
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = Some(artifact_type.into());
        self
    }

    pub fn is(&self, item: &RemoteArtifact) -> bool {
        item.display_name == self.display_name
            && self
                .artifact_type
                .as_deref()
                .map_or(true, |t| t == item.artifact_type)
    }
}

/// Which artifact, if any, the empty-workspace check tolerates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfPolicy {
    /// The deployment is driven from outside the workspace; it must be empty
    #[default]
    Absent,

    /// The named artifact drives the deployment and may be present
    Named(SelfArtifact),

    /// The driving artifact cannot be determined; the check is skipped
    Unknown,
}

impl SelfPolicy {
    /// Whether a workspace artifact is tolerated by the check
    pub fn tolerates(&self, item: &RemoteArtifact) -> bool {
        match self {
            Self::Named(me) => me.is(item),
            Self::Absent | Self::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let items = vec![
            RemoteArtifact::new("a", "Orders", "Lakehouse"),
            RemoteArtifact::new("b", "Orders", "Notebook"),
            RemoteArtifact::new("c", "Orders", "Notebook"),
        ];

        let found = find_by_name_and_type(&items, "Orders", "Notebook").unwrap();
        assert_eq!(found.id, "b");
        assert!(find_by_name_and_type(&items, "orders", "Notebook").is_none());
    }

    #[test]
    fn test_remote_artifact_deserialization() {
        let json = r#"{"id":"42","displayName":"Orders","type":"Notebook","workspaceId":"ws"}"#;
        let item: RemoteArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(item, RemoteArtifact::new("42", "Orders", "Notebook"));
    }

    #[test]
    fn test_self_artifact_matching() {
        let launcher = RemoteArtifact::new("1", "Launcher", "Notebook");
        let same_name_lh = RemoteArtifact::new("2", "Launcher", "Lakehouse");

        assert!(SelfArtifact::named("Launcher").is(&launcher));
        assert!(SelfArtifact::named("Launcher").is(&same_name_lh));

        let typed = SelfArtifact::named("Launcher").with_type("Notebook");
        assert!(typed.is(&launcher));
        assert!(!typed.is(&same_name_lh));
    }

    #[test]
    fn test_self_policy_tolerance() {
        let launcher = RemoteArtifact::new("1", "Launcher", "Notebook");

        assert!(SelfPolicy::Named(SelfArtifact::named("Launcher")).tolerates(&launcher));
        assert!(!SelfPolicy::Absent.tolerates(&launcher));
        assert!(!SelfPolicy::Unknown.tolerates(&launcher));
        assert_eq!(SelfPolicy::default(), SelfPolicy::Absent);
    }
}
