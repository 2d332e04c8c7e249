//! Directory models

use serde::Deserialize;

/// A group lookup by display name.
///
/// Keeps the name as the caller supplied it for messages; lookups use the trimmed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    supplied: String,
}

impl GroupQuery {
    /// Look for a group named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            supplied: name.into(),
        }
    }

    /// The display name to match, without surrounding whitespace.
    pub fn name(&self) -> &str {
        self.supplied.trim()
    }

    /// The name exactly as supplied.
    pub fn supplied(&self) -> &str {
        &self.supplied
    }
}

/// A directory group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupRecord {
    /// Object id of the group
    pub id: String,

    /// Display name of the group
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupList {
    pub(crate) value: Vec<GroupRecord>,
}

/// Outcome of a group lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// A group with the display name exists
    Found(GroupRecord),

    /// No group has the display name
    NotFound,
}

impl ValidationResult {
    /// Pick the first match, in the order the directory returned them.
    pub fn from_matches(matches: Vec<GroupRecord>) -> Self {
        match matches.into_iter().next() {
            Some(group) => ValidationResult::Found(group),
            None => ValidationResult::NotFound,
        }
    }

    /// The group, when one was found.
    pub fn record(&self) -> Option<&GroupRecord> {
        match self {
            ValidationResult::Found(group) => Some(group),
            ValidationResult::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_but_remembers_input() {
        let query = GroupQuery::new("  Platform-Admins\t");
        assert_eq!(query.name(), "Platform-Admins");
        assert_eq!(query.supplied(), "  Platform-Admins\t");
    }

    #[test]
    fn matching_is_not_case_folded() {
        let query = GroupQuery::new("platform-admins");
        assert_eq!(query.name(), "platform-admins");
    }

    #[test]
    fn extra_group_fields_are_ignored() {
        let list: GroupList = serde_json::from_str(
            r#"{"@odata.context":"https://graph.microsoft.com/v1.0/$metadata#groups","value":[{"id":"g-9","displayName":"Ops","mailEnabled":false,"securityEnabled":true}]}"#,
        )
        .unwrap();

        assert_eq!(
            ValidationResult::from_matches(list.value),
            ValidationResult::Found(GroupRecord {
                id: "g-9".into(),
                display_name: "Ops".into()
            })
        );
    }
}
