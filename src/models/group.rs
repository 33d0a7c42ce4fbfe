use serde::{Deserialize, Serialize};

/// Fixed platform mapping from numeric access levels to role names.
const ACCESS_LEVELS: &[(u64, &str)] = &[
    (0, "No Access"),
    (5, "Minimal Access"),
    (10, "Guest"),
    (20, "Reporter"),
    (30, "Developer"),
    (40, "Maintainer"),
    (50, "Owner"),
];

pub fn access_level_label(level: u64) -> &'static str {
    ACCESS_LEVELS
        .iter()
        .find(|(value, _)| *value == level)
        .map_or("Unknown", |(_, label)| *label)
}

/// A member of a group.
///
/// `state` is the user *account* state while `membership_state` is the state
/// of this particular membership; an inactive user is not the same thing as
/// an inactive membership and both are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: u64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub access_level: u64,
    /// Derived from `access_level`; not part of the wire format.
    #[serde(default)]
    pub access_level_description: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_state")]
    pub membership_state: String,
}

impl GroupMember {
    pub(crate) fn with_access_label(mut self) -> Self {
        self.access_level_description = access_level_label(self.access_level).to_string();
        self
    }
}

fn default_state() -> String {
    "active".to_string()
}

/// A group, optionally carrying the subtree and members attached by the
/// current fetch. The tree only exists for the lifetime of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub full_path: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Filled by the member fetch, empty on the wire.
    #[serde(default)]
    pub members: Vec<GroupMember>,
    /// Filled by tree assembly, empty on the wire.
    #[serde(default)]
    pub subgroups: Vec<Group>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_levels_map_to_role_names() {
        assert_eq!(access_level_label(0), "No Access");
        assert_eq!(access_level_label(5), "Minimal Access");
        assert_eq!(access_level_label(10), "Guest");
        assert_eq!(access_level_label(20), "Reporter");
        assert_eq!(access_level_label(30), "Developer");
        assert_eq!(access_level_label(40), "Maintainer");
        assert_eq!(access_level_label(50), "Owner");
        assert_eq!(access_level_label(35), "Unknown");
    }

    #[test]
    fn member_states_are_independent_axes() {
        let member: GroupMember = serde_json::from_value::<GroupMember>(serde_json::json!({
            "id": 7,
            "username": "jane",
            "name": "Jane Doe",
            "access_level": 40,
            "state": "blocked",
            "membership_state": "active"
        }))
        .unwrap()
        .with_access_label();

        assert_eq!(member.state, "blocked");
        assert_eq!(member.membership_state, "active");
        assert_eq!(member.access_level_description, "Maintainer");
    }
}
