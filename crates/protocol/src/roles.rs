use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Hr,
    TeamLead,
    #[default]
    Member,
    CommunityAdmin,
}

impl Role {
    /// Roles that administer the whole workspace they belong to.
    pub fn is_workspace_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::CommunityAdmin)
    }

    /// Roles this role may hand out when creating or editing users.
    pub fn assignable_roles(&self, tier: WorkspaceType) -> &'static [Role] {
        match (self, tier) {
            (Role::Admin, WorkspaceType::Core) => {
                &[Role::Admin, Role::Hr, Role::TeamLead, Role::Member]
            }
            (Role::Admin, WorkspaceType::Community) | (Role::CommunityAdmin, _) => {
                &[Role::CommunityAdmin, Role::TeamLead, Role::Member]
            }
            (Role::Hr, _) => &[Role::TeamLead, Role::Member],
            _ => &[],
        }
    }

    pub fn can_assign(&self, tier: WorkspaceType, target: Role) -> bool {
        self.assignable_roles(tier).contains(&target)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceType {
    Core,
    #[default]
    Community,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn roles_round_trip_through_wire_names() {
        assert_eq!(Role::from_str("team_lead").unwrap(), Role::TeamLead);
        assert_eq!(Role::CommunityAdmin.to_string(), "community_admin");
        assert_eq!(
            serde_json::to_value(Role::Hr).unwrap(),
            serde_json::json!("hr")
        );
        assert_eq!(WorkspaceType::Core.to_string(), "CORE");
        assert_eq!(
            serde_json::from_value::<WorkspaceType>(serde_json::json!("COMMUNITY")).unwrap(),
            WorkspaceType::Community
        );
    }

    #[test]
    fn hr_cannot_mint_admins() {
        assert!(Role::Hr.can_assign(WorkspaceType::Core, Role::Member));
        assert!(!Role::Hr.can_assign(WorkspaceType::Core, Role::Admin));
        assert!(!Role::Hr.can_assign(WorkspaceType::Core, Role::Hr));
    }

    #[test]
    fn community_roles_stay_inside_their_tier() {
        assert!(Role::CommunityAdmin.can_assign(WorkspaceType::Community, Role::TeamLead));
        assert!(!Role::CommunityAdmin.can_assign(WorkspaceType::Community, Role::Admin));
        assert!(!Role::Admin.can_assign(WorkspaceType::Core, Role::CommunityAdmin));
        assert!(Role::Member.assignable_roles(WorkspaceType::Core).is_empty());
    }
}
