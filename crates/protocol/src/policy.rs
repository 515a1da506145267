//! Role-based access policy.
//!
//! One declarative table decides every `(role, resource, action)` question
//! for both the server (enforcement) and clients (UI gating). A rule only
//! applies inside the workspace tiers it lists.
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

use crate::roles::{Role, WorkspaceType};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Task,
    Team,
    User,
    Notification,
    ChangeLog,
    /// The caller's own workspace.
    Workspace,
    /// Every workspace on the installation.
    Platform,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Import,
    Export,
    Clear,
    ToggleStatus,
}

/// Which tasks a role can see inside its workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum TaskVisibility {
    Workspace,
    /// Own team's tasks plus assigned/created ones.
    Team,
    /// Only tasks assigned to or created by the viewer.
    Own,
}

struct Rule {
    role: Role,
    resource: Resource,
    actions: &'static [Action],
    tiers: &'static [WorkspaceType],
}

const ANY_TIER: &[WorkspaceType] = &[WorkspaceType::Core, WorkspaceType::Community];
const CORE: &[WorkspaceType] = &[WorkspaceType::Core];
const COMMUNITY: &[WorkspaceType] = &[WorkspaceType::Community];

const CRUD: &[Action] = &[Action::Read, Action::Create, Action::Update, Action::Delete];
const READ: &[Action] = &[Action::Read];
const INBOX: &[Action] = &[Action::Read, Action::Update, Action::Delete];

const POLICY: &[Rule] = &[
    // admin
    Rule { role: Role::Admin, resource: Resource::Task, actions: CRUD, tiers: ANY_TIER },
    Rule { role: Role::Admin, resource: Resource::Team, actions: CRUD, tiers: ANY_TIER },
    Rule {
        role: Role::Admin,
        resource: Resource::User,
        actions: &[Action::Read, Action::Create, Action::Update, Action::Delete, Action::Import],
        tiers: ANY_TIER,
    },
    Rule { role: Role::Admin, resource: Resource::Notification, actions: INBOX, tiers: ANY_TIER },
    Rule {
        role: Role::Admin,
        resource: Resource::ChangeLog,
        actions: &[Action::Read, Action::Export, Action::Clear],
        tiers: ANY_TIER,
    },
    Rule {
        role: Role::Admin,
        resource: Resource::Workspace,
        actions: &[Action::Read, Action::Update],
        tiers: ANY_TIER,
    },
    Rule {
        role: Role::Admin,
        resource: Resource::Platform,
        actions: &[Action::Read, Action::Create, Action::Update, Action::Delete, Action::ToggleStatus],
        tiers: CORE,
    },
    // hr
    Rule { role: Role::Hr, resource: Resource::Task, actions: CRUD, tiers: ANY_TIER },
    Rule { role: Role::Hr, resource: Resource::Team, actions: CRUD, tiers: ANY_TIER },
    Rule {
        role: Role::Hr,
        resource: Resource::User,
        actions: &[Action::Read, Action::Create, Action::Update, Action::Import],
        tiers: ANY_TIER,
    },
    Rule { role: Role::Hr, resource: Resource::Notification, actions: INBOX, tiers: ANY_TIER },
    Rule {
        role: Role::Hr,
        resource: Resource::ChangeLog,
        actions: &[Action::Read, Action::Export],
        tiers: ANY_TIER,
    },
    Rule { role: Role::Hr, resource: Resource::Workspace, actions: READ, tiers: ANY_TIER },
    // team_lead
    Rule { role: Role::TeamLead, resource: Resource::Task, actions: CRUD, tiers: ANY_TIER },
    Rule {
        role: Role::TeamLead,
        resource: Resource::Team,
        actions: &[Action::Read, Action::Update],
        tiers: ANY_TIER,
    },
    Rule { role: Role::TeamLead, resource: Resource::User, actions: READ, tiers: ANY_TIER },
    Rule { role: Role::TeamLead, resource: Resource::Notification, actions: INBOX, tiers: ANY_TIER },
    Rule { role: Role::TeamLead, resource: Resource::Workspace, actions: READ, tiers: ANY_TIER },
    // member
    Rule {
        role: Role::Member,
        resource: Resource::Task,
        actions: &[Action::Read, Action::Create, Action::Update],
        tiers: ANY_TIER,
    },
    Rule { role: Role::Member, resource: Resource::Team, actions: READ, tiers: ANY_TIER },
    Rule { role: Role::Member, resource: Resource::User, actions: READ, tiers: ANY_TIER },
    Rule { role: Role::Member, resource: Resource::Notification, actions: INBOX, tiers: ANY_TIER },
    Rule { role: Role::Member, resource: Resource::Workspace, actions: READ, tiers: ANY_TIER },
    // community_admin
    Rule { role: Role::CommunityAdmin, resource: Resource::Task, actions: CRUD, tiers: COMMUNITY },
    Rule { role: Role::CommunityAdmin, resource: Resource::Team, actions: CRUD, tiers: COMMUNITY },
    Rule {
        role: Role::CommunityAdmin,
        resource: Resource::User,
        actions: &[Action::Read, Action::Create, Action::Update, Action::Delete, Action::Import],
        tiers: COMMUNITY,
    },
    Rule {
        role: Role::CommunityAdmin,
        resource: Resource::Notification,
        actions: INBOX,
        tiers: COMMUNITY,
    },
    Rule {
        role: Role::CommunityAdmin,
        resource: Resource::ChangeLog,
        actions: &[Action::Read, Action::Export, Action::Clear],
        tiers: COMMUNITY,
    },
    Rule {
        role: Role::CommunityAdmin,
        resource: Resource::Workspace,
        actions: &[Action::Read, Action::Update, Action::Delete],
        tiers: COMMUNITY,
    },
];

pub fn authorize(role: Role, tier: WorkspaceType, resource: Resource, action: Action) -> bool {
    POLICY.iter().any(|rule| {
        rule.role == role
            && rule.resource == resource
            && rule.actions.contains(&action)
            && rule.tiers.contains(&tier)
    })
}

pub fn task_visibility(role: Role) -> TaskVisibility {
    match role {
        Role::Admin | Role::Hr | Role::CommunityAdmin => TaskVisibility::Workspace,
        Role::TeamLead => TaskVisibility::Team,
        Role::Member => TaskVisibility::Own,
    }
}
