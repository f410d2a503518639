//! Roles, actions and per-module permission grants.
//!
//! A member holds one [`Role`] and a [`Permissions`] map of
//! `module → action → bool`. Owners pass every check regardless of the map;
//! for everyone else a missing module or action is a deny.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kitchen (HACCP) application modules.
pub const KITCHEN_MODULES: &[&str] = &["temperatures", "cleaning", "deliveries", "allergens", "reports"];

/// Booking application modules.
pub const BOOKING_MODULES: &[&str] = &["reservations", "tables", "guests"];

/// Modules shared by both applications.
pub const SHARED_MODULES: &[&str] = &["team", "settings"];

/// Team management module; guards member and invitation routes.
pub const TEAM_MODULE: &str = "team";

/// Modules where staff may record new entries by default.
const STAFF_CREATE_MODULES: &[&str] = &["temperatures", "cleaning", "deliveries", "reservations"];

/// Every module known to either application.
pub fn known_modules() -> impl Iterator<Item = &'static str> {
    KITCHEN_MODULES
        .iter()
        .chain(BOOKING_MODULES)
        .chain(SHARED_MODULES)
        .copied()
}

fn is_shared(module: &str) -> bool {
    SHARED_MODULES.contains(&module)
}

/// Tenant (restaurant) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// User identifier issued by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Error returned when a role or action name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Membership role within a restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Manager, Role::Staff];

    /// Numeric rank; higher outranks lower.
    pub fn rank(self) -> u8 {
        match self {
            Role::Owner => 4,
            Role::Admin => 3,
            Role::Manager => 2,
            Role::Staff => 1,
        }
    }

    /// Whether this role is `min` or above.
    pub fn at_least(self, min: Role) -> bool {
        self.rank() >= min.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
        }
    }

    /// Permission template applied when a role is assigned without an
    /// explicit map.
    pub fn default_permissions(self) -> Permissions {
        let mut perms = Permissions::default();
        match self {
            Role::Owner | Role::Admin => {
                for module in known_modules() {
                    for action in Action::ALL {
                        perms.grant(module, action);
                    }
                }
            }
            Role::Manager => {
                for module in known_modules() {
                    perms.grant(module, Action::View);
                    if is_shared(module) {
                        continue;
                    }
                    perms.grant(module, Action::Create);
                    perms.grant(module, Action::Edit);
                    perms.grant(module, Action::Delete);
                }
            }
            Role::Staff => {
                for module in KITCHEN_MODULES.iter().chain(BOOKING_MODULES) {
                    perms.grant(module, Action::View);
                }
                for module in STAFF_CREATE_MODULES {
                    perms.grant(module, Action::Create);
                }
            }
        }
        perms
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            other => Err(ParseError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Action a member may perform within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(ParseError {
                kind: "action",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-module action grants. Serializes as `{"module": {"action": bool}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeMap<String, BTreeMap<Action, bool>>);

impl Permissions {
    pub fn grant(&mut self, module: &str, action: Action) {
        self.set(module, action, true);
    }

    pub fn revoke(&mut self, module: &str, action: Action) {
        self.set(module, action, false);
    }

    pub fn set(&mut self, module: &str, action: Action, allowed: bool) {
        self.0
            .entry(module.to_string())
            .or_default()
            .insert(action, allowed);
    }

    /// Whether the map explicitly grants `action` on `module`.
    pub fn allows(&self, module: &str, action: Action) -> bool {
        self.0
            .get(module)
            .and_then(|actions| actions.get(&action))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every `(module, action)` pair the map grants.
    pub fn granted(&self) -> impl Iterator<Item = (&str, Action)> {
        self.0.iter().flat_map(|(module, actions)| {
            actions
                .iter()
                .filter(|(_, allowed)| **allowed)
                .map(move |(action, _)| (module.as_str(), *action))
        })
    }
}

/// A user's binding to a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "restaurant_id")]
    pub tenant_id: TenantId,
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub permissions: Permissions,
}

impl Member {
    /// Whether this member may perform `action` on `module`.
    pub fn can(&self, module: &str, action: Action) -> bool {
        self.role == Role::Owner || self.permissions.allows(module, action)
    }

    /// Whether this member may hand `permissions` to someone else: the owner
    /// may grant anything, everyone else only what they hold themselves.
    pub fn can_delegate(&self, permissions: &Permissions) -> bool {
        permissions
            .granted()
            .all(|(module, action)| self.can(module, action))
    }

    /// Permissions as they apply in practice: the full grid for owners, the
    /// stored map for everyone else.
    pub fn effective_permissions(&self) -> Permissions {
        if self.role == Role::Owner {
            Role::Owner.default_permissions()
        } else {
            self.permissions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: Role, permissions: Permissions) -> Member {
        Member {
            tenant_id: TenantId(Uuid::new_v4()),
            user_id: UserId(Uuid::new_v4()),
            email: None,
            role,
            permissions,
        }
    }

    #[test]
    fn test_owner_passes_with_empty_map() {
        let owner = member(Role::Owner, Permissions::default());
        assert!(owner.can("temperatures", Action::Delete));
        assert!(owner.can("some-future-module", Action::Edit));
    }

    #[test]
    fn test_missing_entries_deny() {
        let mut perms = Permissions::default();
        perms.grant("cleaning", Action::View);
        perms.revoke("cleaning", Action::Edit);
        let staff = member(Role::Staff, perms);

        assert!(staff.can("cleaning", Action::View));
        assert!(!staff.can("cleaning", Action::Edit));
        assert!(!staff.can("cleaning", Action::Delete));
        assert!(!staff.can("reservations", Action::View));
    }

    #[test]
    fn test_delegation_is_bounded_by_own_grants() {
        let mut own = Permissions::default();
        own.grant("team", Action::Create);
        own.grant("cleaning", Action::View);
        let lead = member(Role::Staff, own);

        let mut within = Permissions::default();
        within.grant("cleaning", Action::View);
        within.revoke("settings", Action::Delete);
        assert!(lead.can_delegate(&within));

        let mut beyond = within.clone();
        beyond.grant("team", Action::Delete);
        assert!(!lead.can_delegate(&beyond));

        let owner = member(Role::Owner, Permissions::default());
        assert!(owner.can_delegate(&beyond));
    }

    #[test]
    fn test_admin_is_not_implicit() {
        let admin = member(Role::Admin, Permissions::default());
        assert!(!admin.can("team", Action::View));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Owner.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Admin));
        assert!(!Role::Manager.at_least(Role::Admin));
        assert!(Role::Staff.at_least(Role::Staff));
    }

    #[test]
    fn test_role_templates() {
        let manager = Role::Manager.default_permissions();
        assert!(manager.allows("deliveries", Action::Delete));
        assert!(manager.allows("team", Action::View));
        assert!(!manager.allows("team", Action::Create));
        assert!(!manager.allows("settings", Action::Edit));

        let staff = Role::Staff.default_permissions();
        assert!(staff.allows("temperatures", Action::Create));
        assert!(staff.allows("guests", Action::View));
        assert!(!staff.allows("guests", Action::Create));
        assert!(!staff.allows("team", Action::View));

        let admin = Role::Admin.default_permissions();
        assert!(known_modules().all(|m| Action::ALL.iter().all(|a| admin.allows(m, *a))));
    }

    #[test]
    fn test_effective_permissions_for_owner() {
        let owner = member(Role::Owner, Permissions::default());
        let effective = owner.effective_permissions();
        assert!(effective.allows("settings", Action::Delete));
        assert_eq!(effective.modules().count(), known_modules().count());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("delete".parse::<Action>().unwrap(), Action::Delete);
        let err = "chef".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role 'chef'");
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_permissions_json_shape() {
        let raw = r#"{"temperatures":{"view":true,"create":false},"guests":{"edit":true}}"#;
        let perms: Permissions = serde_json::from_str(raw).unwrap();
        assert!(perms.allows("temperatures", Action::View));
        assert!(!perms.allows("temperatures", Action::Create));
        assert!(perms.allows("guests", Action::Edit));

        let row = serde_json::json!({
            "restaurant_id": Uuid::nil(),
            "user_id": Uuid::nil(),
            "role": "staff",
            "permissions": perms,
        });
        let m: Member = serde_json::from_value(row).unwrap();
        assert_eq!(m.role, Role::Staff);
        assert!(m.email.is_none());
    }
}
