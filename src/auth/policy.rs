//! Access decision engine.
//!
//! One declarative table maps (resource, action) to a rule; handlers never
//! hand-roll role checks. Anything without a rule is denied.

use crate::auth::extractor::Principal;
use crate::error::AppError;

pub const ADMIN: &str = "ADMIN";
pub const USER_MANAGER: &str = "USER_MANAGER";
pub const USER_VIEWER: &str = "USER_VIEWER";
pub const ROLE_MANAGER: &str = "ROLE_MANAGER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Role,
    Permission,
    Profile,
    Menu,
    Screen,
    Paper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    SoftDelete,
    Activate,
    Deactivate,
    Lock,
    Unlock,
    VerifyEmail,
    AssignRole,
    RemoveRole,
    RemoveAllRoles,
    AssignPermission,
    RemovePermission,
    RemoveAllPermissions,
    Publish,
    Archive,
    /// Identity-sync hooks that stamp login outcomes onto a user record.
    RecordLogin,
    /// Administrative queries: statistics, locked-user listing,
    /// existence checks.
    Inspect,
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Permitted iff the principal holds any of the listed role codes.
    AnyRole(&'static [&'static str]),
    /// Role check as above, OR the target record is the principal's own.
    AnyRoleOrSelf(&'static [&'static str]),
    /// Permitted iff the principal holds exactly this elevated role.
    OnlyRole(&'static str),
    /// Any authenticated principal.
    Authenticated,
    Denied,
}

const USER_ADMINS: &[&str] = &[ADMIN, USER_MANAGER];
const USER_READERS: &[&str] = &[ADMIN, USER_MANAGER, USER_VIEWER];
const ROLE_ADMINS: &[&str] = &[ADMIN, ROLE_MANAGER];

pub fn rule_for(resource: Resource, action: Action) -> Rule {
    use Action::*;
    use Resource::*;

    match (resource, action) {
        (User, Create) => Rule::AnyRole(USER_ADMINS),
        (User, Read) => Rule::AnyRoleOrSelf(USER_READERS),
        (User, Update) => Rule::AnyRoleOrSelf(USER_ADMINS),
        (User, Delete) => Rule::OnlyRole(ADMIN),
        (User, SoftDelete | Activate | Deactivate | Lock | Unlock) => Rule::AnyRole(USER_ADMINS),
        (User, VerifyEmail) => Rule::AnyRoleOrSelf(USER_ADMINS),
        // Assigning roles to a user is user administration; ROLE_MANAGER
        // governs the role catalog itself.
        (User, AssignRole | RemoveRole) => Rule::AnyRole(USER_ADMINS),
        (User, RemoveAllRoles) => Rule::OnlyRole(ADMIN),
        (User, RecordLogin) => Rule::AnyRole(USER_ADMINS),
        (User, Inspect) => Rule::AnyRole(USER_ADMINS),

        (Role, Create | Read | Update | Delete) => Rule::AnyRole(ROLE_ADMINS),
        (Role, AssignPermission | RemovePermission) => Rule::AnyRole(ROLE_ADMINS),
        (Role, RemoveAllPermissions) => Rule::OnlyRole(ADMIN),

        (Permission, Create | Read | Update | Delete) => Rule::OnlyRole(ADMIN),

        (Profile, Create | Read | Update | Delete) => Rule::AnyRoleOrSelf(USER_ADMINS),

        (Menu | Screen, Read) => Rule::Authenticated,
        (Menu | Screen, Create | Update | Delete) => Rule::OnlyRole(ADMIN),

        // Papers are open to any authenticated principal; per-paper
        // required permission codes are checked at the resource level.
        (Paper, Create | Read | Update | Delete | Publish | Archive) => Rule::Authenticated,

        _ => Rule::Denied,
    }
}

impl Principal {
    /// Decide whether this principal may perform `action` on `resource`.
    /// `owner` is the username owning the target record, when the rule
    /// admits a self-access override.
    pub fn authorize(
        &self,
        resource: Resource,
        action: Action,
        owner: Option<&str>,
    ) -> Result<(), AppError> {
        let permitted = match rule_for(resource, action) {
            Rule::Authenticated => true,
            Rule::OnlyRole(code) => self.has_role(code),
            Rule::AnyRole(codes) => codes.iter().any(|c| self.has_role(c)),
            Rule::AnyRoleOrSelf(codes) => {
                codes.iter().any(|c| self.has_role(c))
                    || owner.is_some_and(|username| self.is_self(username))
            }
            Rule::Denied => false,
        };

        if permitted {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Insufficient privileges for this operation".to_string(),
            ))
        }
    }
}
