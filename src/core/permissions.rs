use crate::models::Role;

/// Actions that require elevated roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ModerateUsers,
    ReviewReports,
    ManageSubscriptions,
    ManageCoupons,
    WriteContent,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ModerateUsers => "users:moderate",
            Permission::ReviewReports => "reports:review",
            Permission::ManageSubscriptions => "subscriptions:manage",
            Permission::ManageCoupons => "coupons:manage",
            Permission::WriteContent => "content:write",
        }
    }
}

const MODERATOR: &[Permission] = &[Permission::ModerateUsers, Permission::ReviewReports];

const ADMIN: &[Permission] = &[
    Permission::ModerateUsers,
    Permission::ReviewReports,
    Permission::ManageSubscriptions,
    Permission::ManageCoupons,
    Permission::WriteContent,
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::User => &[],
        Role::Moderator => MODERATOR,
        Role::Admin => ADMIN,
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}
