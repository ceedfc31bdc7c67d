//! Role-based access decisions
//!
//! Pure functions of the identity context, the required role and an optional
//! resource owner. No I/O.

use crate::error::AuthError;
use crate::gate::IdentityContext;
use crate::models::Role;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(AuthError::Denied),
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

/// Allowed iff the caller's role equals `role`
///
/// There is no hierarchy: ADMIN does not satisfy a USER requirement.
pub fn require_role(ctx: &IdentityContext, role: Role) -> Decision {
    Decision::from(ctx.role == role)
}

/// USER callers may only touch their own resource; anyone else needs `role`
///
/// A non-USER caller is checked against the required `role`, not against its
/// own role. Checking a role against itself would let every non-USER role
/// through unconditionally.
pub fn require_self_or_role(ctx: &IdentityContext, owner_id: &str, role: Role) -> Decision {
    if ctx.role == Role::User {
        return Decision::from(ctx.user_id == owner_id);
    }
    require_role(ctx, role)
}

/// Single entry point used by the request layer
pub fn authorize(ctx: &IdentityContext, required_role: Role, owner_id: Option<&str>) -> Decision {
    match owner_id {
        Some(owner_id) => require_self_or_role(ctx, owner_id, required_role),
        None => require_role(ctx, required_role),
    }
}
