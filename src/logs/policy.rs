use uuid::Uuid;

use crate::auth::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

impl Operation {
    fn is_write(self) -> bool {
        !matches!(self, Operation::Read)
    }
}

/// Deployment toggle: whether seniors may write to user-role entries or
/// only read them. Variants of this system disagreed, so it is config.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub senior_can_write: bool,
}

/// Single decision point for entry access. Everyone may touch their own
/// rows; admins may touch anything; seniors may read user-role rows and,
/// when the toggle allows, write them. Note that seniors get nothing on
/// other seniors' or admins' rows.
pub fn can_access(
    actor_id: Uuid,
    actor_role: Role,
    owner_id: Uuid,
    owner_role: Role,
    op: Operation,
    policy: AccessPolicy,
) -> bool {
    if actor_id == owner_id {
        return true;
    }
    match actor_role {
        Role::Admin => true,
        Role::Senior => {
            owner_role == Role::User && (!op.is_write() || policy.senior_can_write)
        }
        Role::User => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [Operation; 3] = [Operation::Read, Operation::Update, Operation::Delete];

    fn policy(senior_can_write: bool) -> AccessPolicy {
        AccessPolicy { senior_can_write }
    }

    #[test]
    fn owners_always_access_their_own_rows() {
        let me = Uuid::new_v4();
        for role in [Role::User, Role::Senior, Role::Admin] {
            for op in ALL_OPS {
                assert!(can_access(me, role, me, role, op, policy(false)));
            }
        }
    }

    #[test]
    fn users_never_touch_other_rows() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        for owner_role in [Role::User, Role::Senior, Role::Admin] {
            for op in ALL_OPS {
                assert!(!can_access(me, Role::User, other, owner_role, op, policy(true)));
            }
        }
    }

    #[test]
    fn admins_access_everything() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        for owner_role in [Role::User, Role::Senior, Role::Admin] {
            for op in ALL_OPS {
                assert!(can_access(me, Role::Admin, other, owner_role, op, policy(false)));
            }
        }
    }

    #[test]
    fn seniors_read_user_rows_regardless_of_toggle() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_access(me, Role::Senior, other, Role::User, Operation::Read, policy(false)));
        assert!(can_access(me, Role::Senior, other, Role::User, Operation::Read, policy(true)));
    }

    #[test]
    fn senior_writes_follow_the_toggle() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        for op in [Operation::Update, Operation::Delete] {
            assert!(!can_access(me, Role::Senior, other, Role::User, op, policy(false)));
            assert!(can_access(me, Role::Senior, other, Role::User, op, policy(true)));
        }
    }

    #[test]
    fn seniors_get_nothing_on_peers_and_admins() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        for owner_role in [Role::Senior, Role::Admin] {
            for op in ALL_OPS {
                assert!(!can_access(me, Role::Senior, other, owner_role, op, policy(true)));
            }
        }
    }
}
