use std::collections::BTreeSet;

use porta_shared::{RoleId, UserId};

/// Identity of whoever triggered a dispatcher operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: UserId,
    pub display_name: String,
    pub roles: BTreeSet<RoleId>,
}

/// Admin and moderator roles allowed to run privileged actions.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    privileged: BTreeSet<RoleId>,
}

impl Authorizer {
    pub fn new(privileged: BTreeSet<RoleId>) -> Self {
        Self { privileged }
    }

    pub fn is_privileged(&self, roles: &BTreeSet<RoleId>) -> bool {
        !self.privileged.is_disjoint(roles)
    }

    /// Role mentions for pinging staff in a new thread.
    pub fn staff_mentions(&self) -> String {
        self.privileged
            .iter()
            .map(|role| format!("<@&{role}>"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use porta_shared::RoleId;

    use super::Authorizer;

    fn roles(ids: &[u64]) -> BTreeSet<RoleId> {
        ids.iter().copied().map(RoleId).collect()
    }

    #[test]
    fn privilege_requires_a_shared_role() {
        let auth = Authorizer::new(roles(&[10, 20]));
        assert!(auth.is_privileged(&roles(&[1, 20])));
        assert!(!auth.is_privileged(&roles(&[1, 2])));
        assert!(!auth.is_privileged(&BTreeSet::new()));
    }

    #[test]
    fn empty_configuration_denies_everyone() {
        let auth = Authorizer::default();
        assert!(!auth.is_privileged(&roles(&[10])));
        assert_eq!(auth.staff_mentions(), "");
    }

    #[test]
    fn staff_mentions_render_role_pings() {
        let auth = Authorizer::new(roles(&[10, 20]));
        assert_eq!(auth.staff_mentions(), "<@&10> <@&20>");
    }
}
