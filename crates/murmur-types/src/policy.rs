use uuid::Uuid;

use crate::models::Role;

/// Owner-or-privileged check used uniformly by every mutator that deletes
/// someone else's content (posts, comments).
pub fn can_modify(actor_id: Uuid, entity_owner_id: Uuid, actor_role: Role) -> bool {
    actor_id == entity_owner_id || actor_role == Role::Root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_modify() {
        let id = Uuid::new_v4();
        assert!(can_modify(id, id, Role::User));
    }

    #[test]
    fn root_can_modify_anything() {
        assert!(can_modify(Uuid::new_v4(), Uuid::new_v4(), Role::Root));
    }

    #[test]
    fn stranger_cannot_modify() {
        assert!(!can_modify(Uuid::new_v4(), Uuid::new_v4(), Role::User));
    }
}
