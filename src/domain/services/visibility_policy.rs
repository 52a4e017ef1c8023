//! Memory visibility domain service.

use chrono::{DateTime, Utc};

use crate::domain::entities::{Memory, ViewerRelation};
use crate::domain::value_objects::MemoryScope;

/// Domain service deciding who may see a memory.
pub struct VisibilityPolicy;

impl VisibilityPolicy {
    /// Whether `viewer_id` may see `memory`.
    ///
    /// The author always sees their own memories, including expired stories.
    /// Deleted memories are handled by the caller (they are "not found",
    /// not "forbidden").
    pub fn can_view(
        memory: &Memory,
        viewer_id: i64,
        relation: ViewerRelation,
        now: DateTime<Utc>,
    ) -> bool {
        if memory.author_id == viewer_id {
            return true;
        }

        match memory.scope {
            MemoryScope::Public => true,
            MemoryScope::Private => false,
            MemoryScope::Direct => memory.recipient_id == Some(viewer_id),
            MemoryScope::Circle => relation.circle_member,
            MemoryScope::Followers => relation.follows_author,
            MemoryScope::Friends => relation.friends_with_author,
            MemoryScope::Story => {
                !memory.is_expired(now) && (relation.follows_author || relation.friends_with_author)
            }
        }
    }

    /// Whether evaluating `scope` needs the viewer's relation to the author.
    pub fn needs_relation(scope: MemoryScope) -> bool {
        matches!(
            scope,
            MemoryScope::Circle | MemoryScope::Followers | MemoryScope::Friends | MemoryScope::Story
        )
    }

    /// Scopes of an author's timeline visible to a viewer.
    ///
    /// Circle and direct memories never appear on a timeline; they live in
    /// the circle feed and the recipient's home feed.
    pub fn timeline_scopes(is_self: bool, relation: ViewerRelation) -> Vec<MemoryScope> {
        if is_self {
            return vec![
                MemoryScope::Public,
                MemoryScope::Followers,
                MemoryScope::Friends,
                MemoryScope::Private,
                MemoryScope::Story,
            ];
        }

        let mut scopes = vec![MemoryScope::Public];
        if relation.follows_author {
            scopes.push(MemoryScope::Followers);
        }
        if relation.friends_with_author {
            scopes.push(MemoryScope::Friends);
        }
        if relation.follows_author || relation.friends_with_author {
            scopes.push(MemoryScope::Story);
        }
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    const AUTHOR: i64 = 1;
    const VIEWER: i64 = 2;

    fn memory(scope: MemoryScope) -> Memory {
        Memory::new(100, AUTHOR, scope)
    }

    fn relation(follows: bool, friends: bool, member: bool) -> ViewerRelation {
        ViewerRelation {
            follows_author: follows,
            friends_with_author: friends,
            circle_member: member,
        }
    }

    #[test_case(MemoryScope::Public, relation(false, false, false), true)]
    #[test_case(MemoryScope::Private, relation(true, true, true), false)]
    #[test_case(MemoryScope::Circle, relation(false, false, true), true)]
    #[test_case(MemoryScope::Circle, relation(true, true, false), false)]
    #[test_case(MemoryScope::Followers, relation(true, false, false), true)]
    #[test_case(MemoryScope::Followers, relation(false, true, false), false)]
    #[test_case(MemoryScope::Friends, relation(false, true, false), true)]
    #[test_case(MemoryScope::Friends, relation(true, false, false), false)]
    #[test_case(MemoryScope::Story, relation(true, false, false), true)]
    #[test_case(MemoryScope::Story, relation(false, true, false), true)]
    #[test_case(MemoryScope::Story, relation(false, false, false), false)]
    fn test_scope_rules(scope: MemoryScope, rel: ViewerRelation, expected: bool) {
        let mut m = memory(scope);
        if scope == MemoryScope::Story {
            m.expires_at = Some(Utc::now() + Duration::hours(1));
        }
        assert_eq!(VisibilityPolicy::can_view(&m, VIEWER, rel, Utc::now()), expected);
    }

    #[test]
    fn test_author_always_sees_own() {
        for scope in MemoryScope::ALL {
            let mut m = memory(scope);
            m.expires_at = Some(Utc::now() - Duration::hours(1));
            assert!(VisibilityPolicy::can_view(
                &m,
                AUTHOR,
                ViewerRelation::default(),
                Utc::now()
            ));
        }
    }

    #[test]
    fn test_direct_only_recipient() {
        let mut m = memory(MemoryScope::Direct);
        m.recipient_id = Some(VIEWER);
        let rel = ViewerRelation::default();
        assert!(VisibilityPolicy::can_view(&m, VIEWER, rel, Utc::now()));
        assert!(!VisibilityPolicy::can_view(&m, 3, rel, Utc::now()));
    }

    #[test]
    fn test_expired_story_hidden_from_followers() {
        let mut m = memory(MemoryScope::Story);
        m.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(!VisibilityPolicy::can_view(
            &m,
            VIEWER,
            relation(true, true, false),
            Utc::now()
        ));
    }

    #[test]
    fn test_timeline_scopes() {
        assert_eq!(
            VisibilityPolicy::timeline_scopes(false, ViewerRelation::default()),
            vec![MemoryScope::Public]
        );
        assert_eq!(
            VisibilityPolicy::timeline_scopes(false, relation(true, false, false)),
            vec![MemoryScope::Public, MemoryScope::Followers, MemoryScope::Story]
        );
        assert!(VisibilityPolicy::timeline_scopes(true, ViewerRelation::default())
            .contains(&MemoryScope::Private));
    }
}
