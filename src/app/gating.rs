//! Which actions the UI offers to the current user.
//!
//! These checks only decide what is shown; the backend enforces the same rules.

use crate::api::{Comment, Me};
use crate::query::QueryResult;

/// The signed-in user: requires a stored token and a successful `me` query.
#[must_use]
pub fn current_user(has_session: bool, me: &QueryResult<Me>) -> Option<&Me> {
    if has_session { me.data() } else { None }
}

/// A user may comment when signed in and not blocked.
#[must_use]
pub fn can_post(has_session: bool, me: Option<&Me>) -> bool {
    has_session && me.is_some_and(|me| !me.is_blocked)
}

/// A comment may be sent when the user may post, the draft is not blank and no
/// submission is in flight.
#[must_use]
pub fn can_submit(has_session: bool, me: Option<&Me>, draft: &str, pending: bool) -> bool {
    can_post(has_session, me) && !draft.trim().is_empty() && !pending
}

/// Staff may delete any comment; everyone else only their own.
#[must_use]
pub fn can_delete(me: Option<&Me>, comment: &Comment) -> bool {
    me.is_some_and(|me| me.is_staff || me.id == comment.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{comment, user};
    use crate::error::ApiError;
    use crate::query::QueryState;

    fn loaded(me: Me) -> QueryResult<Me> {
        QueryResult {
            state: QueryState::Success {
                data: me,
                is_stale: false,
            },
            is_fetching: false,
        }
    }

    #[test]
    fn test_current_user_needs_session_and_data() {
        let me = loaded(user(1));
        assert!(current_user(true, &me).is_some());
        assert!(current_user(false, &me).is_none());
        assert!(current_user(true, &QueryResult::default()).is_none());

        let failed = QueryResult {
            state: QueryState::Error(ApiError::Http {
                status: 401,
                body: None,
            }),
            is_fetching: false,
        };
        assert!(current_user(true, &failed).is_none());
    }

    #[test]
    fn test_blocked_user_cannot_post() {
        let blocked = Me {
            is_blocked: true,
            ..user(1)
        };
        assert!(can_post(true, Some(&user(1))));
        assert!(!can_post(true, Some(&blocked)));
        assert!(!can_submit(true, Some(&blocked), "Актуально?", false));
    }

    #[test]
    fn test_cannot_post_without_session() {
        assert!(!can_post(false, Some(&user(1))));
        assert!(!can_post(true, None));
    }

    #[test]
    fn test_blank_or_pending_draft_cannot_be_submitted() {
        let me = user(1);
        assert!(can_submit(true, Some(&me), "Актуально?", false));
        assert!(!can_submit(true, Some(&me), "   \n", false));
        assert!(!can_submit(true, Some(&me), "Актуально?", true));
    }

    #[test]
    fn test_delete_rights() {
        let own = comment(1, 7, "мой");
        let foreign = comment(2, 8, "чужой");
        let author = user(7);
        let staff = Me {
            is_staff: true,
            ..user(9)
        };

        assert!(can_delete(Some(&author), &own));
        assert!(!can_delete(Some(&author), &foreign));
        assert!(can_delete(Some(&staff), &foreign));
        assert!(!can_delete(None, &own));
    }
}
