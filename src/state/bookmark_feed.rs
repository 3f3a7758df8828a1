use crate::models::Bookmark;
use crate::realtime::BookmarkChange;

/// Collection view lifecycle: `Loading -> Ready | Error`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ListPhase {
    Loading,
    Ready,
    Error(String),
}

/// Merge one feed event into the in-memory list. Last write wins per id;
/// no timestamp reconciliation.
///
/// - insert: prepend, unless the id is already present (the initiating
///   client can see its own write delivered back)
/// - update: replace in place, position preserved
/// - delete: remove; unknown ids are a no-op
pub(crate) fn apply_change(list: &mut Vec<Bookmark>, change: BookmarkChange) {
    match change {
        BookmarkChange::Insert(b) => {
            if !list.iter().any(|x| x.id == b.id) {
                list.insert(0, b);
            }
        }
        BookmarkChange::Update(b) => {
            if let Some(slot) = list.iter_mut().find(|x| x.id == b.id) {
                *slot = b;
            }
        }
        BookmarkChange::Delete(id) => {
            list.retain(|x| x.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(id: &str, title: &str) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            user_id: "u-1".to_string(),
            url: format!("https://example.com/{}", id),
            title: title.to_string(),
            created_at: "2026-08-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_prepends_new_row() {
        let mut list = vec![bookmark("b-1", "one")];
        apply_change(&mut list, BookmarkChange::Insert(bookmark("b-2", "two")));

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "b-2");
        assert_eq!(list[1].id, "b-1");
    }

    #[test]
    fn test_insert_with_existing_id_is_idempotent() {
        let mut list = vec![bookmark("b-1", "one")];
        let before = list.clone();

        apply_change(&mut list, BookmarkChange::Insert(bookmark("b-1", "dup")));
        assert_eq!(list, before);
    }

    #[test]
    fn test_update_replaces_in_place_preserving_order() {
        let mut list = vec![bookmark("b-1", "one"), bookmark("b-2", "two"), bookmark("b-3", "three")];

        apply_change(&mut list, BookmarkChange::Update(bookmark("b-2", "renamed")));

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, "b-1");
        assert_eq!(list[1].id, "b-2");
        assert_eq!(list[1].title, "renamed");
        assert_eq!(list[2].id, "b-3");
    }

    #[test]
    fn test_update_for_unknown_id_is_noop() {
        let mut list = vec![bookmark("b-1", "one")];
        let before = list.clone();

        apply_change(&mut list, BookmarkChange::Update(bookmark("b-9", "ghost")));
        assert_eq!(list, before);
    }

    #[test]
    fn test_delete_removes_matching_row_anywhere() {
        let mut list = vec![bookmark("b-1", "one"), bookmark("b-2", "two")];

        apply_change(&mut list, BookmarkChange::Delete("b-2".to_string()));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "b-1");

        // Head position too.
        let mut list = vec![bookmark("b-1", "one"), bookmark("b-2", "two")];
        apply_change(&mut list, BookmarkChange::Delete("b-1".to_string()));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "b-2");
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut list = vec![bookmark("b-1", "one")];
        apply_change(&mut list, BookmarkChange::Delete("b-9".to_string()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_out_of_order_delivery_last_write_wins() {
        // Delete for an id can arrive before its insert if frames reorder;
        // the later insert then wins (per-id last write).
        let mut list = vec![];
        apply_change(&mut list, BookmarkChange::Delete("b-1".to_string()));
        apply_change(&mut list, BookmarkChange::Insert(bookmark("b-1", "late")));

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "late");
    }
}
