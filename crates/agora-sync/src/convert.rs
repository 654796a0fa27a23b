//! Row change to [`SyncEvent`] conversion
//!
//! | topic     | INSERT          | UPDATE       | DELETE            |
//! |-----------|-----------------|--------------|-------------------|
//! | items     | item_created    | item_updated | item_deleted      |
//! | favorites | item_favorited  | (ignored)    | item_unfavorited  |
//! | views     | item_viewed     | (ignored)    | (ignored)         |
//!
//! The subject is always the affected item; the actor is the seller, the
//! favoriting user, or the viewer respectively. Changes that carry no row,
//! or whose row has no subject column, are dropped.

use agora_core::{ItemId, RowChange, RowOperation, SyncEvent, SyncEventKind, Topic, UserId};
use serde_json::Value;
use tracing::trace;

/// Convert one raw change into a listener event, or `None` if the change
/// has no listener-visible meaning
pub fn to_sync_event(topic: Topic, change: &RowChange) -> Option<SyncEvent> {
    let Some(kind) = event_kind(topic, change.operation) else {
        trace!(topic = %topic, operation = ?change.operation, "Ignoring row change");
        return None;
    };

    let Some(row) = change.current_row() else {
        trace!(topic = %topic, operation = ?change.operation, "Ignoring row change without a row");
        return None;
    };
    let (subject_column, actor_column) = match topic {
        Topic::Items => ("id", "seller_id"),
        Topic::Favorites => ("item_id", "user_id"),
        Topic::Views => ("item_id", "viewer_id"),
    };

    let Some(subject_id) = string_column(row, subject_column).map(ItemId::new) else {
        trace!(topic = %topic, column = subject_column, "Ignoring row change without a subject");
        return None;
    };
    let actor_id = string_column(row, actor_column).map(UserId::new);

    Some(SyncEvent::new(kind, Some(subject_id), actor_id, Some(row.clone())))
}

fn event_kind(topic: Topic, operation: RowOperation) -> Option<SyncEventKind> {
    use RowOperation::*;
    match (topic, operation) {
        (Topic::Items, Insert) => Some(SyncEventKind::ItemCreated),
        (Topic::Items, Update) => Some(SyncEventKind::ItemUpdated),
        (Topic::Items, Delete) => Some(SyncEventKind::ItemDeleted),
        (Topic::Favorites, Insert) => Some(SyncEventKind::ItemFavorited),
        (Topic::Favorites, Delete) => Some(SyncEventKind::ItemUnfavorited),
        (Topic::Views, Insert) => Some(SyncEventKind::ItemViewed),
        _ => None,
    }
}

fn string_column(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_changes() {
        let row = json!({"id": "i1", "seller_id": "s1", "title": "Lamp"});

        let created = to_sync_event(Topic::Items, &RowChange::insert(row.clone())).unwrap();
        assert_eq!(created.kind(), SyncEventKind::ItemCreated);
        assert_eq!(created.subject_id().unwrap().as_str(), "i1");
        assert_eq!(created.actor_id().unwrap().as_str(), "s1");
        assert_eq!(created.payload().unwrap()["title"], "Lamp");

        let updated = to_sync_event(Topic::Items, &RowChange::update(None, row.clone())).unwrap();
        assert_eq!(updated.kind(), SyncEventKind::ItemUpdated);

        let deleted = to_sync_event(Topic::Items, &RowChange::delete(row)).unwrap();
        assert_eq!(deleted.kind(), SyncEventKind::ItemDeleted);
        assert_eq!(deleted.subject_id().unwrap().as_str(), "i1");
    }

    #[test]
    fn test_favorite_changes() {
        let row = json!({"item_id": "i9", "user_id": "u3"});

        let fav = to_sync_event(Topic::Favorites, &RowChange::insert(row.clone())).unwrap();
        assert_eq!(fav.kind(), SyncEventKind::ItemFavorited);
        assert_eq!(fav.subject_id().unwrap().as_str(), "i9");
        assert_eq!(fav.actor_id().unwrap().as_str(), "u3");

        let unfav = to_sync_event(Topic::Favorites, &RowChange::delete(row.clone())).unwrap();
        assert_eq!(unfav.kind(), SyncEventKind::ItemUnfavorited);

        assert!(to_sync_event(Topic::Favorites, &RowChange::update(None, row)).is_none());
    }

    #[test]
    fn test_view_changes() {
        let row = json!({"item_id": "i2", "viewer_id": "u8"});

        let viewed = to_sync_event(Topic::Views, &RowChange::insert(row.clone())).unwrap();
        assert_eq!(viewed.kind(), SyncEventKind::ItemViewed);
        assert_eq!(viewed.actor_id().unwrap().as_str(), "u8");

        assert!(to_sync_event(Topic::Views, &RowChange::delete(row)).is_none());
    }

    #[test]
    fn test_numeric_and_missing_columns() {
        let event = to_sync_event(Topic::Items, &RowChange::insert(json!({"id": 42}))).unwrap();
        assert_eq!(event.subject_id().unwrap().as_str(), "42");
        assert!(event.actor_id().is_none());
    }

    #[test]
    fn test_changes_without_row_or_subject_are_dropped() {
        let empty = RowChange {
            operation: RowOperation::Delete,
            before: None,
            after: None,
        };
        assert!(to_sync_event(Topic::Items, &empty).is_none());
        assert!(to_sync_event(Topic::Favorites, &empty).is_none());

        let no_subject = RowChange::insert(json!({"seller_id": "s1", "title": "Lamp"}));
        assert!(to_sync_event(Topic::Items, &no_subject).is_none());

        let null_subject = RowChange::delete(json!({"item_id": null, "user_id": "u1"}));
        assert!(to_sync_event(Topic::Favorites, &null_subject).is_none());
    }
}
