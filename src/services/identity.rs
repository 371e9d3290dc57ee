//! Identifier assignment for new artifacts.

use uuid::Uuid;

/// A fresh random identifier. Never derived from stored state, so deleted
/// ids are not handed out again.
pub fn assign_object_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
