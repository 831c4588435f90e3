use uuid::Uuid;

/// Time-ordered identifiers keep version rows roughly in creation order.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}
