// Parent linkage: `__parentId: "gid://shop/Order/7"` becomes `orderId: "gid://shop/Order/7"`.

use serde_json::Value;

use storefront_common::{foreign_key_field, Gid, Record, Result, SourceError, PARENT_ID_FIELD};

/// Replace the parent reference with a foreign-key field named after the
/// parent's type. The value keeps the fully qualified identifier so it can be
/// matched against other qualified ids downstream. No-op without a parent;
/// a null parent counts as none and is dropped.
pub fn attach_parent(record: &mut Record) -> Result<()> {
    let Some(parent) = record.remove(PARENT_ID_FIELD) else {
        return Ok(());
    };

    let parent_id = match parent {
        Value::String(parent_id) => parent_id,
        Value::Null => return Ok(()),
        other => {
            return Err(SourceError::malformed(
                other.to_string(),
                "parent reference is not a string",
            ))
        }
    };

    let field = foreign_key_field(Gid::parse(&parent_id)?.type_name());
    record.insert(field, Value::String(parent_id));
    Ok(())
}
