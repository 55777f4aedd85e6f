// Qualified identifier parsing: `scheme://namespace/TypeName/LocalId`.
//
// The type segment drives dispatch (factories, processors, foreign-key names),
// so anything that doesn't match the grammar is rejected outright.

use std::fmt;

use crate::error::{Result, SourceError};

const SCHEME_SEPARATOR: &str = "://";

/// A parsed qualified identifier. Borrows from the string it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid<'a> {
    raw: &'a str,
    scheme: &'a str,
    namespace: &'a str,
    type_name: &'a str,
    local_id: &'a str,
}

impl<'a> Gid<'a> {
    /// Parse a qualified identifier.
    /// "gid://shop/Product/1" → type_name "Product", local_id "1"
    pub fn parse(raw: &'a str) -> Result<Self> {
        let (scheme, rest) = raw
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| SourceError::malformed(raw, "missing `://` separator"))?;

        if scheme.is_empty() || !scheme.chars().all(is_scheme_char) {
            return Err(SourceError::malformed(raw, "invalid scheme"));
        }

        let mut segments = rest.splitn(3, '/');
        let namespace = segments.next().unwrap_or_default();
        let type_name = segments.next().unwrap_or_default();
        let local_id = segments.next().unwrap_or_default();

        if namespace.is_empty() {
            return Err(SourceError::malformed(raw, "empty namespace"));
        }
        if type_name.is_empty() || !type_name.chars().all(is_word_char) {
            return Err(SourceError::malformed(raw, "invalid type name"));
        }
        if local_id.is_empty() {
            return Err(SourceError::malformed(raw, "empty local id"));
        }

        Ok(Self {
            raw,
            scheme,
            namespace,
            type_name,
            local_id,
        })
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    pub fn scheme(&self) -> &'a str {
        self.scheme
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// Everything after the type segment, slashes included.
    pub fn local_id(&self) -> &'a str {
        self.local_id
    }
}

impl fmt::Display for Gid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw)
    }
}

fn is_scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Foreign-key field name for a type: first letter lower-cased, suffixed `Id`.
/// "Order" → "orderId", "LineItem" → "lineItemId"
pub fn foreign_key_field(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => {
            let mut field: String = first.to_lowercase().collect();
            field.push_str(chars.as_str());
            field.push_str("Id");
            field
        }
        None => "id".to_string(),
    }
}
