mod chapter;
mod cover;
mod field;
mod identifier;
mod parsed;

pub use self::chapter::Chapter;
pub use self::cover::{Cover, cover_extension, normalize_mime};
pub use self::field::{Field, FieldDataSources};
pub use self::identifier::{Identifier, IdentifierKind};
pub use self::parsed::{ParsedAuthor, ParsedMetadata};

/// Trimmed contents of an optional string, or `None` when there is nothing but whitespace.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
