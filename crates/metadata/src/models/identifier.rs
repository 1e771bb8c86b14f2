use std::{
    convert::Infallible,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentifierKind {
    Isbn10,
    Isbn13,
    Asin,
    Uuid,
    Goodreads,
    Google,
    Other,
}
impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Isbn10 => "isbn_10",
            IdentifierKind::Isbn13 => "isbn_13",
            IdentifierKind::Asin => "asin",
            IdentifierKind::Uuid => "uuid",
            IdentifierKind::Goodreads => "goodreads",
            IdentifierKind::Google => "google",
            IdentifierKind::Other => "other",
        }
    }
}
impl Display for IdentifierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for IdentifierKind {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match sanitized.as_str() {
            "isbn_10" | "isbn10" => IdentifierKind::Isbn10,
            "isbn_13" | "isbn13" => IdentifierKind::Isbn13,
            "asin" | "mobi_asin" => IdentifierKind::Asin,
            "uuid" | "urn_uuid" => IdentifierKind::Uuid,
            "goodreads" => IdentifierKind::Goodreads,
            "google" | "google_books" => IdentifierKind::Google,
            _ => IdentifierKind::Other,
        })
    }
}
impl From<&str> for IdentifierKind {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(infallible) => match infallible {},
        }
    }
}

/// An external identifier for a file, such as an ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}
impl Identifier {
    pub fn new(kind: IdentifierKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into().trim().to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ISBN-13", IdentifierKind::Isbn13)]
    #[case("isbn_10", IdentifierKind::Isbn10)]
    #[case("ASIN", IdentifierKind::Asin)]
    #[case("Google Books", IdentifierKind::Google)]
    #[case("calibre", IdentifierKind::Other)]
    fn test_kind_parsing(#[case] raw: &str, #[case] expected: IdentifierKind) {
        assert_eq!(IdentifierKind::from(raw), expected);
    }
}
