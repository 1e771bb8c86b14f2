//! Naming conventions, in both directions.
//!
//! Parsing takes one path component at a time: `[Author]` groups, `{Narrator}`
//! groups, parenthesized release metadata and trailing volume numbers.
//! Generation produces `[Author, Author] Title vN`.

use crate::consts::{
    AUTHOR_GROUP_REGEX, NARRATOR_GROUP_REGEX, PERSON_SEPARATOR_REGEX, RELEASE_GROUP_REGEX, TRAILING_VOLUME_REGEX,
    VOLUME_SUFFIX_REGEX, WHITESPACE_REGEX,
};
use regex::Regex;

/// Longest file name component we generate, in bytes.
pub const MAX_COMPONENT_BYTES: usize = 200;

fn extract_people(name: &str, group: &Regex) -> (Vec<String>, String) {
    let mut people = Vec::new();
    for captures in group.captures_iter(name) {
        people.extend(
            PERSON_SEPARATOR_REGEX
                .split(&captures[1])
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from),
        );
    }
    (people, collapse(&group.replace_all(name, " ")))
}

fn collapse(name: &str) -> String {
    WHITESPACE_REGEX
        .replace_all(name, " ")
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .to_string()
}

/// Pull `[Author]` groups out of a name, returning the authors and what is left.
pub fn extract_authors(name: &str) -> (Vec<String>, String) {
    extract_people(name, &AUTHOR_GROUP_REGEX)
}

/// Pull `{Narrator}` groups out of a name, returning the narrators and what is left.
pub fn extract_narrators(name: &str) -> (Vec<String>, String) {
    extract_people(name, &NARRATOR_GROUP_REGEX)
}

/// Drop `(...)` release/group metadata.
pub fn strip_release_groups(name: &str) -> String {
    collapse(&RELEASE_GROUP_REGEX.replace_all(name, " "))
}

/// Rewrite a trailing `#007`, `Vol. 7` or bare `007` as ` v7`.
pub fn normalize_volume(name: &str) -> String {
    match TRAILING_VOLUME_REGEX.captures(name) {
        Some(captures) => {
            let Some(whole) = captures.get(0) else {
                return name.to_string();
            };
            let head = name[..whole.start()].trim_end();
            if head.is_empty() {
                return name.to_string();
            }
            format!("{head} v{}", &captures[1])
        },
        None => name.to_string(),
    }
}

/// Split `Title v7` into `("Title", 7.0)`.
pub fn split_volume(name: &str) -> Option<(String, f64)> {
    let captures = VOLUME_SUFFIX_REGEX.captures(name.trim())?;
    let number = captures[2].parse::<f64>().ok()?;
    let series = captures[1].trim();
    (!series.is_empty()).then(|| (series.to_string(), number))
}

/// `3.0` as `3`, `1.5` as `1.5`.
pub fn format_volume(number: f64) -> String {
    if number.fract() == 0.0 { format!("{}", number as i64) } else { format!("{number}") }
}

/// What a name component says about a book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameParts {
    pub title: String,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
}

/// Clean a file or directory name (without extension) into a title plus
/// any people named by convention.
///
/// The title is never empty: when stripping leaves nothing, the raw name is
/// used as-is.
pub fn parse_name(raw: &str, with_volumes: bool) -> NameParts {
    let (authors, rest) = extract_authors(raw);
    let (narrators, rest) = extract_narrators(&rest);
    let mut title = strip_release_groups(&rest);
    if with_volumes {
        title = normalize_volume(&title);
    }
    if title.is_empty() {
        title = raw.trim().to_string();
    }
    if title.is_empty() {
        title = raw.to_string();
    }
    NameParts { title, authors, narrators }
}

/// Make a string safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' => out.push_str(" -"),
            '/' | '\\' | '|' => out.push('-'),
            '*' | '?' | '"' | '<' | '>' => {},
            c if c.is_control() => {},
            c => out.push(c),
        }
    }
    let collapsed = WHITESPACE_REGEX.replace_all(&out, " ");
    let trimmed = collapsed.trim().trim_end_matches('.').trim_end();
    let end = trimmed.floor_char_boundary(MAX_COMPONENT_BYTES);
    trimmed[..end].trim_end().to_string()
}

/// `[Author One, Author Two] Title v3`, sanitized.
pub fn canonical_stem<S: AsRef<str>>(authors: &[S], title: &str, volume: Option<f64>) -> String {
    let mut stem = String::new();
    let authors: Vec<&str> = authors.iter().map(|a| a.as_ref().trim()).filter(|a| !a.is_empty()).collect();
    if !authors.is_empty() {
        stem.push('[');
        stem.push_str(&authors.join(", "));
        stem.push_str("] ");
    }
    stem.push_str(title.trim());
    if let Some(volume) = volume
        && split_volume(title).is_none()
    {
        stem.push_str(" v");
        stem.push_str(&format_volume(volume));
    }
    sanitize_component(&stem)
}

/// Canonical file name: the stem, narrators for audiobooks, then the extension.
pub fn canonical_file_name<S: AsRef<str>>(stem: &str, narrators: &[S], extension: &str) -> String {
    let narrators: Vec<&str> = narrators.iter().map(|n| n.as_ref().trim()).filter(|n| !n.is_empty()).collect();
    let base = if narrators.is_empty() {
        stem.to_string()
    } else {
        sanitize_component(&format!("{stem} {{{}}}", narrators.join(", ")))
    };
    format!("{base}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[John Doe] My Test Book", vec!["John Doe"], "My Test Book")]
    #[case("[Jane Roe, Bob Smith] Shared", vec!["Jane Roe", "Bob Smith"], "Shared")]
    #[case("[A & B] Title", vec!["A", "B"], "Title")]
    #[case("No Authors Here", vec![], "No Authors Here")]
    #[case("Title [Trailing Author]", vec!["Trailing Author"], "Title")]
    fn test_extract_authors(#[case] raw: &str, #[case] authors: Vec<&str>, #[case] rest: &str) {
        let (found, remaining) = extract_authors(raw);
        assert_eq!(found, authors);
        assert_eq!(remaining, rest);
    }

    #[test]
    fn test_extract_narrators() {
        let (narrators, rest) = extract_narrators("Wind and Truth {Kate Reading; Michael Kramer}");
        assert_eq!(narrators, vec!["Kate Reading", "Michael Kramer"]);
        assert_eq!(rest, "Wind and Truth");
    }

    #[rstest]
    #[case("Saga (2012) (Digital) (Group)", "Saga")]
    #[case("(2019) Only Groups", "Only Groups")]
    #[case("Nothing", "Nothing")]
    fn test_strip_release_groups(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(strip_release_groups(raw), expected);
    }

    #[rstest]
    #[case("Saga #007", "Saga v7")]
    #[case("Saga 007", "Saga v7")]
    #[case("Saga v07", "Saga v7")]
    #[case("Saga Vol. 3", "Saga v3")]
    #[case("Saga #1.5", "Saga v1.5")]
    #[case("Saga #000", "Saga v0")]
    #[case("Saga", "Saga")]
    #[case("007", "007")]
    fn test_normalize_volume(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_volume(raw), expected);
    }

    #[rstest]
    #[case("Saga v7", Some(("Saga", 7.0)))]
    #[case("Saga v1.5", Some(("Saga", 1.5)))]
    #[case("Saga", None)]
    #[case("v7", None)]
    fn test_split_volume(#[case] raw: &str, #[case] expected: Option<(&str, f64)>) {
        assert_eq!(split_volume(raw), expected.map(|(s, n)| (s.to_string(), n)));
    }

    #[test]
    fn test_parse_name_full() {
        let parts = parse_name("[Brian K. Vaughan] Saga #003 (2013) (Digital)", true);
        assert_eq!(parts.authors, vec!["Brian K. Vaughan"]);
        assert_eq!(parts.title, "Saga v3");
    }

    #[test]
    fn test_parse_name_never_empty() {
        let parts = parse_name("[Author Only]", false);
        assert_eq!(parts.title, "[Author Only]");
        assert_eq!(parts.authors, vec!["Author Only"]);
    }

    #[rstest]
    #[case("Star Wars: A New Hope", "Star Wars - A New Hope")]
    #[case("What?", "What")]
    #[case("AC/DC", "AC-DC")]
    #[case("Trailing dots...", "Trailing dots")]
    fn test_sanitize_component(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_component(raw), expected);
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_COMPONENT_BYTES);
        let sanitized = sanitize_component(&long);
        assert!(sanitized.len() <= MAX_COMPONENT_BYTES);
        assert!(sanitized.chars().all(|c| c == 'é'));
    }

    #[rstest]
    #[case(vec!["Jane Roe", "Bob Smith"], "Shared", None, "[Jane Roe, Bob Smith] Shared")]
    #[case(vec![], "Anonymous", None, "Anonymous")]
    #[case(vec!["BKV"], "Saga", Some(3.0), "[BKV] Saga v3")]
    #[case(vec!["BKV"], "Saga v3", Some(3.0), "[BKV] Saga v3")]
    fn test_canonical_stem(
        #[case] authors: Vec<&str>,
        #[case] title: &str,
        #[case] volume: Option<f64>,
        #[case] expected: &str,
    ) {
        assert_eq!(canonical_stem(&authors, title, volume), expected);
    }

    #[test]
    fn test_canonical_file_name() {
        assert_eq!(canonical_file_name("[A] B", &["N"], "m4b"), "[A] B {N}.m4b");
        assert_eq!(canonical_file_name::<&str>("[A] B", &[], "epub"), "[A] B.epub");
    }

    #[test]
    fn test_generated_names_parse_back() {
        let stem = canonical_stem(&["Jane Roe"], "Wind and Truth", None);
        let parts = parse_name(&canonical_file_name(&stem, &["Kate Reading"], "m4b").replace(".m4b", ""), false);
        assert_eq!(parts.title, "Wind and Truth");
        assert_eq!(parts.authors, vec!["Jane Roe"]);
        assert_eq!(parts.narrators, vec!["Kate Reading"]);
    }
}
