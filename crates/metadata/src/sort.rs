//! Sort keys for titles and people.

const ARTICLES: [&str; 3] = ["The", "A", "An"];
const NAME_SUFFIXES: [&str; 8] = ["Jr.", "Jr", "Sr.", "Sr", "II", "III", "IV", "PhD"];

/// `The Hobbit` sorts as `Hobbit, The`.
pub fn sort_title(title: &str) -> String {
    let title = title.trim();
    for article in ARTICLES {
        if let Some(rest) = title.strip_prefix(article)
            && rest.starts_with(' ')
            && !rest.trim().is_empty()
        {
            return format!("{}, {article}", rest.trim());
        }
    }
    title.to_string()
}

/// `Ursula K. Le Guin` sorts as `Guin, Ursula K. Le`; single names sort as-is.
///
/// Generational suffixes stay attached to the given names: `Martin Luther King Jr.`
/// sorts as `King, Martin Luther Jr.`.
pub fn sort_name(name: &str) -> String {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    let suffix = match words.last() {
        Some(last) if words.len() > 2 && NAME_SUFFIXES.contains(&last.trim_end_matches(',')) => words.pop(),
        _ => None,
    };
    if words.len() < 2 {
        return name.trim().to_string();
    }
    let Some(last) = words.pop() else {
        return name.trim().to_string();
    };
    let mut sorted = format!("{}, {}", last.trim_end_matches(','), words.join(" ").trim_end_matches(','));
    if let Some(suffix) = suffix {
        sorted.push(' ');
        sorted.push_str(suffix.trim_end_matches(','));
    }
    sorted
}
