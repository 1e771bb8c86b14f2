use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// `[Author One, Author Two]` anywhere in a name component.
regex!(AUTHOR_GROUP_REGEX, r"\[([^\]]*)\]");
// `{Narrator}` anywhere in a name component.
regex!(NARRATOR_GROUP_REGEX, r"\{([^}]*)\}");
// `(2019) (Digital) (Group)` release metadata.
regex!(RELEASE_GROUP_REGEX, r"\([^)]*\)");
// Separators between people listed in one group.
regex!(PERSON_SEPARATOR_REGEX, r"\s*(?:,|;|&|\band\b)\s*");
// Volume indicators at the end of a name: `#007`, `v07`, `Vol. 7`, `Volume 7` or a bare `007`.
regex!(
    TRAILING_VOLUME_REGEX,
    r"(?i)\s*(?:#|\bv(?:ol(?:ume)?)?\.?\s*|\s)0*(\d+(?:\.\d+)?)\s*$"
);
// Normalized volume suffix, as generated.
regex!(VOLUME_SUFFIX_REGEX, r"^(.*?)\s+v(\d+(?:\.\d+)?)$");
regex!(WHITESPACE_REGEX, r"\s+");
