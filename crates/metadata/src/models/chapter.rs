/// A chapter, possibly with nested sub-chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// Zero-based page the chapter starts on (comics).
    pub start_page: Option<u32>,
    /// Offset into the audio, in milliseconds (audiobooks).
    pub start_timestamp_ms: Option<u64>,
    /// Content document reference (EPUB).
    pub href: Option<String>,
    pub children: Vec<Chapter>,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    /// Depth-first `(depth, title, position)` tuples, the shape used for equality
    /// between chapter lists from different sources.
    pub fn flatten(chapters: &[Chapter]) -> Vec<(usize, &str, Option<u64>)> {
        fn walk<'a>(chapters: &'a [Chapter], depth: usize, out: &mut Vec<(usize, &'a str, Option<u64>)>) {
            for chapter in chapters {
                let position = chapter
                    .start_page
                    .map(u64::from)
                    .or(chapter.start_timestamp_ms);
                out.push((depth, chapter.title.as_str(), position));
                walk(&chapter.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(chapters, 0, &mut out);
        out
    }

    /// Total number of chapters in the tree.
    pub fn count(chapters: &[Chapter]) -> usize {
        chapters.iter().map(|c| 1 + Self::count(&c.children)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_is_depth_first() {
        let mut part = Chapter::new("Part One");
        part.children = vec![Chapter::new("One"), Chapter::new("Two")];
        let tree = vec![part, Chapter::new("Epilogue")];
        let flat: Vec<_> = Chapter::flatten(&tree).into_iter().map(|(d, t, _)| (d, t)).collect();
        assert_eq!(flat, vec![(0, "Part One"), (1, "One"), (1, "Two"), (0, "Epilogue")]);
        assert_eq!(Chapter::count(&tree), 4);
    }
}
