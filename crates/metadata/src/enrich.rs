//! Combining enricher output with the file parser's own metadata.
//!
//! Enrichers are merged first, in priority order, and the first one to supply
//! a value for a field owns it. The parser's output then fills whatever is
//! still empty. Identifiers are the exception: every contributor adds to them.

use crate::models::{Field, FieldDataSources, ParsedMetadata, non_blank};
use crate::source::DataSource;
use time::Date;

/// Values that can be "not yet set" in the accumulator.
trait Slot: Clone {
    fn is_unset(&self) -> bool;
}
impl Slot for Option<String> {
    fn is_unset(&self) -> bool {
        non_blank(self).is_none()
    }
}
impl Slot for Option<Date> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}
impl<T: Clone> Slot for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Two-phase accumulator over candidate metadata for one file.
#[derive(Debug, Default)]
pub struct MetadataAccumulator {
    merged: ParsedMetadata,
}

impl MetadataAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `candidate` into `slot` if the slot is unset and the candidate is
    /// not, recording `source` for `field`.
    fn fill<T: Slot>(slot: &mut T, candidate: &T, field: Field, source: &DataSource, sources: &mut FieldDataSources) -> bool {
        if !slot.is_unset() || candidate.is_unset() {
            return false;
        }
        *slot = candidate.clone();
        sources.insert(field, source.clone());
        true
    }

    /// Merge one contributor. `source_of` picks the provenance per field.
    fn absorb(&mut self, other: &ParsedMetadata, source_of: impl Fn(Field) -> DataSource) {
        let m = &mut self.merged;
        let s = &mut m.field_sources;
        Self::fill(&mut m.title, &other.title, Field::Title, &source_of(Field::Title), s);
        Self::fill(&mut m.subtitle, &other.subtitle, Field::Subtitle, &source_of(Field::Subtitle), s);
        Self::fill(&mut m.description, &other.description, Field::Description, &source_of(Field::Description), s);
        Self::fill(&mut m.authors, &other.authors, Field::Authors, &source_of(Field::Authors), s);
        Self::fill(&mut m.narrators, &other.narrators, Field::Narrators, &source_of(Field::Narrators), s);
        if Self::fill(&mut m.series, &other.series, Field::Series, &source_of(Field::Series), s) {
            m.series_number = other.series_number;
        }
        Self::fill(&mut m.genres, &other.genres, Field::Genres, &source_of(Field::Genres), s);
        Self::fill(&mut m.tags, &other.tags, Field::Tags, &source_of(Field::Tags), s);
        Self::fill(&mut m.publisher, &other.publisher, Field::Publisher, &source_of(Field::Publisher), s);
        Self::fill(&mut m.imprint, &other.imprint, Field::Imprint, &source_of(Field::Imprint), s);
        Self::fill(&mut m.url, &other.url, Field::Url, &source_of(Field::Url), s);
        Self::fill(&mut m.release_date, &other.release_date, Field::ReleaseDate, &source_of(Field::ReleaseDate), s);
        Self::fill(&mut m.chapters, &other.chapters, Field::Chapters, &source_of(Field::Chapters), s);

        // Additive: keep everything, dropping only exact repeats.
        let mut added = false;
        for identifier in &other.identifiers {
            if !m.identifiers.contains(identifier) {
                m.identifiers.push(identifier.clone());
                added = true;
            }
        }
        if added && s.get(Field::Identifiers).is_none() {
            s.insert(Field::Identifiers, source_of(Field::Identifiers));
        }
    }

    /// Merge one enricher's patch, attributing every filled field to `source`.
    pub fn merge_enricher(&mut self, source: &DataSource, patch: &ParsedMetadata) -> &mut Self {
        self.absorb(patch, |_| source.clone());
        self
    }

    /// Merge the file parser's output as a fallback for still-empty fields.
    pub fn merge_parser(&mut self, parsed: &ParsedMetadata) -> &mut Self {
        self.absorb(parsed, |field| parsed.source_for(field).clone());
        self
    }

    /// Finish, copying the technical fields from the parser verbatim.
    pub fn finish(self, parsed: &ParsedMetadata) -> ParsedMetadata {
        let mut merged = self.merged;
        merged.cover = parsed.cover.clone();
        merged.duration = parsed.duration;
        merged.bitrate = parsed.bitrate;
        merged.page_count = parsed.page_count;
        merged.data_source = parsed.data_source.clone();
        merged
    }
}
