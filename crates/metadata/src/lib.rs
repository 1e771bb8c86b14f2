mod consts;
pub mod enrich;
pub mod error;
pub mod filename;
pub mod merge;
pub mod models;
pub mod parser;
pub mod sidecar;
pub mod sort;
pub mod source;

pub use crate::enrich::MetadataAccumulator;
pub use crate::models::{
    Chapter, Cover, Field, FieldDataSources, Identifier, IdentifierKind, ParsedAuthor, ParsedMetadata,
};
pub use crate::parser::{
    EnrichResult, Enricher, FilenameOnlyParser, InputConverter, MetadataParser, ParserRegistry, PluginParser,
};
pub use crate::source::{DataSource, FileType, PluginId, Tier};

use std::path::Path;
use tracing::instrument;

/// Parse a file and fold in every applicable enricher.
///
/// Enrichers take precedence over the file's own metadata field by field;
/// technical fields always come from the file.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn parse_and_enrich(registry: &ParserRegistry, path: &Path, data: &[u8]) -> error::Result<ParsedMetadata> {
    let parsed = registry.parse(path, data).await?;
    let file_type = FileType::from_extension(&path.extension().map(|e| e.to_string_lossy()).unwrap_or_default());
    let patches = registry.enrich(path, &file_type, &parsed).await;
    if patches.is_empty() {
        return Ok(parsed);
    }
    let mut accumulator = MetadataAccumulator::new();
    for (source, patch) in &patches {
        accumulator.merge_enricher(source, patch);
    }
    accumulator.merge_parser(&parsed);
    Ok(accumulator.finish(&parsed))
}
