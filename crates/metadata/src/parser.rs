//! Parser, converter and enricher contracts, and the registry that routes
//! files to them by extension.

use crate::error::{ErrorKind, Result};
use crate::models::ParsedMetadata;
use crate::source::{DataSource, FileType, PluginId};
use async_trait::async_trait;
use exn::ResultExt;
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::{debug, instrument, warn};

/// Decodes one natively supported format.
pub trait MetadataParser: Send + Sync {
    fn file_type(&self) -> FileType;
    fn parse(&self, path: &Path, data: &[u8]) -> Result<ParsedMetadata>;
}

/// A parser supplied by a plugin for a non-native extension.
#[async_trait]
pub trait PluginParser: Send + Sync {
    fn plugin(&self) -> &PluginId;
    /// Lowercase extension, without the leading dot.
    fn extension(&self) -> &str;
    /// MIME types the plugin accepts; empty means "don't check".
    fn mime_types(&self) -> &[String] {
        &[]
    }
    async fn parse(&self, path: &Path, data: &[u8]) -> Result<ParsedMetadata>;
}

/// Transforms a file into another format before it is parsed.
#[async_trait]
pub trait InputConverter: Send + Sync {
    fn plugin(&self) -> &PluginId;
    fn source_extension(&self) -> &str;
    fn target_extension(&self) -> &str;
    fn mime_types(&self) -> &[String] {
        &[]
    }
    async fn convert(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>>;
}

/// Output of an enricher: whether it changed anything, and the patch.
#[derive(Debug, Clone, Default)]
pub struct EnrichResult {
    pub modified: bool,
    pub metadata: ParsedMetadata,
}
impl EnrichResult {
    pub fn unchanged() -> Self {
        Self::default()
    }
    pub fn modified(metadata: ParsedMetadata) -> Self {
        Self { modified: true, metadata }
    }
}

/// Post-processes parsed metadata (online lookups, house rules, ...).
#[async_trait]
pub trait Enricher: Send + Sync {
    fn plugin(&self) -> &PluginId;
    fn applies_to(&self, _file_type: &FileType) -> bool {
        true
    }
    async fn enrich(&self, path: &Path, parsed: &ParsedMetadata) -> Result<EnrichResult>;
}

/// Yields no metadata at all, so the catalog is driven by path heuristics.
///
/// Registered for native formats when no real decoder is installed.
#[derive(Debug, Clone)]
pub struct FilenameOnlyParser {
    file_type: FileType,
}
impl FilenameOnlyParser {
    pub fn new(file_type: FileType) -> Self {
        Self { file_type }
    }
}
impl MetadataParser for FilenameOnlyParser {
    fn file_type(&self) -> FileType {
        self.file_type.clone()
    }
    fn parse(&self, _path: &Path, _data: &[u8]) -> Result<ParsedMetadata> {
        Ok(ParsedMetadata::new(self.file_type.metadata_source().unwrap_or_default()))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn check_mime(expected: &[String], data: &[u8]) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let found = infer::get(data).map(|kind| kind.mime_type()).unwrap_or("application/octet-stream");
    if expected.iter().any(|mime| mime.eq_ignore_ascii_case(found)) {
        return Ok(());
    }
    exn::bail!(ErrorKind::MimeMismatch { expected: expected.to_vec(), found: found.to_string() })
}

#[derive(Default, Clone)]
pub struct ParserRegistry {
    native: HashMap<String, Arc<dyn MetadataParser>>,
    plugins: HashMap<String, Arc<dyn PluginParser>>,
    converters: HashMap<String, Arc<dyn InputConverter>>,
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that recognizes every native format by file name alone.
    pub fn filename_only() -> Self {
        let mut registry = Self::new();
        for extension in FileType::RESERVED {
            registry.register_native(Arc::new(FilenameOnlyParser::new(FileType::from_extension(extension))));
        }
        registry
    }

    /// Register (or replace) the parser for a native format.
    pub fn register_native(&mut self, parser: Arc<dyn MetadataParser>) -> &mut Self {
        self.native.insert(parser.file_type().extension().to_string(), parser);
        self
    }

    pub fn register_plugin(&mut self, parser: Arc<dyn PluginParser>) -> Result<&mut Self> {
        let extension = parser.extension().trim_start_matches('.').to_lowercase();
        exn::ensure!(!FileType::from_extension(&extension).is_reserved(), ErrorKind::ReservedExtension(extension));
        self.plugins.insert(extension, parser);
        Ok(self)
    }

    pub fn register_converter(&mut self, converter: Arc<dyn InputConverter>) -> Result<&mut Self> {
        let extension = converter.source_extension().trim_start_matches('.').to_lowercase();
        exn::ensure!(!FileType::from_extension(&extension).is_reserved(), ErrorKind::ReservedExtension(extension));
        self.converters.insert(extension, converter);
        Ok(self)
    }

    /// Enrichers run in registration order; earlier ones take priority.
    pub fn register_enricher(&mut self, enricher: Arc<dyn Enricher>) -> &mut Self {
        self.enrichers.push(enricher);
        self
    }

    pub fn enrichers(&self) -> &[Arc<dyn Enricher>] {
        &self.enrichers
    }

    /// Whether files with this path's extension can be parsed.
    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.native.contains_key(&ext) || self.plugins.contains_key(&ext))
    }

    pub fn converter_for(&self, path: &Path) -> Option<Arc<dyn InputConverter>> {
        extension_of(path).and_then(|ext| self.converters.get(&ext).cloned())
    }

    /// Parse `data` read from `path`, stamping the result with its provenance.
    #[instrument(skip_all, fields(path = %path.display(), size = data.len()))]
    pub async fn parse(&self, path: &Path, data: &[u8]) -> Result<ParsedMetadata> {
        let extension = extension_of(path).unwrap_or_default();
        if let Some(parser) = self.native.get(&extension) {
            let file_type = parser.file_type();
            let mut parsed = parser
                .parse(path, data)
                .or_raise(|| ErrorKind::Parse(path.display().to_string()))?;
            parsed.data_source = file_type.metadata_source().unwrap_or_default();
            return Ok(parsed);
        }
        if let Some(parser) = self.plugins.get(&extension) {
            check_mime(parser.mime_types(), data)?;
            debug!(plugin = %parser.plugin(), "parsing with plugin");
            let mut parsed = parser
                .parse(path, data)
                .await
                .or_raise(|| ErrorKind::Plugin { plugin: parser.plugin().to_string() })?;
            parsed.data_source = DataSource::Plugin(parser.plugin().clone());
            return Ok(parsed);
        }
        exn::bail!(ErrorKind::UnsupportedExtension(extension))
    }

    /// Run the converter registered for `path`'s extension.
    ///
    /// Returns the converted bytes and the extension they should be saved under.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn convert(&self, path: &Path, data: &[u8]) -> Result<Option<(Vec<u8>, String)>> {
        let Some(converter) = self.converter_for(path) else {
            return Ok(None);
        };
        check_mime(converter.mime_types(), data)?;
        let converted = converter
            .convert(path, data)
            .await
            .or_raise(|| ErrorKind::Plugin { plugin: converter.plugin().to_string() })?;
        Ok(Some((converted, converter.target_extension().trim_start_matches('.').to_lowercase())))
    }

    /// Run every applicable enricher in order. Failures are logged and skipped.
    pub async fn enrich(&self, path: &Path, file_type: &FileType, parsed: &ParsedMetadata) -> Vec<(DataSource, ParsedMetadata)> {
        let mut patches = Vec::new();
        for enricher in self.enrichers.iter().filter(|e| e.applies_to(file_type)) {
            match enricher.enrich(path, parsed).await {
                Ok(result) if result.modified => {
                    patches.push((DataSource::Plugin(enricher.plugin().clone()), result.metadata));
                },
                Ok(_) => {},
                Err(err) => warn!(plugin = %enricher.plugin(), error = ?err, "enricher failed"),
            }
        }
        patches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZIP_MAGIC: &[u8] = b"PK\x03\x04\x14\x00\x00\x00";

    struct StubPlugin {
        plugin: PluginId,
        extension: String,
        mimes: Vec<String>,
    }
    #[async_trait]
    impl PluginParser for StubPlugin {
        fn plugin(&self) -> &PluginId {
            &self.plugin
        }
        fn extension(&self) -> &str {
            &self.extension
        }
        fn mime_types(&self) -> &[String] {
            &self.mimes
        }
        async fn parse(&self, _path: &Path, _data: &[u8]) -> Result<ParsedMetadata> {
            Ok(ParsedMetadata { title: Some("From plugin".into()), ..Default::default() })
        }
    }

    fn stub(extension: &str, mimes: &[&str]) -> Arc<StubPlugin> {
        Arc::new(StubPlugin {
            plugin: PluginId::new("test", "stub"),
            extension: extension.to_string(),
            mimes: mimes.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[test]
    fn test_plugin_cannot_claim_reserved_extension() {
        let mut registry = ParserRegistry::new();
        let err = registry.register_plugin(stub("EPUB", &[])).err().unwrap();
        assert_eq!(&*err, &ErrorKind::ReservedExtension("epub".into()));
        assert!(registry.register_plugin(stub("pdf", &[])).is_ok());
    }

    #[tokio::test]
    async fn test_native_parse_is_stamped_with_format_source() {
        let registry = ParserRegistry::filename_only();
        let parsed = registry.parse(Path::new("/lib/Book.EPUB"), b"").await.unwrap();
        assert_eq!(parsed.data_source, DataSource::EpubMetadata);
        assert!(registry.is_supported(Path::new("/lib/comic.cbz")));
        assert!(!registry.is_supported(Path::new("/lib/notes.txt")));
    }

    #[tokio::test]
    async fn test_plugin_parse_is_stamped_with_plugin_source() {
        let mut registry = ParserRegistry::new();
        registry.register_plugin(stub("cbr", &[])).unwrap();
        let parsed = registry.parse(Path::new("/lib/x.cbr"), b"anything").await.unwrap();
        assert_eq!(parsed.data_source, DataSource::plugin("test", "stub"));
        assert_eq!(parsed.title.as_deref(), Some("From plugin"));
    }

    #[tokio::test]
    async fn test_mime_mismatch_rejected_before_plugin_runs() {
        let mut registry = ParserRegistry::new();
        registry.register_plugin(stub("pdf", &["application/pdf"])).unwrap();
        let err = registry.parse(Path::new("/lib/x.pdf"), ZIP_MAGIC).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MimeMismatch { found, .. } if found == "application/zip"));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let registry = ParserRegistry::filename_only();
        let err = registry.parse(Path::new("/lib/x.txt"), b"").await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::UnsupportedExtension("txt".into()));
    }
}
