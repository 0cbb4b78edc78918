//! High-level analysis entry points.

use crate::context::{Context, DiagnosticListener, Locale};
use crate::database::RuleDatabase;
use crate::node::RuleNode;
use crate::registry::MatcherRegistry;
use crate::result::Properties;
use oximagic_core::config::StreamConfig;
use oximagic_core::error::Result;
use oximagic_core::reaper::Reaper;
use oximagic_core::stream::{MemoryCachingStream, RandomAccessFileStream, SeekableStream};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Rule database compiled into the crate.
pub const BUILTIN_RULES: &str = include_str!("../rules/default.json");

/// Options for a single analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    /// Locale for description resolution.
    pub locale: Locale,
    /// Caller-stated filename; only its extension is used.
    pub stated_name: Option<String>,
    /// Stream tuning for streams the analyzer opens itself.
    pub stream: StreamConfig,
}

impl AnalyzerConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Set the stated filename.
    pub fn with_stated_name(mut self, name: impl Into<String>) -> Self {
        self.stated_name = Some(name.into());
        self
    }

    /// Set the stream configuration.
    pub fn with_stream_config(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }
}

/// Runs a rule tree over streams.
///
/// Cloning is cheap; clones share the tree, so one analyzer can serve many
/// threads as long as each analysis has its own stream.
#[derive(Debug, Clone)]
pub struct Analyzer {
    root: Arc<RuleNode>,
}

impl Analyzer {
    /// Wrap an already built tree.
    pub fn new(root: RuleNode) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// Analyzer over the builtin rule database.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_RULES, &MatcherRegistry::with_builtins())
    }

    /// Build from a parsed database.
    pub fn from_database(database: &RuleDatabase, registry: &MatcherRegistry) -> Result<Self> {
        Ok(Self::new(database.build(registry)?))
    }

    /// Parse and build a JSON database.
    pub fn from_json(text: &str, registry: &MatcherRegistry) -> Result<Self> {
        Self::from_database(&RuleDatabase::from_json(text)?, registry)
    }

    /// Read, parse and build a JSON database file.
    pub fn from_path<P: AsRef<Path>>(path: P, registry: &MatcherRegistry) -> Result<Self> {
        Self::from_database(&RuleDatabase::from_path(path)?, registry)
    }

    /// Root of the rule tree.
    pub fn root(&self) -> &RuleNode {
        &self.root
    }

    /// Classify `stream`.
    ///
    /// Only stream contract violations are returned as errors; a matcher
    /// that fails to read just does not match.
    pub fn analyze(
        &self,
        stream: &mut dyn SeekableStream,
        config: &AnalyzerConfig,
    ) -> Result<Properties> {
        self.run(Context::new(stream), config)
    }

    /// Classify `stream`, reporting diagnostics to `listener`.
    pub fn analyze_with_listener(
        &self,
        stream: &mut dyn SeekableStream,
        config: &AnalyzerConfig,
        listener: &dyn DiagnosticListener,
    ) -> Result<Properties> {
        self.run(Context::new(stream).with_listener(listener), config)
    }

    fn run(&self, ctx: Context<'_>, config: &AnalyzerConfig) -> Result<Properties> {
        let mut ctx = ctx.with_locale(config.locale.clone());
        if let Some(name) = &config.stated_name {
            ctx = ctx.with_stated_name(name);
        }
        self.root.analyze(&mut ctx)?;
        Ok(ctx.finish())
    }

    /// Classify a forward-only reader through a memory cache.
    pub fn analyze_reader<R: Read>(&self, reader: R, config: &AnalyzerConfig) -> Result<Properties> {
        let mut stream = MemoryCachingStream::with_config(reader, &config.stream)?;
        let result = self.analyze(&mut stream, config);
        stream.close()?;
        result
    }

    /// Classify an in-memory buffer.
    pub fn analyze_bytes(&self, bytes: &[u8], config: &AnalyzerConfig) -> Result<Properties> {
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        self.analyze(&mut stream, config)
    }

    /// Classify a local file.
    ///
    /// The file name becomes the stated name unless `config` sets one. The
    /// file is closed before returning; failing to open it is an error.
    pub fn analyze_path<P: AsRef<Path>>(
        &self,
        path: P,
        reaper: Arc<dyn Reaper>,
        config: &AnalyzerConfig,
    ) -> Result<Properties> {
        let path = path.as_ref();
        let mut stream = RandomAccessFileStream::open_with_config(path, reaper, &config.stream)?;

        let stated;
        let config = match (&config.stated_name, path.file_name()) {
            (None, Some(name)) => {
                stated = config
                    .clone()
                    .with_stated_name(name.to_string_lossy().into_owned());
                &stated
            }
            _ => config,
        };

        let result = self.analyze(&mut stream, config);
        if let Err(e) = stream.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to close analyzed file");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SetMimeType;
    use crate::matcher::{NumericMatcher, Width};
    use oximagic_core::reaper::NoopReaper;
    use std::io::Write;

    #[test]
    fn test_builtin_loads() {
        let analyzer = Analyzer::builtin().unwrap();
        assert!(analyzer.root().node_count() > 20);
        assert_eq!(analyzer.root().name(), Some("root"));
    }

    #[test]
    fn test_analyze_bytes_and_reader_agree() {
        let analyzer = Analyzer::builtin().unwrap();
        let config = AnalyzerConfig::new();
        let data = b"GIF89a\x01\x00\x01\x00";
        let a = analyzer.analyze_bytes(data, &config).unwrap();
        let b = analyzer.analyze_reader(&data[..], &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mime_type(), Some("image/gif"));
        assert_eq!(a.get_str("version"), Some("89a"));
    }

    #[test]
    fn test_analyze_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"a,b,c\n1,2,3\n").unwrap();
        drop(file);

        let analyzer = Analyzer::builtin().unwrap();
        let props = analyzer
            .analyze_path(&path, NoopReaper::new(), &AnalyzerConfig::new())
            .unwrap();
        assert_eq!(props.mime_type(), Some("text/csv"));

        let props = analyzer
            .analyze_path(
                &path,
                NoopReaper::new(),
                &AnalyzerConfig::new().with_stated_name("table.txt"),
            )
            .unwrap();
        assert_eq!(props.mime_type(), Some("text/plain"));
    }

    #[test]
    fn test_missing_path_is_error() {
        let analyzer = Analyzer::new(RuleNode::new());
        let result = analyzer.analyze_path(
            "/nonexistent/oximagic/input",
            NoopReaper::new(),
            &AnalyzerConfig::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_tree() {
        let analyzer = Analyzer::new(
            RuleNode::new().with_child(
                RuleNode::new()
                    .with_matcher(NumericMatcher::new(0, Width::Short, 0x4D5A))
                    .with_action(SetMimeType("application/x-dosexec".into())),
            ),
        );
        let props = analyzer.analyze_bytes(b"MZ\x90\x00", &AnalyzerConfig::new()).unwrap();
        assert_eq!(props.mime_type(), Some("application/x-dosexec"));
    }
}
