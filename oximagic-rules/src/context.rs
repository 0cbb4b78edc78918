//! Per-analysis state shared by matchers and actions.

use crate::result::{Properties, ResultBuilder};
use oximagic_core::stream::SeekableStream;
use std::error::Error;
use std::fmt;

/// Characters replaced by `_` in a stated filename.
const PATH_HOSTILE: &[char] = &[':', '\\', '/', '*', '?', '|', '<', '>'];

/// Language used when no locale is configured.
pub const DEFAULT_LOCALE: &str = "en";

/// Locale used to resolve localized descriptions.
///
/// Only the language part matters: `de_DE.UTF-8` and `de-AT` both resolve
/// to `de`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
}

impl Locale {
    /// Create a locale from a tag such as `en`, `de-DE` or `fr_FR.UTF-8`.
    pub fn new(tag: &str) -> Self {
        let language = tag
            .split(['_', '-', '.', '@'])
            .next()
            .map(str::trim)
            .filter(|language| !language.is_empty() && *language != "C" && *language != "POSIX")
            .unwrap_or(DEFAULT_LOCALE)
            .to_ascii_lowercase();
        Self { language }
    }

    /// Locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, else the default.
    pub fn from_env() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.is_empty())
            .map(|value| Self::new(&value))
            .unwrap_or_default()
    }

    /// Lowercase language code.
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)
    }
}

/// Observer for analysis diagnostics.
///
/// Listeners are purely observational; classification never depends on
/// whether one is attached.
pub trait DiagnosticListener: Send + Sync {
    /// Informational message.
    fn info(&self, source: &str, message: &str);

    /// Suspicious but recoverable condition.
    fn warning(&self, source: &str, message: &str);

    /// Failure with its cause.
    fn error(&self, source: &str, message: &str, cause: &dyn Error);
}

/// Listener forwarding diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl DiagnosticListener for TracingListener {
    fn info(&self, source: &str, message: &str) {
        tracing::info!(source, "{message}");
    }

    fn warning(&self, source: &str, message: &str) {
        tracing::warn!(source, "{message}");
    }

    fn error(&self, source: &str, message: &str, cause: &dyn Error) {
        tracing::error!(source, error = %cause, "{message}");
    }
}

/// Replace path-hostile characters in a stated filename with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if PATH_HOSTILE.contains(&c) { '_' } else { c })
        .collect()
}

/// Lowercased extension of a stated filename, after sanitizing.
///
/// Returns `None` when the name has no `.` or ends with one.
pub fn stated_extension(name: &str) -> Option<String> {
    let sanitized = sanitize_filename(name);
    let (_, extension) = sanitized.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}

/// State of one analysis: the stream, the result builder, the locale, an
/// optional listener and the stated extension hint.
///
/// The stream is borrowed; its lifetime belongs to the caller.
pub struct Context<'a> {
    stream: &'a mut dyn SeekableStream,
    result: ResultBuilder,
    locale: Locale,
    listener: Option<&'a dyn DiagnosticListener>,
    stated_extension: Option<String>,
}

impl<'a> Context<'a> {
    /// Create a context over `stream` with the default locale.
    pub fn new(stream: &'a mut dyn SeekableStream) -> Self {
        Self {
            stream,
            result: ResultBuilder::new(),
            locale: Locale::default(),
            listener: None,
            stated_extension: None,
        }
    }

    /// Set the locale used at finalization.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Attach a diagnostic listener.
    pub fn with_listener(mut self, listener: &'a dyn DiagnosticListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Record the caller-stated filename; only its extension is kept.
    pub fn with_stated_name(mut self, name: &str) -> Self {
        self.stated_extension = stated_extension(name);
        self
    }

    /// The stream under analysis.
    pub fn stream(&mut self) -> &mut (dyn SeekableStream + 'a) {
        &mut *self.stream
    }

    /// Results written so far.
    pub fn result(&self) -> &ResultBuilder {
        &self.result
    }

    /// Mutable access to the results, for actions.
    pub fn result_mut(&mut self) -> &mut ResultBuilder {
        &mut self.result
    }

    /// Locale of this analysis.
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Lowercased extension of the stated filename.
    pub fn stated_extension(&self) -> Option<&str> {
        self.stated_extension.as_deref()
    }

    /// Report an informational diagnostic to the listener, if any.
    pub fn info(&self, source: &str, message: &str) {
        if let Some(listener) = self.listener {
            listener.info(source, message);
        }
    }

    /// Report a warning to the listener, if any.
    pub fn warning(&self, source: &str, message: &str) {
        if let Some(listener) = self.listener {
            listener.warning(source, message);
        }
    }

    /// Report an error to the listener, if any.
    pub fn error(&self, source: &str, message: &str, cause: &dyn Error) {
        if let Some(listener) = self.listener {
            listener.error(source, message, cause);
        }
    }

    /// Resolve the results for this context's locale.
    pub fn finish(self) -> Properties {
        self.result.finalize(&self.locale)
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("position", &self.stream.position())
            .field("result", &self.result)
            .field("locale", &self.locale)
            .field("stated_extension", &self.stated_extension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oximagic_core::stream::MemoryCachingStream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DiagnosticListener for Recorder {
        fn info(&self, source: &str, message: &str) {
            self.events.lock().unwrap().push(format!("info {source}: {message}"));
        }

        fn warning(&self, source: &str, message: &str) {
            self.events.lock().unwrap().push(format!("warn {source}: {message}"));
        }

        fn error(&self, source: &str, message: &str, cause: &dyn Error) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error {source}: {message}: {cause}"));
        }
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!(Locale::new("de_DE.UTF-8").language(), "de");
        assert_eq!(Locale::new("pt-BR").language(), "pt");
        assert_eq!(Locale::new("EN").language(), "en");
        assert_eq!(Locale::new("C").language(), "en");
        assert_eq!(Locale::new("").language(), "en");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f|g<h>i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_filename("report.csv"), "report.csv");
    }

    #[test]
    fn test_stated_extension() {
        assert_eq!(stated_extension("Data.CSV").as_deref(), Some("csv"));
        assert_eq!(stated_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(stated_extension("dir.d/README"), Some("d_readme".to_string()));
        assert_eq!(stated_extension("noext"), None);
        assert_eq!(stated_extension("trailing."), None);
    }

    #[test]
    fn test_listener_receives_diagnostics() {
        let recorder = Recorder::default();
        let mut stream = MemoryCachingStream::from_bytes(Vec::new());
        let ctx = Context::new(&mut stream).with_listener(&recorder);
        ctx.info("node", "hello");
        ctx.warning("node", "careful");
        let cause = std::io::Error::other("boom");
        ctx.error("node", "failed", &cause);
        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "info node: hello".to_string(),
                "warn node: careful".to_string(),
                "error node: failed: boom".to_string(),
            ]
        );
    }

    #[test]
    fn test_finish_uses_locale() {
        let mut stream = MemoryCachingStream::from_bytes(Vec::new());
        let mut ctx = Context::new(&mut stream).with_locale(Locale::new("de"));
        ctx.result_mut()
            .append_description(crate::result::DESCRIPTION, "default", "Text", false);
        ctx.result_mut()
            .append_description(crate::result::DESCRIPTION, "de", "Textdatei", false);
        assert_eq!(ctx.finish().description(), Some("Textdatei"));
    }
}
