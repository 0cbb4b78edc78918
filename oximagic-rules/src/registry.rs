//! Matcher type registry.
//!
//! Rule databases refer to matchers by tag. The registry maps each tag to a
//! factory that validates a [`MatcherSpec`] and builds the matcher. Tags are
//! resolved once, when the tree is built; an unknown tag is a load error.

use crate::database::MatcherSpec;
use crate::matcher::{
    AsciiTextMatcher, DEFAULT_RANGE, DEFAULT_TEXT_RANGE, ExtensionMatcher, Matcher,
    NumericMatcher, RegexpFlags, RegexpMatcher, StringMatcher, Width,
};
use oximagic_core::error::{OxiMagicError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Builds a matcher from its database entry.
pub type MatcherFactory = Box<dyn Fn(&MatcherSpec) -> Result<Box<dyn Matcher>> + Send + Sync>;

/// Numeric tags: (tag, width, signed).
const NUMERIC_TAGS: &[(&str, Width, bool)] = &[
    ("byte", Width::Byte, true),
    ("ubyte", Width::Byte, false),
    ("short", Width::Short, true),
    ("ushort", Width::Short, false),
    ("word", Width::Short, true),
    ("long", Width::Long, true),
    ("ulong", Width::Long, false),
    ("dword", Width::Long, true),
    ("date", Width::Long, true),
];

/// Tag to factory map.
pub struct MatcherRegistry {
    factories: BTreeMap<String, MatcherFactory>,
}

impl MatcherRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with the builtin matchers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for &(tag, width, signed) in NUMERIC_TAGS {
            registry.register(tag, move |spec| numeric(spec, width, signed));
        }
        registry.register("string", string);
        registry.register("regexp", regexp);
        registry.register("ascii-text", ascii_text);
        registry.register("extension", extension);
        registry
    }

    /// Register `factory` under `tag`, replacing any previous entry.
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn(&MatcherSpec) -> Result<Box<dyn Matcher>> + Send + Sync + 'static,
    {
        self.factories.insert(tag.into(), Box::new(factory));
    }

    /// Whether `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the matcher described by `spec`.
    pub fn build(&self, spec: &MatcherSpec) -> Result<Box<dyn Matcher>> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| OxiMagicError::unknown_matcher(spec.kind.clone()))?;
        factory(spec)
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags()).finish()
    }
}

fn numeric(spec: &MatcherSpec, width: Width, signed: bool) -> Result<Box<dyn Matcher>> {
    let mut matcher = NumericMatcher::new(spec.offset, width, spec.value_literal()?)
        .with_signed(signed)
        .with_byte_order(spec.byte_order()?)
        .with_comparison(spec.comparison()?);
    if let Some(mask) = spec.mask_literal()? {
        matcher = matcher.with_mask(mask);
    }
    Ok(Box::new(matcher))
}

fn string(spec: &MatcherSpec) -> Result<Box<dyn Matcher>> {
    Ok(Box::new(StringMatcher::new(
        spec.offset,
        &spec.value_text()?,
        spec.charset()?,
    )?))
}

fn regexp(spec: &MatcherSpec) -> Result<Box<dyn Matcher>> {
    let mut flags = RegexpFlags::default();
    for flag in &spec.flags {
        flags.set(flag)?;
    }
    Ok(Box::new(RegexpMatcher::with_options(
        spec.offset,
        &spec.value_text()?,
        flags,
        spec.charset()?,
        spec.range.unwrap_or(DEFAULT_RANGE),
        spec.comparison()?,
    )?))
}

fn ascii_text(spec: &MatcherSpec) -> Result<Box<dyn Matcher>> {
    Ok(Box::new(AsciiTextMatcher::new(
        spec.offset,
        spec.range.unwrap_or(DEFAULT_TEXT_RANGE),
    )))
}

fn extension(spec: &MatcherSpec) -> Result<Box<dyn Matcher>> {
    let mut extensions = spec.extensions.clone();
    if spec.value.is_some() {
        extensions.push(spec.value_text()?);
    }
    if extensions.is_empty() {
        return Err(OxiMagicError::invalid_rule(
            "extension matcher needs `extensions` or `value`",
        ));
    }
    Ok(Box::new(
        ExtensionMatcher::new(extensions).with_comparison(spec.comparison()?)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use oximagic_core::stream::MemoryCachingStream;

    fn check(matcher: &dyn Matcher, bytes: &[u8]) -> bool {
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        matcher.matches(&mut ctx).unwrap()
    }

    #[test]
    fn test_builtin_tags() {
        let registry = MatcherRegistry::with_builtins();
        for tag in [
            "byte", "ubyte", "short", "ushort", "word", "long", "ulong", "dword", "date",
            "string", "regexp", "ascii-text", "extension",
        ] {
            assert!(registry.contains(tag), "{tag}");
        }
        assert!(!registry.contains("ole2"));
    }

    #[test]
    fn test_numeric_from_spec() {
        let registry = MatcherRegistry::with_builtins();
        let mut spec = MatcherSpec::new("ulong", 0).with_value("0x0100");
        spec.byte_order = Some("little".into());
        spec.mask = Some(serde_json::json!("0xFFFF"));
        let matcher = registry.build(&spec).unwrap();
        assert!(check(matcher.as_ref(), &[0x00, 0x01, 0xAA, 0xBB]));

        spec.byte_order = Some("middle".into());
        assert!(registry.build(&spec).is_err());
    }

    #[test]
    fn test_native_order_is_big_endian() {
        let registry = MatcherRegistry::with_builtins();
        let mut spec = MatcherSpec::new("ushort", 0).with_value(0x0102);
        spec.byte_order = Some("native".into());
        let matcher = registry.build(&spec).unwrap();
        assert!(check(matcher.as_ref(), &[0x01, 0x02]));
    }

    #[test]
    fn test_regexp_from_spec() {
        let registry = MatcherRegistry::with_builtins();
        let mut spec = MatcherSpec::new("regexp", 0).with_value("<svg");
        spec.flags = vec!["case_insensitive".into(), "dot_all".into()];
        spec.range = Some(64);
        let matcher = registry.build(&spec).unwrap();
        assert!(check(matcher.as_ref(), b"<?xml version=\"1.0\"?>\n<SVG xmlns=\"\">"));

        spec.comparison = Some(">".into());
        assert!(registry.build(&spec).is_err());
    }

    #[test]
    fn test_extension_needs_values() {
        let registry = MatcherRegistry::with_builtins();
        assert!(registry.build(&MatcherSpec::new("extension", 0)).is_err());
        let spec = MatcherSpec::new("extension", 0).with_value("csv");
        assert!(registry.build(&spec).is_ok());

        let mut ordered = spec.clone();
        ordered.comparison = Some(">".into());
        assert!(registry.build(&ordered).is_err());
    }

    #[test]
    fn test_extreme_offsets_and_ranges_build_and_miss() {
        let registry = MatcherRegistry::with_builtins();
        let mut regexp = MatcherSpec::new("regexp", 0).with_value("abc");
        regexp.range = Some(usize::MAX);
        let mut text = MatcherSpec::new("ascii-text", 0);
        text.range = Some(usize::MAX);
        let far = MatcherSpec::new("ubyte", u64::MAX).with_value(0);
        let far_string = MatcherSpec::new("string", u64::MAX - 1).with_value("ab");

        assert!(check(registry.build(&regexp).unwrap().as_ref(), b"xxabcxx"));
        assert!(check(registry.build(&text).unwrap().as_ref(), b"plain"));
        for spec in [far, far_string] {
            let matcher = registry.build(&spec).unwrap();
            let mut stream = MemoryCachingStream::from_bytes(b"ab".to_vec());
            let mut ctx = Context::new(&mut stream);
            match matcher.matches(&mut ctx) {
                Ok(hit) => assert!(!hit),
                Err(e) => assert!(e.is_eof(), "{e}"),
            }
        }
    }

    #[test]
    fn test_custom_matcher() {
        #[derive(Debug)]
        struct Longer(u64);

        impl Matcher for Longer {
            fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
                Ok(ctx.stream().length().is_some_and(|len| len > self.0))
            }
        }

        let mut registry = MatcherRegistry::new();
        registry.register("longer", |spec| {
            let min = spec
                .extra
                .get("min")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| OxiMagicError::invalid_rule("longer needs `min`"))?;
            Ok(Box::new(Longer(min)) as Box<dyn Matcher>)
        });

        let spec: MatcherSpec = serde_json::from_str(r#"{ "type": "longer", "min": 2 }"#).unwrap();
        let matcher = registry.build(&spec).unwrap();
        assert!(check(matcher.as_ref(), b"abc"));
        assert!(!check(matcher.as_ref(), b"ab"));

        let err = registry.build(&MatcherSpec::new("ubyte", 0)).unwrap_err();
        assert!(matches!(err, OxiMagicError::UnknownMatcher { .. }));
    }
}
