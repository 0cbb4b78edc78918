//! Property tests for tree evaluation and description aggregation.

use oximagic_core::endian::ByteOrder;
use oximagic_core::stream::MemoryCachingStream;
use oximagic_rules::matcher::{NumericMatcher, Width};
use oximagic_rules::{
    Analyzer, AnalyzerConfig, Context, Description, Locale, MatcherRegistry, RuleNode, SetProperty,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_numeric_matches_its_encoding(value: u16, little: bool) {
        let order = if little { ByteOrder::LittleEndian } else { ByteOrder::BigEndian };
        let bytes = match order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        let matcher = NumericMatcher::new(0, Width::Short, value as i64)
            .with_signed(false)
            .with_byte_order(order);
        let root = RuleNode::new()
            .with_matcher(matcher)
            .with_action(SetProperty::new("hit", true));

        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        prop_assert!(root.analyze(&mut ctx).unwrap());
        prop_assert!(ctx.finish().get("hit").is_some());
    }

    #[test]
    fn prop_first_matching_child_wins(accepts in proptest::collection::vec(any::<bool>(), 1..8)) {
        let mut root = RuleNode::new();
        for (index, &accept) in accepts.iter().enumerate() {
            // Matches iff the first byte equals 1.
            let expected = if accept { 1 } else { 0 };
            root.push_child(
                RuleNode::new()
                    .with_matcher(NumericMatcher::new(0, Width::Byte, expected))
                    .with_action(SetProperty::new("winner", index as i64)),
            );
        }

        let mut stream = MemoryCachingStream::from_bytes(vec![1]);
        let mut ctx = Context::new(&mut stream);
        prop_assert!(root.analyze(&mut ctx).unwrap());
        let winner = ctx.finish().get("winner").and_then(|v| v.as_i64());
        let expected = accepts.iter().position(|&a| a).map(|i| i as i64);
        prop_assert_eq!(winner, expected);
    }

    #[test]
    fn prop_extreme_offsets_and_ranges_never_fail(
        offset in prop_oneof![0u64..64, (u64::MAX - 8)..=u64::MAX, any::<u64>()],
        range in prop_oneof![0usize..64, (usize::MAX - 8)..=usize::MAX, any::<usize>()],
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let json = format!(
            r#"{{ "root": {{ "children": [
                {{ "name": "numeric",
                   "matchers": [{{ "type": "ulong", "offset": {offset}, "value": 0 }}],
                   "actions": [{{ "action": "property", "name": "hit", "value": "numeric" }}] }},
                {{ "name": "string",
                   "matchers": [{{ "type": "string", "offset": {offset}, "value": "ab" }}],
                   "actions": [{{ "action": "property", "name": "hit", "value": "string" }}] }},
                {{ "name": "regexp",
                   "matchers": [{{ "type": "regexp", "offset": {offset}, "range": {range},
                                  "flags": ["dot_all"], "value": "a" }}],
                   "actions": [{{ "action": "property", "name": "hit", "value": "regexp" }}] }},
                {{ "name": "text",
                   "matchers": [{{ "type": "ascii-text", "offset": {offset}, "range": {range} }}],
                   "actions": [{{ "action": "property", "name": "hit", "value": "text" }}] }}
            ] }} }}"#
        );
        let analyzer = Analyzer::from_json(&json, &MatcherRegistry::with_builtins()).unwrap();
        let props = analyzer.analyze_bytes(&data, &AnalyzerConfig::new());
        prop_assert!(props.is_ok(), "{:?}", props);

        // Past the end only the vacuous text check can accept.
        if offset >= data.len() as u64 {
            let hit = props.unwrap().get_str("hit").map(str::to_owned);
            prop_assert!(hit.is_none() || hit.as_deref() == Some("text"), "{:?}", hit);
        }
    }

    #[test]
    fn prop_description_groups_resolve_per_locale(
        entries in proptest::collection::vec(
            (prop_oneof![Just("default"), Just("en"), Just("de")], "[a-z]{1,6}"),
            0..12,
        ),
    ) {
        let mut description = Description::new();
        for (language, text) in &entries {
            description.append(language, text, false);
        }

        // Reference: split into groups at each default entry.
        let mut groups: Vec<Vec<(&str, &str)>> = Vec::new();
        for (language, text) in &entries {
            if *language == "default" || groups.is_empty() {
                groups.push(Vec::new());
            }
            if let Some(group) = groups.last_mut() {
                group.retain(|(l, _)| l != language);
                group.push((*language, text.as_str()));
            }
        }
        let pick = |group: &Vec<(&str, &str)>, language: &str| {
            group
                .iter()
                .find(|(l, _)| *l == language)
                .or_else(|| group.iter().find(|(l, _)| *l == "default"))
                .map(|(_, t)| t.to_string())
        };
        for language in ["en", "de", "fr"] {
            let parts: Vec<String> = groups.iter().filter_map(|g| pick(g, language)).collect();
            let expected = if parts.is_empty() { None } else { Some(parts.join(", ")) };
            prop_assert_eq!(description.resolve(&Locale::new(language)), expected);
        }
    }
}
