//! Pattern analysis over hand-written `init(from:)` and `encode(to:)` bodies.
//!
//! Nothing here type-checks. The scans look for the token shapes people (and
//! the Swift generator) use to write tagged enums:
//!
//! ```text
//! let tag = try container.decode(String.self, forKey: .type)
//! switch tag {
//! case "text": self = .textBlock(try TextPayload(from: decoder))
//! default: self = .futureProof
//! }
//! ```
//!
//! and collect the tag-to-case mapping, the discriminator key and the payload
//! style. Whatever cannot be matched is reported, not guessed.

use std::collections::{BTreeMap, BTreeSet};

use wirekit_schema::{Discriminator, DiscriminatorStyle};

use crate::tokenizer::Token;
use crate::utils::unescape_swift_string;

/// One `case ...:` or `default:` arm of a `switch`.
#[derive(Debug)]
struct Arm<'a> {
    /// Text of the patterns before the colon: string literals or `.case` names.
    patterns:   Vec<&'a Token>,
    is_default: bool,
    body:       &'a [Token],
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodeScan {
    /// CodingKeys case the tag is read from.
    pub tag_key:         Option<String>,
    /// `(tag, case)` pairs in source order.
    pub tags:            Vec<(String, String)>,
    pub default_case:    Option<String>,
    /// Cases whose payload is decoded from the whole decoder.
    pub inline_cases:    BTreeSet<String>,
    /// Cases whose payload is decoded from a nested key.
    pub wrapped_cases:   BTreeSet<String>,
    pub single_value:    bool,
    /// A value matching no case throws instead of assigning one.
    pub rejects_unknown: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EncodeScan {
    pub tag_key:       Option<String>,
    /// `(tag, case)` pairs in source order.
    pub tags:          Vec<(String, String)>,
    pub inline_cases:  BTreeSet<String>,
    pub wrapped_cases: BTreeSet<String>,
}

/// What the scans recovered for one union.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanOutcome {
    pub discriminator:   Option<Discriminator>,
    /// Case name to wire tag.
    pub tags:            BTreeMap<String, String>,
    /// Cases that belong to a tagged union but got no tag.
    pub unmatched:       Vec<String>,
    pub untagged:        bool,
    pub rejects_unknown: bool,
}

impl ScanOutcome {
    pub fn is_tagged(&self) -> bool {
        self.discriminator.is_some()
    }
}

/// Inputs to `scan_union`.
pub struct UnionScan<'a> {
    pub cases:         &'a [String],
    /// Cases carrying a single wrapped payload; only these show the style.
    pub payload_cases: &'a BTreeSet<String>,
    pub fallback:      Option<&'a str>,
    pub decode_body:   Option<&'a [Token]>,
    pub encode_body:   Option<&'a [Token]>,
    /// CodingKeys case name to wire key.
    pub coding_keys:   &'a BTreeMap<String, String>,
}

pub fn scan_decode(body: &[Token]) -> DecodeScan {
    let mut scan = DecodeScan {
        single_value: body.iter().any(|t| t.is("singleValueContainer")),
        ..Default::default()
    };

    // The tag is read before the switch body opens, either into a local or
    // in the switch subject itself.
    let switch_at = body.iter().position(|t| t.is("switch"));
    let header_end = switch_at
        .and_then(|at| body[at..].iter().position(|t| t.is("{")).map(|open| at + open))
        .unwrap_or(body.len());
    scan.tag_key = find_string_decode_key(&body[..header_end]);

    let Some(switch_at) = switch_at else {
        // Untagged: every candidate returns early, so a throw is the no-match path.
        scan.rejects_unknown = scan.single_value && body.iter().any(|t| t.is("throw"));
        return scan;
    };

    for arm in switch_arms(&body[switch_at..]) {
        let Some(case) = assigned_case(arm.body) else {
            if arm.is_default && arm.body.iter().any(|t| t.is("throw")) {
                scan.rejects_unknown = true;
            }
            continue;
        };
        if arm.is_default {
            scan.default_case = Some(case);
            continue;
        }
        for pattern in arm.patterns.iter().filter(|t| t.is_string()) {
            scan.tags.push((unescape_swift_string(&pattern.text), case.clone()));
        }
        if contains_seq(arm.body, &["from", ":", "decoder"]) {
            scan.inline_cases.insert(case.clone());
        } else if contains_seq(arm.body, &["forKey", ":"]) {
            scan.wrapped_cases.insert(case.clone());
        }
    }
    scan
}

pub fn scan_encode(body: &[Token]) -> EncodeScan {
    let mut scan = EncodeScan::default();
    let Some(switch_at) = body.iter().position(|t| t.is("switch")) else {
        return scan;
    };

    for arm in switch_arms(&body[switch_at..]) {
        if arm.is_default {
            continue;
        }
        let cases: Vec<String> = arm
            .patterns
            .windows(2)
            .filter(|pair| pair[0].is(".") && pair[1].is_identifier())
            .map(|pair| pair[1].text.clone())
            .collect();
        let Some((tag, key)) = find_tag_encode(arm.body) else {
            continue;
        };
        if scan.tag_key.is_none() {
            scan.tag_key = Some(key);
        }
        let inline = contains_seq(arm.body, &["to", ":", "encoder"]);
        let wrapped = encodes_identifier_for_key(arm.body);
        for case in cases {
            scan.tags.push((tag.clone(), case.clone()));
            if inline {
                scan.inline_cases.insert(case);
            } else if wrapped {
                scan.wrapped_cases.insert(case);
            }
        }
    }
    scan
}

/// Combines both scans. Decode evidence wins; encode evidence fills gaps.
pub fn scan_union(input: &UnionScan<'_>) -> ScanOutcome {
    let decode = input.decode_body.map(scan_decode).unwrap_or_default();
    let encode = input.encode_body.map(scan_encode).unwrap_or_default();

    let tag_key = decode.tag_key.clone().or_else(|| encode.tag_key.clone());
    let Some(tag_key) = tag_key else {
        return ScanOutcome {
            untagged: decode.single_value,
            rejects_unknown: decode.rejects_unknown,
            ..Default::default()
        };
    };

    let mut tags = BTreeMap::new();
    let mut used = BTreeSet::new();
    for (tag, case) in decode.tags.iter().chain(encode.tags.iter()) {
        if !input.cases.contains(case) || tags.contains_key(case) || used.contains(tag) {
            continue;
        }
        used.insert(tag.clone());
        tags.insert(case.clone(), tag.clone());
    }

    let shows = |cases: &BTreeSet<String>| cases.iter().any(|case| input.payload_cases.contains(case));
    let wrapped = shows(&decode.wrapped_cases) || shows(&encode.wrapped_cases);
    let inline = shows(&decode.inline_cases) || shows(&encode.inline_cases);
    let style = if wrapped && !inline {
        DiscriminatorStyle::Wrapped
    } else {
        DiscriminatorStyle::Inline
    };

    let unmatched = input
        .cases
        .iter()
        .filter(|case| !tags.contains_key(*case) && input.fallback != Some(case.as_str()))
        .cloned()
        .collect();

    let field = input.coding_keys.get(&tag_key).cloned().unwrap_or(tag_key);
    ScanOutcome {
        discriminator: Some(Discriminator { field, style }),
        tags,
        unmatched,
        untagged: false,
        rejects_unknown: decode.rejects_unknown,
    }
}

/// The case assigned by `self = .name` inside an initializer body, if any.
pub fn assigned_case(body: &[Token]) -> Option<String> {
    body.windows(4)
        .find(|w| w[0].is("self") && w[1].is("=") && w[2].is(".") && w[3].is_identifier())
        .map(|w| w[3].text.clone())
}

/// `decode(String.self, forKey: .key)`
fn find_string_decode_key(tokens: &[Token]) -> Option<String> {
    tokens
        .windows(10)
        .find(|w| {
            w[0].is("decode")
                && w[1].is("(")
                && w[2].is("String")
                && w[3].is(".")
                && w[4].is("self")
                && w[5].is(",")
                && w[6].is("forKey")
                && w[7].is(":")
                && w[8].is(".")
                && w[9].is_identifier()
        })
        .map(|w| w[9].text.clone())
}

/// `encode("tag", forKey: .key)`
fn find_tag_encode(tokens: &[Token]) -> Option<(String, String)> {
    tokens
        .windows(8)
        .find(|w| {
            w[0].is("encode")
                && w[1].is("(")
                && w[2].is_string()
                && w[3].is(",")
                && w[4].is("forKey")
                && w[5].is(":")
                && w[6].is(".")
                && w[7].is_identifier()
        })
        .map(|w| (unescape_swift_string(&w[2].text), w[7].text.clone()))
}

/// `encode(payload, forKey: .key)` with a non-literal value.
fn encodes_identifier_for_key(tokens: &[Token]) -> bool {
    tokens.windows(5).any(|w| {
        w[0].is("encode") && w[1].is("(") && w[2].is_identifier() && w[3].is(",") && w[4].is("forKey")
    })
}

fn contains_seq(tokens: &[Token], seq: &[&str]) -> bool {
    tokens
        .windows(seq.len())
        .any(|w| w.iter().zip(seq).all(|(tok, text)| tok.is(text)))
}

/// Splits the first `switch { ... }` in `tokens` into its arms.
fn switch_arms(tokens: &[Token]) -> Vec<Arm<'_>> {
    let Some(open) = tokens.iter().position(|t| t.is("{")) else {
        return Vec::new();
    };

    let mut arms: Vec<Arm<'_>> = Vec::new();
    let mut depth = 0usize;
    let mut i = open + 1;
    let mut body_start = i;

    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.is("{") || tok.is("(") || tok.is("[") {
            depth += 1;
        } else if tok.is("}") || tok.is(")") || tok.is("]") {
            if depth == 0 {
                close_arm(&mut arms, tokens, body_start, i);
                return arms;
            }
            depth -= 1;
        } else if depth == 0 && (tok.is("case") || (tok.is("default") && tokens.get(i + 1).is_some_and(|t| t.is(":")))) {
            close_arm(&mut arms, tokens, body_start, i);
            let is_default = tok.is("default");
            let mut j = i + 1;
            let mut patterns = Vec::new();
            let mut nested = 0usize;
            while j < tokens.len() {
                let t = &tokens[j];
                if t.is("(") || t.is("[") {
                    nested += 1;
                } else if t.is(")") || t.is("]") {
                    nested = nested.saturating_sub(1);
                } else if nested == 0 && t.is(":") {
                    break;
                }
                patterns.push(t);
                j += 1;
            }
            arms.push(Arm { patterns, is_default, body: &[] });
            i = j + 1;
            body_start = i;
            continue;
        }
        i += 1;
    }
    close_arm(&mut arms, tokens, body_start, tokens.len());
    arms
}

fn close_arm<'a>(arms: &mut [Arm<'a>], tokens: &'a [Token], body_start: usize, end: usize) {
    if let Some(last) = arms.last_mut() {
        last.body = &tokens[body_start.min(end)..end];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_source;

    fn body(text: &str) -> Vec<Token> {
        tokenize_source(text).unwrap()
    }

    const INLINE_DECODE: &str = r#"
        let container = try decoder.container(keyedBy: CodingKeys.self)
        let tag = try container.decode(String.self, forKey: .type)
        switch tag {
        case "text":
            self = .textBlock(try TextPayload(from: decoder))
        case "image", "picture":
            self = .imageBlock(source: try container.decode(ImageSource.self, forKey: .source))
        default:
            self = .futureProof
        }
    "#;

    #[test]
    fn test_decode_scan_reads_tags_and_default() {
        let scan = scan_decode(&body(INLINE_DECODE));
        assert_eq!(scan.tag_key.as_deref(), Some("type"));
        assert_eq!(
            scan.tags,
            vec![
                ("text".to_string(), "textBlock".to_string()),
                ("image".to_string(), "imageBlock".to_string()),
                ("picture".to_string(), "imageBlock".to_string()),
            ]
        );
        assert_eq!(scan.default_case.as_deref(), Some("futureProof"));
        assert!(scan.inline_cases.contains("textBlock"));
        assert!(!scan.single_value);
        assert!(!scan.rejects_unknown);
    }

    #[test]
    fn test_throwing_default_rejects_unknown() {
        let scan = scan_decode(&body(
            r#"
            let container = try decoder.container(keyedBy: CodingKeys.self)
            let tag = try container.decode(String.self, forKey: .type)
            switch tag {
            case "text":
                self = .text(try TextPayload(from: decoder))
            default:
                throw DecodingError.dataCorruptedError(forKey: .type, in: container, debugDescription: "UnknownVariant(\(tag))")
            }
            "#,
        ));
        assert!(scan.rejects_unknown);
        assert_eq!(scan.default_case, None);

        let untagged = scan_decode(&body(
            r#"
            let container = try decoder.singleValueContainer()
            if let value = try? container.decode(String.self) {
                self = .text(value)
                return
            }
            throw DecodingError.dataCorruptedError(in: container, debugDescription: "no match")
            "#,
        ));
        assert!(untagged.rejects_unknown);
    }

    #[test]
    fn test_encode_scan_reads_tags() {
        let scan = scan_encode(&body(
            r#"
            var container = encoder.container(keyedBy: CodingKeys.self)
            switch self {
            case .textBlock(let payload):
                try container.encode("text", forKey: .kind)
                try container.encode(payload, forKey: .text)
            case .ping:
                try container.encode("ping", forKey: .kind)
            case .futureProof:
                throw EncodingError.invalidValue(self, .init(codingPath: [], debugDescription: "x"))
            }
            "#,
        ));
        assert_eq!(scan.tag_key.as_deref(), Some("kind"));
        assert_eq!(
            scan.tags,
            vec![("text".to_string(), "textBlock".to_string()), ("ping".to_string(), "ping".to_string())]
        );
        assert!(scan.wrapped_cases.contains("textBlock"));
    }

    #[test]
    fn test_scan_union_combines_and_reports_unmatched() {
        let decode = body(INLINE_DECODE);
        let cases = vec![
            "futureProof".to_string(),
            "imageBlock".to_string(),
            "textBlock".to_string(),
            "video".to_string(),
        ];
        let mut keys = BTreeMap::new();
        keys.insert("type".to_string(), "type".to_string());
        let payload_cases = BTreeSet::from(["textBlock".to_string()]);
        let outcome = scan_union(&UnionScan {
            cases:         &cases,
            payload_cases: &payload_cases,
            fallback:      Some("futureProof"),
            decode_body:   Some(&decode),
            encode_body:   None,
            coding_keys:   &keys,
        });
        assert_eq!(outcome.discriminator, Some(Discriminator::inline("type")));
        assert_eq!(outcome.tags["textBlock"], "text");
        assert_eq!(outcome.tags["imageBlock"], "image");
        assert_eq!(outcome.unmatched, vec!["video".to_string()]);
    }

    #[test]
    fn test_single_value_container_is_untagged() {
        let decode = body(
            r#"
            let container = try decoder.singleValueContainer()
            if let value = try? container.decode(String.self) { self = .text(value); return }
            self = .parts(try container.decode([Part].self))
            "#,
        );
        let cases = vec!["parts".to_string(), "text".to_string()];
        let outcome = scan_union(&UnionScan {
            cases:         &cases,
            payload_cases: &BTreeSet::new(),
            fallback:      None,
            decode_body:   Some(&decode),
            encode_body:   None,
            coding_keys:   &BTreeMap::new(),
        });
        assert!(outcome.untagged);
        assert!(!outcome.is_tagged());
    }

    #[test]
    fn test_assigned_case() {
        assert_eq!(assigned_case(&body("self = .text(value)")).as_deref(), Some("text"));
        assert_eq!(assigned_case(&body("return nil")), None);
    }
}
