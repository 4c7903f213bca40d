use std::{collections::BTreeMap, fs, path::Path};

use tempfile::TempDir;
use wirekit::{
    extract_directory, generate_to_directory, read_schema, write_schema, ExtractOptions, GenerateOptions, Schema,
    Strictness, TargetLanguage, WirekitError,
};
use wirekit_schema::{
    AliasDef, Direction, Discriminator, FieldDef, LiteralSugar, StringEnumDef, StructDef, TypeDefinition, UnionDef,
    UnknownHandling, VariantDef,
};

fn fallback() -> Option<UnknownHandling> {
    Some(UnknownHandling::Fallback("futureProof".into()))
}

/// One of every schema kind, each written in its canonical form.
fn sample_schema() -> Schema {
    let mut schema = Schema::new("acme");

    let mut usage = StructDef { doc: Some("Token accounting.\nReported per request.".into()), ..Default::default() };
    usage.fields.insert(
        "inputTokens".into(),
        FieldDef::new("int").with_wire_name("input_tokens").with_doc("Tokens in the prompt."),
    );
    usage.fields.insert("model".into(), FieldDef::new("string?"));
    usage.fields.insert("stop".into(), FieldDef::new("list[string]?"));
    usage.fields.insert("metadata".into(), FieldDef::new("map[string, any]"));
    usage
        .fields
        .insert("retries".into(), FieldDef { ty: "int".into(), wire_name: None, required: false, doc: None });
    schema.insert("Usage", TypeDefinition::Struct(usage));

    let mut text = StructDef::default();
    text.fields.insert("text".into(), FieldDef::new("string"));
    schema.insert("TextPayload", TypeDefinition::Struct(text));

    let mut function = StructDef { direction: Direction::Encode, ..Default::default() };
    function.fields.insert("name".into(), FieldDef::new("string"));
    schema.insert("FunctionChoice", TypeDefinition::Struct(function));

    let mut tier = StringEnumDef { direction: Direction::Decode, unknown_handling: fallback(), ..Default::default() };
    tier.values.insert("standard".into(), "standard".into());
    tier.values.insert("flexProcessing".into(), "flex_processing".into());
    schema.insert("ServiceTier", TypeDefinition::StringEnum(tier));

    let mut image = BTreeMap::new();
    image.insert("altText".to_string(), FieldDef::new("string?").with_wire_name("alt_text"));
    image.insert("url".to_string(), FieldDef::new("string"));
    let mut block = UnionDef {
        doc: Some("A block of content.".into()),
        discriminator: Some(Discriminator::inline("type")),
        unknown_handling: fallback(),
        ..Default::default()
    };
    block.variants.insert("textBlock".into(), VariantDef::wrapped("TextPayload").with_tag("text"));
    block.variants.insert("image".into(), VariantDef::inline(image).with_doc("An image by URL."));
    block.variants.insert("ping".into(), VariantDef::unit());
    block.variants.insert("futureProof".into(), VariantDef::unit());
    schema.insert("ContentBlock", TypeDefinition::Union(block));

    let mut choice = UnionDef {
        direction: Direction::Encode,
        discriminator: Some(Discriminator::wrapped("type")),
        ..Default::default()
    };
    choice.variants.insert("function".into(), VariantDef::wrapped("FunctionChoice"));
    choice.variants.insert("namedTool".into(), VariantDef::wrapped("string").with_tag("named_tool"));
    choice.variants.insert("auto".into(), VariantDef::unit());
    schema.insert("ToolChoice", TypeDefinition::Union(choice));

    let mut event = UnionDef {
        discriminator: Some(Discriminator::inline("type")),
        unknown_handling: Some(UnknownHandling::Error),
        ..Default::default()
    };
    event.variants.insert("ping".into(), VariantDef::unit().with_tag("ping"));
    event.variants.insert("text".into(), VariantDef::wrapped("TextPayload").with_tag("message"));
    schema.insert("Event", TypeDefinition::Union(event));

    let mut priority = UnionDef { unknown_handling: fallback(), ..Default::default() };
    priority.variants.insert("low".into(), VariantDef::unit().with_tag("1"));
    priority.variants.insert("high".into(), VariantDef::unit().with_tag("2").with_doc("Served first."));
    priority.variants.insert("futureProof".into(), VariantDef::unit());
    schema.insert("Priority", TypeDefinition::Union(priority));

    let mut content = UnionDef::default();
    content.variants.insert("text".into(), VariantDef::wrapped("string").with_literal(LiteralSugar::String));
    content
        .variants
        .insert("parts".into(), VariantDef::wrapped("list[TextPayload]").with_literal(LiteralSugar::Array));
    schema.insert("Content", TypeDefinition::Union(content));

    schema.insert(
        "OldUsage",
        TypeDefinition::Alias(AliasDef {
            target:     "Usage".into(),
            deprecated: true,
            doc:        Some("Kept for older callers.".into()),
        }),
    );
    schema
}

fn write_sources(dir: &Path, files: &[(&str, &str)]) {
    for (name, text) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
}

#[test]
fn test_generated_swift_extracts_to_the_same_schema() {
    let tmp = TempDir::new().unwrap();
    let schema = sample_schema();

    let written = generate_to_directory(&schema, TargetLanguage::Swift, &GenerateOptions::default(), tmp.path())
        .unwrap();
    assert_eq!(written.len(), schema.len());
    assert!(written.iter().all(|path| path.extension().is_some_and(|ext| ext == "swift")));

    let extracted = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();
    for (name, definition) in &schema.types {
        assert_eq!(extracted.get(name), Some(definition), "type {} changed across the round trip", name);
    }
    assert_eq!(extracted, schema);
}

#[test]
fn test_round_trip_keeps_wire_shapes() {
    let tmp = TempDir::new().unwrap();
    generate_to_directory(&sample_schema(), TargetLanguage::Swift, &GenerateOptions::default(), tmp.path()).unwrap();
    let extracted = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();

    let Some(TypeDefinition::Union(event)) = extracted.get("Event") else {
        panic!("expected Event to be a union");
    };
    assert_eq!(event.unknown_handling, Some(UnknownHandling::Error));
    assert_eq!(event.variants["text"].tag.as_deref(), Some("message"));

    let Some(TypeDefinition::Struct(usage)) = extracted.get("Usage") else {
        panic!("expected Usage to be a struct");
    };
    assert_eq!(usage.fields["retries"].ty, "int?");
    assert!(!usage.fields["retries"].required);

    let Some(TypeDefinition::Union(priority)) = extracted.get("Priority") else {
        panic!("expected Priority to be a union");
    };
    assert_eq!(priority.discriminator, None);
    assert_eq!(priority.variants["low"].tag.as_deref(), Some("1"));
    assert_eq!(priority.fallback_variant(), Some("futureProof"));
}

#[test]
fn test_generation_is_byte_stable() {
    let schema = sample_schema();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let options = GenerateOptions { prefix: Some("Acme".into()) };
    let a = generate_to_directory(&schema, TargetLanguage::Swift, &options, first.path()).unwrap();
    let b = generate_to_directory(&schema, TargetLanguage::Swift, &options, second.path()).unwrap();
    assert_eq!(a.len(), b.len());
    for (left, right) in a.iter().zip(&b) {
        assert_eq!(left.file_name(), right.file_name());
        assert_eq!(fs::read(left).unwrap(), fs::read(right).unwrap());
    }
    assert!(first.path().join("AcmeContentBlock.swift").exists());
}

#[test]
fn test_schema_document_round_trip_on_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/schema.yaml");
    let schema = sample_schema();
    write_schema(&path, &schema).unwrap();
    assert_eq!(read_schema(&path, Strictness::Strict).unwrap(), schema);

    let text = fs::read_to_string(&path).unwrap();
    write_schema(&path, &read_schema(&path, Strictness::Lenient).unwrap()).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn test_malformed_file_does_not_abort_extraction() {
    let tmp = TempDir::new().unwrap();
    write_sources(
        tmp.path(),
        &[
            ("Good.swift", "public struct Good: Codable {\n    public let id: String\n}\n"),
            ("Broken.swift", "public struct Broken: Codable {\n    public let id: String\n"),
            ("notes.txt", "struct Ignored: Codable { let x: Int }"),
        ],
    );
    let schema = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();
    assert!(schema.get("Good").is_some());
    assert!(schema.get("Broken").is_none());
    assert!(schema.get("Ignored").is_none());
}

#[cfg(unix)]
#[test]
fn test_unreadable_entry_does_not_abort_extraction() {
    let tmp = TempDir::new().unwrap();
    write_sources(tmp.path(), &[("Good.swift", "public struct Good: Codable {\n    public let id: String\n}\n")]);
    std::os::unix::fs::symlink(tmp.path().join("missing"), tmp.path().join("Dangling.swift")).unwrap();

    let schema = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();
    assert_eq!(schema.len(), 1);
    assert!(schema.get("Good").is_some());

    assert!(extract_directory(&tmp.path().join("absent"), &ExtractOptions::new("acme")).is_err());
}

#[test]
fn test_collisions_follow_path_order() {
    let tmp = TempDir::new().unwrap();
    write_sources(
        tmp.path(),
        &[
            ("a/Message.swift", "struct Message: Codable {\n    let first: String\n}\n"),
            ("b/Message.swift", "struct Message: Codable {\n    let second: Int\n}\n"),
        ],
    );

    for _ in 0..3 {
        let schema = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();
        match schema.get("Message") {
            Some(TypeDefinition::Struct(def)) => {
                assert!(def.fields.contains_key("second"));
                assert!(!def.fields.contains_key("first"));
            }
            other => panic!("expected a struct, got {:?}", other),
        }
    }

    let strict = ExtractOptions { strictness: Strictness::Strict, ..ExtractOptions::new("acme") };
    match extract_directory(tmp.path(), &strict) {
        Err(WirekitError::DuplicateType(name)) => assert_eq!(name, "Message"),
        other => panic!("expected DuplicateType, got {:?}", other),
    }
}

#[test]
fn test_strict_mode_rejects_unsupported_declarations() {
    let tmp = TempDir::new().unwrap();
    write_sources(
        tmp.path(),
        &[("Callback.swift", "struct Callback: Codable {\n    let handler: (Int) -> Void\n}\n")],
    );

    let lenient = extract_directory(tmp.path(), &ExtractOptions::new("acme")).unwrap();
    assert!(lenient.get("Callback").is_none());

    let strict = ExtractOptions { strictness: Strictness::Strict, ..ExtractOptions::new("acme") };
    assert!(matches!(
        extract_directory(tmp.path(), &strict),
        Err(WirekitError::DroppedDeclaration { name, .. }) if name == "Callback"
    ));
}

#[test]
fn test_unknown_language_is_rejected() {
    assert!(matches!(
        "kotlin".parse::<TargetLanguage>(),
        Err(WirekitError::UnsupportedLanguage(name)) if name == "kotlin"
    ));
}

#[test]
fn test_invalid_schema_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    let mut schema = Schema::new("acme");
    let mut def = UnionDef { unknown_handling: fallback(), ..Default::default() };
    def.variants.insert("text".into(), VariantDef::wrapped("string"));
    schema.insert("Broken", TypeDefinition::Union(def));

    assert!(matches!(
        generate_to_directory(&schema, TargetLanguage::Swift, &GenerateOptions::default(), &out),
        Err(WirekitError::VerifierError(_))
    ));
    assert!(!out.exists());
}
