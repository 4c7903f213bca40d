use std::collections::BTreeSet;

use wirekit_schema::{
    DiscriminatorStyle, FieldDef, LiteralSugar, Schema, StringEnumDef, StructDef, TypeDefinition, TypeExpr,
    UnionDef, VariantPayload,
};

use crate::{
    error::WirekitError,
    utils::{is_identifier, quote},
};

/// Names the generated code itself relies on.
pub const RESERVED_NAMES: [&str; 2] = ["CodingKeys", "JSONValue"];

/// Returns `Ok(())` if verification passed, or `Err(WirekitError::VerifierError(_))` otherwise.
pub fn verify_schema(schema: &Schema) -> Result<(), WirekitError> {
    for (name, definition) in &schema.types {
        // 1) Type names must be usable as declarations
        if !is_identifier(name) {
            return Err(verifier_error(format!("The type name {} is not an identifier", quote(name))));
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(verifier_error(format!("The type name {} is reserved", quote(name))));
        }

        // 2) Kind-specific checks
        match definition {
            TypeDefinition::Struct(def) => verify_struct(name, def)?,
            TypeDefinition::StringEnum(def) => verify_string_enum(name, def)?,
            TypeDefinition::Union(def) => verify_union(name, def)?,
            TypeDefinition::Alias(def) => {
                if def.target.trim().is_empty() {
                    return Err(verifier_error(format!("The alias {} has an empty target", quote(name))));
                }
                parse_type(name, "target", &def.target)?;
            }
        }
    }
    Ok(())
}

fn verifier_error(msg: String) -> WirekitError {
    WirekitError::VerifierError(msg)
}

fn parse_type(type_name: &str, context: &str, ty: &str) -> Result<TypeExpr, WirekitError> {
    TypeExpr::parse(ty).map_err(|err| {
        verifier_error(format!("{} of {} has an invalid type: {}", quote(context), quote(type_name), err))
    })
}

fn verify_fields<'a>(
    type_name: &str,
    fields: impl IntoIterator<Item = (&'a String, &'a FieldDef)>,
) -> Result<(), WirekitError> {
    let mut wire_names = BTreeSet::new();
    for (name, field) in fields {
        if !is_identifier(name) {
            return Err(verifier_error(format!(
                "The field {} of {} is not an identifier",
                quote(name),
                quote(type_name)
            )));
        }
        parse_type(type_name, name, &field.ty)?;
        if !wire_names.insert(field.effective_wire_name(name)) {
            return Err(verifier_error(format!(
                "The wire name {} is used twice in {}",
                quote(field.effective_wire_name(name)),
                quote(type_name)
            )));
        }
    }
    Ok(())
}

fn verify_struct(name: &str, def: &StructDef) -> Result<(), WirekitError> {
    verify_fields(name, &def.fields)
}

fn verify_string_enum(name: &str, def: &StringEnumDef) -> Result<(), WirekitError> {
    let mut literals = BTreeSet::new();
    for (case, literal) in &def.values {
        if !is_identifier(case) {
            return Err(verifier_error(format!(
                "The case {} of {} is not an identifier",
                quote(case),
                quote(name)
            )));
        }
        if !literals.insert(literal) {
            return Err(verifier_error(format!("The value {} is used twice in {}", quote(literal), quote(name))));
        }
    }
    // The fallback case is appended by the generator, so it need not be in `values`.
    if let Some(fallback) = def.fallback_case() {
        if !is_identifier(fallback) {
            return Err(verifier_error(format!(
                "The fallback case {} of {} is not an identifier",
                quote(fallback),
                quote(name)
            )));
        }
    }
    Ok(())
}

fn verify_union(name: &str, def: &UnionDef) -> Result<(), WirekitError> {
    // 1) The fallback names an existing unit variant
    if let Some(fallback) = def.fallback_variant() {
        match def.variants.get(fallback) {
            None => {
                return Err(verifier_error(format!(
                    "The fallback variant {} is not a variant of {}",
                    quote(fallback),
                    quote(name)
                )))
            }
            Some(variant) if !variant.is_unit() => {
                return Err(verifier_error(format!(
                    "The fallback variant {} of {} must not carry a payload",
                    quote(fallback),
                    quote(name)
                )))
            }
            Some(_) => {}
        }
    }

    let mut tags = BTreeSet::new();
    let mut sugar = BTreeSet::new();
    let mut untagged_units = 0;
    for (variant_name, variant) in &def.variants {
        if !is_identifier(variant_name) {
            return Err(verifier_error(format!(
                "The variant {} of {} is not an identifier",
                quote(variant_name),
                quote(name)
            )));
        }

        // 2) Payload shape against the discriminator style
        match (&variant.payload, &def.discriminator) {
            (VariantPayload::Inline(_), None) => {
                return Err(verifier_error(format!(
                    "The variant {} of {} has inline fields but the union has no discriminator",
                    quote(variant_name),
                    quote(name)
                )))
            }
            (VariantPayload::Inline(_), Some(disc)) if disc.style == DiscriminatorStyle::Wrapped => {
                return Err(verifier_error(format!(
                    "The variant {} of {} has inline fields, which need the inline style",
                    quote(variant_name),
                    quote(name)
                )))
            }
            (VariantPayload::Inline(fields), Some(disc)) => {
                verify_fields(name, fields)?;
                if fields.iter().any(|(field, def)| def.effective_wire_name(field) == disc.field) {
                    return Err(verifier_error(format!(
                        "A field of variant {} in {} collides with the discriminator {}",
                        quote(variant_name),
                        quote(name),
                        quote(&disc.field)
                    )));
                }
            }
            (VariantPayload::Wrapped(ty), _) => {
                parse_type(name, variant_name, ty)?;
            }
            (VariantPayload::Unit, None) if !def.is_fallback(variant_name) && variant.tag.is_none() => {
                untagged_units += 1
            }
            (VariantPayload::Unit, _) => {}
        }

        // 3) Wire tags are unique within a discriminated or raw-valued union
        let tagged = def.discriminator.is_some() || variant.tag.is_some();
        if tagged && !def.is_fallback(variant_name) && !tags.insert(variant.wire_tag(variant_name)) {
            return Err(verifier_error(format!(
                "The tag {} is used twice in {}",
                quote(variant.wire_tag(variant_name)),
                quote(name)
            )));
        }

        // 4) Literal sugar wraps a payload of the matching shape
        if let Some(literal) = variant.literal {
            let shape_ok = match (&variant.payload, literal) {
                (VariantPayload::Wrapped(ty), LiteralSugar::String) => ty == "string",
                (VariantPayload::Wrapped(ty), LiteralSugar::Array) => {
                    matches!(TypeExpr::parse(ty), Ok(TypeExpr::List(_)))
                }
                _ => false,
            };
            if !shape_ok {
                return Err(verifier_error(format!(
                    "The {} literal of variant {} in {} needs a matching wrapped payload",
                    literal.as_str(),
                    quote(variant_name),
                    quote(name)
                )));
            }
            if !sugar.insert(literal.as_str()) {
                return Err(verifier_error(format!(
                    "More than one variant of {} takes a {} literal",
                    quote(name),
                    literal.as_str()
                )));
            }
        }
    }

    if let Some(disc) = &def.discriminator {
        if disc.field.is_empty() {
            return Err(verifier_error(format!("The discriminator of {} is empty", quote(name))));
        }
    }
    // 5) Without a discriminator, tags only make sense as raw values
    if def.discriminator.is_none()
        && def.variants.iter().any(|(variant, v)| v.tag.is_some() && !def.is_fallback(variant))
        && def.raw_value_type().is_none()
    {
        return Err(verifier_error(format!(
            "The untagged union {} mixes tagged variants with payloads or non-numeric tags",
            quote(name)
        )));
    }
    // 6) An untagged union can only recognize one null-like variant
    if untagged_units > 1 {
        return Err(verifier_error(format!(
            "The untagged union {} has more than one unit variant",
            quote(name)
        )));
    }
    Ok(())
}
