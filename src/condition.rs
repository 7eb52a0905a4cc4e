//! if/unless gating for launch tags

use crate::{
    error::{ParseError, Result},
    substitution::{resolve_str, Scope},
    xml::XmlEntity,
};

/// Evaluate the `if`/`unless` attributes of an entity. Both absent
/// means enabled; setting both at once is a parse error.
pub fn is_enabled(entity: &XmlEntity, scope: &Scope) -> Result<bool> {
    if entity.has_attr("if") && entity.has_attr("unless") {
        return Err(ParseError::IfUnlessConflict {
            element: entity.type_name().to_string(),
        });
    }

    let if_value = bool_attribute(entity, "if", true, false, scope)?;
    let unless_value = bool_attribute(entity, "unless", false, false, scope)?;

    Ok(if_value && !unless_value)
}

/// Get and validate a boolean attribute. The text must resolve to the
/// exact tokens `true` or `false` (case-insensitive); an empty string
/// is an error unless `allow_empty` is set.
pub fn bool_attribute(
    entity: &XmlEntity,
    attribute: &str,
    default: bool,
    allow_empty: bool,
    scope: &Scope,
) -> Result<bool> {
    let Some(raw) = entity.get_attr_str(attribute, true)? else {
        return Ok(default);
    };

    let resolved = resolve_str(&raw, scope)?;

    if resolved.is_empty() {
        if allow_empty {
            return Ok(false);
        }
        return Err(ParseError::EmptyBoolAttribute {
            element: entity.type_name().to_string(),
            attribute: attribute.to_string(),
        });
    }

    match resolved.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidBoolAttribute {
            element: entity.type_name().to_string(),
            attribute: attribute.to_string(),
            value: resolved,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_entity<R>(xml: &str, f: impl FnOnce(&XmlEntity) -> R) -> R {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        f(&entity)
    }

    #[test]
    fn test_enabled_by_default() {
        with_entity(r#"<node pkg="p" type="t" name="n"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).unwrap());
        });
    }

    #[test]
    fn test_if_true_enabled() {
        with_entity(r#"<group if="true"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).unwrap());
        });
    }

    #[test]
    fn test_if_false_disabled() {
        with_entity(r#"<group if="false"/>"#, |e| {
            assert!(!is_enabled(e, &Scope::new()).unwrap());
        });
    }

    #[test]
    fn test_unless_true_disabled() {
        with_entity(r#"<group unless="true"/>"#, |e| {
            assert!(!is_enabled(e, &Scope::new()).unwrap());
        });
    }

    #[test]
    fn test_both_if_and_unless_is_error() {
        with_entity(r#"<group if="true" unless="false"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).is_err());
        });
    }

    #[test]
    fn test_case_insensitive_tokens() {
        with_entity(r#"<group if="True"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).unwrap());
        });
        with_entity(r#"<group if="FALSE"/>"#, |e| {
            assert!(!is_enabled(e, &Scope::new()).unwrap());
        });
    }

    #[test]
    fn test_non_boolean_text_is_error() {
        with_entity(r#"<group if="yes"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).is_err());
        });
        with_entity(r#"<group if="1"/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).is_err());
        });
    }

    #[test]
    fn test_empty_boolean_is_error() {
        with_entity(r#"<group if=""/>"#, |e| {
            assert!(is_enabled(e, &Scope::new()).is_err());
        });
    }

    #[test]
    fn test_condition_from_substitution() {
        with_entity(r#"<group if="$(arg flag)"/>"#, |e| {
            let mut scope = Scope::new();
            scope.set_arg("flag", "true");
            assert!(is_enabled(e, &scope).unwrap());
        });
    }
}
