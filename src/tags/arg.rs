//! arg tag

use crate::{
    error::{ParseError, Result},
    substitution::{resolve_str, Scope},
    tags::required_attr,
    xml::XmlEntity,
};

const SUPPORTED: &[&str] = &["name", "value", "default", "doc"];

/// A declared launch argument. `value` pins the binding; `default`
/// yields to a caller-supplied binding; neither means the argument is
/// required and must come from the caller. An unsatisfied required
/// arg stays unbound, so the launch only fails when something
/// actually references it.
#[derive(Debug, Clone)]
pub struct ArgTag {
    name: String,
    value: Option<String>,
    doc: Option<String>,
    has_value: bool,
    has_default: bool,
}

impl ArgTag {
    pub fn from_entity(entity: &XmlEntity, scope: &Scope, file: &str) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file);

        let name = required_attr(entity, "name", scope)?;

        let value_attr = entity.get_attr_str("value", true)?;
        let default_attr = entity.get_attr_str("default", true)?;
        let doc = entity.get_attr_str("doc", true)?;

        if value_attr.is_some() && default_attr.is_some() {
            return Err(ParseError::InvalidTag {
                element: "arg".to_string(),
                reason: format!("'{}' may only have one of 'value' or 'default'", name),
            });
        }

        let has_value = value_attr.is_some();
        let has_default = default_attr.is_some();

        let value = match (value_attr, default_attr) {
            // An explicit value always re-binds the name.
            (Some(v), None) => Some(resolve_str(&v, scope)?),
            // A default yields to an existing binding from the caller
            // or an outer scope.
            (None, Some(d)) => match scope.get_arg(&name) {
                Some(bound) => Some(bound.clone()),
                None => Some(resolve_str(&d, scope)?),
            },
            // Required argument: bound only when the caller set it.
            (None, None) => scope.get_arg(&name).cloned(),
            (Some(_), Some(_)) => unreachable!(),
        };

        Ok(Self {
            name,
            value,
            doc,
            has_value,
            has_default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Declared with `default`, i.e. the caller may override it.
    pub fn is_optional(&self) -> bool {
        self.has_default
    }

    /// Declared with neither `value` nor `default`: the caller must
    /// supply a binding.
    pub fn is_required(&self) -> bool {
        !self.has_value && !self.has_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str, scope: &Scope) -> Result<ArgTag> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        ArgTag::from_entity(&entity, scope, "test.launch")
    }

    #[test]
    fn test_arg_with_value() {
        let arg = parse(r#"<arg name="x" value="1"/>"#, &Scope::new()).unwrap();
        assert_eq!(arg.name(), "x");
        assert_eq!(arg.value(), Some("1"));
        assert!(!arg.is_optional());
        assert!(!arg.is_required());
    }

    #[test]
    fn test_arg_with_default() {
        let arg = parse(r#"<arg name="x" default="fallback"/>"#, &Scope::new()).unwrap();
        assert_eq!(arg.value(), Some("fallback"));
        assert!(arg.is_optional());
    }

    #[test]
    fn test_outer_binding_overrides_default() {
        let mut scope = Scope::new();
        scope.set_arg("x", "outer");
        let arg = parse(r#"<arg name="x" default="fallback"/>"#, &scope).unwrap();
        assert_eq!(arg.value(), Some("outer"));
    }

    #[test]
    fn test_value_ignores_outer_binding() {
        let mut scope = Scope::new();
        scope.set_arg("x", "outer");
        let arg = parse(r#"<arg name="x" value="pinned"/>"#, &scope).unwrap();
        assert_eq!(arg.value(), Some("pinned"));
    }

    #[test]
    fn test_value_and_default_conflict() {
        assert!(parse(r#"<arg name="x" value="1" default="2"/>"#, &Scope::new()).is_err());
    }

    #[test]
    fn test_required_arg_unbound_until_supplied() {
        let arg = parse(r#"<arg name="x"/>"#, &Scope::new()).unwrap();
        assert!(arg.is_required());
        assert_eq!(arg.value(), None);
    }

    #[test]
    fn test_required_arg_supplied_by_caller() {
        let mut scope = Scope::new();
        scope.set_arg("x", "supplied");
        let arg = parse(r#"<arg name="x"/>"#, &scope).unwrap();
        assert_eq!(arg.value(), Some("supplied"));
    }

    #[test]
    fn test_missing_name_fails() {
        assert!(parse(r#"<arg value="1"/>"#, &Scope::new()).is_err());
    }
}
