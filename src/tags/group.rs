//! group tag

use crate::{
    compiler::LaunchFile,
    condition,
    error::{ParseError, Result},
    ros,
    substitution::Scope,
    tags::optional_attr,
    xml::XmlEntity,
};
use std::collections::HashSet;
use std::path::PathBuf;

const SUPPORTED: &[&str] = &["ns", "clear_params"];

/// A scoped block. The body follows the same production rule as the
/// launch root, under an optionally extended namespace.
#[derive(Debug)]
pub struct GroupTag {
    launch: LaunchFile,
    ns: String,
    clear_params: bool,
}

impl GroupTag {
    pub fn from_entity(
        entity: &XmlEntity,
        scope: &Scope,
        file: &PathBuf,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, &file.display().to_string());

        let ns_attr = optional_attr(entity, "ns", scope)?;
        let ns = match &ns_attr {
            Some(ns) => ros::add_namespace(scope.namespace(), ns),
            None => scope.namespace().to_string(),
        };

        let clear_params = condition::bool_attribute(entity, "clear_params", false, true, scope)?;
        if clear_params && ns_attr.is_none() {
            return Err(ParseError::InvalidTag {
                element: "group".to_string(),
                reason: "'ns' attribute must be set in order to use 'clear_params'".to_string(),
            });
        }

        let mut group_scope = scope.child();
        group_scope.set_namespace(ns.clone());

        let launch = LaunchFile::from_body(entity, Some(file.clone()), group_scope, ancestors)?;

        Ok(Self {
            launch,
            ns,
            clear_params,
        })
    }

    pub fn launch(&self) -> &LaunchFile {
        &self.launch
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn clear_params(&self) -> bool {
        self.clear_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str, scope: &Scope) -> Result<GroupTag> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        GroupTag::from_entity(&entity, scope, &PathBuf::from("f"), &HashSet::new())
    }

    #[test]
    fn test_group_extends_namespace() {
        let mut scope = Scope::new();
        scope.set_namespace("/parent");
        let group = parse(r#"<group ns="child"/>"#, &scope).unwrap();
        assert_eq!(group.namespace(), "/parent/child");
    }

    #[test]
    fn test_group_global_namespace() {
        let mut scope = Scope::new();
        scope.set_namespace("/parent");
        let group = parse(r#"<group ns="/global"/>"#, &scope).unwrap();
        assert_eq!(group.namespace(), "/global");
    }

    #[test]
    fn test_clear_params_requires_ns() {
        assert!(parse(r#"<group clear_params="true"/>"#, &Scope::new()).is_err());
        assert!(parse(r#"<group ns="x" clear_params="true"/>"#, &Scope::new()).is_ok());
    }

    #[test]
    fn test_group_body_compiled() {
        let group = parse(
            r#"<group ns="g"><node pkg="p" type="t" name="n"/></group>"#,
            &Scope::new(),
        )
        .unwrap();
        assert_eq!(group.launch().nodes()[0].resolved_name(), "/g/n");
    }
}
