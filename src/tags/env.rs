//! env tag

use crate::{
    error::Result,
    substitution::Scope,
    tags::required_attr,
    xml::XmlEntity,
};

const SUPPORTED: &[&str] = &["name", "value"];

/// An environment variable override scoped to the enclosing block or
/// node.
#[derive(Debug, Clone)]
pub struct EnvTag {
    name: String,
    value: String,
}

impl EnvTag {
    pub fn from_entity(entity: &XmlEntity, scope: &Scope, file: &str) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file);

        Ok(Self {
            name: required_attr(entity, "name", scope)?,
            value: required_attr(entity, "value", scope)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_tag() {
        let doc = roxmltree::Document::parse(r#"<env name="VAR" value="val"/>"#).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        let env = EnvTag::from_entity(&entity, &Scope::new(), "f").unwrap();
        assert_eq!(env.name(), "VAR");
        assert_eq!(env.value(), "val");
    }

    #[test]
    fn test_env_requires_both_attributes() {
        let doc = roxmltree::Document::parse(r#"<env name="VAR"/>"#).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        assert!(EnvTag::from_entity(&entity, &Scope::new(), "f").is_err());
    }
}
