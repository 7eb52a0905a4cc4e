//! remap tag

use crate::{
    error::{ParseError, Result},
    substitution::Scope,
    tags::required_attr,
    xml::XmlEntity,
};

const SUPPORTED: &[&str] = &["from", "to"];

/// A channel remapping passed to child processes as `from:=to`.
#[derive(Debug, Clone)]
pub struct RemapTag {
    from: String,
    to: String,
}

impl RemapTag {
    pub fn from_entity(entity: &XmlEntity, scope: &Scope, file: &str) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file);

        let from = required_attr(entity, "from", scope)?;
        let to = required_attr(entity, "to", scope)?;

        if from.is_empty() || to.is_empty() {
            return Err(ParseError::InvalidTag {
                element: "remap".to_string(),
                reason: "'from' and 'to' must be non-empty".to_string(),
            });
        }

        Ok(Self { from, to })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }
}
