//! XML entity abstraction

use crate::error::{ParseError, Result};

/// XML entity wrapping a roxmltree::Node
pub struct XmlEntity<'a, 'input> {
    node: roxmltree::Node<'a, 'input>,
}

impl<'a, 'input> XmlEntity<'a, 'input> {
    pub fn new(node: roxmltree::Node<'a, 'input>) -> Self {
        Self { node }
    }

    /// Get entity type name (e.g., "node", "arg")
    pub fn type_name(&self) -> &str {
        self.node.tag_name().name()
    }

    /// Get attribute as string
    pub fn get_attr_str(&self, name: &str, optional: bool) -> Result<Option<String>> {
        match self.node.attribute(name) {
            Some(value) => Ok(Some(value.to_string())),
            None if optional => Ok(None),
            None => Err(ParseError::MissingAttribute {
                element: self.type_name().to_string(),
                attribute: name.to_string(),
            }),
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.node.has_attribute(name)
    }

    /// Get all attributes as key-value pairs
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        self.node
            .attributes()
            .map(|attr| (attr.name(), attr.value()))
            .collect()
    }

    /// Get text content
    pub fn text(&self) -> Option<&str> {
        self.node.text()
    }

    /// Return an iterator over child elements
    pub fn children(&self) -> impl Iterator<Item = XmlEntity<'a, 'input>> {
        self.node
            .children()
            .filter(|n| n.is_element())
            .map(XmlEntity::new)
    }

    /// Warn about any attribute not in the supported set. Unknown
    /// attributes are not fatal.
    pub fn warn_unknown_attributes(&self, supported: &[&str], file: &str) {
        for (name, _) in self.attributes() {
            if !supported.contains(&name) && name != "if" && name != "unless" {
                log::warn!(
                    "[{}] unknown attribute '{}' on <{}> tag",
                    file,
                    name,
                    self.type_name()
                );
            }
        }
    }
}
