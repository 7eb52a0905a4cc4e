//! XML entity layer

mod entity;

pub use entity::XmlEntity;

use crate::error::Result;

/// Parse an XML string and verify it is well formed.
pub fn parse_xml_string(input: &str) -> Result<()> {
    roxmltree::Document::parse(input)?;
    Ok(())
}
