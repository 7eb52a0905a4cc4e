//! param tag

use crate::{
    error::{ParseError, Result},
    ros,
    substitution::Scope,
    tags::{optional_attr, required_attr},
    xml::XmlEntity,
};
use std::process::Command;

const SUPPORTED: &[&str] = &["name", "type", "value", "textfile", "binfile", "command"];

/// A typed parameter value, validated at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i32),
    Double(f64),
    Bool(bool),
    Bin(Vec<u8>),
}

impl ParamValue {
    /// Parse a string as the named type. Type names accept the
    /// `str`/`string` and `bool`/`boolean` aliases.
    pub fn from_typed(type_name: &str, value: &str) -> std::result::Result<Self, String> {
        match type_name {
            "str" | "string" => Ok(ParamValue::Str(value.to_string())),
            "int" => value
                .parse::<i32>()
                .map(ParamValue::Int)
                .map_err(|_| format!("invalid 'int' type given: '{}'", value)),
            "double" => value
                .parse::<f64>()
                .map(ParamValue::Double)
                .map_err(|_| format!("invalid 'double' type given: '{}'", value)),
            "bool" | "boolean" => match value.to_lowercase().as_str() {
                "true" => Ok(ParamValue::Bool(true)),
                "false" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("invalid 'bool' type given: '{}'", value)),
            },
            other => Err(format!("invalid type attribute: '{}'", other)),
        }
    }

    /// Render for summary and dump output.
    pub fn display(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Double(d) => d.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Bin(bytes) => format!("<{} bytes of binary data>", bytes.len()),
        }
    }
}

/// A single parameter assignment on the registry.
#[derive(Debug, Clone)]
pub struct ParamTag {
    name: String,
    ns: String,
    value: ParamValue,
}

impl ParamTag {
    pub fn from_entity(
        entity: &XmlEntity,
        scope: &Scope,
        parent_ns: &str,
        file: &str,
    ) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file);

        let name = required_attr(entity, "name", scope)?;

        let value_attr = optional_attr(entity, "value", scope)?;
        let textfile_attr = optional_attr(entity, "textfile", scope)?;
        let binfile_attr = optional_attr(entity, "binfile", scope)?;
        let command_attr = optional_attr(entity, "command", scope)?;

        let sources = [&value_attr, &textfile_attr, &binfile_attr, &command_attr]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if sources != 1 {
            return Err(ParseError::InvalidTag {
                element: "param".to_string(),
                reason: "must have one and only one of value/textfile/binfile/command"
                    .to_string(),
            });
        }

        let type_name = optional_attr(entity, "type", scope)?.unwrap_or_else(|| "string".into());

        let value = if let Some(text) = value_attr {
            ParamValue::from_typed(&type_name, &text).map_err(|reason| ParseError::InvalidTag {
                element: "param".to_string(),
                reason: format!("'{}' {}", name, reason),
            })?
        } else if let Some(path) = textfile_attr {
            let path = ros::expand_user(&path);
            let content =
                std::fs::read_to_string(&path).map_err(|_| ParseError::InvalidTag {
                    element: "param".to_string(),
                    reason: format!("No such file or directory: {}", path.display()),
                })?;
            ParamValue::Str(content)
        } else if let Some(path) = binfile_attr {
            let path = ros::expand_user(&path);
            let bytes = std::fs::read(&path).map_err(|_| ParseError::InvalidTag {
                element: "param".to_string(),
                reason: format!("No such file or directory: {}", path.display()),
            })?;
            ParamValue::Bin(bytes)
        } else if let Some(command) = command_attr {
            ParamValue::Str(run_param_command(&command)?)
        } else {
            unreachable!()
        };

        Ok(Self {
            name,
            ns: parent_ns.to_string(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully resolved global name of the parameter.
    pub fn resolved_name(&self) -> String {
        ros::join_namespace(&self.ns, &self.name)
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }
}

/// Run an external program and capture its trimmed stdout.
fn run_param_command(command: &str) -> Result<String> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(ParseError::InvalidTag {
            element: "param".to_string(),
            reason: "invalid command: ''".to_string(),
        });
    };

    let output = Command::new(program)
        .args(parts)
        .output()
        .map_err(|e| ParseError::InvalidTag {
            element: "param".to_string(),
            reason: format!("invalid command: '{}': {}", command, e),
        })?;

    if !output.status.success() {
        return Err(ParseError::InvalidTag {
            element: "param".to_string(),
            reason: format!("invalid command: '{}'", command),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(xml: &str, ns: &str) -> Result<ParamTag> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        ParamTag::from_entity(&entity, &Scope::new(), ns, "f")
    }

    #[test]
    fn test_string_param_default_type() {
        let param = parse(r#"<param name="greeting" value="hello"/>"#, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Str("hello".to_string()));
        assert_eq!(param.resolved_name(), "/greeting");
    }

    #[test]
    fn test_int_param() {
        let param = parse(r#"<param name="rate" type="int" value="10"/>"#, "/ns").unwrap();
        assert_eq!(param.value(), &ParamValue::Int(10));
        assert_eq!(param.resolved_name(), "/ns/rate");
    }

    #[test]
    fn test_double_param() {
        let param = parse(r#"<param name="rate" type="double" value="1.5"/>"#, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Double(1.5));
    }

    #[test]
    fn test_bool_param_aliases() {
        let param = parse(r#"<param name="on" type="bool" value="true"/>"#, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Bool(true));
        let param = parse(r#"<param name="on" type="boolean" value="false"/>"#, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Bool(false));
    }

    #[test]
    fn test_bad_int_value() {
        assert!(parse(r#"<param name="rate" type="int" value="abc"/>"#, "").is_err());
    }

    #[test]
    fn test_unknown_type() {
        assert!(parse(r#"<param name="x" type="float" value="1"/>"#, "").is_err());
    }

    #[test]
    fn test_value_source_exclusivity() {
        assert!(parse(r#"<param name="x" value="1" command="echo hi"/>"#, "").is_err());
        assert!(parse(r#"<param name="x"/>"#, "").is_err());
    }

    #[test]
    fn test_textfile_param() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file contents").unwrap();
        file.flush().unwrap();

        let xml = format!(
            r#"<param name="data" textfile="{}"/>"#,
            file.path().display()
        );
        let param = parse(&xml, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Str("file contents".to_string()));
    }

    #[test]
    fn test_textfile_missing_file() {
        assert!(parse(r#"<param name="x" textfile="/no/such/file"/>"#, "").is_err());
    }

    #[test]
    fn test_binfile_param() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8, 1, 2, 255]).unwrap();
        file.flush().unwrap();

        let xml = format!(r#"<param name="blob" binfile="{}"/>"#, file.path().display());
        let param = parse(&xml, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Bin(vec![0, 1, 2, 255]));
    }

    #[test]
    fn test_command_param() {
        let param = parse(r#"<param name="out" command="echo hello"/>"#, "").unwrap();
        assert_eq!(param.value(), &ParamValue::Str("hello".to_string()));
    }

    #[test]
    fn test_failing_command() {
        assert!(parse(r#"<param name="out" command="false"/>"#, "").is_err());
    }
}
