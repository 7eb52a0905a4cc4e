//! XML-RPC value codec

use crate::error::RpcError;
use crate::tags::ParamValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// A value in the registry's wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Bool(bool),
    Int(i32),
    Double(f64),
    Str(String),
    List(Vec<RpcValue>),
    Struct(Vec<(String, RpcValue)>),
    Binary(Vec<u8>),
}

/// Escape the five XML-special characters in string content.
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

impl RpcValue {
    /// Encode as a `<value>...</value>` element.
    pub fn to_xml(&self) -> String {
        match self {
            RpcValue::Bool(b) => {
                format!("<value><boolean>{}</boolean></value>", if *b { 1 } else { 0 })
            }
            RpcValue::Int(i) => format!("<value><int>{}</int></value>", i),
            RpcValue::Double(d) => format!("<value><double>{}</double></value>", d),
            RpcValue::Str(s) => format!("<value><string>{}</string></value>", escape_xml(s)),
            RpcValue::List(items) => {
                let mut xml = String::from("<value><array><data>");
                for item in items {
                    xml.push_str(&item.to_xml());
                }
                xml.push_str("</data></array></value>");
                xml
            }
            RpcValue::Struct(members) => {
                let mut xml = String::from("<value><struct>");
                for (name, value) in members {
                    xml.push_str("<member><name>");
                    xml.push_str(&escape_xml(name));
                    xml.push_str("</name>");
                    xml.push_str(&value.to_xml());
                    xml.push_str("</member>");
                }
                xml.push_str("</struct></value>");
                xml
            }
            RpcValue::Binary(bytes) => {
                format!("<value><base64>{}</base64></value>", BASE64.encode(bytes))
            }
        }
    }

    /// Decode a `<value>` element.
    pub fn from_xml(value_node: roxmltree::Node) -> Result<Self, RpcError> {
        let typed = value_node.children().find(|n| n.is_element());

        let Some(typed) = typed else {
            // A bare <value>text</value> is a string per the XML-RPC
            // default typing rule.
            return Ok(RpcValue::Str(value_node.text().unwrap_or("").to_string()));
        };

        let text = typed.text().unwrap_or("");
        match typed.tag_name().name() {
            "boolean" => match text.trim() {
                "1" => Ok(RpcValue::Bool(true)),
                "0" => Ok(RpcValue::Bool(false)),
                other => Err(RpcError::MalformedResponse(format!(
                    "invalid boolean: {}",
                    other
                ))),
            },
            "int" | "i4" => text
                .trim()
                .parse::<i32>()
                .map(RpcValue::Int)
                .map_err(|_| RpcError::MalformedResponse(format!("invalid int: {}", text))),
            "double" => text
                .trim()
                .parse::<f64>()
                .map(RpcValue::Double)
                .map_err(|_| RpcError::MalformedResponse(format!("invalid double: {}", text))),
            "string" => Ok(RpcValue::Str(text.to_string())),
            "base64" => BASE64
                .decode(text.trim())
                .map(RpcValue::Binary)
                .map_err(|_| RpcError::MalformedResponse("invalid base64".to_string())),
            "array" => {
                let data = typed
                    .children()
                    .find(|n| n.has_tag_name("data"))
                    .ok_or_else(|| {
                        RpcError::MalformedResponse("array without <data>".to_string())
                    })?;
                let mut items = Vec::new();
                for child in data.children().filter(|n| n.has_tag_name("value")) {
                    items.push(RpcValue::from_xml(child)?);
                }
                Ok(RpcValue::List(items))
            }
            "struct" => {
                let mut members = Vec::new();
                for member in typed.children().filter(|n| n.has_tag_name("member")) {
                    let name = member
                        .children()
                        .find(|n| n.has_tag_name("name"))
                        .and_then(|n| n.text())
                        .unwrap_or("")
                        .to_string();
                    let value = member
                        .children()
                        .find(|n| n.has_tag_name("value"))
                        .ok_or_else(|| {
                            RpcError::MalformedResponse("member without <value>".to_string())
                        })?;
                    members.push((name, RpcValue::from_xml(value)?));
                }
                Ok(RpcValue::Struct(members))
            }
            other => Err(RpcError::MalformedResponse(format!(
                "unknown value type: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            RpcValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RpcValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a YAML scalar or sequence. Mappings are handled a
    /// level up by the per-leaf fan-out.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Bool(b) => RpcValue::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RpcValue::Int(i as i32)
                } else {
                    RpcValue::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_yaml::Value::String(s) => RpcValue::Str(s.clone()),
            serde_yaml::Value::Sequence(seq) => {
                RpcValue::List(seq.iter().map(RpcValue::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => RpcValue::Struct(
                map.iter()
                    .map(|(k, v)| {
                        let key = match k {
                            serde_yaml::Value::String(s) => s.clone(),
                            other => format!("{:?}", other),
                        };
                        (key, RpcValue::from_yaml(v))
                    })
                    .collect(),
            ),
            serde_yaml::Value::Null => RpcValue::Str(String::new()),
            serde_yaml::Value::Tagged(tagged) => RpcValue::from_yaml(&tagged.value),
        }
    }
}

impl From<&ParamValue> for RpcValue {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Str(s) => RpcValue::Str(s.clone()),
            ParamValue::Int(i) => RpcValue::Int(*i),
            ParamValue::Double(d) => RpcValue::Double(*d),
            ParamValue::Bool(b) => RpcValue::Bool(*b),
            ParamValue::Bin(bytes) => RpcValue::Binary(bytes.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: RpcValue) {
        let xml = value.to_xml();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let decoded = RpcValue::from_xml(doc.root_element()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_round_trip_scalars() {
        round_trip(RpcValue::Bool(true));
        round_trip(RpcValue::Bool(false));
        round_trip(RpcValue::Int(-42));
        round_trip(RpcValue::Double(2.75));
        round_trip(RpcValue::Str("plain".to_string()));
    }

    #[test]
    fn test_round_trip_special_chars_preserved() {
        round_trip(RpcValue::Str(r#"a & b < c > d " e ' f"#.to_string()));
    }

    #[test]
    fn test_round_trip_list() {
        round_trip(RpcValue::List(vec![
            RpcValue::Int(1),
            RpcValue::Str("two".to_string()),
            RpcValue::Bool(false),
        ]));
    }

    #[test]
    fn test_round_trip_struct() {
        round_trip(RpcValue::Struct(vec![
            ("a".to_string(), RpcValue::Int(1)),
            (
                "nested".to_string(),
                RpcValue::Struct(vec![("b".to_string(), RpcValue::Str("x".to_string()))]),
            ),
        ]));
    }

    #[test]
    fn test_round_trip_binary() {
        round_trip(RpcValue::Binary(vec![0, 1, 2, 254, 255]));
    }

    #[test]
    fn test_escaping_in_encoded_xml() {
        let xml = RpcValue::Str("a<b&c".to_string()).to_xml();
        assert_eq!(xml, "<value><string>a&lt;b&amp;c</string></value>");
    }

    #[test]
    fn test_boolean_encodes_as_digit() {
        assert_eq!(
            RpcValue::Bool(true).to_xml(),
            "<value><boolean>1</boolean></value>"
        );
    }

    #[test]
    fn test_bare_value_text_is_string() {
        let doc = roxmltree::Document::parse("<value>bare text</value>").unwrap();
        let decoded = RpcValue::from_xml(doc.root_element()).unwrap();
        assert_eq!(decoded, RpcValue::Str("bare text".to_string()));
    }

    #[test]
    fn test_i4_alias() {
        let doc = roxmltree::Document::parse("<value><i4>7</i4></value>").unwrap();
        let decoded = RpcValue::from_xml(doc.root_element()).unwrap();
        assert_eq!(decoded, RpcValue::Int(7));
    }

    #[test]
    fn test_empty_struct() {
        round_trip(RpcValue::Struct(Vec::new()));
    }

    #[test]
    fn test_from_yaml_scalars() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("5").unwrap();
        assert_eq!(RpcValue::from_yaml(&yaml), RpcValue::Int(5));
        let yaml: serde_yaml::Value = serde_yaml::from_str("hi").unwrap();
        assert_eq!(RpcValue::from_yaml(&yaml), RpcValue::Str("hi".to_string()));
        let yaml: serde_yaml::Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert_eq!(
            RpcValue::from_yaml(&yaml),
            RpcValue::List(vec![RpcValue::Int(1), RpcValue::Int(2)])
        );
    }
}
