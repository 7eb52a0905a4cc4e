//! XML-RPC client for the master

use crate::error::RpcError;
use crate::ros;
use crate::rpc::value::{escape_xml, RpcValue};

const XML_HEADER: &str = r#"<?xml version="1.0"?>"#;
const CALLER_ID: &str = "rlaunch";

/// Client for the registry's parameter and state methods.
pub struct RegistryClient {
    uri: String,
    http: reqwest::blocking::Client,
}

impl RegistryClient {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue, RpcError> {
        let mut body = String::from(XML_HEADER);
        body.push_str("<methodCall><methodName>");
        body.push_str(&escape_xml(method));
        body.push_str("</methodName><params>");
        body.push_str(&format!(
            "<param><value><string>{}</string></value></param>",
            CALLER_ID
        ));
        for param in params {
            body.push_str("<param>");
            body.push_str(&param.to_xml());
            body.push_str("</param>");
        }
        body.push_str("</params></methodCall>");

        let response = self
            .http
            .post(&self.uri)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .map_err(|e| RpcError::Connection {
                uri: self.uri.clone(),
                reason: e.to_string(),
            })?;

        let text = response.text().map_err(|e| RpcError::Connection {
            uri: self.uri.clone(),
            reason: e.to_string(),
        })?;

        parse_response(&text)
    }

    /// Probe the registry; any well-formed reply means a master is
    /// answering at the URI.
    pub fn get_system_state(&self) -> Result<RpcValue, RpcError> {
        self.call("getSystemState", &[])
    }

    /// Fetch a parameter. Error statuses and incomplete responses
    /// decode to `None`; only transport failures are errors.
    pub fn get_param(&self, key: &str) -> Result<Option<RpcValue>, RpcError> {
        match self.call("getParam", &[RpcValue::Str(key.to_string())]) {
            Ok(value) => Ok(Some(value)),
            Err(RpcError::Connection { uri, reason }) => Err(RpcError::Connection { uri, reason }),
            Err(_) => Ok(None),
        }
    }

    pub fn has_param(&self, key: &str) -> Result<bool, RpcError> {
        let value = self.call("hasParam", &[RpcValue::Str(key.to_string())])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub fn set_param(&self, key: &str, value: &RpcValue) -> Result<(), RpcError> {
        self.call(
            "setParam",
            &[RpcValue::Str(key.to_string()), value.clone()],
        )?;
        Ok(())
    }

    pub fn delete_param(&self, key: &str) -> Result<(), RpcError> {
        self.call("deleteParam", &[RpcValue::Str(key.to_string())])?;
        Ok(())
    }

    /// Empty the subtree at `key`. Setting an empty struct deletes
    /// the parameter and everything under its namespace.
    pub fn clear_param(&self, key: &str) -> Result<(), RpcError> {
        self.set_param(key, &RpcValue::Struct(Vec::new()))
    }

    /// Set a YAML value. A mapping root fans out into one `setParam`
    /// per leaf under the joined namespace; anything else is a plain
    /// `setParam` at `name`.
    pub fn set_yaml_param(
        &self,
        name: &str,
        yaml: &serde_yaml::Value,
    ) -> Result<bool, RpcError> {
        if let serde_yaml::Value::Mapping(map) = yaml {
            let mut success = true;
            for (key, value) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{:?}", other),
                };
                let resolved = ros::join_namespace(name, &key);
                let ok = if value.is_mapping() {
                    self.set_yaml_param(&resolved, value)?
                } else {
                    match self.set_param(&resolved, &RpcValue::from_yaml(value)) {
                        Ok(()) => true,
                        Err(RpcError::Connection { uri, reason }) => {
                            return Err(RpcError::Connection { uri, reason })
                        }
                        Err(e) => {
                            log::error!("failed to set param {}: {}", resolved, e);
                            false
                        }
                    }
                };
                success &= ok;
            }
            Ok(success)
        } else {
            self.set_param(name, &RpcValue::from_yaml(yaml))?;
            Ok(true)
        }
    }
}

/// Parse a methodResponse body into the method-specific return value.
fn parse_response(body: &str) -> Result<RpcValue, RpcError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| RpcError::MalformedResponse(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(RpcError::MalformedResponse(
            "missing <methodResponse>".to_string(),
        ));
    }

    if let Some(fault) = root.children().find(|n| n.has_tag_name("fault")) {
        let detail: String = fault
            .descendants()
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(RpcError::Fault(detail));
    }

    let value = root
        .children()
        .find(|n| n.has_tag_name("params"))
        .and_then(|params| params.children().find(|n| n.has_tag_name("param")))
        .and_then(|param| param.children().find(|n| n.has_tag_name("value")))
        .ok_or_else(|| RpcError::MalformedResponse("missing <params>".to_string()))?;

    let decoded = RpcValue::from_xml(value)?;

    // Every reply is (status code, status message, return value).
    let RpcValue::List(items) = decoded else {
        return Err(RpcError::MalformedResponse(
            "response is not a 3-item array".to_string(),
        ));
    };
    if items.len() != 3 {
        return Err(RpcError::MalformedResponse(format!(
            "response array has {} items, expected 3",
            items.len()
        )));
    }

    let code = items[0]
        .as_i32()
        .ok_or_else(|| RpcError::MalformedResponse("status code is not an int".to_string()))?;
    let message = items[1].as_str().unwrap_or("").to_string();

    if code != 1 {
        return Err(RpcError::ErrorStatus(message));
    }

    Ok(items[2].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(inner: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><methodResponse><params><param>{}</param></params></methodResponse>",
            inner
        )
    }

    #[test]
    fn test_parse_success_response() {
        let body = wrap(
            "<value><array><data>\
             <value><int>1</int></value>\
             <value><string>ok</string></value>\
             <value><string>payload</string></value>\
             </data></array></value>",
        );
        let value = parse_response(&body).unwrap();
        assert_eq!(value, RpcValue::Str("payload".to_string()));
    }

    #[test]
    fn test_parse_error_status() {
        let body = wrap(
            "<value><array><data>\
             <value><int>-1</int></value>\
             <value><string>no such param</string></value>\
             <value><int>0</int></value>\
             </data></array></value>",
        );
        let err = parse_response(&body).unwrap_err();
        assert!(matches!(err, RpcError::ErrorStatus(msg) if msg == "no such param"));
    }

    #[test]
    fn test_parse_fault() {
        let body = "<?xml version=\"1.0\"?><methodResponse><fault>\
                    <value><struct><member><name>faultString</name>\
                    <value><string>boom</string></value></member></struct></value>\
                    </fault></methodResponse>";
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, RpcError::Fault(_)));
    }

    #[test]
    fn test_parse_wrong_arity() {
        let body = wrap(
            "<value><array><data>\
             <value><int>1</int></value>\
             </data></array></value>",
        );
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_response("not xml at all").is_err());
        assert!(parse_response("<other/>").is_err());
    }

    #[test]
    fn test_connection_error_on_dead_endpoint() {
        // Port 9 (discard) on localhost should refuse immediately.
        let client = RegistryClient::new("http://127.0.0.1:9/");
        let result = client.get_system_state();
        assert!(matches!(result, Err(RpcError::Connection { .. })));
    }
}
