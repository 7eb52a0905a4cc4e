//! rosparam tag

use crate::{
    condition,
    error::{ParseError, Result},
    ros,
    substitution::{resolve_str, Scope},
    tags::optional_attr,
    xml::XmlEntity,
};

const SUPPORTED: &[&str] = &["command", "file", "param", "ns", "subst_value"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosParamCommand {
    Load,
    Dump,
    Delete,
}

/// A YAML-level parameter operation against the registry.
#[derive(Debug, Clone)]
pub struct RosParamTag {
    command: RosParamCommand,
    ns: String,
    param: Option<String>,
    file: Option<String>,
    yaml: Option<serde_yaml::Value>,
}

impl RosParamTag {
    pub fn from_entity(
        entity: &XmlEntity,
        scope: &Scope,
        parent_ns: &str,
        file_name: &str,
    ) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file_name);

        let command = match optional_attr(entity, "command", scope)?.as_deref() {
            None | Some("load") => RosParamCommand::Load,
            Some("dump") => RosParamCommand::Dump,
            Some("delete") => RosParamCommand::Delete,
            Some(other) => {
                return Err(ParseError::InvalidTag {
                    element: "rosparam".to_string(),
                    reason: format!("unknown 'command' value: {}", other),
                })
            }
        };

        let ns_attr = optional_attr(entity, "ns", scope)?;
        let ns = match ns_attr {
            Some(ns) => ros::add_namespace(parent_ns, &ns),
            None => parent_ns.to_string(),
        };

        let param = optional_attr(entity, "param", scope)?;
        let file = optional_attr(entity, "file", scope)?;
        let subst_value = condition::bool_attribute(entity, "subst_value", false, false, scope)?;

        match command {
            RosParamCommand::Delete => {
                if file.is_some() {
                    return Err(ParseError::InvalidTag {
                        element: "rosparam".to_string(),
                        reason: "'file' does not make sense for the 'delete' command"
                            .to_string(),
                    });
                }
                if param.is_none() {
                    return Err(ParseError::InvalidTag {
                        element: "rosparam".to_string(),
                        reason: "'delete' command requires the 'param' attribute".to_string(),
                    });
                }
                Ok(Self {
                    command,
                    ns,
                    param,
                    file: None,
                    yaml: None,
                })
            }
            RosParamCommand::Dump => {
                if file.is_none() {
                    return Err(ParseError::InvalidTag {
                        element: "rosparam".to_string(),
                        reason: "'dump' command requires the 'file' attribute".to_string(),
                    });
                }
                Ok(Self {
                    command,
                    ns,
                    param,
                    file,
                    yaml: None,
                })
            }
            RosParamCommand::Load => {
                let mut text = if let Some(ref path) = file {
                    let path = ros::expand_user(path);
                    std::fs::read_to_string(&path).map_err(|_| ParseError::InvalidTag {
                        element: "rosparam".to_string(),
                        reason: format!("No such file or directory: {}", path.display()),
                    })?
                } else {
                    entity.text().unwrap_or("").to_string()
                };

                if subst_value {
                    text = resolve_str(&text, scope)?;
                }

                let yaml: serde_yaml::Value = if text.trim().is_empty() {
                    serde_yaml::Value::Null
                } else {
                    serde_yaml::from_str(&text)?
                };

                // A non-mapping body has nowhere to land without a
                // parameter name.
                if param.is_none() && !yaml.is_mapping() && !yaml.is_null() {
                    return Err(ParseError::InvalidTag {
                        element: "rosparam".to_string(),
                        reason: "'param' attribute must be set for non-dictionary values"
                            .to_string(),
                    });
                }

                Ok(Self {
                    command,
                    ns,
                    param,
                    file,
                    yaml: Some(yaml),
                })
            }
        }
    }

    pub fn command(&self) -> RosParamCommand {
        self.command
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn yaml(&self) -> Option<&serde_yaml::Value> {
        self.yaml.as_ref()
    }

    /// Fully resolved global name this operation targets.
    pub fn resolved_name(&self) -> String {
        match &self.param {
            Some(param) => ros::join_namespace(&self.ns, param),
            None => {
                if self.ns.is_empty() {
                    "/".to_string()
                } else {
                    ros::make_global_namespace(&self.ns)
                        .trim_end_matches('/')
                        .to_string()
                }
            }
        }
    }

    /// Flatten a `load` body into individual (name, value) leaves for
    /// summary and dump output.
    pub fn flattened(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(yaml) = &self.yaml {
            flatten_yaml(&self.resolved_name(), yaml, &mut out);
        }
        out
    }
}

fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, nested) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                let joined = ros::join_namespace(prefix, &key);
                flatten_yaml(&joined, nested, out);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            let rendered = serde_json::to_string(seq).unwrap_or_else(|_| format!("{:?}", seq));
            out.push((prefix.to_string(), rendered));
        }
        serde_yaml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_yaml::Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        serde_yaml::Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        serde_yaml::Value::Null => out.push((prefix.to_string(), "null".to_string())),
        serde_yaml::Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out),
    }
}
