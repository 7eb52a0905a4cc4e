//! node and test tags

use crate::{
    condition,
    error::{ParseError, Result},
    ros,
    substitution::Scope,
    tags::{optional_attr, required_attr, EnvTag, ParamTag, RemapTag, RosParamTag},
    xml::XmlEntity,
};
use std::collections::HashMap;
use std::path::PathBuf;

const NODE_SUPPORTED: &[&str] = &[
    "name",
    "pkg",
    "type",
    "args",
    "machine",
    "respawn",
    "respawn_delay",
    "required",
    "ns",
    "clear_params",
    "output",
    "cwd",
    "launch-prefix",
];

const TEST_SUPPORTED: &[&str] = &[
    "test-name",
    "pkg",
    "type",
    "args",
    "ns",
    "clear_params",
    "cwd",
    "launch-prefix",
    "retry",
    "time-limit",
];

/// Where a worker's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    Log,
    Screen,
}

/// Working-directory policy for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwdPolicy {
    RosHome,
    RosRoot,
    Cwd,
    Node,
}

/// Distinguishes plain workers from test workers.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Node,
    Test { retry: u32, time_limit: f64 },
}

/// A worker process declaration.
#[derive(Debug, Clone)]
pub struct NodeTag {
    name: String,
    package: String,
    node_type: String,
    args: Vec<String>,
    machine_name: Option<String>,
    respawn: bool,
    respawn_delay: f64,
    required: bool,
    ns: String,
    clear_params: bool,
    output: OutputPolicy,
    cwd: CwdPolicy,
    launch_prefix: Option<String>,
    env: HashMap<String, String>,
    remaps: Vec<(String, String)>,
    params: Vec<ParamTag>,
    rosparams: Vec<RosParamTag>,
    kind: NodeKind,
    file: PathBuf,
}

impl NodeTag {
    pub fn from_entity(
        entity: &XmlEntity,
        scope: &Scope,
        file: &PathBuf,
    ) -> Result<Self> {
        let is_test = entity.type_name() == "test";
        let file_str = file.display().to_string();
        let supported = if is_test { TEST_SUPPORTED } else { NODE_SUPPORTED };
        entity.warn_unknown_attributes(supported, &file_str);

        let element = entity.type_name().to_string();
        let name_attr = if is_test { "test-name" } else { "name" };
        let name = required_attr(entity, name_attr, scope)?;
        if name.contains('/') {
            return Err(ParseError::InvalidTag {
                element,
                reason: "node name cannot contain a namespace".to_string(),
            });
        }

        let package = required_attr(entity, "pkg", scope)?;
        let node_type = required_attr(entity, "type", scope)?;

        let args = optional_attr(entity, "args", scope)?
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let machine_name = optional_attr(entity, "machine", scope)?;

        let (respawn, required) = if is_test {
            (false, false)
        } else {
            let respawn = condition::bool_attribute(entity, "respawn", false, false, scope)?;
            let required = condition::bool_attribute(entity, "required", false, false, scope)?;
            if respawn && required {
                return Err(ParseError::InvalidTag {
                    element: entity.type_name().to_string(),
                    reason: "respawn and required cannot both be set to true".to_string(),
                });
            }
            (respawn, required)
        };

        let respawn_delay = match optional_attr(entity, "respawn_delay", scope)? {
            Some(text) => text.parse::<f64>().map_err(|_| ParseError::TypeCoercion {
                element: entity.type_name().to_string(),
                attribute: "respawn_delay".to_string(),
                value: text,
                expected_type: "float",
            })?,
            None => 0.0,
        };

        let ns_attr = optional_attr(entity, "ns", scope)?;
        let ns = match ns_attr {
            Some(ns) => ros::add_namespace(scope.namespace(), &ns),
            None => scope.namespace().to_string(),
        };

        let clear_params = condition::bool_attribute(entity, "clear_params", false, true, scope)?;
        if clear_params && name.is_empty() {
            return Err(ParseError::InvalidTag {
                element: entity.type_name().to_string(),
                reason: "'name' attribute must be set in order to use 'clear_params'"
                    .to_string(),
            });
        }

        let output = match optional_attr(entity, "output", scope)?.as_deref() {
            None | Some("log") => OutputPolicy::Log,
            Some("screen") => OutputPolicy::Screen,
            Some(other) => {
                return Err(ParseError::InvalidTag {
                    element: entity.type_name().to_string(),
                    reason: format!("output must be one of 'log', 'screen': {}", other),
                })
            }
        };

        let cwd = match optional_attr(entity, "cwd", scope)?.as_deref() {
            None => CwdPolicy::RosHome,
            Some("ros-home") | Some("ROS_HOME") => CwdPolicy::RosHome,
            Some("node") => CwdPolicy::Node,
            Some("ros-root") | Some("ROS_ROOT") if !is_test => CwdPolicy::RosRoot,
            Some("cwd") if !is_test => CwdPolicy::Cwd,
            Some(other) => {
                let allowed = if is_test {
                    "'ROS_HOME', 'node'"
                } else {
                    "'ros-home', 'ros-root', 'cwd', 'node'"
                };
                return Err(ParseError::InvalidTag {
                    element: entity.type_name().to_string(),
                    reason: format!("cwd must be one of {}: {}", allowed, other),
                });
            }
        };

        let launch_prefix = optional_attr(entity, "launch-prefix", scope)?;

        let kind = if is_test {
            let retry = match optional_attr(entity, "retry", scope)? {
                Some(text) => text.parse::<u32>().map_err(|_| ParseError::TypeCoercion {
                    element: "test".to_string(),
                    attribute: "retry".to_string(),
                    value: text,
                    expected_type: "int",
                })?,
                None => 0,
            };
            let time_limit = match optional_attr(entity, "time-limit", scope)? {
                Some(text) => text.parse::<f64>().map_err(|_| ParseError::TypeCoercion {
                    element: "test".to_string(),
                    attribute: "time-limit".to_string(),
                    value: text,
                    expected_type: "float",
                })?,
                None => 60.0,
            };
            NodeKind::Test { retry, time_limit }
        } else {
            NodeKind::Node
        };

        let mut node = Self {
            name,
            package,
            node_type,
            args,
            machine_name,
            respawn,
            respawn_delay,
            required,
            ns,
            clear_params,
            output,
            cwd,
            launch_prefix,
            env: scope.env().clone(),
            remaps: scope
                .remaps()
                .iter()
                .map(|(f, t)| (f.clone(), t.clone()))
                .collect(),
            params: Vec::new(),
            rosparams: Vec::new(),
            kind,
            file: file.clone(),
        };

        node.parse_children(entity, scope, &file_str)?;
        Ok(node)
    }

    fn parse_children(&mut self, entity: &XmlEntity, scope: &Scope, file: &str) -> Result<()> {
        // Params declared on a node land in the node's private
        // namespace.
        let private_ns = self.resolved_name();

        for child in entity.children() {
            if !condition::is_enabled(&child, scope)? {
                continue;
            }
            match child.type_name() {
                "env" => {
                    let env = EnvTag::from_entity(&child, scope, file)?;
                    self.env.insert(env.name().to_string(), env.value().to_string());
                }
                "remap" => {
                    let remap = RemapTag::from_entity(&child, scope, file)?;
                    self.remaps
                        .push((remap.from().to_string(), remap.to().to_string()));
                }
                "param" => {
                    self.params
                        .push(ParamTag::from_entity(&child, scope, &private_ns, file)?);
                }
                "rosparam" => {
                    // rosparams keep the node's namespace, not its
                    // private name.
                    let ns = self.ns.clone();
                    self.rosparams
                        .push(RosParamTag::from_entity(&child, scope, &ns, file)?);
                }
                other => {
                    log::warn!(
                        "[{}] unrecognized '{}' tag in <{}> tag",
                        file,
                        other,
                        entity.type_name()
                    );
                }
            }
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique global name: namespace + "/" + name.
    pub fn resolved_name(&self) -> String {
        ros::join_namespace(&self.ns, &self.name)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn machine_name(&self) -> Option<&str> {
        self.machine_name.as_deref()
    }

    pub fn respawn(&self) -> bool {
        self.respawn
    }

    pub fn respawn_delay(&self) -> f64 {
        self.respawn_delay
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn clear_params(&self) -> bool {
        self.clear_params
    }

    pub fn output(&self) -> OutputPolicy {
        self.output
    }

    pub fn cwd(&self) -> CwdPolicy {
        self.cwd
    }

    pub fn launch_prefix(&self) -> Option<&str> {
        self.launch_prefix.as_deref()
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn remaps(&self) -> &[(String, String)] {
        &self.remaps
    }

    pub fn params(&self) -> &[ParamTag] {
        &self.params
    }

    pub fn rosparams(&self) -> &[RosParamTag] {
        &self.rosparams
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn file(&self) -> &PathBuf {
        &self.file
    }
}
