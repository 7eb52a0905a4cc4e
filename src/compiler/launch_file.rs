//! Recursive launch-file parsing

use crate::{
    condition,
    error::{ParseError, Result},
    substitution::Scope,
    tags::{
        ArgTag, EnvTag, GroupTag, IncludeTag, MachineTag, NodeTag, ParamTag, RemapTag,
        RosParamTag,
    },
    xml::XmlEntity,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One compiled launch document: the tag records it declares plus the
/// nested trees produced by its groups and includes.
#[derive(Debug, Default)]
pub struct LaunchFile {
    file: Option<PathBuf>,
    deprecated: Option<String>,
    args: Vec<ArgTag>,
    nodes: Vec<NodeTag>,
    tests: Vec<NodeTag>,
    groups: Vec<GroupTag>,
    includes: Vec<IncludeTag>,
    machines: Vec<MachineTag>,
    params: Vec<ParamTag>,
    rosparams: Vec<RosParamTag>,
}

impl LaunchFile {
    /// Compile a launch file from disk. `ancestors` is the set of
    /// files currently being compiled above this one, used for cycle
    /// detection.
    pub fn from_path(
        path: &Path,
        caller_scope: Scope,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ParseError::LaunchFileUnreadable(path.display().to_string()))?;
        Self::compile(&content, Some(path.to_path_buf()), caller_scope, ancestors)
    }

    /// Compile launch XML from a string (e.g. stdin).
    pub fn from_str_data(data: &str, caller_scope: Scope) -> Result<Self> {
        Self::compile(data, None, caller_scope, &HashSet::new())
    }

    fn compile(
        content: &str,
        file: Option<PathBuf>,
        caller_scope: Scope,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<Self> {
        let doc = roxmltree::Document::parse(content)?;
        let root = XmlEntity::new(doc.root_element());

        if root.type_name() != "launch" {
            return Err(ParseError::MissingLaunchRoot);
        }

        let mut launch = LaunchFile {
            file,
            ..LaunchFile::default()
        };

        // The launch tag honors if/unless like every other tag; a
        // disabled root yields an empty tree.
        if !condition::is_enabled(&root, &caller_scope)? {
            return Ok(launch);
        }

        // The deprecation notice is stored verbatim, without
        // substitution.
        launch.deprecated = root.get_attr_str("deprecated", true)?;

        launch.parse_children(&root, caller_scope, ancestors)?;
        Ok(launch)
    }

    /// Compile the body of an element whose children follow the launch
    /// production rule (the root tag and `<group>` bodies).
    pub(crate) fn from_body(
        entity: &XmlEntity,
        file: Option<PathBuf>,
        scope: Scope,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<Self> {
        let mut launch = LaunchFile {
            file,
            ..LaunchFile::default()
        };
        launch.parse_children(entity, scope, ancestors)?;
        Ok(launch)
    }

    fn parse_children(
        &mut self,
        root: &XmlEntity,
        mut scope: Scope,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<()> {
        let file = self
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from("<string>"));
        let file_str = file.display().to_string();

        for child in root.children() {
            // A disabled tag is dropped entirely, before it can have
            // any side effect on the scope.
            if !condition::is_enabled(&child, &scope)? {
                continue;
            }

            match child.type_name() {
                "arg" => {
                    let arg = ArgTag::from_entity(&child, &scope, &file_str)?;
                    if let Some(value) = arg.value() {
                        scope.set_arg(arg.name().to_string(), value.to_string());
                    }
                    self.args.push(arg);
                }
                "env" => {
                    let env = EnvTag::from_entity(&child, &scope, &file_str)?;
                    scope.set_env(env.name().to_string(), env.value().to_string());
                }
                "remap" => {
                    let remap = RemapTag::from_entity(&child, &scope, &file_str)?;
                    scope.set_remap(remap.from().to_string(), remap.to().to_string());
                }
                "group" => {
                    self.groups
                        .push(GroupTag::from_entity(&child, &scope, &file, ancestors)?);
                }
                "include" => {
                    self.includes
                        .push(IncludeTag::from_entity(&child, &scope, &file, ancestors)?);
                }
                "machine" => {
                    self.machines
                        .push(MachineTag::from_entity(&child, &scope, &file_str)?);
                }
                "node" => {
                    self.nodes.push(NodeTag::from_entity(&child, &scope, &file)?);
                }
                "test" => {
                    self.tests.push(NodeTag::from_entity(&child, &scope, &file)?);
                }
                "param" => {
                    self.params.push(ParamTag::from_entity(
                        &child,
                        &scope,
                        scope.namespace(),
                        &file_str,
                    )?);
                }
                "rosparam" => {
                    self.rosparams.push(RosParamTag::from_entity(
                        &child,
                        &scope,
                        scope.namespace(),
                        &file_str,
                    )?);
                }
                other => {
                    log::warn!("[{}] unrecognized tag: [{}]", file_str, other);
                }
            }
        }

        Ok(())
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    pub fn deprecated(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn args(&self) -> &[ArgTag] {
        &self.args
    }

    /// Names of every arg declared directly in this file; used to
    /// verify the args passed to an include were consumed.
    pub fn arg_names(&self) -> Vec<&str> {
        self.args.iter().map(|a| a.name()).collect()
    }

    pub fn nodes(&self) -> &[NodeTag] {
        &self.nodes
    }

    pub fn tests(&self) -> &[NodeTag] {
        &self.tests
    }

    pub fn groups(&self) -> &[GroupTag] {
        &self.groups
    }

    pub fn includes(&self) -> &[IncludeTag] {
        &self.includes
    }

    pub fn machines(&self) -> &[MachineTag] {
        &self.machines
    }

    pub fn params(&self) -> &[ParamTag] {
        &self.params
    }

    pub fn rosparams(&self) -> &[RosParamTag] {
        &self.rosparams
    }

    /// Every file in this launch tree, depth first.
    pub fn collect_files(&self, out: &mut Vec<PathBuf>) {
        if let Some(file) = &self.file {
            out.push(file.clone());
        }
        for include in &self.includes {
            include.launch().collect_files(out);
        }
        for group in &self.groups {
            group.launch().collect_files(out);
        }
    }

    /// Find a node in this tree by its fully resolved name.
    pub fn find_node(&self, resolved_name: &str) -> Option<&NodeTag> {
        for node in &self.nodes {
            if node.resolved_name() == resolved_name {
                return Some(node);
            }
        }
        for include in &self.includes {
            if let Some(node) = include.launch().find_node(resolved_name) {
                return Some(node);
            }
        }
        for group in &self.groups {
            if let Some(node) = group.launch().find_node(resolved_name) {
                return Some(node);
            }
        }
        None
    }
}
