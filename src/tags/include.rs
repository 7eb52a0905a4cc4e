//! include tag

use crate::{
    compiler::LaunchFile,
    condition,
    error::{ParseError, Result},
    ros,
    substitution::Scope,
    tags::{optional_attr, required_attr, ArgTag, EnvTag},
    xml::XmlEntity,
};
use std::collections::HashSet;
use std::path::PathBuf;

const SUPPORTED: &[&str] = &["file", "ns", "clear_params"];

/// Inclusion of another launch file with a fresh scope.
#[derive(Debug)]
pub struct IncludeTag {
    launch: LaunchFile,
    file: PathBuf,
    ns: String,
    clear_params: bool,
}

impl IncludeTag {
    pub fn from_entity(
        entity: &XmlEntity,
        scope: &Scope,
        parent_file: &PathBuf,
        ancestors: &HashSet<PathBuf>,
    ) -> Result<Self> {
        let parent_str = parent_file.display().to_string();
        entity.warn_unknown_attributes(SUPPORTED, &parent_str);

        let file_attr = required_attr(entity, "file", scope)?;
        let included = ros::expand_user(&file_attr);
        if !included.is_file() {
            return Err(ParseError::IncludeNotFound(file_attr));
        }
        let included = included.canonicalize().unwrap_or(included);

        let ns_attr = optional_attr(entity, "ns", scope)?;
        let ns = match &ns_attr {
            Some(ns) => ros::add_namespace(scope.namespace(), ns),
            None => scope.namespace().to_string(),
        };

        let clear_params = condition::bool_attribute(entity, "clear_params", false, true, scope)?;
        if clear_params && ns_attr.is_none() {
            return Err(ParseError::InvalidTag {
                element: "include".to_string(),
                reason: "'ns' attribute must be set in order to use 'clear_params'".to_string(),
            });
        }

        // The included file starts from this scope plus the arg/env
        // children declared in the include body.
        let mut child_scope = scope.child();
        child_scope.set_namespace(ns.clone());

        let mut passed_args: Vec<String> = Vec::new();
        for child in entity.children() {
            if !condition::is_enabled(&child, scope)? {
                continue;
            }
            match child.type_name() {
                "arg" => {
                    let arg = ArgTag::from_entity(&child, &child_scope, &parent_str)?;
                    if let Some(value) = arg.value() {
                        child_scope.set_arg(arg.name().to_string(), value.to_string());
                    }
                    passed_args.push(arg.name().to_string());
                }
                "env" => {
                    let env = EnvTag::from_entity(&child, &child_scope, &parent_str)?;
                    child_scope.set_env(env.name().to_string(), env.value().to_string());
                }
                other => {
                    log::warn!(
                        "[{}] unrecognized '{}' tag in <include> tag",
                        parent_str,
                        other
                    );
                }
            }
        }

        // Cycle check: including any file still being compiled above
        // us would recurse forever.
        let canonical_parent = parent_file
            .canonicalize()
            .unwrap_or_else(|_| parent_file.clone());
        let mut live_ancestors: HashSet<PathBuf> = ancestors.clone();
        live_ancestors.insert(canonical_parent);

        if live_ancestors.contains(&included) {
            return Err(ParseError::IncludeCycle {
                parent: parent_file.display().to_string(),
                ancestor: included.display().to_string(),
            });
        }

        let launch = LaunchFile::from_path(&included, child_scope, &live_ancestors)?;

        // Every arg passed into the include must be declared by the
        // included file.
        let declared = launch.arg_names();
        let unused: Vec<&str> = passed_args
            .iter()
            .map(String::as_str)
            .filter(|name| !declared.contains(name))
            .collect();
        if !unused.is_empty() {
            return Err(ParseError::UnusedIncludeArgs {
                args: unused.join(", "),
                file: included.display().to_string(),
            });
        }

        Ok(Self {
            launch,
            file: included,
            ns,
            clear_params,
        })
    }

    pub fn launch(&self) -> &LaunchFile {
        &self.launch
    }

    pub fn file(&self) -> &PathBuf {
        &self.file
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    pub fn clear_params(&self) -> bool {
        self.clear_params
    }
}
