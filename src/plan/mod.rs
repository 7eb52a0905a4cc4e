//! Config assembler
//!
//! Flattens a compiled launch tree into a frozen plan: the worker
//! processes to start, the parameters to push, the namespaces to
//! clear, and the machine bindings.

mod clear;
mod machines;

pub use clear::unify_clear_params;
pub use machines::MachineTable;

use crate::{
    compiler::LaunchFile,
    error::LaunchError,
    ros,
    tags::{MachineTag, NodeTag, ParamTag, RosParamCommand, RosParamTag},
};
use std::collections::HashMap;

/// One worker with its resolved machine binding.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub node: NodeTag,
    pub machine: MachineTag,
    pub is_local: bool,
}

/// The frozen launch plan.
#[derive(Debug)]
pub struct LaunchPlan {
    nodes: Vec<PlanNode>,
    params: Vec<ParamTag>,
    rosparams: Vec<RosParamTag>,
    clear_params: Vec<String>,
    unified_clear: Vec<String>,
}

impl LaunchPlan {
    /// Assemble the plan from the compiled launch files.
    pub fn assemble(launch_files: &[LaunchFile]) -> Result<Self, LaunchError> {
        let mut nodes = Vec::new();
        for launch in launch_files {
            collect_nodes(launch, &mut nodes);
        }

        check_duplicate_names(&nodes)?;

        let mut machine_tags = Vec::new();
        for launch in launch_files {
            collect_machines(launch, &mut machine_tags);
        }
        let machines = MachineTable::consolidated(machine_tags);

        let plan_nodes = nodes
            .into_iter()
            .map(|node| {
                let machine = match node.machine_name() {
                    Some(name) if !name.is_empty() => machines
                        .lookup(name)
                        .cloned()
                        .ok_or_else(|| LaunchError::UnknownMachine {
                            machine: name.to_string(),
                            node: node.resolved_name(),
                        })?,
                    _ => MachineTag::local(),
                };
                let is_local = machines.is_local(&machine);
                Ok(PlanNode {
                    node,
                    machine,
                    is_local,
                })
            })
            .collect::<Result<Vec<_>, LaunchError>>()?;

        let mut params = Vec::new();
        let mut rosparams = Vec::new();
        for launch in launch_files {
            collect_params(launch, &mut params, &mut rosparams);
        }

        let mut clear_params = Vec::new();
        for launch in launch_files {
            collect_clear_params(launch, &mut clear_params);
        }
        let unified_clear = unify_clear_params(&clear_params);

        Ok(Self {
            nodes: plan_nodes,
            params,
            rosparams,
            clear_params,
            unified_clear,
        })
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn local_nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.iter().filter(|n| n.is_local)
    }

    pub fn remote_nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.iter().filter(|n| !n.is_local)
    }

    pub fn params(&self) -> &[ParamTag] {
        &self.params
    }

    pub fn rosparams(&self) -> &[RosParamTag] {
        &self.rosparams
    }

    pub fn clear_params(&self) -> &[String] {
        &self.clear_params
    }

    pub fn unified_clear_params(&self) -> &[String] {
        &self.unified_clear
    }

    /// Node-level params and rosparams, which are pushed alongside
    /// the launch-level ones.
    pub fn node_scoped_params(&self) -> (Vec<&ParamTag>, Vec<&RosParamTag>) {
        let mut params = Vec::new();
        let mut rosparams = Vec::new();
        for plan_node in &self.nodes {
            params.extend(plan_node.node.params());
            rosparams.extend(plan_node.node.rosparams());
        }
        (params, rosparams)
    }

    /// Print the pre-launch summary of parameters and nodes.
    pub fn print_summary(&self) {
        println!("SUMMARY");
        println!("========");
        println!();

        if !self.clear_params.is_empty() {
            println!("CLEAR PARAMETERS");
            for ns in &self.clear_params {
                println!(" * {}", ns);
            }
            println!();
        }

        println!("PARAMETERS");
        for (name, value) in self.loaded_param_map() {
            println!(" * {}: {}", name, value);
        }
        println!();

        println!("NODES");
        let mut by_namespace: HashMap<String, Vec<&PlanNode>> = HashMap::new();
        for plan_node in self.local_nodes() {
            let mut ns = plan_node.node.namespace().to_string();
            if !ns.starts_with('/') {
                ns.insert(0, '/');
            }
            by_namespace.entry(ns).or_default().push(plan_node);
        }
        let mut namespaces: Vec<_> = by_namespace.keys().cloned().collect();
        namespaces.sort();
        for ns in namespaces {
            println!("  {}", ns);
            for plan_node in &by_namespace[&ns] {
                println!(
                    "    {} ({}/{})",
                    plan_node.node.name(),
                    plan_node.node.package(),
                    plan_node.node.node_type()
                );
            }
        }
        println!();
    }

    /// All parameters that a launch would set, as name/value strings.
    fn loaded_param_map(&self) -> Vec<(String, String)> {
        let mut map: Vec<(String, String)> = Vec::new();
        let (node_params, node_rosparams) = self.node_scoped_params();

        for rosparam in self.rosparams.iter().chain(node_rosparams) {
            if rosparam.command() == RosParamCommand::Load {
                map.extend(rosparam.flattened());
            }
        }
        for param in self.params.iter().chain(node_params) {
            map.push((param.resolved_name(), param.value().display()));
        }

        map
    }

    /// Render the `--dump-params` output: `{name: value, ...}`.
    pub fn dump_params_string(&self) -> String {
        let entries: Vec<String> = self
            .loaded_param_map()
            .into_iter()
            .map(|(name, value)| {
                let value = value.replace('\r', "\\r").replace('\n', "\\n");
                format!("{}: {}", name, value)
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

fn collect_nodes(launch: &LaunchFile, out: &mut Vec<NodeTag>) {
    out.extend(launch.nodes().iter().cloned());
    out.extend(launch.tests().iter().cloned());
    for group in launch.groups() {
        collect_nodes(group.launch(), out);
    }
    for include in launch.includes() {
        collect_nodes(include.launch(), out);
    }
}

fn collect_machines(launch: &LaunchFile, out: &mut Vec<MachineTag>) {
    out.extend(launch.machines().iter().cloned());
    for group in launch.groups() {
        collect_machines(group.launch(), out);
    }
    for include in launch.includes() {
        collect_machines(include.launch(), out);
    }
}

fn collect_params(launch: &LaunchFile, params: &mut Vec<ParamTag>, rosparams: &mut Vec<RosParamTag>) {
    params.extend(launch.params().iter().cloned());
    rosparams.extend(launch.rosparams().iter().cloned());
    for group in launch.groups() {
        collect_params(group.launch(), params, rosparams);
    }
    for include in launch.includes() {
        collect_params(include.launch(), params, rosparams);
    }
}

fn collect_clear_params(launch: &LaunchFile, out: &mut Vec<String>) {
    for node in launch.nodes() {
        if node.clear_params() {
            out.push(ros::make_global_namespace(&node.resolved_name()));
        }
    }
    for group in launch.groups() {
        if group.clear_params() {
            out.push(ros::make_global_namespace(group.namespace()));
        }
        collect_clear_params(group.launch(), out);
    }
    for include in launch.includes() {
        if include.clear_params() {
            out.push(ros::make_global_namespace(include.namespace()));
        }
        collect_clear_params(include.launch(), out);
    }
}

fn check_duplicate_names(nodes: &[NodeTag]) -> Result<(), LaunchError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for node in nodes {
        let name = node.resolved_name();
        let file = node.file().display().to_string();
        if let Some(other) = seen.get(&name) {
            return Err(LaunchError::DuplicateNodeName {
                name,
                file1: file,
                file2: other.clone(),
            });
        }
        seen.insert(name, file);
    }
    Ok(())
}
