//! rlaunch library
//!
//! A distributed process launcher for publish/subscribe robotics
//! systems: compiles declarative XML launch files into a plan of
//! processes, parameters, and machines, brings up a master and pushes
//! parameters to it, then launches and supervises local and remote
//! workers.

pub mod compiler;
pub mod condition;
pub mod error;
pub mod logs;
pub mod master;
pub mod plan;
pub mod process;
pub mod ros;
pub mod rpc;
pub mod runner;
pub mod substitution;
pub mod tags;
pub mod xml;

use compiler::LaunchFile;
use error::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use substitution::Scope;

/// Parse one launch file with caller-supplied `name:=value` bindings.
pub fn parse_launch_file(path: &Path, cli_args: HashMap<String, String>) -> Result<LaunchFile> {
    LaunchFile::from_path(path, Scope::with_args(cli_args), &HashSet::new())
}

/// Parse launch XML from a string (e.g. read from stdin).
pub fn parse_launch_string(data: &str, cli_args: HashMap<String, String>) -> Result<LaunchFile> {
    LaunchFile::from_str_data(data, Scope::with_args(cli_args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_launch() {
        let xml = r#"<launch>
            <node pkg="demo_nodes" type="talker" name="talker"/>
        </launch>"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(xml.as_bytes()).unwrap();

        let launch = parse_launch_file(file.path(), HashMap::new()).unwrap();
        assert_eq!(launch.nodes().len(), 1);
        assert_eq!(launch.nodes()[0].name(), "talker");
        assert_eq!(launch.nodes()[0].package(), "demo_nodes");
    }

    #[test]
    fn test_parse_with_cli_override() {
        let xml = r#"<launch>
            <arg name="node_name" default="default_name"/>
            <node pkg="p" type="t" name="$(arg node_name)"/>
        </launch>"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(xml.as_bytes()).unwrap();

        let mut cli_args = HashMap::new();
        cli_args.insert("node_name".to_string(), "cli_name".to_string());

        let launch = parse_launch_file(file.path(), cli_args).unwrap();
        assert_eq!(launch.nodes()[0].name(), "cli_name");
    }

    #[test]
    fn test_parse_string() {
        let launch = parse_launch_string(
            r#"<launch><param name="x" value="1"/></launch>"#,
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(launch.params().len(), 1);
    }
}
