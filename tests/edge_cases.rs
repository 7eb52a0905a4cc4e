//! Edge-case behavior tests

use rlaunch::{parse_launch_string, plan::LaunchPlan, rpc::RpcValue};
use std::collections::HashMap;

fn compile(xml: &str) -> rlaunch::compiler::LaunchFile {
    parse_launch_string(xml, HashMap::new()).unwrap()
}

#[test]
fn test_both_if_and_unless_rejected_on_every_tag() {
    for tag in [
        r#"<node pkg="p" type="t" name="n" if="true" unless="false"/>"#,
        r#"<group if="true" unless="false"/>"#,
        r#"<param name="x" value="1" if="true" unless="false"/>"#,
        r#"<arg name="a" value="1" if="true" unless="false"/>"#,
    ] {
        let xml = format!("<launch>{}</launch>", tag);
        assert!(
            parse_launch_string(&xml, HashMap::new()).is_err(),
            "expected failure for {}",
            tag
        );
    }
}

#[test]
fn test_boolean_attributes_are_strict() {
    // Truthy words that are not the true/false tokens are errors.
    for value in ["yes", "on", "1", "enabled"] {
        let xml = format!(r#"<launch><group if="{}"/></launch>"#, value);
        assert!(parse_launch_string(&xml, HashMap::new()).is_err());
    }
    // Case variants of the tokens are accepted.
    for value in ["True", "FALSE", "true", "false"] {
        let xml = format!(r#"<launch><group if="{}"/></launch>"#, value);
        assert!(parse_launch_string(&xml, HashMap::new()).is_ok());
    }
}

#[test]
fn test_param_value_source_mutual_exclusion() {
    let conflicting = [
        r#"<param name="x" value="1" textfile="/tmp/f"/>"#,
        r#"<param name="x" value="1" command="echo hi"/>"#,
        r#"<param name="x" textfile="/tmp/f" binfile="/tmp/g"/>"#,
    ];
    for tag in conflicting {
        let xml = format!("<launch>{}</launch>", tag);
        assert!(parse_launch_string(&xml, HashMap::new()).is_err());
    }
}

#[test]
fn test_arg_value_default_mutual_exclusion() {
    assert!(parse_launch_string(
        r#"<launch><arg name="a" value="1" default="2"/></launch>"#,
        HashMap::new(),
    )
    .is_err());
}

#[test]
fn test_respawn_and_required_mutual_exclusion() {
    assert!(parse_launch_string(
        r#"<launch><node pkg="p" type="t" name="n" respawn="true" required="true"/></launch>"#,
        HashMap::new(),
    )
    .is_err());
}

#[test]
fn test_duplicate_node_names_name_both_files() {
    let launch = compile(
        r#"<launch>
            <node pkg="p" type="t" name="twin"/>
            <group ns="/"><node pkg="p" type="t" name="twin"/></group>
        </launch>"#,
    );
    let err = LaunchPlan::assemble(std::slice::from_ref(&launch)).unwrap_err();
    assert!(err.to_string().contains("[/twin]"));
}

#[test]
fn test_namespace_join_never_doubles_slashes() {
    let launch = compile(
        r#"<launch>
            <group ns="/a/">
                <node pkg="p" type="t" name="n" ns="b/"/>
            </group>
        </launch>"#,
    );
    let resolved = launch.groups()[0].launch().nodes()[0].resolved_name();
    assert_eq!(resolved, "/a/b/n");
    assert!(!resolved.contains("//"));
}

#[test]
fn test_empty_group_namespace_keeps_parent() {
    let launch = compile(
        r#"<launch>
            <group ns="/keep">
                <group>
                    <node pkg="p" type="t" name="n"/>
                </group>
            </group>
        </launch>"#,
    );
    let node = &launch.groups()[0].launch().groups()[0].launch().nodes()[0];
    assert_eq!(node.resolved_name(), "/keep/n");
}

#[test]
fn test_clear_set_unification_properties() {
    let launch = compile(
        r#"<launch>
            <group ns="/sys/a" clear_params="true"/>
            <group ns="/sys" clear_params="true"/>
            <group ns="/other" clear_params="true"/>
        </launch>"#,
    );
    let plan = LaunchPlan::assemble(std::slice::from_ref(&launch)).unwrap();
    let unified = plan.unified_clear_params();

    // Every collected namespace is covered by a survivor.
    for ns in plan.clear_params() {
        assert!(unified.iter().any(|u| ns.starts_with(u.as_str())));
    }
    // No survivor is a prefix of another.
    for a in unified {
        for b in unified {
            if a != b {
                assert!(!a.starts_with(b.as_str()));
            }
        }
    }
    assert_eq!(unified.len(), 2);
}

#[test]
fn test_rpc_round_trip_with_entities_in_strings() {
    let original = RpcValue::Struct(vec![
        (
            "quote".to_string(),
            RpcValue::Str(r#"she said "hi" & left <quickly>'"#.to_string()),
        ),
        (
            "values".to_string(),
            RpcValue::List(vec![RpcValue::Bool(true), RpcValue::Double(-0.5)]),
        ),
    ]);
    let xml = original.to_xml();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let decoded = RpcValue::from_xml(doc.root_element()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_anon_names_stable_within_run() {
    let launch = compile(
        r#"<launch>
            <param name="first" value="$(anon shared_id)"/>
            <param name="second" value="$(anon shared_id)"/>
        </launch>"#,
    );
    assert_eq!(
        launch.params()[0].value().display(),
        launch.params()[1].value().display()
    );
}

#[test]
fn test_unknown_root_tag_is_error() {
    assert!(parse_launch_string(r#"<robot/>"#, HashMap::new()).is_err());
}

#[test]
fn test_malformed_xml_is_error() {
    assert!(parse_launch_string("<launch><node", HashMap::new()).is_err());
}

#[test]
fn test_deeply_nested_groups_do_not_overflow() {
    let mut xml = String::from("<launch>");
    for _ in 0..200 {
        xml.push_str(r#"<group ns="n">"#);
    }
    xml.push_str(r#"<node pkg="p" type="t" name="leaf"/>"#);
    for _ in 0..200 {
        xml.push_str("</group>");
    }
    xml.push_str("</launch>");

    let launch = parse_launch_string(&xml, HashMap::new()).unwrap();
    assert_eq!(launch.groups().len(), 1);
}
