//! machine tag

use crate::{
    error::{ParseError, Result},
    substitution::Scope,
    tags::{optional_attr, required_attr},
    xml::XmlEntity,
};

const SUPPORTED: &[&str] = &[
    "name",
    "address",
    "env-loader",
    "user",
    "password",
    "default",
    "ssh-port",
    "timeout",
];

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// A remote host the launcher may deploy workers to.
#[derive(Debug, Clone)]
pub struct MachineTag {
    name: String,
    address: String,
    env_loader: Option<String>,
    user: Option<String>,
    password: Option<String>,
    ssh_port: u16,
    timeout: f64,
    default: Option<String>,
}

impl MachineTag {
    /// The implicit machine nodes bind to when no `machine` attribute
    /// is given.
    pub fn local() -> Self {
        Self {
            name: "local".to_string(),
            address: "localhost".to_string(),
            env_loader: None,
            user: None,
            password: None,
            ssh_port: DEFAULT_SSH_PORT,
            timeout: DEFAULT_TIMEOUT_SECS,
            default: None,
        }
    }

    pub fn from_entity(entity: &XmlEntity, scope: &Scope, file: &str) -> Result<Self> {
        entity.warn_unknown_attributes(SUPPORTED, file);

        let name = required_attr(entity, "name", scope)?;
        let address = required_attr(entity, "address", scope)?;

        let default = optional_attr(entity, "default", scope)?;
        if let Some(ref value) = default {
            if value != "true" && value != "false" && value != "never" {
                return Err(ParseError::InvalidBoolAttribute {
                    element: "machine".to_string(),
                    attribute: "default".to_string(),
                    value: value.clone(),
                });
            }
        }

        let ssh_port = match optional_attr(entity, "ssh-port", scope)? {
            Some(text) => text.parse::<u16>().map_err(|_| ParseError::TypeCoercion {
                element: "machine".to_string(),
                attribute: "ssh-port".to_string(),
                value: text,
                expected_type: "int",
            })?,
            None => DEFAULT_SSH_PORT,
        };

        let timeout = match optional_attr(entity, "timeout", scope)? {
            Some(text) => text.parse::<f64>().map_err(|_| ParseError::TypeCoercion {
                element: "machine".to_string(),
                attribute: "timeout".to_string(),
                value: text,
                expected_type: "float",
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            name,
            address,
            env_loader: optional_attr(entity, "env-loader", scope)?,
            user: optional_attr(entity, "user", scope)?,
            password: optional_attr(entity, "password", scope)?,
            ssh_port,
            timeout,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn env_loader(&self) -> Option<&str> {
        self.env_loader.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn default_setting(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Connection-parameter equality. Two machines with the same
    /// connection collapse to one during consolidation; `name` and
    /// `default` do not participate.
    pub fn same_connection(&self, other: &MachineTag) -> bool {
        self.address == other.address
            && self.ssh_port == other.ssh_port
            && self.user == other.user
            && self.password == other.password
            && self.env_loader == other.env_loader
            && self.timeout == other.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<MachineTag> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let entity = XmlEntity::new(doc.root_element());
        MachineTag::from_entity(&entity, &Scope::new(), "f")
    }

    #[test]
    fn test_machine_defaults() {
        let machine = parse(r#"<machine name="m1" address="10.0.0.2"/>"#).unwrap();
        assert_eq!(machine.name(), "m1");
        assert_eq!(machine.address(), "10.0.0.2");
        assert_eq!(machine.ssh_port(), 22);
        assert_eq!(machine.timeout(), 10.0);
        assert!(machine.user().is_none());
    }

    #[test]
    fn test_machine_full() {
        let machine = parse(
            r#"<machine name="m1" address="host" user="robot" password="pw"
                ssh-port="2222" timeout="5.5" env-loader="/opt/env.sh" default="never"/>"#,
        )
        .unwrap();
        assert_eq!(machine.ssh_port(), 2222);
        assert_eq!(machine.timeout(), 5.5);
        assert_eq!(machine.user(), Some("robot"));
        assert_eq!(machine.env_loader(), Some("/opt/env.sh"));
        assert_eq!(machine.default_setting(), Some("never"));
    }

    #[test]
    fn test_machine_requires_name_and_address() {
        assert!(parse(r#"<machine name="m1"/>"#).is_err());
        assert!(parse(r#"<machine address="host"/>"#).is_err());
    }

    #[test]
    fn test_invalid_ssh_port() {
        assert!(parse(r#"<machine name="m" address="a" ssh-port="abc"/>"#).is_err());
    }

    #[test]
    fn test_invalid_default() {
        assert!(parse(r#"<machine name="m" address="a" default="maybe"/>"#).is_err());
    }

    #[test]
    fn test_same_connection_ignores_name() {
        let a = parse(r#"<machine name="a" address="host" user="u"/>"#).unwrap();
        let b = parse(r#"<machine name="b" address="host" user="u"/>"#).unwrap();
        let c = parse(r#"<machine name="c" address="other" user="u"/>"#).unwrap();
        assert!(a.same_connection(&b));
        assert!(!a.same_connection(&c));
    }
}
