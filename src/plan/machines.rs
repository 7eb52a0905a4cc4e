//! Machine consolidation and locality

use crate::{ros, tags::MachineTag};
use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

/// Canonicalized table of declared machines. Machines with identical
/// connection parameters collapse to the first declaration; later
/// names become aliases.
#[derive(Debug, Default)]
pub struct MachineTable {
    machines: Vec<MachineTag>,
    aliases: HashMap<String, String>,
}

impl MachineTable {
    /// Build the table and collapse duplicate connection configs.
    pub fn consolidated(tags: Vec<MachineTag>) -> Self {
        let mut machines: Vec<MachineTag> = Vec::new();
        let mut aliases = HashMap::new();

        for tag in tags {
            if let Some(canonical) = machines.iter().find(|m| m.same_connection(&tag)) {
                if canonical.name() != tag.name() {
                    log::info!(
                        "... changing machine assignment from [{}] to [{}]",
                        tag.name(),
                        canonical.name()
                    );
                    aliases.insert(tag.name().to_string(), canonical.name().to_string());
                }
                continue;
            }
            // A re-declaration of the same name with different
            // connection parameters wins.
            machines.retain(|m| m.name() != tag.name());
            machines.push(tag);
        }

        Self { machines, aliases }
    }

    /// Resolve a machine name through the alias table.
    pub fn lookup(&self, name: &str) -> Option<&MachineTag> {
        let canonical = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.machines.iter().find(|m| m.name() == canonical)
    }

    pub fn machines(&self) -> &[MachineTag] {
        &self.machines
    }

    /// A machine is local when its address resolves to one of this
    /// host's interface addresses and its user (if any) matches the
    /// current OS user.
    pub fn is_local(&self, machine: &MachineTag) -> bool {
        let address_local = match resolve_address(machine.address()) {
            Some(addr) => {
                addr.is_loopback() || ros::local_addresses().contains(&addr)
            }
            None => machine.address() == "localhost",
        };

        if !address_local {
            return false;
        }

        match machine.user() {
            Some(user) if !user.is_empty() => {
                ros::local_username().map(|local| local == user).unwrap_or(false)
            }
            _ => true,
        }
    }
}

fn resolve_address(address: &str) -> Option<IpAddr> {
    if let Ok(addr) = address.parse::<IpAddr>() {
        return Some(addr);
    }
    (address, 0)
        .to_socket_addrs()
        .ok()?
        .next()
        .map(|sockaddr| sockaddr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::Scope;
    use crate::xml::XmlEntity;

    fn machine(xml: &str) -> MachineTag {
        let doc = roxmltree::Document::parse(xml).unwrap();
        MachineTag::from_entity(&XmlEntity::new(doc.root_element()), &Scope::new(), "f").unwrap()
    }

    #[test]
    fn test_duplicate_connections_alias() {
        let table = MachineTable::consolidated(vec![
            machine(r#"<machine name="a" address="host1"/>"#),
            machine(r#"<machine name="b" address="host1"/>"#),
        ]);
        assert_eq!(table.machines().len(), 1);
        assert_eq!(table.lookup("b").unwrap().name(), "a");
    }

    #[test]
    fn test_distinct_connections_kept() {
        let table = MachineTable::consolidated(vec![
            machine(r#"<machine name="a" address="host1"/>"#),
            machine(r#"<machine name="b" address="host2"/>"#),
        ]);
        assert_eq!(table.machines().len(), 2);
        assert_eq!(table.lookup("b").unwrap().address(), "host2");
    }

    #[test]
    fn test_unknown_machine_is_none() {
        let table = MachineTable::consolidated(Vec::new());
        assert!(table.lookup("ghost").is_none());
    }

    #[test]
    fn test_loopback_is_local() {
        let table = MachineTable::consolidated(Vec::new());
        assert!(table.is_local(&machine(r#"<machine name="m" address="127.0.0.1"/>"#)));
        assert!(table.is_local(&MachineTag::local()));
    }

    #[test]
    fn test_remote_address_not_local() {
        let table = MachineTable::consolidated(Vec::new());
        // TEST-NET-1, guaranteed not to be bound on this host.
        assert!(!table.is_local(&machine(r#"<machine name="m" address="192.0.2.1"/>"#)));
    }

    #[test]
    fn test_local_address_with_wrong_user_not_local() {
        let table = MachineTable::consolidated(Vec::new());
        let m = machine(
            r#"<machine name="m" address="127.0.0.1" user="nobody_we_know_runs_tests"/>"#,
        );
        assert!(!table.is_local(&m));
    }
}
