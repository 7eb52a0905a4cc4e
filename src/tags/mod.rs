//! Typed records for launch file tags
//!
//! Each tag enforces its own attribute schema and child grammar. All
//! tags honor the `if`/`unless` gating attributes (see
//! [`crate::condition`]); a disabled tag is dropped by the compiler
//! without side effects.

mod arg;
mod env;
mod group;
mod include;
mod machine;
mod node;
mod param;
mod remap;
mod rosparam;

pub use arg::ArgTag;

use crate::error::Result;
use crate::substitution::{resolve_str, Scope};
use crate::xml::XmlEntity;

/// Fetch a required attribute and resolve its substitutions.
pub(crate) fn required_attr(entity: &XmlEntity, attr: &str, scope: &Scope) -> Result<String> {
    let raw = entity.get_attr_str(attr, false)?.unwrap_or_default();
    resolve_str(&raw, scope)
}

/// Fetch an optional attribute and resolve its substitutions.
pub(crate) fn optional_attr(
    entity: &XmlEntity,
    attr: &str,
    scope: &Scope,
) -> Result<Option<String>> {
    match entity.get_attr_str(attr, true)? {
        Some(raw) => Ok(Some(resolve_str(&raw, scope)?)),
        None => Ok(None),
    }
}
pub use env::EnvTag;
pub use group::GroupTag;
pub use include::IncludeTag;
pub use machine::{MachineTag, DEFAULT_SSH_PORT};
pub use node::{CwdPolicy, NodeKind, NodeTag, OutputPolicy};
pub use param::{ParamTag, ParamValue};
pub use remap::RemapTag;
pub use rosparam::{RosParamCommand, RosParamTag};
