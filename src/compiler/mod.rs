//! Launch-file compiler
//!
//! Parses one XML document into a tree of tag records, recursing
//! through `<include>` and `<group>` with scoped symbol tables and
//! cycle-safe file inclusion.

mod launch_file;

pub use launch_file::LaunchFile;
