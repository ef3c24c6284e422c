//! Include-directive page assembler.
//!
//! Splices HTML fragments into page templates wherever a directive such as
//! `<!--=include header.html -->` appears. Inclusion is purely textual: no
//! variables, no loops, no escaping.

pub mod assemble;
pub mod directive;

pub use assemble::{Assembler, IncludeError};
pub use directive::{scan, Directive, DirectiveKind};
