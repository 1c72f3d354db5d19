//! Builtin plugins, registered in the catalog at link time.

pub mod decor;
pub mod fade;
