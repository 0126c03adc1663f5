//! Built-in reconnaissance modules.

pub mod email;
pub mod names;
pub mod pgp;
pub mod store;
