//! Host-language bindings.
#[cfg(feature = "python")]
pub mod python;
