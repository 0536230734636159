//! Credential bundles and the secret wrapper that keeps them out of logs.

pub mod bundle;
pub mod secret;
