//! Platform-facing descriptors (data), strategies (behavior), and the registry that pairs
//! them with client credentials.
//!
//! `descriptor` exposes validated metadata (`PlatformDescriptor`) covering HTTPS-only
//! endpoints, refresh support, client authentication preferences, quotas and quirks
//! (PKCE requirement, scope delimiter). `strategy` defines [`PlatformStrategy`], an
//! HTTP-client-agnostic hook used by flows to map token endpoint failures into the broker
//! error taxonomy. `catalog` ships descriptors for the built-in platforms.

pub mod catalog;
pub mod descriptor;
pub mod registry;
pub mod strategy;

pub use descriptor::*;
pub use registry::*;
pub use strategy::*;
