//! Strand CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Strand controller.

pub mod conditions;
pub mod tenant;
pub mod stream;
pub mod client;
pub mod user;
pub mod data_plane;
pub mod init;
pub mod auth_config;

pub use conditions::*;
pub use tenant::*;
pub use stream::*;
pub use client::*;
pub use user::*;
pub use data_plane::*;
pub use init::*;
pub use auth_config::*;
