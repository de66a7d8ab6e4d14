//! `easaccount` — provisions an Exchange-ActiveSync shared-mailbox
//! account inside an existing desktop mail client profile.
//!
//! This crate provides the core provisioning protocol: the ordered
//! mutations across the profile registry and the client's administrative
//! session, the exact record layout, the credential-protection step, and
//! the partial-failure discipline. The host client surfaces (registry,
//! administrative session, logon session, OS credential protection) are
//! consumed through the capability traits in [`host`].

pub mod config;
pub mod credential;
pub mod error;
pub mod host;
pub mod keystore;
pub mod model;
pub mod paths;
pub mod provision;
pub mod subsystem;
