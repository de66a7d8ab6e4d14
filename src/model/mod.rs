//! Core data model types: account profiles, persisted records, and the
//! opaque host-client identifiers.

pub mod account;
pub mod ids;
pub mod record;
