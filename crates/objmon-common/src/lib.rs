//! Shared building blocks for objmon: the objective and custom-rule data
//! model, an injectable [`clock::Clock`], snowflake IDs and the localized
//! message registry.

pub mod clock;
pub mod i18n;
pub mod id;
pub mod types;
