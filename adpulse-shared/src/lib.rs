#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Wire models and configuration shared by the adpulse monitor and CLI.

pub mod config;
pub mod models;
