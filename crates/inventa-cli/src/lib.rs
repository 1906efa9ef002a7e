//! # inventa-cli: Operator Command Line
//!
//! Subcommands:
//!
//! - `seed` loads the baseline reference catalogs into a running API.
//! - `rut` validates and formats Chilean RUTs.
//! - `fingerprint` lists readers, captures a fingerprint and optionally
//!   enrolls it for a staff member.
//!
//! Each subcommand lives in its own module and returns the process exit
//! code on success.

pub mod api;
pub mod fingerprint;
pub mod rut;
pub mod seed;
