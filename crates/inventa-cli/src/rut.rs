//! # RUT Subcommand
//!
//! `inventa rut validate <rut>` exits 0 for a valid RUT and 1 otherwise.
//! `inventa rut format <rut>` prints the dotted form.

use anyhow::Result;
use clap::{Args, Subcommand};
use inventa_core::Rut;

/// Arguments for `inventa rut`.
#[derive(Args, Debug)]
pub struct RutArgs {
    #[command(subcommand)]
    pub command: RutCommand,
}

#[derive(Subcommand, Debug)]
pub enum RutCommand {
    /// Check structure and check digit.
    Validate {
        /// RUT in any common notation (`12345678-5`, `12.345.678-5`, `123456785`).
        rut: String,
    },
    /// Print the RUT as `12.345.678-5`.
    Format {
        /// RUT in any common notation.
        rut: String,
    },
}

/// Entry point for `inventa rut`.
pub fn run_rut(args: &RutArgs) -> Result<u8> {
    match &args.command {
        RutCommand::Validate { rut } => match Rut::new(rut) {
            Ok(parsed) => {
                println!("{} is valid", parsed.formatted());
                Ok(0)
            }
            Err(e) => {
                println!("{e}");
                Ok(1)
            }
        },
        RutCommand::Format { rut } => {
            let parsed = Rut::new(rut)?;
            println!("{}", parsed.formatted());
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(rut: &str) -> u8 {
        run_rut(&RutArgs {
            command: RutCommand::Validate { rut: rut.into() },
        })
        .unwrap()
    }

    #[test]
    fn validate_reports_through_exit_code() {
        assert_eq!(validate("12.345.678-5"), 0);
        assert_eq!(validate("12.345.678-0"), 1);
    }

    #[test]
    fn format_rejects_invalid_rut() {
        let result = run_rut(&RutArgs {
            command: RutCommand::Format {
                rut: "not-a-rut".into(),
            },
        });
        assert!(result.is_err());
    }
}
