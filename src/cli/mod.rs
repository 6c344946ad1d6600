//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::domain::errors::DomainError;

/// Exit code for an error: the code of the first [`DomainError`] in the
/// chain, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DomainError>())
        .map_or(1, DomainError::exit_code)
}

/// Print an error and exit with its category's code.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    let code = exit_code_for(&err);
    if json {
        let category = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<DomainError>())
            .map_or("error", DomainError::category);
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "category": category,
            "exit_code": code,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(code)
}
