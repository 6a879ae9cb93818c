//! Subcommand implementations.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod navigate;
pub mod orders;

use thiserror::Error;
use zdrink_client::ApiError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The ordering API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The command needs a signed-in session.
    #[error("Not signed in. Run `zdrink login` first.")]
    NotSignedIn,

    /// An argument could not be used.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered.
    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// Print a value as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print one line on stdout.
#[allow(clippy::print_stdout)]
pub fn print_line(line: impl std::fmt::Display) {
    println!("{line}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Row<'a> {
        name: &'a str,
        quantity: u64,
    }

    #[test]
    fn test_print_json_accepts_derived_and_unsized_values() {
        print_json(&Row { name: "Milk tea", quantity: 2 }).unwrap();
        print_json("plain").unwrap();
        print_json(&[1_u8, 2, 3][..]).unwrap();
    }

    #[test]
    fn test_api_error_converts() {
        let err: CommandError = ApiError::NotAuthenticated.into();
        assert!(matches!(err, CommandError::Api(ApiError::NotAuthenticated)));
    }
}
