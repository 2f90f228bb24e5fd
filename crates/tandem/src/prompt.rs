// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Password acquisition via TTY prompt or the TANDEM_PASSWORD environment variable.

use secrecy::SecretString;
use tandem_core::TandemError;

/// The environment variable consulted before prompting.
pub const PASSWORD_ENV_VAR: &str = "TANDEM_PASSWORD";

/// Get a new account password, confirming it when typed interactively.
///
/// Priority:
/// 1. `TANDEM_PASSWORD` environment variable (scripts, provisioning)
/// 2. Interactive TTY prompt via `rpassword`, entered twice
pub fn new_password() -> Result<SecretString, TandemError> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("Password: ");
        let first = read_line()?;
        if first.is_empty() {
            return Err(TandemError::Config("empty password not allowed".to_string()));
        }
        eprint!("Confirm password: ");
        let second = read_line()?;
        if first != second {
            return Err(TandemError::Config("passwords do not match".to_string()));
        }
        return Ok(SecretString::from(first));
    }

    Err(TandemError::Config(format!(
        "No password provided. Set {PASSWORD_ENV_VAR} or run interactively."
    )))
}

fn password_from_env() -> Option<SecretString> {
    std::env::var(PASSWORD_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(SecretString::from)
}

fn read_line() -> Result<String, TandemError> {
    rpassword::read_password()
        .map_err(|e| TandemError::Config(format!("failed to read password: {e}")))
}
