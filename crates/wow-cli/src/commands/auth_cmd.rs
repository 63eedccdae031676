use chrono::DateTime;
use wow_core::auth::{parse_auth_callback, CallbackOutcome};

use crate::auth::clear_stored_session;
use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_auth(context: &AppContext, command: AuthCommands) -> Result<(), CliError> {
    let profile_name = &context.profile_name;
    match command {
        AuthCommands::Login { email, redirect_to } => {
            let auth = context.require_auth()?;
            let redirect_to = redirect_to.or_else(|| context.profile.redirect_url());
            auth.send_magic_link(&email, redirect_to.as_deref())
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!("Check {} for a sign-in link.", email.trim());
            println!("Then run `wow auth callback '<link URL>'` on this device.");
            Ok(())
        }
        AuthCommands::Callback { url_or_code } => {
            let auth = context.require_auth()?;
            let code = code_from_callback_input(&url_or_code)?;
            let session = auth
                .exchange_code(&code)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");

            let guest_notes = context.notebook.local().list_notes().len();
            if guest_notes > 0 {
                println!(
                    "{guest_notes} guest note(s) are still on this device. Run `wow migrate` to upload them."
                );
            }
            Ok(())
        }
        AuthCommands::Status => {
            if context.auth.is_none() {
                println!("Profile '{profile_name}' has no backend configured; using guest mode.");
                return Ok(());
            }
            if let Some(session) = context.state.session() {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                let expires = DateTime::from_timestamp(session.expires_at, 0).map_or_else(
                    || session.expires_at.to_string(),
                    |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                );
                println!(
                    "Profile '{profile_name}' is signed in as {email_label} (expires {expires})"
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            if let Some(auth) = &context.auth {
                auth.sign_out()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            } else {
                clear_stored_session(profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

/// Accept either the full redirect URL from the email link or a bare code.
pub fn code_from_callback_input(input: &str) -> Result<String, CliError> {
    let input = input.trim();
    if !input.contains('=') {
        if input.is_empty() {
            return Err(CliError::Auth("No authentication code provided".to_string()));
        }
        return Ok(input.to_string());
    }

    let callback = parse_auth_callback(input).map_err(|error| CliError::Auth(error.to_string()))?;
    match callback.outcome {
        CallbackOutcome::Code(code) => Ok(code),
        CallbackOutcome::Denied { error, description } => Err(CliError::Auth(
            description.unwrap_or(error),
        )),
    }
}
