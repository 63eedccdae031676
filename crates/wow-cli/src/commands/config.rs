use std::env;
use std::path::PathBuf;

use wow_core::config::{SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};
use wow_core::util::is_http_url;

use crate::cli::ConfigCommands;
use crate::config_profiles::{
    default_config_path, normalize_text_option, resolve_guest_dir, CliProfile, CliProfilesConfig,
    GUEST_DIR_ENV,
};
use crate::error::CliError;

/// `--profile` selects the profile to write; `--guest-dir` is stored in it.
pub fn run_config(
    command: ConfigCommands,
    profile: Option<&str>,
    guest_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            redirect_url,
            no_activate,
        } => run_config_init(
            profile,
            ProfileUpdate {
                supabase_url,
                supabase_anon_key,
                redirect_url,
                guest_dir,
            },
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(profile),
    }
}

/// Values given on the command line for `config init`.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub redirect_url: Option<String>,
    pub guest_dir: Option<PathBuf>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let env_values = ProfileUpdate {
        supabase_url: normalize_text_option(env::var(SUPABASE_URL_ENV).ok()),
        supabase_anon_key: normalize_text_option(env::var(SUPABASE_ANON_KEY_ENV).ok()),
        redirect_url: None,
        guest_dir: None,
    };
    merge_profile(config.profile_mut_or_default(&profile_name), update, env_values)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_backend_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `wow auth login --email <email>` to sign in."
        );
    } else {
        println!(
            "Profile '{}' has no backend ({} missing); notes stay on this device.",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Apply explicit values over environment values over what the profile had.
pub fn merge_profile(
    profile: &mut CliProfile,
    explicit: ProfileUpdate,
    env_values: ProfileUpdate,
) -> Result<(), CliError> {
    if let Some(value) = normalize_text_option(explicit.supabase_url)
        .or(env_values.supabase_url)
        .or_else(|| profile.supabase_url())
    {
        profile.supabase_url = Some(value);
    }
    if let Some(value) = normalize_text_option(explicit.supabase_anon_key)
        .or(env_values.supabase_anon_key)
        .or_else(|| profile.supabase_anon_key())
    {
        profile.supabase_anon_key = Some(value);
    }
    if let Some(value) = normalize_text_option(explicit.redirect_url) {
        profile.redirect_url = Some(value);
    }
    if let Some(dir) = explicit.guest_dir {
        profile.guest_dir = Some(dir);
    }

    validate_profile_urls(profile)
}

pub fn missing_backend_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing_fields = Vec::new();
    if profile.supabase_url().is_none() {
        missing_fields.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing_fields.push("supabase_anon_key");
    }
    missing_fields
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let guest_dir = resolve_guest_dir(
        None,
        env::var_os(GUEST_DIR_ENV).map(PathBuf::from),
        Some(&profile),
        &profile_name,
    );

    println!("Config file:  {}", default_config_path().display());
    println!("Profile:      {profile_name}");
    println!(
        "Supabase URL: {}",
        profile.supabase_url().as_deref().unwrap_or("(not set)")
    );
    println!(
        "Anon key:     {}",
        if profile.supabase_anon_key().is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!(
        "Redirect URL: {}",
        profile.redirect_url().as_deref().unwrap_or("(not set)")
    );
    println!("Guest data:   {}", guest_dir.display());
    Ok(())
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(url) = profile.redirect_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "redirect_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
