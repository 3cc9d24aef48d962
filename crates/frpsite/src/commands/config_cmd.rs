//! CLI configuration management: profiles, defaults, keyring.

use dialoguer::{Confirm, Input, Password};

use frpsite_config::{Config, Profile};

use crate::cli::{ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(command: ConfigCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        ConfigCommand::Init => init(global),
        ConfigCommand::Show => show(global),
        ConfigCommand::Profiles => profiles(global),
        ConfigCommand::Use { name } => use_profile(&name, global),
        ConfigCommand::SetPassword { profile } => set_password(profile, global),
    }
}

/// Guided setup: one profile, written to the canonical config path.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = frpsite_config::load_config_or_default();

    let name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(io_err)?;

    let host: String = Input::new()
        .with_prompt("frpc host")
        .default("localhost".into())
        .interact_text()
        .map_err(io_err)?;

    let port: String = Input::new()
        .with_prompt("Admin port (empty to probe at runtime)")
        .allow_empty(true)
        .interact_text()
        .map_err(io_err)?;
    let admin_port = if port.trim().is_empty() {
        None
    } else {
        Some(port.trim().parse().map_err(|_| CliError::Validation {
            field: "admin_port".into(),
            reason: format!("'{port}' is not a port number"),
        })?)
    };

    let username: String = Input::new()
        .with_prompt("Admin username")
        .default("admin".into())
        .interact_text()
        .map_err(io_err)?;

    let mut profile = Profile {
        host,
        admin_port,
        username,
        ..Profile::default()
    };

    if Confirm::new()
        .with_prompt("Store the admin password in the system keyring?")
        .default(true)
        .interact()
        .map_err(io_err)?
    {
        let password = Password::new()
            .with_prompt("Admin password")
            .interact()
            .map_err(io_err)?;
        frpsite_config::store_admin_password(&name, &password)?;
    } else {
        let password: String = Input::new()
            .with_prompt("Admin password (stored in plaintext; empty for frpc default)")
            .allow_empty(true)
            .interact_text()
            .map_err(io_err)?;
        if !password.is_empty() {
            profile.password = Some(password);
        }
    }

    cfg.default_profile = Some(name.clone());
    cfg.profiles.insert(name.clone(), profile);
    frpsite_config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!(
            "Profile '{name}' written to {}",
            frpsite_config::config_path().display()
        );
    }
    Ok(())
}

/// Print the resolved active profile as TOML (passwords elided).
fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let (mut profile, name) = config::resolve_profile(global)?;
    profile.password = profile.password.map(|_| "<set>".into());

    let rendered = toml::to_string_pretty(&profile).map_err(|e| CliError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    println!("# profile: {name}");
    print!("{rendered}");
    Ok(())
}

fn profiles(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = frpsite_config::load_config_or_default();
    let active = config::active_profile_name(global, &cfg);

    let mut names: Vec<&String> = cfg.profiles.keys().collect();
    names.sort_unstable();
    for name in names {
        if *name == active {
            println!("{name} (active)");
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

fn use_profile(name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = frpsite_config::load_config_or_default();
    if !cfg.profiles.contains_key(name) {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: name.to_owned(),
            available: available.join(", "),
        });
    }

    cfg.default_profile = Some(name.to_owned());
    frpsite_config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!("Default profile set to '{name}'");
    }
    Ok(())
}

fn set_password(profile: Option<String>, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = frpsite_config::load_config_or_default();
    let name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

    let password = Password::new()
        .with_prompt(format!("Admin password for profile '{name}'"))
        .interact()
        .map_err(io_err)?;
    frpsite_config::store_admin_password(&name, &password)?;

    if !global.quiet {
        eprintln!("Password stored in the system keyring");
    }
    Ok(())
}

fn io_err(err: dialoguer::Error) -> CliError {
    CliError::Io(std::io::Error::other(err))
}
