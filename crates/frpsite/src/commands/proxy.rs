//! Proxy-config command handlers.

use tabled::Tabled;

use frpsite_core::SiteUpdate;
use frpsite_core::model::ProxyConfig;

use crate::cli::{GlobalOpts, ProxyArgs, ProxyCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ProxyRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    proxy_type: String,
    #[tabled(rename = "SERVER")]
    server_name: String,
    #[tabled(rename = "BIND")]
    bind: String,
}

fn proxy_row(config: &ProxyConfig) -> ProxyRow {
    let bind = if config.is_pending() {
        format!("{}:(pending)", config.bind_addr)
    } else {
        format!("{}:{}", config.bind_addr, config.bind_port)
    };
    ProxyRow {
        name: config.name.clone(),
        proxy_type: config.proxy_type.clone(),
        server_name: config.server_name.clone(),
        bind,
    }
}

pub async fn handle(args: ProxyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ProxyCommand::List { mac } => list(&mac, global).await,
        ProxyCommand::Add {
            mac,
            service_port,
            bind_addr,
            bind_port,
        } => add(&mac, service_port, bind_addr, bind_port, global).await,
        ProxyCommand::Remove { mac, name } => remove(&mac, &name, global).await,
    }
}

async fn list(mac: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let session = util::open_loaded(global).await?;
    let site = session
        .registry
        .site(&mac)
        .ok_or_else(|| CliError::SiteNotFound {
            mac: mac.to_string(),
        })?;

    let rendered = output::render_list(&global.output, &site.configs, proxy_row, |config| {
        config.name.clone()
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn add(
    mac: &str,
    service_port: u16,
    bind_addr: String,
    bind_port: u16,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let mut session = util::open_loaded(global).await?;
    let site = session
        .registry
        .site(&mac)
        .ok_or_else(|| CliError::SiteNotFound {
            mac: mac.to_string(),
        })?;

    let mut proxy = ProxyConfig::visitor(session.registry.proxy_prefix(), &mac, service_port);
    proxy.bind_addr = bind_addr;
    proxy.bind_port = bind_port;

    if site.configs.iter().any(|c| c.name == proxy.name) {
        return Err(CliError::Conflict {
            what: format!("Proxy '{}' already exists on this site", proxy.name),
        });
    }

    let mut configs = site.configs.clone();
    configs.push(proxy);
    session.registry.update_site(&mac, SiteUpdate::configs(configs))?;
    let outcome = session.save().await?;

    if !global.quiet {
        if outcome.resolved_ports > 0 {
            eprintln!("Proxy added to {mac} (bind port allocated on save)");
        } else {
            eprintln!("Proxy added to {mac}");
        }
    }
    Ok(())
}

async fn remove(mac: &str, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let mut session = util::open_loaded(global).await?;
    let site = session
        .registry
        .site(&mac)
        .ok_or_else(|| CliError::SiteNotFound {
            mac: mac.to_string(),
        })?;

    if !site.configs.iter().any(|c| c.name == name) {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: format!("site {mac} has no proxy named '{name}'"),
        });
    }

    let configs: Vec<ProxyConfig> = site
        .configs
        .iter()
        .filter(|c| c.name != name)
        .cloned()
        .collect();
    session.registry.update_site(&mac, SiteUpdate::configs(configs))?;
    session.save().await?;

    if !global.quiet {
        eprintln!("Proxy '{name}' removed from {mac}");
    }
    Ok(())
}
