//! Site command handlers.

use std::fmt::Write as _;

use tabled::Tabled;

use frpsite_core::SiteUpdate;
use frpsite_core::model::{Device, Site};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand, SitesListArgs, TagArgs, TagCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "CODE")]
    code: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TAGS")]
    tags: String,
    #[tabled(rename = "PORTS")]
    ports: String,
}

fn site_row(site: &Site) -> SiteRow {
    let ports: Vec<String> = site
        .configs
        .iter()
        .map(|c| {
            if c.is_pending() {
                format!("{}→?", c.service_port().unwrap_or_default())
            } else {
                format!("{}→{}", c.service_port().unwrap_or_default(), c.bind_port)
            }
        })
        .collect();
    SiteRow {
        mac: site.mac().to_string(),
        code: site.device.site_code.clone(),
        name: site.device.site_name.clone(),
        tags: site.device.tags.join(","),
        ports: ports.join(" "),
    }
}

fn site_detail(site: &Site) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MAC:      {}", site.mac());
    let _ = writeln!(out, "Code:     {}", site.device.site_code);
    let _ = writeln!(out, "Name:     {}", site.device.site_name);
    let _ = writeln!(out, "Tags:     {}", site.device.tags.join(", "));
    let _ = writeln!(out, "Proxies:");
    for config in &site.configs {
        let port = if config.is_pending() {
            "(pending)".to_owned()
        } else {
            config.bind_port.to_string()
        };
        let _ = writeln!(
            out,
            "  {:<28} {}:{} -> service {}",
            config.name,
            config.bind_addr,
            port,
            config.service_port().unwrap_or_default()
        );
    }
    out
}

pub async fn handle(args: SitesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SitesCommand::List(list_args) => list(list_args, global).await,
        SitesCommand::Show { mac } => show(&mac, global).await,
        SitesCommand::Add {
            mac,
            code,
            name,
            password,
            tags,
            no_defaults,
        } => add(&mac, code, name, password, tags, no_defaults, global).await,
        SitesCommand::Remove { mac } => remove(&mac, global).await,
        SitesCommand::Set {
            mac,
            new_mac,
            code,
            name,
            password,
        } => set(&mac, new_mac, code, name, password, global).await,
        SitesCommand::Tag(tag_args) => tag(tag_args, global).await,
    }
}

async fn list(args: SitesListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::open_loaded(global).await?;

    let by_tag: Vec<&Site> = match &args.tag {
        Some(tag) => session.registry.sites_with_tag(tag),
        None => session.registry.sites().iter().collect(),
    };
    let filtered: Vec<Site> = by_tag
        .into_iter()
        .filter(|site| matches_search(site, args.search.as_deref()))
        .cloned()
        .collect();

    let rendered = output::render_list(&global.output, &filtered, site_row, |site| {
        site.mac().to_string()
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn matches_search(site: &Site, search: Option<&str>) -> bool {
    let Some(term) = search else {
        return true;
    };
    let term = term.to_lowercase();
    site.device.site_code.to_lowercase().contains(&term)
        || site.device.site_name.to_lowercase().contains(&term)
        || site
            .device
            .tags
            .iter()
            .any(|t| t.to_lowercase().contains(&term))
}

async fn show(mac: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let session = util::open_loaded(global).await?;

    let site = session
        .registry
        .site(&mac)
        .ok_or_else(|| CliError::SiteNotFound {
            mac: mac.to_string(),
        })?;

    let rendered = output::render_single(&global.output, site, site_detail, |s| {
        s.mac().to_string()
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn add(
    mac: &str,
    code: Option<String>,
    name: Option<String>,
    password: Option<String>,
    tags: Option<Vec<String>>,
    no_defaults: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let mut session = util::open_loaded(global).await?;

    let mut device = Device::new(mac.clone());
    device.site_code = code.unwrap_or_default();
    device.site_name = name.unwrap_or_default();
    device.password = password.unwrap_or_default();
    device.tags = tags.unwrap_or_default();

    session.registry.add_site(Site::new(device))?;
    if !no_defaults {
        session.registry.provision_default_configs(&mac)?;
    }
    session.save().await?;

    if !global.quiet {
        eprintln!("Site {mac} registered");
    }
    Ok(())
}

async fn remove(mac: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    if !util::confirm(
        &format!("Remove site '{mac}' and all its proxies?"),
        global.yes,
    )? {
        return Ok(());
    }

    let mut session = util::open_loaded(global).await?;
    session.registry.delete_site(&mac)?;
    session.save().await?;

    if !global.quiet {
        eprintln!("Site {mac} removed");
    }
    Ok(())
}

async fn set(
    mac: &str,
    new_mac: Option<String>,
    code: Option<String>,
    name: Option<String>,
    password: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mac = util::parse_mac(mac)?;
    let new_mac = new_mac.as_deref().map(util::parse_mac).transpose()?;
    let mut session = util::open_loaded(global).await?;

    let update = SiteUpdate {
        mac: new_mac,
        site_code: code,
        site_name: name,
        password,
        ..SiteUpdate::default()
    };
    session.registry.update_site(&mac, update)?;
    session.save().await?;

    if !global.quiet {
        eprintln!("Site {mac} updated");
    }
    Ok(())
}

async fn tag(args: TagArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        TagCommand::Add { mac, tag } => {
            let mac = util::parse_mac(&mac)?;
            let mut session = util::open_loaded(global).await?;
            let added = session.registry.add_tag(&mac, &tag)?;
            if added {
                session.save().await?;
            }
            if !global.quiet {
                if added {
                    eprintln!("Tag '{}' added to {mac}", tag.trim());
                } else {
                    eprintln!("Tag '{}' already present on {mac}", tag.trim());
                }
            }
            Ok(())
        }

        TagCommand::Remove { mac, tag } => {
            let mac = util::parse_mac(&mac)?;
            let mut session = util::open_loaded(global).await?;
            let removed = session.registry.remove_tag(&mac, &tag)?;
            if removed {
                session.save().await?;
            }
            if !global.quiet {
                if removed {
                    eprintln!("Tag '{tag}' removed from {mac}");
                } else {
                    eprintln!("Tag '{tag}' was not set on {mac}");
                }
            }
            Ok(())
        }

        TagCommand::List => {
            let session = util::open_loaded(global).await?;
            let tags = session.registry.all_tags();
            output::print_output(&tags.join("\n"), global.quiet);
            Ok(())
        }
    }
}
