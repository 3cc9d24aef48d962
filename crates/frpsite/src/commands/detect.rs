//! Admin-port detection handler.

use frpsite_api::{DEFAULT_PROBE_PORTS, detect_admin_port};

use crate::cli::{DetectArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: DetectArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (profile, profile_name) = config::resolve_profile(global)?;
    let transport = frpsite_config::profile_to_transport(&profile);
    let auth = frpsite_config::resolve_admin_auth(&profile, &profile_name);

    let host = args.host.unwrap_or_else(|| profile.host.clone());
    let candidates = args.ports.unwrap_or_else(|| DEFAULT_PROBE_PORTS.to_vec());

    match detect_admin_port(&host, &candidates, Some(&auth), &transport).await {
        Some(port) => {
            println!("{port}");
            if !global.quiet {
                eprintln!("frpc admin port detected on {host}:{port}");
                eprintln!("Pin it with: frpsite config init");
            }
            Ok(())
        }
        None => Err(CliError::NoAdminPort { host }),
    }
}
