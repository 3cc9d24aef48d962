//! Pull / push / show-config handlers.

use frpsite_core::transcode;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

/// Load the live configuration and report what came in.
pub async fn pull(global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = util::open_session(global).await?;
    let outcome = session.load().await?;

    if !global.quiet {
        eprintln!(
            "Loaded {} sites, {} proxies ({} parse warnings)",
            outcome.site_count, outcome.proxy_count, outcome.warning_count
        );
    }
    Ok(())
}

/// Re-push the live configuration. This is the retry path after a
/// reload failure, and resolves any pending bind ports left by earlier
/// hand-edits.
pub async fn push(global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = util::open_loaded(global).await?;
    let outcome = session.save().await?;

    if !global.quiet {
        eprintln!(
            "Pushed {} sites ({} bytes, {} ports allocated)",
            outcome.site_count, outcome.bytes, outcome.resolved_ports
        );
    }
    Ok(())
}

/// Print the INI that a push would write, without pushing it.
pub async fn show_config(global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::open_loaded(global).await?;
    let doc = session.registry.snapshot_config()?;
    output::print_output(&transcode::generate(&doc), global.quiet);
    Ok(())
}
