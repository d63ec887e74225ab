//! Lists the platforms the update API publishes releases for.

use console::style;
use windsurf_updater::platform::{host_key, Platform, SUPPORTED_PLATFORMS};

use crate::error::CliError;

/// Print the platform table, marking the running host.
pub fn run() -> Result<(), CliError> {
    let host = Platform::current();

    println!("Supported Platforms");
    println!("===================");
    println!();
    println!("  {:<15} {:<18} {}", "PLATFORM", "API TOKEN", "INSTALL");

    for platform in SUPPORTED_PLATFORMS {
        let marker = if host == Some(*platform) {
            format!(" {}", style("(this machine)").green())
        } else {
            String::new()
        };
        println!(
            "  {:<15} {:<18} {}{}",
            platform.key,
            platform.token,
            install_mode(platform),
            marker
        );
    }

    if host.is_none() {
        println!();
        println!(
            "This machine ({}) has no update channel; pass --platform to pick one.",
            host_key()
        );
    }

    Ok(())
}

fn install_mode(platform: &Platform) -> &'static str {
    if platform.is_auto_installable() {
        "automatic"
    } else {
        "manual"
    }
}
