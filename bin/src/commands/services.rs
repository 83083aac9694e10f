//! Services command implementation.

use anyhow::Result;
use arcstream_lib::prelude::*;

/// List the registered services and their transports.
pub(crate) fn list_services() -> Result<()> {
    let registry = ServiceRegistry::global();

    println!("{:<10} {:<10} {}", "NAME", "SCHEME", "DESCRIPTION");
    println!("{}", "-".repeat(60));

    for name in registry.names() {
        if let Some(service) = registry.get(name) {
            println!(
                "{:<10} {:<10} {}",
                service.name(),
                service.kind().scheme(),
                service.description()
            );
        }
    }

    println!("\nTotal: {} services", registry.len());
    Ok(())
}
