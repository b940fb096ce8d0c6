//! `kickoff capabilities`: List owners, their capabilities and the commands
//! that reach them.

use kickoff_config::AppConfig;
use kickoff_routing::CATALOG;

use super::inspection_pipeline;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = inspection_pipeline(&config)?;
    let table = pipeline.registry().snapshot();
    let fallback = pipeline.selector().fallback_owner();

    println!("🧭 Capability owners ({} capabilities)\n", table.len());
    for owner in table.owners() {
        let marker = if owner.id == fallback { " (fallback)" } else { "" };
        println!("  {}{marker}", owner.id);
        println!("    {}", owner.purpose);
        for capability in table.get_capabilities_for(&owner.id) {
            let kind = if capability.is_mutating() { "write" } else { "read" };
            println!("    - {:<28} [{kind}] {}", capability.name, capability.description);
        }
        println!();
    }

    println!("💬 Commands\n");
    for spec in CATALOG {
        let gate = spec.gate.unwrap_or("-");
        println!("  /{:<12} → {:<20} gate: {gate}", spec.command, spec.owner);
        println!("    {}", spec.summary);
    }

    Ok(())
}
