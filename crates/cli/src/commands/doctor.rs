//! `kickoff doctor`: Diagnose configuration and collaborators.

use kickoff_config::AppConfig;
use kickoff_core::backend::ExecutionBackend;
use kickoff_core::scope::ChatScope;
use kickoff_dispatch::HttpBackend;

use super::{inspection_pipeline, load_provider};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Kickoff Doctor — Diagnostics");
    println!("==============================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running further checks.");
            return Ok(());
        }
    };

    // Registry and route table are checked by building the pipeline
    match inspection_pipeline(&config) {
        Ok(pipeline) => {
            let table = pipeline.registry().snapshot();
            println!(
                "  ✅ Registry loaded: {} owners, {} capabilities",
                table.owners().count(),
                table.len()
            );
            println!(
                "  ✅ Route table valid ({} rules, fallback '{}')",
                pipeline.selector().table().len(),
                pipeline.selector().fallback_owner()
            );
            let guarded = pipeline
                .selector()
                .table()
                .rules()
                .filter(|r| r.chat_scope == Some(ChatScope::Restricted))
                .count();
            println!("  ✅ {guarded} restricted-chat route(s)");
        }
        Err(e) => {
            println!("  ❌ Pipeline cannot start: {e}");
            issues += 1;
        }
    }

    if config.membership.provider_url.is_none() && config.membership.roster_path.is_none() {
        println!("  ⚠️  No membership provider — every requester resolves as a guest");
        issues += 1;
    } else {
        match load_provider(&config) {
            Ok(provider) => match provider.teams().await {
                Ok(teams) => println!(
                    "  ✅ Membership provider '{}' reachable ({} teams)",
                    provider.name(),
                    teams.len()
                ),
                Err(e) => {
                    println!("  ❌ Membership provider '{}' failing: {e}", provider.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Membership provider misconfigured: {e}");
                issues += 1;
            }
        }
    }

    match HttpBackend::from_config(&config.dispatch) {
        Ok(Some(backend)) => match backend.health_check().await {
            Ok(true) => println!("  ✅ Execution backend reachable at {}", backend.base_url()),
            Ok(false) => {
                println!("  ❌ Execution backend unhealthy at {}", backend.base_url());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Execution backend unreachable: {e}");
                issues += 1;
            }
        },
        Ok(None) => {
            println!("  ⚠️  No execution backend — set dispatch.backend_url or KICKOFF_BACKEND_URL");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Execution backend misconfigured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
