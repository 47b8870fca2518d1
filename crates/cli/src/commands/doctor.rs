//! `warmline doctor` — Diagnose configuration and storage health.

use warmline_config::AppConfig;
use warmline_store::SqliteStore;

pub async fn run() -> anyhow::Result<()> {
    println!("🩺 Warmline Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file — defaults and environment variables will be used");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue found. Fix the config before running other checks.");
            return Ok(());
        }
    };

    // Check model credential
    if config.has_model_key() {
        println!("  ✅ Model API key configured");
    } else {
        println!("  ⚠️  No model API key — set GROQ_API_KEY or add it to config.toml");
        issues += 1;
    }

    // Check payment credential
    if config.has_billing_key() {
        println!("  ✅ Payment secret key configured");
    } else {
        println!("  ⚠️  No payment secret key — checkout will be unavailable");
        issues += 1;
    }

    // Check durable storage
    match SqliteStore::new(&config.storage.sqlite_path).await {
        Ok(_) => println!(
            "  ✅ SQLite database reachable at {}",
            config.storage.sqlite_path
        ),
        Err(e) => {
            println!("  ❌ SQLite database unusable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
