//! Interactive setup — enter provider credentials from the console,
//! test them with one sample request, and pick the active provider.

use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::config::{self, Config};
use crate::credentials::{self, CredentialStore};
use crate::provider::{self, Provider};

pub fn run(mut cfg: Config) -> Result<()> {
    println!("snapquiz setup");
    println!("==============");
    loop {
        println!();
        print_status(&cfg);
        println!();
        println!("  1) Configure Google Gemini");
        println!("  2) Configure AWS Bedrock");
        println!("  3) Configure both providers");
        println!("  4) Switch active provider");
        println!("  5) Test active provider connection");
        println!("  0) Save and exit");

        match prompt("Select an option")?.as_str() {
            "1" => setup_gemini(&mut cfg)?,
            "2" => setup_bedrock(&mut cfg)?,
            "3" => {
                setup_gemini(&mut cfg)?;
                setup_bedrock(&mut cfg)?;
                cfg.provider.active = Provider::Gemini;
                println!("Both providers configured. Gemini is active; switch any time.");
            }
            "4" => switch_provider(&mut cfg),
            "5" => {
                test_provider(&cfg, cfg.provider.active);
            }
            "0" => break,
            other => {
                println!("Unknown option {other:?}");
                continue;
            }
        }
        config::save_config(&cfg).context("failed to save configuration")?;
    }
    config::save_config(&cfg).context("failed to save configuration")?;
    println!("Configuration saved.");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn setup_gemini(cfg: &mut Config) -> Result<()> {
    println!();
    println!("GOOGLE GEMINI SETUP");
    println!("-------------------");

    let api_key = loop {
        let key = prompt("Enter Gemini API key")?;
        if key.is_empty() {
            println!("API key cannot be empty");
            continue;
        }
        if key.len() < 20 {
            println!("API key too short, please check again");
            continue;
        }
        if !key.starts_with("AIza") {
            println!("Warning: Gemini API keys usually start with \"AIza\"");
            if prompt("Continue anyway? (y/N)")?.to_lowercase() != "y" {
                continue;
            }
        }
        break key;
    };

    cfg.credentials.gemini = Some(credentials::store_gemini(&api_key, false));
    let verified = test_provider(cfg, Provider::Gemini);
    if let Some(stored) = cfg.credentials.gemini.as_mut() {
        stored.verified = verified;
    }
    if verified {
        println!("Gemini setup completed successfully.");
    } else {
        println!("Setup completed but the API test failed. You can still use the app; please double-check the key.");
    }
    Ok(())
}

fn setup_bedrock(cfg: &mut Config) -> Result<()> {
    println!();
    println!("AWS BEDROCK SETUP");
    println!("-----------------");

    let mut region = prompt("Enter AWS region (default: us-east-1)")?;
    if region.is_empty() {
        region = "us-east-1".into();
    }

    let access_key = loop {
        let value = prompt("Enter AWS Access Key ID")?;
        if value.is_empty() {
            println!("Access Key ID cannot be empty");
            continue;
        }
        break value;
    };

    let secret_key = loop {
        let value = prompt("Enter AWS Secret Access Key")?;
        if value.is_empty() {
            println!("Secret Access Key cannot be empty");
            continue;
        }
        break value;
    };

    let session_token = prompt("Enter AWS Session Token (optional, press Enter to skip)")?;
    let session_token = if session_token.is_empty() {
        None
    } else {
        Some(session_token)
    };

    cfg.credentials.bedrock = Some(credentials::store_bedrock(
        &access_key,
        &secret_key,
        session_token.as_deref(),
        &region,
        false,
    ));
    let verified = test_provider(cfg, Provider::Bedrock);
    if let Some(stored) = cfg.credentials.bedrock.as_mut() {
        stored.verified = verified;
    }
    if verified {
        println!("Bedrock setup completed successfully.");
    } else {
        println!("Setup completed but the API test failed. You can still use the app; please double-check the credentials.");
    }
    Ok(())
}

/// One sample request against the provider. Prints the outcome.
fn test_provider(cfg: &Config, target: Provider) -> bool {
    println!("Testing {} connection...", target.as_str().to_uppercase());
    let creds = CredentialStore::new(cfg.credentials.clone());
    let client = match provider::create_analyzer(target, &cfg.provider, &creds) {
        Ok(client) => client,
        Err(e) => {
            println!("Cannot build {target} client: {e:#}");
            return false;
        }
    };
    match client.test_connection() {
        Ok(()) => {
            println!("{} connection OK.", target.as_str().to_uppercase());
            true
        }
        Err(e) => {
            println!("{} connection failed: {e:#}", target.as_str().to_uppercase());
            false
        }
    }
}

/// Same gate as the runtime switch: the target must have stored credentials.
fn switch_provider(cfg: &mut Config) {
    let target = cfg.provider.active.other();
    let creds = CredentialStore::new(cfg.credentials.clone());
    if !creds.is_configured(target) {
        println!(
            "{} is not configured. Configure it first (option {}).",
            target.as_str().to_uppercase(),
            match target {
                Provider::Gemini => 1,
                Provider::Bedrock => 2,
            }
        );
        return;
    }
    cfg.provider.active = target;
    println!("Active provider is now {}.", target.as_str().to_uppercase());
}

fn print_status(cfg: &Config) {
    let creds = CredentialStore::new(cfg.credentials.clone());
    println!(
        "Active provider: {}",
        cfg.provider.active.as_str().to_uppercase()
    );
    for target in [Provider::Gemini, Provider::Bedrock] {
        let state = if creds.is_configured(target) {
            if creds.is_verified(target) {
                "configured, verified"
            } else {
                "configured, not verified"
            }
        } else {
            "not configured"
        };
        println!("  {:<8} {state}", target.as_str());
    }
}
