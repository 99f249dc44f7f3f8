use anyhow::Context;
use clap::{Arg, Command};
use log::LevelFilter;
use send_as_alias::{find_matching_alias, Identity, RecipientRef, Settings};
use std::process;

fn main() {
    let matches = Command::new("send-as-alias")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Offline tooling for the alias-resolution engine: inspect settings and probe alias matching")
        .arg(
            Arg::new("settings")
                .short('s')
                .long("settings")
                .value_name("FILE")
                .help("Settings document (JSON)")
                .default_value("settings.json"),
        )
        .arg(
            Arg::new("identities")
                .short('i')
                .long("identities")
                .value_name("FILE")
                .help("Identity list (JSON array)"),
        )
        .arg(
            Arg::new("generate-settings")
                .long("generate-settings")
                .value_name("FILE")
                .help("Write a default settings document and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("check-settings")
                .long("check-settings")
                .help("Validate the settings document and report configured accounts")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("probe")
                .long("probe")
                .value_name("RECIPIENT")
                .help("Run the alias matcher against a recipient (repeatable; needs --identities)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-settings") {
        if let Err(e) = generate_settings(path) {
            log::error!("failed to generate settings: {e:#}");
            process::exit(1);
        }
        println!("Default settings written to: {path}");
        return;
    }

    let settings_path = matches.get_one::<String>("settings").unwrap();

    if matches.get_flag("check-settings") {
        match check_settings(settings_path) {
            Ok(report) => println!("{report}"),
            Err(e) => {
                log::error!("settings check failed: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    let probes: Vec<String> = matches
        .get_many::<String>("probe")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if !probes.is_empty() {
        let Some(identities_path) = matches.get_one::<String>("identities") else {
            log::error!("--probe requires --identities");
            process::exit(1);
        };
        if let Err(e) = probe(settings_path, identities_path, &probes) {
            log::error!("probe failed: {e:#}");
            process::exit(1);
        }
        return;
    }

    log::error!("nothing to do; try --check-settings, --generate-settings or --probe");
    process::exit(1);
}

fn load_settings(path: &str) -> anyhow::Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read settings file {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("invalid settings document {path}"))
}

fn load_identities(path: &str) -> anyhow::Result<Vec<Identity>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read identities file {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("invalid identity list {path}"))
}

fn generate_settings(path: &str) -> anyhow::Result<()> {
    let settings = Settings::default();
    let content = serde_json::to_string_pretty(&settings)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn check_settings(path: &str) -> anyhow::Result<String> {
    let settings = load_settings(path)?;
    let mut report = String::new();
    report.push_str(&format!(
        "Settings OK: {} configured account(s)\n",
        settings.account_settings.len()
    ));
    report.push_str(&format!(
        "  offerIdentityCreation: {}\n",
        settings.offer_identity_creation
    ));
    report.push_str(&format!(
        "  skipIdentityCreation: {} entr(ies)\n",
        settings.skip_identity_creation.len()
    ));
    for (id, account) in &settings.account_settings {
        report.push_str(&format!(
            "  {}: detection={} suggestions={} method={} suppressed={}\n",
            id,
            account.detection_enabled,
            account.suggestions_enabled,
            account.alias_method.as_str(),
            account.suggestion_dont_ask.len()
        ));
    }
    Ok(report.trim_end().to_string())
}

fn probe(settings_path: &str, identities_path: &str, probes: &[String]) -> anyhow::Result<()> {
    let settings = load_settings(settings_path)?;
    let identities = load_identities(identities_path)?;
    let recipients: Vec<RecipientRef> = probes
        .iter()
        .map(|s| RecipientRef::from(s.as_str()))
        .collect();

    match find_matching_alias(&recipients, &identities, |id| settings.account(id)) {
        Some(found) => {
            println!(
                "Match: {} -> identity {} <{}> (method: {})",
                found.alias,
                found.identity.name,
                found.identity.email,
                found.method.as_str()
            );
        }
        None => println!("No alias match"),
    }
    Ok(())
}
