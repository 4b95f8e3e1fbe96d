//! # Heirvault CLI
//!
//! Command line front end for the Heirvault engine: validate inheritance
//! vault configurations, keep vaults encrypted on disk, and run the check-in
//! monitor.
//!
//! ```bash
//! # Inspect the built-in presets and validate a custom configuration
//! heirvault presets
//! heirvault validate --infra nostr --primary dead_man_switch --gate challenge
//!
//! # Create a vault from a preset (passphrase from HEIRVAULT_PASSPHRASE or stdin)
//! heirvault create --name "Family" --preset dead-man-switch --inactivity-days 90 \
//!     --owner-contact me@example.com \
//!     --key owner:owner:02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5 \
//!     --beneficiary alice:0:100:alice@example.com
//!
//! # Check in and watch for reminders
//! heirvault check-in <vault-id>
//! heirvault monitor
//! ```

use anyhow::{anyhow, bail, Context, Result};
use bitcoin::Network;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use heirvault::compat::{
    presets, CompatibilityEngine, Infrastructure, Logic, Modifier, OptionAvailability, RuleSet,
    ValidationResult, VaultConfiguration,
};
use heirvault::config::{env as config_env, Settings};
use heirvault::lifecycle::{CheckInMonitor, MonitorConfig, SystemClock};
use heirvault::services::{HttpEmailSender, LogNotifier, Notifier, VaultManager};
use heirvault::utils::{display, time};
use heirvault::vaults::{Beneficiary, EnvelopeCipher, KeyDescriptor, KeyRole, Timelock, VaultData, VaultId};
use heirvault::VaultStore;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "heirvault")]
#[command(about = "Bitcoin inheritance vaults: validate, encrypt, and monitor check-ins")]
struct Cli {
    /// Vault data directory (overrides HEIRVAULT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON rule set replacing the built-in compatibility rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Draft configuration given on the command line
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Start from a preset
    #[arg(long)]
    preset: Option<String>,
    /// Infrastructure options (comma separated)
    #[arg(long = "infra", value_delimiter = ',')]
    infrastructure: Vec<Infrastructure>,
    /// Primary inheritance logic
    #[arg(long)]
    primary: Option<Logic>,
    /// Additional logic gates (comma separated)
    #[arg(long = "gate", value_delimiter = ',')]
    gates: Vec<Logic>,
    /// Release modifiers (comma separated)
    #[arg(long = "modifier", value_delimiter = ',')]
    modifiers: Vec<Modifier>,
}

impl ConfigArgs {
    fn to_configuration(&self) -> Result<VaultConfiguration> {
        let mut config = match (&self.preset, self.primary) {
            (Some(id), _) => {
                let preset = presets::find(id).ok_or_else(|| anyhow!("Unknown preset: {}", id))?;
                let mut config = preset.config.clone();
                if let Some(primary) = self.primary {
                    config.gates.remove(&primary);
                    config.primary_logic = primary;
                }
                config
            }
            (None, Some(primary)) => VaultConfiguration::new(primary),
            (None, None) => bail!("Either --preset or --primary is required"),
        };
        config.infrastructure.extend(self.infrastructure.iter().copied());
        config.gates.extend(self.gates.iter().copied());
        config.modifiers.extend(self.modifiers.iter().copied());
        Ok(config.canonical())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in configuration presets
    Presets,
    /// Validate a draft configuration
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which options can still be added to a draft configuration
    Options {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Create and encrypt a new vault
    Create {
        /// Vault name
        #[arg(short, long)]
        name: String,
        /// Free-text description
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        config: ConfigArgs,
        /// Bitcoin network the keys belong to
        #[arg(long, default_value = "signet")]
        network: Network,
        /// Public key as label:role:hex (role: owner, heir, backup, oracle)
        #[arg(long = "key")]
        keys: Vec<String>,
        /// Beneficiary as label:key_index:percentage[:contact]
        #[arg(long = "beneficiary")]
        beneficiaries: Vec<String>,
        /// Time lock as height:purpose
        #[arg(long = "timelock")]
        timelocks: Vec<String>,
        /// Check-in interval for a dead man's switch
        #[arg(long)]
        inactivity_days: Option<u32>,
        /// Unlock date (RFC 3339) for time-locked vaults
        #[arg(long)]
        lock_date: Option<DateTime<Utc>>,
        /// Email address for check-in reminders
        #[arg(long)]
        owner_contact: Option<String>,
    },
    /// List stored vaults
    List,
    /// Decrypt and show a vault
    Show {
        vault_id: VaultId,
        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a vault's record with the JSON in a file
    Update {
        vault_id: VaultId,
        /// File holding the full record as printed by `show --json`
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a vault
    Delete { vault_id: VaultId },
    /// Write an export document for a vault
    Export {
        vault_id: VaultId,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import an export document or compact token
    Import {
        /// Export document to restore
        file: Option<PathBuf>,
        /// Compact token instead of a file
        #[arg(long)]
        qr: Option<String>,
        /// Only verify the document, do not store it
        #[arg(long)]
        verify_only: bool,
    },
    /// Print a compact transfer token for a vault
    Qr { vault_id: VaultId },
    /// Record proof of life for a vault
    CheckIn { vault_id: VaultId },
    /// Show check-in urgency of one or all vaults
    Status { vault_id: Option<VaultId> },
    /// Run the check-in monitor until interrupted
    Monitor {
        /// Run a single sweep and exit
        #[arg(long)]
        once: bool,
    },
}

struct App {
    settings: Settings,
    engine: CompatibilityEngine,
    store: VaultStore,
}

impl App {
    fn load(cli: &Cli) -> Result<Self> {
        let mut settings = Settings::from_env();
        if let Some(dir) = &cli.data_dir {
            settings.data_dir = dir.clone();
        }

        let engine = match &cli.rules {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading rules from {}", path.display()))?;
                CompatibilityEngine::new(RuleSet::from_json(&json)?)
            }
            None => CompatibilityEngine::default(),
        };

        let store = VaultStore::open(&settings.data_dir);
        Ok(Self {
            settings,
            engine,
            store,
        })
    }

    fn manager(&self) -> VaultManager {
        VaultManager::new(
            self.store.clone(),
            EnvelopeCipher::new(),
            self.engine.clone(),
            Arc::new(SystemClock),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let ctx = App::load(&cli)?;

    match cli.command {
        Commands::Presets => show_presets(&ctx),
        Commands::Validate { config, json } => validate(&ctx, &config, json),
        Commands::Options { config } => show_options(&ctx, &config),
        Commands::Create {
            name,
            description,
            config,
            network,
            keys,
            beneficiaries,
            timelocks,
            inactivity_days,
            lock_date,
            owner_contact,
        } => {
            let mut record = VaultData::from_configuration(name, &config.to_configuration()?, network, Utc::now());
            record.description = description;
            record.keys = keys.iter().map(|k| parse_key(k)).collect::<Result<_>>()?;
            record.beneficiaries = beneficiaries
                .iter()
                .map(|b| parse_beneficiary(b))
                .collect::<Result<_>>()?;
            record.timelocks = timelocks.iter().map(|t| parse_timelock(t)).collect::<Result<_>>()?;
            record.inactivity_days = inactivity_days;
            record.lock_date = lock_date;
            record.owner_contact = owner_contact;
            create(&ctx, record).await
        }
        Commands::List => list(&ctx).await,
        Commands::Show { vault_id, json } => show(&ctx, &vault_id, json).await,
        Commands::Update { vault_id, file } => update(&ctx, &vault_id, &file).await,
        Commands::Delete { vault_id } => delete(&ctx, &vault_id).await,
        Commands::Export { vault_id, output } => export(&ctx, &vault_id, output).await,
        Commands::Import {
            file,
            qr,
            verify_only,
        } => import(&ctx, file, qr, verify_only).await,
        Commands::Qr { vault_id } => qr(&ctx, &vault_id).await,
        Commands::CheckIn { vault_id } => check_in(&ctx, &vault_id).await,
        Commands::Status { vault_id } => status(&ctx, vault_id).await,
        Commands::Monitor { once } => monitor(&ctx, once).await,
    }
}

fn read_passphrase(prompt: &str) -> Result<String> {
    if let Ok(passphrase) = std::env::var(config_env::PASSPHRASE) {
        return Ok(passphrase);
    }
    eprint!("{}: ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let passphrase = line.trim_end_matches(['\r', '\n']).to_string();
    if passphrase.is_empty() {
        bail!("Passphrase must not be empty");
    }
    Ok(passphrase)
}

fn parse_key(arg: &str) -> Result<KeyDescriptor> {
    let mut parts = arg.splitn(3, ':');
    let (Some(label), Some(role), Some(pubkey)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Key must be label:role:hex, got {}", arg);
    };
    let role = match role.to_lowercase().as_str() {
        "owner" => KeyRole::Owner,
        "heir" => KeyRole::Heir,
        "backup" => KeyRole::Backup,
        "oracle" => KeyRole::Oracle,
        other => bail!("Invalid key role: {}", other),
    };
    Ok(KeyDescriptor {
        label: label.to_string(),
        pubkey: pubkey.to_string(),
        role,
    })
}

fn parse_beneficiary(arg: &str) -> Result<Beneficiary> {
    let parts: Vec<&str> = arg.splitn(4, ':').collect();
    if parts.len() < 3 {
        bail!("Beneficiary must be label:key_index:percentage[:contact], got {}", arg);
    }
    Ok(Beneficiary {
        label: parts[0].to_string(),
        key_index: parts[1].parse().context("beneficiary key index")?,
        percentage: parts[2].parse().context("beneficiary percentage")?,
        condition: None,
        contact: parts.get(3).map(|contact| contact.to_string()),
    })
}

fn parse_timelock(arg: &str) -> Result<Timelock> {
    let (height, purpose) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("Time lock must be height:purpose, got {}", arg))?;
    Ok(Timelock {
        height: height.parse().context("time lock height")?,
        purpose: purpose.to_string(),
    })
}

fn print_validation(result: &ValidationResult) {
    if result.valid {
        println!("✅ Configuration is valid");
    } else {
        println!("❌ Configuration is invalid");
    }
    for error in &result.errors {
        println!("  error:   {}", error.message);
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning.message);
    }
    for recommendation in &result.recommendations {
        println!("  tip:     {}", recommendation.message);
    }
}

fn show_presets(ctx: &App) -> Result<()> {
    println!("📦 Presets");
    for preset in presets::catalog() {
        let result = ctx.engine.validate(&preset.config);
        let marker = if result.valid { "✅" } else { "❌" };
        println!("\n{} {} ({})", marker, preset.name, preset.id);
        println!("   {}", preset.description);
        println!("   {}", serde_json::to_string(&preset.config)?);
    }
    Ok(())
}

fn validate(ctx: &App, args: &ConfigArgs, json: bool) -> Result<()> {
    let config = args.to_configuration()?;
    let result = ctx.engine.validate(&config);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_validation(&result);
    }
    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn show_options(ctx: &App, args: &ConfigArgs) -> Result<()> {
    let config = args.to_configuration()?;
    let available = ctx.engine.available_options(&config);

    let section = |title: &str, options: &[OptionAvailability]| {
        println!("{}", title);
        for option in options {
            match (&option.reason, option.can_add) {
                (_, true) => println!("  ✅ {}", option.option),
                (Some(reason), false) => println!("  ❌ {} ({})", option.option, reason),
                (None, false) => println!("  ❌ {}", option.option),
            }
        }
    };
    section("Infrastructure", &available.infrastructure);
    section("Primary logic", &available.primary_logic);
    section("Gates", &available.gates);
    section("Modifiers", &available.modifiers);
    Ok(())
}

async fn create(ctx: &App, record: VaultData) -> Result<()> {
    let validation = ctx.engine.validate(&record.configuration());
    print_validation(&validation);

    let passphrase = read_passphrase("New vault passphrase")?;
    println!("🔐 Deriving key and encrypting...");
    let id = ctx.manager().create_vault(record, &passphrase).await?;
    println!("✅ Vault created: {}", id);
    Ok(())
}

async fn list(ctx: &App) -> Result<()> {
    let vaults = ctx.manager().list_vaults().await?;
    if vaults.is_empty() {
        println!("No vaults in {}", ctx.settings.data_dir.display());
        return Ok(());
    }
    for metadata in vaults {
        println!(
            "🏦 {}  {}  [{}]  {} beneficiaries  created {}{}",
            display::format_short(metadata.vault_id.as_str(), 8, 4),
            metadata.name,
            metadata.primary_logic,
            metadata.beneficiary_count,
            time::format_timestamp(metadata.created_at),
            metadata
                .address
                .as_deref()
                .map(|address| format!("  {}", display::format_short(address, 8, 5)))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn show(ctx: &App, id: &VaultId, json: bool) -> Result<()> {
    let passphrase = read_passphrase("Vault passphrase")?;
    let record = ctx.manager().load_vault(id, &passphrase).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("🏦 {} ({})", record.name, record.id);
    if !record.description.is_empty() {
        println!("   {}", record.description);
    }
    println!("   Network:        {}", record.network);
    println!("   Primary logic:  {}", record.primary_logic);
    println!(
        "   Infrastructure: {}",
        record.infrastructure.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
    );
    for key in &record.keys {
        println!("   Key {:<10} {:?}  {}", key.label, key.role, display::format_short(&key.pubkey, 10, 6));
    }
    for beneficiary in &record.beneficiaries {
        println!("   Heir {:<9} {:>3}%  key #{}", beneficiary.label, beneficiary.percentage, beneficiary.key_index);
    }
    println!("   Allocated:      {}%", record.allocation_total());
    Ok(())
}

async fn update(ctx: &App, id: &VaultId, file: &PathBuf) -> Result<()> {
    let json = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let record: VaultData = serde_json::from_str(&json).context("parsing vault record")?;
    let passphrase = read_passphrase("Vault passphrase")?;
    ctx.manager().update_vault(id, record, &passphrase).await?;
    println!("✅ Vault {} updated", id);
    Ok(())
}

async fn delete(ctx: &App, id: &VaultId) -> Result<()> {
    if ctx.manager().delete_vault(id).await? {
        println!("🗑️  Vault {} deleted", id);
    } else {
        println!("Vault {} not found", id);
    }
    Ok(())
}

async fn export(ctx: &App, id: &VaultId, output: Option<PathBuf>) -> Result<()> {
    let passphrase = read_passphrase("Vault passphrase")?;
    let document = ctx.manager().export_vault(id, &passphrase).await?;
    let json = document.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("✅ Exported to {} (checksum {})", path.display(), document.checksum);
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn import(ctx: &App, file: Option<PathBuf>, token: Option<String>, verify_only: bool) -> Result<()> {
    let manager = ctx.manager();
    let id = match (file, token) {
        (Some(path), None) => {
            let document = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let envelope = manager.import_vault(&document)?;
            println!("✅ Export verified for vault {}", envelope.vault_id);
            if verify_only {
                return Ok(());
            }
            let passphrase = read_passphrase("Vault passphrase")?;
            manager.restore_vault(&document, &passphrase).await?
        }
        (None, Some(token)) => {
            let passphrase = read_passphrase("Vault passphrase")?;
            manager.import_qr(&token, &passphrase).await?
        }
        _ => bail!("Provide either an export file or --qr <token>"),
    };
    println!("✅ Vault {} imported", id);
    Ok(())
}

async fn qr(ctx: &App, id: &VaultId) -> Result<()> {
    let passphrase = read_passphrase("Vault passphrase")?;
    let token = ctx.manager().export_qr(id, &passphrase).await?;
    println!("{}", token);
    Ok(())
}

async fn check_in(ctx: &App, id: &VaultId) -> Result<()> {
    let at = ctx.manager().check_in(id).await?;
    println!("✅ Checked in on {} at {}", id, time::format_timestamp(at));
    Ok(())
}

async fn status(ctx: &App, id: Option<VaultId>) -> Result<()> {
    let manager = ctx.manager();
    match id {
        Some(id) => println!("{}: {}", id, manager.vault_status(&id).await?),
        None => {
            for (metadata, status) in manager.statuses().await? {
                println!("{:<24} {}", metadata.name, status);
            }
        }
    }
    Ok(())
}

async fn monitor(ctx: &App, once: bool) -> Result<()> {
    let notifier: Arc<dyn Notifier> = match &ctx.settings.mail {
        Some(mail) => Arc::new(HttpEmailSender::new(mail.clone())?),
        None => {
            log::warn!("{} not set; notifications will only be logged", config_env::MAIL_ENDPOINT);
            Arc::new(LogNotifier)
        }
    };
    let config = MonitorConfig {
        poll_interval: ctx.settings.poll_interval,
        ..MonitorConfig::default()
    };
    let monitor = Arc::new(CheckInMonitor::new(
        ctx.store.clone(),
        notifier,
        Arc::new(SystemClock),
        config,
    ));

    if once {
        let report = monitor.sweep().await?;
        println!(
            "📬 {} vaults evaluated, {} sent, {} failed, {} suppressed",
            report.evaluated, report.dispatched, report.failed, report.suppressed
        );
        return Ok(());
    }

    let handle = monitor.start();
    println!("👀 Monitoring {} (Ctrl-C to stop)", ctx.settings.data_dir.display());
    tokio::signal::ctrl_c().await?;
    handle.stop().await?;
    println!("👋 Monitor stopped");
    Ok(())
}
