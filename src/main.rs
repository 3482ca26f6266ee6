//! SSO provisioning harness CLI.
//!
//! Runs provisioning batches against the simulated OneLogin tenant and
//! exercises the SAML Service Provider from the command line.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use zentinel_sso_harness::identity::IdentityApi;
use zentinel_sso_harness::provisioning::{BatchResult, ProvisioningEngine};
use zentinel_sso_harness::{Settings, SimulatedFaults};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "zentinel-sso-harness")]
#[command(about = "SAML SSO and user provisioning harness for OneLogin")]
struct Args {
    /// Project root holding config/ and logs/
    #[arg(long, global = true, default_value = ".", env = "SSO_HARNESS_BASE_DIR")]
    base_dir: PathBuf,

    /// JSON settings file (defaults to <base-dir>/config/saml_settings.json)
    #[arg(long, global = true, env = "SSO_HARNESS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for provisioning reports (defaults to <base-dir>/logs)
    #[arg(long, global = true, env = "SSO_HARNESS_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Append logs to the configured log file instead of stderr
    #[arg(long, global = true)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full walk-through: generate, provision, connect applications, report
    Demo {
        /// Users in the bulk batch
        #[arg(long, default_value_t = 10)]
        users: usize,
    },

    /// Provision a batch of generated test users
    Provision {
        /// Number of users to generate
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Report file name (defaults to a timestamped name)
        #[arg(long)]
        report: Option<String>,

        /// Make the identity API reject this email (repeatable)
        #[arg(long = "fail-email")]
        fail_emails: Vec<String>,
    },

    /// Generate an SP-initiated AuthnRequest
    SamlRequest {
        #[arg(long)]
        relay_state: Option<String>,
    },

    /// Validate a Base64-encoded SAML Response
    ValidateResponse {
        /// Base64-encoded response
        #[arg(required_unless_present = "xml_file")]
        response: Option<String>,

        #[arg(long)]
        relay_state: Option<String>,

        /// Read the response XML from a file and encode it first
        #[arg(long)]
        xml_file: Option<PathBuf>,
    },

    /// Look up a user by email
    Lookup { email: String },

    /// Show configuration status and values
    Config {
        /// Dotted keys to print (e.g. onelogin.region)
        #[arg(long = "key")]
        keys: Vec<String>,
    },
}

/// Map configured level names, including WARNING and CRITICAL, onto tracing directives.
fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

fn init_tracing(args: &Args, settings: &Settings) -> Result<()> {
    let level = if args.verbose {
        "debug"
    } else {
        level_directive(&settings.logging.level)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)));

    let writer = if args.log_to_file {
        let path = Path::new(&settings.logging.file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        BoxMakeWriter::new(Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output")?
    );
    Ok(())
}

fn build_engine(args: &Args, settings: Arc<Settings>, faults: SimulatedFaults) -> ProvisioningEngine {
    let engine = ProvisioningEngine::with_faults(settings, faults);
    match &args.report_dir {
        Some(dir) => engine.with_report_dir(dir),
        None => engine,
    }
}

fn print_batch(batch: &BatchResult) {
    let metrics = &batch.performance_metrics;
    println!("   Total Users: {}", batch.total_users);
    println!("   Successful: {}", batch.successful);
    println!("   Failed: {}", batch.failed);
    println!("   Success Rate: {:.1}%", batch.success_rate_percentage());
    println!("   Processing Time: {:.2} minutes", metrics.processing_time_minutes);
    println!("   Traditional Time: {:.2} minutes", metrics.traditional_time_minutes);
    println!("   Time Saved: {:.2} minutes", metrics.time_saved_minutes);
    println!("   Efficiency Gain: {:.1}%", metrics.efficiency_gain_percentage);
    println!("   Users per Minute: {:.1}", metrics.users_per_minute);
    for error in &batch.errors {
        println!("   Error: {}", error);
    }
}

fn run_demo(engine: &ProvisioningEngine, bulk_count: usize) -> Result<()> {
    println!("1. GENERATING TEST USERS:");
    let users = engine.generate_test_users(bulk_count.max(1));
    println!("   Generated: {} test users", users.len());
    if let Some(first) = users.first() {
        println!(
            "   Sample user: {} - {}",
            first.email(),
            first.get_or_empty("department")
        );
    }

    println!("\n2. SINGLE USER PROVISIONING:");
    let single = engine.provision_single_user(&users[0]);
    println!("   User: {}", single.user_email);
    println!("   Success: {}", if single.success { "Yes" } else { "No" });
    println!(
        "   OneLogin ID: {}",
        single.onelogin_id.as_deref().unwrap_or("N/A")
    );
    println!(
        "   Session ID: {}",
        single
            .session_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    );

    println!("\n3. BULK USER PROVISIONING:");
    let batch = engine.provision_users_bulk(&users[..bulk_count.min(users.len())]);
    print_batch(&batch);

    println!("\n4. APPLICATION INTEGRATION:");
    match single.session_id {
        Some(session_id) => {
            let apps = engine.provision_applications(&session_id.to_string());
            println!("   Connected Applications: {}", apps.len());
            for (name, connected) in &apps {
                println!("   - {}: {}", name, if *connected { "Connected" } else { "Failed" });
            }
        }
        None => println!("   Skipped: no session"),
    }

    println!("\n5. SAML FLOW:");
    let (request_id, encoded) = engine.sso().generate_saml_request(Some("/dashboard"));
    println!("   Request ID: {}", request_id);
    println!(
        "   Redirect: {}",
        engine.sso().build_redirect_url(&encoded, Some("/dashboard"))
    );
    let response = BASE64.encode("<samlp:Response><Assertion/></samlp:Response>");
    let validation = engine.sso().validate_saml_response(&response, Some("/dashboard"));
    println!("   Demo response valid: {}", validation.valid);

    println!("\n6. SYSTEM STATISTICS:");
    let stats = engine.get_system_stats();
    println!("   Total Processed: {}", stats.provisioning_engine.total_processed);
    println!("   Successful: {}", stats.provisioning_engine.successful_provisions);
    println!("   Failed: {}", stats.provisioning_engine.failed_provisions);
    println!("   OneLogin Region: {}", stats.onelogin_connector.region);
    println!(
        "   Demo Mode: {}",
        if stats.onelogin_connector.demo_mode { "Yes" } else { "No" }
    );
    println!("   Active Sessions: {}", stats.saml_handler.active_sessions);
    println!("   Active Ratio: {}%", stats.saml_handler.active_ratio);

    println!("\n7. GENERATING REPORT:");
    let path = engine
        .export_provisioning_report(&batch, None)
        .context("exporting provisioning report")?;
    println!("   Report saved to: {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let settings = Settings::load(&args.base_dir, args.config.as_deref());
    init_tracing(&args, &settings)?;

    let validation = settings.validate_config();
    info!(
        onelogin_configured = validation.onelogin_configured,
        applications = settings.enabled_applications().len(),
        "Configuration loaded"
    );
    if !settings.is_configured() {
        warn!("OneLogin credentials not set, running in demo mode");
    }

    let settings = Arc::new(settings);
    let default_command = Command::Demo { users: 10 };
    let command = args.command.as_ref().unwrap_or(&default_command);

    match command {
        Command::Demo { users } => {
            let engine = build_engine(&args, settings, SimulatedFaults::default());
            run_demo(&engine, *users)?;
        }
        Command::Provision {
            count,
            report,
            fail_emails,
        } => {
            let faults = fail_emails
                .iter()
                .fold(SimulatedFaults::default(), |faults, email| {
                    faults.reject_email(email.as_str())
                });
            let engine = build_engine(&args, settings, faults);
            let users = engine.generate_test_users(*count);
            let batch = engine.provision_users_bulk(&users);
            print_batch(&batch);

            let path = engine
                .export_provisioning_report(&batch, report.as_deref())
                .context("exporting provisioning report")?;
            println!("   Report saved to: {}", path.display());
        }
        Command::SamlRequest { relay_state } => {
            let engine = build_engine(&args, settings, SimulatedFaults::default());
            let sso = engine.sso();
            let (request_id, encoded) = sso.generate_saml_request(relay_state.as_deref());
            print_json(&serde_json::json!({
                "request_id": request_id,
                "saml_request": encoded,
                "redirect_url": sso.build_redirect_url(&encoded, relay_state.as_deref()),
            }))?;
        }
        Command::ValidateResponse {
            response,
            relay_state,
            xml_file,
        } => {
            let encoded = match xml_file {
                Some(path) => BASE64.encode(
                    std::fs::read(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => response.clone().unwrap_or_default(),
            };
            let engine = build_engine(&args, settings, SimulatedFaults::default());
            print_json(
                &engine
                    .sso()
                    .validate_saml_response(&encoded, relay_state.as_deref()),
            )?;
        }
        Command::Lookup { email } => {
            let engine = build_engine(&args, settings, SimulatedFaults::default());
            match engine.identity().get_user_by_email(email) {
                Some(user) => print_json(&user)?,
                None => anyhow::bail!("lookup failed for {}", email),
            }
        }
        Command::Config { keys } => {
            print_json(&settings.validate_config())?;
            for key in keys {
                match settings.get(key) {
                    Some(value) => println!("{} = {}", key, value),
                    None => println!("{} is not set", key),
                }
            }
        }
    }

    Ok(())
}
