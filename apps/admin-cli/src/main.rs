//! Gateway APTO operator console.

mod session_file;

use std::env;
use std::io::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};

use apto_api_client::auth::looks_like_jwt;
use apto_api_client::models::PackagePayload;
use apto_api_client::{ApiClient, ApiClientConfig, ApiError, TokenStore, validate};
use apto_connector::{
    Confirmation, ConnectorConfig, ConnectorHandle, StatusSnapshot,
};

use crate::session_file::FileTokenStore;

#[derive(Parser)]
#[command(name = "apto-admin", about = "Gateway APTO admin console", version)]
struct Cli {
    /// REST backend base URL; falls back to APTO_API_BASE_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Push socket URL (ws:// or wss://); falls back to APTO_SOCKET_URL.
    #[arg(long, global = true)]
    socket_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and persist the session token.
    Login {
        #[arg(long)]
        email: String,
        /// Read from the terminal when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the persisted session token.
    Logout,
    /// Dashboard stats.
    Stats {
        #[arg(long)]
        monthly: bool,
    },
    /// Recent activity feed.
    Activities,
    /// List users, or show one by id.
    Users {
        #[arg(long)]
        id: Option<u64>,
    },
    /// Manage subscription packages.
    Packages {
        #[command(subcommand)]
        command: PackageCommand,
    },
    /// List payments, or activate one.
    Payments {
        #[arg(long, value_name = "PAYMENT_ID")]
        activate: Option<String>,
    },
    /// List feature catalog.
    Features,
    /// WhatsApp gateway connection.
    Whatsapp {
        #[command(subcommand)]
        command: WhatsAppCommand,
    },
}

#[derive(Subcommand)]
enum PackageCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: u64,
        #[arg(long)]
        duration_days: u32,
        #[arg(long, value_delimiter = ',')]
        feature_ids: Vec<u64>,
    },
    Update {
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: u64,
        #[arg(long)]
        duration_days: u32,
        #[arg(long, value_delimiter = ',')]
        feature_ids: Vec<u64>,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand)]
enum WhatsAppCommand {
    /// Show the connection state; --watch streams updates until ctrl-c.
    Status {
        #[arg(long)]
        watch: bool,
    },
    /// Restart the gateway session.
    Restart,
    /// End the gateway session; asks for confirmation unless --yes.
    Disconnect {
        #[arg(long)]
        yes: bool,
    },
    /// Send a test message.
    Send {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        message: String,
    },
    /// Check whether a number is reachable over WhatsApp.
    Validate {
        #[arg(long)]
        phone: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::open_default()?);

    match &cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password.clone(),
                None => rpassword::prompt_password("Password: ").context("reading password")?,
            };
            let request =
                validate::login_request(email, &password).map_err(|error| anyhow!(error))?;
            let api = build_api(&cli, Arc::clone(&tokens))?;
            let response = api.login(&request).await.map_err(friendly)?;
            if !looks_like_jwt(&response.token) {
                tracing::warn!("stored token does not look like a JWT");
            }
            match response.user {
                Some(user) => println!("logged in as {} <{}>", user.name, user.email),
                None => println!("logged in"),
            }
        }
        Command::Logout => {
            tokens.clear_token();
            println!("session cleared");
        }
        Command::Stats { monthly } => {
            let api = build_api(&cli, tokens)?;
            let stats = if *monthly {
                api.monthly_stats().await.map_err(friendly)?
            } else {
                api.stats().await.map_err(friendly)?
            };
            println!("payments:             {}", stats.total_payments);
            println!("  pending:            {}", stats.pending_payments);
            println!("  confirmed:          {}", stats.confirmed_payments);
            println!("users:                {}", stats.total_users);
            println!("active subscriptions: {}", stats.active_subscriptions);
            println!("total revenue:        {}", stats.total_revenue);
        }
        Command::Activities => {
            let api = build_api(&cli, tokens)?;
            for activity in api.recent_activities().await.map_err(friendly)? {
                println!(
                    "{}  {:12}  {:10}  {}",
                    activity.created_at.format("%Y-%m-%d %H:%M"),
                    activity.kind,
                    activity.amount,
                    activity.user_name
                );
            }
        }
        Command::Users { id } => {
            let api = build_api(&cli, tokens)?;
            match id {
                Some(id) => {
                    let user = api.user(*id).await.map_err(friendly)?;
                    println!("{user:#?}");
                }
                None => {
                    for user in api.users().await.map_err(friendly)?.data {
                        println!(
                            "{:6}  {:25}  {:30}  verified={}  package={}",
                            user.id,
                            user.name,
                            user.email,
                            user.is_verified,
                            user.package_name.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        }
        Command::Packages { command } => {
            let api = build_api(&cli, tokens)?;
            run_package_command(&api, command).await?;
        }
        Command::Payments { activate } => {
            let api = build_api(&cli, tokens)?;
            match activate {
                Some(payment_id) => {
                    let request =
                        validate::activate_request(payment_id).map_err(|error| anyhow!(error))?;
                    let response = api.activate_payment(&request).await.map_err(friendly)?;
                    if response.success {
                        println!(
                            "{}",
                            response.message.as_deref().unwrap_or("payment activated")
                        );
                    } else {
                        bail!(
                            "{}",
                            response
                                .message
                                .as_deref()
                                .unwrap_or("failed to activate payment")
                        );
                    }
                }
                None => {
                    for payment in api.payments().await.map_err(friendly)? {
                        println!(
                            "{:6}  {:16}  {:30}  {:9?}  {}",
                            payment.id,
                            payment.payment_id,
                            payment.email,
                            payment.status,
                            payment.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
        }
        Command::Features => {
            let api = build_api(&cli, tokens)?;
            for feature in api.features().await.map_err(friendly)? {
                println!(
                    "{:4}  {:25}  {:20}  {:?}",
                    feature.id, feature.name, feature.code, feature.status
                );
            }
        }
        Command::Whatsapp { command } => {
            run_whatsapp_command(&cli, tokens, command).await?;
        }
    }

    Ok(())
}

async fn run_package_command(api: &ApiClient, command: &PackageCommand) -> anyhow::Result<()> {
    match command {
        PackageCommand::List => {
            for package in api.packages().await.map_err(friendly)? {
                println!(
                    "{:4}  {:25}  price={:10}  days={:4}  features={}",
                    package.id,
                    package.name,
                    package.price,
                    package.duration_days,
                    package.features.names().join(", ")
                );
            }
        }
        PackageCommand::Create {
            name,
            price,
            duration_days,
            feature_ids,
        } => {
            let payload = package_payload(name, *price, *duration_days, feature_ids)?;
            let package = api.create_package(&payload).await.map_err(friendly)?;
            println!("created package {} ({})", package.id, package.name);
        }
        PackageCommand::Update {
            id,
            name,
            price,
            duration_days,
            feature_ids,
        } => {
            let payload = package_payload(name, *price, *duration_days, feature_ids)?;
            let package = api.update_package(*id, &payload).await.map_err(friendly)?;
            println!("updated package {} ({})", package.id, package.name);
        }
        PackageCommand::Delete { id } => {
            api.delete_package(*id).await.map_err(friendly)?;
            println!("deleted package {id}");
        }
    }
    Ok(())
}

async fn run_whatsapp_command(
    cli: &Cli,
    tokens: Arc<dyn TokenStore>,
    command: &WhatsAppCommand,
) -> anyhow::Result<()> {
    let config = connector_config(cli)?;
    let handle = ConnectorHandle::start(&config, tokens)?;
    let outcome = drive_whatsapp_command(&handle, command).await;
    handle.shutdown();
    outcome
}

async fn drive_whatsapp_command(
    handle: &ConnectorHandle,
    command: &WhatsAppCommand,
) -> anyhow::Result<()> {
    match command {
        WhatsAppCommand::Status { watch } => {
            wait_for_first_report(handle).await?;
            print_snapshot(&handle.current());
            if !watch {
                return Ok(());
            }

            let mut updates = handle.subscribe();
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow().clone();
                        print_snapshot(&snapshot);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        WhatsAppCommand::Restart => {
            let result = handle.dispatcher().restart().await;
            if !result.success {
                bail!("{}", result.message);
            }
            println!("{}", result.message);
        }
        WhatsAppCommand::Disconnect { yes } => {
            if !yes
                && !confirm("Disconnect WhatsApp? You will need to scan the QR code again.")?
            {
                println!("aborted");
                return Ok(());
            }
            let result = handle
                .dispatcher()
                .disconnect(Confirmation::Confirmed)
                .await;
            if !result.success {
                bail!("{}", result.message);
            }
            println!("{}", result.message);
        }
        WhatsAppCommand::Send { phone, message } => {
            let result = handle.dispatcher().send_message(phone, message).await;
            if !result.success {
                bail!("{}", result.message);
            }
            println!(
                "{} (to {})",
                result.message,
                result.sent_to.as_deref().unwrap_or("?")
            );
        }
        WhatsAppCommand::Validate { phone } => {
            let validation = handle.dispatcher().validate_number(phone).await;
            println!(
                "valid={}  {}{}",
                validation.is_valid,
                validation.message,
                validation
                    .formatted_number
                    .map(|number| format!("  formatted=+{number}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Block until the first poll or push report lands, so one-shot commands
/// act on a real state instead of the idle placeholder.
async fn wait_for_first_report(handle: &ConnectorHandle) -> anyhow::Result<()> {
    let mut updates = handle.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if updates.borrow().connection.source.is_some() {
                return;
            }
            if updates.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    if waited.is_err() {
        bail!("timed out waiting for a connection status report");
    }
    Ok(())
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    let connection = &snapshot.connection;
    let mut line = format!(
        "{}  phase={}",
        connection.last_updated.format("%H:%M:%S"),
        connection.phase.as_str()
    );
    if let Some(source) = connection.source {
        line.push_str(&format!("  source={}", source.as_str()));
    }
    if let Some(detail) = &connection.error_detail {
        line.push_str(&format!("  detail={detail}"));
    }
    if let Some(note) = &snapshot.transient_error {
        line.push_str(&format!("  note={note}"));
    }
    println!("{line}");
    if let Some(qr) = &connection.qr_payload {
        println!("scan this payload with WhatsApp:");
        println!("{qr}");
    }
}

fn package_payload(
    name: &str,
    price: u64,
    duration_days: u32,
    feature_ids: &[u64],
) -> anyhow::Result<PackagePayload> {
    validate::package_payload(name, price, duration_days, feature_ids.to_vec())
        .map_err(|error| anyhow!(error))
}

fn connector_config(cli: &Cli) -> anyhow::Result<ConnectorConfig> {
    let api_override = cli.api_url.clone();
    let socket_override = cli.socket_url.clone();
    let config = ConnectorConfig::from_lookup(move |key| match key {
        "APTO_API_BASE_URL" => api_override.clone().or_else(|| env::var(key).ok()),
        "APTO_SOCKET_URL" => socket_override.clone().or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    })?;
    Ok(config)
}

fn build_api(cli: &Cli, tokens: Arc<dyn TokenStore>) -> anyhow::Result<ApiClient> {
    let base_url = cli
        .api_url
        .clone()
        .or_else(|| env::var("APTO_API_BASE_URL").ok())
        .context("set --api-url or APTO_API_BASE_URL")?;
    ApiClient::new(ApiClientConfig::new(base_url), tokens).map_err(friendly)
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn friendly(error: ApiError) -> anyhow::Error {
    if matches!(error, ApiError::Unauthorized) {
        return anyhow!("not logged in or session expired, run `apto-admin login` first");
    }
    if let Some(message) = error.backend_message() {
        return anyhow!(message);
    }
    anyhow::Error::new(error)
}
