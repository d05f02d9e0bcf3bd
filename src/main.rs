use anyhow::{Context, bail};
use gtriage::auth;
use gtriage::config::{Config, DEFAULT_CONFIG_PATH};
use gtriage::db::Database;
use gtriage::dispatch::{ActionDispatcher, check_chunk_size};
use gtriage::gmail::GmailClient;
use gtriage::{ApplyReport, load_rule_file, sync};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: gtriage [--debug] [--config <path>] <command>

Commands:
  sync [N]              fetch up to N messages into the local store
  execute <rules.json>  list the messages a rule file matches
  apply <rules.json>    run a rule file's actions on its matches
  reset-token           forget the stored Gmail token";

enum Command {
    Sync(Option<u32>),
    Execute(String),
    Apply(String),
    ResetToken,
}

struct Args {
    debug: bool,
    config_path: String,
    command: Command,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut debug = false;
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut positional = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" => debug = true,
            "--config" => config_path = args.next().context("--config needs a path")?,
            "-h" | "--help" => bail!(USAGE),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match (positional.next().as_deref(), positional.next()) {
        (Some("sync"), n) => Command::Sync(
            n.map(|n| n.parse().context("sync count must be a number"))
                .transpose()?,
        ),
        (Some("execute"), Some(path)) => Command::Execute(path),
        (Some("apply"), Some(path)) => Command::Apply(path),
        (Some("reset-token"), None) => Command::ResetToken,
        _ => bail!(USAGE),
    };

    Ok(Args {
        debug,
        config_path,
        command,
    })
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "gtriage=debug" } else { "gtriage=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Runs the consent flow if needed and returns a client for the configured API.
async fn connect(config: &Config) -> anyhow::Result<GmailClient> {
    let secret = auth::Authenticator::load_secret(&config.credentials_path).await?;
    let authenticator = auth::Authenticator::authenticate(secret).await?;
    authenticator
        .token(auth::SCOPES)
        .await
        .context("Failed to obtain access token")?;

    GmailClient::connect(
        authenticator,
        &config.api_base_url,
        Duration::from_secs(config.dispatch.timeout_secs),
    )
}

fn print_report(report: &ApplyReport) {
    println!("Matched {} message(s)", report.matched);
    for action in &report.actions {
        let failed = action.failed_chunks().count();
        println!(
            "{}: {} chunk(s), {} failed",
            action.action,
            action.chunks.len(),
            failed
        );
        for chunk in action.failed_chunks() {
            if let Err(failure) = &chunk.result {
                println!("  chunk {} ({} ids): {}", chunk.index + 1, chunk.size, failure);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    init_logging(args.debug);

    let config = Config::load(&args.config_path)?;
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let outcome = run(&args.command, &config, &db).await;
    db.close().await;
    outcome
}

async fn run(command: &Command, config: &Config, db: &Database) -> anyhow::Result<()> {
    match command {
        Command::Sync(limit) => {
            let client = connect(config).await?;
            let summary =
                sync::load_messages(&client, db, limit.unwrap_or(config.sync.max_messages)).await?;
            println!(
                "Stored {} new message(s) ({} total)",
                summary.inserted,
                db.count_records().await?
            );
        }
        Command::Execute(path) => {
            let rule = load_rule_file(path)?;
            let matched = rule.execute(db).await?;
            for m in &matched {
                println!("{}", m.email_id);
            }
            info!("{} message(s) matched", matched.len());
        }
        Command::Apply(path) => {
            // Validate everything before touching the network.
            let rule = load_rule_file(path)?;
            check_chunk_size(config.dispatch.chunk_size)?;
            let client = connect(config).await?;
            let dispatcher = ActionDispatcher::new(client, config.dispatch.chunk_size)?;

            let report = rule.apply(db, &dispatcher).await?;
            print_report(&report);
            if !report.is_success() {
                error!("Some actions did not complete");
                let failed = report.actions.iter().filter(|a| !a.is_success()).count();
                bail!("{} action(s) had failed chunks", failed);
            }
        }
        Command::ResetToken => {
            auth::RingStorage.clear_token().await?;
            println!("Token cleared. The next run will ask for authorization again.");
        }
    }
    Ok(())
}
