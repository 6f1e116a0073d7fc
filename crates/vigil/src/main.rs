use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;
use vigil_core::{to_json_pretty, HttpMethod, ProbeId, ProbeStatus, SCHEDULE_CHANNEL};
use vigil_runtime::{
    DefinitionCommands, DiscordConfig, NotificationConfig, ProbeExecutor, ProbeExecutorConfig,
    ProbeJob, RepositoryStore, ScheduleReconciler, SlackConfig,
};
use vigil_scheduler::RecurringScheduler;
use vigil_storage::{DefinitionDraft, ProbeRepository, RedbBackend};
use vigil_sync::{MemoryChannel, RedisChannel, SyncChannel};

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil distributed HTTP probe scheduler")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "VIGIL_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where definitions live and how changes are broadcast
#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Path to the redb database file
    #[arg(long, env = "VIGIL_DATA_DIR", default_value = "./vigil.redb")]
    data_dir: String,
    /// Redis URL for fleet-wide sync; in-process only when absent
    #[arg(long, env = "VIGIL_REDIS_URL")]
    redis_url: Option<String>,
    /// Pub/sub channel shared by every instance
    #[arg(long, env = "VIGIL_CHANNEL", default_value = SCHEDULE_CHANNEL)]
    channel: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probe scheduler until interrupted
    Serve {
        #[command(flatten)]
        store: StoreArgs,
        /// Timeout for each outbound probe request
        #[arg(long, env = "VIGIL_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
        request_timeout_secs: u64,
        /// Name of this instance in logs; random when absent
        #[arg(long, env = "VIGIL_INSTANCE_ID")]
        instance_id: Option<String>,
        /// Slack bot token
        #[arg(long, env = "VIGIL_SLACK_TOKEN")]
        slack_token: Option<String>,
        /// Slack channel ids to alert, comma-separated
        #[arg(long, env = "VIGIL_SLACK_CHANNELS", value_delimiter = ',')]
        slack_channels: Vec<String>,
        /// Discord bot token
        #[arg(long, env = "VIGIL_DISCORD_TOKEN")]
        discord_token: Option<String>,
        /// Discord channel ids to alert, comma-separated
        #[arg(long, env = "VIGIL_DISCORD_CHANNELS", value_delimiter = ',')]
        discord_channels: Vec<String>,
        /// Upper bound on graceful shutdown
        #[arg(long, env = "VIGIL_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
        shutdown_timeout_secs: u64,
    },
    /// Manage probe definitions
    Probe {
        #[command(flatten)]
        store: StoreArgs,
        #[command(subcommand)]
        action: ProbeCommand,
    },
    /// Print the recorded results of a probe
    Results {
        #[command(flatten)]
        store: StoreArgs,
        /// Probe id
        id: ProbeId,
    },
}

#[derive(Subcommand)]
enum ProbeCommand {
    /// Create a new active probe
    Create {
        /// Interval between checks, e.g. "30s" or "1h30m"
        #[arg(long)]
        interval: String,
        /// Target URL
        #[arg(long)]
        url: String,
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request header as "Name: value"; repeatable
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Resume a stopped probe
    Start { id: ProbeId },
    /// Stop a probe without deleting it
    Stop { id: ProbeId },
    /// Delete a probe
    Delete { id: ProbeId },
    /// List probes that are not deleted
    List,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve {
            store,
            request_timeout_secs,
            instance_id,
            slack_token,
            slack_channels,
            discord_token,
            discord_channels,
            shutdown_timeout_secs,
        } => {
            let instance_id = instance_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let notifications = NotificationConfig {
                slack: notification_section("Slack", slack_token, slack_channels)?
                    .map(|(api_token, channel_ids)| SlackConfig {
                        api_token,
                        channel_ids,
                    }),
                discord: notification_section("Discord", discord_token, discord_channels)?
                    .map(|(bot_token, channel_ids)| DiscordConfig {
                        bot_token,
                        channel_ids,
                    }),
                ..Default::default()
            };

            run_serve(
                &store,
                Duration::from_secs(request_timeout_secs),
                notifications,
                Duration::from_secs(shutdown_timeout_secs),
            )
            .instrument(info_span!("vigil", instance = %instance_id))
            .await
        }
        Commands::Probe { store, action } => run_probe_command(&store, action).await,
        Commands::Results { store, id } => {
            let repository = open_repository(&store.data_dir)?;
            let commands = DefinitionCommands::new(repository, local_channel(&store));
            print_json(&commands.results(id)?)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Run the scheduling pipeline until ctrl-c
async fn run_serve(
    store: &StoreArgs,
    request_timeout: Duration,
    notifications: NotificationConfig,
    shutdown_timeout: Duration,
) -> miette::Result<()> {
    info!("Starting vigil probe scheduler");

    let repository = open_repository(&store.data_dir)?;
    let channel = open_channel(store).await?;
    if store.redis_url.is_none() {
        info!("No Redis URL configured, changes made by other processes apply on restart");
    }

    let escalator = notifications.build()?;
    if escalator.is_empty() {
        warn!("No notification channels configured, failing probes will only be logged");
    } else {
        info!(channels = ?escalator.channel_names(), "Notification channels configured");
    }

    let probe_store = Arc::new(RepositoryStore::new(repository));
    let executor = ProbeExecutor::new(
        ProbeExecutorConfig {
            request_timeout,
            ..Default::default()
        },
        probe_store.clone(),
        Arc::new(escalator),
    )?;

    let scheduler = Arc::new(RecurringScheduler::with_tokio());
    let reconciler = Arc::new(ScheduleReconciler::new(
        Arc::clone(&scheduler),
        Arc::new(executor),
    ));
    let job = ProbeJob::new(probe_store, reconciler, channel);

    let token = CancellationToken::new();
    let loaded = job.start(&token).await?;
    info!("All components started, {} probes scheduled", loaded);

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;

    info!("Shutting down gracefully...");
    token.cancel();

    let stopped = tokio::time::timeout(shutdown_timeout, async {
        if let Err(e) = job.stop().await {
            error!("Failed to stop probe job: {}", e);
        }
        scheduler.shutdown().await;
    })
    .await;
    if stopped.is_err() {
        warn!("Shutdown did not finish within {:?}", shutdown_timeout);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn run_probe_command(store: &StoreArgs, action: ProbeCommand) -> miette::Result<()> {
    let repository = open_repository(&store.data_dir)?;
    // Listing never publishes
    let channel = match action {
        ProbeCommand::List => local_channel(store),
        _ => {
            if store.redis_url.is_none() {
                warn!("No Redis URL configured, running instances apply this change on restart");
            }
            open_channel(store).await?
        }
    };
    let commands = DefinitionCommands::new(repository, channel);

    let definition = match action {
        ProbeCommand::List => return print_json(&commands.list()?),
        ProbeCommand::Create {
            interval,
            url,
            method,
            headers,
            body,
        } => {
            let method: HttpMethod = method.parse()?;
            let body = match body {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| miette::miette!("Invalid JSON body: {}", e))?,
                None => serde_json::Value::Null,
            };
            commands
                .create(DefinitionDraft {
                    interval,
                    url,
                    method,
                    headers: headers.into_iter().collect::<BTreeMap<_, _>>(),
                    body,
                })
                .await?
        }
        ProbeCommand::Start { id } => commands.set_status(id, ProbeStatus::Active).await?,
        ProbeCommand::Stop { id } => commands.set_status(id, ProbeStatus::Stopped).await?,
        ProbeCommand::Delete { id } => commands.delete(id).await?,
    };

    print_json(&definition)
}

fn open_repository(data_dir: &str) -> miette::Result<ProbeRepository> {
    let backend = RedbBackend::new(std::path::Path::new(data_dir))
        .map_err(|e| miette::miette!("Failed to open storage at '{}': {}", data_dir, e))?;
    Ok(ProbeRepository::new(Arc::new(backend)))
}

/// Redis when configured, otherwise an in-process channel
async fn open_channel(store: &StoreArgs) -> miette::Result<Arc<dyn SyncChannel>> {
    match &store.redis_url {
        Some(url) => Ok(Arc::new(RedisChannel::connect(url, store.channel.as_str()).await?)),
        None => Ok(local_channel(store)),
    }
}

fn local_channel(store: &StoreArgs) -> Arc<dyn SyncChannel> {
    Arc::new(MemoryChannel::new(
        store.channel.as_str(),
        MemoryChannel::DEFAULT_CAPACITY,
    ))
}

/// Pair a token with its channel ids; channel ids without a token is a mistake
fn notification_section(
    service: &str,
    token: Option<String>,
    channel_ids: Vec<String>,
) -> miette::Result<Option<(String, Vec<String>)>> {
    match token {
        Some(token) => Ok(Some((token, channel_ids))),
        None if channel_ids.is_empty() => Ok(None),
        None => Err(miette::miette!(
            "{} channels were given without a {} token",
            service,
            service
        )),
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> miette::Result<()> {
    println!("{}", to_json_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Api-Key: abc:def").unwrap(),
            ("X-Api-Key".to_string(), "abc:def".to_string())
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "vigil",
            "serve",
            "--redis-url",
            "redis://127.0.0.1/",
            "--slack-token",
            "xoxb-1",
            "--slack-channels",
            "C1,C2",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve {
                store,
                slack_channels,
                request_timeout_secs,
                ..
            } => {
                assert_eq!(store.redis_url.as_deref(), Some("redis://127.0.0.1/"));
                assert_eq!(store.channel, SCHEDULE_CHANNEL);
                assert_eq!(slack_channels, vec!["C1", "C2"]);
                assert_eq!(request_timeout_secs, 30);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_channels_without_token_are_rejected() {
        assert!(notification_section("Slack", None, Vec::new()).unwrap().is_none());
        assert!(notification_section("Slack", None, vec!["C1".to_string()]).is_err());
        assert!(notification_section("Slack", Some("t".to_string()), Vec::new())
            .unwrap()
            .is_some());
    }
}
