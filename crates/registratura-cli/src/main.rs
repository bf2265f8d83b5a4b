//! Operator entry point: polls the registry mailbox, produces official
//! documents and manages records from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use registratura::config::Config;
use registratura::db::registry_repo::RecordFilter;
use registratura::push::NotificationPayload;
use registratura::registry::{Assignment, Priority, RegistrationNumberGenerator, RegistryError};
use registratura::{
    init_tracing, load_config, resolve_secret_optional, BlobStore, Database, HttpPushRelay,
    ImapMailbox, NotificationService, RecordStatus, RegistraturaError, RegistryService,
    RegistrySettings, RetryPolicy, UrlFetcher,
};

/// Assignment changes for `status`. Omitted flags keep the stored value.
#[derive(Args, Debug, Default)]
struct AssignmentArgs {
    #[arg(long)]
    department_id: Option<String>,
    #[arg(long)]
    department_name: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    user_name: Option<String>,
    /// urgent, normal or low; recomputes the deadline.
    #[arg(long)]
    priority: Option<Priority>,
}

impl AssignmentArgs {
    fn into_assignment(self) -> Option<Assignment> {
        let assignment = Assignment {
            department_id: self.department_id,
            department_name: self.department_name,
            assigned_to_user_id: self.user_id,
            assigned_to_user_name: self.user_name,
            priority: self.priority,
        };
        (assignment != Assignment::default()).then_some(assignment)
    }
}

#[derive(Parser, Debug)]
#[command(name = "registratura", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, global = true, default_value = "registratura.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register unread messages from the configured mailbox.
    Poll {
        /// Keep polling every `mailbox.pollInterval` seconds until Ctrl-C.
        #[arg(long)]
        watch: bool,
    },
    /// Produce the stamped official document for a record.
    Process { record_id: String },
    /// Set a record's workflow status.
    Status {
        record_id: String,
        status: RecordStatus,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        assignment: AssignmentArgs,
    },
    /// List records, newest first.
    List {
        #[arg(long)]
        status: Option<RecordStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Delete a record. Stored files are kept.
    Delete { record_id: String },
    /// Send a notification to every active push subscription.
    Broadcast {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("registratura: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("registratura: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(cli.command, config).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("registratura: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> Result<(), RegistraturaError> {
    let db = open_database(&config)?;

    match command {
        Commands::Poll { watch } => poll(&config, db, watch).await,
        Commands::Process { record_id } => {
            let report = registry_service(&config, db)?
                .process_attachments(&record_id)
                .await;
            print_json(&report)
        }
        Commands::Status {
            record_id,
            status,
            notes,
            assignment,
        } => {
            let record = registry_service(&config, db)?
                .update_status(&record_id, status, notes, assignment.into_assignment())
                .await?;
            print_json(&record)
        }
        Commands::List {
            status,
            limit,
            offset,
        } => {
            let filter = RecordFilter {
                status,
                limit: Some(limit),
                offset: Some(offset),
            };
            let (records, total) = registry_service(&config, db)?.list(&filter).await?;
            print_json(&serde_json::json!({ "total": total, "records": records }))
        }
        Commands::Delete { record_id } => {
            registry_service(&config, db)?.delete(&record_id).await?;
            print_json(&serde_json::json!({ "deleted": record_id }))
        }
        Commands::Broadcast { title, body, url } => {
            let service = notification_service(&config, db)?;
            let mut payload = NotificationPayload::new(title, body);
            if let Some(url) = url {
                payload = payload.with_url(url);
            }
            let report = service.broadcast(&payload).await?;
            print_json(&report)
        }
    }
}

fn open_database(config: &Config) -> Result<Database, RegistraturaError> {
    let path = config
        .database
        .resolved_path()
        .ok_or_else(|| registratura::ConfigError::Validation {
            message: "database.path is not set and no home directory was found".to_string(),
        })?;
    Ok(Database::open(&path)?)
}

fn registry_service(config: &Config, db: Database) -> Result<RegistryService, RegistraturaError> {
    let store: Arc<dyn BlobStore> = Arc::new(registratura::LocalBlobStore::new(
        registratura::secrets::expand_home(&config.storage.root),
        config.storage.public_base_url.clone(),
    ));
    let timeout = config.registry.external_timeout();
    let fetcher = Arc::new(UrlFetcher::new(Arc::clone(&store), timeout)?);
    let numbers = RegistrationNumberGenerator::new(
        db.clone(),
        config.registry.prefix.clone(),
        RetryPolicy::new(config.registry.counter_max_attempts, Duration::from_millis(50)),
    );
    let settings = RegistrySettings {
        organization_name: config.organization.name.clone(),
        department_name: config.organization.department_name.clone(),
        prefix: config.registry.prefix.clone(),
        stamp_position: config.registry.stamp_position,
        stamp_all_pages: config.registry.stamp_all_pages,
        tracking_base_url: config.registry.tracking_base_url.clone(),
        external_timeout: timeout,
        claim_lease: config.registry.claim_lease(),
    };
    Ok(RegistryService::new(db, store, fetcher, numbers, settings))
}

fn notification_service(
    config: &Config,
    db: Database,
) -> Result<NotificationService, RegistraturaError> {
    let push = config
        .push
        .as_ref()
        .ok_or_else(|| registratura::ConfigError::Validation {
            message: "the push section is required for broadcast".to_string(),
        })?;
    let token = resolve_secret_optional(
        push.auth_token.as_deref(),
        push.auth_token_file.as_deref(),
        push.auth_token_env_var.as_deref(),
    )?;
    let relay = HttpPushRelay::new(
        push.relay_url.clone(),
        Duration::from_secs(push.request_timeout_secs),
        token,
    )?;
    Ok(NotificationService::new(
        db,
        Arc::new(relay),
        RetryPolicy::new(
            push.subscribe_max_attempts,
            Duration::from_millis(push.subscribe_backoff_ms),
        ),
    ))
}

async fn poll(config: &Config, db: Database, watch: bool) -> Result<(), RegistraturaError> {
    let mailbox_config = config
        .mailbox
        .clone()
        .ok_or_else(|| registratura::ConfigError::Validation {
            message: "the mailbox section is required for poll".to_string(),
        })?;
    let interval = Duration::from_secs(mailbox_config.poll_interval);
    let service = registry_service(config, db)?;
    let mut mailbox = ImapMailbox::new(mailbox_config);

    if !watch {
        let report = service.poll_mailbox(&mut mailbox).await?;
        return print_json(&report);
    }

    tracing::info!(interval_secs = interval.as_secs(), "Watching mailbox");
    loop {
        match service.poll_mailbox(&mut mailbox).await {
            Ok(report) => print_json(&report)?,
            Err(e) => log_poll_failure(&e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn log_poll_failure(e: &RegistryError) {
    if e.is_retryable() {
        tracing::warn!(error = %e, "Mailbox poll failed; retrying next cycle");
    } else {
        tracing::error!(error = %e, "Mailbox poll failed");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RegistraturaError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(registratura::ConfigError::ParseJson)?;
    println!("{}", json);
    Ok(())
}
