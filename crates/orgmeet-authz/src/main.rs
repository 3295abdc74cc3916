use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use orgmeet_authz::config::{self, ConfigBuilder};
use orgmeet_authz::observability::init_observability;
use orgmeet_authz::store::{AccessStore, InMemoryStore, Snapshot, TracedStore};
use orgmeet_authz::{
    AuthzService, Collection, Config, Module, OrgId, Operation, Record, RecordId, Stage, Target,
    UserId, ViewerFacts,
};

#[derive(Parser, Debug)]
#[command(name = "orgmeet-authz")]
#[command(about = "Role-based access control evaluator for OrgMeet", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON snapshot of users, organizations, memberships and records
    #[arg(short, long, global = true)]
    seed: Option<PathBuf>,

    /// Rollout stage (1-5); modules introduced later are disabled
    #[arg(long, global = true)]
    stage: Option<u8>,

    /// Modules to disable (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    disable: Vec<Module>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide one operation and print the decision
    Check {
        #[arg(short, long)]
        requester: UserId,

        /// list, view, create, update or delete
        #[arg(short, long)]
        operation: Operation,

        /// Stored record id, or an inline record as JSON (create only)
        #[arg(long)]
        record: String,

        /// Print the boundary outcome instead of the full decision
        #[arg(long)]
        enforce: bool,
    },
    /// Print the row filter and visible records of a listing
    List {
        #[arg(short, long)]
        requester: UserId,

        #[arg(long)]
        collection: Collection,

        #[arg(long)]
        organization: OrgId,
    },
    /// Print role and UI control visibility in one organization
    Visibility {
        #[arg(short, long)]
        requester: UserId,

        #[arg(long)]
        organization: OrgId,

        /// The requester created the record being rendered
        #[arg(long)]
        creator: bool,

        /// The requester is the recipient of the record being rendered
        #[arg(long)]
        recipient: bool,
    },
    /// Serve the HTTP decision API
    Serve {
        #[arg(long)]
        http_host: Option<IpAddr>,

        #[arg(long)]
        http_port: Option<u16>,
    },
}

fn load(args: &Args) -> anyhow::Result<Config> {
    // Configuration precedence: CLI > env > file > defaults
    let mut builder = match &args.config {
        Some(path) => config::load_config_from_path(path)?,
        None => config::load_config()?,
    };

    // CLI flags are applied last and only when given
    if let Some(stage) = args.stage {
        builder = builder.stage(Stage::try_from(stage)?);
    }
    if !args.disable.is_empty() {
        builder = builder.disabled_modules(args.disable.clone());
    }
    if args.seed.is_some() {
        builder = builder.seed_path(args.seed.clone());
    }
    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }
    if args.json_logs {
        builder = builder.json_logs(true);
    }
    if let Command::Serve {
        http_host,
        http_port,
    } = &args.command
    {
        if let Some(host) = http_host {
            builder = builder.http_host(*host);
        }
        if let Some(port) = http_port {
            builder = builder.http_port(*port);
        }
    }

    Ok(builder.build()?)
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn AccessStore>> {
    let Some(path) = config.seed_path.as_deref() else {
        bail!("no seed snapshot configured (use --seed or ORGMEET_SEED_PATH)");
    };
    let snapshot = Snapshot::load(path)?;
    let store = InMemoryStore::from_snapshot(snapshot)?;
    Ok(Arc::new(TracedStore::new(store)))
}

/// An inline JSON record, or the id of a stored record
fn target(arg: &str) -> anyhow::Result<Target> {
    if arg.trim_start().starts_with('{') {
        let record: Record = serde_json::from_str(arg).context("invalid inline record")?;
        return Ok(Target::Inline(record));
    }
    Ok(Target::Stored(RecordId::new(arg)))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

const fn exit_code(allowed: bool) -> ExitCode {
    if allowed { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let config = load(&args)?;

    init_observability(&config.telemetry)?;

    let store = open_store(&config)?;
    let service = AuthzService::new(store, &config);

    tracing::debug!(
        stage = %config.stage,
        modules = ?config.features().enabled().collect::<Vec<_>>(),
        "Configuration loaded"
    );

    match args.command {
        Command::Check {
            requester,
            operation,
            record,
            enforce,
        } => {
            let target = target(&record)?;
            if enforce {
                let outcome = service.enforce_target(&requester, operation, target);
                print_json(&outcome)?;
                Ok(exit_code(outcome.is_allowed()))
            } else {
                let record = service
                    .resolve(operation, target)?
                    .with_context(|| format!("record not found: {record}"))?;
                let decision = service.check(&requester, operation, &record)?;
                print_json(&decision)?;
                Ok(exit_code(decision.is_allowed()))
            }
        }
        Command::List {
            requester,
            collection,
            organization,
        } => {
            let listing = service.list(&requester, collection, &organization)?;
            print_json(&listing)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Visibility {
            requester,
            organization,
            creator,
            recipient,
        } => {
            let facts = ViewerFacts {
                is_creator: creator,
                is_recipient: recipient,
                ..ViewerFacts::default()
            };
            print_json(&service.visibility(&requester, &organization, &facts)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { .. } => {
            tracing::info!(
                "Starting OrgMeet decision service on {}:{}",
                config.transport.http_host,
                config.transport.http_port
            );
            tracing::info!("Stage: {}", config.stage);
            tracing::info!(
                "Bearer authentication: {}",
                config.transport.bearer_token.is_some()
            );

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {e}");
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutdown signal received");
            };

            orgmeet_authz::transport::serve(service, &config, shutdown).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn parse(config: &std::path::Path, extra: &[&str]) -> Args {
        let mut argv = vec!["orgmeet-authz", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&[
            "list",
            "-r",
            "userB",
            "--collection",
            "meetings",
            "--organization",
            "org1",
        ]);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[deployment]\nstage = 5\ndisabled_modules = [\"voting\"]\n")
            .unwrap();
        file.flush().unwrap();

        let config = load(&parse(file.path(), &["--stage", "2", "--disable", "notifications"])).unwrap();
        assert_eq!(config.stage, Stage::try_from(2).unwrap());
        assert!(!config.features().is_enabled(Module::Notifications));

        let config = load(&parse(file.path(), &[])).unwrap();
        assert_eq!(config.stage, Stage::try_from(5).unwrap());
        assert!(!config.features().is_enabled(Module::Voting));
    }

    #[test]
    fn test_inline_target_parsing() {
        assert!(matches!(target("meeting1").unwrap(), Target::Stored(id) if id.as_str() == "meeting1"));
        let inline = r#"{"id": "m9", "collection": "meetings", "owner": {"kind": "organization", "id": "org1"}}"#;
        assert!(matches!(target(inline).unwrap(), Target::Inline(record) if record.id.as_str() == "m9"));
        assert!(target("{not json").is_err());
    }
}
