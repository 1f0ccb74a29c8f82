use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use taskweave::config::Config;
use taskweave::launcher::ProcessLauncher;
use taskweave::registry::{AppRegistration, ApplicationType};
use taskweave::store::snapshot::Stores;
use taskweave::store::{PageRequest, StateSnapshot, DEFAULT_PAGE_SIZE};
use taskweave::util::with_timeout;
use taskweave::{twlog, twlog_debug, twlog_error, Error, ListQuery, Result, TaskService};

/// Taskweave - composed task definitions and launches
#[derive(Parser, Debug)]
#[command(name = "taskweave")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKWEAVE_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskweave/taskweave.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// State file to use instead of the configured one
    #[arg(short = 's', long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a task definition from DSL text
    Create {
        name: String,
        dsl: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List task definitions
    List {
        /// Only names containing this text
        #[arg(long)]
        name: Option<String>,

        /// Only definitions whose DSL contains this text
        #[arg(long)]
        dsl: Option<String>,

        /// Only descriptions containing this text
        #[arg(long)]
        description: Option<String>,

        /// Include deployment properties of the last execution
        #[arg(long)]
        manifest: bool,

        #[arg(long, default_value_t = 0)]
        page: usize,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: usize,
    },

    /// Show one task definition with its latest execution
    Get {
        name: String,

        #[arg(long)]
        manifest: bool,
    },

    /// Delete a task definition (and its children if it is composed)
    Delete { name: String },

    /// Delete every task definition
    DeleteAll {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Launch a task definition
    Launch {
        name: String,

        /// Whitespace separated command line arguments
        #[arg(long)]
        arguments: Option<String>,

        /// Comma separated app.* / deployer.* properties
        #[arg(long)]
        properties: Option<String>,
    },

    /// Print the launch request without launching
    Assemble {
        name: String,

        #[arg(long)]
        arguments: Option<String>,

        #[arg(long)]
        properties: Option<String>,
    },

    /// Mark an execution as finished
    Complete { execution_id: i64, exit_code: i32 },

    /// Check a definition's apps against the registry
    Validate { name: String },

    /// Register an application artifact
    Register {
        name: String,
        uri: String,

        #[arg(long = "type", default_value = "task")]
        app_type: ApplicationType,

        #[arg(long, default_value = "1.0.0")]
        version: String,

        /// Default property as key=value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,

        /// Make this the default version of the app
        #[arg(long)]
        default: bool,
    },
}

impl Command {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::List { .. }
                | Command::Get { .. }
                | Command::Assemble { .. }
                | Command::Validate { .. }
        )
    }
}

fn main() {
    let cli = Cli::parse();
    taskweave::log::init(cli.debug);

    if let Err(e) = run(cli) {
        twlog_error!("Command failed: {}", e);
        let json_output = serde_json::json!({
            "status": e.status_code(),
            "error": e.to_string(),
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json_output).unwrap_or_else(|_| e.to_string())
        );
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    if !config.enabled {
        return Err(Error::Config(
            "task operations are disabled (set enabled = true in taskweave.toml)".to_string(),
        ));
    }
    let state_path = match cli.state {
        Some(path) => path,
        None => config.state_path()?,
    };
    twlog_debug!(
        "Command: {:?}, state={}",
        cli.command,
        state_path.display()
    );

    if let Command::DeleteAll { yes: false } = cli.command {
        if !confirm("Delete ALL task definitions?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let stores = StateSnapshot::load(&state_path).await?.into_stores()?;
        let service = build_service(&stores, &config)?;
        let mutates = cli.command.mutates();

        let result = with_timeout(
            config.request_timeout(),
            dispatch(cli.command, &service, &stores),
        )
        .await;

        // Partial work (e.g. children saved before a launch failure) is kept
        if mutates {
            StateSnapshot::capture(&stores)
                .await
                .save(&state_path)
                .await?;
        }
        result
    })
}

fn build_service(stores: &Stores, config: &Config) -> Result<TaskService> {
    TaskService::new(
        Arc::new(stores.definitions.clone()),
        Arc::new(stores.registry.clone()),
        Arc::new(ProcessLauncher::new()),
        Arc::new(stores.executions.clone()),
    )
    .with_config(config)
}

async fn dispatch(command: Command, service: &TaskService, stores: &Stores) -> Result<()> {
    match command {
        Command::Create {
            name,
            dsl,
            description,
        } => {
            let definition = service.create(&name, &dsl, description.as_deref()).await?;
            twlog!("Created task {}", definition.name);
            print_json(&service.get(&definition.name, false).await?)
        }
        Command::List {
            name,
            dsl,
            description,
            manifest,
            page,
            size,
        } => {
            let query = ListQuery {
                name,
                dsl,
                description,
                manifest,
                page: PageRequest::new(page, size),
            };
            print_json(&service.list(&query).await?)
        }
        Command::Get { name, manifest } => print_json(&service.get(&name, manifest).await?),
        Command::Delete { name } => {
            let removed = service.delete(&name).await?;
            print_json(&serde_json::json!({ "deleted": removed }))
        }
        Command::DeleteAll { .. } => {
            let removed = service.delete_all().await?;
            print_json(&serde_json::json!({ "deleted": removed }))
        }
        Command::Launch {
            name,
            arguments,
            properties,
        } => {
            let execution = service
                .launch(&name, arguments.as_deref(), properties.as_deref())
                .await?;
            print_json(&execution)
        }
        Command::Assemble {
            name,
            arguments,
            properties,
        } => {
            let request = service
                .assemble(&name, arguments.as_deref(), properties.as_deref())
                .await?;
            print_json(&request)
        }
        Command::Complete {
            execution_id,
            exit_code,
        } => {
            let execution = stores
                .executions
                .complete_execution(execution_id, exit_code)
                .await?;
            print_json(&execution)
        }
        Command::Validate { name } => print_json(&service.validate(&name).await?),
        Command::Register {
            name,
            uri,
            app_type,
            version,
            properties,
            default,
        } => {
            let registration = AppRegistration::new(&name, app_type, &version, &uri)
                .with_default_properties(parse_key_values(&properties)?);
            stores.registry.register(registration).await?;
            if default {
                stores
                    .registry
                    .set_default_version(&name, app_type, &version)
                    .await;
            }
            print_json(&stores.registry.registrations().await)
        }
    }
}

fn parse_key_values(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(Error::BadRequest(format!(
                "property must be key=value: {}",
                pair
            ))),
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{self, Write};

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
