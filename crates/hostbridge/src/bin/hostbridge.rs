//! Hostbridge CLI
//!
//! Usage:
//!   hostbridge ping                              # Check the host is alive
//!   hostbridge send <kind> -p '<json>'           # Dispatch one command
//!   hostbridge send <kind> -p '<json>' --validate-only
//!   hostbridge tools                             # List known tools
//!   hostbridge -c ./bridge.yaml ping             # Use a specific config file

use anyhow::{bail, Context};
use argh::FromArgs;
use hostbridge::{BridgeConfig, Dispatcher};
use serde_json::{Map, Value};

/// Hostbridge - validated command bridge to an editor host
#[derive(FromArgs)]
struct Args {
    /// path to config file (default: ~/.hostbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// show version information
    #[argh(switch, short = 'V')]
    version: bool,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Ping(PingArgs),
    Send(SendArgs),
    Tools(ToolsArgs),
}

/// Probe the host, reconnecting if needed
#[derive(FromArgs)]
#[argh(subcommand, name = "ping")]
struct PingArgs {}

/// Validate and send one command
#[derive(FromArgs)]
#[argh(subcommand, name = "send")]
struct SendArgs {
    /// command kind (tool name), e.g. manage_gameobject
    #[argh(positional)]
    kind: String,

    /// command parameters as a JSON object (default: {})
    #[argh(option, short = 'p', default = "String::from(\"{}\")")]
    params: String,

    /// only validate; locally verifiable actions never reach the host
    #[argh(switch)]
    validate_only: bool,
}

/// List registered tools and their actions
#[derive(FromArgs)]
#[argh(subcommand, name = "tools")]
struct ToolsArgs {}

fn parse_params(raw: &str, validate_only: bool) -> anyhow::Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("params must be valid JSON")?;
    let Value::Object(mut params) = value else {
        bail!("params must be a JSON object");
    };
    if validate_only {
        params.insert(
            hostbridge::dispatcher::VALIDATE_ONLY_KEY.to_string(),
            Value::Bool(true),
        );
    }
    Ok(params)
}

fn print_tools(dispatcher: &Dispatcher<hostbridge::Connection>) {
    for tool in dispatcher.tools() {
        println!("{}  {}", tool.name, tool.description);
        for action in &tool.actions {
            let required: Vec<String> = action
                .required
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty.name()))
                .collect();
            println!(
                "    {:<16} {}{}",
                action.action,
                required.join(", "),
                if action.locally_verifiable { "  [local]" } else { "" }
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Args = argh::from_env();

    if args.version {
        println!("hostbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = args
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(BridgeConfig::default_path);
    let config = BridgeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    log::debug!("Using host {}", config.address());
    let dispatcher = Dispatcher::from_config(config);

    match args.command {
        None => {
            eprintln!("Hostbridge - validated command bridge to an editor host\n");
            eprintln!("Usage: hostbridge [-c <config>] <command>\n");
            eprintln!("Commands:");
            eprintln!("  ping      Probe the host, reconnecting if needed");
            eprintln!("  send      Validate and send one command:");
            eprintln!("              <kind>: tool name");
            eprintln!("              -p, --params <json>: parameters object");
            eprintln!("              --validate-only: validate without executing");
            eprintln!("  tools     List registered tools and their actions");
            eprintln!("\nRun 'hostbridge <command> --help' for more information.");
        }
        Some(Command::Ping(_)) => {
            let d = dispatcher.clone();
            tokio::task::spawn_blocking(move || d.ensure_live()).await??;
            println!("pong");
        }
        Some(Command::Send(args)) => {
            let params = parse_params(&args.params, args.validate_only)?;
            let result = dispatcher.dispatch_async(args.kind, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Command::Tools(_)) => print_tools(&dispatcher),
    }

    Ok(())
}
