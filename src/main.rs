//! gs316ep CLI entrypoint.
//!
//! This is the main entrypoint for the gs316ep command-line tool.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use gs316ep_manager::cli::{Cli, Commands, GetArg, OutputFormatter, VlanArgs};
use gs316ep_manager::config::{ConfigParser, VlanValidator, parse_set_specs, to_set_command};
use gs316ep_manager::error::{AuthError, ConfigError, Result};
use gs316ep_manager::reconciler::Reconciler;
use gs316ep_manager::switch::{
    ClientOptions, FirmwareUpdater, MirrorConfig, SwitchClient, TokenCache, VlanDevice,
    apply_mirror, power_cycle_ports, validate_poe_ports,
};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Program name used in rendered commands.
const PROGRAM: &str = "gs316ep";

/// Main entrypoint.
fn main() -> ExitCode {
    // The .env file feeds the clap environment fallbacks, so it loads first.
    if let Err(e) = ConfigParser::new().load_dotenv() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Connection settings taken from the global options.
struct Connection {
    /// `http://host:port`.
    base_url: String,
    /// Admin password.
    password: Option<String>,
    /// HTTP client options.
    options: ClientOptions,
}

impl Connection {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let host = cli.host.as_deref().ok_or_else(|| ConfigError::MissingSetting {
            name: String::from("--host (or SWITCH_HOST)"),
        })?;
        let base_url = cli.base_url().unwrap_or_default();

        let token_cache = cli
            .token_cache
            .clone()
            .map_or_else(|| TokenCache::for_host(host), TokenCache::with_path);
        debug!("Token cache: {}", token_cache.path().display());

        Ok(Self {
            base_url,
            password: cli.password.clone(),
            options: ClientOptions {
                timeout: Duration::from_secs(cli.timeout),
                proxy_url: cli.proxy_url.clone(),
                token_cache: Some(token_cache),
            },
        })
    }

    /// Creates a client and logs in.
    async fn login(&self) -> Result<SwitchClient> {
        let password = self.password.as_deref().ok_or(AuthError::MissingPassword)?;
        let mut client = SwitchClient::new(&self.base_url, self.options.clone())?;
        client.login(password).await?;
        Ok(client)
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let connection = Connection::from_cli(&cli)?;

    match cli.command {
        Commands::Vlan(args) => cmd_vlan(&connection, args, &formatter).await,
        Commands::Poe { power_cycle_ports } => {
            cmd_poe(&connection, &power_cycle_ports, &formatter).await
        }
        Commands::MirrorPort {
            disable,
            src_ports,
            dest_port,
        } => cmd_mirror(&connection, disable, &src_ports, dest_port, &formatter).await,
        Commands::Update {
            reboot_wait,
            check_only,
        } => cmd_update(&connection, reboot_wait, check_only, &formatter).await,
    }
}

/// Read, set or reconcile VLANs.
async fn cmd_vlan(connection: &Connection, args: VlanArgs, formatter: &OutputFormatter) -> Result<()> {
    if args.dry_run && (args.mode.is_some() || args.get.is_some()) {
        warn!("--dry-run only applies to --set and --file, ignoring it");
    }

    if let Some(mode) = args.mode {
        let client = connection.login().await?;
        let change = VlanDevice::new(&client).set_mode(mode.into()).await?;
        print!("{}", formatter.format_mode_change(&change));
        return Ok(());
    }

    if let Some(get) = args.get {
        let client = connection.login().await?;
        let vlans = VlanDevice::new(&client).read_vlans().await?;
        let output = match get {
            GetArg::Info => formatter.format_vlans(&vlans),
            GetArg::Command => formatter.format_command(&to_set_command(PROGRAM, &vlans)),
        };
        print!("{output}");
        return Ok(());
    }

    // Validate before touching the network.
    let entries = match &args.file {
        Some(path) => load_desired_file(path)?,
        None => parse_set_specs(args.set.as_slice())?,
    };
    let desired = VlanValidator::new().validate(&entries)?;
    info!("Desired state has {} VLANs", desired.len());

    let client = connection.login().await?;
    let reconciler = Reconciler::new(&client);

    if args.dry_run {
        let plan = reconciler.plan(&desired).await?;
        print!("{}", formatter.format_plan(&plan));
    } else {
        let result = reconciler.reconcile(&desired).await?;
        print!("{}", formatter.format_reconciliation(&result));
    }

    Ok(())
}

/// Loads a YAML desired-state file.
fn load_desired_file(path: &Path) -> Result<gs316ep_manager::config::RawVlanEntries> {
    let config = ConfigParser::new().load_file(path)?;
    if config.is_empty() {
        warn!("{} declares no VLANs; every port will be homed on VLAN 1", path.display());
    }
    Ok(config.into_entries())
}

/// Power-cycle PoE ports.
async fn cmd_poe(connection: &Connection, ports: &[u8], formatter: &OutputFormatter) -> Result<()> {
    validate_poe_ports(ports)?;

    let client = connection.login().await?;
    let cycled = power_cycle_ports(&client, ports).await?;
    print!("{}", formatter.format_poe(&cycled));
    Ok(())
}

/// Enable or disable port mirroring.
async fn cmd_mirror(
    connection: &Connection,
    disable: bool,
    src_ports: &[u8],
    dest_port: Option<u8>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = if disable {
        MirrorConfig::Disabled
    } else {
        let dest_port = dest_port.ok_or_else(|| ConfigError::MissingSetting {
            name: String::from("--dest-port"),
        })?;
        MirrorConfig::enabled(src_ports, dest_port)?
    };

    let client = connection.login().await?;
    apply_mirror(&client, &config).await?;
    print!("{}", formatter.format_mirror(&config));
    Ok(())
}

/// Check for and install new firmware.
async fn cmd_update(
    connection: &Connection,
    reboot_wait: u64,
    check_only: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut client = connection.login().await?;
    let report = FirmwareUpdater::new(&mut client)?
        .with_reboot_wait(Duration::from_secs(reboot_wait))
        .run(check_only)
        .await?;
    print!("{}", formatter.format_update(&report));
    Ok(())
}
