//! Cloud Build CLI
//!
//! Entry point for the `cloud-build` command-line tool.

use clap::{Parser, Subcommand};
use cloud_build::signing::{AndroidSigningInput, IosSigningInput};
use cloud_build::{
    BuildConfiguration, BuildError, BuildOrchestrator, ConfigOverrides, ConfigStore,
    FileInspector, HttpBuildApi, HttpTransport, Platform, ProjectSettings, ServerConfig,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloud-build")]
#[command(about = "Build mobile apps on the cloud build service", version)]
struct Cli {
    /// Path to the config file (default: ~/.config/cloud-build/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Override the build service protocol (http or https)
    #[arg(long, global = true)]
    server_proto: Option<String>,

    /// Override the build service host
    #[arg(long, global = true)]
    server_host: Option<String>,

    /// Override the build service path prefix
    #[arg(long, global = true)]
    path_prefix: Option<String>,

    /// Override the request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project for a platform in the cloud
    Build(BuildArgs),

    /// Server configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Target platform (android or ios)
    platform: String,

    /// Project directory
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Build configuration name
    #[arg(long, default_value = "Debug", conflicts_with = "release")]
    configuration: String,

    /// Shorthand for --configuration Release
    #[arg(long)]
    release: bool,

    /// Signing certificate (PKCS#12)
    #[arg(long)]
    certificate: Option<PathBuf>,

    /// Password of the signing certificate; a wrong or missing password
    /// is reported when the certificate is read
    #[arg(long)]
    certificate_password: Option<String>,

    /// Provisioning profile (iOS device builds)
    #[arg(long)]
    provision: Option<PathBuf>,

    /// Build for an iOS device instead of the simulator
    #[arg(long)]
    for_device: bool,

    /// Device that must be included in the provisioning profile
    #[arg(long)]
    device: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Restore the default configuration
    Reset,
    /// Make a named profile the active configuration
    Apply {
        /// Profile name from the [profiles] table
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = match cli.config.clone() {
        Some(path) => ConfigStore::new(path),
        None => match ConfigStore::user_default() {
            Ok(store) => store,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
    };

    let overrides = ConfigOverrides {
        server_proto: cli.server_proto,
        server_host: cli.server_host,
        path_prefix: cli.path_prefix,
        request_timeout_seconds: cli.timeout,
    };

    match cli.command {
        Commands::Build(args) => run_build(&store, &overrides, args),
        Commands::Config { action } => run_config(&store, &overrides, action),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_build(store: &ConfigStore, overrides: &ConfigOverrides, args: BuildArgs) {
    match build(store, overrides, &args) {
        Ok(data) => {
            if args.json {
                match serde_json::to_string_pretty(&data) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing result: {}", e);
                        process::exit(1);
                    }
                }
            } else {
                if !data.stdout.is_empty() {
                    println!("{}", data.stdout);
                }
                if !data.stderr.is_empty() {
                    eprintln!("{}", data.stderr);
                }
                println!("Build result: {}", data.output_file_path.display());
            }
        }
        Err(e) => {
            if args.json {
                let report = serde_json::json!({
                    "error": e.to_string(),
                    "violations": e.violations(),
                    "exit_code": e.exit_code(),
                });
                println!("{}", report);
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(e.exit_code());
        }
    }
}

fn build(
    store: &ConfigStore,
    overrides: &ConfigOverrides,
    args: &BuildArgs,
) -> Result<cloud_build::BuildResultData, BuildError> {
    let platform: Platform = args
        .platform
        .parse()
        .map_err(|e: cloud_build::project::ProjectError| BuildError::Path(e.to_string()))?;
    let settings = load_project(&args.path)?;
    let configuration = if args.release {
        BuildConfiguration::release()
    } else {
        BuildConfiguration::new(args.configuration.as_str())
    };

    let config: ServerConfig = store.load(overrides.to_layer())?;
    let transport = Arc::new(
        HttpTransport::new(config.request_timeout())
            .map_err(|e| BuildError::Transport(e.into()))?,
    );
    let api = Arc::new(HttpBuildApi::new(transport.clone(), config.clone()));

    let android = AndroidSigningInput {
        certificate_path: args.certificate.clone(),
        certificate_password: args.certificate_password.clone(),
    };
    let ios = IosSigningInput {
        certificate_path: args.certificate.clone(),
        certificate_password: args.certificate_password.clone(),
        provisioning_profile_path: args.provision.clone(),
        build_for_device: args.for_device,
        target_device_identifier: args.device.clone(),
    };

    let mut orchestrator = BuildOrchestrator::new(api, transport, Arc::new(FileInspector::new()))
        .with_registry_url(config.registry_url.as_str());
    orchestrator.build(&settings, platform, &configuration, Some(&android), Some(&ios))
}

fn load_project(path: &Path) -> Result<ProjectSettings, BuildError> {
    ProjectSettings::load(path).map_err(|e| match e {
        cloud_build::project::ProjectError::Io(e) => BuildError::Io(e),
        e => BuildError::Path(e.to_string()),
    })
}

fn run_config(store: &ConfigStore, overrides: &ConfigOverrides, action: ConfigCommands) {
    let result = match action {
        ConfigCommands::Show => store.show(overrides.to_layer()),
        ConfigCommands::Reset => store.reset().and_then(|config| config.to_toml()),
        ConfigCommands::Apply { name } => store.apply(&name).and_then(|config| config.to_toml()),
    };

    match result {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
