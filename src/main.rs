//! Converge CLI entrypoint.
//!
//! This is the main entrypoint for the converge command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use converge::cli::{Cli, Commands, OutputFormatter};
use converge::config::{find_config_file, ConfigParser, ConfigValidator, ReconcileDoc, TransportKind};
use converge::diff::StateMode;
use converge::error::{ConfigError, ConvergeError, Result};
use converge::reconciler::{ReconcileRequest, Reconciler};
use converge::resource::KindRegistry;
use converge::transport::{FixtureTransport, RestTransport, Transport};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

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
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Gather => cmd_gather(cli.config.as_ref(), &formatter).await,
        Commands::Plan { detailed } => {
            cmd_plan(cli.config.as_ref(), cli.mode, detailed, &formatter).await
        }
        Commands::Apply { yes, check } => {
            cmd_apply(cli.config.as_ref(), cli.mode, yes, check, &formatter).await
        }
        Commands::Render => cmd_render(cli.config.as_ref(), cli.mode, &formatter),
    }
}

/// Initialize a new project.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing new converge project in: {}", path.display());

    let config_path = path.join("converge.yaml");
    let env_path = path.join(".env.example");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/converge.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your device token");
    eprintln!("  2. Edit converge.yaml with your target device and desired state");
    eprintln!("  3. Run 'converge validate' to check your configuration");
    eprintln!("  4. Run 'converge plan' to see what would change");
    eprintln!("  5. Run 'converge apply' to reconcile the device");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (doc, _) = load_doc(config_path)?;

    let registry = KindRegistry::with_builtin_kinds();
    let result = ConfigValidator::new(&registry).validate(&doc);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    if result.is_valid() {
        eprintln!("Configuration summary:");
        eprintln!("  Kind: {}", doc.kind);
        eprintln!("  Mode: {}", doc.mode);
        eprintln!("  Transport: {}", doc.target.transport);
        eprintln!("  Resources: {}", doc.resources.len());
        Ok(())
    } else {
        Err(ConvergeError::Config(ConfigError::InvalidTarget {
            message: "configuration validation failed".to_string(),
        }))
    }
}

/// Collect and show observed state.
async fn cmd_gather(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (doc, _) = load_doc(config_path)?;
    let transport = create_transport(&doc)?;

    let registry = KindRegistry::with_builtin_kinds();
    let reconciler = Reconciler::new(&registry, transport.as_ref());
    let state = reconciler.gather(&doc.kind).await?;

    eprintln!("{}", formatter.format_state(&doc.kind, &state));
    Ok(())
}

/// Show the pending changes.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    mode: Option<StateMode>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (doc, request) = prepare(config_path, mode)?;
    let transport = create_transport(&doc)?;

    let registry = KindRegistry::with_builtin_kinds();
    let reconciler = build_reconciler(&registry, transport.as_ref(), &doc);
    let outcome = reconciler.plan(&request).await?;

    eprintln!("{}", formatter.format_plan(&outcome, detailed));
    Ok(())
}

/// Apply the pending changes.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    mode: Option<StateMode>,
    auto_approve: bool,
    check: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (doc, mut request) = prepare(config_path, mode)?;
    request.check_mode = request.check_mode || check;
    let transport = create_transport(&doc)?;

    let registry = KindRegistry::with_builtin_kinds();
    let reconciler = build_reconciler(&registry, transport.as_ref(), &doc);

    // Plan first so the user confirms what will actually be sent.
    let plan = reconciler.plan(&request).await?;
    if !plan.changed {
        eprintln!("No changes to apply.");
        return Ok(());
    }
    eprintln!("{}", formatter.format_plan(&plan, true));

    if !auto_approve && !request.check_mode {
        eprint!("Do you want to apply these changes? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(());
        }
    }

    let outcome = reconciler.run(&request).await?;
    eprintln!("{}", formatter.format_apply(&outcome));
    Ok(())
}

/// Print the operations the desired state renders to from scratch.
///
/// Never contacts the device; the observed state is taken to be empty.
fn cmd_render(
    config_path: Option<&PathBuf>,
    mode: Option<StateMode>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (doc, request) = prepare(config_path, mode)?;
    let transport = create_transport(&doc)?;

    let registry = KindRegistry::with_builtin_kinds();
    let reconciler = build_reconciler(&registry, transport.as_ref(), &doc);
    let outcome = reconciler.render(&request)?;

    print!("{}", formatter.format_operations(&outcome));
    Ok(())
}

/// Loads the document and derives the reconcile request from it.
fn prepare(
    config_path: Option<&PathBuf>,
    mode: Option<StateMode>,
) -> Result<(ReconcileDoc, ReconcileRequest)> {
    let (doc, _) = load_doc(config_path)?;
    let request = ReconcileRequest {
        kind: doc.kind.clone(),
        resources: doc.resources.clone(),
        mode: mode.unwrap_or(doc.mode),
        check_mode: doc.check_mode,
    };
    Ok((doc, request))
}

/// Resolves, loads and env-merges the configuration document.
fn load_doc(config_path: Option<&PathBuf>) -> Result<(ReconcileDoc, PathBuf)> {
    let config_file = match config_path {
        Some(path) => path.clone(),
        None => find_config_file(std::env::current_dir()?)?,
    };

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    parser.load_dotenv()?;
    let doc = parser.load_with_env(&config_file)?;
    Ok((doc, config_file))
}

/// Builds the transport named by the document.
fn create_transport(doc: &ReconcileDoc) -> Result<Box<dyn Transport>> {
    match doc.target.transport {
        TransportKind::Rest => {
            let endpoint = doc.target.endpoint.as_deref().ok_or_else(|| {
                ConvergeError::Config(ConfigError::InvalidTarget {
                    message: "rest transport requires an endpoint".to_string(),
                })
            })?;
            let token = ConfigParser::get_device_token();
            let transport = match doc.target.timeout_secs {
                Some(secs) => RestTransport::with_timeout(endpoint, token, secs)?,
                None => RestTransport::new(endpoint, token)?,
            };
            Ok(Box::new(transport))
        }
        TransportKind::Fixture => {
            let fixtures = doc.target.fixtures.as_deref().ok_or_else(|| {
                ConvergeError::Config(ConfigError::InvalidTarget {
                    message: "fixture transport requires a fixtures directory".to_string(),
                })
            })?;
            Ok(Box::new(FixtureTransport::new(fixtures)))
        }
    }
}

/// Applies the document's engine settings to a reconciler.
fn build_reconciler<'a>(
    registry: &'a KindRegistry,
    transport: &'a dyn Transport,
    doc: &ReconcileDoc,
) -> Reconciler<'a> {
    Reconciler::new(registry, transport)
        .with_null_handling(doc.settings.null_handling)
        .with_protected(doc.settings.protect.clone())
}
