use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::info;

use hclexport_core::emitter::Emitter;
use hclexport_core::export::{ExportConfig, ExportFormat, ExportResult, Exporter};
use hclexport_core::resolver::MissingAction;
use hclexport_core::resource::ExportedResource;
use hclexport_genesys::{ClientConfig, GenesysClient, PROVIDER_SOURCE, RESOURCE_TYPES};
use hclexport_state::{LocalBackend, StateBackend, StateFile};

/// Output file name without the `.tf` / `.tf.json` extension
const CONFIG_FILE_STEM: &str = "genesyscloud";
/// Holds the `terraform` block when resources are split by type
const PROVIDER_FILE_STEM: &str = "provider";

#[derive(Parser)]
#[command(name = "hclexport")]
#[command(about = "Export a Genesys Cloud organization as Terraform configuration", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export resources to a directory
    Export(ExportArgs),
    /// List the resource types that can be exported
    Types,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Hcl,
    Json,
    HclJson,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Hcl => ExportFormat::Hcl,
            FormatArg::Json => ExportFormat::Json,
            FormatArg::HclJson => ExportFormat::HclJson,
        }
    }
}

#[derive(Args, Default)]
struct ExportArgs {
    /// Output directory
    #[arg(short, long, default_value = "./genesyscloud")]
    directory: PathBuf,

    /// JSON file with export settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Types to export, as `<type>` or `<type>::<name regex>`
    #[arg(long, value_delimiter = ',')]
    resource_types: Vec<String>,

    /// Types to skip, as `<type>` or `<type>::<name regex>`
    #[arg(long, value_delimiter = ',')]
    exclude_resource_types: Vec<String>,

    /// Attributes to leave out, as `<type>.<attribute path>`
    #[arg(long, value_delimiter = ',')]
    exclude_attributes: Vec<String>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Also write terraform.tfstate
    #[arg(long)]
    include_state_file: bool,

    /// Write one file per resource type
    #[arg(long)]
    split_files_by_resource: bool,

    /// Write depends_on for referenced resources
    #[arg(long)]
    depends_on: bool,

    /// Abort on the first type that fails to export
    #[arg(long)]
    fail_fast: bool,

    /// Log permission errors and skip the type instead of failing
    #[arg(long)]
    log_permission_errors: bool,

    /// Also export resources referenced by the selected ones
    #[arg(long)]
    enable_dependency_resolution: bool,

    /// Fail when resources reference each other in a cycle
    #[arg(long)]
    fail_on_cycles: bool,

    /// Drop references to resources that are not exported
    #[arg(long)]
    drop_unresolved: bool,

    /// Genesys Cloud region (default: GENESYSCLOUD_REGION or us-east-1)
    #[arg(long)]
    region: Option<String>,

    /// OAuth client ID (default: GENESYSCLOUD_OAUTHCLIENT_ID)
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth client secret (default: GENESYSCLOUD_OAUTHCLIENT_SECRET)
    #[arg(long)]
    client_secret: Option<String>,

    /// Maximum concurrent API requests (default: GENESYSCLOUD_TOKEN_POOL_SIZE or 10)
    #[arg(long)]
    max_clients: Option<usize>,

    /// Seconds to keep retrying a throttled or failing request
    #[arg(long)]
    max_retry_seconds: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Export(args) => run_export(args).await,
        Commands::Types => {
            run_types();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_types() {
    for resource_type in RESOURCE_TYPES {
        println!("{}", resource_type);
    }
}

async fn run_export(args: ExportArgs) -> Result<(), String> {
    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => ExportConfig::default(),
    };
    let config = merge_config(base, &args);
    let client_config = client_config(ClientConfig::from_env(), &args);

    let client = GenesysClient::new(client_config)
        .map_err(|e| format!("Failed to create client: {}", e))?;
    let registry = hclexport_genesys::registry(Arc::new(client));

    println!("{}", "Exporting resources...".cyan().bold());
    let result = Exporter::new(registry)
        .with_config(config.clone())
        .run()
        .await
        .map_err(|e| e.to_string())?;

    print_summary(&result);
    let written = write_outputs(&args.directory, &result, &config).await?;
    println!();
    for path in &written {
        println!("  {} {}", "✓".green(), path.display());
    }

    if result.is_success() {
        println!("{}", "Export complete.".green().bold());
        Ok(())
    } else {
        Err(format!(
            "{} resource type(s) failed to export",
            result.failures.len()
        ))
    }
}

fn load_config(path: &Path) -> Result<ExportConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Overlay command-line flags on file or default settings
fn merge_config(mut config: ExportConfig, args: &ExportArgs) -> ExportConfig {
    if !args.resource_types.is_empty() {
        config.resource_types = args.resource_types.clone();
    }
    if !args.exclude_resource_types.is_empty() {
        config.exclude_resource_types = args.exclude_resource_types.clone();
    }
    if !args.exclude_attributes.is_empty() {
        config.exclude_attributes = args.exclude_attributes.clone();
    }
    if let Some(format) = args.format {
        config.format = format.into();
    }
    config.include_state_file |= args.include_state_file;
    config.split_files_by_resource |= args.split_files_by_resource;
    config.depends_on |= args.depends_on;
    config.log_permission_errors |= args.log_permission_errors;
    config.enable_dependency_resolution |= args.enable_dependency_resolution;
    if args.fail_on_cycles {
        config.ignore_cyclic_deps = false;
    }
    if args.fail_fast {
        config.continue_on_error = false;
    }
    if args.drop_unresolved {
        config.keep_unresolved = false;
    }
    config
}

fn client_config(mut config: ClientConfig, args: &ExportArgs) -> ClientConfig {
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if let Some(id) = &args.client_id {
        config.client_id = Some(id.clone());
    }
    if let Some(secret) = &args.client_secret {
        config.client_secret = Some(secret.clone());
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(secs) = args.max_retry_seconds {
        config.max_retry_time = Duration::from_secs(secs);
    }
    config
}

fn print_summary(result: &ExportResult) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in &result.resources {
        *counts
            .entry(resource.address.resource_type.as_str())
            .or_default() += 1;
    }

    println!();
    for (resource_type, count) in &counts {
        println!("  {:>5}  {}", count, resource_type);
    }

    if result.dependencies > 0 {
        println!(
            "  {} {} referenced resource(s) added as dependencies",
            "+".cyan(),
            result.dependencies
        );
    }
    if result.vanished > 0 {
        println!(
            "  {} {} object(s) disappeared during the export",
            "!".yellow(),
            result.vanished
        );
    }

    let dropped = result
        .unresolved
        .iter()
        .filter(|(_, r)| r.action != MissingAction::Kept)
        .count();
    let kept = result.unresolved.len() - dropped;
    if kept > 0 {
        println!(
            "  {} {} reference(s) to unexported resources kept as raw IDs",
            "!".yellow(),
            kept
        );
    }
    if dropped > 0 {
        println!(
            "  {} {} reference(s) to unexported resources removed",
            "!".yellow(),
            dropped
        );
    }

    for denied in &result.permission_denied {
        println!("  {} {} (skipped)", "!".yellow(), denied);
    }
    for failure in &result.failures {
        println!("  {} {}", "✗".red(), failure);
    }
}

/// Write the configured output files and return their paths
async fn write_outputs(
    directory: &Path,
    result: &ExportResult,
    config: &ExportConfig,
) -> Result<Vec<PathBuf>, String> {
    fs::create_dir_all(directory)
        .map_err(|e| format!("Failed to create {}: {}", directory.display(), e))?;

    let emitter = Emitter::new(config.format_options.clone())
        .with_provider(hclexport_genesys::required_provider())
        .with_depends_on(config.depends_on);
    let mut written = Vec::new();

    if config.split_files_by_resource {
        written.extend(write_config(directory, PROVIDER_FILE_STEM, &emitter, &[], config)?);
        let per_type = Emitter::new(config.format_options.clone()).with_depends_on(config.depends_on);
        for (resource_type, resources) in by_type(&result.resources) {
            written.extend(write_config(directory, resource_type, &per_type, &resources, config)?);
        }
    } else {
        written.extend(write_config(
            directory,
            CONFIG_FILE_STEM,
            &emitter,
            &result.resources,
            config,
        )?);
    }

    if config.include_state_file {
        let backend = LocalBackend::with_path(directory.join(LocalBackend::DEFAULT_STATE_FILE));
        let mut state = StateFile::from_exported(&result.resources, PROVIDER_SOURCE);
        if let Some(previous) = backend.read_state().await.map_err(|e| e.to_string())? {
            state.continue_lineage(&previous);
        }
        backend
            .write_state(&state)
            .await
            .map_err(|e| e.to_string())?;
        written.push(backend.state_path().clone());
    }

    info!("Wrote {} file(s) to {}", written.len(), directory.display());
    Ok(written)
}

/// Write `<stem>.tf` and/or `<stem>.tf.json`
fn write_config(
    directory: &Path,
    stem: &str,
    emitter: &Emitter,
    resources: &[ExportedResource],
    config: &ExportConfig,
) -> Result<Vec<PathBuf>, String> {
    let mut written = Vec::new();
    if config.format.writes_hcl() {
        let path = directory.join(format!("{}.tf", stem));
        write_file(&path, &emitter.hcl(resources))?;
        written.push(path);
    }
    if config.format.writes_json() {
        let path = directory.join(format!("{}.tf.json", stem));
        let json = emitter
            .json(resources)
            .map_err(|e| format!("Failed to serialize {}: {}", path.display(), e))?;
        write_file(&path, &json)?;
        written.push(path);
    }
    Ok(written)
}

fn by_type(resources: &[ExportedResource]) -> BTreeMap<&str, Vec<ExportedResource>> {
    let mut grouped: BTreeMap<&str, Vec<ExportedResource>> = BTreeMap::new();
    for resource in resources {
        grouped
            .entry(resource.address.resource_type.as_str())
            .or_default()
            .push(resource.clone());
    }
    grouped
}

fn write_file(path: &Path, content: &str) -> Result<(), String> {
    fs::write(path, content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}
