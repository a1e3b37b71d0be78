//! Manila Provisioner
//!
//! Provisions OpenStack Manila NFS shares for Kubernetes
//! PersistentVolumeClaims and publishes them as PersistentVolumes.

use clap::{Args as ClapArgs, Parser, Subcommand};
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use manila_provisioner::platform::kubernetes::{
    create_volume, load_claim, load_claim_file, load_storage_class, load_volume,
    load_volume_file, DEFAULT_RECLAIM_POLICY,
};
use manila_provisioner::provisioner::{check_microversion, zones_to_set, SHARE_NAME_PREFIX};
use manila_provisioner::{
    AccessConfig, Error, ManilaClient, NodeZoneLister, OpenStackConfig, PollPolicy,
    ProvisionOptions, Provisioner, ProvisionerConfig, Result, SharedFileSystemApiRef, StaticZones,
    ZoneSourceRef,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Manila Provisioner - NFS shares for Kubernetes PersistentVolumeClaims
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    openstack: OpenStackArgs,

    /// Poll timeout for share readiness in seconds
    #[arg(long, env = "POLL_TIMEOUT", default_value = "120")]
    poll_timeout_secs: u64,

    /// First delay between readiness polls in milliseconds
    #[arg(long, env = "POLL_INITIAL_INTERVAL", default_value = "1000")]
    poll_initial_interval_ms: u64,

    /// Longest delay between readiness polls in seconds
    #[arg(long, env = "POLL_MAX_INTERVAL", default_value = "30")]
    poll_max_interval_secs: u64,

    /// CIDR granted read-write access on new shares
    #[arg(long, env = "ACCESS_TO", default_value = "0.0.0.0/0")]
    access_to: String,

    /// Do not grant any access rule on new shares
    #[arg(long, env = "NO_ACCESS")]
    no_access: bool,

    /// Comma separated zones to choose from instead of node labels
    #[arg(long, env = "ZONES")]
    zones: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct OpenStackArgs {
    /// Keystone v3 auth URL
    #[arg(long, env = "OS_AUTH_URL")]
    auth_url: String,

    /// OpenStack username
    #[arg(long, env = "OS_USERNAME")]
    username: String,

    /// OpenStack password
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    password: String,

    /// Project to scope the token to
    #[arg(long, env = "OS_PROJECT_NAME")]
    project_name: String,

    /// Domain of the user
    #[arg(long, env = "OS_USER_DOMAIN_NAME", default_value = "Default")]
    user_domain_name: String,

    /// Domain of the project
    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", default_value = "Default")]
    project_domain_name: String,

    /// Region of the share service endpoint
    #[arg(long, env = "OS_REGION_NAME", default_value = "RegionOne")]
    region: String,

    /// Manila microversion pinned on every request
    #[arg(long, env = "MANILA_MICROVERSION", default_value = "2.21")]
    microversion: String,
}

impl From<&OpenStackArgs> for OpenStackConfig {
    fn from(args: &OpenStackArgs) -> Self {
        Self {
            auth_url: args.auth_url.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            project_name: args.project_name.clone(),
            user_domain_name: args.user_domain_name.clone(),
            project_domain_name: args.project_domain_name.clone(),
            region: args.region.clone(),
            microversion: args.microversion.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a share for a claim and print the resulting PersistentVolume
    Provision(ProvisionArgs),
    /// Delete the share backing a PersistentVolume
    Delete(DeleteArgs),
    /// Show the microversion range of the share service
    Versions,
}

#[derive(ClapArgs, Debug)]
struct ProvisionArgs {
    /// Claim in the cluster, as namespace/name
    #[arg(long, conflicts_with = "claim_file", required_unless_present = "claim_file")]
    claim: Option<String>,

    /// Claim manifest in YAML
    #[arg(long)]
    claim_file: Option<PathBuf>,

    /// Storage class to read parameters and reclaim policy from
    #[arg(long)]
    storage_class: Option<String>,

    /// Storage class parameter override, as key=value
    #[arg(long = "parameter", value_parser = parse_key_val)]
    parameters: Vec<(String, String)>,

    /// Name of the PersistentVolume (defaults to pvc-<claim uid>)
    #[arg(long)]
    volume_name: Option<String>,

    /// Reclaim policy override
    #[arg(long)]
    reclaim_policy: Option<String>,

    /// Create the PersistentVolume in the cluster
    #[arg(long)]
    create_pv: bool,
}

#[derive(ClapArgs, Debug)]
struct DeleteArgs {
    /// PersistentVolume manifest in YAML
    #[arg(long, conflicts_with = "volume", required_unless_present = "volume")]
    pv_file: Option<PathBuf>,

    /// PersistentVolume in the cluster
    #[arg(long)]
    volume: Option<String>,
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting Manila Provisioner");
    info!("  Version: {}", manila_provisioner::VERSION);
    info!("  Auth URL: {}", args.openstack.auth_url);
    info!("  Region: {}", args.openstack.region);

    let manila = ManilaClient::authenticate(&OpenStackConfig::from(&args.openstack)).await?;
    let api: SharedFileSystemApiRef = Arc::new(manila);

    match &args.command {
        Command::Provision(provision) => run_provision(&args, provision, api).await,
        Command::Delete(delete) => run_delete(&args, delete, api).await,
        Command::Versions => run_versions(api).await,
    }
}

fn provisioner_config(args: &Args) -> ProvisionerConfig {
    ProvisionerConfig {
        poll: PollPolicy {
            initial_interval: Duration::from_millis(args.poll_initial_interval_ms),
            max_interval: Duration::from_secs(args.poll_max_interval_secs),
            timeout: Duration::from_secs(args.poll_timeout_secs),
        },
        access: (!args.no_access).then(|| AccessConfig {
            access_to: args.access_to.clone(),
            ..AccessConfig::default()
        }),
    }
}

async fn run_provision(
    args: &Args,
    provision: &ProvisionArgs,
    api: SharedFileSystemApiRef,
) -> Result<()> {
    let needs_cluster = provision.claim.is_some()
        || provision.storage_class.is_some()
        || provision.create_pv
        || args.zones.is_none();
    let client = if needs_cluster {
        Some(Client::try_default().await?)
    } else {
        None
    };
    let cluster = || {
        client
            .clone()
            .ok_or_else(|| Error::Configuration("no Kubernetes client".into()))
    };

    let claim = match (&provision.claim, &provision.claim_file) {
        (Some(reference), _) => {
            let (namespace, name) = reference.split_once('/').ok_or_else(|| {
                Error::Configuration(format!("claim {reference:?} is not namespace/name"))
            })?;
            load_claim(cluster()?, namespace, name).await?
        }
        (None, Some(path)) => load_claim_file(path)?,
        (None, None) => return Err(Error::Configuration("no claim given".into())),
    };

    let (mut parameters, class_policy) = match &provision.storage_class {
        Some(name) => {
            let settings = load_storage_class(cluster()?, name).await?;
            (settings.parameters, settings.reclaim_policy)
        }
        None => (Default::default(), DEFAULT_RECLAIM_POLICY.to_string()),
    };
    parameters.extend(provision.parameters.iter().cloned());

    let volume_name = match &provision.volume_name {
        Some(name) => name.clone(),
        None => format!(
            "{}{}",
            SHARE_NAME_PREFIX,
            claim.metadata.uid.as_deref().unwrap_or_default()
        ),
    };

    let mut options = ProvisionOptions::new(claim, volume_name)
        .with_reclaim_policy(provision.reclaim_policy.clone().unwrap_or(class_policy));
    options.parameters = parameters;

    let zones: ZoneSourceRef = match &args.zones {
        Some(zones) => Arc::new(StaticZones(zones_to_set(zones)?)),
        None => Arc::new(NodeZoneLister::new(cluster()?)),
    };

    let provisioner = Provisioner::connect(provisioner_config(args), api, zones).await?;
    let volume = provisioner.provision(&options).await?;

    if provision.create_pv {
        create_volume(cluster()?, &volume).await?;
    }

    print!("{}", serde_yaml::to_string(&volume)?);
    Ok(())
}

async fn run_delete(args: &Args, delete: &DeleteArgs, api: SharedFileSystemApiRef) -> Result<()> {
    let volume: PersistentVolume = match (&delete.pv_file, &delete.volume) {
        (Some(path), _) => load_volume_file(path)?,
        (None, Some(name)) => load_volume(Client::try_default().await?, name).await?,
        (None, None) => return Err(Error::Configuration("no volume given".into())),
    };

    let zones: ZoneSourceRef = Arc::new(StaticZones::default());
    let provisioner = Provisioner::connect(provisioner_config(args), api, zones).await?;
    provisioner.delete(&volume).await?;

    info!(
        "Deleted share for volume {}",
        volume.metadata.name.as_deref().unwrap_or_default()
    );
    Ok(())
}

async fn run_versions(api: SharedFileSystemApiRef) -> Result<()> {
    let version = api.api_version().await?;
    println!("id: {}", version.id);
    println!("status: {}", version.status);
    println!("min_version: {}", version.min_version);
    println!("max_version: {}", version.version);

    let negotiated =
        check_microversion(api.microversion(), &version.min_version, &version.version)?;
    println!("client_microversion: {negotiated}");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so stdout carries only the manifest
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
