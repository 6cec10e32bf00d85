//! Command-line interface for fabdeploy.
//!
//! Provides commands for staged deployment, logical-id repair and
//! scanning, workspace checks, single-item publishing and moving, and
//! verification.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::adapters::{FabricClient, WorkspaceApi};
use crate::bundle::{DefinitionStore, DegenerateIdRepairer};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    ArtifactPublisher, BundlePublisher, CancelToken, DeploymentVerifier, ExpectedArtifact,
    FolderOrganizer, LogicalIdResolver, PreconditionOutcome, PreconditionValidator, StagePlan,
    StagedDeploymentController, SubstitutionMode, VerificationReport,
};
use crate::domain::DeploymentSession;

/// fabdeploy - Staged deployment of artifact bundles into remote workspaces
#[derive(Parser, Debug)]
#[command(name = "fabdeploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command; they override the config file
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (default: discover .fabdeploy/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment overlay to apply (e.g. DEV, PROD)
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    /// Target workspace id
    #[arg(short, long, global = true)]
    pub workspace: Option<String>,

    /// Bundle root directory
    #[arg(short, long, global = true)]
    pub bundle: Option<PathBuf>,

    /// Bearer token for the workspace API
    #[arg(long, global = true, env = "FABDEPLOY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Workspace API root URL
    #[arg(long, global = true)]
    pub api_root: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the bundle, stage by stage
    Deploy {
        /// Item types to deploy in a single stage (comma-separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "stage")]
        item_types: Option<Vec<String>>,

        /// One stage of item types (comma-separated); repeat for more stages
        #[arg(long)]
        stage: Vec<String>,

        /// Deploy even if the workspace already has items
        #[arg(long)]
        allow_non_empty: bool,

        /// Skip the degenerate logical-id repair pass
        #[arg(long)]
        no_fix_ids: bool,

        /// Retries per stage
        #[arg(long)]
        retries: Option<u32>,

        /// Delay between retries in seconds
        #[arg(long)]
        retry_delay: Option<u64>,

        /// Display name of the artifact driving the deployment
        #[arg(long)]
        self_name: Option<String>,

        /// Type of the artifact driving the deployment
        #[arg(long)]
        self_type: Option<String>,

        /// Replace logical ids only as whole JSON string values
        #[arg(long)]
        structural: bool,

        /// Verify the workspace after deploying
        #[arg(long)]
        verify: bool,
    },

    /// Replace degenerate (all-zero) logical ids in the bundle
    FixIds {
        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how bundle logical ids map onto workspace items
    ScanIds,

    /// Check that the workspace is empty (apart from the self artifact)
    CheckWorkspace {
        /// Display name of the artifact driving the deployment
        #[arg(long)]
        self_name: Option<String>,

        /// Type of the artifact driving the deployment
        #[arg(long)]
        self_type: Option<String>,
    },

    /// Create or update a single item from the bundle
    PublishItem {
        /// Item type (e.g. Lakehouse, Notebook)
        item_type: String,

        /// Item directory relative to the bundle root
        path: String,

        /// Upload definitions without logical-id replacement
        #[arg(long)]
        no_resolve: bool,

        /// Move the item into this workspace folder after publishing
        #[arg(long)]
        folder: Option<String>,
    },

    /// Move an existing item into a workspace folder
    MoveItem {
        /// Item type (e.g. Lakehouse, Notebook)
        item_type: String,

        /// Item display name
        name: String,

        /// Destination folder display name
        folder: String,
    },

    /// Verify deployed items
    Verify {
        /// Expected item as NAME:TYPE; repeat for more
        #[arg(long = "expect", value_parser = parse_expected)]
        expected: Vec<ExpectedArtifact>,

        /// Skip per-item accessibility checks
        #[arg(long)]
        no_accessibility: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

fn parse_expected(s: &str) -> std::result::Result<ExpectedArtifact, String> {
    match s.rsplit_once(':') {
        Some((name, kind)) if !name.is_empty() && !kind.is_empty() => {
            Ok(ExpectedArtifact::new(name, kind))
        }
        _ => Err(format!("expected NAME:TYPE, got '{}'", s)),
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = resolve_config(&self.global)?;

        match self.command {
            Commands::Deploy {
                item_types,
                stage,
                allow_non_empty,
                no_fix_ids,
                retries,
                retry_delay,
                self_name,
                self_type,
                structural,
                verify,
            } => {
                let mut cfg = cfg;
                let d = &mut cfg.deployment;
                if item_types.is_some() || !stage.is_empty() {
                    d.item_types = item_types;
                    d.item_type_stages = if stage.is_empty() {
                        None
                    } else {
                        Some(stage.iter().map(|s| split_types(s)).collect())
                    };
                }
                d.allow_non_empty_workspace |= allow_non_empty;
                if no_fix_ids {
                    d.fix_zero_logical_ids = false;
                }
                if let Some(n) = retries {
                    d.deployment_retries = n;
                }
                if let Some(secs) = retry_delay {
                    d.retry_delay_seconds = secs;
                }
                apply_self_overrides(&mut cfg, self_name, self_type);
                if structural {
                    cfg.deployment.substitution_mode = SubstitutionMode::Structural;
                }
                cfg.deployment.verify_after_deployment |= verify;

                deploy(&cfg).await
            }
            Commands::FixIds { dry_run } => fix_ids(&cfg, dry_run),
            Commands::ScanIds => scan_ids(&cfg).await,
            Commands::CheckWorkspace {
                self_name,
                self_type,
            } => {
                let mut cfg = cfg;
                apply_self_overrides(&mut cfg, self_name, self_type);
                check_workspace(&cfg).await
            }
            Commands::PublishItem {
                item_type,
                path,
                no_resolve,
                folder,
            } => publish_item(&cfg, &item_type, &path, no_resolve, folder.as_deref()).await,
            Commands::MoveItem {
                item_type,
                name,
                folder,
            } => move_item(&cfg, &item_type, &name, &folder).await,
            Commands::Verify {
                expected,
                no_accessibility,
            } => verify(&cfg, &expected, no_accessibility).await,
            Commands::Config => show_config(&cfg),
        }
    }
}

/// Load configuration and apply global flag overrides
fn resolve_config(global: &GlobalArgs) -> Result<ResolvedConfig> {
    let mut cfg = if global.config.is_some() || global.environment.is_some() {
        let mut env = config::EnvOverrides::from_env();
        if global.environment.is_some() {
            env.environment = global.environment.clone();
        }
        let file = match &global.config {
            Some(path) => Some(path.clone()),
            None => config::config()?.config_file.clone(),
        };
        config::load_config_with(file, &env)?
    } else {
        config::config()?.clone()
    };

    if let Some(ws) = &global.workspace {
        cfg.deployment.workspace_id = Some(ws.clone());
    }
    if let Some(bundle) = &global.bundle {
        cfg.deployment.bundle_dir = bundle.clone();
    }
    if let Some(token) = &global.token {
        cfg.token = Some(token.clone());
    }
    if let Some(root) = &global.api_root {
        cfg.deployment.api_root_url = root.clone();
    }

    Ok(cfg)
}

fn apply_self_overrides(cfg: &mut ResolvedConfig, name: Option<String>, kind: Option<String>) {
    if name.is_some() {
        cfg.deployment.self_item_name = name;
    }
    if kind.is_some() {
        cfg.deployment.self_item_type = kind;
    }
}

fn split_types(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn workspace_id(cfg: &ResolvedConfig) -> Result<String> {
    cfg.deployment
        .workspace_id
        .clone()
        .context("No workspace id. Use --workspace, FABDEPLOY_WORKSPACE_ID or deployment.workspace_id")
}

fn client(cfg: &ResolvedConfig) -> Result<Arc<dyn WorkspaceApi>> {
    let token = cfg
        .token
        .clone()
        .context("No API token. Use --token or FABDEPLOY_TOKEN")?;
    let client = FabricClient::new(cfg.deployment.api_root_url.clone(), token)
        .context("Failed to create workspace API client")?;
    Ok(Arc::new(client))
}

/// Cancel token tripped by Ctrl-C
fn ctrl_c_token() -> CancelToken {
    let token = CancelToken::new();
    let trip = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[Cancellation requested, stopping before the next attempt]");
            trip.cancel();
        }
    });
    token
}

/// Run a staged deployment
async fn deploy(cfg: &ResolvedConfig) -> Result<()> {
    let d = &cfg.deployment;
    let ws = workspace_id(cfg)?;
    let api = client(cfg)?;
    let plan: StagePlan = d.stage_plan()?;

    let publisher = BundlePublisher::new(api.clone(), &d.bundle_dir).with_mode(d.substitution_mode);
    let validator = PreconditionValidator::new(api.clone(), d.self_policy());

    let mut controller = StagedDeploymentController::new(publisher, validator)
        .with_retry_policy(d.retry_policy())
        .with_cancel_token(ctrl_c_token());
    if d.fix_zero_logical_ids {
        controller = controller.with_repairer(DegenerateIdRepairer::new(&d.bundle_dir));
    }

    let mut session = DeploymentSession::new(ws.clone(), d.allow_non_empty_workspace);

    eprintln!(
        "Deploying {} to workspace {} in {} stage(s)",
        d.bundle_dir.display(),
        ws,
        plan.len()
    );

    let outcome = controller.run(&mut session, &plan).await?;

    println!(
        "Deployed {} item(s) in {} stage(s), {} attempt(s)",
        outcome.items.len(),
        outcome.stages_completed,
        outcome.attempts.len()
    );
    for item in &outcome.items {
        let action = if item.created { "created" } else { "updated" };
        println!(
            "  {:<12} {:<30} {} ({})",
            item.artifact_type, item.display_name, item.id, action
        );
    }

    if d.verify_after_deployment {
        let expected: Vec<ExpectedArtifact> = outcome
            .items
            .iter()
            .map(|i| ExpectedArtifact::new(&i.display_name, &i.artifact_type))
            .collect();
        let report = DeploymentVerifier::new(api).verify(&ws, &expected).await?;
        print_report(&report);
        if !report.passed() {
            anyhow::bail!("Post-deployment verification failed");
        }
    }

    Ok(())
}

/// Repair degenerate logical ids
fn fix_ids(cfg: &ResolvedConfig, dry_run: bool) -> Result<()> {
    let root = &cfg.deployment.bundle_dir;
    let report = DegenerateIdRepairer::new(root)
        .scan_and_fix(dry_run)
        .with_context(|| format!("Failed to scan bundle: {}", root.display()))?;

    println!("Descriptor files:      {}", report.total_files);
    println!("With degenerate ids:   {}", report.files_with_zero_guid);
    if dry_run {
        println!("Would fix:             {}", report.files_fixed);
    } else {
        println!("Fixed:                 {}", report.files_fixed);
    }
    for path in &report.fixed_files {
        println!("  {}", path);
    }
    if !report.malformed_files.is_empty() {
        println!("Malformed (skipped):   {}", report.malformed_files.len());
        for path in &report.malformed_files {
            println!("  {}", path);
        }
    }

    Ok(())
}

/// Show logical id mappings against the workspace
async fn scan_ids(cfg: &ResolvedConfig) -> Result<()> {
    let ws = workspace_id(cfg)?;
    let map = LogicalIdResolver::new(client(cfg)?)
        .scan(&cfg.deployment.bundle_dir, &ws)
        .await?;

    if map.is_empty() {
        println!("No logical ids resolved");
        return Ok(());
    }

    println!("{:<38} {:<38}", "LOGICAL ID", "WORKSPACE ID");
    println!("{}", "-".repeat(76));
    for (logical, real) in map.iter() {
        println!("{:<38} {:<38}", logical, real);
    }

    Ok(())
}

/// Check the empty-workspace precondition
async fn check_workspace(cfg: &ResolvedConfig) -> Result<()> {
    let ws = workspace_id(cfg)?;
    let validator = PreconditionValidator::new(client(cfg)?, cfg.deployment.self_policy());

    match validator.check(&ws).await? {
        PreconditionOutcome::Empty => println!("Workspace {} is empty", ws),
        PreconditionOutcome::OnlySelf => {
            println!("Workspace {} only contains the self artifact", ws)
        }
        PreconditionOutcome::Skipped { reason } => {
            println!("Workspace check skipped: {}", reason)
        }
    }

    Ok(())
}

/// Create or update one item
async fn publish_item(
    cfg: &ResolvedConfig,
    item_type: &str,
    path: &str,
    no_resolve: bool,
    folder: Option<&str>,
) -> Result<()> {
    let ws = workspace_id(cfg)?;
    let api = client(cfg)?;
    let root = &cfg.deployment.bundle_dir;

    let map = if no_resolve {
        None
    } else {
        Some(LogicalIdResolver::new(api.clone()).scan(root, &ws).await?)
    };

    let publisher = ArtifactPublisher::new(api.clone(), DefinitionStore::new(root))
        .with_mode(cfg.deployment.substitution_mode);
    let item = publisher
        .create_or_update(item_type, path, &ws, map.as_ref())
        .await
        .with_context(|| format!("Failed to publish {} '{}'", item_type, path))?;

    println!(
        "{} '{}' {} ({} part(s), {} logical id(s) replaced)",
        item.artifact_type,
        item.display_name,
        if item.created { "created" } else { "updated" },
        item.parts_uploaded,
        item.ids_replaced
    );
    println!("  id: {}", item.id);

    if let Some(folder) = folder {
        FolderOrganizer::new(api)
            .move_to_folder(&ws, &item.display_name, &item.artifact_type, folder)
            .await
            .with_context(|| format!("Failed to move '{}' to folder '{}'", item.display_name, folder))?;
        println!("  folder: {}", folder);
    }

    Ok(())
}

/// Move one item into a folder
async fn move_item(cfg: &ResolvedConfig, item_type: &str, name: &str, folder: &str) -> Result<()> {
    let ws = workspace_id(cfg)?;
    let moved = FolderOrganizer::new(client(cfg)?)
        .move_to_folder(&ws, name, item_type, folder)
        .await?;

    println!(
        "{} '{}' moved to folder '{}' ({})",
        item_type, name, folder, moved.folder_id
    );
    Ok(())
}

/// Verify the workspace contents
async fn verify(cfg: &ResolvedConfig, expected: &[ExpectedArtifact], no_accessibility: bool) -> Result<()> {
    let ws = workspace_id(cfg)?;
    let mut verifier = DeploymentVerifier::new(client(cfg)?);
    if no_accessibility {
        verifier = verifier.without_accessibility();
    }

    let report = verifier.verify(&ws, expected).await?;
    print_report(&report);

    if !report.passed() {
        anyhow::bail!("Verification failed");
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    println!("Workspace {}: {} item(s)", report.workspace_id, report.item_count());
    for (kind, count) in &report.items_by_type {
        println!("  {}: {}", kind, count);
    }
    for missing in &report.missing {
        println!("  missing: {} ({})", missing.display_name, missing.artifact_type);
    }
    for access in report.accessibility.iter().filter(|a| a.note.is_some()) {
        println!(
            "  {} '{}' exists (note: {})",
            access.artifact_type,
            access.display_name,
            access.note.as_deref().unwrap_or_default()
        );
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        println!("error: {}", error);
    }
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!(
        "Token:       {}",
        if cfg.token.is_some() { "(set)" } else { "(not set)" }
    );
    println!();

    let yaml = serde_yaml::to_string(&cfg.deployment).context("Failed to render configuration")?;
    println!("deployment:");
    for line in yaml.lines() {
        println!("  {}", line);
    }

    Ok(())
}
