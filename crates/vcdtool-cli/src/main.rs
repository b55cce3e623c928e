//! vcdtool CLI - List vCloud Director catalogs and upload ISO media or OVF templates.

mod config;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vcdtool_core::{
    find_catalog, find_org, list_org_catalog_links, list_org_links, list_orgs,
    resolve_upload_target, upload_media, upload_template, wait_for_completion, Error, Session,
    TemplateOptions, TemplateRequest, UploadKind, UploadPhase, UploadProgress, VcdConfig,
};

use crate::config::ConnectionArgs;

/// Description given to uploaded media when none is supplied.
const DEFAULT_MEDIA_DESCRIPTION: &str = "ISO database image";
/// Name given to uploaded templates when none is supplied.
const DEFAULT_TEMPLATE_NAME: &str = "API vApp Template";
/// Description given to uploaded templates when none is supplied.
const DEFAULT_TEMPLATE_DESCRIPTION: &str = "My vApp Template";

const EXIT_USAGE: u8 = 2;
const EXIT_FILE_MISSING: u8 = 3;
const EXIT_AUTH: u8 = 4;
const EXIT_REJECTED: u8 = 5;
const EXIT_TIMEOUT: u8 = 6;
const EXIT_FAILURE: u8 = 1;

/// List vCloud Director organizations and catalogs, and upload ISO media or
/// OVF templates into a catalog.
#[derive(Parser)]
#[command(name = "vcdtool")]
#[command(version, about, long_about = None)]
struct Cli {
    /// List organizations.
    #[arg(short, long)]
    show: bool,

    /// List the catalogs of an organization (requires --org).
    #[arg(short, long)]
    list: bool,

    /// Upload a file to a catalog (requires --catalog and --file).
    #[arg(short, long, value_enum)]
    upload: Option<UploadArg>,

    /// Organization name.
    #[arg(short, long)]
    org: Option<String>,

    /// Catalog name.
    #[arg(short, long)]
    catalog: Option<String>,

    /// ISO image or OVF descriptor to upload.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Template name. Media is always named after its file.
    #[arg(long)]
    name: Option<String>,

    /// Description of the uploaded item.
    #[arg(long)]
    description: Option<String>,

    /// Directory holding the disks an OVF descriptor references. Defaults to
    /// the descriptor's directory.
    #[arg(long)]
    files_dir: Option<PathBuf>,

    /// Configuration file path.
    #[arg(long, env = "VCD_CONFIG")]
    config: Option<PathBuf>,

    /// API root, e.g. https://vcd.example.com/api.
    #[arg(long, env = "VCD_API_URL")]
    api_url: Option<String>,

    /// Login name, usually user@org.
    #[arg(long, env = "VCD_USERNAME")]
    user: Option<String>,

    /// Login password.
    #[arg(long, env = "VCD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Upload kind argument mapping.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum UploadArg {
    /// ISO media image.
    Media,
    /// OVF vApp template.
    Ovf,
}

impl From<UploadArg> for UploadKind {
    fn from(arg: UploadArg) -> Self {
        match arg {
            UploadArg::Media => UploadKind::Media,
            UploadArg::Ovf => UploadKind::Template,
        }
    }
}

/// One validated unit of work, in the order it runs.
#[derive(Debug, PartialEq)]
enum Action {
    ShowOrgs,
    ListCatalogs {
        org: String,
    },
    Upload {
        kind: UploadKind,
        catalog: String,
        file: PathBuf,
    },
}

/// Argument combinations that cannot run.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

impl Cli {
    /// Turn the flags into actions without touching the network.
    fn actions(&self) -> std::result::Result<Vec<Action>, UsageError> {
        let mut actions = Vec::new();

        if self.show {
            actions.push(Action::ShowOrgs);
        }

        if self.list {
            let org = self
                .org
                .clone()
                .ok_or_else(|| UsageError("--list requires --org".to_string()))?;
            actions.push(Action::ListCatalogs { org });
        }

        if let Some(kind) = self.upload {
            let catalog = self
                .catalog
                .clone()
                .ok_or_else(|| UsageError("--upload requires --catalog".to_string()))?;
            let file = self
                .file
                .clone()
                .ok_or_else(|| UsageError("--upload requires --file".to_string()))?;
            if matches!(kind, UploadArg::Ovf) && has_extension(&file, "ova") {
                return Err(UsageError(format!(
                    "'{}' is an OVA archive; extract it and pass the .ovf descriptor",
                    file.display()
                )));
            }
            actions.push(Action::Upload {
                kind: kind.into(),
                catalog,
                file,
            });
        }

        Ok(actions)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let actions = match cli.actions() {
        Ok(actions) if actions.is_empty() => {
            // Nothing to do is not an error.
            return match print_usage(&mut std::io::stdout()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: failed to print help: {}", e);
                    ExitCode::from(EXIT_FAILURE)
                }
            };
        }
        Ok(actions) => actions,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&cli, &actions) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn print_usage(out: &mut impl Write) -> std::io::Result<()> {
    Cli::command().write_help(out)?;
    writeln!(out)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Map the first library error in the chain to an exit code.
fn exit_code(error: &anyhow::Error) -> u8 {
    let Some(error) = error.chain().find_map(|e| e.downcast_ref::<Error>()) else {
        return EXIT_FAILURE;
    };
    match error {
        e if e.is_file_not_found() => EXIT_FILE_MISSING,
        Error::Config { .. } => EXIT_USAGE,
        Error::Auth { .. } => EXIT_AUTH,
        Error::UnexpectedStatus { status: 401, .. } => EXIT_AUTH,
        Error::UploadRejected { .. } => EXIT_REJECTED,
        Error::Timeout { .. } => EXIT_TIMEOUT,
        _ => EXIT_FAILURE,
    }
}

fn run(cli: &Cli, actions: &[Action]) -> Result<()> {
    let config = load_config(cli)?;

    // Local files are checked before logging in.
    for action in actions {
        if let Action::Upload { file, .. } = action {
            fs::metadata(file).map_err(|e| Error::io(e, file))?;
        }
    }

    let mut session = Session::new(config.connection.clone())?;
    session
        .login()
        .with_context(|| format!("Failed to log in to {}", config.connection.api_url))?;

    let result = actions
        .iter()
        .try_for_each(|action| run_action(&session, &config, cli, action));

    session.logout();
    result
}

fn load_config(cli: &Cli) -> Result<VcdConfig> {
    let config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    let args = ConnectionArgs {
        api_url: cli.api_url.as_deref(),
        username: cli.user.as_deref(),
        password: cli.password.as_deref(),
        insecure: cli.insecure,
    };
    Ok(config::merge_with_args(config, &args))
}

fn run_action(session: &Session, config: &VcdConfig, cli: &Cli, action: &Action) -> Result<()> {
    debug!(?action, "running");
    match action {
        Action::ShowOrgs => show_orgs(session),
        Action::ListCatalogs { org } => list_catalogs(session, org),
        Action::Upload {
            kind: UploadKind::Media,
            catalog,
            file,
        } => run_media_upload(session, config, cli, catalog, file),
        Action::Upload {
            kind: UploadKind::Template,
            catalog,
            file,
        } => run_template_upload(session, config, cli, catalog, file),
    }
}

fn show_orgs(session: &Session) -> Result<()> {
    let orgs = list_orgs(session)?;

    println!("Organizations");
    println!("=============");
    if orgs.is_empty() {
        println!("None");
    }
    for org in &orgs {
        println!("{:<24} {}", org.name, org.href);
    }

    Ok(())
}

fn list_catalogs(session: &Session, org_name: &str) -> Result<()> {
    let orgs = list_orgs(session)?;
    let org = find_org(&orgs, org_name)?;
    let catalogs: Vec<_> = list_org_links(session, org)?
        .into_iter()
        .filter(|link| link.is_catalog())
        .collect();

    println!("Catalogs in {}", org.name);
    println!("===========");
    if catalogs.is_empty() {
        println!("None");
    }
    for catalog in &catalogs {
        let items = list_org_catalog_links(session, catalog)?;
        println!();
        println!("{} ({} items)", catalog.display_name(), items.len());
        for (i, item) in items.iter().enumerate() {
            println!("  {}. {}", i + 1, item);
        }
    }

    Ok(())
}

fn run_media_upload(
    session: &Session,
    config: &VcdConfig,
    cli: &Cli,
    catalog_name: &str,
    file: &Path,
) -> Result<()> {
    let orgs = list_orgs(session)?;
    let catalog = find_catalog(session, &orgs, cli.org.as_deref(), catalog_name)?;
    let target = resolve_upload_target(session, &catalog, UploadKind::Media)?;

    let size = fs::metadata(file).map_err(|e| Error::io(e, file))?.len();
    let description = cli
        .description
        .as_deref()
        .unwrap_or(DEFAULT_MEDIA_DESCRIPTION);

    if !cli.quiet {
        println!("Media Upload");
        println!("------------");
        println!("File:      {}", file.display());
        println!("Size:      {}", format_bytes(size));
        println!("Catalog:   {}", catalog.display_name());
        println!();
    }

    let upload = upload_media(session, &target, file, size, description)?;

    let progress_bar = progress_bar(cli.quiet)?;
    if let Some(pb) = &progress_bar {
        pb.set_message("Transferring...");
    }
    let policy = config.polling.media_progress.policy();
    wait_for_completion(session, &upload.href, &policy, |percent| {
        if let Some(pb) = &progress_bar {
            pb.set_position(u64::from(percent));
        }
    })?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Complete!");
    }
    if !cli.quiet {
        println!();
        println!("Media uploaded successfully: {}", upload.name);
    }

    Ok(())
}

fn run_template_upload(
    session: &Session,
    config: &VcdConfig,
    cli: &Cli,
    catalog_name: &str,
    descriptor: &Path,
) -> Result<()> {
    let orgs = list_orgs(session)?;
    let catalog = find_catalog(session, &orgs, cli.org.as_deref(), catalog_name)?;
    let target = resolve_upload_target(session, &catalog, UploadKind::Template)?;

    let mut request = TemplateRequest::new(
        cli.name.as_deref().unwrap_or(DEFAULT_TEMPLATE_NAME),
        cli.description
            .as_deref()
            .unwrap_or(DEFAULT_TEMPLATE_DESCRIPTION),
        descriptor,
    );
    if let Some(dir) = &cli.files_dir {
        request = request.with_files_dir(dir);
    }

    if !cli.quiet {
        println!("Template Upload");
        println!("---------------");
        println!("Name:        {}", request.name);
        println!("Descriptor:  {}", request.descriptor_path.display());
        println!("Disks from:  {}", request.files_dir.display());
        println!("Catalog:     {}", catalog.display_name());
        println!();
    }

    let options = TemplateOptions::from_polling(&config.polling);
    let progress_bar = progress_bar(cli.quiet)?;

    let callback: Option<vcdtool_core::ProgressCallback> = progress_bar.clone().map(|pb| {
        Box::new(move |progress: UploadProgress| {
            pb.set_position(u64::from(progress.percent));

            let message = match progress.phase {
                UploadPhase::Created => "Created".to_string(),
                UploadPhase::DescriptorUploading => "Uploading descriptor...".to_string(),
                UploadPhase::DescriptorProcessed => "Descriptor processed".to_string(),
                UploadPhase::FilesPending => format!("{} files listed", progress.files_total),
                UploadPhase::FilesUploading => match &progress.current_file {
                    Some(name) => format!(
                        "Uploading {} ({}/{})",
                        name,
                        progress.files_uploaded + 1,
                        progress.files_total
                    ),
                    None => "Waiting for server...".to_string(),
                },
                UploadPhase::Complete => "Complete!".to_string(),
            };
            pb.set_message(message);
        }) as vcdtool_core::ProgressCallback
    });

    let upload = upload_template(session, &target, &request, &options, callback)?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Complete!");
    }
    if !cli.quiet {
        println!();
        println!("Template uploaded successfully: {}", upload.href);
        println!("Files:     {}", upload.files.len());
    }

    Ok(())
}

/// Percentage bar for server-reported progress, or none when quiet.
fn progress_bar(quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% {msg}")?
        .progress_chars("#>-");
    pb.set_style(style);
    Ok(Some(pb))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
