//! Ensure command: write a resolved lock out to disk

use clap::{Args, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use vendorlock_core::model::Lock;
use vendorlock_core::{log_op_end, log_op_error, log_op_start, VendorBehavior};
use vendorlock_store::{
    new_delta_writer, LocalSourceProvider, Project, SafeWriter, SourceProvider, TreeWriter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Re-export only changed projects
    Delta,
    /// Stage and swap in everything
    Full,
}

#[derive(Debug, Args)]
pub struct EnsureArgs {
    /// Resolved lock to write out
    #[arg(long)]
    pub lock: PathBuf,

    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Source cache laid out as <cache>/<project root>/<revision>/
    #[arg(long)]
    pub sources: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Strategy::Delta)]
    pub strategy: Strategy,

    /// When to write vendor: on-changed, always or never
    #[arg(long, default_value = "on-changed")]
    pub vendor: VendorBehavior,

    /// Also write Vendor.toml, creating it if missing (full strategy only)
    #[arg(long)]
    pub manifest: bool,

    /// Put the commented example block above a written manifest
    #[arg(long)]
    pub examples: bool,

    /// Print what would be written instead of writing it
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, short)]
    pub verbose: bool,
}

pub fn execute(args: EnsureArgs) -> Result<(), Box<dyn std::error::Error>> {
    log_op_start!("ensure", project_root = %args.project_dir.display());
    let start = Instant::now();

    let result = run(&args).map_err(|e| {
        log_op_error!(
            "ensure",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "ensure",
        duration_ms = start.elapsed().as_millis() as u64,
        dry_run = result
    );
    Ok(())
}

/// Returns whether this was a dry run
fn run(args: &EnsureArgs) -> vendorlock_store::Result<bool> {
    let project = Project::load(&args.project_dir)?;

    let text = std::fs::read_to_string(&args.lock)
        .map_err(|e| vendorlock_store::errors::io_error_at("read_new_lock", &args.lock, e))?;
    let mut new_lock = Lock::from_toml_str(&text).map_err(|e| e.with_path(args.lock.as_path()))?;
    new_lock.apply_prune_options(&project.prune_options());

    let mut writer: Box<dyn TreeWriter> = match args.strategy {
        Strategy::Delta => new_delta_writer(&project, new_lock, args.vendor)?,
        Strategy::Full => {
            let manifest = args
                .manifest
                .then(|| project.manifest.clone().unwrap_or_default());
            let status = project.verify_vendor()?;
            Box::new(SafeWriter::new(
                manifest,
                project.lock.as_ref(),
                Some(new_lock),
                args.vendor,
                project.prune_options(),
                &status,
            )?)
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.dry_run {
        writer.print_prepared_actions(&mut out, args.verbose)?;
        return Ok(true);
    }

    let provider = args.sources.as_ref().map(LocalSourceProvider::new);
    writer.write(
        &project.abs_root,
        provider.as_ref().map(|p| p as &dyn SourceProvider),
        args.examples,
        Some(&mut out),
    )?;
    out.flush()
        .map_err(|e| vendorlock_store::errors::io_error("flush_output", e))?;
    Ok(false)
}
