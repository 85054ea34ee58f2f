//! Verify command: compare vendor against the lock's digests

use clap::Args;
use std::path::PathBuf;
use vendorlock_core::VendorStatus;
use vendorlock_store::Project;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Also list projects that verified cleanly
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn execute(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load(&args.project_dir)?;
    let noverify = project.noverify();
    let status = project.verify_vendor()?;

    let mut failed = 0;
    for (root, stat) in &status {
        let skipped = noverify.contains(root);
        if *stat != VendorStatus::NoMismatch && !skipped {
            failed += 1;
        }
        if *stat != VendorStatus::NoMismatch || args.verbose {
            let note = if skipped { " (noverify)" } else { "" };
            println!("{}: {}{}", root, stat, note);
        }
    }

    tracing::info!(
        op = "verify",
        projects_len = status.len(),
        failed,
        "verified vendor tree"
    );

    if failed > 0 {
        return Err(format!("{} of {} vendored projects failed verification", failed, status.len()).into());
    }
    Ok(())
}
