//! Project maintenance entry point.
//!
//! # Responsibility
//! - Open one project directory, repair its tree against the content folder
//!   and report word totals.
//! - Write the ToC and persist the manifest when the tree changed.

use clap::Parser;
use log::{error, info};
use manuscript_core::db::open_db;
use manuscript_core::{
    core_version, default_log_level, init_logging, FsStorage, ProjectService,
    SqliteManifestRepository, DEFAULT_RECOVERY_PREFIX,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "manuscript")]
#[command(about = "Check, repair and summarize a manuscript project")]
#[command(version)]
struct Cli {
    /// Project root holding the manifest and the content folder
    project_dir: PathBuf,

    /// Name prefix for items recovered from orphaned content files
    #[arg(default_value = DEFAULT_RECOVERY_PREFIX)]
    prefix: String,

    /// Absolute directory for log files; logging stays off when unset
    #[arg(long, env = "MANUSCRIPT_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "MANUSCRIPT_LOG_LEVEL", default_value = default_log_level())]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(&cli.log_level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&cli.project_dir, &cli.prefix) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(project_dir: &Path, prefix: &str) -> Result<(), Box<dyn Error>> {
    info!(
        "event=cli_run module=cli status=start project={} version={}",
        project_dir.display(),
        core_version()
    );
    let storage = FsStorage::open(project_dir)?;
    let conn = open_db(&storage.paths().manifest)?;
    let repo = SqliteManifestRepository::try_new(&conn)?;
    let mut service = ProjectService::new(repo, storage);

    let report = service.open(prefix)?;
    println!(
        "items={} rejected={} orphans={} recovered={}",
        service.tree().len(),
        report.rejected,
        report.orphans,
        report.recovered
    );
    let (novel_words, note_words) = service.tree().sum_words();
    println!("novel_words={novel_words} note_words={note_words}");

    let toc = service.write_toc()?;
    println!("toc={}", toc.display());

    if service.tree().is_changed() {
        let saved = service.save()?;
        println!("saved={saved}");
    }
    Ok(())
}
