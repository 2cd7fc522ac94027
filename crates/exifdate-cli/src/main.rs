use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use exifdate_core::{CancellationToken, RunControl, RunOptions};

#[derive(Parser)]
#[command(name = "exifdate", version, about = "Fill in missing EXIF capture dates from image filenames")]
struct Cli {
    /// Root folder to search (default: current directory)
    root: Option<PathBuf>,

    /// JSON file with run options; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File extension to process, repeatable (default: jpg, jpeg, tiff)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Skip directories whose path contains this text, repeatable
    #[arg(long = "ignore", value_name = "SUBSTR")]
    ignore_dirs: Vec<String>,

    /// Audit log file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Do not write an audit log
    #[arg(long, conflicts_with = "log_file")]
    no_log: bool,

    /// Append to the audit log instead of truncating it
    #[arg(long)]
    append_log: bool,

    /// Overwrite DateTimeOriginal even when it is already set
    #[arg(long)]
    force: bool,

    /// Report unreadable metadata instead of treating it as missing
    #[arg(long)]
    strict_read: bool,

    /// Process files on all cores
    #[arg(long)]
    parallel: bool,

    /// Report what would be set without modifying any file
    #[arg(long)]
    dry_run: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn run_options(self) -> anyhow::Result<RunOptions> {
        let mut options = match &self.config {
            Some(path) => RunOptions::load(path)?,
            None => RunOptions::default(),
        };

        if let Some(root) = self.root {
            options.root = root;
        }
        if options.root.as_os_str().is_empty() {
            options.root = PathBuf::from(".");
        }
        if !self.extensions.is_empty() {
            options.extensions = self.extensions;
        }
        options.ignore_dirs.extend(self.ignore_dirs);
        if self.no_log {
            options.log_file = None;
        } else if self.log_file.is_some() {
            options.log_file = self.log_file;
        }
        options.append_log |= self.append_log;
        options.force |= self.force;
        if self.strict_read {
            options.treat_read_error_as_missing = false;
        }
        options.parallel |= self.parallel;
        options.dry_run |= self.dry_run;
        Ok(options)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let t_total = std::time::Instant::now();

    let options = cli.run_options()?;

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping after the current file");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);

    let control = RunControl::new().with_cancel_token(token);
    let result = exifdate_core::process_with_control(&options, &control, &|_stage, current, total, message| {
        pb.set_length(total);
        pb.set_position(current);
        pb.set_message(message.to_string());
    })?;
    pb.finish_and_clear();

    if result.files_found == 0 {
        println!("No files found in directory {}", options.root.display());
        return Ok(());
    }

    if result.dry_run {
        println!("Dry run, no files were modified.");
    }
    println!("{}", result.summary);
    if result.cancelled {
        warn!(
            processed = result.summary.total(),
            found = result.files_found,
            "run cancelled before all files were processed"
        );
    }
    if let Some(log) = &options.log_file {
        if result.summary.failures() > 0 {
            warn!(failures = result.summary.failures(), log = %log.display(), "some files were not updated");
        }
        info!(log = %log.display(), "audit log written");
    }
    info!(elapsed_secs = t_total.elapsed().as_secs_f64(), "finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "exifdate",
            "/photos",
            "--ext",
            "png",
            "--ignore",
            "@eaDir",
            "--force",
            "--strict-read",
            "--no-log",
            "--dry-run",
        ]);
        let options = cli.run_options().unwrap();
        assert_eq!(options.root, PathBuf::from("/photos"));
        assert_eq!(options.extensions, vec!["png".to_string()]);
        assert_eq!(options.ignore_dirs, vec!["@eaDir".to_string()]);
        assert!(options.force);
        assert!(!options.treat_read_error_as_missing);
        assert!(options.log_file.is_none());
        assert!(options.dry_run);
    }

    #[test]
    fn test_defaults_without_flags() {
        let options = Cli::parse_from(["exifdate"]).run_options().unwrap();
        assert_eq!(options.root, PathBuf::from("."));
        assert_eq!(options.extensions, RunOptions::default().extensions);
        assert!(options.treat_read_error_as_missing);
        assert!(!options.dry_run);
        assert_eq!(options.log_file, Some(PathBuf::from("set_date_log.txt")));
    }

    #[test]
    fn test_config_file_is_layered() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("options.json");
        std::fs::write(&config, r#"{"root": "/archive", "force": true, "ignore_dirs": ["cache"]}"#).unwrap();

        let cli = Cli::parse_from([
            OsString::from("exifdate"),
            OsString::from("--config"),
            config.into_os_string(),
            OsString::from("--ignore"),
            OsString::from("Thumbs"),
        ]);
        let options = cli.run_options().unwrap();
        assert_eq!(options.root, PathBuf::from("/archive"));
        assert!(options.force);
        assert_eq!(options.ignore_dirs, vec!["cache".to_string(), "Thumbs".to_string()]);
    }
}
