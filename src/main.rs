use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use swapx::backup_manager::BackupManager;
use swapx::batch::BatchRunner;
use swapx::cli::{parse_args, Args, GlobalOptions};
use swapx::config::{self, Config, InvalidCharPolicy};
use swapx::discover::collect_inputs;
use swapx::file_job::{FileJob, OutputOptions};
use swapx::logger;
use swapx::profile::{self, ImportMode, JsonProfileStore, ProfileStore};
use swapx::report::ReportFormatter;
use swapx::request::handle_process_files_json;
use swapx::rule_set::{Mode, RuleSet, RuleSetDiagnostics};
use swapx::transformer::TextTransformer;

fn main() -> Result<()> {
    let (globals, args) = parse_args()?;
    let config = load_config(&globals)?;

    let log_path = logger::default_log_path()?;
    let debug = config.logging.debug || globals.debug;
    if let Some(path) = logger::init_debug_logging(debug, &log_path)? {
        tracing::debug!(log = %path.display(), "debug logging enabled");
    }

    match args {
        Args::Convert {
            text,
            mode,
            profile,
            report,
        } => convert(&config, text, mode, profile.as_deref(), report),
        Args::Process {
            paths,
            mode,
            profile,
            overwrite,
            no_overwrite,
            no_backup,
            dry_run,
            json,
            jobs,
            recursive,
        } => {
            let settings = ProcessSettings {
                mode,
                overwrite: (overwrite || config.output.overwrite) && !no_overwrite,
                backup: config.output.backup && !no_backup,
                dry_run,
                json,
                jobs: jobs.unwrap_or(config.processing.jobs),
                recursive: recursive || config.processing.recursive,
            };
            process(&config, &paths, profile.as_deref(), &settings)
        }
        Args::RunRequest { file } => run_request(&config, &file),
        Args::ProfileList => {
            let store = JsonProfileStore::open_default()?;
            print!("{}", ReportFormatter::detect().format_profiles(store.book()));
            Ok(())
        }
        Args::ProfileShow { name } => {
            let store = JsonProfileStore::open_default()?;
            let name = name.unwrap_or_else(|| store.book().current().to_string());
            let rules = store
                .book()
                .rules(&name)
                .ok_or_else(|| anyhow::anyhow!("Profile not found: {}", name))?;
            print!("{}", ReportFormatter::detect().format_rules(&name, rules));
            Ok(())
        }
        Args::ProfileCreate { name } => {
            let mut store = JsonProfileStore::open_default()?;
            let name = store.update(|book| book.create(&name))?;
            println!("Created profile '{}' (now current)", name);
            Ok(())
        }
        Args::ProfileRename { from, to } => {
            let mut store = JsonProfileStore::open_default()?;
            let to = store.update(|book| book.rename(&from, &to))?;
            println!("Renamed '{}' to '{}'", from, to);
            Ok(())
        }
        Args::ProfileDelete { name } => {
            let mut store = JsonProfileStore::open_default()?;
            store.update(|book| book.delete(&name))?;
            println!("Deleted profile '{}'", name);
            Ok(())
        }
        Args::ProfileSwitch { name } => {
            let mut store = JsonProfileStore::open_default()?;
            store.update(|book| book.switch(&name))?;
            println!("Switched to profile '{}'", name);
            Ok(())
        }
        Args::ProfileAddReplace { profile, old, new } => {
            edit_profile(profile, |book, name| book.add_replace(name, &old, &new))
        }
        Args::ProfileAddDelete { profile, word } => {
            edit_profile(profile, |book, name| book.add_delete(name, &word))
        }
        Args::ProfileRemove { profile, index } => edit_profile(profile, |book, name| {
            let removed = book.remove_rule(name, index)?;
            tracing::debug!(profile = name, rule = ?removed, "rule removed");
            Ok(())
        }),
        Args::PresetExport { file } => {
            let store = JsonProfileStore::open_default()?;
            profile::export_preset(store.book(), &file)?;
            println!("Exported {} profiles to {}", store.list().len(), file.display());
            Ok(())
        }
        Args::PresetImport {
            file,
            replace,
            force,
        } => preset_import(&file, replace, force),
        Args::Rollback { id } => rollback(id),
        Args::History => {
            let backups = BackupManager::new()?.list_backups()?;
            print!("{}", ReportFormatter::detect().format_history(&backups));
            Ok(())
        }
        Args::Config { show } => show_config(&globals, &config, show),
    }
}

fn load_config(globals: &GlobalOptions) -> Result<Config> {
    match &globals.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
}

/// Rules for `profile` (or the current profile), reporting skipped ones
/// according to the configured policy. Returns the resolved profile name.
fn load_rules(config: &Config, profile: Option<&str>, mode: Mode) -> Result<(String, RuleSet)> {
    let store = JsonProfileStore::open_default()?;
    let name = profile.unwrap_or_else(|| store.book().current()).to_string();
    let (rules, diagnostics) = store
        .rule_set(&name, mode)
        .with_context(|| format!("Cannot load rules from profile '{}'", name))?;

    warn_dropped(config, &diagnostics);
    tracing::info!(profile = %name, %mode, rules = rules.len(), "rules loaded");
    Ok((name, rules))
}

/// Print skipped rules on stderr when the policy asks for it
fn warn_dropped(config: &Config, diagnostics: &RuleSetDiagnostics) {
    if config.rules.invalid_char_policy != InvalidCharPolicy::Warn {
        return;
    }
    if let Some(warning) = ReportFormatter::detect().format_dropped(diagnostics, true) {
        eprint!("{}", warning);
    }
}

fn convert(
    config: &Config,
    text: Option<String>,
    mode: Mode,
    profile: Option<&str>,
    report: bool,
) -> Result<()> {
    let (_, rules) = load_rules(config, profile, mode)?;

    let (input, from_stdin) = match text {
        Some(text) => (text, false),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin as UTF-8 text")?;
            (buffer, true)
        }
    };

    let transformed = TextTransformer::new(&rules).apply(&input);
    if from_stdin {
        print!("{}", transformed.output);
    } else {
        println!("{}", transformed.output);
    }

    // An empty report is always shown so a no-op conversion is visible
    if report || transformed.report.is_empty() {
        eprint!("{}", ReportFormatter::detect().format_match_report(&transformed.report));
    }
    Ok(())
}

struct ProcessSettings {
    mode: Mode,
    overwrite: bool,
    backup: bool,
    dry_run: bool,
    json: bool,
    jobs: usize,
    recursive: bool,
}

fn process(
    config: &Config,
    paths: &[PathBuf],
    profile: Option<&str>,
    settings: &ProcessSettings,
) -> Result<()> {
    let (profile_name, rules) = load_rules(config, profile, settings.mode)?;
    let files = collect_inputs(paths, &config.processing.extensions, settings.recursive)?;
    let formatter = ReportFormatter::detect();

    let mut options = OutputOptions::from_config(&config.output);
    options.overwrite = settings.overwrite;
    options.dry_run = settings.dry_run;

    if settings.dry_run {
        println!("Dry run: {} file(s), {} rule(s)\n", files.len(), rules.len());
        let job = FileJob::new(&rules, &options);
        for file in &files {
            match job.preview(file) {
                Ok(preview) => println!("{}", formatter.format_preview(&preview)),
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }
        return Ok(());
    }

    let mut runner = BatchRunner::new(options)
        .jobs(settings.jobs)
        .label(format!("profile {}, mode {}", profile_name, settings.mode));
    if settings.overwrite && settings.backup {
        runner = runner.backups(BackupManager::new()?);
    }

    let batch = runner.run(&files, &rules);
    if settings.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    if !batch.success {
        anyhow::bail!("{}", batch.error.unwrap_or_default());
    }
    print!("{}", formatter.format_batch(&batch));
    Ok(())
}

fn run_request(config: &Config, file: &Path) -> Result<()> {
    let payload = if file == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        fs::read_to_string(file)
            .with_context(|| format!("Failed to read request: {}", file.display()))?
    };

    let mut runner = BatchRunner::new(OutputOptions::from_config(&config.output))
        .jobs(config.processing.jobs)
        .label(format!("request {}", file.display()));
    if config.output.backup {
        runner = runner.backups(BackupManager::new()?);
    }

    let (batch, diagnostics) = handle_process_files_json(&payload, &runner);
    warn_dropped(config, &diagnostics);
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}

fn edit_profile(
    profile: Option<String>,
    change: impl FnOnce(&mut profile::ProfileBook, &str) -> Result<()>,
) -> Result<()> {
    let mut store = JsonProfileStore::open_default()?;
    let name = profile.unwrap_or_else(|| store.book().current().to_string());
    store.update(|book| change(book, &name))?;
    let rules = store.book().rules(&name).unwrap_or_default();
    print!("{}", ReportFormatter::detect().format_rules(&name, rules));
    Ok(())
}

fn preset_import(file: &Path, replace: bool, force: bool) -> Result<()> {
    let preset = profile::read_preset(file)?;
    let mode = if replace {
        ImportMode::Replace
    } else {
        ImportMode::Merge { overwrite: force }
    };

    let mut store = JsonProfileStore::open_default()?;
    let summary = store.update(|book| Ok(book.import(preset, mode)))?;

    println!(
        "Imported {} new, {} replaced, {} skipped",
        summary.added.len(),
        summary.replaced.len(),
        summary.skipped.len()
    );
    if !summary.skipped.is_empty() {
        println!(
            "Skipped existing profiles (use --force to overwrite): {}",
            summary.skipped.join(", ")
        );
    }
    Ok(())
}

fn rollback(id: Option<String>) -> Result<()> {
    let backup_manager = BackupManager::new()?;

    let backup_id = match id {
        Some(id) => id,
        None => match backup_manager.get_last_backup_id()? {
            Some(id) => {
                println!("Rolling back last operation: {}\n", id);
                id
            }
            None => {
                anyhow::bail!("No backups found to rollback");
            }
        },
    };

    let restored = backup_manager.restore_backup(&backup_id)?;
    for path in &restored {
        println!("Restored: {}", path.display());
    }
    println!("\nRollback complete");

    Ok(())
}

fn show_config(globals: &GlobalOptions, config: &Config, show: bool) -> Result<()> {
    let path = match &globals.config {
        Some(path) => path.clone(),
        None => config::config_file_path()?,
    };
    println!("Config file: {}", path.display());

    if show {
        let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
        println!("\n{}", rendered);
    }
    Ok(())
}
