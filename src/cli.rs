use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MAX_JOBS;
use crate::rule_set::Mode;

#[derive(Parser)]
#[command(name = "swapx")]
#[command(about = "Literal find-and-replace and word deletion for text files")]
#[command(long_about = "SwapX applies a list of literal rules to text or to whole folders of files.

Each rule either replaces a string with another or deletes it. Rules run one
after another, so an earlier rule can feed a later one. Nothing is a regular
expression: every rule matches its text exactly.

Rules are kept in named profiles (~/.swapx/profiles.json). Profiles can be
exported to and imported from preset files.

MODES:
  all      Replace rules, then delete rules (default)
  replace  Only replace rules
  delete   Only delete rules

EXAMPLES:
  swapx profile add-replace colour color      Add a rule to the current profile
  swapx profile add-delete basically          Delete a word everywhere
  swapx convert --text 'the colour red'       Convert a piece of text
  cat notes.txt | swapx convert               Convert stdin
  swapx process notes/                        Write notes/*_edited.txt
  swapx process notes/ --dry-run              Preview the changes
  swapx process a.txt --overwrite             Edit in place (with backup)
  swapx rollback                              Undo the last overwrite")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Use this config file instead of ~/.swapx/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug information to ~/.swapx/swapx.log
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a piece of text
    #[command(long_about = "Apply a profile to text and print the result.

The text comes from --text, or from stdin when --text is not given.
The converted text goes to stdout; --report prints per-rule counts to stderr.
A conversion with no matches always says so on stderr.

EXAMPLES:
  swapx convert --text 'teh cat'              Use the current profile
  swapx convert --profile legal < draft.txt   Use another profile
  swapx convert --mode delete --report        Only delete rules, with counts")]
    Convert {
        /// Text to convert (defaults to stdin)
        #[arg(short, long)]
        text: Option<String>,

        /// Which rules to apply: all, replace, or delete
        #[arg(short, long, default_value = "all")]
        mode: Mode,

        /// Profile to use instead of the current one
        #[arg(short, long)]
        profile: Option<String>,

        /// Print per-rule match counts to stderr
        #[arg(short, long)]
        report: bool,
    },

    /// Apply a profile to files and folders
    #[command(long_about = "Apply a profile to files and folders.

Folders expand to the files inside them with a configured extension
(default: txt). Each file is processed on its own; one failing file does
not stop the others.

By default results go to a new file next to the original
(notes.txt -> notes_edited.txt). With --overwrite the original is replaced
after a backup is taken, which 'swapx rollback' can restore.

EXAMPLES:
  swapx process chapter1.txt chapter2.txt
  swapx process manuscripts/ --recursive
  swapx process manuscripts/ --dry-run
  swapx process draft.txt --overwrite --mode replace
  swapx process draft.txt --json")]
    Process {
        /// Files or folders to process
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Which rules to apply: all, replace, or delete
        #[arg(short, long, default_value = "all")]
        mode: Mode,

        /// Profile to use instead of the current one
        #[arg(short, long)]
        profile: Option<String>,

        /// Replace the original files
        #[arg(long)]
        overwrite: bool,

        /// Write new files even if the config sets overwrite = true
        #[arg(long = "no-overwrite", conflicts_with = "overwrite")]
        no_overwrite: bool,

        /// Do not back up originals when overwriting
        #[arg(long = "no-backup")]
        no_backup: bool,

        /// Show what would change without writing anything
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long, conflicts_with = "dry_run")]
        json: bool,

        /// Worker threads (0 = one per CPU, at most 256)
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Descend into sub-folders
        #[arg(short, long)]
        recursive: bool,
    },

    /// Run a process-files request document
    #[command(long_about = "Run a JSON process-files request and print the result as JSON.

The request looks like:
  {
    \"files\": [\"a.txt\", \"b.txt\"],
    \"replacements\": {\"colour\": \"color\", \"basically\": \"\"},
    \"overwrite_original\": false
  }

An empty replacement deletes the matched text. Replacements run in the
order they appear in the document.")]
    RunRequest {
        /// Request file ('-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Manage rule profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Export or import profiles as a preset file
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Restore files from a backup
    #[command(long_about = "Restore files overwritten by 'swapx process --overwrite'.

If no backup ID is given, the most recent backup is restored.
Use 'swapx history' to see all available backups.

EXAMPLES:
  swapx rollback                              Undo the last overwrite
  swapx rollback 20250110-120000-abc12345     Restore a specific backup")]
    Rollback {
        /// Backup ID (defaults to the most recent)
        #[arg(value_name = "ID")]
        id: Option<String>,
    },

    /// Show backups that can be rolled back
    History,

    /// Show or create the configuration file
    #[command(long_about = "Show the configuration file location, creating it if needed.

CONFIGURATION OPTIONS:
  [rules]
    invalid_char_policy = \"drop\"   # \"drop\" or \"warn\" (list skipped rules)

  [output]
    suffix = \"_edited\"             # Added to new file names
    overwrite = false              # Default for --overwrite
    backup = true                  # Back up originals before overwriting

  [processing]
    jobs = 0                       # Worker threads (0 = one per CPU)
    extensions = [\"txt\"]           # File types picked up from folders
    recursive = false              # Default for --recursive

  [logging]
    debug = false                  # Same as --debug

EXAMPLES:
  swapx config                    Print the config file path
  swapx config --show             Print the current configuration")]
    Config {
        /// Print the current configuration
        #[arg(long = "show")]
        show: bool,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List profiles (current one marked with *)
    List,

    /// Show the rules of a profile
    Show {
        /// Profile name (defaults to the current one)
        name: Option<String>,
    },

    /// Create a profile from a copy of the current one and switch to it
    Create { name: String },

    /// Rename a profile
    Rename { from: String, to: String },

    /// Delete a profile
    Delete { name: String },

    /// Make a profile current
    Switch { name: String },

    /// Add a replace rule
    AddReplace {
        old: String,
        new: String,

        /// Profile to change (defaults to the current one)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Add a delete rule
    AddDelete {
        word: String,

        /// Profile to change (defaults to the current one)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Remove a rule by its number in 'profile show'
    Remove {
        #[arg(value_name = "NUMBER")]
        number: usize,

        /// Profile to change (defaults to the current one)
        #[arg(short, long)]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// Write all profiles to a preset file
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Load profiles from a preset file
    #[command(long_about = "Load profiles from a preset file.

By default new profiles are added and existing ones are left alone.
--force replaces existing profiles with the same name.
--replace discards all current profiles first.

EXAMPLES:
  swapx preset import team.json
  swapx preset import team.json --force
  swapx preset import team.json --replace")]
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Discard existing profiles
        #[arg(long, conflicts_with = "force")]
        replace: bool,

        /// Overwrite profiles that already exist
        #[arg(short, long)]
        force: bool,
    },
}

/// Options that apply to every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub debug: bool,
}

pub fn parse_args() -> Result<(GlobalOptions, Args)> {
    let cli = Cli::parse();
    let globals = GlobalOptions {
        config: cli.config,
        debug: cli.debug,
    };
    Ok((globals, to_args(cli.command)?))
}

fn to_args(command: Commands) -> Result<Args> {
    let args = match command {
        Commands::Convert {
            text,
            mode,
            profile,
            report,
        } => Args::Convert {
            text,
            mode,
            profile,
            report,
        },
        Commands::Process {
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
            if let Some(jobs) = jobs.filter(|&jobs| jobs > MAX_JOBS) {
                anyhow::bail!("Invalid --jobs: {} (max {})", jobs, MAX_JOBS);
            }
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
            }
        }
        Commands::RunRequest { file } => Args::RunRequest { file },
        Commands::Profile { action } => match action {
            ProfileAction::List => Args::ProfileList,
            ProfileAction::Show { name } => Args::ProfileShow { name },
            ProfileAction::Create { name } => Args::ProfileCreate { name },
            ProfileAction::Rename { from, to } => Args::ProfileRename { from, to },
            ProfileAction::Delete { name } => Args::ProfileDelete { name },
            ProfileAction::Switch { name } => Args::ProfileSwitch { name },
            ProfileAction::AddReplace { old, new, profile } => {
                Args::ProfileAddReplace { profile, old, new }
            }
            ProfileAction::AddDelete { word, profile } => Args::ProfileAddDelete { profile, word },
            ProfileAction::Remove { number, profile } => {
                if number == 0 {
                    anyhow::bail!("Rule numbers start at 1 (see 'swapx profile show')");
                }
                Args::ProfileRemove {
                    profile,
                    index: number - 1,
                }
            }
        },
        Commands::Preset { action } => match action {
            PresetAction::Export { file } => Args::PresetExport { file },
            PresetAction::Import {
                file,
                replace,
                force,
            } => Args::PresetImport {
                file,
                replace,
                force,
            },
        },
        Commands::Rollback { id } => Args::Rollback { id },
        Commands::History => Args::History,
        Commands::Config { show } => Args::Config { show },
    };
    Ok(args)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Args {
    Convert {
        text: Option<String>,
        mode: Mode,
        profile: Option<String>,
        report: bool,
    },
    Process {
        paths: Vec<PathBuf>,
        mode: Mode,
        profile: Option<String>,
        overwrite: bool,
        no_overwrite: bool,
        no_backup: bool,
        dry_run: bool,
        json: bool,
        jobs: Option<usize>,
        recursive: bool,
    },
    RunRequest {
        file: PathBuf,
    },
    ProfileList,
    ProfileShow {
        name: Option<String>,
    },
    ProfileCreate {
        name: String,
    },
    ProfileRename {
        from: String,
        to: String,
    },
    ProfileDelete {
        name: String,
    },
    ProfileSwitch {
        name: String,
    },
    ProfileAddReplace {
        profile: Option<String>,
        old: String,
        new: String,
    },
    ProfileAddDelete {
        profile: Option<String>,
        word: String,
    },
    /// `index` is 0-based
    ProfileRemove {
        profile: Option<String>,
        index: usize,
    },
    PresetExport {
        file: PathBuf,
    },
    PresetImport {
        file: PathBuf,
        replace: bool,
        force: bool,
    },
    Rollback {
        id: Option<String>,
    },
    History,
    Config {
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args> {
        let cli = Cli::try_parse_from(argv)?;
        to_args(cli.command)
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_defaults() {
        let args = parse(&["swapx", "process", "notes"]).unwrap();
        assert_eq!(
            args,
            Args::Process {
                paths: vec![PathBuf::from("notes")],
                mode: Mode::All,
                profile: None,
                overwrite: false,
                no_overwrite: false,
                no_backup: false,
                dry_run: false,
                json: false,
                jobs: None,
                recursive: false,
            }
        );
    }

    #[test]
    fn test_mode_is_parsed() {
        let args = parse(&["swapx", "convert", "--mode", "delete", "--text", "x"]).unwrap();
        assert!(matches!(args, Args::Convert { mode: Mode::Delete, .. }));
        assert!(parse(&["swapx", "convert", "--mode", "regex"]).is_err());
    }

    #[test]
    fn test_overwrite_flags() {
        // --no-backup also applies when overwrite comes from the config
        assert!(parse(&["swapx", "process", "a.txt", "--no-backup"]).is_ok());
        assert!(parse(&["swapx", "process", "a.txt", "--overwrite", "--no-backup"]).is_ok());
        assert!(parse(&["swapx", "process", "a.txt", "--overwrite", "--no-overwrite"]).is_err());

        let args = parse(&["swapx", "process", "a.txt", "--no-overwrite"]).unwrap();
        assert!(matches!(args, Args::Process { no_overwrite: true, overwrite: false, .. }));
    }

    #[test]
    fn test_jobs_over_limit_rejected() {
        let err = parse(&["swapx", "process", "a.txt", "--jobs", "257"]).unwrap_err();
        assert!(err.to_string().contains("max 256"));

        let args = parse(&["swapx", "process", "a.txt", "-j", "256"]).unwrap();
        assert!(matches!(args, Args::Process { jobs: Some(256), .. }));
    }

    #[test]
    fn test_profile_remove_is_one_based() {
        let args = parse(&["swapx", "profile", "remove", "2"]).unwrap();
        assert_eq!(args, Args::ProfileRemove { profile: None, index: 1 });
        assert!(parse(&["swapx", "profile", "remove", "0"]).is_err());
    }

    #[test]
    fn test_import_replace_conflicts_with_force() {
        assert!(parse(&["swapx", "preset", "import", "p.json", "--replace", "--force"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli =
            Cli::try_parse_from(["swapx", "history", "--debug", "--config", "c.toml"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }
}
