//! Named rule profiles and preset files
//!
//! Profiles live in a `ProfileBook`: a map from profile name to rule records
//! plus the name of the current profile. A profile called `default` always
//! exists and can be neither renamed nor deleted. `JsonProfileStore` keeps
//! the book in ~/.swapx/profiles.json.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::rule_set::{rules_from_value, Mode, RawRule, RuleSet, RuleSetDiagnostics};

pub const DEFAULT_PROFILE: &str = "default";
pub const FORMAT_VERSION: &str = "2.0";

/// Storage seam for profile rules
pub trait ProfileStore {
    fn get(&self, name: &str) -> Option<Vec<RawRule>>;
    fn put(&mut self, name: &str, rules: Vec<RawRule>) -> Result<()>;
    fn list(&self) -> Vec<String>;

    /// Build a `RuleSet` from a stored profile
    fn rule_set(&self, name: &str, mode: Mode) -> Result<(RuleSet, RuleSetDiagnostics)> {
        let raw = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Profile not found: {}", name))?;
        Ok(RuleSet::from_raw_rules(&raw, mode))
    }
}

/// All profiles plus the current selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBook {
    pub version: String,
    profiles: BTreeMap<String, Vec<RawRule>>,
    current_profile: String,
}

impl Default for ProfileBook {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Vec::new());
        Self {
            version: FORMAT_VERSION.to_string(),
            profiles,
            current_profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

/// How an imported preset is combined with existing profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Add new profiles; existing ones are replaced only when `overwrite` is set
    Merge { overwrite: bool },
    /// Throw away existing profiles
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub skipped: Vec<String>,
}

/// Exported profile document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub profiles: BTreeMap<String, Vec<RawRule>>,
    pub current_profile: String,
}

impl Preset {
    /// Parse a preset, dropping malformed rule entries.
    ///
    /// Only a missing or non-object `profiles` field is an error.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Invalid preset: not valid JSON")?;

        let profiles = value
            .get("profiles")
            .and_then(profiles_from_value)
            .ok_or_else(|| anyhow::anyhow!("Invalid preset: no profiles object found"))?;

        let export_date = value
            .get("exportDate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            version: value
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(FORMAT_VERSION)
                .to_string(),
            export_date,
            profiles,
            current_profile: value
                .get("currentProfile")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROFILE)
                .to_string(),
        })
    }
}

fn profiles_from_value(value: &Value) -> Option<BTreeMap<String, Vec<RawRule>>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(name, rules)| (name.clone(), rules_from_value(rules)))
            .collect(),
    )
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Profile name must not be empty");
    }
    Ok(name.to_string())
}

impl ProfileBook {
    /// Parse a settings document.
    ///
    /// Understands the current format (`version` 2.0 with `profiles`) and the
    /// older one holding a single `replacements` list, which becomes `default`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Profiles file is not valid JSON")?;

        let mut book = if let Some(profiles) = value.get("profiles").and_then(profiles_from_value) {
            Self {
                version: FORMAT_VERSION.to_string(),
                profiles,
                current_profile: value
                    .get("currentProfile")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROFILE)
                    .to_string(),
            }
        } else if let Some(legacy) = value.get("replacements").filter(|v| v.is_array()) {
            tracing::info!("migrating single-list settings into the default profile");
            let mut book = Self::default();
            book.profiles
                .insert(DEFAULT_PROFILE.to_string(), rules_from_value(legacy));
            book
        } else {
            anyhow::bail!("Profiles file has neither 'profiles' nor 'replacements'");
        };

        book.repair();
        Ok(book)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize profiles")
    }

    /// Restore the invariants: `default` exists, current profile exists
    fn repair(&mut self) {
        self.profiles
            .entry(DEFAULT_PROFILE.to_string())
            .or_default();
        if !self.profiles.contains_key(&self.current_profile) {
            self.current_profile = DEFAULT_PROFILE.to_string();
        }
    }

    pub fn current(&self) -> &str {
        &self.current_profile
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn rules(&self, name: &str) -> Option<&[RawRule]> {
        self.profiles.get(name).map(Vec::as_slice)
    }

    fn rules_mut(&mut self, name: &str) -> Result<&mut Vec<RawRule>> {
        self.profiles
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Profile not found: {}", name))
    }

    pub fn switch(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            anyhow::bail!("Profile not found: {}", name);
        }
        self.current_profile = name.to_string();
        Ok(())
    }

    /// Create a profile holding a copy of the current profile's rules and
    /// make it current
    pub fn create(&mut self, name: &str) -> Result<String> {
        let name = clean_name(name)?;
        if self.contains(&name) {
            anyhow::bail!("Profile already exists: {}", name);
        }
        let rules = self
            .profiles
            .get(&self.current_profile)
            .cloned()
            .unwrap_or_default();
        self.profiles.insert(name.clone(), rules);
        self.current_profile = name.clone();
        Ok(name)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<String> {
        if from == DEFAULT_PROFILE {
            anyhow::bail!("The '{}' profile cannot be renamed", DEFAULT_PROFILE);
        }
        if !self.contains(from) {
            anyhow::bail!("Profile not found: {}", from);
        }
        let to = clean_name(to)?;
        if to == from {
            return Ok(to);
        }
        if self.contains(&to) {
            anyhow::bail!("Profile already exists: {}", to);
        }
        let rules = self.profiles.remove(from).unwrap_or_default();
        self.profiles.insert(to.clone(), rules);
        if self.current_profile == from {
            self.current_profile = to.clone();
        }
        Ok(to)
    }

    /// Delete a profile; deleting the current one switches to `default`
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_PROFILE {
            anyhow::bail!("The '{}' profile cannot be deleted", DEFAULT_PROFILE);
        }
        if self.profiles.remove(name).is_none() {
            anyhow::bail!("Profile not found: {}", name);
        }
        if self.current_profile == name {
            self.current_profile = DEFAULT_PROFILE.to_string();
        }
        Ok(())
    }

    pub fn add_replace(&mut self, profile: &str, old: &str, new: &str) -> Result<()> {
        self.rules_mut(profile)?
            .push(RawRule::replace(old.trim(), new.trim()));
        Ok(())
    }

    pub fn add_delete(&mut self, profile: &str, word: &str) -> Result<()> {
        self.rules_mut(profile)?.push(RawRule::delete(word.trim()));
        Ok(())
    }

    /// Remove the rule at `index` (0-based) from a profile
    pub fn remove_rule(&mut self, profile: &str, index: usize) -> Result<RawRule> {
        let rules = self.rules_mut(profile)?;
        if index >= rules.len() {
            anyhow::bail!(
                "No rule #{} in profile {} ({} rules)",
                index + 1,
                profile,
                rules.len()
            );
        }
        Ok(rules.remove(index))
    }

    pub fn export(&self) -> Preset {
        Preset {
            version: FORMAT_VERSION.to_string(),
            export_date: Utc::now(),
            profiles: self.profiles.clone(),
            current_profile: self.current_profile.clone(),
        }
    }

    pub fn import(&mut self, preset: Preset, mode: ImportMode) -> ImportSummary {
        let mut summary = ImportSummary::default();

        match mode {
            ImportMode::Replace => {
                summary.added = preset.profiles.keys().cloned().collect();
                self.profiles = preset.profiles;
                self.current_profile = preset.current_profile;
            }
            ImportMode::Merge { overwrite } => {
                for (name, rules) in preset.profiles {
                    if !self.contains(&name) {
                        summary.added.push(name.clone());
                        self.profiles.insert(name, rules);
                    } else if overwrite {
                        summary.replaced.push(name.clone());
                        self.profiles.insert(name, rules);
                    } else {
                        summary.skipped.push(name);
                    }
                }
            }
        }

        self.repair();
        summary
    }
}

impl ProfileStore for ProfileBook {
    fn get(&self, name: &str) -> Option<Vec<RawRule>> {
        self.profiles.get(name).cloned()
    }

    fn put(&mut self, name: &str, rules: Vec<RawRule>) -> Result<()> {
        let name = clean_name(name)?;
        self.profiles.insert(name, rules);
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}

/// In-memory store, for tests and embedding
pub type MemoryProfileStore = ProfileBook;

/// A `ProfileBook` persisted as JSON
#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    book: ProfileBook,
}

impl JsonProfileStore {
    /// Open ~/.swapx/profiles.json
    pub fn open_default() -> Result<Self> {
        Self::open(crate::config::config_dir()?.join("profiles.json"))
    }

    /// Open a store; a missing file starts with just the `default` profile
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let book = if path.exists() {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read profiles: {}", path.display()))?;
            ProfileBook::from_json(&json)
                .with_context(|| format!("Failed to load profiles: {}", path.display()))?
        } else {
            ProfileBook::default()
        };
        Ok(Self { path, book })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn book(&self) -> &ProfileBook {
        &self.book
    }

    /// Apply `change` and save if it succeeds
    pub fn update<T>(&mut self, change: impl FnOnce(&mut ProfileBook) -> Result<T>) -> Result<T> {
        let value = change(&mut self.book)?;
        self.save()?;
        Ok(value)
    }

    pub fn save(&self) -> Result<()> {
        let json = self.book.to_json()?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut temp_file = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp_file
            .write_all(json.as_bytes())
            .context("Failed to write profiles")?;
        temp_file
            .persist(&self.path)
            .with_context(|| format!("Failed to save profiles: {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "profiles saved");
        Ok(())
    }
}

impl ProfileStore for JsonProfileStore {
    fn get(&self, name: &str) -> Option<Vec<RawRule>> {
        self.book.get(name)
    }

    fn put(&mut self, name: &str, rules: Vec<RawRule>) -> Result<()> {
        self.update(|book| book.put(name, rules))
    }

    fn list(&self) -> Vec<String> {
        self.book.list()
    }
}

/// Write a preset file
pub fn export_preset(book: &ProfileBook, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&book.export()).context("Failed to serialize preset")?;
    fs::write(path, json).with_context(|| format!("Failed to write preset: {}", path.display()))
}

/// Read a preset file
pub fn read_preset(path: &Path) -> Result<Preset> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read preset: {}", path.display()))?;
    Preset::from_json(&json)
}
