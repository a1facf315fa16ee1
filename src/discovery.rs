//! Rule file discovery.
//!
//! One recursive walk of the data directory picks up both dialects:
//!
//! ```text
//! <data>/**/*_DISTR.ini                       -> SPID
//! <data>/skse/plugins/SkyPatcher/**/*.ini     -> SkyPatcher   (except SkyPatcher.ini)
//! ```
//!
//! Name and directory matching is case-insensitive, since mod archives are
//! authored on case-insensitive filesystems. Candidates are then read and
//! parsed (on the rayon pool unless disabled); unreadable files are logged and
//! skipped and files without outfit rules are dropped by the parser. The result
//! is sorted by dialect, then by lowercase relative path, so it never depends on
//! walk or completion order.

use crate::engine::{CancelFlag, parse_rule_text};
use crate::error::{OutfitterError, Result};
use crate::{Dialect, RuleFile};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where discovery looks and how it runs.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// File-name suffix of SPID rule files.
    pub spid_suffix: String,
    /// SkyPatcher rule directory, relative to the data directory, `/`-separated.
    pub skypatcher_dir: String,
    /// SkyPatcher's own settings file, which is never a rule file.
    pub reserved_file_name: String,
    /// Read and parse files on the rayon pool.
    pub parallel: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            spid_suffix: "_DISTR.ini".to_string(),
            skypatcher_dir: "skse/plugins/SkyPatcher".to_string(),
            reserved_file_name: "SkyPatcher.ini".to_string(),
            parallel: true,
        }
    }
}

#[derive(Debug)]
struct Candidate {
    full_path: PathBuf,
    relative_path: String,
    name: String,
    dialect: Dialect,
}

/// Find, read and parse every rule file under `data_dir`.
///
/// Fails only when `data_dir` is not a directory or the run is cancelled.
pub fn discover(data_dir: impl AsRef<Path>, options: &DiscoveryOptions, cancel: &CancelFlag) -> Result<Vec<RuleFile>> {
    let data_dir = data_dir.as_ref();
    if !data_dir.is_dir() {
        return Err(OutfitterError::InvalidDataPath(data_dir.to_path_buf()));
    }

    let candidates = find_candidates(data_dir, options, cancel)?;
    debug!(data_dir = %data_dir.display(), candidates = candidates.len(), "walk finished");

    let parsed: Vec<Option<RuleFile>> = if options.parallel {
        candidates.par_iter().map(|c| load(c, cancel)).collect::<Result<_>>()?
    } else {
        candidates.iter().map(|c| load(c, cancel)).collect::<Result<_>>()?
    };

    let mut files: Vec<RuleFile> = parsed.into_iter().flatten().collect();
    files.sort_by(|a, b| {
        a.dialect.cmp(&b.dialect).then_with(|| {
            a.relative_path.to_ascii_lowercase().cmp(&b.relative_path.to_ascii_lowercase())
        })
    });

    info!(
        data_dir = %data_dir.display(),
        spid = files.iter().filter(|f| f.dialect == Dialect::Spid).count(),
        skypatcher = files.iter().filter(|f| f.dialect == Dialect::SkyPatcher).count(),
        "discovered rule files"
    );
    Ok(files)
}

fn find_candidates(data_dir: &Path, options: &DiscoveryOptions, cancel: &CancelFlag) -> Result<Vec<Candidate>> {
    let spid_suffix = options.spid_suffix.to_lowercase();
    let skypatcher_prefix = format!("{}/", options.skypatcher_dir.trim_matches('/').to_lowercase());
    let reserved = options.reserved_file_name.to_lowercase();

    let mut candidates = Vec::new();
    for entry in WalkDir::new(data_dir).into_iter() {
        cancel.check()?;
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(data_dir) else { continue };
        let relative_path =
            relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        let name = entry.file_name().to_string_lossy().into_owned();
        let lower_name = name.to_lowercase();

        let dialect = if lower_name.ends_with(&spid_suffix) {
            Dialect::Spid
        } else if relative_path.to_lowercase().starts_with(&skypatcher_prefix)
            && lower_name.ends_with(".ini")
            && lower_name != reserved
        {
            Dialect::SkyPatcher
        } else {
            continue;
        };

        candidates.push(Candidate { full_path: entry.path().to_path_buf(), relative_path, name, dialect });
    }
    Ok(candidates)
}

fn load(candidate: &Candidate, cancel: &CancelFlag) -> Result<Option<RuleFile>> {
    cancel.check()?;
    let bytes = match std::fs::read(&candidate.full_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %candidate.full_path.display(), %err, "failed to read rule file");
            return Ok(None);
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_rule_text(&candidate.name, &candidate.full_path, &candidate.relative_path, candidate.dialect, &text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "Zed_DISTR.ini", "Outfit = 0x800~MyMod.esp\n");
        write(root, "mods/alpha_distr.INI", "; guards\nOutfit = 0x801~MyMod.esp|NONE|0x13BBF~Skyrim.esm\n");
        write(root, "NoRules_DISTR.ini", "Spell = 0x1~Skyrim.esm\n");
        write(root, "SKSE/Plugins/SkyPatcher/npc/Guards.ini", "filterByNpcs=Skyrim.esm|0x1:filterByOutfits=MyMod.esp|0x802\n");
        write(root, "skse/plugins/SkyPatcher/SkyPatcher.ini", "filterByOutfits=MyMod.esp|0x803\n");
        write(root, "skse/plugins/SkyPatcher/npc/readme.txt", "filterByOutfits=MyMod.esp|0x804\n");
        write(root, "other.ini", "filterByOutfits=MyMod.esp|0x805\n");
        dir
    }

    #[test]
    fn finds_both_dialects_sorted() {
        let dir = data_dir();
        for parallel in [true, false] {
            let options = DiscoveryOptions { parallel, ..Default::default() };
            let files = discover(dir.path(), &options, &CancelFlag::new()).unwrap();
            let found: Vec<(Dialect, &str)> = files.iter().map(|f| (f.dialect, f.relative_path.as_str())).collect();
            assert_eq!(
                found,
                vec![
                    (Dialect::Spid, "mods/alpha_distr.INI"),
                    (Dialect::Spid, "Zed_DISTR.ini"),
                    (Dialect::SkyPatcher, "SKSE/Plugins/SkyPatcher/npc/Guards.ini"),
                ]
            );
        }
    }

    #[test]
    fn parsed_files_carry_paths_and_counts() {
        let dir = data_dir();
        let files = discover(dir.path(), &DiscoveryOptions::default(), &CancelFlag::new()).unwrap();
        let alpha = &files[0];
        assert_eq!(alpha.name, "alpha_distr.INI");
        assert_eq!(alpha.directory(), "mods");
        assert_eq!(alpha.full_path, dir.path().join("mods").join("alpha_distr.INI"));
        assert_eq!(alpha.outfit_rule_count, 1);
        assert_eq!(alpha.comment_count(), 1);
    }

    #[test]
    fn missing_data_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover(&missing, &DiscoveryOptions::default(), &CancelFlag::new()),
            Err(OutfitterError::InvalidDataPath(path)) if path == missing
        ));
    }

    #[test]
    fn cancelled_discovery_returns_nothing() {
        let dir = data_dir();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(discover(dir.path(), &DiscoveryOptions::default(), &cancel), Err(OutfitterError::Cancelled)));
    }

    #[test]
    fn invalid_utf8_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Latin_DISTR.ini");
        fs::write(&path, b"; caf\xe9\nOutfit = 0x800~MyMod.esp\n").unwrap();
        let files = discover(dir.path(), &DiscoveryOptions::default(), &CancelFlag::new()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].outfit_rule_count, 1);
    }
}
