use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use colored::Colorize;
use itertools::Itertools;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use fhclean::timestamp::split_history_suffix;
use fhclean::{get_relative_path_or_filename, path_to_filename_string, print_error, print_warning};

use crate::config::Config;
use crate::stats::CleanupStats;

/// Default name for the quarantine directory created under the cleaning root.
pub const QUARANTINE_DIR_NAME: &str = "fhclean_to_delete";

/// One file from a directory listing, classified by the filename parser.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CandidateFile {
    path: PathBuf,
    /// File name as it appears on disk.
    file_name: String,
    /// Stem with the timestamp suffix stripped, or the whole stem when there is none.
    base_name: String,
    /// Text after the final `.`, empty when the name has no extension.
    extension: String,
    /// Parsed backup timestamp, absent for names without the suffix.
    timestamp: Option<NaiveDateTime>,
}

/// Decision for a single timestamped file within its group.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    /// Keep this file and drop the timestamp suffix from its name.
    Rename { new_name: String },
    /// Keep this file under its current name.
    Keep,
    /// Remove this file permanently.
    Delete,
    /// Move this file under the quarantine directory.
    Quarantine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolution {
    file: CandidateFile,
    outcome: Disposition,
}

impl CandidateFile {
    fn new(path: PathBuf) -> Self {
        let file_name = path_to_filename_string(&path);
        let (stem, extension) = fhclean::get_normalized_file_name_and_extension(&path)
            .unwrap_or_else(|_| (file_name.clone(), String::new()));

        match split_history_suffix(&stem) {
            Some(split) => Self {
                path,
                file_name,
                base_name: split.base,
                extension,
                timestamp: Some(split.timestamp),
            },
            None => Self {
                path,
                file_name,
                base_name: stem,
                extension,
                timestamp: None,
            },
        }
    }

    /// Name this file gets once the timestamp suffix is dropped.
    fn bare_name(&self) -> String {
        if self.extension.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}.{}", self.base_name, self.extension)
        }
    }
}

/// Group the timestamped files of one directory by (base name, extension)
/// and decide the outcome for every member.
///
/// Pure decision logic with no filesystem access. The survivor of each group
/// is the member with the latest timestamp; equal timestamps are resolved in
/// favour of the lexicographically largest file name, so repeated runs pick
/// the same survivor regardless of enumeration order. Files without a parsed
/// timestamp are never emitted.
fn resolve_directory(candidates: &[CandidateFile], rename_survivor: bool, purge: bool) -> Vec<Resolution> {
    let mut groups: HashMap<(&str, &str), Vec<&CandidateFile>> = HashMap::new();
    for file in candidates.iter().filter(|file| file.timestamp.is_some()) {
        groups
            .entry((file.base_name.as_str(), file.extension.as_str()))
            .or_default()
            .push(file);
    }

    let mut resolutions = Vec::new();
    for (_, mut members) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        members.sort_by(|a, b| (a.timestamp, &a.file_name).cmp(&(b.timestamp, &b.file_name)));
        let Some(survivor) = members.pop() else {
            continue;
        };

        for duplicate in members {
            resolutions.push(Resolution {
                file: duplicate.clone(),
                outcome: if purge { Disposition::Delete } else { Disposition::Quarantine },
            });
        }

        let outcome = if rename_survivor {
            Disposition::Rename {
                new_name: survivor.bare_name(),
            }
        } else {
            Disposition::Keep
        };
        resolutions.push(Resolution {
            file: survivor.clone(),
            outcome,
        });
    }
    resolutions
}

pub struct Cleanup {
    root: PathBuf,
    config: Config,
}

impl Cleanup {
    pub const fn new(root: PathBuf, config: Config) -> Self {
        Self { root, config }
    }

    /// Sweep the tree and return the aggregated counts.
    ///
    /// Per-file and per-directory errors are reported and counted but never
    /// abort the sweep; directories are independent and processed in parallel.
    pub fn run(&self) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let directories = self.collect_directories(&mut stats);
        if self.config.verbose {
            println!("Processing {} directories under {}", directories.len(), self.root.display());
        }

        let swept = directories
            .par_iter()
            .map(|dir| self.process_directory(dir))
            .reduce(CleanupStats::default, CleanupStats::merged);

        stats.merged(swept)
    }

    /// Directories to process: the root alone, or the whole tree with recurse.
    fn collect_directories(&self, stats: &mut CleanupStats) -> Vec<PathBuf> {
        if !self.config.recurse {
            return vec![self.root.clone()];
        }

        let mut directories = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.should_skip_entry(entry));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => directories.push(entry.into_path()),
                Ok(_) => {}
                Err(error) => {
                    print_error!("Failed to read directory entry: {error}");
                    stats.failures += 1;
                }
            }
        }
        directories
    }

    /// Hidden entries and the quarantine directory are left alone.
    fn should_skip_entry(&self, entry: &walkdir::DirEntry) -> bool {
        fhclean::is_hidden(entry) || entry.file_name().to_string_lossy() == self.config.quarantine_dir.as_str()
    }

    fn process_directory(&self, dir: &Path) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let Some(candidates) = self.collect_candidates(dir, &mut stats) else {
            return stats;
        };

        let resolutions = resolve_directory(&candidates, self.config.rename, self.config.purge);
        if resolutions.is_empty() {
            if self.config.verbose {
                println!("No File History files in {}", dir.display());
            }
            return stats;
        }

        for resolution in &resolutions {
            match &resolution.outcome {
                Disposition::Rename { new_name } => self.rename_survivor(dir, &resolution.file, new_name, &mut stats),
                Disposition::Keep => {
                    if self.config.verbose {
                        println!("Keep: {}", self.display_path(&resolution.file.path));
                    }
                }
                Disposition::Delete => self.delete_file(&resolution.file, &mut stats),
                Disposition::Quarantine => self.quarantine_file(dir, &resolution.file, &mut stats),
            }
        }
        stats
    }

    /// List the files of one directory, hidden entries skipped.
    /// Returns `None` when the directory cannot be read at all.
    fn collect_candidates(&self, dir: &Path, stats: &mut CleanupStats) -> Option<Vec<CandidateFile>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) => {
                print_error!("Failed to read directory {}: {error}", dir.display());
                stats.failures += 1;
                return None;
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
                    if is_file && !entry.file_name().to_string_lossy().starts_with('.') {
                        candidates.push(CandidateFile::new(entry.path()));
                    }
                }
                Err(error) => {
                    print_error!("Failed to read entry in {}: {error}", dir.display());
                    stats.failures += 1;
                }
            }
        }
        Some(candidates)
    }

    /// Drop the timestamp suffix from the kept file, refusing to overwrite.
    fn rename_survivor(&self, dir: &Path, file: &CandidateFile, new_name: &str, stats: &mut CleanupStats) {
        let target = dir.join(new_name);
        if target.exists() {
            print_warning!(
                "Name already taken, keeping timestamped name: {}",
                self.display_path(&target)
            );
            stats.conflicts += 1;
            return;
        }

        let heading = if self.config.dryrun {
            "Dryrun:".cyan().bold()
        } else {
            "Rename:".magenta().bold()
        };
        println!("{heading}");
        fhclean::show_diff(&file.file_name, new_name);

        if self.config.dryrun {
            stats.renamed += 1;
            return;
        }
        match fs::rename(&file.path, &target) {
            Ok(()) => stats.renamed += 1,
            Err(error) => {
                print_error!("Failed to rename {}: {error}", file.path.display());
                stats.failures += 1;
            }
        }
    }

    /// Move a duplicate under the quarantine directory, mirroring its path
    /// relative to the cleaning root. Existing quarantine entries are never
    /// overwritten.
    fn quarantine_file(&self, dir: &Path, file: &CandidateFile, stats: &mut CleanupStats) {
        let relative_dir = dir.strip_prefix(&self.root).unwrap_or(Path::new(""));
        let target_dir = self.root.join(&self.config.quarantine_dir).join(relative_dir);
        let target = target_dir.join(&file.file_name);

        if target.exists() {
            print_warning!("Already in quarantine, skipping: {}", self.display_path(&file.path));
            stats.conflicts += 1;
            return;
        }

        println!(
            "{} {} -> {}",
            "Move:".yellow(),
            self.display_path(&file.path),
            self.display_path(&target)
        );
        if self.config.dryrun {
            stats.moved += 1;
            return;
        }

        if let Err(error) = fs::create_dir_all(&target_dir) {
            print_error!("Failed to create quarantine directory {}: {error}", target_dir.display());
            stats.failures += 1;
            return;
        }
        match fs::rename(&file.path, &target) {
            Ok(()) => stats.moved += 1,
            Err(error) => {
                print_error!("Failed to move {}: {error}", file.path.display());
                stats.failures += 1;
            }
        }
    }

    /// Permanently remove a duplicate (purge mode).
    fn delete_file(&self, file: &CandidateFile, stats: &mut CleanupStats) {
        println!("{} {}", "Delete:".red(), self.display_path(&file.path));
        if self.config.dryrun {
            stats.deleted += 1;
            return;
        }
        match fs::remove_file(&file.path) {
            Ok(()) => stats.deleted += 1,
            Err(error) => {
                print_error!("Failed to delete {}: {error}", file.path.display());
                stats.failures += 1;
            }
        }
    }

    fn display_path(&self, path: &Path) -> String {
        get_relative_path_or_filename(path, &self.root)
    }
}

#[cfg(test)]
mod resolver_tests {
    use super::*;

    fn candidate(name: &str) -> CandidateFile {
        CandidateFile::new(PathBuf::from(name))
    }

    fn survivors(resolutions: &[Resolution]) -> Vec<&Resolution> {
        resolutions
            .iter()
            .filter(|r| matches!(r.outcome, Disposition::Rename { .. } | Disposition::Keep))
            .collect()
    }

    #[test]
    fn classifies_timestamped_and_plain_names() {
        let timestamped = candidate("File1 (2016_06_22 13_39_28 UTC).jpg");
        assert_eq!(timestamped.base_name, "File1");
        assert_eq!(timestamped.extension, "jpg");
        assert!(timestamped.timestamp.is_some());
        assert_eq!(timestamped.bare_name(), "File1.jpg");

        let plain = candidate("Notes.txt");
        assert_eq!(plain.base_name, "Notes");
        assert_eq!(plain.extension, "txt");
        assert!(plain.timestamp.is_none());
    }

    #[test]
    fn classifies_name_without_extension() {
        let timestamped = candidate("README (2020_01_01 00_00_00 UTC)");
        assert_eq!(timestamped.base_name, "README");
        assert_eq!(timestamped.extension, "");
        assert!(timestamped.timestamp.is_some());
        assert_eq!(timestamped.bare_name(), "README");
    }

    #[test]
    fn latest_timestamp_survives() {
        let candidates = vec![
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File1 (2017_06_22 13_39_28 UTC).jpg"),
            candidate("File1 (2015_01_01 00_00_00 UTC).jpg"),
        ];
        let resolutions = resolve_directory(&candidates, true, false);

        assert_eq!(resolutions.len(), 3);
        let survivors = survivors(&resolutions);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].file.file_name, "File1 (2017_06_22 13_39_28 UTC).jpg");
        assert_eq!(
            survivors[0].outcome,
            Disposition::Rename {
                new_name: "File1.jpg".to_string()
            }
        );
        assert!(
            resolutions
                .iter()
                .filter(|r| r.outcome == Disposition::Quarantine)
                .count()
                == 2
        );
    }

    #[test]
    fn survivor_timestamp_is_maximum() {
        let candidates = vec![
            candidate("Doc (2019_05_05 10_00_00 UTC).pdf"),
            candidate("Doc (2021_01_01 09_00_00 UTC).pdf"),
            candidate("Doc (2020_12_31 23_59_59 UTC).pdf"),
        ];
        let resolutions = resolve_directory(&candidates, true, false);
        let survivor = &survivors(&resolutions)[0].file;
        for resolution in &resolutions {
            assert!(resolution.file.timestamp <= survivor.timestamp);
        }
    }

    #[test]
    fn groups_split_by_extension() {
        let candidates = vec![
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File1 (2017_06_22 13_39_28 UTC).png"),
        ];
        let resolutions = resolve_directory(&candidates, true, false);

        // Different extensions are different groups, so both survive.
        assert_eq!(survivors(&resolutions).len(), 2);
    }

    #[test]
    fn groups_split_by_base_name() {
        let candidates = vec![
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File2 (2017_06_22 13_39_28 UTC).jpg"),
        ];
        let resolutions = resolve_directory(&candidates, true, false);
        assert_eq!(survivors(&resolutions).len(), 2);
    }

    #[test]
    fn plain_files_are_not_emitted() {
        let candidates = vec![
            candidate("Notes.txt"),
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File1.jpg"),
        ];
        let resolutions = resolve_directory(&candidates, true, false);

        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].file.file_name, "File1 (2016_06_22 13_39_28 UTC).jpg");
    }

    #[test]
    fn lone_timestamped_file_is_still_renamed() {
        let candidates = vec![candidate("Doc (2020_01_01 00_00_00 UTC).pdf")];
        let resolutions = resolve_directory(&candidates, true, false);

        assert_eq!(resolutions.len(), 1);
        assert_eq!(
            resolutions[0].outcome,
            Disposition::Rename {
                new_name: "Doc.pdf".to_string()
            }
        );
    }

    #[test]
    fn rename_disabled_keeps_survivor_name() {
        let candidates = vec![
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File1 (2017_06_22 13_39_28 UTC).jpg"),
        ];
        let resolutions = resolve_directory(&candidates, false, false);

        let survivors = survivors(&resolutions);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].outcome, Disposition::Keep);
    }

    #[test]
    fn purge_marks_duplicates_for_deletion() {
        let candidates = vec![
            candidate("File1 (2016_06_22 13_39_28 UTC).jpg"),
            candidate("File1 (2017_06_22 13_39_28 UTC).jpg"),
        ];
        let resolutions = resolve_directory(&candidates, true, true);

        assert!(resolutions.iter().any(|r| r.outcome == Disposition::Delete));
        assert!(!resolutions.iter().any(|r| r.outcome == Disposition::Quarantine));
    }

    #[test]
    fn identical_timestamps_tie_break_on_largest_name() {
        // Two distinct on-disk names can normalize to the same base name,
        // for example composed vs decomposed Unicode forms.
        let first = CandidateFile {
            path: PathBuf::from("Cafe\u{301} (2016_06_22 13_39_28 UTC).jpg"),
            file_name: "Cafe\u{301} (2016_06_22 13_39_28 UTC).jpg".to_string(),
            base_name: "Caf\u{e9}".to_string(),
            extension: "jpg".to_string(),
            timestamp: split_history_suffix("x (2016_06_22 13_39_28 UTC)").map(|s| s.timestamp),
        };
        let second = CandidateFile {
            path: PathBuf::from("Caf\u{e9} (2016_06_22 13_39_28 UTC).jpg"),
            file_name: "Caf\u{e9} (2016_06_22 13_39_28 UTC).jpg".to_string(),
            ..first.clone()
        };

        let expected = first.file_name.clone().max(second.file_name.clone());

        // Same survivor no matter the input order.
        for candidates in [vec![first.clone(), second.clone()], vec![second, first]] {
            let resolutions = resolve_directory(&candidates, true, false);
            let survivors = survivors(&resolutions);
            assert_eq!(survivors.len(), 1);
            assert_eq!(survivors[0].file.file_name, expected);
        }
    }

    #[test]
    fn output_order_is_deterministic() {
        let candidates = vec![
            candidate("Beta (2016_06_22 13_39_28 UTC).txt"),
            candidate("Alpha (2016_06_22 13_39_28 UTC).txt"),
        ];
        let first = resolve_directory(&candidates, true, false);
        let reversed: Vec<CandidateFile> = candidates.into_iter().rev().collect();
        let second = resolve_directory(&reversed, true, false);
        assert_eq!(first, second);
    }
}
