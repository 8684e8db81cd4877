// crates/store/src/files.rs
//! Supplemental knowledge files and the directory scan.
//!
//! Line formats: `.set` (one entry per line), `.map`/`.properties`/
//! `.pdefaults` (`key:value` or `key=value`), `.substitution`
//! (`pattern=replacement`). Blank lines and `#` comments are skipped.
//! The scan is sorted for determinism; files whose stem ends in
//! `-example` are skipped so sample values never shadow production ones;
//! later files override earlier ones per key.

use std::path::Path;

use parlance_core::normalize::SubstitutionTable;
use parlance_core::{KnowledgeBase, WordSet};
use tracing::{debug, info, warn};

use crate::aiml::load_aiml_file;
use crate::error::LoadError;

/// What a directory scan accomplished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub categories: usize,
    pub sets: usize,
    pub topics: usize,
    pub maps: usize,
    pub properties: usize,
    pub pdefaults: usize,
    pub substitutions: usize,
    /// Files skipped by the `-example` convention.
    pub skipped: usize,
    /// Files that failed to load (reported, not fatal).
    pub failed: usize,
}

/// Scan a directory and load every knowledge file in it.
pub fn load_directory(kb: &mut KnowledgeBase, dir: &Path) -> Result<LoadReport, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::DirNotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| LoadError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut report = LoadReport::default();
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if stem.ends_with("-example") {
            debug!(path = %path.display(), "skipping example file");
            report.skipped += 1;
            continue;
        }
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let outcome = match extension {
            "aiml" => load_aiml_file(kb, &path).map(|n| report.categories += n),
            "set" => load_word_file(&path).map(|set| {
                report.sets += 1;
                kb.insert_set(&stem, set);
            }),
            "topic" => load_word_file(&path).map(|set| {
                report.topics += 1;
                kb.insert_topic_list(&stem, set);
            }),
            "map" => load_pair_file(&path).map(|pairs| {
                report.maps += 1;
                for (k, v) in pairs {
                    kb.insert_map_entry(&stem, &k, &v);
                }
            }),
            "properties" => load_pair_file(&path).map(|pairs| {
                report.properties += 1;
                for (k, v) in pairs {
                    kb.set_property(&k, &v);
                }
            }),
            "pdefaults" => load_pair_file(&path).map(|pairs| {
                report.pdefaults += 1;
                for (k, v) in pairs {
                    kb.set_pdefault(&k, &v);
                }
            }),
            "substitution" => load_pair_file(&path).map(|pairs| {
                report.substitutions += 1;
                let mut table = SubstitutionTable::new(stem.clone());
                for (k, v) in pairs {
                    table.push_rule(k, v);
                }
                kb.insert_substitution(table);
            }),
            _ => {
                debug!(path = %path.display(), "ignoring unrecognized file");
                continue;
            }
        };
        if let Err(err) = outcome {
            warn!(path = %path.display(), %err, "failed to load knowledge file");
            report.failed += 1;
        }
    }
    info!(
        categories = report.categories,
        sets = report.sets,
        maps = report.maps,
        failed = report.failed,
        dir = %dir.display(),
        "knowledge directory loaded"
    );
    Ok(report)
}

/// One entry per line → ordered word set.
fn load_word_file(path: &Path) -> Result<WordSet, LoadError> {
    let mut set = WordSet::new();
    for line in read_lines(path)? {
        set.add(&line);
    }
    Ok(set)
}

/// `key:value` or `key=value` per line; the first separator wins.
fn load_pair_file(path: &Path) -> Result<Vec<(String, String)>, LoadError> {
    let mut pairs = Vec::new();
    for line in read_lines(path)? {
        match split_pair(&line) {
            Some((k, v)) => pairs.push((k.to_string(), v.to_string())),
            None => debug!(path = %path.display(), line, "ignoring line without separator"),
        }
    }
    Ok(pairs)
}

fn split_pair(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':');
    let equals = line.find('=');
    let at = match (colon, equals) {
        (Some(c), Some(e)) => c.min(e),
        (Some(c), None) => c,
        (None, Some(e)) => e,
        (None, None) => return None,
    };
    let (k, v) = line.split_at(at);
    Some((k.trim(), v[1..].trim()))
}

fn read_lines(path: &Path) -> Result<Vec<String>, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_pair_first_separator_wins() {
        assert_eq!(split_pair("a:b=c"), Some(("a", "b=c")));
        assert_eq!(split_pair("a=b:c"), Some(("a", "b:c")));
        assert_eq!(split_pair("key = value "), Some(("key", "value")));
        assert_eq!(split_pair("no separator"), None);
    }
}
