//! The content pipeline: expands globs and trees, synthesises implicit
//! directories, masks modes by `umask`, and detects conflicts. Spec §4.1.
//!
//! Steps run in the exact order spec §4.1 lists them; each step is its own
//! function so the order is visible at the call site in [`prepare`].

use std::collections::{HashMap, HashSet};
use std::fs;

use crate::error::{ContentError, PkgError, PkgResult};
use crate::info::{Content, ContentType, FileInfo, Info};

/// Run the full content pipeline for `packager_key` against `info`.
pub fn prepare(
    info: &Info,
    packager_key: &str,
    env: &HashMap<String, String>,
) -> PkgResult<Vec<Content>> {
    let overridable = info.resolved_for(packager_key);

    // Step 1: filter by packager.
    let filtered: Vec<Content> = overridable
        .contents
        .into_iter()
        .filter(|c| c.packager.is_none() || c.packager.as_deref() == Some(packager_key))
        .collect();

    // Steps 2 & 3: expand globs / trees.
    let mut expanded = Vec::new();
    for content in filtered {
        let content = expand_content_vars(content, env);
        match content.r#type {
            ContentType::Tree => expanded.extend(expand_tree(&content)?),
            ContentType::Dir
            | ContentType::Symlink
            | ContentType::Ghost
            | ContentType::ImplicitDir
            | ContentType::DebianChangelog => expanded.push(content),
            _ => expanded.extend(expand_globs(&content, info.disable_globbing)?),
        }
    }

    // Step 4: apply FileInfo defaults.
    for content in &mut expanded {
        apply_file_info_defaults(content, info.umask)?;
    }

    // Step 5: normalise destinations.
    for content in &mut expanded {
        content.destination = normalize_destination(&content.destination)?;
    }

    // Step 6: synthesise implicit directories.
    let expanded = synthesize_implicit_dirs(expanded);

    // Step 7: deduplicate / detect conflicts.
    let mut expanded = dedup_contents(expanded)?;

    // Step 8: sort by destination for determinism.
    expanded.sort_by(|a, b| a.destination.cmp(&b.destination));

    Ok(expanded)
}

/// Dry-run equivalent of [`prepare`]: runs the same pipeline but discards
/// the expanded list, for config validation without touching an output
/// sink.
pub fn validate(info: &Info, packager_key: &str, env: &HashMap<String, String>) -> PkgResult<()> {
    prepare(info, packager_key, env).map(|_| ())
}

fn expand_content_vars(mut content: Content, env: &HashMap<String, String>) -> Content {
    if content.expand {
        content.source = crate::info::load::expand_vars(&content.source, env);
        content.destination = crate::info::load::expand_vars(&content.destination, env);
    }
    content
}

fn has_glob_meta(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Step 2: expand a `source` glob (or literal path) into one or more
/// concrete `Content` entries.
fn expand_globs(content: &Content, disable_globbing: bool) -> PkgResult<Vec<Content>> {
    if content.source.is_empty() {
        return Ok(vec![content.clone()]);
    }

    let matches: Vec<std::path::PathBuf> = if disable_globbing {
        let p = std::path::PathBuf::from(&content.source);
        if p.exists() {
            vec![p]
        } else {
            vec![]
        }
    } else {
        let pattern = glob::glob(&content.source)
            .map_err(|e| ContentError::BadGlob(content.source.clone(), e))?;
        pattern.filter_map(|r| r.ok()).collect()
    };

    if matches.is_empty() {
        return Err(PkgError::Content(ContentError::ContentMissing(
            content.source.clone(),
        )));
    }

    let literal_single = !has_glob_meta(&content.source) && matches.len() == 1;

    let mut out = Vec::new();
    for m in matches {
        if m.is_dir() {
            for entry in walkdir::WalkDir::new(&m).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_dir() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&m)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let mut c = content.clone();
                c.source = entry.path().to_string_lossy().to_string();
                c.destination = join_dest(&content.destination, &rel);
                out.push(c);
            }
        } else if literal_single {
            out.push(content.clone());
        } else {
            let base = m
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut c = content.clone();
            c.source = m.to_string_lossy().to_string();
            c.destination = join_dest(&content.destination, &base);
            out.push(c);
        }
    }
    Ok(out)
}

/// Step 3: expand a `type: tree` entry into `file`/`symlink`/`dir` entries
/// for every descendant of `source`.
fn expand_tree(content: &Content) -> PkgResult<Vec<Content>> {
    let root = std::path::PathBuf::from(&content.source);
    if !root.is_dir() {
        return Err(PkgError::Content(ContentError::ContentMissing(
            content.source.clone(),
        )));
    }
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path() == root {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let dest = join_dest(&content.destination, &rel);
        let file_type = entry.file_type();
        let mut c = content.clone();
        c.destination = dest;
        if file_type.is_dir() {
            c.r#type = ContentType::Dir;
            c.source.clear();
        } else if file_type.is_symlink() {
            c.r#type = ContentType::Symlink;
            c.source = fs::read_link(entry.path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
        } else {
            c.r#type = ContentType::File;
            c.source = entry.path().to_string_lossy().to_string();
        }
        out.push(c);
    }
    Ok(out)
}

fn join_dest(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    if rel.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rel}")
    }
}

/// Step 4: fill in mode/owner/group/size/mtime from the source file, with
/// the format-neutral defaults spec §4.1 step 4 specifies.
fn apply_file_info_defaults(content: &mut Content, umask: u32) -> PkgResult<()> {
    let is_dir_like = content.is_dir();
    let mut fi = content.file_info.take().unwrap_or_default();

    if fi.owner.is_none() {
        fi.owner = Some("root".to_string());
    }
    if fi.group.is_none() {
        fi.group = Some("root".to_string());
    }

    let stat = if !content.source.is_empty() && !matches!(content.r#type, ContentType::Symlink) {
        fs::metadata(&content.source).ok()
    } else {
        None
    };

    if fi.mode.is_none() {
        fi.mode_explicit = false;
        let default_mode = if is_dir_like {
            0o755
        } else if let Some(meta) = &stat {
            mode_of(meta)
        } else {
            0o644
        };
        fi.mode = Some(default_mode);
    } else {
        fi.mode_explicit = true;
    }
    fi.mode = Some(fi.masked_mode(umask));

    if fi.size.is_none() {
        fi.size = Some(stat.as_ref().map(|m| m.len()).unwrap_or(0));
    }
    if fi.mtime.is_none() {
        fi.mtime = stat
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
    }

    content.file_info = Some(fi);
    Ok(())
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> u32 {
    0o644
}

/// Step 5: collapse `.`/`..`, force a leading `/`, forbid escape above the
/// install root.
fn normalize_destination(dest: &str) -> PkgResult<String> {
    let dest = dest.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in dest.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(PkgError::Content(ContentError::ContentEscapesRoot(
                        dest.clone(),
                    )));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Step 6: for every destination, synthesise an `implicit-dir` entry for
/// every ancestor not already present, up to (but not including) `/`.
fn synthesize_implicit_dirs(contents: Vec<Content>) -> Vec<Content> {
    let mut present: HashSet<String> = contents.iter().map(|c| c.destination.clone()).collect();
    let mut synthesized = Vec::new();

    for content in &contents {
        for ancestor in ancestors(&content.destination) {
            if present.insert(ancestor.clone()) {
                tracing::debug!(path = %ancestor, "synthesising implicit directory");
                synthesized.push(Content::implicit_dir(ancestor));
            }
        }
    }

    let mut all = contents;
    all.extend(synthesized);
    all
}

/// Every ancestor directory of `destination`, nearest-last, excluding `/`
/// itself.
fn ancestors(destination: &str) -> Vec<String> {
    let trimmed = destination.trim_start_matches('/');
    let mut parts: Vec<&str> = trimmed.split('/').collect();
    parts.pop(); // drop the entry's own basename
    let mut out = Vec::new();
    let mut cur = String::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        cur.push('/');
        cur.push_str(part);
        out.push(cur.clone());
    }
    out
}

/// Step 7: an `implicit-dir` is superseded by a later explicit `dir` at
/// the same destination; any other same-destination pair is a conflict.
fn dedup_contents(contents: Vec<Content>) -> PkgResult<Vec<Content>> {
    let mut by_dest: HashMap<String, Content> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for content in contents {
        match by_dest.get(&content.destination) {
            None => {
                order.push(content.destination.clone());
                by_dest.insert(content.destination.clone(), content);
            }
            Some(existing) => {
                let existing_is_implicit = existing.r#type == ContentType::ImplicitDir;
                let new_is_real_dir = content.r#type == ContentType::Dir;
                if existing_is_implicit && new_is_real_dir {
                    by_dest.insert(content.destination.clone(), content);
                } else if content.r#type == ContentType::ImplicitDir {
                    // A later implicit-dir never overrides something real.
                } else {
                    return Err(PkgError::Content(ContentError::ContentConflict(
                        content.destination.clone(),
                    )));
                }
            }
        }
    }

    Ok(order.into_iter().map(|d| by_dest.remove(&d).unwrap()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::Info;
    use std::io::Write;

    fn minimal_info(contents: Vec<Content>) -> Info {
        let mut info: Info = serde_yml::from_str(
            "name: foo\narch: amd64\nversion: 1.0.0\n",
        )
        .unwrap();
        info.overridable.contents = contents;
        info
    }

    #[test]
    fn synthesizes_ancestor_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("fake");
        std::fs::File::create(&file_path)
            .unwrap()
            .write_all(b"hi")
            .unwrap();

        let content = Content::file(file_path.to_string_lossy().to_string(), "/usr/bin/fake");
        let info = minimal_info(vec![content]);
        let env = HashMap::new();
        let result = prepare(&info, "deb", &env).unwrap();

        let dest_set: HashSet<_> = result.iter().map(|c| c.destination.as_str()).collect();
        assert!(dest_set.contains("/usr/bin/fake"));
        assert!(dest_set.contains("/usr"));
        assert!(dest_set.contains("/usr/bin"));
        assert!(!dest_set.contains("/"));
    }

    #[test]
    fn detects_conflicting_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let info = minimal_info(vec![
            Content::file(a.to_string_lossy().to_string(), "/usr/bin/x"),
            Content::file(b.to_string_lossy().to_string(), "/usr/bin/x"),
        ]);
        let env = HashMap::new();
        let err = prepare(&info, "deb", &env).unwrap_err();
        assert!(matches!(
            err,
            PkgError::Content(ContentError::ContentConflict(_))
        ));
    }

    #[test]
    fn missing_glob_source_is_an_error() {
        let info = minimal_info(vec![Content::file("/no/such/path-*", "/usr/bin/x")]);
        let env = HashMap::new();
        let err = prepare(&info, "deb", &env).unwrap_err();
        assert!(matches!(
            err,
            PkgError::Content(ContentError::ContentMissing(_))
        ));
    }

    #[test]
    fn implicit_dir_is_superseded_by_explicit_dir() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        std::fs::write(&a, "a").unwrap();

        let mut explicit_dir = Content::file(String::new(), "/usr/bin");
        explicit_dir.r#type = ContentType::Dir;
        explicit_dir.file_info = Some(FileInfo {
            mode: Some(0o750),
            ..Default::default()
        });

        let info = minimal_info(vec![
            Content::file(a.to_string_lossy().to_string(), "/usr/bin/x"),
            explicit_dir,
        ]);
        let env = HashMap::new();
        let result = prepare(&info, "deb", &env).unwrap();
        let dir_entry = result.iter().find(|c| c.destination == "/usr/bin").unwrap();
        assert_eq!(dir_entry.r#type, ContentType::Dir);
    }

    #[test]
    fn destination_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        std::fs::write(&a, "a").unwrap();
        let info = minimal_info(vec![Content::file(
            a.to_string_lossy().to_string(),
            "/usr/../../etc/passwd",
        )]);
        let env = HashMap::new();
        let err = prepare(&info, "deb", &env).unwrap_err();
        assert!(matches!(
            err,
            PkgError::Content(ContentError::ContentEscapesRoot(_))
        ));
    }
}
