//! Asset fingerprinting.
//!
//! Every non-HTML file in the build folder gets a content-addressed copy
//! (`logo.png` -> `logo.1a2b3c4d.png`). References in stylesheets, scripts
//! and pages are rewritten to the fingerprinted names, and the mapping is
//! written to `rev-manifest.json`. HTML files keep their names.

use super::{fnv1a_hash, read_source, relative, sources, write_output, StageOutput, StageResult};
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ORIGIN: ErrorOrigin = ErrorOrigin::Revision;

pub const MANIFEST_FILE: &str = "rev-manifest.json";

static REVVED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[0-9a-f]{8}\.[^./]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    /// Referenced, never references anything
    Binary,
    /// May reference binaries and other text assets
    Text,
    /// Rewritten in place, never renamed
    Page,
}

fn kind(path: &Path) -> Kind {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("html") | Some("htm") => Kind::Page,
        Some("css") | Some("js") | Some("json") | Some("svg") => Kind::Text,
        _ => Kind::Binary,
    }
}

/// `dir/name.ext` -> `dir/name.<hash8>.ext`
pub fn revved_name(rel: &str, contents: &[u8]) -> String {
    let hash = format!("{:016x}", fnv1a_hash(contents));
    let hash = &hash[..8];
    let (dir, file) = match rel.rfind('/') {
        Some(idx) => (&rel[..=idx], &rel[idx + 1..]),
        None => ("", rel),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}.{}{}", dir, &file[..dot], hash, &file[dot..]),
        _ => format!("{}{}.{}", dir, file, hash),
    }
}

/// The part of a build-relative path used to find references to it: the
/// file name plus its parent directory, which matches both absolute
/// (`/assets/images/a.png`) and stylesheet-relative (`../images/a.png`)
/// references.
fn reference_key(rel: &str) -> &str {
    let mut slashes = rel.rmatch_indices('/');
    slashes.next();
    match slashes.next() {
        Some((idx, _)) => &rel[idx + 1..],
        None => rel,
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

/// Byte offsets of whole-path occurrences of `from` in `text`.
fn reference_positions(text: &str, from: &str) -> Vec<usize> {
    text.match_indices(from)
        .map(|(idx, _)| idx)
        .filter(|&idx| {
            let before = text[..idx].chars().next_back();
            let after = text[idx + from.len()..].chars().next();
            let starts = before.map_or(true, |c| c == '/' || !is_path_char(c));
            // A trailing dot only ends the path when no extension follows it.
            let ends = after.map_or(true, |c| {
                !is_path_char(c)
                    || (c == '.' && !text[idx + from.len() + 1..].starts_with(char::is_alphanumeric))
            });
            starts && ends
        })
        .collect()
}

/// Replace whole-path occurrences of each `from` with its `to`.
pub fn rewrite_references(text: &str, replacements: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (from, to) in replacements {
        let positions = reference_positions(&out, from);
        if positions.is_empty() {
            continue;
        }
        let mut result = String::with_capacity(out.len());
        let mut last = 0;
        for idx in positions {
            result.push_str(&out[last..idx]);
            result.push_str(to);
            last = idx + from.len();
        }
        result.push_str(&out[last..]);
        out = result;
    }
    out
}

/// Order text assets so each one comes after the text assets it references,
/// which lets its fingerprint cover the rewritten names. Assets caught in a
/// reference cycle keep path order at the end.
fn order_text_assets(
    texts: Vec<(Kind, String, PathBuf)>,
) -> Result<Vec<(Kind, String, PathBuf)>, StageError> {
    let mut bodies = Vec::with_capacity(texts.len());
    for (_, _, path) in &texts {
        bodies.push(String::from_utf8_lossy(&read_source(ORIGIN, path)?).into_owned());
    }

    let references: Vec<Vec<usize>> = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            texts
                .iter()
                .enumerate()
                .filter(|(j, (_, rel, _))| {
                    *j != i && !reference_positions(body, reference_key(rel)).is_empty()
                })
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut done = vec![false; texts.len()];
    let mut order = Vec::with_capacity(texts.len());
    loop {
        let ready: Vec<usize> = (0..texts.len())
            .filter(|&i| !done[i] && references[i].iter().all(|&j| done[j]))
            .collect();
        if ready.is_empty() {
            break;
        }
        for i in ready {
            done[i] = true;
            order.push(i);
        }
    }

    let cyclic: Vec<usize> = (0..texts.len()).filter(|&i| !done[i]).collect();
    for &i in &cyclic {
        tracing::warn!(file = %texts[i].1, "reference cycle, some names may stay unrevved");
    }
    order.extend(cyclic);

    let mut slots: Vec<Option<(Kind, String, PathBuf)>> = texts.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

fn rel_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fingerprint the build folder.
pub fn run(ctx: &BuildContext) -> StageResult {
    let build_dest = ctx.paths().build_dest();
    if !build_dest.is_dir() {
        return Err(StageError::new(
            ORIGIN,
            format!("build folder {} does not exist", build_dest.display()),
        ));
    }

    let mut files: Vec<(Kind, String, PathBuf)> = Vec::new();
    for path in sources(ORIGIN, build_dest, &[])? {
        let rel = rel_string(&relative(ORIGIN, build_dest, &path)?);
        if rel == MANIFEST_FILE || REVVED.is_match(&rel) {
            continue;
        }
        files.push((kind(&path), rel, path));
    }
    // Binaries first so text assets can point at their fingerprinted names.
    files.sort();
    let (texts, rest): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| f.0 == Kind::Text);
    let (mut files, pages): (Vec<_>, Vec<_>) = rest.into_iter().partition(|f| f.0 == Kind::Binary);
    files.extend(order_text_assets(texts)?);
    files.extend(pages);

    let mut manifest: BTreeMap<String, String> = BTreeMap::new();
    let mut replacements: Vec<(String, String)> = Vec::new();
    let mut outputs = Vec::new();

    for (kind, rel, path) in &files {
        let contents = read_source(ORIGIN, path)?;
        let contents = match kind {
            Kind::Binary => contents,
            _ => {
                let text = String::from_utf8_lossy(&contents);
                rewrite_references(&text, &replacements).into_bytes()
            }
        };

        if *kind == Kind::Page {
            write_output(ORIGIN, path, &contents)?;
            outputs.push(path.clone());
            continue;
        }

        let revved = revved_name(rel, &contents);
        let dest = build_dest.join(&revved);
        write_output(ORIGIN, &dest, &contents)?;
        outputs.push(dest);

        replacements.push((reference_key(rel).to_string(), reference_key(&revved).to_string()));
        // Longest keys first so `a/b.png` is not clobbered by `b.png`.
        replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        manifest.insert(rel.clone(), revved);
    }

    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| StageError::new(ORIGIN, e.to_string()))?;
    let manifest_path = build_dest.join(MANIFEST_FILE);
    write_output(ORIGIN, &manifest_path, json.as_bytes())?;
    outputs.push(manifest_path);

    tracing::debug!(files = manifest.len(), "fingerprinted assets");
    Ok(StageOutput::written(outputs))
}
