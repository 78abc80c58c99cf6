use anyhow::{Context, Result};
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Collects files under `root` whose extension is in `extensions`, honouring
/// .gitignore and skipping build output directories.
pub fn collect_source_files(
    root: &Path,
    extensions: &[String],
    exclude_dirs: &[&Path],
) -> Result<Vec<PathBuf>> {
    info!("Collecting source files from: {:?}", root);

    let mut ovr = OverrideBuilder::new(root);
    let default_excludes = [
        "!**/.git/**",
        "!**/node_modules/**",
        "!**/target/**",
    ];
    for exclude in default_excludes {
        ovr.add(exclude)
            .with_context(|| format!("invalid exclude pattern {exclude}"))?;
    }
    let overrides = ovr.build().context("failed to build scan overrides")?;

    let wanted: HashSet<&str> = extensions.iter().map(String::as_str).collect();
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .overrides(overrides)
        .build();

    let mut paths = Vec::new();
    for dent in walker {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };

        let path = dent.path();
        if !path.is_file() || exclude_dirs.iter().any(|dir| path.starts_with(dir)) {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if wanted.contains(ext) => paths.push(path.to_path_buf()),
            _ => {}
        }
    }

    paths.sort();
    debug!("Collected {} files", paths.len());
    Ok(paths)
}

/// Output locations to leave out of a scan. An output directory that is the
/// project root (or one of its ancestors) excludes nothing.
pub fn output_exclusions<'a>(root: &Path, out: &'a Path) -> Vec<&'a Path> {
    if root.starts_with(out) {
        Vec::new()
    } else {
        vec![out]
    }
}
