use anyhow::{anyhow, Context, Result};
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;

/// Serialize the merged header followed by the data rows.
///
/// Rows are joined by `\n` with no trailing terminator.
pub fn render_document(header: &[String], body: &[Vec<String>], delimiter: char) -> String {
    let sep = delimiter.to_string();
    let mut out = String::with_capacity(estimate_len(header, body));
    out.push_str(&header.join(&sep));
    for row in body {
        out.push('\n');
        out.push_str(&row.join(&sep));
    }
    out
}

fn estimate_len(header: &[String], body: &[Vec<String>]) -> usize {
    let row_len = |row: &[String]| row.iter().map(|f| f.len() + 1).sum::<usize>();
    row_len(header) + body.iter().map(|r| row_len(r)).sum::<usize>()
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Replace `path` with `contents` via a sibling temp file and a rename, so a
/// failed write leaves the original untouched. The target keeps its existing
/// permissions; a new file gets `0644` on unix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    let perms = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(perms) = perms {
        tmp.as_file()
            .set_permissions(perms)
            .with_context(|| format!("setting permissions for {}", path.display()))?;
    }
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("syncing temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| anyhow!("renaming temp file over {}: {}", path.display(), e.error))?;
    Ok(())
}
