//! Writing exports to disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::svg_tree::SvgDocument;
use super::{ExportError, ExportFormat, ExportedFile};

/// Longest file stem produced by [`derive_filename`].
const MAX_STEM_LEN: usize = 64;

/// File stem for an exported diagram: the root `id`, else its `<title>`,
/// else `fallback`.
pub fn derive_filename(svg: &str, fallback: &str) -> String {
    let candidates = match SvgDocument::parse(svg) {
        Ok(doc) => vec![doc.root.attr("id").map(str::to_string), doc.title()],
        Err(_) => Vec::new(),
    };
    candidates
        .into_iter()
        .flatten()
        .map(|name| sanitize_stem(&name))
        .find(|stem| !stem.is_empty())
        .unwrap_or_else(|| {
            let stem = sanitize_stem(fallback);
            if stem.is_empty() {
                "image".to_string()
            } else {
                stem
            }
        })
}

/// Keep ASCII alphanumerics, `-` and `_`; collapse everything else to `-`.
fn sanitize_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            stem.push(c);
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_matches('-');
    stem.chars().take(MAX_STEM_LEN).collect()
}

/// First `stem.ext`, `stem-1.ext`, ... that does not exist in `dir`.
fn unique_path(dir: &Path, stem: &str, format: ExportFormat) -> PathBuf {
    let ext = format.extension();
    let mut path = dir.join(format!("{stem}.{ext}"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.{ext}"));
        n += 1;
    }
    path
}

/// Write `bytes` to a new file in `dir`.
///
/// Data goes to a scratch file in the same directory first, which is then
/// moved into place without replacing existing files. The scratch file is
/// removed if any step fails.
pub fn save_export(
    bytes: &[u8],
    dir: &Path,
    stem: &str,
    format: ExportFormat,
) -> Result<ExportedFile, ExportError> {
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    let path = unique_path(dir, stem, format);
    temp.persist_noclobber(&path).map_err(|e| e.error)?;

    crate::debug_info!(
        "EXPORT",
        "Saved {} export to {} ({} bytes)",
        format,
        path.display(),
        bytes.len()
    );
    Ok(ExportedFile {
        path,
        format,
        bytes_written: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_prefers_id_then_title() {
        assert_eq!(
            derive_filename("<svg id=\"flow chart\"><title>T</title></svg>", "image"),
            "flow-chart"
        );
        assert_eq!(
            derive_filename("<svg><title>Login / Flow</title></svg>", "image"),
            "Login-Flow"
        );
        assert_eq!(derive_filename("<svg width=\"1\"/>", "image"), "image");
        assert_eq!(derive_filename("not svg", "diagram"), "diagram");
        assert_eq!(derive_filename("<svg id=\"???\"/>", "%%"), "image");
    }

    #[test]
    fn test_save_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = save_export(b"one", dir.path(), "chart", ExportFormat::Svg).unwrap();
        let second = save_export(b"two", dir.path(), "chart", ExportFormat::Svg).unwrap();

        assert_eq!(first.path, dir.path().join("chart.svg"));
        assert_eq!(second.path, dir.path().join("chart-1.svg"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"one");
        assert_eq!(second.bytes_written, 3);
    }

    #[test]
    fn test_save_creates_directory_and_leaves_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out/diagrams");
        let file = save_export(b"png", &nested, "d", ExportFormat::Png).unwrap();
        assert_eq!(file.path, nested.join("d.png"));
        let entries: Vec<_> = std::fs::read_dir(&nested).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
