//! Metadata tables: one row per segment with a numeric id and a display name.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;
use precomputed::MeshEntry;

/// Which columns of the table to use.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Lines to drop before the header row.
    pub skip_rows: usize,
    pub id_column: String,
    pub name_column: String,
    /// Column holding the source file. Without it the source is `<mesh_dir>/<name>.obj`.
    pub path_column: Option<String>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            skip_rows: 1,
            id_column: "Nr".to_string(),
            name_column: "Material".to_string(),
            path_column: None,
        }
    }
}

pub fn read_table(path: &Path, opts: &TableOptions, mesh_dir: &Path) -> Result<Vec<MeshEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening table {}", path.display()))?;

    parse_table(file, opts, mesh_dir).with_context(|| format!("reading table {}", path.display()))
}

pub fn parse_table<R: Read>(
    reader: R,
    opts: &TableOptions,
    mesh_dir: &Path,
) -> Result<Vec<MeshEntry>> {
    // Title rows are CSV records too: a quoted title may span several lines.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records().skip(opts.skip_rows);

    let headers = match records.next() {
        Some(record) => record?,
        None => bail!("no header row after skipping {} rows", opts.skip_rows),
    };
    let column = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).with_context(|| {
            format!(
                "column '{}' not found (have: {})",
                name,
                headers.iter().collect::<Vec<_>>().join(", ")
            )
        })
    };

    let id_col = column(&opts.id_column)?;
    let name_col = column(&opts.name_column)?;
    let path_col = opts.path_column.as_deref().map(column).transpose()?;

    let mut entries = Vec::new();
    for record in records {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_id = record.get(id_col).unwrap_or("");
        let name = record.get(name_col).unwrap_or("");

        if raw_id.is_empty() && name.is_empty() {
            debug!("Skipping blank table line {}", line);
            continue;
        }

        let id: u64 = match raw_id.parse() {
            Ok(id) => id,
            Err(_) => bail!("line {}: '{}' is not a segment id", line, raw_id),
        };

        if name.is_empty() {
            bail!("line {}: segment {} has no name", line, id);
        }

        let source = match path_col.and_then(|c| record.get(c)).filter(|p| !p.is_empty()) {
            Some(p) => mesh_dir.join(p),
            None => mesh_dir.join(format!("{name}.obj")),
        };

        entries.push(MeshEntry::new(source).with_id(id).with_label(name));
    }

    Ok(entries)
}

/// Resolve the table's source paths that exist on disk. Used for summary logging.
pub fn existing_sources(entries: &[MeshEntry]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|e| e.source.is_file())
        .map(|e| e.source.clone())
        .collect()
}
