mod loader;
mod table;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use precomputed::{BuildConfig, DatasetBuilder, ExtentMode, MeshEntry};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::loader::ObjLoader;
use crate::table::TableOptions;

/// How the dataset's single synthetic scale is sized.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExtentArg {
    /// Bounding maximum of all meshes becomes the resolution of a 1x1x1 volume.
    Derived,
    /// Write --resolution and --volume-size unchanged.
    Fixed,
    /// Multiply --resolution by --volume-size into a 1x1x1 volume.
    Collapsed,
}

impl std::fmt::Display for ExtentArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtentArg::Derived => "derived",
            ExtentArg::Fixed => "fixed",
            ExtentArg::Collapsed => "collapsed",
        };

        f.write_str(s)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "obj2precomputed", version)]
struct Args {
    /// Path of the precomputed dataset to create
    output: PathBuf,

    /// Mesh files (.obj or .zip) or directories to scan for them
    meshes: Vec<PathBuf>,

    /// CSV table listing segment ids and names; replaces the positional mesh list
    #[arg(long, requires = "mesh_dir")]
    table: Option<PathBuf>,

    /// Directory holding the meshes named in --table
    #[arg(long)]
    mesh_dir: Option<PathBuf>,

    /// Lines before the header row of --table
    #[arg(long, default_value_t = 1)]
    table_skip_rows: usize,

    #[arg(long, default_value = "Nr")]
    id_column: String,

    #[arg(long, default_value = "Material")]
    name_column: String,

    /// Column with a mesh path relative to --mesh-dir (default: `<name>.obj`)
    #[arg(long)]
    path_column: Option<String>,

    /// Initial ID for meshes
    #[arg(long, default_value_t = 1)]
    initial_id: u64,

    #[arg(long, value_enum, default_value_t = ExtentArg::Derived)]
    extent: ExtentArg,

    /// Voxel resolution (full res), for --extent fixed|collapsed
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [4.0, 4.0, 40.0])]
    resolution: Vec<f64>,

    /// Extent of segmentation (full res), for --extent fixed|collapsed
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [248832, 134144, 7063])]
    volume_size: Vec<u64>,

    /// Encode and write meshes in parallel (ids are unique but not in input order)
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Read every fragment back after writing and check it decodes
    #[arg(long, default_value_t = false)]
    verify: bool,
}

impl Args {
    fn extent_mode(&self) -> Result<ExtentMode> {
        let resolution: [f64; 3] = self
            .resolution
            .as_slice()
            .try_into()
            .context("--resolution takes exactly three values")?;
        let volume_size: [u64; 3] = self
            .volume_size
            .as_slice()
            .try_into()
            .context("--volume-size takes exactly three values")?;

        Ok(match self.extent {
            ExtentArg::Derived => ExtentMode::Derived,
            ExtentArg::Fixed => ExtentMode::Fixed {
                resolution,
                volume_size,
            },
            ExtentArg::Collapsed => ExtentMode::Collapsed {
                resolution,
                volume_size,
            },
        })
    }

    fn table_options(&self) -> TableOptions {
        TableOptions {
            skip_rows: self.table_skip_rows,
            id_column: self.id_column.clone(),
            name_column: self.name_column.clone(),
            path_column: self.path_column.clone(),
        }
    }
}

fn is_mesh_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("obj") || s.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Expand directories into the `.obj`/`.zip` files below them, sorted by path.
fn collect_mesh_paths(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }

        let before = paths.len();
        for entry in WalkDir::new(input)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if entry.file_type().is_file() && is_mesh_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        info!(
            "{}: found {} mesh files",
            input.display(),
            paths.len() - before
        );
    }

    paths
}

/// One entry per mesh file, labelled with the file's base name.
fn list_entries(paths: &[PathBuf]) -> Vec<MeshEntry> {
    paths
        .iter()
        .map(|path| {
            let entry = MeshEntry::new(path);
            match path.file_name() {
                Some(name) => entry.with_label(name.to_string_lossy()),
                None => entry,
            }
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let entries = match (&args.table, &args.mesh_dir) {
        (Some(table_path), Some(mesh_dir)) => {
            if !args.meshes.is_empty() {
                bail!("--table and positional mesh files are mutually exclusive");
            }

            let entries = table::read_table(table_path, &args.table_options(), mesh_dir)?;
            info!(
                "{}: {} rows, {} with a mesh file",
                table_path.display(),
                entries.len(),
                table::existing_sources(&entries).len()
            );
            entries
        }
        (Some(_), None) => bail!("--table requires --mesh-dir"),
        (None, _) => {
            if args.meshes.is_empty() {
                bail!("no meshes given (pass mesh files, directories, or --table)");
            }
            list_entries(&collect_mesh_paths(&args.meshes))
        }
    };

    let config = BuildConfig {
        root: args.output.clone(),
        extent: args.extent_mode()?,
        initial_id: args.initial_id,
        parallel: args.parallel,
        verify_fragments: args.verify,
    };

    info!(
        "Building {} from {} entries (extent: {})",
        config.root.display(),
        entries.len(),
        args.extent
    );

    let report = DatasetBuilder::new(config)
        .build(&entries, &ObjLoader)
        .with_context(|| format!("building dataset {}", args.output.display()))?;

    for path in &report.skipped {
        warn!("Skipped missing mesh {}", path.display());
    }

    info!(
        "Wrote {} segments ({} labelled) to {}",
        report.segments.len(),
        report.labels,
        args.output.display()
    );

    Ok(())
}
