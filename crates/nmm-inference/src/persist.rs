use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;
use ndarray_npy::{NpzReader, NpzWriter};
use nmm_core::{Error, Result};

use crate::simulation::{SimulationResult, TrialSummary};

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
        _ => {}
    }
    Ok(())
}

/// Write the four result tables to an uncompressed `.npz` archive.
///
/// Missing parent directories are created. An existing file is replaced.
pub fn save_npz(path: &Path, result: &SimulationResult) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path)?;
    let mut npz = NpzWriter::new(BufWriter::new(file));
    for (key, table) in result.arrays() {
        npz.add_array(key, table)
            .map_err(|e| Error::Npz(format!("writing '{}' to {}: {}", key, path.display(), e)))?;
    }
    let mut writer = npz.finish().map_err(|e| Error::Npz(e.to_string()))?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), "saved result arrays");
    Ok(())
}

/// Read every 2-D `f64` array of an `.npz` archive, keyed by name without
/// the `.npy` suffix.
pub fn load_npz(path: &Path) -> Result<BTreeMap<String, Array2<f64>>> {
    let file = File::open(path)?;
    let mut npz = NpzReader::new(BufReader::new(file)).map_err(|e| Error::Npz(e.to_string()))?;
    let names = npz.names().map_err(|e| Error::Npz(e.to_string()))?;
    let mut out = BTreeMap::new();
    for name in names {
        let arr: Array2<f64> =
            npz.by_name(&name).map_err(|e| Error::Npz(format!("reading '{}': {}", name, e)))?;
        let key = name.strip_suffix(".npy").unwrap_or(&name).to_string();
        out.insert(key, arr);
    }
    Ok(out)
}

/// Write per-trial diagnostics as pretty-printed JSON.
pub fn write_summary_json(path: &Path, trials: &[TrialSummary]) -> Result<()> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(trials)?;
    std::fs::write(path, json)?;
    Ok(())
}
