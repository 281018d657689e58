//! OSRM dataset preparation for an office's service territory.
//!
//! Downloads the Geofabrik extract covering the territory and runs the
//! OSRM preprocessing pipeline in Docker, so integration tests and local
//! setups can stand up a routing backend from nothing but a region path.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// The map extract covering an office's service territory.
#[derive(Debug, Clone)]
pub struct ServiceTerritory {
    /// Geofabrik region path, e.g. "north-america/us/nevada".
    pub geofabrik_path: String,
}

impl ServiceTerritory {
    pub fn new(geofabrik_path: impl Into<String>) -> Self {
        Self {
            geofabrik_path: geofabrik_path.into(),
        }
    }

    /// Last path segment, used for local file names.
    pub fn name(&self) -> String {
        self.geofabrik_path
            .split('/')
            .next_back()
            .unwrap_or("territory")
            .to_string()
    }

    pub fn download_url(&self) -> String {
        format!(
            "https://download.geofabrik.de/{}-latest.osm.pbf",
            self.geofabrik_path
        )
    }
}

/// OSRM preprocessing pipeline flavor. The table service used for travel
/// matrices requires MLD.
#[derive(Debug, Clone, Copy)]
pub enum OsrmPrepMode {
    Mld,
}

#[derive(Debug, Clone)]
pub struct OsrmDatasetConfig {
    pub territory: ServiceTerritory,
    pub data_root: PathBuf,
    pub mode: OsrmPrepMode,
}

impl OsrmDatasetConfig {
    pub fn new(territory: ServiceTerritory, data_root: impl Into<PathBuf>) -> Self {
        Self {
            territory,
            data_root: data_root.into(),
            mode: OsrmPrepMode::Mld,
        }
    }
}

/// Paths of a prepared dataset, ready to mount into `osrm-routed`.
#[derive(Debug, Clone)]
pub struct OsrmDataset {
    pub data_dir: PathBuf,
    pub osrm_base: PathBuf,
    pub pbf_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum OsrmDataError {
    #[error("io failure: {0}")]
    Io(#[from] io::Error),
    #[error("download failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("preprocessing failure: {0}")]
    ProcessFailure(String),
}

impl OsrmDataset {
    /// Downloads and preprocesses the territory's extract if any piece
    /// is missing. Completed steps are detected by their output files
    /// and skipped, so repeated calls are cheap.
    pub fn ensure(config: &OsrmDatasetConfig) -> Result<Self, OsrmDataError> {
        let territory_name = config.territory.name();
        let data_root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let data_dir = data_root.join(&territory_name);
        fs::create_dir_all(&data_dir)?;

        let pbf_path = data_dir.join(format!("{territory_name}-latest.osm.pbf"));
        if !pbf_path.exists() {
            tracing::debug!(territory = %territory_name, "downloading map extract");
            download_pbf(&config.territory.download_url(), &pbf_path)?;
        }

        let osrm_base = data_dir.join(format!("{territory_name}-latest.osrm"));
        if !osrm_base.exists() {
            tracing::debug!(territory = %territory_name, "extracting road network");
            run_docker(
                &[
                    "osrm-extract",
                    "-p",
                    "/opt/car.lua",
                    &format!("/data/{}", file_name(&pbf_path)),
                ],
                &data_dir,
            )?;
        }

        match config.mode {
            OsrmPrepMode::Mld => {
                if !mld_ready(&osrm_base) {
                    tracing::debug!(territory = %territory_name, "partitioning road network");
                    run_docker(
                        &["osrm-partition", &format!("/data/{}", file_name(&osrm_base))],
                        &data_dir,
                    )?;
                    run_docker(
                        &["osrm-customize", &format!("/data/{}", file_name(&osrm_base))],
                        &data_dir,
                    )?;
                }
            }
        }

        Ok(Self {
            data_dir,
            osrm_base,
            pbf_path,
        })
    }
}

fn download_pbf(url: &str, dest: &Path) -> Result<(), OsrmDataError> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let tmp_path = dest.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    let bytes = response.bytes()?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    fs::rename(tmp_path, dest)?;
    Ok(())
}

fn mld_ready(osrm_base: &Path) -> bool {
    let partition = osrm_base.with_extension("osrm.partition");
    let mldgr = osrm_base.with_extension("osrm.mldgr");
    let cells = osrm_base.with_extension("osrm.cells");
    osrm_base.exists() && partition.exists() && mldgr.exists() && cells.exists()
}

fn run_docker(args: &[&str], data_dir: &Path) -> Result<(), OsrmDataError> {
    let status = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-t")
        .arg("-v")
        .arg(format!("{}:/data", data_dir.display()))
        .arg("osrm/osrm-backend")
        .args(args)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(OsrmDataError::ProcessFailure(format!(
            "docker exited with status {status}"
        )))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}
