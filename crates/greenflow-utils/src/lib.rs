//! Utilities for interfacing with greenflow: platform files in, report files out.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use greenflow_core::{
    EnergyReport, Host, JobDescriptor, Link, Platform, RouteKeyFormat, SimOpts, Transfer,
};

/// Reads a [`Platform`] from a file containing a [`PlatformSpec`] in JSON or Dhall format.
pub fn read_platform(path: impl AsRef<Path>) -> Result<Platform, Error> {
    let spec = read_platform_spec(path)?;
    Ok(Platform::new(&spec.hosts, &spec.links)?)
}

/// Reads a [`PlatformSpec`] from a file in JSON or Dhall format.
pub fn read_platform_spec(path: impl AsRef<Path>) -> Result<PlatformSpec, Error> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let spec: PlatformSpec = match path.as_ref().extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        Some("dhall") => serde_dhall::from_str(&contents).parse().map_err(Box::new)?,
        _ => return Err(Error::UnknownFileType(path.as_ref().into())),
    };
    Ok(spec)
}

/// Writes `report` into `dir`, creating the directory if needed. An existing report for the
/// same route and job is overwritten. Returns the path written to.
pub fn write_report(dir: impl AsRef<Path>, report: &EnergyReport) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(dir.as_ref())?;
    let path = dir.as_ref().join(report.file_name());
    std::fs::write(&path, report.to_json()?)?;
    log::info!("Wrote report to {}", path.display());
    Ok(path)
}

/// Simulates `job` on the platform stored at `path`. The route is resolved from the path itself
/// according to `format`.
pub fn run_from_file(
    path: impl AsRef<Path>,
    format: &RouteKeyFormat,
    job: JobDescriptor,
    opts: SimOpts,
) -> Result<EnergyReport, Error> {
    let path = path.as_ref();
    // Resolve the route first so a malformed path fails before the platform is parsed
    let route = format
        .resolve(&path.to_string_lossy())
        .map_err(greenflow_core::Error::from)?;
    log::info!("Node name: {}", route.key());
    let platform = read_platform(path)?;
    let transfer = Transfer::builder()
        .platform(Arc::new(platform))
        .route(route)
        .job(job)
        .opts(opts)
        .build();
    Ok(greenflow_core::run(transfer)?)
}

/// A platform specification.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct PlatformSpec {
    /// Hosts and routers.
    pub hosts: Vec<Host>,
    /// Links.
    pub links: Vec<Link>,
}

/// Error kinds for platform files, transfers, and I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown file type.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// Error serializing/deserializing Dhall.
    #[error("Dhall error")]
    Dhall(#[from] Box<serde_dhall::Error>),

    /// Error serializing/deserializing JSON.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),

    /// Error constructing a valid platform.
    #[error("invalid platform")]
    Platform(#[from] greenflow_core::PlatformError),

    /// Error running the transfer.
    #[error(transparent)]
    Run(#[from] greenflow_core::Error),
}
