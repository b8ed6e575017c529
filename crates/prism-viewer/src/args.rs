use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use url::Url;

use prism_engine::camera::{Lens, Projection, ProjectionKind};

/// Command-line options.
#[derive(Parser, Debug)]
#[command(version, about = "Interactive viewer for prism scene files")]
pub struct Args {
    /// Scene file: a path or a file:// URL. Empty shows the background only.
    #[arg(default_value = "")]
    pub source: String,

    /// Initial window width (logical pixels)
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Initial window height (logical pixels)
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    #[arg(long, value_enum, default_value_t = ProjectionArg::Perspective)]
    pub projection: ProjectionArg,

    /// Vertical field of view in degrees (perspective only)
    #[arg(long, default_value_t = Projection::DEFAULT_FOV_Y_DEGREES)]
    pub fov: f32,

    #[arg(long, default_value_t = 0.01)]
    pub near: f32,

    #[arg(long, default_value_t = 100.0)]
    pub far: f32,

    /// Mouse-look speed, in fractions of the field of view per pixel
    #[arg(long, default_value_t = 5e-3)]
    pub look_speed: f32,

    /// Fly speed in scene units per second
    #[arg(long, default_value_t = 2.0)]
    pub linear_speed: f32,

    /// Redraw continuously instead of on change
    #[arg(long)]
    pub auto_refresh: bool,

    /// Log filter (env_logger syntax); overrides RUST_LOG
    #[arg(long)]
    pub log: Option<String>,
}

#[derive(ValueEnum, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProjectionArg {
    Perspective,
    Orthographic,
    Frustum,
}

impl From<ProjectionArg> for ProjectionKind {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::Perspective => ProjectionKind::Perspective,
            ProjectionArg::Orthographic => ProjectionKind::Orthographic,
            ProjectionArg::Frustum => ProjectionKind::Frustum,
        }
    }
}

impl Args {
    /// Lens described by the projection options.
    pub fn lens(&self) -> Lens {
        let mut projection = Projection::with_kind(self.projection.into());
        if let Projection::Perspective { fov_y_degrees, .. } = &mut projection {
            *fov_y_degrees = self.fov;
        }
        Lens {
            projection,
            near: self.near,
            far: self.far,
        }
    }

    /// Source reference in the form the engine takes.
    pub fn source_reference(&self) -> Result<String> {
        source_reference(&self.source)
    }
}

/// Turns a command-line source into an engine source reference.
///
/// Anything with a URL scheme is passed through for the engine to validate. Plain paths
/// become absolute `file://` URLs; a missing file is left for the engine to report.
pub fn source_reference(source: &str) -> Result<String> {
    if source.is_empty() || source.contains("://") {
        return Ok(source.to_owned());
    }
    let path = std::path::absolute(Path::new(source))
        .with_context(|| format!("unable to resolve path {source:?}"))?;
    let path = path.canonicalize().unwrap_or(path);
    let url = Url::from_file_path(&path)
        .map_err(|()| anyhow::anyhow!("path {} cannot be expressed as a file URL", path.display()))?;
    Ok(url.into())
}
