mod args;
mod backend;
mod controller;
mod viewer;

use anyhow::{Context, Result};
use clap::Parser;
use winit::dpi::LogicalSize;

use prism_engine::device::GpuInit;
use prism_engine::logging::{init_logging, LoggingConfig};
use prism_engine::window::{Runtime, RuntimeConfig};

use crate::args::Args;
use crate::viewer::{Viewer, ViewerConfig};

const TITLE: &str = "prism";

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..Default::default()
    });

    let source = args
        .source_reference()
        .with_context(|| format!("invalid source {:?}", args.source))?;

    let viewer = Viewer::new(ViewerConfig {
        title: TITLE.to_string(),
        source,
        lens: args.lens(),
        look_speed: args.look_speed,
        linear_speed: args.linear_speed,
    });

    Runtime::run(
        RuntimeConfig {
            title: TITLE.to_string(),
            initial_size: LogicalSize::new(f64::from(args.width), f64::from(args.height)),
            auto_refresh: args.auto_refresh,
        },
        GpuInit::default(),
        viewer,
    )
}
