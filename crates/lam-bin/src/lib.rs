//! Shared startup scaffolding for the laminar driver binaries.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Positional argument grammar shared by all three entry points.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Input graph (GraphML).
    pub input: PathBuf,
    /// Directory receiving the emitted artifacts.
    pub output_dir: PathBuf,
    /// Design name used for emitted file names.
    pub design_name: String,
    /// Optional options file (defaults to `laminar.toml` next to the input).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Input dialect: `native` or `vendor`.
    #[arg(long = "dialect", default_value = "vendor")]
    pub dialect: String,
}

impl CommonArgs {
    pub fn dialect(&self) -> Result<core_graphml::Dialect> {
        match self.dialect.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(core_graphml::Dialect::Native),
            "vendor" | "vendor-export" => Ok(core_graphml::Dialect::VendorExport),
            other => anyhow::bail!("unknown dialect `{other}`"),
        }
    }
}

/// Install file logging (`<tool>.log` in the working directory) with an
/// EnvFilter so `RUST_LOG` controls verbosity.  The returned guard must stay
/// alive for the process lifetime.
pub fn configure_logging(tool: &str) -> Result<WorkerGuard> {
    let log_name = format!("{tool}.log");
    let log_path = Path::new(".").join(&log_name);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(".", log_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(nb_writer).with_ansi(false))
        .init();

    install_panic_hook();
    tracing::info!(target: "runtime", tool, "startup");
    Ok(guard)
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(target: "runtime", panic = %info, "panic");
        previous(info);
    }));
}

/// Print the error chain to stderr and convert to the documented exit code.
pub fn exit_with(result: Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
