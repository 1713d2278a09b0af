use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use markups_backend::codec::CodecRegistry;
use markups_backend::config::StorageConfig;
use markups_backend::diagnostic::prelude::{DiagnosticContext, DiagnosticLevel};
use markups_backend::markup::{CoordinateSystem, MarkupsNode};
use markups_backend::storage::MarkupsJsonStorageNode;
use miette::{bail, Context, IntoDiagnostic};
use tracing::{error, info};
use tracing_panic::panic_hook;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Inspects, validates and converts markups JSON files
#[derive(Debug, Parser)]
struct Args {
    /// Path to the storage configuration file
    #[arg(short, long, env = "MARKUPS_CONFIG", global = true)]
    config: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints a summary of every markup in the file
    Inspect { file: Utf8PathBuf },
    /// Checks that files can be loaded, printing all warnings
    Validate {
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },
    /// Loads markups and saves them again with the configured settings
    Convert {
        input: Utf8PathBuf,
        output: Utf8PathBuf,
        /// Coordinate system of the written file
        #[arg(long)]
        coordinate_system: Option<CoordinateSystem>,
    },
}

pub fn main() -> miette::Result<()> {
    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::Layer::default().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env());

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .context("failed to install tracing subscriber")?;

    color_backtrace::install();
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        panic_hook(panic_info);
        prev_hook(panic_info);
    }));

    let Args { config, command } = Args::parse();

    m_try(|| {
        let config = match &config {
            Some(path) => StorageConfig::load(path)?,
            None => StorageConfig::default(),
        };
        let registry = CodecRegistry::with_default_codecs();

        match command {
            Command::Inspect { file } => inspect(&registry, config, &file),
            Command::Validate { files, strict } => validate(&registry, config, &files, strict),
            Command::Convert {
                input,
                output,
                coordinate_system,
            } => convert(&registry, config, &input, &output, coordinate_system),
        }
    })
    .context("markups tool failed")
}

fn inspect(registry: &CodecRegistry, config: StorageConfig, file: &Utf8Path) -> miette::Result<()> {
    let mut storage = MarkupsJsonStorageNode::new(registry, config);
    let nodes = storage.read_all_file(Some(file))?;

    for node in &nodes {
        println!("{}", summary(node));
    }
    print_diagnostics(storage.diagnostics());

    Ok(())
}

fn validate(
    registry: &CodecRegistry,
    config: StorageConfig,
    files: &[Utf8PathBuf],
    strict: bool,
) -> miette::Result<()> {
    let mut storage = MarkupsJsonStorageNode::new(registry, config);
    let mut failed = 0;

    for file in files {
        match storage.read_all_file(Some(file.as_path())) {
            Ok(nodes) => info!(%file, count = nodes.len(), "file is valid"),
            Err(err) => {
                failed += 1;
                error!(%file, "file is invalid");
                eprintln!("{err:?}");
            }
        }
    }
    print_diagnostics(storage.diagnostics());

    if failed > 0 {
        bail!("{failed} of {} files failed validation", files.len());
    }
    if strict && storage.diagnostics().has_diagnostics(DiagnosticLevel::Warning) {
        bail!("validation produced warnings");
    }
    Ok(())
}

fn convert(
    registry: &CodecRegistry,
    mut config: StorageConfig,
    input: &Utf8Path,
    output: &Utf8Path,
    coordinate_system: Option<CoordinateSystem>,
) -> miette::Result<()> {
    if let Some(cs) = coordinate_system {
        config.coordinate_system = cs;
    }

    let mut storage = MarkupsJsonStorageNode::new(registry, config);
    let nodes = storage.read_all_file(Some(input))?;
    print_diagnostics(storage.diagnostics());

    if nodes.is_empty() {
        bail!("`{input}` contains no supported markups");
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_str().is_empty()) {
        fs_err::create_dir_all(parent)
            .into_diagnostic()
            .context("failed to create output directory")?;
    }
    storage.write_file(Some(output), &nodes)
}

fn summary(node: &MarkupsNode) -> String {
    let mut line = format!(
        "{} `{}`: {} control points",
        node.markup_type(),
        node.name,
        node.control_points.len()
    );
    if let Some(plane) = node.as_plane() {
        line += &format!(
            ", {} plane at {} normal {}, size {} ({})",
            plane.plane_type,
            plane.origin,
            plane.normal(),
            plane.size.iter().join("x"),
            plane.size_mode,
        );
    }
    line
}

fn print_diagnostics(diagnostics: &DiagnosticContext) {
    for (ident, path, diagnostic) in diagnostics.iter() {
        eprintln!("{}: {ident}@{path}: {}", diagnostic.level, diagnostic.info);
    }
}

/// Helper for wrapping a code block to help with contextualizing errors
/// Better editor support but slightly worse ergonomic than a macro
#[inline(always)]
pub(crate) fn m_try<T>(func: impl FnOnce() -> miette::Result<T>) -> miette::Result<T> {
    func()
}
