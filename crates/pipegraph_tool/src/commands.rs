// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand handlers.

use crate::cli::{Cli, Command};
use pipegraph_core::nodes::builtin_registry;
use pipegraph_core::session;
use pipegraph_core::settings::SETTINGS_FILE_NAME;
use pipegraph_core::{
    CycleError, Graph, GraphSettings, LoadReport, NodeRegistry, RegistryError, SessionDocument,
    SessionError, SessionFormat, SettingsError,
};
use std::io::Write;
use std::path::Path;

/// Result of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report
    Clean,
    /// The input had problems worth a non-zero exit
    Problems,
}

/// Tool failure
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Settings could not be loaded
    #[error("Failed to load settings {path}: {source}")]
    Settings {
        /// Settings path
        path: String,
        /// Cause
        source: SettingsError,
    },

    /// Session could not be read or written
    #[error("{path}: {source}")]
    Session {
        /// Session path
        path: String,
        /// Cause
        source: SessionError,
    },

    /// Built-in node types failed to register
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Graph has a cycle
    #[error("{path}: {source}")]
    Cycle {
        /// Session path
        path: String,
        /// Cause
        source: CycleError,
    },

    /// Writing output failed
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the parsed command, writing results to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<Outcome, ToolError> {
    let settings = load_settings(cli.settings.as_deref())?;
    let registry = builtin_registry()?;

    match &cli.command {
        Command::Check { file } => check(file, &settings, &registry, out),
        Command::Convert { input, output } => convert(input, output, &settings, &registry, out),
        Command::Types { namespace } => types(&registry, namespace.as_deref(), out),
        Command::Order { file } => order(file, &settings, &registry, out),
        Command::Merge { base, other, output } => {
            merge(base, other, output, &settings, &registry, out)
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<GraphSettings, ToolError> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(SETTINGS_FILE_NAME), false),
    };
    if !required && !path.exists() {
        return Ok(GraphSettings::default());
    }
    GraphSettings::load(path).map_err(|source| ToolError::Settings {
        path: path.display().to_string(),
        source,
    })
}

fn format_for(path: &Path, settings: &GraphSettings) -> SessionFormat {
    SessionFormat::from_extension(path).unwrap_or(settings.default_format)
}

fn read_document(path: &Path, settings: &GraphSettings) -> Result<SessionDocument, ToolError> {
    let session_error = |source: SessionError| ToolError::Session {
        path: path.display().to_string(),
        source,
    };
    let text = std::fs::read_to_string(path).map_err(|e| session_error(e.into()))?;
    session::from_str(&text, format_for(path, settings)).map_err(session_error)
}

fn write_graph(graph: &Graph, path: &Path, settings: &GraphSettings) -> Result<(), ToolError> {
    let session_error = |source: SessionError| ToolError::Session {
        path: path.display().to_string(),
        source,
    };
    let text = session::to_string(&session::serialize(graph), format_for(path, settings))
        .map_err(session_error)?;
    std::fs::write(path, text).map_err(|e| session_error(e.into()))
}

fn load_graph(
    path: &Path,
    settings: &GraphSettings,
    registry: &NodeRegistry,
) -> Result<(Graph, LoadReport), ToolError> {
    let document = read_document(path, settings)?;
    let name = path
        .file_stem()
        .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned());
    let mut graph = Graph::new(name).with_options(settings.validation_options());
    let report = session::deserialize(&mut graph, registry, &document);
    tracing::debug!(
        "{}: {} nodes, {} connections",
        path.display(),
        report.created.len(),
        report.connected
    );
    Ok((graph, report))
}

fn check(
    file: &Path,
    settings: &GraphSettings,
    registry: &NodeRegistry,
    out: &mut impl Write,
) -> Result<Outcome, ToolError> {
    let (_, report) = load_graph(file, settings, registry)?;
    writeln!(
        out,
        "{}: {} nodes, {} connections",
        file.display(),
        report.created.len(),
        report.connected
    )?;
    for entry in &report.skipped {
        writeln!(out, "  skipped {entry}")?;
    }

    if report.is_clean() {
        Ok(Outcome::Clean)
    } else {
        Ok(Outcome::Problems)
    }
}

fn convert(
    input: &Path,
    output: &Path,
    settings: &GraphSettings,
    registry: &NodeRegistry,
    out: &mut impl Write,
) -> Result<Outcome, ToolError> {
    let (graph, report) = load_graph(input, settings, registry)?;
    for entry in &report.skipped {
        tracing::warn!("{}: dropped {entry}", input.display());
    }

    write_graph(&graph, output, settings)?;
    writeln!(out, "{} -> {}", input.display(), output.display())?;
    Ok(Outcome::Clean)
}

fn types(
    registry: &NodeRegistry,
    namespace: Option<&str>,
    out: &mut impl Write,
) -> Result<Outcome, ToolError> {
    let selected = registry
        .types()
        .filter(|t| namespace.map_or(true, |ns| t.namespace() == ns));
    for node_type in selected {
        match &node_type.alias {
            Some(alias) => writeln!(
                out,
                "{} ({}, alias {alias})",
                node_type.type_tag, node_type.display_name
            )?,
            None => writeln!(out, "{} ({})", node_type.type_tag, node_type.display_name)?,
        }
    }
    Ok(Outcome::Clean)
}

fn order(
    file: &Path,
    settings: &GraphSettings,
    registry: &NodeRegistry,
    out: &mut impl Write,
) -> Result<Outcome, ToolError> {
    let (graph, report) = load_graph(file, settings, registry)?;
    let ids = graph.topological_order().map_err(|source| ToolError::Cycle {
        path: file.display().to_string(),
        source,
    })?;
    for id in ids {
        if let Some(node) = graph.node(id) {
            writeln!(out, "{} {}", id, node.name)?;
        }
    }

    if report.is_clean() {
        Ok(Outcome::Clean)
    } else {
        Ok(Outcome::Problems)
    }
}

fn merge(
    base: &Path,
    other: &Path,
    output: &Path,
    settings: &GraphSettings,
    registry: &NodeRegistry,
    out: &mut impl Write,
) -> Result<Outcome, ToolError> {
    let (mut graph, base_report) = load_graph(base, settings, registry)?;
    let document = read_document(other, settings)?;
    let pasted = session::paste(&mut graph, registry, &document, settings.duplicate_offset);

    for (path, report) in [(base, &base_report), (other, &pasted)] {
        for entry in &report.skipped {
            writeln!(out, "  {}: skipped {entry}", path.display())?;
        }
    }
    write_graph(&graph, output, settings)?;
    writeln!(
        out,
        "{} + {} -> {}: {} nodes pasted",
        base.display(),
        other.display(),
        output.display(),
        pasted.created.len()
    )?;

    if base_report.is_clean() && pasted.is_clean() {
        Ok(Outcome::Clean)
    } else {
        Ok(Outcome::Problems)
    }
}
