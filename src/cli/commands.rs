//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{Catalogue, TypeTag};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Execute the parsed command line.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let command = match &cli.command {
        Some(c) => c,
        None => {
            return Err(CliError::Usage(
                "no command given, see `folddoc --help`".to_string(),
            ))
        }
    };

    // completions need no settings
    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "folddoc", &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Run { script, json, out } => cmd_run(&container, script, *json, out.as_deref()),
        Commands::Check { script } => cmd_check(&container, script),
        Commands::Catalogue => cmd_catalogue(&container),
        Commands::Accepts { parent, child } => cmd_accepts(&container, parent, child),
        Commands::Config { command } => cmd_config(&container, command, cli.config.as_deref()),
        Commands::Completion { .. } => Ok(()),
    }
}

#[instrument(level = "debug", skip(container))]
fn cmd_run(
    container: &ServiceContainer,
    script: &Path,
    json: bool,
    out: Option<&Path>,
) -> CliResult<()> {
    let outcome = container.documents.run_file(script)?;
    let tree = outcome.document.to_tree().map_err(ApplicationError::from)?;

    if let Some(path) = out {
        let rendered = serde_json::to_string_pretty(&tree.to_json())
            .map_err(|e| InfraError::io("render tree as JSON", e.into()))?;
        container
            .fs
            .write(path, &rendered)
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
        output::success(&format!("wrote {} nodes to {}", tree.size(), path.display()));
        return Ok(());
    }

    if json {
        output::info(&tree.to_json());
    } else {
        output::info(&tree.to_term_tree(&output::tree_label));
    }
    Ok(())
}

fn cmd_check(container: &ServiceContainer, script: &Path) -> CliResult<()> {
    let outcome = container.documents.check_file(script)?;
    let document = &outcome.document;

    output::success(&format!(
        "{}: {} nodes, {} labels, undo depth {}",
        script.display(),
        document.snapshot().len(),
        outcome.labels.len(),
        document.history().undo_depth()
    ));
    Ok(())
}

fn cmd_catalogue(container: &ServiceContainer) -> CliResult<()> {
    let catalogue = &container.settings.catalogue;
    output::header(&format!(
        "catalogue ({})",
        if catalogue.strict { "strict" } else { "open" }
    ));
    if catalogue.types.is_empty() {
        output::detail(&"no types defined, every pair is accepted");
    }
    for (tag, spec) in &catalogue.types {
        output::info(&format!("{} accepts {}", tag, spec.accepts));
        if let Some(fields) = &spec.fields {
            for (name, default) in fields {
                output::detail(&format!("{} = {}", name, default));
            }
        }
    }
    Ok(())
}

fn cmd_accepts(container: &ServiceContainer, parent: &str, child: &str) -> CliResult<()> {
    let (parent, child) = (TypeTag::from(parent), TypeTag::from(child));
    let catalogue = &container.settings.catalogue;
    debug!("accepts: {} <- {}", parent, child);

    if catalogue.accepts(&parent, &child) {
        output::success(&format!("'{}' accepts '{}'", parent, child));
        Ok(())
    } else {
        output::failure(&format!("'{}' does not accept '{}'", parent, child));
        Err(CliError::NotAccepted { parent, child })
    }
}

fn cmd_config(
    container: &ServiceContainer,
    command: &ConfigCommands,
    explicit: Option<&Path>,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
        }
        ConfigCommands::Template => {
            output::info(&Settings::template());
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => {
                    let marker = if path.exists() { "" } else { " (not found)" };
                    output::info(&format!("global: {}{}", path.display(), marker));
                }
                None => output::warning("no config directory on this platform"),
            }
            let local = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(local_config_path);
            let marker = if local.exists() { "" } else { " (not found)" };
            output::info(&format!("local:  {}{}", local.display(), marker));
        }
    }
    Ok(())
}
