//! CLI argument parsing tests.

use clap::{CommandFactory, Parser};

use folddoc::cli::{Cli, Commands, ConfigCommands};

#[test]
fn given_cli_definition_then_valid() {
    Cli::command().debug_assert();
}

#[test]
fn given_run_with_flags_when_parsing_then_captured() {
    let cli = Cli::try_parse_from(["folddoc", "-dd", "run", "doc.fold", "--json"]).unwrap();

    assert_eq!(cli.debug, 2);
    match cli.command {
        Some(Commands::Run { script, json, out }) => {
            assert_eq!(script.to_str(), Some("doc.fold"));
            assert!(json);
            assert!(out.is_none());
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn given_global_config_flag_after_subcommand_when_parsing_then_accepted() {
    let cli = Cli::try_parse_from(["folddoc", "config", "show", "-c", "my.toml"]).unwrap();

    assert_eq!(cli.config.as_deref().and_then(|p| p.to_str()), Some("my.toml"));
    assert!(matches!(
        cli.command,
        Some(Commands::Config {
            command: ConfigCommands::Show
        })
    ));
}

#[test]
fn given_accepts_without_child_when_parsing_then_error() {
    assert!(Cli::try_parse_from(["folddoc", "accepts", "list"]).is_err());
}
