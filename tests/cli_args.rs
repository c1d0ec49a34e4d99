//! CLI argument parsing tests.

use std::path::PathBuf;

use clap::Parser;
use tin::cli::{parse_key_value, Cli, Command};

#[test]
fn test_cli_parses_tree_subcommand() {
    let cli = Cli::parse_from(["tin", "--config", "api.yml", "tree"]);

    assert!(!cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("api.yml")));
    assert!(matches!(cli.command, Command::Tree));
}

#[test]
fn test_cli_parses_describe_subcommand() {
    let cli = Cli::parse_from(["tin", "describe", "orgs.members.list"]);

    match cli.command {
        Command::Describe { endpoint } => assert_eq!(endpoint, "orgs.members.list"),
        _ => panic!("Expected Describe command"),
    }
}

#[test]
fn test_cli_parses_call_subcommand() {
    let cli = Cli::parse_from([
        "tin",
        "call",
        "users.get",
        "42",
        "-t",
        "org=acme",
        "--param",
        "expand=members",
        "--param",
        "q=a=b",
        "--data",
        r#"{"name": "x"}"#,
    ]);

    match cli.command {
        Command::Call {
            endpoint,
            id,
            tokens,
            params,
            data,
        } => {
            assert_eq!(endpoint, "users.get");
            assert_eq!(id.as_deref(), Some("42"));
            assert_eq!(tokens, vec![("org".to_string(), "acme".to_string())]);
            assert_eq!(
                params,
                vec![
                    ("expand".to_string(), "members".to_string()),
                    ("q".to_string(), "a=b".to_string()),
                ]
            );
            assert_eq!(data.as_deref(), Some(r#"{"name": "x"}"#));
        }
        _ => panic!("Expected Call command"),
    }
}

#[test]
fn test_global_flags() {
    // before the subcommand
    let cli = Cli::parse_from(["tin", "--json", "--env", "staging", "methods"]);
    assert!(cli.json);
    assert_eq!(cli.env.as_deref(), Some("staging"));

    // after the subcommand
    let cli = Cli::parse_from(["tin", "methods", "--json", "-e", "production"]);
    assert!(cli.json);
    assert_eq!(cli.env.as_deref(), Some("production"));
}

#[test]
fn test_call_requires_endpoint() {
    assert!(Cli::try_parse_from(["tin", "call"]).is_err());
}

#[test]
fn test_parse_key_value() {
    assert_eq!(
        parse_key_value("a=1").unwrap(),
        ("a".to_string(), "1".to_string())
    );
    assert_eq!(
        parse_key_value("a=").unwrap(),
        ("a".to_string(), String::new())
    );
    assert!(parse_key_value("novalue").is_err());
    assert!(parse_key_value("=x").is_err());
}
