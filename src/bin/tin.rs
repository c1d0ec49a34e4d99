//! tin CLI binary.
//!
//! A command-line interface for exploring and calling a configured REST API.

use clap::Parser;
use serde_json::{Map, Value};
use std::process::ExitCode;
use tabled::{Table, Tabled};
use tin::cli::{Cli, Command};
use tin::output::PrettyPrint;
use tin::{Call, EndpointMethod, TinClient, TinError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = match load_client(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Hint: Pass --config <file> or set TIN_CONFIG");
            return ExitCode::FAILURE;
        }
    };

    match run(&client, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_client(cli: &Cli) -> tin::Result<TinClient> {
    match &cli.config {
        Some(path) => TinClient::from_file(path, cli.env.as_deref()),
        None => TinClient::from_env(),
    }
}

async fn run(client: &TinClient, cli: Cli) -> tin::Result<()> {
    match cli.command {
        Command::Tree => {
            println!("{}", serde_json::to_string_pretty(&client.tree())?);
        }
        Command::Methods => {
            let methods = client.root().all_methods();
            if cli.json {
                let names: Vec<String> = methods.iter().map(ToString::to_string).collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                let rows: Vec<MethodRow> = methods.into_iter().map(MethodRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        Command::Describe { endpoint } => {
            let method = client.endpoint(&endpoint)?;
            if cli.json {
                let described: Value = serde_json::from_str(&method.to_json()?)?;
                println!("{}", serde_json::to_string_pretty(&described)?);
            } else {
                println!("{}", method.pretty_print());
            }
        }
        Command::Call {
            endpoint,
            id,
            tokens,
            params,
            data,
        } => {
            let mut call = Call::new()
                .tokens(to_map(tokens))
                .params(to_map(params));
            if let Some(id) = id {
                call = call.id(id);
            }
            if let Some(data) = data {
                let body: Value = serde_json::from_str(&data)
                    .map_err(|e| TinError::Config(format!("--data is not valid JSON: {e}")))?;
                call = call.body(body);
            }

            let response = client.call(&endpoint, call).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.pretty_print());
            }
        }
    }
    Ok(())
}

fn to_map(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

// Table row types for non-JSON output

#[derive(Tabled)]
struct MethodRow {
    method: String,
    verb: String,
    path: String,
    returns: String,
}

impl From<&EndpointMethod> for MethodRow {
    fn from(m: &EndpointMethod) -> Self {
        Self {
            method: m.to_string(),
            verb: m.verb().to_string(),
            path: m.path().to_string(),
            returns: m
                .expected()
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
