// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use obra_app::AppState;
use obra_client::Client;
use runtime::BackendRuntime;
use std::env;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `obra --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let client = Client::new(
        config.backend_base_url()?,
        &config.backend_anon_key()?,
        config.backend_timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [backend] config in {}; fix base_url/anon_key/timeout values",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        client.health().with_context(|| {
            format!("backend at {} is not reachable", client.base_url())
        })?;
        println!("config ok, backend reachable");
        return Ok(());
    }

    let mut state = AppState {
        login_email: config.auth_email().to_owned(),
        ..AppState::default()
    };
    if let Some(tab) = config.start_tab() {
        state.active_tab = tab;
    }

    let mut runtime = BackendRuntime::new(client);
    obra_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("obra");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config + backend reachability");
    println!("  --help                   Show this help");
}
