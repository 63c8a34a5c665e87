// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Parley - multi-provider AI chat for your terminal
//!
//! Entry point for the Parley CLI application.

use std::io::Write as _;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley::chat::{Action, ChatOrchestrator, ChatStore, SendRequest, SessionState};
use parley::cli::Cli;
use parley::config::Settings;
use parley::error::Result;
use parley::llm::factory::ProviderFactory;
use parley::llm::provider::drain_stream;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // Practical debug toggle: `-v` enables session diagnostics without
    // requiring users to know target names up front. `RUST_LOG` still
    // takes precedence.
    if cli.verbose > 0 {
        for directive in ["parley.chat=debug", "parley.citations=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let provider = cli
        .provider
        .clone()
        .unwrap_or_else(|| settings.default_provider.clone());
    let model = cli.model.clone().or_else(|| {
        settings
            .provider(&provider)
            .map(|c| c.default_model.clone())
    });
    let Some(model) = model else {
        eprintln!("unknown provider '{provider}'; check your config");
        std::process::exit(1);
    };

    let store = ChatStore::open(Settings::chats_dir())?;
    let session = SessionState::new(&provider, &model);
    let mut factory = ProviderFactory::new(settings.clone());
    let mut orchestrator = ChatOrchestrator::new(settings, store, session);

    println!("parley - {provider} ({model}); /help for commands");

    if let Some(chat) = &cli.chat {
        let action = orchestrator.handle_input(&format!("/open {chat}"))?;
        if let Action::Print(text) = action {
            println!("{text}");
        }
    }

    run_repl(&mut orchestrator, &mut factory).await
}

async fn run_repl(
    orchestrator: &mut ChatOrchestrator,
    factory: &mut ProviderFactory,
) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print_prompt(orchestrator);
        let Some(line) = lines.next_line().await? else {
            // EOF: save and exit like /quit.
            orchestrator.handle_input("/quit")?;
            return Ok(());
        };

        let action = match orchestrator.handle_input(&line) {
            Ok(action) => action,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match action {
            Action::Continue => {}
            Action::Print(text) => println!("{text}"),
            Action::Break => return Ok(()),
            Action::Send(send) => {
                if let Some(text) = dispatch(orchestrator, factory, send).await? {
                    println!("{text}");
                }
            }
        }
    }
}

/// Run one request end to end: preflight, stream, and fold the outcome
/// back into the session. Ctrl-C during streaming cancels the turn.
async fn dispatch(
    orchestrator: &mut ChatOrchestrator,
    factory: &mut ProviderFactory,
    send: SendRequest,
) -> Result<Option<String>> {
    let SendRequest { request, pending } = send;

    let provider = match factory.get(orchestrator.session().provider_name()) {
        Ok(provider) => provider,
        Err(e) => {
            let action = orchestrator.rollback_pre_send_failure(pending, &e)?;
            return Ok(action_text(action));
        }
    };

    let stream = match provider.send(request).await {
        Ok(stream) => stream,
        Err(e) => {
            let action = orchestrator.handle_ai_error(pending, &e)?;
            return Ok(action_text(action));
        }
    };

    let drained = tokio::select! {
        outcome = drain_stream(stream, |delta| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    println!();

    let action = match drained {
        Some(Ok(outcome)) => orchestrator.handle_ai_response(pending, outcome).await?,
        Some(Err(e)) => orchestrator.handle_ai_error(pending, &e)?,
        None => orchestrator.handle_user_cancel(pending)?,
    };
    Ok(action_text(action))
}

fn action_text(action: Action) -> Option<String> {
    match action {
        Action::Print(text) => Some(text),
        _ => None,
    }
}

fn print_prompt(orchestrator: &ChatOrchestrator) {
    let session = orchestrator.session();
    let mode = session.mode();
    let prompt = if mode.is_retry() {
        "retry> "
    } else if mode.is_secret() {
        "secret> "
    } else {
        "parley> "
    };
    print!("{prompt}");
    let _ = std::io::stdout().flush();
}
