//! `snow` — the interactive coding-assistant binary (§6). Wires the
//! config, provider, storage, hook, and tool-catalog layers together and
//! runs either a one-shot `--prompt` turn or the interactive REPL.

mod args;
mod bang;
mod commands;
mod sinks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use snow_compress::Compressor;
use snow_core::config::SnowConfig;
use snow_core::types::{Session, SessionId};
use snow_hooks::HookEngine;
use snow_orchestrator::Orchestrator;
use snow_sessions::{SessionStore, SnapshotStore};
use snow_tools::ask_user::AskUserTool;
use snow_tools::catalog::Tool;
use snow_tools::fs_tools::{EditFileTool, GlobFilesTool, ListFilesTool, ReadFileTool};
use snow_tools::notebook::folder_notebook_tools;
use snow_tools::policy::ApprovedToolsStore;
use snow_tools::search::CodeSearchTool;
use snow_tools::state_tools::{todo_tools, useful_info_tools};
use snow_tools::subagent::{SubAgentRole, SubAgentRunner, SubAgentTool};
use snow_tools::terminal_tool::TerminalExecuteTool;
use snow_terminal::manager::TerminalManager;

use crate::args::Cli;
use crate::commands::IdeBridgeSlot;
use crate::sinks::{ArcSubAgentRunner, Stdin, StdoutObserver, TerminalConfirmationSink, TerminalPendingSink, TerminalQuestionSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    snow_core::init_tracing();
    let cli = Cli::parse();

    let config = SnowConfig::load(cli.config.as_deref())?;
    let workspace = cli.workspace.clone().unwrap_or_else(|| ".".to_string());

    let idle_timeout = Duration::from_secs(config.orchestrator.idle_timeout_secs);
    let providers = snow_provider::build_providers(&config.providers, idle_timeout);
    let (_, provider) = providers
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no LLM provider configured — set [providers.anthropic]/[providers.openai]/[providers.gemini] in snow.toml"))?;

    let state_root = PathBuf::from(&config.storage.home).join("state");
    let sessions = Arc::new(SessionStore::new(config.storage.sessions_dir()));
    let snapshots = Arc::new(SnapshotStore::new(config.storage.snapshots_dir()));
    let hooks = Arc::new(HookEngine::new());
    let approved = Arc::new(ApprovedToolsStore::load(config.storage.permissions_path(&workspace)).await);
    let (notebook_read, notebook_write, notebook_store) = folder_notebook_tools(config.storage.notebooks_dir());
    let folder_notebook = Arc::new(snow_orchestrator::folder_notebook::FolderNotebookPreprocessor::new(
        notebook_store,
        config.storage.home.clone(),
    ));
    let compressor = Arc::new(Compressor::new(
        Arc::clone(&provider),
        config.orchestrator.basic_model.clone(),
        Arc::clone(&hooks),
        Arc::clone(&sessions),
        Some(state_root.clone()),
    ));

    let ephemeral = SnowConfig::task_mode();
    let session = resolve_initial_session(&sessions, cli.session.as_deref(), ephemeral).await?;
    let session_dir = state_root.join(session.id.as_str());

    let stdin = Stdin::new();
    let confirmation_sink: Arc<dyn snow_tools::dispatcher::ConfirmationSink> = Arc::new(TerminalConfirmationSink::new(Arc::clone(&stdin)));
    let pending_sink: Arc<dyn snow_tools::dispatcher::PendingSink> = Arc::new(TerminalPendingSink);
    let observer: Arc<dyn snow_orchestrator::RoundObserver> = Arc::new(StdoutObserver);

    let workspace_for_tools = workspace.clone();
    let stdin_for_tools = Arc::clone(&stdin);
    let build_tools = move |runner: Arc<dyn SubAgentRunner>| -> Vec<Box<dyn Tool>> {
        let (todo_read, todo_write) = todo_tools(session_dir.clone());
        let (info_read, info_write) = useful_info_tools(session_dir.clone());
        let question_sink: Box<dyn snow_tools::ask_user::QuestionSink> = Box::new(TerminalQuestionSink::new(stdin_for_tools));

        vec![
            Box::new(ReadFileTool) as Box<dyn Tool>,
            Box::new(EditFileTool),
            Box::new(ListFilesTool),
            Box::new(GlobFilesTool),
            Box::new(CodeSearchTool),
            Box::new(TerminalExecuteTool::new(TerminalManager::new(), workspace_for_tools.clone())),
            Box::new(todo_read),
            Box::new(todo_write),
            Box::new(info_read),
            Box::new(info_write),
            Box::new(notebook_read),
            Box::new(notebook_write),
            Box::new(AskUserTool::new(question_sink)),
            Box::new(SubAgentTool::new(SubAgentRole::General, Box::new(ArcSubAgentRunner(Arc::clone(&runner))))),
            Box::new(SubAgentTool::new(SubAgentRole::Explore, Box::new(ArcSubAgentRunner(runner)))),
        ]
    };

    let mut orchestrator_config = config.orchestrator.clone();
    orchestrator_config.yolo_mode = orchestrator_config.yolo_mode || cli.yolo;

    let orchestrator = Orchestrator::new(
        provider,
        orchestrator_config,
        Arc::clone(&sessions),
        Arc::clone(&snapshots),
        Arc::clone(&hooks),
        approved,
        folder_notebook,
        compressor,
        confirmation_sink,
        pending_sink,
        observer,
        workspace.clone(),
        session,
        build_tools,
    );
    orchestrator.set_use_basic_model(cli.basic_model);

    let ide = IdeBridgeSlot::new(workspace.clone(), PathBuf::from(&config.ide_bridge.port_discovery_path));
    let bang_terminal = TerminalManager::new();

    if let Some(prompt) = cli.prompt.clone() {
        run_one_shot(&orchestrator, prompt).await?;
        ide.shutdown().await;
        return Ok(());
    }

    run_repl(&orchestrator, &snapshots, &ide, &bang_terminal, &workspace, &stdin).await;
    ide.shutdown().await;
    Ok(())
}

async fn resolve_initial_session(
    sessions: &SessionStore,
    requested: Option<&str>,
    ephemeral: bool,
) -> anyhow::Result<Session> {
    if let Some(id) = requested {
        return Ok(sessions.load_session(&SessionId::from(id)).await?);
    }
    Ok(sessions.create_new_session(ephemeral).await?)
}

async fn run_one_shot(orchestrator: &Orchestrator, prompt: String) -> anyhow::Result<()> {
    orchestrator
        .process_user_turn(prompt, Vec::new(), CancellationToken::new())
        .await?;
    println!();
    Ok(())
}

async fn run_repl(
    orchestrator: &Orchestrator,
    snapshots: &SnapshotStore,
    ide: &IdeBridgeSlot,
    bang_terminal: &TerminalManager,
    workspace: &str,
    stdin: &Stdin,
) {
    println!("snow — interactive coding assistant. /help for commands, Ctrl-D to exit.");

    let mut queued_bang_output: Option<String> = None;
    loop {
        print!("\n> ");
        let _ = std::io::Write::flush(&mut std::io::stdout());
        let Some(line) = stdin.read_line().await else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            let reply = match rest {
                "exit" | "quit" => break,
                "compact" => commands::compact(orchestrator).await,
                "clear" => commands::clear(orchestrator, false).await,
                "export" => commands::export(orchestrator, workspace).await,
                "review" => commands::review(orchestrator, snapshots, ide).await,
                "ide" => ide.toggle().await.unwrap_or_else(|e| format!("Failed to start IDE bridge: {e}")),
                other => format!("Unknown command: /{other}"),
            };
            println!("{reply}");
            continue;
        }

        if let Some(cmd) = bang::parse(trimmed) {
            match cmd {
                bang::BangCommand::Silent(command, timeout_ms) => {
                    let output = bang::run(bang_terminal, command, workspace, timeout_ms).await;
                    println!("{output}");
                }
                bang::BangCommand::Shared(command, timeout_ms) => {
                    let output = bang::run(bang_terminal, command, workspace, timeout_ms).await;
                    println!("{output}");
                    queued_bang_output = Some(match queued_bang_output.take() {
                        Some(prev) => format!("{prev}\n\n{output}"),
                        None => output,
                    });
                }
            }
            continue;
        }

        let mut text = trimmed.to_string();
        if let Some(shell_output) = queued_bang_output.take() {
            text = format!("{text}\n\n{shell_output}");
        }

        match orchestrator.process_user_turn(text, Vec::new(), CancellationToken::new()).await {
            Ok(_) => println!(),
            Err(e) => println!("\nTurn failed: {e}"),
        }
    }
}
