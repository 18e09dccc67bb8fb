use std::{io::Write, sync::Arc, thread};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use winspace::{
    inspector,
    orchestrator::{CancelToken, Orchestrator, Timings},
    positioner::Positioner,
    prober::Prober,
    process::ProcessManager,
    store::WorkspaceStore,
    types::{LaunchEvent, LaunchStatus, Workspace},
};

type DesktopOrchestrator = Orchestrator<Prober, ProcessManager, Positioner>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = WorkspaceStore::open_default()?;
    let (events_tx, events_rx) = flume::unbounded();
    spawn_progress_printer(events_rx);

    let orchestrator: Arc<DesktopOrchestrator> = Arc::new(Orchestrator::new(
        store.clone(),
        Prober::new(),
        ProcessManager::new(),
        Positioner::new(),
        Timings::default(),
        events_tx,
    ));
    let active: Arc<Mutex<Option<CancelToken>>> = Arc::new(Mutex::new(None));

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        match input.trim() {
            "" => {}
            "quit" | "exit" => break,
            "list" => {
                for app in inspector::list_running_apps() {
                    println!(
                        "{:<28} {:>2} window(s)  {}",
                        app.name, app.window_count, app.path
                    );
                }
            }
            "cancel" => {
                match active.lock().take() {
                    Some(token) => {
                        token.cancel();
                        println!("cancelling after the current app...");
                    }
                    None => println!("nothing to cancel"),
                }
            }
            c if c.starts_with("ws") => {
                if let Some((_, rest)) = c.split_once(' ') {
                    ws_command(rest.trim(), &store, &orchestrator, &active);
                } else {
                    help_command_interface();
                }
            }
            _ => help_command_interface(),
        }
    }
    Ok(())
}

fn ws_command(
    rest: &str,
    store: &WorkspaceStore,
    orchestrator: &Arc<DesktopOrchestrator>,
    active: &Arc<Mutex<Option<CancelToken>>>,
) {
    let (command, arg) = match rest.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (rest, ""),
    };
    match command {
        "list" => match store.load_all() {
            Ok(workspaces) => {
                for ws in workspaces {
                    println!(
                        "{:<36} {:<20} {} app(s)",
                        ws.id,
                        ws.workspace_name,
                        ws.apps.len()
                    );
                }
            }
            Err(err) => eprintln!("could not read workspaces: {err}"),
        },
        "capture" if !arg.is_empty() => {
            let apps = inspector::capture_workspace_apps();
            if apps.is_empty() {
                println!("no apps to capture");
                return;
            }
            match store.create(arg, apps) {
                Ok(ws) => println!(
                    "saved '{}' with {} app(s) as {}",
                    ws.workspace_name,
                    ws.apps.len(),
                    ws.id
                ),
                Err(err) => eprintln!("could not save workspace: {err}"),
            }
        }
        "launch" | "close" if !arg.is_empty() => {
            let Some(ws) = resolve_workspace(store, arg) else {
                eprintln!("no workspace matching '{arg}'");
                return;
            };
            let token = CancelToken::new();
            *active.lock() = Some(token.clone());
            let orchestrator = orchestrator.clone();
            let launching = command == "launch";
            thread::spawn(move || {
                let result = if launching {
                    orchestrator.launch(&ws.id, &token)
                } else {
                    orchestrator.close(&ws.id, &token)
                };
                if let Err(err) = result {
                    eprintln!("operation failed: {err}");
                }
            });
        }
        "delete" if !arg.is_empty() => {
            let Some(ws) = resolve_workspace(store, arg) else {
                eprintln!("no workspace matching '{arg}'");
                return;
            };
            match store.delete(&ws.id) {
                Ok(()) => println!("deleted '{}'", ws.workspace_name),
                Err(err) => eprintln!("could not delete workspace: {err}"),
            }
        }
        _ => help_command_interface(),
    }
}

/// Accept a workspace id or its (case-insensitive) name.
fn resolve_workspace(store: &WorkspaceStore, arg: &str) -> Option<Workspace> {
    let workspaces = store.load_all().ok()?;
    workspaces
        .iter()
        .find(|ws| ws.id == arg)
        .or_else(|| {
            workspaces
                .iter()
                .find(|ws| ws.workspace_name.eq_ignore_ascii_case(arg))
        })
        .cloned()
}

fn spawn_progress_printer(events: flume::Receiver<LaunchEvent>) {
    thread::spawn(move || {
        for event in events.iter() {
            match event {
                LaunchEvent::Status(status) => {
                    let tag = match status.status {
                        LaunchStatus::Launching => "....",
                        LaunchStatus::Success => " ok ",
                        LaunchStatus::Error => "FAIL",
                        LaunchStatus::AlreadyRunning => "open",
                    };
                    println!("[{tag}] {:<24} {}", status.app_name, status.message);
                }
                LaunchEvent::Complete(summary) => {
                    println!(
                        "done: {} app(s), {} processed, {} already running, {} error(s)",
                        summary.total, summary.success, summary.already_running, summary.errors
                    );
                }
            }
        }
    });
}

fn help_command_interface() {
    println!(
        r#"
list                  running apps with visible windows
ws list               saved workspaces
ws capture <name>     save the current desktop as a workspace
ws launch <id|name>   launch a workspace
ws close <id|name>    close a workspace
ws delete <id|name>   delete a workspace
cancel                cancel the running launch/close
quit
"#
    );
}
