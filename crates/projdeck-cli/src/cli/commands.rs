use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use projdeck_core::api::NotificationApi;
use projdeck_core::toast::ToastQueue;
use projdeck_core::store::NotificationInbox;
use projdeck_core::{CoreConfig, CoreEvent, CoreRuntime, NotificationActions};
use tokio::sync::{broadcast, mpsc, watch};

use super::render;

const TOAST_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Login { token: String },
    Logout,
    Whoami,
    Watch,
    Read { id: i64 },
    ReadAll,
    Delete { id: i64 },
}

/// Actions typed on stdin while `watch` runs
#[derive(Debug, Clone, PartialEq)]
pub enum WatchAction {
    Read(i64),
    ReadAll,
    Delete(i64),
}

pub fn parse_watch_action(line: &str) -> Option<WatchAction> {
    let mut parts = line.split_whitespace();
    let action = match (parts.next()?, parts.next()) {
        ("read", Some(id)) => WatchAction::Read(id.parse().ok()?),
        ("read-all", None) => WatchAction::ReadAll,
        ("delete", Some(id)) => WatchAction::Delete(id.parse().ok()?),
        _ => return None,
    };
    parts.next().is_none().then_some(action)
}

pub async fn run_command(config: CoreConfig, command: CliCommand, pretty: bool) -> Result<()> {
    let mut runtime = CoreRuntime::new(config);
    let session = runtime.session();

    match command {
        CliCommand::Login { token } => {
            let role = session.sign_in(token.trim()).context("Failed to sign in")?;
            match role {
                Some(role) => {
                    let access = if role.is_admin() { "admin" } else { "member" };
                    println!("Logged in as {} ({} access)", role, access);
                }
                None => println!("Token stored, but it carries no role claim"),
            }
        }
        CliCommand::Logout => {
            session.sign_out().context("Failed to sign out")?;
            println!("Logged out");
        }
        CliCommand::Whoami => {
            require_login(&runtime)?;
            let profile = session.refresh_user(runtime.backend().as_ref()).await?;
            if pretty {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("{}", serde_json::to_string(&profile)?);
            }
        }
        CliCommand::Watch => watch_notifications(&mut runtime).await?,
        CliCommand::Read { id } => {
            require_login(&runtime)?;
            runtime.backend().mark_read(id).await?;
            println!("Marked notification {} as read", id);
        }
        CliCommand::ReadAll => {
            require_login(&runtime)?;
            runtime.backend().mark_all_read().await?;
            println!("Marked all notifications as read");
        }
        CliCommand::Delete { id } => {
            require_login(&runtime)?;
            runtime.backend().delete(id).await?;
            println!("Deleted notification {}", id);
        }
    }
    Ok(())
}

fn require_login(runtime: &CoreRuntime) -> Result<()> {
    if !runtime.session().is_authenticated() {
        bail!("Not logged in. Run `projdeck-cli login <token>` first.");
    }
    Ok(())
}

/// Stream connection state, notifications and toasts until Ctrl-C, applying
/// actions typed on stdin to the live inbox
async fn watch_notifications(runtime: &mut CoreRuntime) -> Result<()> {
    let events = runtime.subscribe_events();
    let profile = runtime.bootstrap().await;
    require_login(runtime)?;
    if let Some(profile) = profile {
        println!(
            "Watching notifications for {} <{}> on {}",
            profile.name,
            profile.email,
            runtime.config().api_base_url
        );
    }
    println!("Type `read <id>`, `read-all` or `delete <id>` to act on notifications");

    let toasts = runtime.toasts();
    let (stop_tx, stop_rx) = watch::channel(false);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        let _ = stop_tx.send(true);
    };

    let actions = runtime.actions();
    let inbox = runtime.inbox();
    tokio::join!(
        runtime.run_until(shutdown),
        print_updates(events, toasts, stop_rx.clone()),
        apply_input(actions, inbox, spawn_stdin_reader(), stop_rx)
    );
    Ok(())
}

/// Blocking stdin lines forwarded from a dedicated thread
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (line_tx, line_rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    line_rx
}

async fn apply_input(
    actions: NotificationActions,
    inbox: Arc<NotificationInbox>,
    mut lines: mpsc::Receiver<String>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let line = tokio::select! {
            _ = stop_rx.changed() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => {
                    // stdin closed; keep watching until Ctrl-C
                    let _ = stop_rx.changed().await;
                    break;
                }
            },
        };

        let Some(action) = parse_watch_action(&line) else {
            if !line.trim().is_empty() {
                eprintln!("Unknown command. Use: read <id>, read-all, delete <id>");
            }
            continue;
        };

        // failures reach the terminal through the toast queue
        let result = match action {
            WatchAction::Read(id) => {
                if !inbox.contains(id) {
                    eprintln!("No notification #{}", id);
                    continue;
                }
                actions.mark_as_read(id).await.map(|_| {
                    println!("#{} marked as read ({} unread)", id, inbox.unread_count());
                })
            }
            WatchAction::ReadAll => actions.mark_all_as_read().await,
            WatchAction::Delete(id) => actions.delete_notification(id).await,
        };
        if let Err(e) = result {
            tracing::debug!("Watch action failed: {}", e);
        }
    }
}

async fn print_updates(
    mut events: broadcast::Receiver<CoreEvent>,
    toasts: Arc<Mutex<ToastQueue>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut shown: HashSet<String> = HashSet::new();
    let mut ticker = tokio::time::interval(TOAST_POLL);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            event = events.recv() => match event {
                // errors reach the terminal through the toast queue
                Ok(CoreEvent::Error(_)) => {}
                Ok(event) => println!("{}", render::format_event(&event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                let mut queue = toasts.lock();
                queue.tick();
                for toast in queue.toasts() {
                    if shown.insert(toast.id.clone()) {
                        println!("{}", render::format_toast(toast));
                    }
                }
                shown.retain(|id| queue.get(id).is_some());
            }
        }
    }
}
