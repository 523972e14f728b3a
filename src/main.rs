mod ui;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use futures::StreamExt;
use tokio::sync::mpsc;

use connections::common::{ListKind, SyncEvent, ThreadRef, TimerKey};
use connections::config::{self, AppConfig, Session};
use connections::network::RestClient;
use connections::storage::{SqliteStore, ensure_parent_dir};
use connections::{CountdownRegistry, RefreshOutcome, SyncCoordinator, SyncSettings, ViewScope};
use ui::ShellApp;
use ui::render;

type Coordinator = SyncCoordinator<RestClient, SqliteStore>;

#[derive(Parser)]
#[command(
    name = "connections",
    version,
    about = "Groups and conversations client with rate-limited sync"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum Command {
    /// Interactive shell (default)
    Shell,
    /// Refresh and print the group list
    Groups {
        #[arg(long)]
        follow: bool,
    },
    /// Refresh and print people and existing conversations
    People {
        #[arg(long)]
        follow: bool,
    },
    /// Print the messages of a group
    Group {
        id: String,
        /// Ask for new messages even if the thread was loaded before
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        follow: bool,
    },
    /// Print the messages of a conversation
    Conversation {
        id: String,
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        follow: bool,
    },
    /// Post a message to a group or conversation
    Send {
        #[arg(value_enum)]
        kind: TargetKind,
        id: String,
        text: String,
    },
    CreateGroup {
        name: String,
    },
    DeleteGroup {
        id: String,
    },
    /// Forget cached cooldowns and read positions
    Logout,
    /// Write the effective configuration to the --config path
    InitConfig,
}

#[derive(clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Group,
    Conversation,
}

impl TargetKind {
    fn thread(self, id: String) -> ThreadRef {
        match self {
            TargetKind::Group => ThreadRef::group(id),
            TargetKind::Conversation => ThreadRef::conversation(id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);
    let command = cli.command.unwrap_or(Command::Shell);
    if command == Command::InitConfig {
        config::save_config(&cli.config, &app_config)?;
        println!("wrote {}", cli.config);
        return Ok(());
    }
    let (coordinator, event_rx) = build_coordinator(&app_config)?;

    match command {
        Command::Shell => ShellApp::new(coordinator, event_rx).run().await?,
        command => {
            run_command(&coordinator, command).await;
            report_events(event_rx);
        }
    }
    Ok(())
}

fn build_coordinator(
    app_config: &AppConfig,
) -> Result<(Arc<Coordinator>, mpsc::Receiver<SyncEvent>), Box<dyn Error>> {
    let database_path = Path::new(&app_config.database_path);
    ensure_parent_dir(database_path)?;
    let store = SqliteStore::open(database_path)?;

    let session = Session::from_env();
    let settings = SyncSettings::from_config(app_config, &session.uid);
    let api = RestClient::new(&app_config.api_base_url, session)?;

    // Coordinator -> front end
    let (event_tx, event_rx) = mpsc::channel(100);
    let coordinator = SyncCoordinator::new(api, store, CountdownRegistry::new(), settings, event_tx);
    log::info!(
        "Client started against {} with state in {}",
        app_config.api_base_url,
        database_path.display()
    );
    Ok((Arc::new(coordinator), event_rx))
}

async fn run_command(coordinator: &Coordinator, command: Command) {
    let scope = coordinator.timers().open_scope();
    let uid = coordinator.settings().user_id.clone();

    match command {
        Command::Shell | Command::InitConfig => {}
        Command::Groups { follow } => {
            show_list(coordinator, &scope, ListKind::Groups).await;
            if follow {
                follow_countdown(coordinator, &TimerKey::List(ListKind::Groups)).await;
            }
        }
        Command::People { follow } => {
            show_list(coordinator, &scope, ListKind::People).await;
            if follow {
                follow_countdown(coordinator, &TimerKey::List(ListKind::People)).await;
            }
        }
        Command::Group {
            id,
            refresh,
            follow,
        } => show_thread(coordinator, &scope, ThreadRef::group(id), refresh, follow).await,
        Command::Conversation {
            id,
            refresh,
            follow,
        } => {
            show_thread(
                coordinator,
                &scope,
                ThreadRef::conversation(id),
                refresh,
                follow,
            )
            .await
        }
        Command::Send { kind, id, text } => {
            let thread = kind.thread(id);
            match coordinator.send_message(&thread, &text).await {
                Ok(_) => {
                    let messages = coordinator.cached_messages(&thread).unwrap_or_default();
                    println!("{}", render::messages(&messages, &uid));
                }
                Err(err) => log::error!("{err}"),
            }
        }
        Command::CreateGroup { name } => match coordinator.create_group(&name).await {
            Ok(group) => println!("created group {} ({})", group.name, group.id),
            Err(err) => log::error!("{err}"),
        },
        Command::DeleteGroup { id } => match coordinator.delete_group(&id).await {
            Ok(()) => println!("deleted group {id}"),
            Err(err) => log::error!("{err}"),
        },
        Command::Logout => {
            coordinator.end_session();
            println!("logged out");
        }
    }
}

async fn show_list(coordinator: &Coordinator, scope: &ViewScope, kind: ListKind) {
    let key = TimerKey::List(kind);
    let left = coordinator.resume_countdown(scope, &key);
    match coordinator.refresh_list(scope, kind).await {
        Ok(RefreshOutcome::CooldownActive) => {
            println!("{kind} were refreshed recently, try again in {left}s");
            return;
        }
        Ok(_) => {}
        Err(_) => return,
    }

    let uid = &coordinator.settings().user_id;
    match kind {
        ListKind::Groups => println!("{}", render::groups(&coordinator.cached_groups(), uid)),
        ListKind::People => {
            println!(
                "{}",
                render::people(
                    &coordinator.cached_people(),
                    &coordinator.cached_conversations()
                )
            );
            if !coordinator.conversations_loaded() {
                println!("(existing conversations could not be loaded)");
            }
        }
    }
}

async fn show_thread(
    coordinator: &Coordinator,
    scope: &ViewScope,
    thread: ThreadRef,
    refresh: bool,
    follow: bool,
) {
    if coordinator.open_thread(scope, &thread).await.is_err() {
        return;
    }
    if refresh {
        if let Ok(RefreshOutcome::CooldownActive) =
            coordinator.refresh(scope, &TimerKey::thread(&thread)).await
        {
            log::info!("{thread} was refreshed recently");
        }
    }

    let messages = coordinator.cached_messages(&thread).unwrap_or_default();
    println!(
        "{}",
        render::messages(&messages, &coordinator.settings().user_id)
    );
    coordinator.mark_read(&thread);

    if follow {
        follow_countdown(coordinator, &TimerKey::thread(&thread)).await;
    }
}

/// Print the countdown of `key` once per second until it reaches 0.
async fn follow_countdown(coordinator: &Coordinator, key: &TimerKey) {
    let mut countdown = coordinator.observe_countdown(key);
    while let Some(left) = countdown.next().await {
        println!("{}", render::refresh_label(left));
        if left == 0 {
            break;
        }
    }
}

fn report_events(mut event_rx: mpsc::Receiver<SyncEvent>) {
    while let Ok(event) = event_rx.try_recv() {
        if let SyncEvent::FetchFailed { key, message } = event {
            eprintln!("Error loading {key}: {message}");
        }
    }
}
