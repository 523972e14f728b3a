use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use connections::common::{ListKind, SyncEvent, ThreadKind, ThreadRef, TimerKey};
use connections::error::SyncResult;
use connections::network::ApiClient;
use connections::storage::KeyValueStore;
use connections::{RefreshOutcome, SyncCoordinator, ViewScope};

use super::render;
use super::state::{AppState, View};

const HELP: &str = "\
commands:
  groups | people              show a list
  group <id> | conversation <id>
                               open a thread
  chat <uid>                   open (or start) a conversation with someone
  refresh                      refresh the current view
  send <text>                  post to the open thread
  read                         mark the open thread as read
  notifications                show recent errors
  create-group <name>
  delete-group <id> | delete-conversation <id>
  logout                       forget cached data and cooldowns
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Open(View),
    Chat(String),
    Refresh,
    Send(String),
    MarkRead,
    Notifications,
    CreateGroup(String),
    DeleteGroup(String),
    DeleteConversation(String),
    Logout,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let argument = |what: &str| {
        if rest.is_empty() {
            Err(format!("usage: {word} <{what}>"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word {
        "groups" => ShellCommand::Open(View::List(ListKind::Groups)),
        "people" => ShellCommand::Open(View::List(ListKind::People)),
        "group" => ShellCommand::Open(View::Thread(ThreadRef::group(argument("id")?))),
        "conversation" => {
            ShellCommand::Open(View::Thread(ThreadRef::conversation(argument("id")?)))
        }
        "chat" => ShellCommand::Chat(argument("uid")?),
        "refresh" => ShellCommand::Refresh,
        "send" => ShellCommand::Send(argument("text")?),
        "read" => ShellCommand::MarkRead,
        "notifications" | "log" => ShellCommand::Notifications,
        "create-group" => ShellCommand::CreateGroup(argument("name")?),
        "delete-group" => ShellCommand::DeleteGroup(argument("id")?),
        "delete-conversation" => ShellCommand::DeleteConversation(argument("id")?),
        "logout" => ShellCommand::Logout,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        "" => return Err(String::new()),
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };
    Ok(command)
}

/// Interactive line-based front end over the sync coordinator.
pub struct ShellApp<A, S> {
    coordinator: Arc<SyncCoordinator<A, S>>,
    event_receiver: mpsc::Receiver<SyncEvent>,
    /// Owns the countdowns started for the current view.
    scope: ViewScope,
    state: AppState,
}

impl<A: ApiClient, S: KeyValueStore> ShellApp<A, S> {
    pub fn new(
        coordinator: Arc<SyncCoordinator<A, S>>,
        event_receiver: mpsc::Receiver<SyncEvent>,
    ) -> Self {
        let scope = coordinator.timers().open_scope();
        Self {
            coordinator,
            event_receiver,
            scope,
            state: AppState::new(),
        }
    }

    pub async fn run(mut self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");
        self.open_view(View::List(ListKind::Groups)).await;

        loop {
            self.handle_sync_events();
            self.state.countdown = self.coordinator.timers().remaining(&self.state.view.key());
            print!("{} {}> ", self.state.view.key(), render::refresh_label(self.state.countdown));
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match parse_command(&line) {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => self.execute(command).await,
                Err(message) if message.is_empty() => {}
                Err(message) => println!("{message}"),
            }
        }
        Ok(())
    }

    fn handle_sync_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            if let Some(text) = self.state.apply_event(&event) {
                println!("! {text}");
            }
        }
    }

    async fn execute(&mut self, command: ShellCommand) {
        match command {
            ShellCommand::Open(view) => self.open_view(view).await,
            ShellCommand::Chat(uid) => match self.coordinator.create_conversation(&uid).await {
                Ok(conversation) => {
                    self.open_view(View::Thread(ThreadRef::conversation(conversation.id)))
                        .await
                }
                Err(err) => println!("{err}"),
            },
            ShellCommand::Refresh if !self.state.refresh_enabled() => {
                println!("refresh disabled for {}s", self.state.countdown);
            }
            ShellCommand::Refresh => self.refresh().await,
            ShellCommand::Send(text) => {
                let View::Thread(thread) = self.state.view.clone() else {
                    println!("open a group or conversation first");
                    return;
                };
                match self.coordinator.send_message(&thread, &text).await {
                    Ok(_) => self.print_thread(&thread),
                    Err(err) => println!("{err}"),
                }
            }
            ShellCommand::MarkRead => {
                if let View::Thread(thread) = &self.state.view {
                    self.coordinator.mark_read(thread);
                }
            }
            ShellCommand::Notifications => {
                if self.state.notifications.is_empty() {
                    println!("no notifications");
                }
                for text in &self.state.notifications {
                    println!("! {text}");
                }
            }
            ShellCommand::CreateGroup(name) => match self.coordinator.create_group(&name).await {
                Ok(group) => println!("created group {} ({})", group.name, group.id),
                Err(err) => println!("{err}"),
            },
            ShellCommand::DeleteGroup(id) => {
                let result = self.coordinator.delete_group(&id).await;
                self.after_delete(ThreadRef::group(id), result).await;
            }
            ShellCommand::DeleteConversation(id) => {
                let result = self.coordinator.delete_conversation(&id).await;
                self.after_delete(ThreadRef::conversation(id), result).await;
            }
            ShellCommand::Logout => {
                self.coordinator.end_session();
                self.state = AppState::new();
                println!("logged out");
            }
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => {}
        }
    }

    /// Leaving a view cancels the countdowns it started.
    async fn open_view(&mut self, view: View) {
        self.scope = self.coordinator.timers().open_scope();
        self.state.switch_to(view.clone());

        match view {
            View::List(kind) => {
                let left = self
                    .coordinator
                    .resume_countdown(&self.scope, &TimerKey::List(kind));
                if !self.coordinator.is_loaded(kind) && left == 0 {
                    if let Err(err) = self.coordinator.refresh_list(&self.scope, kind).await {
                        log::debug!("Initial load of {kind} failed: {err}");
                    }
                }
                self.print_list(kind);
            }
            View::Thread(thread) => match self.coordinator.open_thread(&self.scope, &thread).await {
                Ok(_) => self.print_thread(&thread),
                Err(err) => log::debug!("Opening {thread} failed: {err}"),
            },
        }
    }

    async fn refresh(&mut self) {
        let key = self.state.view.key();
        match self.coordinator.refresh(&self.scope, &key).await {
            Ok(RefreshOutcome::CooldownActive) => {
                println!(
                    "refresh disabled for {}s",
                    self.coordinator.timers().remaining(&key)
                );
            }
            Ok(RefreshOutcome::Unchanged) => println!("nothing new"),
            Ok(RefreshOutcome::Refreshed { .. }) => match self.state.view.clone() {
                View::List(kind) => self.print_list(kind),
                View::Thread(thread) => self.print_thread(&thread),
            },
            // Already reported through the event channel.
            Err(_) => {}
        }
    }

    async fn after_delete(&mut self, thread: ThreadRef, result: SyncResult<()>) {
        if let Err(err) = result {
            println!("{err}");
            return;
        }
        println!("deleted {thread}");
        if self.state.view == View::Thread(thread.clone()) {
            let list = match thread.kind {
                ThreadKind::Group => ListKind::Groups,
                ThreadKind::Conversation => ListKind::People,
            };
            self.open_view(View::List(list)).await;
        }
    }

    fn print_list(&self, kind: ListKind) {
        let uid = &self.coordinator.settings().user_id;
        let body = match kind {
            ListKind::Groups => render::groups(&self.coordinator.cached_groups(), uid),
            ListKind::People => render::people(
                &self.coordinator.cached_people(),
                &self.coordinator.cached_conversations(),
            ),
        };
        println!("{body}");
        if kind == ListKind::People && !self.coordinator.conversations_loaded() {
            println!("(existing conversations could not be loaded)");
        }
    }

    fn print_thread(&self, thread: &ThreadRef) {
        let messages = self.coordinator.cached_messages(thread).unwrap_or_default();
        println!(
            "{}",
            render::messages(&messages, &self.coordinator.settings().user_id)
        );
        let unread = self.coordinator.unread_count(thread);
        if unread > 0 {
            println!("({unread} unread)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_views() {
        assert_eq!(
            parse_command("people").unwrap(),
            ShellCommand::Open(View::List(ListKind::People))
        );
        assert_eq!(
            parse_command("  group g1 ").unwrap(),
            ShellCommand::Open(View::Thread(ThreadRef::group("g1")))
        );
    }

    #[test]
    fn test_parse_notifications_aliases() {
        assert_eq!(
            parse_command("notifications").unwrap(),
            ShellCommand::Notifications
        );
        assert_eq!(parse_command("log").unwrap(), ShellCommand::Notifications);
    }

    #[test]
    fn test_send_keeps_whole_text() {
        assert_eq!(
            parse_command("send hello there  world").unwrap(),
            ShellCommand::Send("hello there  world".into())
        );
    }

    #[test]
    fn test_missing_argument_is_usage_error() {
        assert_eq!(parse_command("send").unwrap_err(), "usage: send <text>");
        assert_eq!(parse_command("chat  ").unwrap_err(), "usage: chat <uid>");
    }

    #[test]
    fn test_unknown_and_blank_lines() {
        assert!(parse_command("dance").unwrap_err().contains("unknown command"));
        assert_eq!(parse_command("   ").unwrap_err(), "");
    }
}
