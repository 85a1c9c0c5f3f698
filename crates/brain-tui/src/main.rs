//! brain-tui - Terminal viewer for project brain tasks and sync status
//!
//! Draws on the main thread; HTTP work runs on a tokio runtime and reports
//! back over a channel drained on every tick.

use anyhow::Result;
use brain_core::config::state_dir;
use brain_core::{
    BrainClient, CommitRequest, Config, Error, PollerHandle, Priority, RowState, Session,
    SessionStore, Status, SyncPoller, SyncSnapshot, TaskEditor, TaskFilter, TaskRecord,
    TaskStore, TaskUpdater,
};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::io;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::watch;

mod ui;

const LOG_FILE: &str = "brain-tui.log";
const PAGE_SIZE: usize = 20;

#[derive(Parser)]
#[command(name = "brain-tui")]
#[command(about = "Terminal viewer for project brain tasks and sync status")]
#[command(version)]
struct Cli {
    /// Tasks endpoint (overrides config and BRAIN_TASKS_URL)
    #[arg(long)]
    tasks_url: Option<String>,

    /// Sync service base URL (overrides config and BRAIN_SYNC_URL)
    #[arg(long)]
    sync_url: Option<String>,
}

/// Log to a file in the state directory; the terminal belongs to the UI.
fn init_tracing() -> Result<()> {
    let dir = state_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let (mut config, _) = Config::resolve()?;
    if let Some(url) = cli.tasks_url {
        config.endpoints.tasks_url = url;
    }
    if let Some(url) = cli.sync_url {
        config.endpoints.sync_base_url = url;
    }

    let runtime = Runtime::new()?;
    let app = {
        let _guard = runtime.enter();
        App::new(config, &runtime)?
    };
    run_tui(app)
}

fn run_tui(mut app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{:?}", err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();
    const TICK_RATE: Duration = Duration::from_millis(250);

    loop {
        terminal.draw(|f| ui::ui(f, app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
        {
            let action = parse_key_action(key);
            if app.handle_key_action(action)? {
                return Ok(());
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppMode {
    Login,
    Normal,
    Search,
    Filter(FilterKind),
    Edit,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    Status,
    Priority,
}

#[derive(Debug, Clone, PartialEq)]
enum KeyAction {
    Quit,
    Up,
    Down,
    Left,
    Right,
    PageDown,
    PageUp,
    Enter,
    Tab,
    Escape,
    Backspace,
    Char(char),
    Noop,
}

// Letters are passed through as chars so text fields can receive them;
// each mode decides what j/k/h/l mean.
fn parse_key_action(key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::PageDown,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::PageUp,
        KeyCode::Up => KeyAction::Up,
        KeyCode::Down => KeyAction::Down,
        KeyCode::Left => KeyAction::Left,
        KeyCode::Right => KeyAction::Right,
        KeyCode::PageDown => KeyAction::PageDown,
        KeyCode::PageUp => KeyAction::PageUp,
        KeyCode::Enter => KeyAction::Enter,
        KeyCode::Tab | KeyCode::BackTab => KeyAction::Tab,
        KeyCode::Esc => KeyAction::Escape,
        KeyCode::Backspace => KeyAction::Backspace,
        KeyCode::Char(c) => KeyAction::Char(c),
        _ => KeyAction::Noop,
    }
}

/// Work finished on the runtime
enum AppEvent {
    CommitFinished(CommitRequest, brain_core::Result<()>),
    Reloaded(TaskStore),
}

#[derive(Debug, Default)]
struct SelectionState {
    index: usize,
    offset: usize,
}

impl SelectionState {
    fn next(&mut self, max: usize, page_size: usize) {
        if max == 0 {
            return;
        }
        self.index = (self.index + 1).min(max - 1);
        self.adjust_offset(page_size);
    }

    fn previous(&mut self) {
        self.index = self.index.saturating_sub(1);
        self.adjust_offset(0);
    }

    fn top(&mut self) {
        self.index = 0;
        self.offset = 0;
    }

    fn bottom(&mut self, max: usize, page_size: usize) {
        if max == 0 {
            return;
        }
        self.index = max - 1;
        if self.index >= self.offset + page_size {
            self.offset = max.saturating_sub(page_size);
        }
    }

    fn page_down(&mut self, max: usize, page_size: usize) {
        if max == 0 {
            return;
        }
        self.index = (self.index + page_size).min(max - 1);
        self.adjust_offset(page_size);
    }

    fn page_up(&mut self, page_size: usize) {
        self.index = self.index.saturating_sub(page_size);
        self.adjust_offset(0);
    }

    fn clamp(&mut self, max: usize) {
        if self.index >= max {
            self.index = max.saturating_sub(1);
        }
        if self.offset > self.index {
            self.offset = self.index;
        }
    }

    fn adjust_offset(&mut self, page_size: usize) {
        if self.index < self.offset {
            self.offset = self.index;
        } else if page_size > 0 && self.index >= self.offset + page_size {
            self.offset = self.index.saturating_sub(page_size - 1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Default)]
struct LoginForm {
    username: String,
    password: String,
    field: LoginField,
    error: Option<String>,
}

impl LoginForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditField {
    Status,
    Comment,
}

/// Which row the edit overlay is showing; the draft itself lives in the editor
#[derive(Debug)]
struct EditForm {
    task_id: String,
    field: EditField,
}

fn cycle_status(current: Status, forward: bool) -> Status {
    let all = Status::ALL;
    let idx = all.iter().position(|s| *s == current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % all.len()
    } else {
        (idx + all.len() - 1) % all.len()
    };
    all[next]
}

struct App {
    config: Config,
    runtime: tokio::runtime::Handle,
    client: Arc<BrainClient>,

    store: TaskStore,
    editor: TaskEditor,
    filter: TaskFilter,

    mode: AppMode,
    g_prefix: bool,
    selection: SelectionState,
    reloading: bool,

    sessions: SessionStore,
    session: Option<Session>,
    login: LoginForm,
    edit: Option<EditForm>,

    // Kept alive for the lifetime of the view; dropping it stops polling.
    poller: PollerHandle,
    sync_rx: watch::Receiver<SyncSnapshot>,
    sync: SyncSnapshot,

    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,

    status_message: Option<String>,
    status_message_time: Option<Instant>,
}

impl App {
    /// Must be called inside the runtime context (the poller is spawned here).
    fn new(config: Config, runtime: &Runtime) -> Result<Self> {
        let client = Arc::new(BrainClient::from_config(&config)?);
        let store = runtime.block_on(TaskStore::load(client.as_ref()));

        let poller = SyncPoller::spawn(client.clone(), config.sync.poller_config());
        let sync_rx = poller.subscribe();
        let sync = poller.snapshot();

        let sessions = SessionStore::open_default(config.auth.session_hours)?;
        let session = sessions.current(Utc::now())?;
        let mode = if session.is_some() {
            AppMode::Normal
        } else {
            AppMode::Login
        };

        let (events_tx, events_rx) = mpsc::channel();

        Ok(Self {
            config,
            runtime: runtime.handle().clone(),
            client,
            store,
            editor: TaskEditor::new(),
            filter: TaskFilter::new(),
            mode,
            g_prefix: false,
            selection: SelectionState::default(),
            reloading: false,
            sessions,
            session,
            login: LoginForm::default(),
            edit: None,
            poller,
            sync_rx,
            sync,
            events_tx,
            events_rx,
            status_message: None,
            status_message_time: None,
        })
    }

    fn visible(&self) -> Vec<&TaskRecord> {
        self.store.view(&self.filter)
    }

    fn current_task(&self) -> Option<&TaskRecord> {
        self.visible().get(self.selection.index).copied()
    }

    fn row_state(&self, task_id: &str) -> RowState {
        self.editor.state(task_id)
    }

    fn filters_changed(&mut self) {
        let count = self.visible().len();
        self.selection.clamp(count);
        self.show_status(format!("Showing {} of {} tasks", count, self.store.len()));
    }

    fn show_status(&mut self, msg: String) {
        self.status_message = Some(msg);
        self.status_message_time = Some(Instant::now());
    }

    fn on_tick(&mut self) {
        if let Some(time) = self.status_message_time
            && time.elapsed() > Duration::from_secs(3)
        {
            self.status_message = None;
            self.status_message_time = None;
        }

        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }

        if self.sync_rx.has_changed().unwrap_or(false) {
            self.sync = self.sync_rx.borrow_and_update().clone();
        }

        if let Some(session) = &self.session
            && Utc::now() >= session.expires_at
        {
            self.end_session(Some("Session expired, please log in again".to_string()));
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::CommitFinished(request, outcome) => {
                match self
                    .editor
                    .finish_commit(&mut self.store, &request, outcome, Utc::now())
                {
                    Ok(task) => self.show_status(format!(
                        "✓ {} → {} ({}%)",
                        task.id,
                        task.status.label(),
                        task.display_progress()
                    )),
                    Err(e) => self.show_status(format!(
                        "Update of {} failed: {} (press e to retry)",
                        request.task_id, e
                    )),
                }
            }
            AppEvent::Reloaded(store) => {
                self.reloading = false;
                self.store = store;
                self.editor.discard_drafts();
                if self.mode == AppMode::Edit {
                    self.mode = AppMode::Normal;
                    self.edit = None;
                }
                let count = self.visible().len();
                self.selection.clamp(count);
                self.show_status(format!(
                    "Loaded {} tasks ({})",
                    self.store.len(),
                    self.store.origin()
                ));
            }
        }
    }

    fn reload_tasks(&mut self) {
        if self.reloading {
            return;
        }
        self.reloading = true;
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let store = TaskStore::load(client.as_ref()).await;
            if tx.send(AppEvent::Reloaded(store)).is_err() {
                tracing::debug!("viewer closed before reload finished");
            }
        });
        self.show_status("Reloading tasks...".to_string());
    }

    fn end_session(&mut self, reason: Option<String>) {
        if let Err(e) = self.sessions.logout() {
            tracing::warn!(error = %e, "could not clear session");
        }
        self.session = None;
        self.edit = None;
        self.login = LoginForm {
            error: reason,
            ..LoginForm::default()
        };
        self.mode = AppMode::Login;
    }

    fn handle_key_action(&mut self, action: KeyAction) -> Result<bool> {
        if action == KeyAction::Quit {
            return Ok(true);
        }
        match self.mode {
            AppMode::Login => self.handle_login_mode(action),
            AppMode::Normal => self.handle_normal_mode(action),
            AppMode::Search => self.handle_search_mode(action),
            AppMode::Filter(kind) => self.handle_filter_mode(kind, action),
            AppMode::Edit => self.handle_edit_mode(action),
            AppMode::Help => self.handle_help_mode(action),
        }
    }

    fn handle_login_mode(&mut self, action: KeyAction) -> Result<bool> {
        match action {
            KeyAction::Escape => {
                self.login = LoginForm::default();
            }
            KeyAction::Tab | KeyAction::Up | KeyAction::Down => self.login.toggle_field(),
            KeyAction::Backspace => {
                self.login.focused_mut().pop();
            }
            KeyAction::Char(c) => self.login.focused_mut().push(c),
            KeyAction::Enter => match self.login.field {
                LoginField::Username => self.login.field = LoginField::Password,
                LoginField::Password => self.attempt_login(),
            },
            _ => {}
        }
        Ok(false)
    }

    fn attempt_login(&mut self) {
        let result = self.sessions.login(
            &self.config.auth.users,
            self.login.username.trim(),
            &self.login.password,
            Utc::now(),
        );
        match result {
            Ok(session) => {
                let name = session.user.display_name.clone();
                self.session = Some(session);
                self.login = LoginForm::default();
                self.mode = AppMode::Normal;
                self.show_status(format!("Welcome, {}", name));
            }
            Err(Error::InvalidCredentials) => {
                self.login.password.clear();
                self.login.field = LoginField::Password;
                self.login.error = Some(if self.config.auth.users.is_empty() {
                    "No users configured; add [[auth.users]] to the config file".to_string()
                } else {
                    "Invalid username or password".to_string()
                });
            }
            Err(e) => self.login.error = Some(e.to_string()),
        }
    }

    fn handle_normal_mode(&mut self, action: KeyAction) -> Result<bool> {
        let count = self.visible().len();
        match action {
            KeyAction::Char('q') => return Ok(true),
            KeyAction::Escape => {
                self.g_prefix = false;
            }
            KeyAction::Up | KeyAction::Char('k') => self.selection.previous(),
            KeyAction::Down | KeyAction::Char('j') => self.selection.next(count, PAGE_SIZE),
            KeyAction::PageDown => self.selection.page_down(count, PAGE_SIZE),
            KeyAction::PageUp => self.selection.page_up(PAGE_SIZE),
            KeyAction::Char('g') => {
                if self.g_prefix {
                    self.selection.top();
                    self.g_prefix = false;
                } else {
                    self.g_prefix = true;
                }
                return Ok(false);
            }
            KeyAction::Char('G') => self.selection.bottom(count, PAGE_SIZE),
            KeyAction::Enter | KeyAction::Char('e') => self.start_edit(),
            KeyAction::Char('/') => {
                self.mode = AppMode::Search;
            }
            KeyAction::Char('s') => {
                self.mode = AppMode::Filter(FilterKind::Status);
            }
            KeyAction::Char('p') => {
                self.mode = AppMode::Filter(FilterKind::Priority);
            }
            KeyAction::Char('c') => {
                self.filter = TaskFilter::new();
                self.filters_changed();
            }
            KeyAction::Char('R') => self.reload_tasks(),
            KeyAction::Char('r') => {
                self.poller.refresh();
                self.show_status("Checking sync status...".to_string());
            }
            KeyAction::Char('S') => {
                self.poller.trigger();
                self.show_status("Manual sync requested".to_string());
            }
            KeyAction::Char('x') => self.poller.dismiss(),
            KeyAction::Char('L') => self.end_session(None),
            KeyAction::Char('?') => {
                self.mode = AppMode::Help;
            }
            _ => {}
        }
        self.g_prefix = false;
        Ok(false)
    }

    fn handle_search_mode(&mut self, action: KeyAction) -> Result<bool> {
        match action {
            KeyAction::Escape => {
                self.filter.text.clear();
                self.mode = AppMode::Normal;
                self.filters_changed();
            }
            KeyAction::Enter => {
                self.mode = AppMode::Normal;
            }
            KeyAction::Backspace => {
                self.filter.text.pop();
                self.filters_changed();
            }
            KeyAction::Char(c) => {
                self.filter.text.push(c);
                self.filters_changed();
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_filter_mode(&mut self, kind: FilterKind, action: KeyAction) -> Result<bool> {
        match action {
            KeyAction::Escape => {
                self.mode = AppMode::Normal;
            }
            KeyAction::Char('0') | KeyAction::Char('a') => {
                match kind {
                    FilterKind::Status => self.filter.status = None,
                    FilterKind::Priority => self.filter.priority = None,
                }
                self.mode = AppMode::Normal;
                self.filters_changed();
            }
            KeyAction::Char(c) if c.is_ascii_digit() => {
                let idx = c as usize - '1' as usize;
                let applied = match kind {
                    FilterKind::Status => Status::ALL
                        .get(idx)
                        .map(|s| self.filter.status = Some(*s))
                        .is_some(),
                    FilterKind::Priority => Priority::ALL
                        .get(idx)
                        .map(|p| self.filter.priority = Some(*p))
                        .is_some(),
                };
                if applied {
                    self.mode = AppMode::Normal;
                    self.filters_changed();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn start_edit(&mut self) {
        let Some(task_id) = self.current_task().map(|t| t.id.clone()) else {
            return;
        };
        match self.editor.begin_edit(&self.store, &task_id) {
            Ok(()) => {
                self.edit = Some(EditForm {
                    task_id,
                    field: EditField::Status,
                });
                self.mode = AppMode::Edit;
            }
            Err(e) => self.show_status(e.to_string()),
        }
    }

    fn handle_edit_mode(&mut self, action: KeyAction) -> Result<bool> {
        let Some((task_id, field)) = self.edit.as_ref().map(|e| (e.task_id.clone(), e.field))
        else {
            self.mode = AppMode::Normal;
            return Ok(false);
        };
        let Some(draft) = self.editor.draft(&task_id).cloned() else {
            self.edit = None;
            self.mode = AppMode::Normal;
            return Ok(false);
        };

        match (action, field) {
            (KeyAction::Escape, _) => {
                if let Err(e) = self.editor.cancel(&task_id) {
                    tracing::debug!(error = %e, "cancel ignored");
                }
                self.edit = None;
                self.mode = AppMode::Normal;
                self.show_status("Edit cancelled".to_string());
            }
            (KeyAction::Tab, _) => {
                if let Some(edit) = self.edit.as_mut() {
                    edit.field = match edit.field {
                        EditField::Status => EditField::Comment,
                        EditField::Comment => EditField::Status,
                    };
                }
            }
            (KeyAction::Enter, _) => self.commit_edit(&task_id),
            (KeyAction::Up | KeyAction::Left, EditField::Status)
            | (KeyAction::Char('k') | KeyAction::Char('h'), EditField::Status) => {
                self.editor
                    .stage_status(&task_id, cycle_status(draft.status, false))?;
            }
            (KeyAction::Down | KeyAction::Right, EditField::Status)
            | (KeyAction::Char('j') | KeyAction::Char('l'), EditField::Status) => {
                self.editor
                    .stage_status(&task_id, cycle_status(draft.status, true))?;
            }
            (KeyAction::Char(c), EditField::Status) if c.is_ascii_digit() => {
                if let Some(status) = (c as usize)
                    .checked_sub('1' as usize)
                    .and_then(|i| Status::ALL.get(i))
                {
                    self.editor.stage_status(&task_id, *status)?;
                }
            }
            (KeyAction::Char(c), EditField::Comment) => {
                let mut comment = draft.comment;
                comment.push(c);
                self.editor.stage_comment(&task_id, comment)?;
            }
            (KeyAction::Backspace, EditField::Comment) => {
                let mut comment = draft.comment;
                comment.pop();
                self.editor.stage_comment(&task_id, comment)?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn commit_edit(&mut self, task_id: &str) {
        let request = match self.editor.begin_commit(task_id) {
            Ok(request) => request,
            Err(e) => {
                self.show_status(e.to_string());
                return;
            }
        };

        let updater = self.client.clone();
        let tx = self.events_tx.clone();
        let pending = request.clone();
        self.runtime.spawn(async move {
            let outcome = updater
                .update_status(&pending.task_id, pending.status, pending.comment.as_deref())
                .await;
            if tx.send(AppEvent::CommitFinished(pending, outcome)).is_err() {
                tracing::debug!("viewer closed before update finished");
            }
        });

        self.edit = None;
        self.mode = AppMode::Normal;
        self.show_status(format!("Updating {}...", request.task_id));
    }

    fn handle_help_mode(&mut self, action: KeyAction) -> Result<bool> {
        if matches!(
            action,
            KeyAction::Escape | KeyAction::Char('q') | KeyAction::Char('?')
        ) {
            self.mode = AppMode::Normal;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_reach_text_fields() {
        let key = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(parse_key_action(key), KeyAction::Char('j'));
        let quit = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(parse_key_action(quit), KeyAction::Quit);
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let mut selection = SelectionState::default();
        selection.next(3, PAGE_SIZE);
        selection.next(3, PAGE_SIZE);
        selection.next(3, PAGE_SIZE);
        assert_eq!(selection.index, 2);

        selection.clamp(1);
        assert_eq!(selection.index, 0);
        selection.previous();
        assert_eq!(selection.index, 0);
    }

    #[test]
    fn test_cycle_status_wraps() {
        assert_eq!(cycle_status(Status::Pending, true), Status::InProgress);
        assert_eq!(cycle_status(Status::Pending, false), Status::Cancelled);
        assert_eq!(cycle_status(Status::Cancelled, true), Status::Pending);
    }
}
