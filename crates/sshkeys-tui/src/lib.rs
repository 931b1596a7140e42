use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use sshkeys_config::AppConfig;
use sshkeys_core::{AppEvent, Direction, EventSender, Reconciler, ToggleOutcome};
use sshkeys_keychain::{AgentManager, Key};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub async fn run(config: AppConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    config: AppConfig,
) -> Result<()> {
    let mut event_stream = EventStream::new();
    let (events, mut event_rx) = EventSender::channel(16);
    let root = config.keys_root();
    events.spawn_scan(root.clone());
    events.spawn_agent(config.agent.socket.clone());
    let mut app = AppState::new(config, root, events);

    loop {
        app.reconciler.refresh_loaded();
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                if let Some(Ok(event)) = maybe_event {
                    if app.handle_event(event) {
                        break;
                    }
                }
            }
            maybe_app = event_rx.recv() => {
                if let Some(event) = maybe_app {
                    app.handle_app_event(event)?;
                }
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    text: Color,
    muted: Color,
    loaded: Color,
    error: Color,
    selection_bg: Color,
}

impl Theme {
    fn terminal() -> Self {
        Self {
            accent: Color::LightCyan,
            accent_soft: Color::Cyan,
            text: Color::White,
            muted: Color::Gray,
            loaded: Color::LightGreen,
            error: Color::LightRed,
            selection_bg: Color::DarkGray,
        }
    }
}

#[derive(Clone, Debug)]
enum Status {
    Info(String),
    Error(String),
}

struct AppState {
    config: AppConfig,
    root: PathBuf,
    theme: Theme,
    events: EventSender,
    reconciler: Reconciler,
    agent: Option<Arc<Mutex<AgentManager>>>,
    keys_ready: bool,
    pending_toggle: Option<usize>,
    status: Option<Status>,
}

impl AppState {
    fn new(config: AppConfig, root: PathBuf, events: EventSender) -> Self {
        Self {
            config,
            root,
            theme: Theme::terminal(),
            events,
            reconciler: Reconciler::default(),
            agent: None,
            keys_ready: false,
            pending_toggle: None,
            status: None,
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(f.area());
        self.draw_header(f, layout[0]);
        if self.reconciler.keys().is_empty() {
            self.draw_empty(f, layout[1]);
        } else {
            self.draw_key_list(f, layout[1]);
        }
        self.draw_footer(f, layout[2]);
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let mut spans = vec![Span::styled(
            "Found private keys",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )];
        if self.keys_ready {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!(
                    "{} total, {} in agent",
                    self.reconciler.keys().len(),
                    self.reconciler.loaded_count()
                ),
                Style::default().fg(theme.accent_soft),
            ));
        }
        if self.config.ui.show_path {
            if let Some(key) = self.reconciler.selected_key() {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    key.path.display().to_string(),
                    Style::default().fg(theme.muted),
                ));
            }
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        let paragraph = Paragraph::new(Text::from(Line::from(spans))).block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_key_list(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        let selected = self.reconciler.selected();
        let items: Vec<ListItem> = self
            .reconciler
            .keys()
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let mut style = if key.loaded {
                    Style::default().fg(theme.loaded)
                } else {
                    Style::default().fg(theme.text)
                };
                let marker = if i == selected {
                    style = style.bg(theme.selection_bg).add_modifier(Modifier::BOLD);
                    "-> "
                } else {
                    "   "
                };
                let mut spans = vec![Span::styled(format!("{marker}{key}"), style)];
                spans.extend(self.key_tags(key, i));
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }

    fn key_tags(&self, key: &Key, index: usize) -> Vec<Span<'static>> {
        let muted = Style::default().fg(self.theme.muted);
        let mut tags = Vec::new();
        if self.config.ui.show_format {
            tags.push(Span::styled(format!("  [{}]", key.format), muted));
        }
        if key.is_encrypted() {
            tags.push(Span::styled("  (passphrase)", muted));
        }
        if self.pending_toggle == Some(index) {
            tags.push(Span::styled("  ...", muted));
        }
        tags
    }

    fn draw_empty(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let message = if self.keys_ready {
            format!("No private keys found in {}", self.root.display())
        } else {
            format!("Searching {} ...", self.root.display())
        };
        let paragraph = Paragraph::new(message)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.accent_soft)),
            )
            .style(Style::default().fg(theme.text));
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let line = match &self.status {
            Some(Status::Error(message)) => {
                Line::from(Span::styled(message.clone(), Style::default().fg(theme.error)))
            }
            Some(Status::Info(message)) => {
                Line::from(Span::styled(message.clone(), Style::default().fg(theme.accent)))
            }
            None => Line::from(Span::styled(
                "enter/space: load or unload  up/down: move  q, ctrl+c: exit",
                Style::default().fg(theme.accent_soft),
            )),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        let paragraph = Paragraph::new(Text::from(line))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }

    /// Returns true when the user asked to quit.
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) => {
                if matches!(key.kind, KeyEventKind::Release) {
                    return false;
                }
                self.handle_key(key)
            }
            _ => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
        {
            return true;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up | KeyCode::Char('k') => self.reconciler.move_cursor(Direction::Up),
            KeyCode::Down | KeyCode::Char('j') => self.reconciler.move_cursor(Direction::Down),
            KeyCode::Enter | KeyCode::Char(' ') => self.start_toggle(),
            _ => {}
        }
        false
    }

    fn start_toggle(&mut self) {
        if self.pending_toggle.is_some() {
            return;
        }
        let Some(agent) = self.agent.clone() else {
            self.set_status(Status::Info("waiting for ssh-agent".to_string()));
            return;
        };
        let Some(action) = self.reconciler.plan_toggle() else {
            return;
        };
        self.pending_toggle = Some(action.index());
        self.status = None;
        self.events.spawn_toggle(action, agent);
    }

    fn handle_app_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::KeysScanned(result) => {
                let keys = result.context("failed to load private keys")?;
                info!(count = keys.len(), "keys ready");
                self.reconciler.set_keys(keys);
                self.keys_ready = true;
            }
            AppEvent::AgentReady(result) => {
                let (agent, identities) =
                    result.context("failed to get list of ssh keys from agent")?;
                info!(
                    endpoint = %agent.endpoint().display(),
                    identities = identities.len(),
                    "agent ready"
                );
                self.reconciler.set_identities(identities);
                self.agent = Some(Arc::new(Mutex::new(agent)));
            }
            AppEvent::Toggled(result) => {
                self.pending_toggle = None;
                match result {
                    Ok(outcome) => {
                        let message = self.outcome_message(&outcome);
                        self.reconciler.record(outcome);
                        self.set_status(Status::Info(message));
                    }
                    Err(err) => {
                        warn!(error = %err, "toggle failed");
                        self.set_status(Status::Error(err.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    fn outcome_message(&self, outcome: &ToggleOutcome) -> String {
        let name = self
            .reconciler
            .keys()
            .get(outcome.index())
            .map(|key| key.name.clone())
            .unwrap_or_default();
        match outcome {
            ToggleOutcome::Loaded { .. } => format!("loaded {name} into ssh-agent"),
            ToggleOutcome::Unloaded { .. } => format!("removed {name} from ssh-agent"),
        }
    }
}
