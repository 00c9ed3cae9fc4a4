use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap};
use ratatui::Terminal;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tracing::info;
use tracing::warn;

use runpanel_core::actions::{PanelAction, RuntimeAction, UserAction};
use runpanel_core::config::{AppMode, Config};
use runpanel_core::form::{FieldKind, InputForm};
use runpanel_core::reducer::{reduce, PanelEffect};
use runpanel_core::state::{NodeStatus, NoticeLevel, PanelState, RunStatus};
use runpanel_core::view::{
    detail_json, node_line, shows_empty_state, visible_tabs, ResultTab,
};
use runpanel_exec::{AppClient, RunController};

use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

const SYNTECT_THEME: &str = "base16-ocean.dark";

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn get_theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    selected_bg: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Cyan,
    success: Color::Green,
    warning: Color::Yellow,
    danger: Color::Red,
    muted: Color::DarkGray,
    border: Color::Gray,
    selected_bg: Color::DarkGray,
};

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableBracketedPaste,
            crossterm::cursor::Show
        );
    }
}

pub fn run(runtime: &Runtime, config: &Config, mode: Option<AppMode>) -> Result<()> {
    let client = Arc::new(AppClient::new(&config.api).context("failed to create api client")?);
    let mut state = PanelState::new(mode, config.ui.notice_capacity);

    let (tx, rx) = mpsc::channel();
    let mut controller = RunController::new(client.clone(), runtime.handle().clone(), tx.clone());
    spawn_bootstrap(runtime.handle(), client, tx);
    info!(base_url = %config.api.base_url, "panel started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut state, &mut controller, &rx);
    controller.shutdown();
    result.map_err(Into::into)
}

/// Fetch app info and the input form in the background.
fn spawn_bootstrap(runtime: &Handle, client: Arc<AppClient>, tx: mpsc::Sender<PanelAction>) {
    runtime.spawn(async move {
        match client.info().await {
            Ok(info) => {
                let _ = tx.send(PanelAction::Runtime(RuntimeAction::SetAppInfo(info)));
            }
            Err(err) => {
                warn!(error = %err, "app info request failed");
                let _ = tx.send(notify(NoticeLevel::Error, format!("app info: {err}")));
            }
        }
        match client.parameters().await {
            Ok(fields) => {
                let _ = tx.send(PanelAction::Runtime(RuntimeAction::SetFormFields(fields)));
            }
            Err(err) => {
                warn!(error = %err, "parameters request failed");
                let _ = tx.send(notify(NoticeLevel::Error, format!("parameters: {err}")));
            }
        }
    });
}

fn notify(level: NoticeLevel, message: impl Into<Arc<str>>) -> PanelAction {
    PanelAction::Runtime(RuntimeAction::Notify {
        level,
        message: message.into(),
    })
}

enum KeyHandlerResult {
    Continue(Vec<PanelEffect>),
    Exit,
}

fn user(state: &mut PanelState, action: UserAction) -> Vec<PanelEffect> {
    reduce(state, PanelAction::User(action))
}

fn handle_key_event(key: event::KeyEvent, state: &mut PanelState) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let effects = match key.code {
            KeyCode::Char('c') => return KeyHandlerResult::Exit,
            KeyCode::Char('r') => user(state, UserAction::SubmitRun),
            KeyCode::Char('x') => user(state, UserAction::CancelRun),
            KeyCode::Char('n') => user(state, UserAction::NextTab),
            KeyCode::Char('p') => user(state, UserAction::PrevTab),
            KeyCode::Char('y') => user(state, UserAction::CopyDetail),
            KeyCode::Char('d') => user(state, UserAction::DismissNotice),
            _ => Vec::new(),
        };
        return KeyHandlerResult::Continue(effects);
    }

    let effects = match key.code {
        KeyCode::Esc => return KeyHandlerResult::Exit,
        KeyCode::F(5) => user(state, UserAction::SubmitRun),
        KeyCode::Tab | KeyCode::Down => user(state, UserAction::FocusNextField),
        KeyCode::BackTab | KeyCode::Up => user(state, UserAction::FocusPrevField),
        KeyCode::Left => user(state, UserAction::PrevOption),
        KeyCode::Right => user(state, UserAction::NextOption),
        KeyCode::Backspace => user(state, UserAction::FieldBackspace),
        KeyCode::Enter => user(state, UserAction::FieldInput('\n')),
        KeyCode::Char(c) => user(state, UserAction::FieldInput(c)),
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn apply_effects(
    effects: Vec<PanelEffect>,
    state: &mut PanelState,
    controller: &mut RunController,
) {
    for effect in effects {
        match effect {
            PanelEffect::StartRun {
                run_id,
                inputs,
                files,
            } => {
                controller.start(run_id, state.header.mode, inputs, files);
            }
            PanelEffect::CancelRun { run_id } => controller.cancel(run_id),
            PanelEffect::CopyToClipboard(text) => {
                let copied = arboard::Clipboard::new()
                    .and_then(|mut clipboard| clipboard.set_text(text));
                let action = match copied {
                    Ok(()) => notify(NoticeLevel::Success, "Copied to clipboard"),
                    Err(err) => {
                        warn!(error = %err, "clipboard write failed");
                        notify(NoticeLevel::Error, format!("Copy failed: {err}"))
                    }
                };
                reduce(state, action);
            }
            PanelEffect::RequestFrame => {}
        }
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut PanelState,
    controller: &mut RunController,
    rx: &mpsc::Receiver<PanelAction>,
) -> io::Result<()> {
    loop {
        // Background actions (stream events, bootstrap results)
        while let Ok(action) = rx.try_recv() {
            let effects = reduce(state, action);
            apply_effects(effects, state, controller);
        }

        terminal.draw(|f| ui(f, state))?;

        if event::poll(Duration::from_millis(33))? {
            let effects = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key_event(key, state) {
                        KeyHandlerResult::Continue(effects) => effects,
                        KeyHandlerResult::Exit => return Ok(()),
                    }
                }
                Event::Paste(text) => user(state, UserAction::FieldPaste(text)),
                _ => Vec::new(),
            };
            apply_effects(effects, state, controller);
        }
    }
}

fn get_spinner() -> &'static str {
    let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    frames[(millis / 100) as usize % frames.len()]
}

fn ui(f: &mut ratatui::Frame, state: &PanelState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);
    render_form(f, body[0], &state.form);
    render_results(f, body[1], state);

    render_footer(f, chunks[2], state);
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let mode = state.header.mode.map(AppMode::label).unwrap_or("mode unknown");
    let status = if state.run.is_running() {
        format!("{} {}", get_spinner(), RunStatus::Running.label())
    } else {
        state.run.status.label().to_string()
    };
    let mut spans = vec![
        Span::styled(
            state.header.title().to_string(),
            Style::default()
                .fg(PALETTE.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", Style::default().fg(PALETTE.muted)),
        Span::raw(mode),
        Span::styled(" | ", Style::default().fg(PALETTE.muted)),
        Span::raw(status),
    ];
    if let Some(info) = state.header.info.as_ref().filter(|i| !i.description.is_empty()) {
        spans.push(Span::styled(" | ", Style::default().fg(PALETTE.muted)));
        spans.push(Span::styled(
            info.description.clone(),
            Style::default().fg(PALETTE.muted),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(PALETTE.border)),
    );
    f.render_widget(header, area);
}

fn render_form(f: &mut ratatui::Frame, area: Rect, form: &InputForm) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title("Inputs");

    if form.is_empty() {
        let p = Paragraph::new("No inputs. Press Ctrl-R to run.")
            .style(Style::default().fg(PALETTE.muted))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let mut lines = Vec::new();
    for (idx, field) in form.fields().iter().enumerate() {
        let focused = idx == form.focused();
        let marker = if focused { "▸ " } else { "  " };
        let mut label = vec![
            Span::styled(marker, Style::default().fg(PALETTE.accent)),
            Span::styled(
                field.label.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ];
        if field.required {
            label.push(Span::styled(" *", Style::default().fg(PALETTE.warning)));
        }
        label.push(Span::styled(
            format!(" ({})", field.kind.label()),
            Style::default().fg(PALETTE.muted),
        ));
        lines.push(Line::from(label));

        let value = form.value(idx).unwrap_or_default();
        let value_style = if focused {
            Style::default().bg(PALETTE.selected_bg)
        } else {
            Style::default()
        };
        match field.kind {
            FieldKind::File | FieldKind::FileList if value.is_empty() => {
                let hint = if field.kind == FieldKind::FileList {
                    "    local paths to upload, one per line"
                } else {
                    "    local path to upload"
                };
                let style = if focused {
                    value_style.fg(PALETTE.muted)
                } else {
                    Style::default().fg(PALETTE.muted)
                };
                lines.push(Line::from(Span::styled(hint, style)));
            }
            FieldKind::Select => lines.push(Line::from(Span::styled(
                format!("    < {} >", if value.is_empty() { "choose" } else { value }),
                value_style,
            ))),
            _ => {
                let mut value_lines = value.split('\n').peekable();
                if value_lines.peek().is_none() {
                    lines.push(Line::from(Span::styled("    ", value_style)));
                }
                for part in value_lines {
                    lines.push(Line::from(Span::styled(format!("    {part}"), value_style)));
                }
            }
        }
        if let Some(max) = field.max_length {
            let used = value.chars().count();
            let color = if used > max as usize {
                PALETTE.danger
            } else {
                PALETTE.muted
            };
            lines.push(Line::from(Span::styled(
                format!("    {used}/{max}"),
                Style::default().fg(color),
            )));
        }
        lines.push(Line::from(""));
    }

    let p = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn render_results(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title("Run");

    let run = &state.run;
    if shows_empty_state(run) {
        let p = Paragraph::new("Fill in the inputs and press Ctrl-R to run.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(PALETTE.muted))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let inner = block.inner(area);
    f.render_widget(block, area);

    let node_rows = (run.nodes.len() as u16).min(inner.height / 3);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(node_rows),
            Constraint::Length(if run.nodes.is_empty() { 0 } else { 1 }),
            Constraint::Min(0),
        ])
        .split(inner);

    let nodes: Vec<ListItem> = run
        .nodes
        .iter()
        .map(|node| {
            let color = match node.status {
                NodeStatus::Running => PALETTE.warning,
                NodeStatus::Success => PALETTE.success,
            };
            ListItem::new(Line::from(Span::styled(node_line(node), Style::default().fg(color))))
        })
        .collect();
    // Keep the latest nodes visible when the log outgrows its area.
    let skip = nodes.len().saturating_sub(node_rows as usize);
    f.render_widget(List::new(nodes.into_iter().skip(skip).collect::<Vec<_>>()), parts[0]);

    render_tabs(f, parts[2], state);
}

fn render_tabs(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let run = &state.run;
    let tabs = visible_tabs(run);
    let Some(selected) = state.routing.tab.filter(|tab| tabs.contains(tab)) else {
        // Still streaming: show the text as it arrives.
        let p = Paragraph::new(run.text.as_str()).wrap(Wrap { trim: false });
        f.render_widget(p, area);
        return;
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let titles: Vec<Line> = tabs.iter().map(|tab| Line::from(tab.label())).collect();
    let index = tabs.iter().position(|tab| *tab == selected).unwrap_or(0);
    let tab_bar = Tabs::new(titles)
        .select(index)
        .style(Style::default().fg(PALETTE.muted))
        .highlight_style(
            Style::default()
                .fg(PALETTE.accent)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tab_bar, parts[0]);

    match selected {
        ResultTab::Result => {
            let p = Paragraph::new(run.text.as_str()).wrap(Wrap { trim: false });
            f.render_widget(p, parts[1]);
        }
        ResultTab::Files => {
            let items: Vec<ListItem> = run
                .files
                .iter()
                .map(|file| {
                    let mut spans = vec![Span::styled(
                        file.display_name().to_string(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )];
                    if let Some(kind) = &file.file_type {
                        spans.push(Span::styled(
                            format!(" [{kind}]"),
                            Style::default().fg(PALETTE.muted),
                        ));
                    }
                    if let Some(url) = &file.url {
                        spans.push(Span::styled(
                            format!("  {url}"),
                            Style::default().fg(PALETTE.accent),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();
            f.render_widget(List::new(items), parts[1]);
        }
        ResultTab::Detail => {
            let p = Paragraph::new(highlight_json(&detail_json(run)));
            f.render_widget(p, parts[1]);
        }
    }
}

fn highlight_json(json: &str) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let ts = get_theme_set();
    let Some(theme) = ts.themes.get(SYNTECT_THEME) else {
        return json.lines().map(|l| Line::from(l.to_string())).collect();
    };
    let syntax = ps
        .find_syntax_by_extension("json")
        .unwrap_or_else(|| ps.find_syntax_plain_text());
    let mut h = HighlightLines::new(syntax, theme);

    json.lines()
        .map(|line| {
            let ranges: Vec<(syntect::highlighting::Style, &str)> =
                h.highlight_line(line, ps).unwrap_or_default();
            if ranges.is_empty() {
                return Line::from(line.to_string());
            }
            let spans: Vec<Span<'static>> = ranges
                .into_iter()
                .map(|(style, text)| {
                    let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                    Span::styled(text.to_string(), Style::default().fg(fg))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn render_footer(f: &mut ratatui::Frame, area: Rect, state: &PanelState) {
    let mut spans = Vec::new();
    if let Some(notice) = state.notices.latest() {
        let color = match notice.level {
            NoticeLevel::Info => PALETTE.accent,
            NoticeLevel::Success => PALETTE.success,
            NoticeLevel::Error => PALETTE.danger,
        };
        spans.push(Span::styled(
            format!("{} ", notice.message),
            Style::default().fg(color),
        ));
        spans.push(Span::styled("| ", Style::default().fg(PALETTE.muted)));
    }
    let hints: [(&str, &str); 6] = [
        ("^R", " run "),
        ("^X", " cancel "),
        ("^N/^P", " tabs "),
        ("^Y", " copy "),
        ("^D", " dismiss "),
        ("Esc", " quit"),
    ];
    for (key, label) in hints {
        spans.push(Span::styled(key, Style::default().fg(PALETTE.accent)));
        spans.push(Span::styled(label, Style::default().fg(PALETTE.muted)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
