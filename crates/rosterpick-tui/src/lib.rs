// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use rosterpick_app::{
    BackendSignal, DataProvider, FieldState, ListItem, MultiSelection, PickerCommand,
    PickerController, PickerEvent, SearchField, Selection,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::{debug, info, warn};

const HALF_PAGE_ROWS: isize = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(120);
const CHECK_MARK_ON: &str = "[x]";
const CHECK_MARK_OFF: &str = "[ ]";

type PickerTerminal = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    Backend(BackendSignal),
}

/// Brings the backend up and reports its state on `tx`. Called once before
/// the first frame; implementations that need time must not block here.
pub trait BackendConnector {
    fn connect(&mut self, tx: Sender<InternalEvent>) -> Result<()>;
}

pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout).context("poll event")? {
            return event::read().context("read event").map(Some);
        }
        Ok(None)
    }
}

/// How the picker ended. Cancelling produces no result for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Selected(Selection),
    SelectedMany(MultiSelection),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    notice: Option<String>,
}

pub fn run_picker<P, C>(
    controller: &mut PickerController<P, FieldState>,
    connector: &mut C,
) -> Result<PickerOutcome>
where
    P: DataProvider,
    C: BackendConnector + ?Sized,
{
    run_picker_with(controller, connector, &mut TerminalEvents, true)
}

/// Runs the picker loop against any event source. With `draw` off nothing
/// touches the terminal, which is how the loop is exercised headless.
pub fn run_picker_with<P, C>(
    controller: &mut PickerController<P, FieldState>,
    connector: &mut C,
    events: &mut dyn EventSource,
    draw: bool,
) -> Result<PickerOutcome>
where
    P: DataProvider,
    C: BackendConnector + ?Sized,
{
    let (internal_tx, internal_rx) = mpsc::channel();
    connector
        .connect(internal_tx)
        .context("connect backend -- check the database path and retry")?;

    let mut terminal = if draw {
        Some(enter_terminal()?)
    } else {
        None
    };

    let mut view_data = ViewData::default();
    let result = drive(
        controller,
        &internal_rx,
        events,
        &mut terminal,
        &mut view_data,
    );

    if terminal.is_some() {
        restore_terminal()?;
    }
    result
}

fn enter_terminal() -> Result<PickerTerminal> {
    enable_raw_mode().context("enable raw mode")?;
    undo_on_error(open_alternate_screen(), restore_terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    Ok(())
}

/// Runs `undo` when `result` failed and hands the original error back.
fn undo_on_error<T>(result: Result<T>, undo: impl FnOnce() -> Result<()>) -> Result<T> {
    if result.is_err()
        && let Err(error) = undo()
    {
        warn!("terminal restore after failed setup: {error:#}");
    }
    result
}

fn open_alternate_screen() -> Result<PickerTerminal> {
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")
}

fn drive<P: DataProvider>(
    controller: &mut PickerController<P, FieldState>,
    internal_rx: &Receiver<InternalEvent>,
    events: &mut dyn EventSource,
    terminal: &mut Option<PickerTerminal>,
    view_data: &mut ViewData,
) -> Result<PickerOutcome> {
    let opening = controller.start();
    if let Some(outcome) = absorb_events(view_data, opening) {
        return Ok(outcome);
    }

    loop {
        if let Some(outcome) = process_internal_events(controller, view_data, internal_rx) {
            return Ok(outcome);
        }

        layout_search_field(controller);
        if let Some(terminal) = terminal.as_mut() {
            terminal
                .draw(|frame| render(frame, controller, view_data))
                .context("draw frame")?;
        }
        controller.run_deferred();

        match events.poll(POLL_INTERVAL)? {
            Some(Event::Key(key)) => {
                if let Some(outcome) = handle_key_event(controller, view_data, key) {
                    return Ok(outcome);
                }
            }
            Some(Event::Resize(_, _)) => {}
            _ => {}
        }
    }
}

fn process_internal_events<P: DataProvider>(
    controller: &mut PickerController<P, FieldState>,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) -> Option<PickerOutcome> {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::Backend(signal) => {
                let events = controller.dispatch(PickerCommand::Backend(signal));
                if let Some(outcome) = absorb_events(view_data, events) {
                    return Some(outcome);
                }
            }
        }
    }
    None
}

/// The search field exists on screen only while the search is expanded.
fn layout_search_field<P: DataProvider>(controller: &mut PickerController<P, FieldState>) {
    let expanded = controller.search().is_expanded();
    let field = controller.field_mut();
    if expanded && !field.is_attached() {
        field.attach();
    } else if !expanded && field.is_attached() {
        field.detach();
    }
}

fn absorb_events(view_data: &mut ViewData, events: Vec<PickerEvent>) -> Option<PickerOutcome> {
    for event in events {
        match event {
            PickerEvent::Selected(selection) => return Some(PickerOutcome::Selected(selection)),
            PickerEvent::SelectedMany(selection) => {
                return Some(PickerOutcome::SelectedMany(selection));
            }
            PickerEvent::Cancelled => return Some(PickerOutcome::Cancelled),
            PickerEvent::QueryBuffered { .. } => {
                view_data.notice = Some("search waits for the backend".to_owned());
            }
            PickerEvent::BackendLost => {
                view_data.notice = Some("backend lost, reconnecting".to_owned());
            }
            PickerEvent::BackendReady => view_data.notice = None,
            PickerEvent::CheckedChanged {
                identifier,
                checked,
            } => {
                let verb = if checked { "checked" } else { "unchecked" };
                view_data.notice = Some(format!("{verb} {identifier}"));
            }
            PickerEvent::SearchExpanded
            | PickerEvent::SearchCollapsed
            | PickerEvent::ListRendered { .. } => {}
        }
    }
    None
}

fn handle_key_event<P: DataProvider>(
    controller: &mut PickerController<P, FieldState>,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<PickerOutcome> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        info!("picker interrupted");
        return Some(PickerOutcome::Cancelled);
    }

    let command = command_for_key(
        key,
        controller.search().is_expanded(),
        controller.request().multiple,
    )?;
    debug!(?command, "key command");
    let events = controller.dispatch(command);
    absorb_events(view_data, events)
}

fn command_for_key(key: KeyEvent, expanded: bool, multiple: bool) -> Option<PickerCommand> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (key.code, expanded) {
        (KeyCode::Char('f'), false) if ctrl => Some(PickerCommand::Expand),
        (KeyCode::Char('u'), true) if ctrl => Some(PickerCommand::ClearText),
        _ if ctrl => None,
        (KeyCode::Esc, _) => Some(PickerCommand::Back),
        (KeyCode::Up, _) => Some(PickerCommand::MoveCursor(-1)),
        (KeyCode::Down, _) => Some(PickerCommand::MoveCursor(1)),
        (KeyCode::PageUp, _) => Some(PickerCommand::MoveCursor(-HALF_PAGE_ROWS)),
        (KeyCode::PageDown, _) => Some(PickerCommand::MoveCursor(HALF_PAGE_ROWS)),
        (KeyCode::Tab, _) if multiple => Some(PickerCommand::ToggleCursor),
        (KeyCode::Enter, _) if multiple => Some(PickerCommand::SubmitChecked),
        (KeyCode::Enter, true) => Some(PickerCommand::Submit),
        (KeyCode::Enter, _) => Some(PickerCommand::ActivateCursor),
        (KeyCode::Backspace, true) => Some(PickerCommand::Backspace),
        (KeyCode::Char(ch), true) => Some(PickerCommand::InsertChar(ch)),
        (KeyCode::Char('/'), false) => Some(PickerCommand::Expand),
        (KeyCode::Char('q'), false) => Some(PickerCommand::Back),
        (KeyCode::Char('k'), false) => Some(PickerCommand::MoveCursor(-1)),
        (KeyCode::Char('j'), false) => Some(PickerCommand::MoveCursor(1)),
        (KeyCode::Char(' '), false) if multiple => Some(PickerCommand::ToggleCursor),
        _ => None,
    }
}

fn render<P: DataProvider>(
    frame: &mut ratatui::Frame<'_>,
    controller: &PickerController<P, FieldState>,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let search = controller.search();
    let bar_style = if search.is_expanded() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let bar = Paragraph::new(search_bar_text(controller)).style(bar_style).block(
        Block::default()
            .title(controller.request().title())
            .borders(Borders::ALL),
    );
    frame.render_widget(bar, layout[0]);
    if search.field().is_keyboard_visible() {
        let offset = u16::try_from(search.text().chars().count() + 2).unwrap_or(u16::MAX);
        let x = layout[0]
            .x
            .saturating_add(1)
            .saturating_add(offset)
            .min(layout[0].right().saturating_sub(2));
        frame.set_cursor_position((x, layout[0].y.saturating_add(1)));
    }

    render_list(frame, layout[1], controller);

    let status = Paragraph::new(status_text(controller, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);
}

fn render_list<P: DataProvider>(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    controller: &PickerController<P, FieldState>,
) {
    let binding = controller.binding();
    let block = Block::default()
        .title(controller.request().kind.as_str())
        .borders(Borders::ALL);

    if let Some(placeholder) = list_placeholder(controller) {
        let empty = Paragraph::new(placeholder)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let multiple = controller.request().multiple;
    let height = usize::from(area.height.saturating_sub(2));
    let (start, end) = visible_window(binding.len(), binding.cursor(), height);
    let rows = binding.items()[start..end]
        .iter()
        .enumerate()
        .map(|(offset, item)| {
            let selected_row = start + offset == binding.cursor();
            let mut style = Style::default();
            if item.is_blocked() {
                style = style.fg(Color::Red);
            }
            if selected_row {
                style = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            let cells = row_cells(item, multiple.then(|| binding.is_checked(item)));
            Row::new(cells.into_iter().map(Cell::from)).style(style)
        });

    let mut widths = Vec::with_capacity(4);
    if multiple {
        widths.push(Constraint::Length(3));
    }
    widths.extend([
        Constraint::Min(12),
        Constraint::Min(16),
        Constraint::Min(8),
    ]);
    let table = Table::new(rows, widths).column_spacing(1).block(block);
    frame.render_widget(table, area);
}

fn search_bar_text<P: DataProvider>(controller: &PickerController<P, FieldState>) -> String {
    let search = controller.search();
    if search.is_expanded() {
        format!("/ {}", search.text())
    } else {
        "press / to search".to_owned()
    }
}

fn list_placeholder<P: DataProvider>(
    controller: &PickerController<P, FieldState>,
) -> Option<&'static str> {
    if !controller.binding().is_empty() {
        return None;
    }
    if !controller.phase().is_ready() {
        return Some("connecting...");
    }
    if controller.search().text().is_empty() {
        Some("nothing to show")
    } else {
        Some("no matches")
    }
}

/// Rows `start..end` to draw so the cursor stays on screen.
fn visible_window(len: usize, cursor: usize, height: usize) -> (usize, usize) {
    if height == 0 || len == 0 {
        return (0, 0);
    }
    let start = if cursor >= height {
        cursor + 1 - height
    } else {
        0
    };
    (start, len.min(start + height))
}

fn row_cells(item: &ListItem, checked: Option<bool>) -> Vec<String> {
    let mut cells = Vec::with_capacity(4);
    if let Some(checked) = checked {
        let mark = if checked {
            CHECK_MARK_ON
        } else {
            CHECK_MARK_OFF
        };
        cells.push(mark.to_owned());
    }
    cells.push(item.display_name().to_owned());
    cells.push(item.identifier().to_string());
    let detail = match item {
        ListItem::Contact(contact) => {
            let mut parts = vec![contact.presence.label()];
            parts.extend(contact.groups.iter().map(String::as_str));
            if contact.blocked {
                parts.push("blocked");
            }
            parts.join(", ")
        }
        ListItem::Bookmark(_) => "group chat".to_owned(),
    };
    cells.push(detail);
    cells
}

fn status_text<P: DataProvider>(
    controller: &PickerController<P, FieldState>,
    view_data: &ViewData,
) -> String {
    let binding = controller.binding();
    let mut parts = vec![controller.phase().label().to_owned()];
    parts.push(match binding.len() {
        1 => "1 item".to_owned(),
        n => format!("{n} items"),
    });
    if controller.request().multiple {
        parts.push(format!("{} checked", binding.checked_count()));
    }
    if let Some(notice) = &view_data.notice {
        parts.push(notice.clone());
    }
    parts.push(key_hints(controller).to_owned());
    parts.join(" | ")
}

fn key_hints<P: DataProvider>(controller: &PickerController<P, FieldState>) -> &'static str {
    match (controller.search().is_expanded(), controller.request().multiple) {
        (true, true) => "tab check  enter done  esc close search",
        (true, false) => "enter pick single match  esc close search",
        (false, true) => "/ search  space check  enter done  q quit",
        (false, false) => "/ search  enter pick  q quit",
    }
}
