mod help;

use crate::cards::{build_card, CARD_TITLES};
use crate::model::{AppEvent, Command, UserInput, WatchConfig};
use crate::orchestrator::{self, Background};
use crate::session::{Panel, SessionMachine, SessionState, ViewMode, CARD_COUNT};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Cards per row of the detail grid.
const CARD_ROWS: [usize; 4] = [2, 2, 3, 2];

/// UI-only state; everything else lives in the session machine.
#[derive(Default)]
struct UiState {
    show_help: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    ToggleHelp,
    Input(UserInput),
    Ignore,
}

fn map_key(modifiers: KeyModifiers, code: KeyCode, confirming: bool) -> KeyAction {
    match (modifiers, code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => KeyAction::Quit,
        (KeyModifiers::CONTROL, KeyCode::Char('d')) => KeyAction::Input(UserInput::Delete),
        (_, code) if confirming => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Input(UserInput::Confirm(true)),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                KeyAction::Input(UserInput::Confirm(false))
            }
            _ => KeyAction::Ignore,
        },
        (_, KeyCode::Char('q')) => KeyAction::Quit,
        (_, KeyCode::Char('?')) => KeyAction::ToggleHelp,
        (_, KeyCode::Char('w') | KeyCode::Char('k') | KeyCode::Up) => {
            KeyAction::Input(UserInput::Up)
        }
        (_, KeyCode::Char('s') | KeyCode::Char('j') | KeyCode::Down) => {
            KeyAction::Input(UserInput::Down)
        }
        (_, KeyCode::Char('d') | KeyCode::Char('l') | KeyCode::Right) => {
            KeyAction::Input(UserInput::FocusCards)
        }
        (_, KeyCode::Char('a') | KeyCode::Char('h') | KeyCode::Left) => {
            KeyAction::Input(UserInput::FocusList)
        }
        (_, KeyCode::Enter | KeyCode::Char(' ')) => KeyAction::Input(UserInput::Select),
        (_, KeyCode::Delete) => KeyAction::Input(UserInput::Delete),
        _ => KeyAction::Ignore,
    }
}

pub async fn run(cfg: WatchConfig) -> Result<()> {
    let Background {
        event_rx,
        cmd_tx,
        controller,
    } = orchestrator::start_background(&cfg);
    let machine =
        SessionMachine::new(cfg.archive_root()).with_max_logs_per_run(cfg.max_logs_per_run);

    // The session machine lives on the UI thread; producers only send events.
    let ui_cmd_tx = cmd_tx.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(machine, event_rx, ui_cmd_tx));

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    let _ = cmd_tx.send(Command::Quit);
    let _ = controller.await;

    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("TUI thread join failed: {e}")),
    }
}

fn dispatch(machine: &mut SessionMachine, cmd_tx: &UnboundedSender<Command>, ev: AppEvent) {
    for cmd in machine.handle(ev) {
        let _ = cmd_tx.send(cmd);
    }
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    mut machine: SessionMachine,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<Command>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut ui = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now() - tick_rate;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            dispatch(&mut machine, &cmd_tx, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal
                .draw(|f| draw(f.area(), f, machine.state(), &ui))
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let confirming = machine.state().confirmation.is_some();
                let action = map_key(k.modifiers, k.code, confirming);
                if ui.show_help && action != KeyAction::Quit {
                    ui.show_help = false;
                    last_tick = Instant::now() - tick_rate;
                    continue;
                }
                match action {
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(Command::Quit);
                        break Ok(());
                    }
                    KeyAction::ToggleHelp => ui.show_help = true,
                    KeyAction::Input(input) => {
                        dispatch(&mut machine, &cmd_tx, AppEvent::Input(input))
                    }
                    KeyAction::Ignore => {}
                }
                // Redraw right away so navigation feels immediate.
                last_tick = Instant::now() - tick_rate;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &SessionState, ui: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(rows[0]);

    draw_list(panels[0], f, state);
    draw_details(panels[1], f, state);
    draw_status(rows[1], f, state);
    draw_help_bar(rows[2], f, state);

    if let Some(confirmation) = state.confirmation.as_ref() {
        draw_confirmation(area, f, &confirmation.prompt);
    }
    if ui.show_help {
        help::draw_help(area, f);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn list_rows(state: &SessionState) -> (String, Vec<String>) {
    match (state.mode, state.run.as_ref()) {
        (ViewMode::InspectingRun, Some(run)) => {
            let mut rows = vec!["../".to_string()];
            rows.extend(run.logs.keys().cloned());
            let title = format!(
                "{} {} ({} logs)",
                run.name.short_commander(),
                run.name.stamp(),
                run.logs.len()
            );
            (title, rows)
        }
        _ => {
            let mut rows = vec!["New Run".to_string()];
            rows.extend(
                state
                    .runs
                    .iter()
                    .map(|r| format!("{:<16} {}", r.short_commander(), r.stamp())),
            );
            (format!("Runs ({})", state.runs.len()), rows)
        }
    }
}

fn draw_list(area: Rect, f: &mut ratatui::Frame, state: &SessionState) {
    let focused = state.panel == Panel::List;
    let (title, rows) = list_rows(state);

    let visible = area.height.saturating_sub(2) as usize;
    let offset = if visible > 0 && state.selected >= visible {
        state.selected + 1 - visible
    } else {
        0
    };

    let lines: Vec<Line> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            if i == state.selected {
                let style = if focused {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                Line::from(Span::styled(format!("> {row}"), style))
            } else if i == 0 {
                Line::from(Span::styled(
                    format!("  {row}"),
                    Style::default().fg(Color::Cyan),
                ))
            } else {
                Line::from(format!("  {row}"))
            }
        })
        .collect();

    let p = Paragraph::new(lines)
        .scroll((offset as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(focused))
                .title(title),
        );
    f.render_widget(p, area);
}

fn draw_details(area: Rect, f: &mut ratatui::Frame, state: &SessionState) {
    let Some(entry) = state.selected_log() else {
        let hint = match state.mode {
            ViewMode::BrowsingRuns => vec![
                Line::from("Select \"New Run\" to start a run, or an archived run to browse it."),
                Line::from(""),
                Line::from("New combat logs start a run on their own."),
            ],
            ViewMode::InspectingRun => vec![
                Line::from("Select a log to see its fight summary."),
                Line::from(""),
                Line::from("New combat logs are added to this run as they arrive."),
            ],
        };
        let p = Paragraph::new(hint)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Details"));
        f.render_widget(p, area);
        return;
    };

    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(state.panel == Panel::Cards))
        .title(entry.display_name.clone());
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let grid = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(inner);

    let mut index = 0;
    for (row, &count) in grid.iter().zip(CARD_ROWS.iter()) {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, count as u32); count])
            .split(*row);
        for cell in cells.iter() {
            if index < CARD_COUNT {
                let selected = state.panel == Panel::Cards && state.card == index;
                draw_card(*cell, f, &entry.report, index, selected);
            }
            index += 1;
        }
    }
}

fn draw_card(
    area: Rect,
    f: &mut ratatui::Frame,
    report: &crate::report::ParsedReport,
    index: usize,
    selected: bool,
) {
    let card = build_card(report, index);
    let mut lines = vec![Line::from(Span::styled(
        card.header,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(card.rows.into_iter().enumerate().map(|(i, row)| {
        if i % 2 == 1 {
            Line::from(Span::styled(row, Style::default().bg(Color::Rgb(45, 43, 85))))
        } else {
            Line::from(row)
        }
    }));

    let border = if selected {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(CARD_TITLES[index]),
    );
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &SessionState) {
    let line = match state.last_error.as_deref() {
        Some(err) => Line::from(Span::styled(
            format!(" Error: {err}"),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            format!(" {}", state.status),
            Style::default().fg(Color::Green),
        )),
    };
    let version = Span::styled(
        format!(" v{} ", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    );
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(10)])
        .split(area);
    f.render_widget(Paragraph::new(line), cols[0]);
    f.render_widget(Paragraph::new(Line::from(version)), cols[1]);
}

fn draw_help_bar(area: Rect, f: &mut ratatui::Frame, state: &SessionState) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Magenta));
    let spans = if state.confirmation.is_some() {
        vec![key(" y"), Span::raw(" confirm  "), key("n/Esc"), Span::raw(" cancel")]
    } else {
        match state.panel {
            Panel::List => vec![
                key(" ↑↓"),
                Span::raw(" move  "),
                key("Enter"),
                Span::raw(" select  "),
                key("→"),
                Span::raw(" cards  "),
                key("Ctrl-D"),
                Span::raw(" delete  "),
                key("?"),
                Span::raw(" help  "),
                key("q"),
                Span::raw(" quit"),
            ],
            Panel::Cards => vec![
                key(" ↑↓"),
                Span::raw(" card  "),
                key("Enter"),
                Span::raw(" open HTML report  "),
                key("←"),
                Span::raw(" list  "),
                key("q"),
                Span::raw(" quit"),
            ],
        }
    };
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_confirmation(area: Rect, f: &mut ratatui::Frame, prompt: &str) {
    let width = (prompt.chars().count() as u16 + 6).min(area.width);
    let height = 3.min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let p = Paragraph::new(Line::from(Span::styled(
        prompt.to_string(),
        Style::default().fg(Color::Black).bg(Color::Green),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title("Confirm"),
    );
    f.render_widget(Clear, popup);
    f.render_widget(p, popup);
}
