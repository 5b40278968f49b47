use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYBINDS: [(&str, &str); 10] = [
    ("q / Ctrl-C", "Quit"),
    ("w s / ↑ ↓ / k j", "Move selection or card"),
    ("d / → / l", "Focus the cards"),
    ("a / ← / h", "Focus the list"),
    ("Enter / Space", "Open run or log; open HTML report on a card"),
    ("Ctrl-D / Del", "Delete selected run or log"),
    ("y", "Confirm"),
    ("n / Esc", "Cancel"),
    ("?", "Toggle this help"),
    ("", ""),
];

fn keybind_line(keys: &str, action: &str) -> Line<'static> {
    if keys.is_empty() {
        return Line::from("");
    }
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{keys:<18}"), Style::default().fg(Color::Magenta)),
        Span::raw(action.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYBINDS.iter().map(|(k, a)| keybind_line(k, a)));
    lines.push(Line::from("Logs:"));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            "New combat logs are converted and archived automatically;",
            Style::default().fg(Color::Cyan),
        ),
    ]));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            "a run rolls over after its log limit is reached.",
            Style::default().fg(Color::Cyan),
        ),
    ]));

    let width = area.width.min(72);
    let height = area.height.min(lines.len() as u16 + 2);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, popup);
    f.render_widget(p, popup);
}
