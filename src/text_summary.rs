//! Text summary builder for headless output.
//!
//! Formats the banner and fight-balance cards of a freshly archived log as
//! plain lines.

use crate::cards::{build_card, Card};
use crate::report::ParsedReport;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn push_card(lines: &mut Vec<String>, card: Card) {
    lines.push(card.header);
    lines.extend(card.rows.into_iter().map(|row| format!("  {row}")));
}

/// Build a text summary for one log of `run`.
pub(crate) fn build_text_summary(run: &str, log: &str, report: &ParsedReport) -> TextSummary {
    let mut lines = vec![format!("== {run} / {log} ==")];
    push_card(&mut lines, build_card(report, 1));
    push_card(&mut lines, build_card(report, 0));
    if let Some(commander) = report.commander() {
        lines.push(format!("Commander: {} ({})", commander.name, commander.account));
    }
    TextSummary { lines }
}
