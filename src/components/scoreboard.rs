use diamond_api::{Half, Side};
use tui::buffer::Buffer;
use tui::layout::Rect;
use tui::style::{Color, Modifier, Style};
use tui::widgets::Widget;

use crate::state::projection::Scoreboard;

/// Columns per inning cell, including the separating space.
const INNING_WIDTH: usize = 3;
/// Team name column.
const NAME_WIDTH: usize = 10;

/// Classic line score: one column per inning plus R and H.
///
/// ```text
///            1  2  3  4  5  6  7  8  9   R  H
/// Eagles     0  2  0  1  -  -  -  -  -   3  6
/// Bears      0  0  0  0  -  -  -  -  -   0  2
/// ```
pub struct LineScoreView<'a> {
    pub scoreboard: &'a Scoreboard,
    pub away_team: &'a str,
    pub home_team: &'a str,
    /// Inning and half being played, `(0, Top)` before the first pitch.
    /// `None` shows every inning on the board.
    pub live: Option<(u16, Half)>,
}

impl<'a> Widget for LineScoreView<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 3 || area.width < 20 {
            return;
        }

        let innings = visible_innings(self.scoreboard.innings(), area.width as usize);
        let first = self.scoreboard.innings() - innings + 1;
        let dim = Style::default().fg(Color::DarkGray);
        let plain = Style::default().fg(Color::White);
        let live = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

        buf.set_string(area.x, area.y, header_row(first, innings), dim);

        for (row, side) in [Side::Away, Side::Home].into_iter().enumerate() {
            let y = area.y + 1 + row as u16;
            let name = match side {
                Side::Away => self.away_team,
                Side::Home => self.home_team,
            };
            buf.set_string(area.x, y, pad(name, NAME_WIDTH), plain);

            for (col, inning) in (first..first + innings).enumerate() {
                let x = area.x + (NAME_WIDTH + col * INNING_WIDTH) as u16;
                let cell = inning_cell(self.scoreboard, side, inning as u16, self.live);
                let style = match self.live {
                    Some((n, half)) if n == inning as u16 && half.batting_side() == side => live,
                    _ if cell == "-" => dim,
                    _ => plain,
                };
                buf.set_string(x, y, format!("{cell:>width$}", width = INNING_WIDTH), style);
            }

            let x = area.x + (NAME_WIDTH + innings * INNING_WIDTH) as u16;
            let totals = format!(
                " {:>3}{:>3}",
                self.scoreboard.total(side),
                self.scoreboard.hits(side)
            );
            buf.set_string(x, y, totals, plain.add_modifier(Modifier::BOLD));
        }
    }
}

/// Innings that fit, keeping the most recent ones when the board is too wide.
fn visible_innings(total: usize, width: usize) -> usize {
    let room = width.saturating_sub(NAME_WIDTH + 7) / INNING_WIDTH;
    total.min(room.max(1))
}

fn header_row(first: usize, innings: usize) -> String {
    let mut row = " ".repeat(NAME_WIDTH);
    for inning in first..first + innings {
        row.push_str(&format!("{inning:>width$}", width = INNING_WIDTH));
    }
    row.push_str("   R  H");
    row
}

/// Runs in one half-inning, or `-` for a half that has not been reached.
fn inning_cell(board: &Scoreboard, side: Side, inning: u16, live: Option<(u16, Half)>) -> String {
    let reached = match live {
        Some((current, half)) => {
            inning < current
                || (inning == current && (side == Side::Away || half == Half::Bottom))
        }
        None => inning as usize <= board.runs(side).len(),
    };
    if reached {
        board.runs_in(side, inning).to_string()
    } else {
        "-".to_string()
    }
}

fn pad(name: &str, width: usize) -> String {
    let mut s: String = name.chars().take(width - 1).collect();
    while s.chars().count() < width {
        s.push(' ');
    }
    s
}
