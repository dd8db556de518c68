use diamond_api::{Bases, Directory, Handedness};
use tui::buffer::Buffer;
use tui::layout::Rect;
use tui::style::{Color, Modifier, Style};
use tui::widgets::Widget;

use crate::state::movement::{HOME_PLATE, Movement, PlayMovements};

/// Rows the drawn infield takes, outs line included.
pub const DIAMOND_HEIGHT: u16 = 7;
const DIAMOND_WIDTH: u16 = 17;

const OCCUPIED: char = '◆';
const EMPTY: char = '◇';

/// Infield with base occupancy, outs and the batter's box.
///
/// ```text
///         ◆
///       ╱   ╲
///     ◇       ◆
///       ╲   ╱
///    L    ⌂
///
///   OUT ● ● ○
/// ```
pub struct DiamondView<'a> {
    pub bases: &'a Bases,
    pub outs: u8,
    /// Last play; bases someone arrived at are highlighted.
    pub movements: Option<&'a PlayMovements>,
}

impl<'a> Widget for DiamondView<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < DIAMOND_WIDTH || area.height < DIAMOND_HEIGHT {
            return;
        }

        let x0 = area.x + (area.width - DIAMOND_WIDTH) / 2;
        let y0 = area.y;
        let line = Style::default().fg(Color::DarkGray);

        buf.set_string(x0 + 6, y0 + 1, "╱   ╲", line);
        buf.set_string(x0 + 6, y0 + 3, "╲   ╱", line);

        for (base, (dx, dy)) in [(1u8, (12, 2)), (2, (8, 0)), (3, (4, 2))] {
            let occupied = self.bases.get(base).is_some();
            let style = if self.touched(base) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if occupied {
                Style::default().fg(Color::White)
            } else {
                line
            };
            put_char(buf, x0 + dx, y0 + dy, if occupied { OCCUPIED } else { EMPTY }, style);
        }

        let home_style = if self.touched(HOME_PLATE) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        put_char(buf, x0 + 8, y0 + 4, '⌂', home_style);

        if let Some(moves) = self.movements {
            let bats = match moves.batter.bats {
                Handedness::Left => "L",
                Handedness::Right => "R",
            };
            let dx = match moves.batter.bats {
                Handedness::Left => 10,
                Handedness::Right => 5,
            };
            buf.set_string(x0 + dx, y0 + 4, bats, Style::default().fg(Color::Gray));
        }

        buf.set_string(x0 + 2, y0 + 6, outs_line(self.outs), Style::default().fg(Color::Red));
    }
}

impl DiamondView<'_> {
    /// Whether the last play ended with someone arriving at `base`.
    fn touched(&self, base: u8) -> bool {
        let Some(moves) = self.movements else {
            return false;
        };
        std::iter::once(moves.batter.movement)
            .chain(moves.runners.iter().map(|r| r.movement))
            .any(|m| match m {
                Movement::Score => base == HOME_PLATE,
                other => other.resting_base() == Some(base),
            })
    }
}

pub fn outs_line(outs: u8) -> String {
    let marks: Vec<&str> = (0..3).map(|i| if i < outs { "●" } else { "○" }).collect();
    format!("OUT {}", marks.join(" "))
}

/// One readable line per tagged player, lead runner first, batter last.
/// The flag marks players retired on the play.
pub fn movement_tags(moves: &PlayMovements, directory: &Directory) -> Vec<(String, bool)> {
    let batter = (moves.batter.player, 0, moves.batter.movement);
    moves
        .runners
        .iter()
        .map(|r| (r.player, r.from, r.movement))
        .chain(std::iter::once(batter))
        .filter_map(|(player, from, movement)| {
            tag(&directory.player_name(player), from, movement).map(|t| (t, movement.is_out()))
        })
        .collect()
}

fn tag(name: &str, from: u8, movement: Movement) -> Option<String> {
    let text = match movement {
        Movement::Hidden => return None,
        Movement::StationarySafe if from == 0 => format!("{name} on base"),
        Movement::StationarySafe => format!("{name} holds {}", base_name(from)),
        Movement::Score => format!("{name} scores"),
        Movement::Advance { from: 0, to: HOME_PLATE } => format!("{name} rounds the bases"),
        Movement::Advance { from: 0, to } => format!("{name} to {}", base_name(to)),
        Movement::Advance { from, to } if to == HOME_PLATE => {
            format!("{name} {} → home", base_name(from))
        }
        Movement::Advance { from, to } => {
            format!("{name} {} → {}", base_name(from), base_name(to))
        }
        Movement::AdvanceThenOut { to, .. } => format!("{name} out at {}", base_name(to)),
        Movement::StationaryOut if from == 0 => format!("{name} out"),
        Movement::StationaryOut => format!("{name} out at {}", base_name(from)),
    };
    Some(text)
}

fn base_name(base: u8) -> &'static str {
    match base {
        1 => "1B",
        2 => "2B",
        3 => "3B",
        _ => "home",
    }
}

fn put_char(buf: &mut Buffer, x: u16, y: u16, ch: char, style: Style) {
    if let Some(cell) = buf.cell_mut((x, y)) {
        cell.set_char(ch);
        cell.set_style(style);
    }
}
