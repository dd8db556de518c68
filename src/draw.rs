use log::error;
use tui::backend::Backend;
use tui::layout::{Alignment, Constraint, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Line, Span};
use tui::widgets::{Block, BorderType, Borders, Paragraph, Tabs, Wrap};
use tui::{Frame, Terminal};
use tui_logger::TuiLoggerWidget;

use crate::app::{App, MenuItem};
use crate::components::diamond::{DIAMOND_HEIGHT, DiamondView, movement_tags};
use crate::components::scoreboard::LineScoreView;
use crate::state::commentary::{BodySpan, Category, CommentaryMessage};
use crate::state::network::{ERROR_CHAR, LoadingState};
use crate::state::relay::{ProbabilityBar, RelayEntry, filter_relay};
use crate::state::sync::SyncPhase;
use crate::state::view::MatchView;
use crate::ui::layout::LayoutAreas;
use diamond_api::{Half, Side};

static TABS: &[&str; 3] = &["Live", "Play-by-play", "Commentary"];

const HELP_TEXT: &str = "\
Global
  1 / 2 / 3    Live, play-by-play, commentary
  ?            This help (Esc to leave)
  m            Mute or unmute commentary audio
  f            Full screen
  \"            Toggle the log pane
  r            Retry loading the match after an error
  q, Ctrl-C    Quit

Play-by-play
  h / l        Previous or next inning
  s            Scoring plays only
  a            Follow the live inning again
  j / k        Scroll

Commentary
  i, Enter     Write a message (needs DIAMONDCAST_USER_ID)
  Enter        Send, Esc to cancel
  j / k        Scroll";

pub fn draw<B>(terminal: &mut Terminal<B>, app: &mut App, loading: LoadingState)
where
    B: Backend,
{
    let current_size = terminal.size().unwrap_or_default();
    if current_size.width <= 10 || current_size.height <= 10 {
        return;
    }

    let mut layout = LayoutAreas::new(current_size);

    let result = terminal.draw(|f| {
        layout.update(f.area(), app.settings.full_screen, app.state.show_logs);

        if !app.settings.full_screen {
            draw_tabs(f, layout.tab_bar, app);
        }

        match app.state.active_tab {
            MenuItem::Live => draw_live(f, layout.main, app),
            MenuItem::Relay => draw_relay(f, layout.main, app),
            MenuItem::Commentary => draw_commentary(f, layout.main, app),
            MenuItem::Help => draw_help(f, layout.main),
        }

        if let Some(logs) = layout.logs {
            draw_logs(f, logs);
        }

        draw_loading_spinner(f, f.area(), app, loading);
    });

    if let Err(e) = result {
        error!("draw failed: {e}");
    }
}

pub fn default_border<'a>(color: Color) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
}

fn draw_tabs(f: &mut Frame, tab_bar: [Rect; 2], app: &App) {
    let style = Style::default().fg(Color::White);
    let border_type = BorderType::Rounded;

    let tab_index = match app.state.active_tab {
        MenuItem::Live => 0,
        MenuItem::Relay => 1,
        MenuItem::Commentary => 2,
        MenuItem::Help => 0,
    };

    let titles: Vec<Line> = TABS.iter().map(|t| Line::from(*t)).collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::BOTTOM | Borders::TOP)
                .border_type(border_type),
        )
        .highlight_style(Style::default().add_modifier(Modifier::UNDERLINED))
        .select(tab_index)
        .style(style);
    f.render_widget(tabs, tab_bar[0]);

    let phase = app.state.sync.phase();
    let phase_style = match phase {
        SyncPhase::Live => Style::default().fg(Color::Green),
        SyncPhase::Finished => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Yellow),
    };
    let help = Paragraph::new(Line::from(vec![
        Span::styled(phase.label(), phase_style),
        Span::raw("  Help: ? "),
    ]))
    .alignment(Alignment::Right)
    .block(
        Block::default()
            .borders(Borders::RIGHT | Borders::BOTTOM | Borders::TOP)
            .border_type(border_type),
    )
    .style(style);
    f.render_widget(help, tab_bar[1]);
}

// ---------------------------------------------------------------------------
// Live tab
// ---------------------------------------------------------------------------

fn draw_live(f: &mut Frame, area: Rect, app: &App) {
    let title = format!(" Match {} ", app.state.match_id);
    let block = default_border(Color::White).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(view) = app.state.view.as_ref() else {
        draw_not_loaded(f, inner, app);
        return;
    };

    let [banner_area, score_area, field_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(4),
        Constraint::Fill(1),
    ])
    .areas(inner);

    f.render_widget(banner(view), banner_area);

    let live = match view.phase {
        SyncPhase::Live => view.state.as_ref().map(|s| (s.inning, s.half)),
        SyncPhase::Finished => None,
        SyncPhase::Scheduled | SyncPhase::Waiting => Some((0, Half::Top)),
    };
    f.render_widget(
        LineScoreView {
            scoreboard: &view.scoreboard,
            away_team: &view.away_team,
            home_team: &view.home_team,
            live,
        },
        Rect::new(score_area.x, score_area.y + 1, score_area.width, 3),
    );

    let [left, right] =
        Layout::horizontal([Constraint::Length(24), Constraint::Fill(1)]).areas(field_area);
    draw_field(f, left, view);
    draw_at_bat(f, right, view, app);
}

fn draw_not_loaded(f: &mut Frame, area: Rect, app: &App) {
    let msg = if let Some(err) = app.state.last_error.as_deref() {
        format!("Match load failed:\n{err}\n\nPress r to retry")
    } else {
        "Loading match...".to_string()
    };
    f.render_widget(
        Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        area,
    );
}

fn banner(view: &MatchView) -> Paragraph<'static> {
    if let Some(result) = view.result {
        return Paragraph::new(format!(
            "FINAL  {}",
            result.headline(&view.home_team, &view.away_team)
        ))
        .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    }

    let text = match (view.phase, view.countdown) {
        (SyncPhase::Scheduled | SyncPhase::Waiting, Some(left)) if !left.is_zero() => {
            format!("{} @ {}  first pitch in {}", view.away_team, view.home_team, countdown(left))
        }
        (SyncPhase::Scheduled | SyncPhase::Waiting, _) => {
            format!("{} @ {}  waiting for first pitch", view.away_team, view.home_team)
        }
        (SyncPhase::Live, _) => match view.state.as_ref() {
            Some(s) => format!(
                "{} {}  {} {} - {} {}",
                s.half.label(),
                s.inning,
                view.away_team,
                s.score.away,
                s.score.home,
                view.home_team
            ),
            None => format!("{} @ {}", view.away_team, view.home_team),
        },
        (SyncPhase::Finished, _) => format!("{} @ {}  final", view.away_team, view.home_team),
    };
    Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
}

fn countdown(left: std::time::Duration) -> String {
    let secs = left.as_secs();
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

fn draw_field(f: &mut Frame, area: Rect, view: &MatchView) {
    let block = default_border(Color::DarkGray).title(" Field ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < DIAMOND_HEIGHT {
        return;
    }

    let outs = view.state.as_ref().map(|s| s.outs).unwrap_or(0);
    f.render_widget(
        DiamondView {
            bases: &view.bases,
            outs,
            movements: view.movements.as_ref(),
        },
        inner,
    );
}

fn draw_at_bat(f: &mut Frame, area: Rect, view: &MatchView, app: &App) {
    let block = default_border(Color::DarkGray).title(" At bat ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let label = Style::default().fg(Color::DarkGray);
    let directory = &app.state.directory;
    let mut lines = Vec::new();

    if let Some(state) = view.state.as_ref() {
        if let Some(batter) = state.at_bat.as_ref() {
            let name = batter.name.clone().unwrap_or_else(|| directory.player_name(batter.id));
            lines.push(Line::from(vec![
                Span::styled("Batter  ", label),
                Span::raw(name),
                Span::styled(format_avg(batter.average, "AVG"), label),
            ]));
        }
        if let Some(pitcher) = state.pitcher.as_ref() {
            let name = pitcher.name.clone().unwrap_or_else(|| directory.player_name(pitcher.id));
            lines.push(Line::from(vec![
                Span::styled("Pitcher ", label),
                Span::raw(name),
                Span::styled(format_avg(pitcher.average, "ERA"), label),
            ]));
        }
        lines.push(Line::from(""));
    }

    if let Some(latest) = view.latest.as_ref() {
        lines.push(Line::from(vec![
            Span::styled("Last play  ", label),
            Span::styled(
                latest.label.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]));
        if let Some(moves) = view.movements.as_ref() {
            for (tag, out) in movement_tags(moves, directory) {
                let style = if out {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::White)
                };
                lines.push(Line::from(Span::styled(format!("  {tag}"), style)));
            }
        }
        lines.push(Line::from(""));
    }

    if let Some((side, queue)) = view.on_deck.as_ref() {
        lines.push(Line::from(Span::styled(
            format!("Up next for {}", view.team(*side)),
            label,
        )));
        for on_deck in queue {
            lines.push(Line::from(format!(
                "  {}. {}",
                on_deck.slot,
                directory.player_name(on_deck.player)
            )));
        }
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn format_avg(avg: Option<f64>, label: &str) -> String {
    avg.map(|a| format!("  {label} {a:.3}")).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Play-by-play tab
// ---------------------------------------------------------------------------

fn draw_relay(f: &mut Frame, area: Rect, app: &App) {
    let relay = &app.state.relay;
    let follow = if relay.follow { "  (following)" } else { "" };
    let block =
        default_border(Color::White).title(format!(" Play-by-play: {}{follow} ", relay.filter.label()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(view) = app.state.view.as_ref() else {
        draw_not_loaded(f, inner, app);
        return;
    };

    let entries = filter_relay(&view.relay, relay.filter);
    if entries.is_empty() {
        f.render_widget(
            Paragraph::new("No plays yet")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    // Newest first.
    let mut lines = Vec::new();
    for entry in entries.iter().rev() {
        relay_card(entry, view, &mut lines);
    }

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((relay.scroll_offset, 0)),
        inner,
    );
}

fn relay_card<'a>(entry: &RelayEntry, view: &MatchView, lines: &mut Vec<Line<'a>>) {
    let dim = Style::default().fg(Color::DarkGray);
    let batting = view.team(entry.half.batting_side()).to_string();
    let order = entry
        .batting_order
        .map(|n| format!("{n}. "))
        .unwrap_or_default();
    let result_style = if entry.is_scoring() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };

    lines.push(Line::from(vec![
        Span::styled(format!("{} {}  {batting}  ", entry.half.label(), entry.inning), dim),
        Span::raw(format!("{order}{}", entry.batter_name)),
        Span::styled(format_avg(entry.batter_avg, "AVG"), dim),
    ]));

    let mut result = vec![Span::styled(format!("  {}", entry.result), result_style)];
    if entry.runs > 0 {
        result.push(Span::styled(format!("  +{} run(s)", entry.runs), result_style));
    }
    let line = entry.line;
    result.push(Span::styled(
        format!(
            "   {}-{}, {} RBI, {} HR, {} K",
            line.hits, line.plate_appearances, line.rbi, line.home_runs, line.strikeouts
        ),
        dim,
    ));
    lines.push(Line::from(result));

    for note in &entry.runner_notes {
        lines.push(Line::from(Span::styled(format!("    {note}"), Style::default().fg(Color::Gray))));
    }
    if !entry.probabilities.is_empty() {
        lines.push(Line::from(
            entry.probabilities.iter().flat_map(probability_spans).collect::<Vec<_>>(),
        ));
    }
    if entry.starts_half {
        lines.push(Line::from(Span::styled(
            format!("── {} {} ──", entry.half.label(), entry.inning),
            dim,
        )));
    }
    lines.push(Line::from(""));
}

fn probability_spans<'a>(bar: &ProbabilityBar) -> [Span<'a>; 2] {
    let filled = (bar.probability.clamp(0.0, 1.0) * 5.0).round() as usize;
    let style = if bar.actual {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    [
        Span::styled(format!("    {} ", bar.label), style),
        Span::styled(
            format!(
                "{}{} {:>3.0}%",
                "█".repeat(filled),
                "░".repeat(5 - filled),
                bar.probability * 100.0
            ),
            style,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Commentary tab
// ---------------------------------------------------------------------------

fn draw_commentary(f: &mut Frame, area: Rect, app: &App) {
    let commentary = &app.state.commentary;
    let side = app.settings.affiliation;
    let block = default_border(Color::White).title(format!(" Commentary ({} side) ", side.label()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.width == 0 || inner.height < 4 {
        return;
    }

    let [status_area, messages_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(3),
    ])
    .areas(inner);

    let dim = Style::default().fg(Color::DarkGray);
    let mut status = vec![
        Span::styled("status ", dim),
        if commentary.connected {
            Span::styled("online", Style::default().fg(Color::Green))
        } else {
            Span::styled("offline", Style::default().fg(Color::Red))
        },
        Span::styled("  audio ", dim),
        if commentary.muted {
            Span::styled("muted", Style::default().fg(Color::Red))
        } else {
            Span::styled("on", Style::default().fg(Color::Green))
        },
    ];
    if let Some(url) = commentary.now_playing.as_deref() {
        status.push(Span::styled(format!("  ♪ {url}"), Style::default().fg(Color::Cyan)));
    }
    f.render_widget(Paragraph::new(Line::from(status)), status_area);

    let lines: Vec<Line> = commentary
        .messages
        .iter()
        .map(|msg| message_line(msg, side))
        .collect();

    let visible = messages_area.height as usize;
    let total = lines.len();
    let offset = commentary.scroll_offset as usize;
    let end = total.saturating_sub(offset);
    let start = end.saturating_sub(visible);
    let window = if start < end { lines[start..end].to_vec() } else { Vec::new() };
    f.render_widget(Paragraph::new(window), messages_area);

    let mode = if commentary.composing { "typing" } else { "idle" };
    let input = if commentary.composing {
        format!("> {}_", commentary.input)
    } else {
        "Press i to write. Esc cancel. j/k scroll. m mute.".to_string()
    };
    let input_style = if commentary.composing {
        Style::default().fg(Color::Yellow)
    } else {
        dim
    };
    let input_block = default_border(Color::DarkGray).title(format!(" {mode} "));
    let input_inner = input_block.inner(input_area);
    f.render_widget(input_block, input_area);
    f.render_widget(Paragraph::new(input).style(input_style), input_inner);
}

fn message_line<'a>(msg: &'a CommentaryMessage, side: Side) -> Line<'a> {
    let style = category_style(msg.category, side);
    let prefix = if msg.category.is_user_chat() {
        let author = msg.author.as_deref().unwrap_or("fan");
        match msg.team.as_deref() {
            Some(team) => format!("[{}] {author} ({team}): ", msg.received_at),
            None => format!("[{}] {author}: ", msg.received_at),
        }
    } else {
        match msg.category {
            Category::Notice => format!("[{}] ", msg.received_at),
            Category::BiasComment => format!("[{}] caster: ", msg.received_at),
            Category::CleanBot => format!("[{}] moderator: ", msg.received_at),
            _ => format!("[{}] assistant: ", msg.received_at),
        }
    };

    let mut spans = vec![Span::styled(prefix, style)];
    spans.extend(msg.spans.iter().map(|span| match span {
        BodySpan::Text(text) => Span::styled(text.as_str(), style),
        BodySpan::Emoji(code) => Span::styled(
            format!(":{code}:"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    }));
    let line = Line::from(spans);

    // Fans on the viewer's own side sit left, the other side right.
    let own = matches!(
        (msg.category, side),
        (Category::Receive, Side::Home) | (Category::Send, Side::Away)
    );
    if msg.category.is_user_chat() && !own {
        line.alignment(Alignment::Right)
    } else {
        line
    }
}

fn category_style(category: Category, side: Side) -> Style {
    match category {
        Category::Notice => Style::default().fg(Color::DarkGray),
        Category::BiasComment => Style::default().fg(match side {
            Side::Home => Color::LightBlue,
            Side::Away => Color::LightRed,
        }),
        Category::CleanBot => Style::default().fg(Color::Magenta),
        Category::AiBot => Style::default().fg(Color::Cyan),
        Category::Send => Style::default().fg(Color::LightRed),
        Category::Receive => Style::default().fg(Color::LightBlue),
    }
}

// ---------------------------------------------------------------------------
// Help, logs, spinner
// ---------------------------------------------------------------------------

fn draw_help(f: &mut Frame, area: Rect) {
    let block = default_border(Color::DarkGray).title(" Help ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(HELP_TEXT).style(Style::default().fg(Color::Gray)),
        inner,
    );
}

fn draw_logs(f: &mut Frame, area: Rect) {
    let logger = TuiLoggerWidget::default()
        .block(default_border(Color::DarkGray).title(" Logs "))
        .style_error(Style::default().fg(Color::Red))
        .style_warn(Style::default().fg(Color::Yellow))
        .style_info(Style::default().fg(Color::Gray))
        .style_debug(Style::default().fg(Color::DarkGray));
    f.render_widget(logger, area);
}

fn draw_loading_spinner(f: &mut Frame, area: Rect, app: &App, loading: LoadingState) {
    if !loading.is_loading && loading.spinner_char != ERROR_CHAR {
        return;
    }
    let style = match loading.spinner_char {
        ERROR_CHAR => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::White),
    };
    let spinner = Paragraph::new(loading.spinner_char.to_string())
        .alignment(Alignment::Right)
        .style(style);
    let area = if app.settings.full_screen {
        Rect::new(area.width.saturating_sub(3), area.height.saturating_sub(2), 1, 1)
    } else {
        Rect::new(area.width.saturating_sub(11), 1, 1, 1)
    };
    f.render_widget(spinner, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn countdown_formats() {
        assert_eq!(countdown(Duration::from_secs(65)), "01:05");
        assert_eq!(countdown(Duration::from_secs(3 * 3600 + 61)), "3:01:01");
    }

    #[test]
    fn probability_bar_fills_by_fifths() {
        let bar = ProbabilityBar { label: "1B".into(), probability: 0.4, actual: true };
        let [_, fill] = probability_spans(&bar);
        assert_eq!(fill.content, "██░░░  40%");
    }

    #[test]
    fn other_sides_fans_are_right_aligned() {
        let mut msg = CommentaryMessage::notice(1, "hi");
        msg.category = Category::Send;
        assert_eq!(message_line(&msg, Side::Home).alignment, Some(Alignment::Right));
        assert_eq!(message_line(&msg, Side::Away).alignment, None);
    }
}
