use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};

use crate::report::{Panel, ReportSink};
use crate::scaling::ScalingSummary;

const PALETTE: [Color; 6] =
    [Color::Cyan, Color::Yellow, Color::Magenta, Color::Green, Color::Blue, Color::Red];

/// Interactive terminal view: one chart per panel laid out on the panels'
/// row/column grid. Panels are collected and drawn when the sink finishes.
#[derive(Default)]
pub struct ChartView {
    panels: Vec<Panel>,
    notes: Vec<String>,
}

impl ChartView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for ChartView {
    fn panel(&mut self, panel: &Panel) -> Result<()> {
        self.panels.push(panel.clone());
        Ok(())
    }

    fn scaling(&mut self, summary: &ScalingSummary) -> Result<()> {
        let note = match &summary.saturated_at {
            Some(config) => format!("{}: saturated at {config}", summary.experiment),
            None => format!("{}: no saturation observed", summary.experiment),
        };
        self.notes.push(note);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        run_chart(&self.panels, &self.notes)
    }
}

/// Time span covered by every line of every panel.
pub fn x_range(panels: &[Panel]) -> (f64, f64) {
    let times = panels.iter().flat_map(|p| &p.lines).flat_map(|l| l.points.iter().map(|&(t, _)| t));
    let (lo, hi) = times
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if lo > hi {
        (0.0, 1.0)
    } else {
        (lo.min(0.0), hi)
    }
}

/// Splits `area` into the `rows` x `cols` grid the panels occupy.
pub fn grid_cells(area: Rect, rows: usize, cols: usize) -> Vec<Vec<Rect>> {
    let (rows, cols) = (rows.max(1) as u32, cols.max(1) as u32);
    Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows); rows as usize])
        .split(area)
        .iter()
        .map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, cols); cols as usize])
                .split(*row)
                .to_vec()
        })
        .collect()
}

fn axis_labels(lo: f64, hi: f64) -> Vec<Span<'static>> {
    let mid = (lo + hi) / 2.0;
    [lo, mid, hi].iter().map(|v| Span::raw(format!("{v:.1}"))).collect()
}

fn draw_panel(f: &mut Frame, area: Rect, panel: &Panel, x: (f64, f64)) {
    let datasets: Vec<Dataset> = panel
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            Dataset::default()
                .name(line.label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                .data(&line.points)
        })
        .collect();

    let y = panel.y_range;
    let y_hi = if y.1 > y.0 { y.1 } else { y.0 + 1.0 };
    let chart = Chart::new(datasets)
        .block(Block::default().title(panel.title.clone()).borders(Borders::ALL))
        .x_axis(Axis::default().title("time (s)").bounds([x.0, x.1]).labels(axis_labels(x.0, x.1)))
        .y_axis(
            Axis::default()
                .title(format!("rate ({})", panel.unit))
                .bounds([y.0, y_hi])
                .labels(axis_labels(y.0, y_hi)),
        );
    f.render_widget(chart, area);
}

pub fn run_chart(panels: &[Panel], notes: &[String]) -> Result<()> {
    enable_raw_mode()?;
    let mut terminal = match open_terminal() {
        Ok(terminal) => terminal,
        Err(err) => {
            // raw mode is already on; leave the shell usable
            let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
            let _ = disable_raw_mode();
            return Err(err);
        }
    };

    let result = chart_loop(&mut terminal, panels, notes);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn open_terminal() -> Result<Terminal<CrosstermBackend<std::io::Stdout>>> {
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn chart_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    panels: &[Panel],
    notes: &[String],
) -> Result<()> {
    let rows = panels.iter().map(|p| p.row + 1).max().unwrap_or(1);
    let cols = panels.iter().map(|p| p.col + 1).max().unwrap_or(1);
    let x = x_range(panels);

    loop {
        terminal.draw(|f| {
            let outer = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
                .split(f.size());

            let cells = grid_cells(outer[0], rows, cols);
            for panel in panels {
                draw_panel(f, cells[panel.row][panel.col], panel, x);
            }

            let mut footer = String::from("q: quit");
            for note in notes {
                footer.push_str(" | ");
                footer.push_str(note);
            }
            f.render_widget(Paragraph::new(footer), outer[1]);
        })?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q')
                    || key.code == KeyCode::Esc
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL))
                {
                    return Ok(());
                }
            }
        }
    }
}
