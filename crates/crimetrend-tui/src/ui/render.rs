use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, LegendPosition, Paragraph},
    Frame,
};

use crate::app::{App, AppState, View};

use super::styles;
use super::views::{build_chart, ChartSettings, ChartView};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Chart
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(
        "  crimetrend  {} / {}",
        app.config.force, app.config.area_code
    );
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 4)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, view) in View::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, view.label(&app.config.category_groups));
        spans.push(Span::styled(label, styles::tab_style(*view == app.view)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    let settings = ChartSettings {
        short_window: app.short_window,
        long_window: app.long_window,
        top_categories: &app.config.top_categories,
        groups: &app.config.category_groups,
        normalized: &app.normalized,
        group_normalized: &app.group_normalized,
    };
    let chart = build_chart(app.view, &app.counts, &settings);

    let block = Block::default()
        .title(Span::styled(format!(" {} ", chart.title), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    if !chart.has_data() {
        let message = if app.dataset.is_empty() {
            if app.is_offline() {
                "No cached data. Run without --offline to fetch."
            } else {
                "No data yet. Press u to sync."
            }
        } else {
            "Not enough months for this window. Press - to shrink it."
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(message, styles::muted_style())))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    frame.render_widget(chart_widget(&chart).block(block), area);
}

/// Build the ratatui chart. Stacked views are drawn top layer first as bars
/// so each lower layer paints over the one above it.
fn chart_widget(chart: &ChartView) -> Chart<'_> {
    let graph_type = if chart.stacked {
        GraphType::Bar
    } else {
        GraphType::Line
    };

    let mut datasets: Vec<Dataset> = chart
        .series
        .iter()
        .enumerate()
        .map(|(i, series)| {
            Dataset::default()
                .name(series.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(graph_type)
                .style(styles::series_style(i))
                .data(&series.points)
        })
        .collect();
    if chart.stacked {
        datasets.reverse();
    }

    let y_labels = [0.0, chart.y_max / 2.0, chart.y_max].map(|v| {
        if chart.stacked {
            format!("{:.0}", v)
        } else {
            format!("{:.2}", v)
        }
    });

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(styles::muted_style())
                .bounds([0.0, chart.x_max.max(1.0)])
                .labels(chart.x_labels.clone()),
        )
        .y_axis(
            Axis::default()
                .title(chart.y_label)
                .style(styles::muted_style())
                .bounds([0.0, chart.y_max])
                .labels(y_labels),
        )
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 1)))
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = if app.is_offline() {
        "offline | [+/-] window | [q]uit"
    } else {
        "[u]pdate | [+/-] window | [q]uit"
    };

    let (left_text, left_style) = match app.status_message {
        Some(ref msg) if msg.starts_with("Sync failed") => {
            (format!(" {} ", msg), styles::error_style())
        }
        Some(ref msg) => (format!(" {} ", msg), styles::highlight_style()),
        None => (format!(" {} ", dataset_summary(app)), styles::muted_style()),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);

    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

/// "2015-08 to 2024-03 | 123456 records | updated 2h ago"
fn dataset_summary(app: &App) -> String {
    let coverage = match app.dataset.coverage() {
        Some((first, last)) => format!("{} to {}", first, last),
        None => "no data".to_string(),
    };
    let age = app.cache_age.as_deref().unwrap_or("never");
    format!(
        "{} | {} records | updated {}",
        coverage,
        app.dataset.len(),
        age
    )
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(48, 17, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled("  crimetrend", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        key("1-5", "Switch view"),
        key("Tab", "Next view"),
        key("S-Tab", "Previous view"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        key("+ / -", "Widen / narrow rolling window"),
        key("u", "Fetch newly published months"),
        key("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
