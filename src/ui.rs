use crate::app::App;
use crate::braille::BrailleCanvas;
use crate::map::{MapLayers, Mode, RenderState};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

/// Width of the legend panel, borders included
pub const LEGEND_WIDTH: u16 = 26;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area and status bar
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map and legend
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(LEGEND_WIDTH)])
        .split(rows[0]);

    render_map(frame, app, columns[0]);
    render_legend(frame, app, columns[1]);
    render_status_bar(frame, app, rows[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Damage Assessment Map ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Braille gives 2x4 resolution per character
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let layers = app.map_renderer.render(
        inner.width as usize,
        inner.height as usize,
        &viewport,
        RenderState {
            rendering: app.zoom_mode.rendering(),
            overlays: app.tile_cache.overlays(),
            tool: &app.tool,
        },
    );

    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

/// Braille layers drawn back to front with text labels on top
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.cells() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            buf[(area.x + col as u16, area.y + row as u16)].set_char(ch).set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layers = &self.layers;
        Self::render_layer(&layers.satellite, Color::Gray, area, buf);
        Self::render_layer(&layers.tile_edges, Color::DarkGray, area, buf);
        Self::render_layer(&layers.footprints, Color::LightGreen, area, buf);
        Self::render_layer(&layers.selected, Color::LightRed, area, buf);

        let heat_colors = [Color::Yellow, Color::LightRed, Color::Red];
        for (canvas, color) in layers.heat.iter().zip(heat_colors) {
            Self::render_layer(canvas, color, area, buf);
        }

        Self::render_layer(&layers.buildings, Color::Red, area, buf);
        Self::render_layer(&layers.craters, Color::Magenta, area, buf);
        Self::render_layer(&layers.drawing, Color::LightYellow, area, buf);

        let label_style = Style::default().fg(Color::LightYellow);
        for (lx, ly, text) in &layers.labels {
            if *ly >= area.height || *lx >= area.width {
                continue;
            }
            let x = area.x + *lx;
            let y = area.y + *ly;
            let max_len = area.width.saturating_sub(*lx) as usize;
            for (i, ch) in text.chars().take(max_len).enumerate() {
                buf[(x + i as u16, y)].set_char(ch).set_style(label_style);
            }
        }

        if let Some((cx, cy)) = self.cursor_pos {
            buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
        }
    }
}

/// One line of the legend
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub symbol: &'static str,
    pub label: String,
    pub key: char,
    pub color: Color,
    pub active: bool,
}

/// Legend lines for the current layer and mode state. Satellite is only
/// active in Detail; building and crater markers follow their toggles.
pub fn legend_entries(app: &App) -> Vec<LegendEntry> {
    let settings = &app.map_renderer.settings;
    let detail = app.zoom_mode.mode() == Mode::Detail;

    vec![
        LegendEntry {
            symbol: "●",
            label: format!("Damaged ({})", app.map_renderer.buildings.len()),
            key: 'b',
            color: Color::Red,
            active: settings.show_buildings,
        },
        LegendEntry {
            symbol: "○",
            label: format!("Craters ({})", app.map_renderer.craters.len()),
            key: 'c',
            color: Color::Magenta,
            active: settings.show_craters,
        },
        LegendEntry {
            symbol: "▒",
            label: "Satellite".to_string(),
            key: 's',
            color: Color::Gray,
            active: app.zoom_mode.satellite_enabled() && detail,
        },
    ]
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Legend ", Style::default().fg(Color::Cyan)));

    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = legend_entries(app)
        .into_iter()
        .map(|entry| {
            let (symbol_style, label_style) = if entry.active {
                (Style::default().fg(entry.color), Style::default().fg(Color::White))
            } else {
                (dim, dim.add_modifier(Modifier::CROSSED_OUT))
            };
            Line::from(vec![
                Span::styled(format!("{} ", entry.symbol), symbol_style),
                Span::styled(entry.label, label_style),
                Span::styled(format!(" [{}]", entry.key), dim),
            ])
        })
        .collect();

    lines.push(Line::default());
    let view = match app.zoom_mode.mode() {
        Mode::Aggregate => format!("Heat map (<z{:.0})", app.zoom_mode.threshold()),
        Mode::Detail => "Markers + imagery".to_string(),
    };
    lines.push(Line::from(Span::styled(view, Style::default().fg(Color::Yellow))));

    if !app.map_renderer.footprints.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Selected: ", dim),
            Span::styled(app.tool.selected_count().to_string(), Style::default().fg(Color::LightRed)),
        ]));
    }
    if !app.tool.craters().is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Marked craters: ", dim),
            Span::styled(app.tool.craters().len().to_string(), Style::default().fg(Color::LightYellow)),
        ]));
    }

    if let Some(marker) = &app.inspected {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(marker.to_string(), Style::default().fg(Color::Cyan))));
    }

    let error_style = Style::default().fg(Color::Red);
    for notice in &app.notices {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(notice.clone(), error_style)));
    }

    let legend = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(legend, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let mode_color = match app.zoom_mode.mode() {
        Mode::Aggregate => Color::Yellow,
        Mode::Detail => Color::Green,
    };

    let status = Line::from(vec![
        Span::styled(" Zoom: ", dim),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", dim),
        Span::styled(app.zoom_mode.mode().label(), Style::default().fg(mode_color)),
        Span::styled(") ", dim),
        Span::styled(app.tile_status(), Style::default().fg(Color::Gray)),
        Span::styled(" | tool: ", dim),
        Span::styled(app.tool.mode().label(), Style::default().fg(Color::LightYellow)),
        Span::styled(" | ", dim),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            " | hjkl:pan +/-:zoom d:lasso m:crater e:clear r:fit q:quit",
            dim,
        ),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}
