use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::info;

use damage_map::annotate::ToolMode;
use damage_map::app::App;
use damage_map::config::{Args, MapConfig};
use damage_map::tiles::{ImageProbe, TileLayerCache};
use damage_map::{logging, ui};

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = logging::init(&args.log_file, args.verbose)?;
    let config = MapConfig::from(&args);
    info!(?config, "Starting damage map");

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &config);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Handle mouse events for panning, zooming and drawing
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.press_at(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.drag_to(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => {
            app.release_at(mouse.column, mouse.row);
        }
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, config: &MapConfig) -> Result<()> {
    let size = terminal.size()?;
    let cache = TileLayerCache::new(config.tiles_dir.clone(), Arc::new(ImageProbe));
    let mut app = App::new(size.width as usize, size.height as usize, config, cache);
    app.load(config);

    loop {
        // Finished tile loads land before the frame that shows them
        app.tick();

        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Layer toggles
                            KeyCode::Char('b') | KeyCode::Char('B') => app.toggle_buildings(),
                            KeyCode::Char('c') | KeyCode::Char('C') => app.toggle_craters(),
                            KeyCode::Char('s') | KeyCode::Char('S') => app.toggle_satellite(),

                            // Selection tools
                            KeyCode::Char('d') | KeyCode::Char('D') => app.toggle_tool(ToolMode::Lasso),
                            KeyCode::Char('m') | KeyCode::Char('M') => app.toggle_tool(ToolMode::Crater),
                            KeyCode::Char('e') | KeyCode::Char('E') => app.clear_annotations(),

                            // Refit the view to the data
                            KeyCode::Char('r') | KeyCode::Char('0') => app.fit_to_data(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!("Exiting");
    Ok(())
}
