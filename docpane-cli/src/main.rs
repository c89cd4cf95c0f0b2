use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use docpane_client::HttpDocumentService;
use docpane_core::{
    Command, DocumentInfo, DocumentKind, FileRef, Quality, RenderedUnit, SearchHit, UnitNumber,
    ViewMode, ViewState, Viewer, ViewerBuilder, ViewerConfig, ViewerEvent,
};
use docpane_tty::{
    place_image, place_overlay, write_status_line, DrawParams, EventMapper, ImagePlacement,
    InputMode, KittyRenderer, MarkupRenderer, TerminalGeometry, UiEvent,
};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "docpane",
    version,
    about = "kitty-native viewer for documents rendered by a conversion service"
)]
struct Args {
    /// Document path as known to the service
    file: String,

    /// Document kind; inferred from the extension when omitted
    #[arg(long)]
    kind: Option<DocumentKind>,

    /// Unit (page, slide or sheet) to open on, starting at 1
    #[arg(short = 'p', long = "unit")]
    unit: Option<UnitNumber>,

    /// Base URL of the conversion service
    #[arg(long)]
    api_base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long)]
    token: Option<String>,

    #[arg(long)]
    quality: Option<Quality>,

    #[arg(long)]
    zoom: Option<f32>,

    /// image, text or engine
    #[arg(long)]
    mode: Option<ViewMode>,

    /// Config file to read instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn apply_to(&self, config: &mut ViewerConfig) {
        if let Some(url) = &self.api_base_url {
            config.api_base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        if let Some(mode) = self.mode {
            config.view_mode = mode;
        }
    }

    fn file_ref(&self) -> Result<FileRef> {
        match self.kind {
            Some(kind) => Ok(FileRef::new(self.file.clone(), kind)),
            None => FileRef::from_path(self.file.clone()).ok_or_else(|| {
                anyhow!(
                    "cannot tell the document kind of {:?}; pass --kind pdf|docx|pptx|xlsx",
                    self.file
                )
            }),
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let file = args.file_ref()?;

    let project_dirs = ViewerConfig::project_dirs()
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = load_config(&args, &project_dirs)?;
    info!(api = %config.api_base_url, path = %file.path, kind = ?file.kind, "starting");

    let viewer = Arc::new(build_viewer(&config));
    {
        let viewer = Arc::clone(&viewer);
        let start_unit = args.unit;
        tokio::spawn(async move {
            if viewer.open(file).await.is_ok() {
                if let Some(unit) = start_unit {
                    viewer.go_to(unit);
                }
            }
        });
    }

    let markup = MarkupRenderer::new().context("failed to prepare markup renderer")?;
    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);
    let mut event_mapper = EventMapper::new();
    let mut overlay = OverlayState::None;
    let mut reported: Option<UnitNumber> = None;
    let mut dirty = true;

    loop {
        if overlay.is_active() {
            if event_mapper.mode() != InputMode::Results {
                event_mapper.set_mode(InputMode::Results);
            }
        } else if matches!(event_mapper.mode(), InputMode::Results) {
            event_mapper.set_mode(InputMode::Normal);
        }

        for event in viewer.drain_events() {
            if event == ViewerEvent::CacheInvalidated {
                reported = None;
            }
            dirty = true;
        }

        if dirty {
            let pending = event_mapper.pending_input();
            redraw(&mut renderer, &viewer, &markup, pending.as_deref(), &mut overlay)?;
            report_visible(&viewer, &mut reported);
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            if matches!(ev, Event::Resize(..)) {
                dirty = true;
                continue;
            }
            let ui_event = event_mapper.map_event(ev);
            let overlay_was_active = overlay.is_active();
            match handle_event(ui_event, &viewer, &mut overlay, &mut event_mapper, &mut reported) {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
            if overlay.is_active() != overlay_was_active {
                dirty = true;
            }
            if !dirty && !overlay.is_active() {
                let pending = event_mapper.pending_input();
                let status = combine_status(Some(format_status(&viewer)), pending.as_deref());
                if let Some(status) = status {
                    draw_status_line(&mut renderer, &status)?;
                }
            }
        }
    }

    viewer.release();
    renderer.delete_images()?;
    renderer.clear_all()?;
    Ok(())
}

fn load_config(args: &Args, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let mut config = ViewerConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {:?}", path))?
        .with_env_overrides(|key| std::env::var(key).ok());
    args.apply_to(&mut config);
    Ok(config)
}

fn build_viewer(config: &ViewerConfig) -> Viewer {
    let service = Arc::new(HttpDocumentService::from_config(config));
    let builder = ViewerBuilder::from_config(service, config).on_text_selected(copy_to_clipboard);
    with_engine(builder).build()
}

#[cfg(feature = "pdfium")]
fn with_engine(builder: ViewerBuilder) -> ViewerBuilder {
    match docpane_client::PdfiumEngine::new() {
        Ok(engine) => builder.engine(Arc::new(engine)),
        Err(err) => {
            warn!(%err, "local rendering engine unavailable");
            builder.engine_unavailable(err.to_string())
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn with_engine(builder: ViewerBuilder) -> ViewerBuilder {
    builder.engine_unavailable("built without the pdfium feature")
}

fn copy_to_clipboard(text: &str, unit: UnitNumber) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => match clipboard.set_text(text.to_string()) {
            Ok(()) => debug!(unit, chars = text.len(), "copied selection to clipboard"),
            Err(err) => warn!(%err, "failed to copy text to clipboard"),
        },
        Err(err) => warn!(%err, "failed to access clipboard"),
    }
}

/// Tells the viewer the current unit is on screen, once per unit until the
/// cache is invalidated or a retry is requested.
fn report_visible(viewer: &Arc<Viewer>, reported: &mut Option<UnitNumber>) {
    if viewer.info().is_none() {
        return;
    }
    let current = viewer.current_unit();
    if *reported == Some(current) {
        return;
    }
    *reported = Some(current);
    let viewer = Arc::clone(viewer);
    tokio::spawn(async move {
        viewer.on_visible(&[current]).await;
    });
}

fn spawn_command(viewer: &Arc<Viewer>, command: Command) {
    let viewer = Arc::clone(viewer);
    tokio::spawn(async move {
        if let Err(err) = viewer.apply(command).await {
            debug!(%err, "command failed");
        }
    });
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

enum OverlayState {
    None,
    Results(ResultsWindow),
}

impl OverlayState {
    fn deactivate(&mut self) {
        *self = OverlayState::None;
    }

    fn is_active(&self) -> bool {
        !matches!(self, OverlayState::None)
    }
}

/// Scrollable list of search hits.
struct ResultsWindow {
    title: String,
    noun: &'static str,
    hits: Vec<SearchHit>,
    selected: usize,
    scroll_offset: usize,
}

impl ResultsWindow {
    fn new(title: String, noun: &'static str, hits: Vec<SearchHit>, current_unit: UnitNumber) -> Self {
        let selected = hits
            .iter()
            .rposition(|hit| hit.unit <= current_unit)
            .unwrap_or(0);
        Self {
            title,
            noun,
            hits,
            selected,
            scroll_offset: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    fn move_selection(&mut self, delta: isize) -> bool {
        if self.hits.is_empty() {
            return false;
        }
        let len = self.hits.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.hits.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.hits.len().saturating_sub(viewport_height);
        if self.scroll_offset > max_offset {
            self.scroll_offset = max_offset;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
            return;
        }
        let bottom = self.scroll_offset + viewport_height;
        if self.selected >= bottom {
            self.scroll_offset = self
                .selected
                .saturating_sub(viewport_height.saturating_sub(1));
        }
    }

    fn line(&self, index: usize, inner_width: usize) -> String {
        let hit = &self.hits[index];
        let marker = if index == self.selected { '>' } else { ' ' };
        let plural = if hit.match_count == 1 { "" } else { "es" };
        truncate_with_ellipsis(
            format!(
                "{marker} {} {} ({} match{plural})",
                self.noun, hit.unit, hit.match_count
            ),
            inner_width,
        )
    }
}

fn handle_event(
    event: UiEvent,
    viewer: &Arc<Viewer>,
    overlay: &mut OverlayState,
    mapper: &mut EventMapper,
    reported: &mut Option<UnitNumber>,
) -> LoopAction {
    match event {
        UiEvent::BeginSearch | UiEvent::SearchQueryChanged { .. } | UiEvent::SearchCancel => {
            LoopAction::Continue
        }
        UiEvent::SearchSubmit { query } => {
            spawn_command(viewer, Command::Search { query });
            LoopAction::ContinueRedraw
        }
        UiEvent::Command(command) => {
            if matches!(command, Command::Retry) {
                *reported = None;
            }
            spawn_command(viewer, command);
            LoopAction::Continue
        }
        UiEvent::OpenResults => {
            let state = viewer.state();
            let Some(results) = state.search_results else {
                return LoopAction::Continue;
            };
            let noun = viewer.file().map_or("page", |file| file.kind.unit_noun());
            let title = format!(
                "\"{}\": {} matches on {} {noun}s",
                results.query, results.total_matches, results.pages_with_matches
            );
            *overlay = OverlayState::Results(ResultsWindow::new(
                title,
                noun,
                results.hits,
                state.current_unit,
            ));
            mapper.set_mode(InputMode::Results);
            LoopAction::ContinueRedraw
        }
        UiEvent::CloseOverlay => {
            if overlay.is_active() {
                overlay.deactivate();
                mapper.set_mode(InputMode::Normal);
                LoopAction::ContinueRedraw
            } else {
                LoopAction::Continue
            }
        }
        UiEvent::ResultsMoveSelection { delta } => {
            if let OverlayState::Results(results) = overlay {
                if results.move_selection(delta) {
                    return LoopAction::ContinueRedraw;
                }
            }
            LoopAction::Continue
        }
        UiEvent::ResultsActivateSelection => {
            if let OverlayState::Results(results) = overlay {
                if !results.is_empty() {
                    viewer.open_search_hit(results.selected);
                    overlay.deactivate();
                    mapper.set_mode(InputMode::Normal);
                    return LoopAction::ContinueRedraw;
                }
            }
            LoopAction::Continue
        }
        UiEvent::Quit => LoopAction::Quit,
        UiEvent::None => LoopAction::Continue,
    }
}

fn terminal_geometry() -> Result<TerminalGeometry> {
    let window = terminal::window_size()?;
    Ok(TerminalGeometry {
        columns: u32::from(window.columns).max(1),
        rows: u32::from(window.rows).max(1),
        pixel_width: u32::from(window.width),
        pixel_height: u32::from(window.height),
    })
}

fn redraw(
    renderer: &mut KittyRenderer<io::Stdout>,
    viewer: &Viewer,
    markup: &MarkupRenderer,
    pending_input: Option<&str>,
    overlay: &mut OverlayState,
) -> Result<()> {
    let geometry = terminal_geometry()?;
    let area_rows = geometry.rows.saturating_sub(1).max(1);

    renderer.begin_sync_update()?;
    renderer.delete_images()?;
    renderer.clear_all()?;

    if let OverlayState::Results(results) = overlay {
        draw_results_overlay(renderer, results, geometry.columns, area_rows)?;
        return renderer.end_sync_update();
    }

    let state = viewer.state();
    match viewer.info() {
        None => draw_document_placeholder(renderer, viewer, &state, geometry.columns, area_rows)?,
        Some(info) => draw_unit(renderer, viewer, markup, &info, &state, &geometry, area_rows)?,
    }

    if let Some(status) = combine_status(Some(format_status(viewer)), pending_input) {
        draw_status_line(renderer, &status)?;
    }
    renderer.end_sync_update()
}

fn draw_document_placeholder(
    renderer: &mut KittyRenderer<io::Stdout>,
    viewer: &Viewer,
    state: &ViewState,
    total_cols: u32,
    area_rows: u32,
) -> Result<()> {
    let path = viewer.file().map(|file| file.path).unwrap_or_default();
    match &state.last_error {
        Some(error) => draw_message(
            renderer,
            &[
                "Could not open document",
                &error.message,
                "",
                "r: retry   q: quit",
            ],
            total_cols,
            area_rows,
        ),
        None => draw_message(renderer, &[&format!("Loading {path}...")], total_cols, area_rows),
    }
}

fn draw_unit(
    renderer: &mut KittyRenderer<io::Stdout>,
    viewer: &Viewer,
    markup: &MarkupRenderer,
    info: &DocumentInfo,
    state: &ViewState,
    geometry: &TerminalGeometry,
    area_rows: u32,
) -> Result<()> {
    let unit = state.current_unit;
    let noun = viewer.file().map_or("page", |file| file.kind.unit_noun());

    let Some(rendered) = viewer.rendered(unit) else {
        let heading = format!("{noun} {unit} of {}", info.total_units);
        return match state.page_errors.get(&unit) {
            Some(message) => draw_message(
                renderer,
                &[&heading, message, "", "r: retry   Esc: dismiss"],
                geometry.columns,
                area_rows,
            ),
            None => draw_message(
                renderer,
                &[&heading, "Loading..."],
                geometry.columns,
                area_rows,
            ),
        };
    };

    match rendered {
        RenderedUnit::Image {
            image_data,
            width,
            height,
        } => {
            let placement = place_image(width, height, geometry, area_rows);
            draw_image(renderer, &placement, |renderer, params| {
                renderer.draw_encoded(&image_data, params)
            })?;
        }
        RenderedUnit::Overlay {
            image_data,
            width,
            height,
            overlay,
        } => {
            let placement = place_image(width, height, geometry, area_rows);
            draw_image(renderer, &placement, |renderer, params| {
                renderer.draw_encoded(&image_data, params)
            })?;
            let writer = renderer.writer();
            for cell in place_overlay(&overlay, &placement) {
                crossterm::queue!(
                    writer,
                    cursor::MoveTo(cell.column as u16, cell.row as u16),
                    Print(cell.text)
                )?;
            }
            writer.flush()?;
        }
        RenderedUnit::Bitmap(bitmap) => {
            let placement = place_image(bitmap.width, bitmap.height, geometry, area_rows);
            draw_image(renderer, &placement, |renderer, params| {
                renderer.draw_bitmap(&bitmap, params)
            })?;
        }
        RenderedUnit::Markup { html } => {
            let lines = markup.to_lines(&html);
            let width = geometry.columns.saturating_sub(2) as usize;
            let writer = renderer.writer();
            if let Some(label) = info.label(unit) {
                crossterm::queue!(
                    writer,
                    cursor::MoveTo(1, 0),
                    SetAttribute(Attribute::Bold),
                    Print(truncate_with_ellipsis(label.to_string(), width)),
                    SetAttribute(Attribute::Reset)
                )?;
            }
            for (row, line) in lines.into_iter().take(area_rows.saturating_sub(2) as usize).enumerate() {
                crossterm::queue!(
                    writer,
                    cursor::MoveTo(1, row as u16 + 2),
                    Print(truncate_with_ellipsis(line, width).trim_end())
                )?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn draw_image<F>(
    renderer: &mut KittyRenderer<io::Stdout>,
    placement: &ImagePlacement,
    draw: F,
) -> Result<()>
where
    F: FnOnce(&mut KittyRenderer<io::Stdout>, DrawParams) -> Result<()>,
{
    crossterm::execute!(
        renderer.writer(),
        cursor::MoveTo(placement.column as u16, placement.row as u16)
    )?;
    if let Err(err) = draw(renderer, DrawParams::clamped(placement.columns, placement.rows)) {
        warn!(%err, "failed to draw page image");
        crossterm::execute!(
            renderer.writer(),
            cursor::MoveTo(placement.column as u16, placement.row as u16),
            Print(format!("cannot display image: {err}"))
        )?;
    }
    Ok(())
}

fn draw_message(
    renderer: &mut KittyRenderer<io::Stdout>,
    lines: &[&str],
    total_cols: u32,
    area_rows: u32,
) -> Result<()> {
    let width = total_cols.saturating_sub(2) as usize;
    let start_row = area_rows.saturating_sub(lines.len() as u32) / 2;
    let writer = renderer.writer();
    for (offset, line) in lines.iter().enumerate() {
        let text: String = line.chars().take(width).collect();
        let col = (total_cols as usize).saturating_sub(text.chars().count()) / 2;
        crossterm::queue!(
            writer,
            cursor::MoveTo(col as u16, (start_row as usize + offset) as u16),
            Print(text)
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn format_status(viewer: &Viewer) -> String {
    let state = viewer.state();
    let params = viewer.render_parameters();
    let Some(file) = viewer.file() else {
        return String::new();
    };
    let name = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();

    let mut status = match viewer.info() {
        Some(info) => format!(
            "{} | {} {}/{}",
            info.title.clone().unwrap_or(name),
            file.kind.unit_noun(),
            state.current_unit,
            info.total_units
        ),
        None => name,
    };
    status.push_str(&format!(
        " | {:.0}% {} {}",
        params.zoom() * 100.0,
        params.quality,
        viewer.view_mode().label()
    ));

    if state.loading {
        status.push_str(" | loading");
    }
    if state.searching {
        status.push_str(" | searching");
    } else if let Some(results) = &state.search_results {
        if results.is_empty() {
            status.push_str(&format!(" | /{} (no matches)", results.query));
        } else {
            status.push_str(&format!(
                " | /{} ({} on {})",
                results.query, results.total_matches, results.pages_with_matches
            ));
        }
    }
    if let Some(error) = &state.last_error {
        status.push_str(" | ");
        status.push_str(&error.message);
        if error.is_dismissible() {
            status.push_str(" (Esc)");
        }
    }
    status
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn draw_status_line(renderer: &mut KittyRenderer<io::Stdout>, status: &str) -> Result<()> {
    let geometry = terminal_geometry()?;
    let status_row = geometry.rows.saturating_sub(1);
    let status: String = status.chars().take(geometry.columns as usize).collect();
    let writer = renderer.writer();
    crossterm::execute!(
        writer,
        cursor::MoveTo(0, status_row as u16),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(writer, &status)?;
    Ok(())
}

fn draw_results_overlay(
    renderer: &mut KittyRenderer<io::Stdout>,
    results: &mut ResultsWindow,
    total_cols: u32,
    area_rows: u32,
) -> Result<()> {
    const EMPTY_MESSAGE: &str = "No matches";

    if total_cols < 20 || area_rows < 6 {
        return Ok(());
    }

    let max_inner_width = total_cols.saturating_sub(6) as usize;
    let longest = (0..results.hits.len())
        .map(|index| results.line(index, usize::MAX).trim_end().len())
        .max()
        .unwrap_or(EMPTY_MESSAGE.len() + 2);
    let inner_width = longest
        .max(results.title.len())
        .clamp(20.min(max_inner_width), max_inner_width);

    let max_window_height = area_rows.saturating_sub(2);
    let max_content_height = max_window_height.saturating_sub(4) as usize;
    if max_content_height == 0 {
        return Ok(());
    }

    let total_entries = results.hits.len().max(1);
    let content_height = total_entries.min(max_content_height);
    results.ensure_visible(content_height);

    let window_height = (content_height + 4) as u32;
    let window_width = (inner_width + 2) as u32;
    let start_col = (total_cols.saturating_sub(window_width) / 2) as u16;
    let mut row = (area_rows.saturating_sub(window_height) / 2) as u16;

    let writer = renderer.writer();
    let horizontal_border = format!("+{}+", "-".repeat(inner_width));

    print_inverted(writer, start_col, row, &horizontal_border)?;
    row = row.saturating_add(1);
    let title = truncate_with_ellipsis(results.title.clone(), inner_width);
    print_inverted(writer, start_col, row, &format!("|{title}|"))?;
    row = row.saturating_add(1);
    print_inverted(writer, start_col, row, &format!("|{}|", "-".repeat(inner_width)))?;
    row = row.saturating_add(1);

    if results.is_empty() {
        let content = truncate_with_ellipsis(format!("  {EMPTY_MESSAGE}"), inner_width);
        print_inverted(writer, start_col, row, &format!("|{content}|"))?;
        row = row.saturating_add(1);
    } else {
        let start = results.scroll_offset;
        let end = (start + content_height).min(results.hits.len());
        for index in start..end {
            print_inverted(
                writer,
                start_col,
                row,
                &format!("|{}|", results.line(index, inner_width)),
            )?;
            row = row.saturating_add(1);
        }
        for _ in (end - start)..content_height {
            print_inverted(writer, start_col, row, &format!("|{}|", " ".repeat(inner_width)))?;
            row = row.saturating_add(1);
        }
    }

    print_inverted(writer, start_col, row, &horizontal_border)?;
    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::execute!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let len = text.chars().count();
    let mut text = if len > width {
        if width <= 3 {
            text.chars().take(width).collect()
        } else {
            let mut truncated = text.chars().take(width - 3).collect::<String>();
            truncated.push_str("...");
            truncated
        }
    } else {
        text
    };
    let len = text.chars().count();
    if len < width && width != usize::MAX {
        text.push_str(&" ".repeat(width - len));
    }
    text
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "docpane.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // The terminal belongs to the viewer; only log to stderr when redirected.
    let console_layer = (!io::stderr().is_terminal())
        .then(|| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
