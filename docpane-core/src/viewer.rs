use std::sync::Arc;

use bytes::Bytes;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::cache::{Generation, PageCache, StoreOutcome};
use crate::config::ViewerConfig;
use crate::overlay::TextOverlay;
use crate::service::{DocumentService, ExternalEngine};
use crate::types::{
    Bitmap, BoundingBox, DocumentInfo, DocumentKind, ErrorScope, FileRef, PageContent, PageRecord,
    Quality, RenderParameters, SearchResults, UnitNumber, ViewError, ViewMode, ViewState,
};
use crate::viewport::{FetchPlanner, NeighborPlanner, ViewportWatcher};
use crate::{Command, ViewerEvent};

/// Called with the selected text and the unit it came from.
pub type TextSelectedHook = Arc<dyn Fn(&str, UnitNumber) + Send + Sync>;

/// Scale applied on top of the zoom when the external engine rasterizes.
pub const ENGINE_SCALE_FACTOR: f32 = 1.5;

/// Raw document download shared by every engine fetch of the same file.
type RawDownload = Shared<BoxFuture<'static, Result<Bytes, ViewError>>>;

enum EngineSlot {
    Missing,
    Unavailable(String),
    Ready(Arc<dyn ExternalEngine>),
}

/// A unit ready to be drawn in the active view mode.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedUnit {
    Image {
        image_data: Bytes,
        width: u32,
        height: u32,
    },
    Overlay {
        image_data: Bytes,
        width: u32,
        height: u32,
        overlay: TextOverlay,
    },
    Bitmap(Bitmap),
    Markup {
        html: String,
    },
}

pub struct ViewerBuilder {
    service: Arc<dyn DocumentService>,
    engine: EngineSlot,
    params: RenderParameters,
    mode: ViewMode,
    initial_range: u32,
    planner: Box<dyn FetchPlanner>,
    on_text_selected: Option<TextSelectedHook>,
}

impl ViewerBuilder {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self {
            service,
            engine: EngineSlot::Missing,
            params: RenderParameters::default(),
            mode: ViewMode::default(),
            initial_range: 3,
            planner: Box::new(NeighborPlanner::default()),
            on_text_selected: None,
        }
    }

    pub fn from_config(service: Arc<dyn DocumentService>, config: &ViewerConfig) -> Self {
        Self::new(service)
            .render_parameters(config.render_parameters())
            .view_mode(config.view_mode)
            .initial_range(config.initial_range)
            .planner(Box::new(NeighborPlanner {
                radius: config.prefetch_radius,
            }))
    }

    pub fn engine(mut self, engine: Arc<dyn ExternalEngine>) -> Self {
        self.engine = EngineSlot::Ready(engine);
        self
    }

    /// Records why no engine could be loaded; shown when engine mode is used.
    pub fn engine_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.engine = EngineSlot::Unavailable(reason.into());
        self
    }

    pub fn render_parameters(mut self, params: RenderParameters) -> Self {
        self.params = params;
        self
    }

    pub fn view_mode(mut self, mode: ViewMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn initial_range(mut self, count: u32) -> Self {
        self.initial_range = count.max(1);
        self
    }

    pub fn planner(mut self, planner: Box<dyn FetchPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn on_text_selected<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, UnitNumber) + Send + Sync + 'static,
    {
        self.on_text_selected = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Viewer {
        Viewer {
            service: self.service,
            engine: self.engine,
            file: Mutex::new(None),
            info: Mutex::new(None),
            params: Mutex::new(self.params),
            mode: Mutex::new(self.mode),
            cache: Mutex::new(PageCache::new()),
            watcher: Mutex::new(ViewportWatcher::new(self.planner)),
            state: Mutex::new(ViewState::fresh()),
            raw: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            on_text_selected: self.on_text_selected,
            initial_range: self.initial_range,
        }
    }
}

/// Everything a fetch needs, captured when it is issued.
struct FetchContext {
    file: FileRef,
    info: DocumentInfo,
    params: RenderParameters,
    mode: ViewMode,
    generation: Generation,
}

/// View-state controller for one document at a time.
///
/// Every method takes `&self`; locks are released before any await so an
/// `Arc<Viewer>` can be shared with spawned fetch tasks.
pub struct Viewer {
    service: Arc<dyn DocumentService>,
    engine: EngineSlot,
    file: Mutex<Option<FileRef>>,
    info: Mutex<Option<DocumentInfo>>,
    params: Mutex<RenderParameters>,
    mode: Mutex<ViewMode>,
    cache: Mutex<PageCache>,
    watcher: Mutex<ViewportWatcher>,
    state: Mutex<ViewState>,
    raw: Mutex<Option<(FileRef, RawDownload)>>,
    events: Mutex<Vec<ViewerEvent>>,
    on_text_selected: Option<TextSelectedHook>,
    initial_range: u32,
}

/// Cached or already being fetched.
fn is_settled(cache: &PageCache, unit: UnitNumber) -> bool {
    cache.contains(unit) || cache.is_in_flight(unit)
}

impl Viewer {
    pub fn builder(service: Arc<dyn DocumentService>) -> ViewerBuilder {
        ViewerBuilder::new(service)
    }

    pub fn file(&self) -> Option<FileRef> {
        self.file.lock().clone()
    }

    pub fn info(&self) -> Option<DocumentInfo> {
        self.info.lock().clone()
    }

    pub fn state(&self) -> ViewState {
        self.state.lock().clone()
    }

    pub fn render_parameters(&self) -> RenderParameters {
        *self.params.lock()
    }

    pub fn view_mode(&self) -> ViewMode {
        *self.mode.lock()
    }

    pub fn current_unit(&self) -> UnitNumber {
        self.state.lock().current_unit
    }

    pub fn cached(&self, unit: UnitNumber) -> Option<PageRecord> {
        self.cache.lock().get(unit).cloned()
    }

    pub fn cached_units(&self) -> Vec<UnitNumber> {
        self.cache.lock().units()
    }

    pub fn is_in_flight(&self, unit: UnitNumber) -> bool {
        self.cache.lock().is_in_flight(unit)
    }

    pub fn drain_events(&self) -> Vec<ViewerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn emit(&self, event: ViewerEvent) {
        self.events.lock().push(event);
    }

    fn raise(&self, error: ViewError) -> ViewError {
        let scope = error.scope;
        {
            let mut state = self.state.lock();
            if let ErrorScope::Page(unit) = scope {
                state.page_errors.insert(unit, error.message.clone());
            }
            state.last_error = Some(error.clone());
        }
        self.emit(ViewerEvent::ErrorRaised(scope));
        error
    }

    /// Switches to another document and loads it.
    #[instrument(skip(self), fields(path = %file.path))]
    pub async fn open(&self, file: FileRef) -> Result<(), ViewError> {
        *self.file.lock() = Some(file);
        *self.info.lock() = None;
        *self.raw.lock() = None;
        {
            let mut cache = self.cache.lock();
            cache.invalidate_all();
            cache.set_total_units(0);
        }
        self.watcher.lock().release();
        *self.state.lock() = ViewState::fresh();
        self.emit(ViewerEvent::CacheInvalidated);
        self.retry().await
    }

    /// Re-runs the info request and the initial range load.
    pub async fn retry(&self) -> Result<(), ViewError> {
        self.load_info().await?;
        self.load_initial_units().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn load_info(&self) -> Result<DocumentInfo, ViewError> {
        let file = self
            .file()
            .ok_or_else(|| ViewError::new(ErrorScope::Metadata, "no document selected"))?;
        {
            let mut state = self.state.lock();
            state.loading = true;
            state.last_error = None;
        }

        let result = self.service.info(&file).await;

        if self.file().as_ref() != Some(&file) {
            debug!(path = %file.path, "document changed while its info was loading");
            return Err(ViewError::new(ErrorScope::Metadata, "document changed while loading"));
        }

        match result {
            Ok(info) => {
                let total = info.total_units;
                *self.info.lock() = Some(info.clone());
                self.cache.lock().set_total_units(total);
                self.watcher.lock().observe(total);
                {
                    let mut state = self.state.lock();
                    state.loading = false;
                    state.last_error = None;
                    state.current_unit = state.current_unit.clamp(1, total.max(1));
                }
                self.emit(ViewerEvent::InfoLoaded);
                Ok(info)
            }
            Err(err) => {
                warn!(?err, path = %file.path, "failed to load document info");
                *self.info.lock() = None;
                self.state.lock().loading = false;
                Err(self.raise(ViewError::new(
                    ErrorScope::Metadata,
                    format!("failed to load {}: {err}", file.path),
                )))
            }
        }
    }

    /// Loads the first `initial_range` units in one go.
    pub async fn load_initial_units(&self) -> Result<Vec<UnitNumber>, ViewError> {
        let total = self.info().map(|info| info.total_units).unwrap_or(0);
        if total == 0 {
            return Ok(Vec::new());
        }
        self.get_range(1, self.initial_range.min(total)).await
    }

    fn context(&self, scope: ErrorScope) -> Result<FetchContext, ViewError> {
        let file = self
            .file()
            .ok_or_else(|| ViewError::new(scope, "no document selected"))?;
        let info = self
            .info()
            .ok_or_else(|| ViewError::new(scope, "document info is not loaded"))?;
        Ok(FetchContext {
            file,
            info,
            params: self.render_parameters(),
            mode: self.view_mode(),
            generation: self.cache.lock().generation(),
        })
    }

    /// Returns the cached record for `unit`, fetching it at the current
    /// render parameters when absent. A response that arrives after an
    /// invalidation is returned but not cached.
    #[instrument(skip(self))]
    pub async fn get(&self, unit: UnitNumber) -> Result<PageRecord, ViewError> {
        let ctx = self.context(ErrorScope::Page(unit))?;
        if !ctx.info.contains(unit) {
            return Err(ViewError::new(
                ErrorScope::Page(unit),
                format!(
                    "{} {unit} is outside 1..={}",
                    ctx.file.kind.unit_noun(),
                    ctx.info.total_units
                ),
            ));
        }

        {
            let mut cache = self.cache.lock();
            if let Some(record) = cache.get(unit) {
                return Ok(record.clone());
            }
            cache.begin_fetch(unit);
        }

        let result = self.fetch_unit(&ctx, unit).await;
        self.cache.lock().finish_fetch(unit, ctx.generation);

        match result {
            Ok(record) => {
                self.accept(ctx.generation, record.clone());
                Ok(record)
            }
            Err(err) => {
                if self.cache.lock().generation() != ctx.generation {
                    debug!(unit, "ignoring failure from superseded fetch");
                    return Err(err);
                }
                warn!(unit, error = %err, "failed to load unit");
                if err.scope == ErrorScope::Engine {
                    self.state.lock().page_errors.insert(unit, err.message.clone());
                }
                self.emit(ViewerEvent::UnitFailed(unit));
                Err(self.raise(err))
            }
        }
    }

    fn accept(&self, generation: Generation, record: PageRecord) {
        let unit = record.unit;
        if self.cache.lock().store(generation, record) == StoreOutcome::Stored {
            self.state.lock().page_errors.remove(&unit);
            self.emit(ViewerEvent::UnitLoaded(unit));
        }
    }

    async fn fetch_unit(&self, ctx: &FetchContext, unit: UnitNumber) -> Result<PageRecord, ViewError> {
        if ctx.mode == ViewMode::ExternalEngine {
            return self.render_with_engine(ctx, unit).await;
        }
        let with_text = ctx.mode.wants_text_layer() && ctx.file.kind.is_raster();
        self.service
            .unit(&ctx.file, &ctx.info, unit, ctx.params, with_text)
            .await
            .map_err(|err| {
                ViewError::new(
                    ErrorScope::Page(unit),
                    format!("failed to load {} {unit}: {err}", ctx.file.kind.unit_noun()),
                )
            })
    }

    async fn render_with_engine(&self, ctx: &FetchContext, unit: UnitNumber) -> Result<PageRecord, ViewError> {
        let engine = match &self.engine {
            EngineSlot::Ready(engine) => Arc::clone(engine),
            EngineSlot::Unavailable(reason) => {
                return Err(ViewError::new(
                    ErrorScope::Engine,
                    format!("rendering engine unavailable: {reason}"),
                ))
            }
            EngineSlot::Missing => {
                return Err(ViewError::new(ErrorScope::Engine, "no rendering engine configured"))
            }
        };
        if ctx.file.kind != DocumentKind::Pdf {
            return Err(ViewError::new(
                ErrorScope::Engine,
                format!("{} only renders PDF documents", engine.name()),
            ));
        }

        let document = self.raw_document(&ctx.file).await?;
        let scale = ctx.params.zoom() * ENGINE_SCALE_FACTOR;
        let bitmap = engine
            .render(document, unit, scale)
            .await
            .map_err(|err| ViewError::new(ErrorScope::Engine, format!("{}: {err}", engine.name())))?;
        Ok(PageRecord {
            unit,
            content: PageContent::Bitmap(bitmap),
            text_layer: None,
        })
    }

    /// Downloads the document once per file. The slot lock is never held
    /// while the download runs, so `open` can replace it at any time.
    async fn raw_document(&self, file: &FileRef) -> Result<Bytes, ViewError> {
        let download = {
            let mut slot = self.raw.lock();
            let existing = slot
                .as_ref()
                .filter(|(owner, _)| owner == file)
                .map(|(_, download)| download.clone());
            match existing {
                Some(download) => download,
                None => {
                    let service = Arc::clone(&self.service);
                    let target = file.clone();
                    let download = async move {
                        service.raw(&target).await.map_err(|err| {
                            ViewError::new(
                                ErrorScope::Engine,
                                format!("failed to download {}: {err}", target.path),
                            )
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some((file.clone(), download.clone()));
                    download
                }
            }
        };

        let result = download.await;
        if result.is_err() {
            let mut slot = self.raw.lock();
            if slot.as_ref().is_some_and(|(owner, _)| owner == file) {
                *slot = None;
            }
        }
        result
    }

    /// Fetches `start..=end` (clamped to the document), in a single request
    /// when the backend supports it. Returns the units that were stored.
    #[instrument(skip(self))]
    pub async fn get_range(&self, start: UnitNumber, end: UnitNumber) -> Result<Vec<UnitNumber>, ViewError> {
        let ctx = self.context(ErrorScope::Page(start))?;
        let start = start.max(1);
        let end = end.min(ctx.info.total_units);
        if start > end {
            return Ok(Vec::new());
        }

        self.state.lock().loading = true;
        let result = self.fetch_range(&ctx, start, end).await;
        self.state.lock().loading = false;
        result
    }

    async fn fetch_range(
        &self,
        ctx: &FetchContext,
        start: UnitNumber,
        end: UnitNumber,
    ) -> Result<Vec<UnitNumber>, ViewError> {
        if ctx.mode != ViewMode::Image || !ctx.file.kind.is_raster() {
            return Ok(self.fetch_each((start..=end).collect()).await);
        }

        let (start, end, marked) = {
            let mut cache = self.cache.lock();
            let mut start = start;
            let mut end = end;
            while start <= end && is_settled(&cache, start) {
                start += 1;
            }
            while end > start && is_settled(&cache, end) {
                end -= 1;
            }
            if start > end {
                debug!("requested range is already cached");
                return Ok(Vec::new());
            }
            let marked: Vec<_> = (start..=end).filter(|&unit| cache.begin_fetch(unit)).collect();
            (start, end, marked)
        };
        let result = self
            .service
            .unit_range(&ctx.file, start, end, ctx.params)
            .await;
        {
            let mut cache = self.cache.lock();
            for unit in marked {
                cache.finish_fetch(unit, ctx.generation);
            }
        }

        match result {
            Ok(records) => {
                let mut stored = Vec::with_capacity(records.len());
                for record in records {
                    let unit = record.unit;
                    if unit < start || unit > end {
                        debug!(unit, start, end, "dropping unit outside requested range");
                        continue;
                    }
                    self.accept(ctx.generation, record);
                    if self.cache.lock().contains(unit) {
                        stored.push(unit);
                    }
                }
                Ok(stored)
            }
            Err(err) if err.is_unsupported() => {
                debug!("batch retrieval unsupported, fetching units one by one");
                Ok(self.fetch_each((start..=end).collect()).await)
            }
            Err(err) => {
                warn!(start, end, error = %err, "failed to load unit range");
                if self.cache.lock().generation() != ctx.generation {
                    return Err(ViewError::new(ErrorScope::Page(start), err.to_string()));
                }
                let message = format!(
                    "failed to load {}s {start}-{end}: {err}",
                    ctx.file.kind.unit_noun()
                );
                {
                    let mut state = self.state.lock();
                    for unit in start..=end {
                        state.page_errors.insert(unit, message.clone());
                    }
                }
                Err(self.raise(ViewError::new(ErrorScope::Page(start), message)))
            }
        }
    }

    /// Issues all fetches at once and lets them race.
    async fn fetch_each(&self, units: Vec<UnitNumber>) -> Vec<UnitNumber> {
        let results = join_all(units.iter().map(|&unit| self.get(unit))).await;
        units
            .into_iter()
            .zip(results)
            .filter_map(|(unit, result)| result.ok().map(|_| unit))
            .collect()
    }

    /// Reports newly visible placeholders. Fetches every visible unit and its
    /// neighbours that is neither cached nor in flight, and returns them.
    pub async fn on_visible(&self, units: &[UnitNumber]) -> Vec<UnitNumber> {
        let requested = {
            let mut cache = self.cache.lock();
            let requested = self.watcher.lock().on_visible(units, &cache);
            for &unit in &requested {
                cache.begin_fetch(unit);
            }
            requested
        };
        {
            let visible = self.watcher.lock().visible().clone();
            self.state.lock().visible = visible;
        }
        if requested.is_empty() {
            return requested;
        }
        debug!(?units, ?requested, "visibility triggered fetches");
        self.fetch_each(requested.clone()).await;
        requested
    }

    /// Stops visibility tracking, e.g. when the hosting view goes away.
    pub fn release(&self) {
        self.watcher.lock().release();
        self.state.lock().visible.clear();
    }

    pub fn invalidate_all(&self) {
        self.cache.lock().invalidate_all();
        self.state.lock().page_errors.clear();
        self.emit(ViewerEvent::CacheInvalidated);
    }

    /// Sets the zoom (clamped) and returns the value in effect.
    pub fn set_zoom(&self, zoom: f32) -> f32 {
        let (changed, effective) = {
            let mut params = self.params.lock();
            let next = params.with_zoom(zoom);
            let changed = (next.zoom() - params.zoom()).abs() > f32::EPSILON;
            *params = next;
            (changed, next.zoom())
        };
        if changed {
            self.invalidate_all();
        }
        effective
    }

    pub fn zoom_by(&self, delta: f32) -> f32 {
        let current = self.render_parameters().zoom();
        self.set_zoom(current + delta)
    }

    pub fn reset_zoom(&self) -> f32 {
        self.set_zoom(RenderParameters::DEFAULT_ZOOM)
    }

    /// Returns whether the quality actually changed.
    pub fn set_quality(&self, quality: Quality) -> bool {
        let changed = {
            let mut params = self.params.lock();
            let changed = params.quality != quality;
            *params = params.with_quality(quality);
            changed
        };
        if changed {
            self.invalidate_all();
        }
        changed
    }

    pub fn cycle_quality(&self) -> Quality {
        let next = self.render_parameters().quality.next();
        self.set_quality(next);
        next
    }

    /// Switches the render mode. Cached records belong to the previous mode,
    /// so a change invalidates the cache.
    pub fn set_view_mode(&self, mode: ViewMode) -> bool {
        let changed = {
            let mut current = self.mode.lock();
            let changed = *current != mode;
            *current = mode;
            changed
        };
        if !changed {
            return false;
        }
        self.invalidate_all();
        if mode == ViewMode::ExternalEngine {
            let reason = match &self.engine {
                EngineSlot::Ready(_) => None,
                EngineSlot::Unavailable(reason) => Some(format!("rendering engine unavailable: {reason}")),
                EngineSlot::Missing => Some("no rendering engine configured".to_string()),
            };
            if let Some(reason) = reason {
                self.raise(ViewError::new(ErrorScope::Engine, reason));
            }
        } else {
            let mut state = self.state.lock();
            if matches!(
                state.last_error.as_ref().map(|e| e.scope),
                Some(ErrorScope::Engine)
            ) {
                state.last_error = None;
            }
        }
        true
    }

    pub fn cycle_view_mode(&self) -> ViewMode {
        let next = self.view_mode().next();
        self.set_view_mode(next);
        next
    }

    /// Runs a full-document search. Blank queries are ignored.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Option<SearchResults>, ViewError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let file = self
            .file()
            .ok_or_else(|| ViewError::new(ErrorScope::Search, "no document selected"))?;

        self.state.lock().searching = true;
        let result = self.service.search(&file, query).await;

        if self.file().as_ref() != Some(&file) {
            debug!(path = %file.path, "document changed while searching, dropping results");
            return Ok(None);
        }
        self.state.lock().searching = false;

        match result {
            Ok(mut results) => {
                results.hits.sort_by_key(|hit| hit.unit);
                self.state.lock().search_results = Some(results.clone());
                self.emit(ViewerEvent::SearchFinished);
                Ok(Some(results))
            }
            Err(err) => {
                warn!(error = %err, query, "search failed");
                Err(self.raise(ViewError::new(
                    ErrorScope::Search,
                    format!("search for \"{query}\" failed: {err}"),
                )))
            }
        }
    }

    /// Makes `unit` (clamped to the document) current and asks the host to
    /// scroll its placeholder into view.
    pub fn go_to(&self, unit: UnitNumber) -> Option<UnitNumber> {
        let total = self.info()?.total_units;
        if total == 0 {
            return None;
        }
        let target = unit.clamp(1, total);
        self.state.lock().current_unit = target;
        self.emit(ViewerEvent::ScrollTo(target));
        Some(target)
    }

    pub fn next_unit(&self, count: u32) -> Option<UnitNumber> {
        let current = self.current_unit();
        self.go_to(current.saturating_add(count.max(1)))
    }

    pub fn prev_unit(&self, count: u32) -> Option<UnitNumber> {
        let current = self.current_unit();
        self.go_to(current.saturating_sub(count.max(1)).max(1))
    }

    pub fn open_search_hit(&self, index: usize) -> Option<UnitNumber> {
        let unit = {
            let state = self.state.lock();
            state.search_results.as_ref()?.hits.get(index)?.unit
        };
        self.go_to(unit)
    }

    pub fn next_search_hit(&self, count: u32) -> Option<UnitNumber> {
        let mut result = None;
        for _ in 0..count.max(1) {
            let index = {
                let state = self.state.lock();
                state.search_results.as_ref()?.next_after(state.current_unit)?
            };
            result = self.open_search_hit(index);
        }
        result
    }

    pub fn prev_search_hit(&self, count: u32) -> Option<UnitNumber> {
        let mut result = None;
        for _ in 0..count.max(1) {
            let index = {
                let state = self.state.lock();
                state.search_results.as_ref()?.prev_before(state.current_unit)?
            };
            result = self.open_search_hit(index);
        }
        result
    }

    /// The cached record for `unit`, shaped for the active view mode.
    pub fn rendered(&self, unit: UnitNumber) -> Option<RenderedUnit> {
        let record = self.cached(unit)?;
        let mode = self.view_mode();
        let rendered = match record.content {
            PageContent::Markup { html } => RenderedUnit::Markup { html },
            PageContent::Bitmap(bitmap) => RenderedUnit::Bitmap(bitmap),
            PageContent::Encoded {
                ref image_data,
                width,
                height,
            } => {
                let overlay = if mode.wants_text_layer() {
                    TextOverlay::layout(&record, 1.0)
                } else {
                    None
                };
                match overlay {
                    Some(overlay) => RenderedUnit::Overlay {
                        image_data: image_data.clone(),
                        width,
                        height,
                        overlay,
                    },
                    None => RenderedUnit::Image {
                        image_data: image_data.clone(),
                        width,
                        height,
                    },
                }
            }
        };
        Some(rendered)
    }

    /// Records a selection and hands it to the injected callback.
    pub fn select_text(&self, unit: UnitNumber, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.state.lock().selected_text = Some(text.to_string());
        if let Some(hook) = &self.on_text_selected {
            hook(text, unit);
        }
        true
    }

    /// Selects the overlay text intersecting `rect` (image coordinates).
    pub fn select_region(&self, unit: UnitNumber, rect: BoundingBox) -> Option<String> {
        let record = self.cached(unit)?;
        let overlay = TextOverlay::layout(&record, 1.0)?;
        let text = overlay.text_in(&rect);
        self.select_text(unit, &text).then_some(text)
    }

    pub fn select_unit_text(&self, unit: UnitNumber) -> Option<String> {
        let record = self.cached(unit)?;
        let text = TextOverlay::layout(&record, 1.0)?.full_text();
        self.select_text(unit, &text).then_some(text)
    }

    pub fn clear_selection(&self) {
        self.state.lock().selected_text = None;
    }

    /// Clears the current error unless it is a metadata failure, which only a
    /// successful retry resolves.
    pub fn dismiss_error(&self) -> bool {
        let mut state = self.state.lock();
        match state.last_error.as_ref() {
            Some(error) if error.is_dismissible() => {
                if let ErrorScope::Page(unit) = error.scope {
                    state.page_errors.remove(&unit);
                }
                state.last_error = None;
                true
            }
            _ => false,
        }
    }

    pub async fn apply(&self, command: Command) -> Result<(), ViewError> {
        match command {
            Command::NextUnit { count } => {
                self.next_unit(count);
            }
            Command::PrevUnit { count } => {
                self.prev_unit(count);
            }
            Command::GotoUnit { unit } => {
                self.go_to(unit);
            }
            Command::ZoomBy { delta } => {
                self.zoom_by(delta);
            }
            Command::ResetZoom => {
                self.reset_zoom();
            }
            Command::SetQuality { quality } => {
                self.set_quality(quality);
            }
            Command::CycleQuality => {
                self.cycle_quality();
            }
            Command::SetViewMode { mode } => {
                self.set_view_mode(mode);
            }
            Command::CycleViewMode => {
                self.cycle_view_mode();
            }
            Command::Search { query } => {
                self.search(&query).await?;
            }
            Command::OpenSearchHit { index } => {
                self.open_search_hit(index);
            }
            Command::SearchNext { count } => {
                self.next_search_hit(count);
            }
            Command::SearchPrev { count } => {
                self.prev_search_hit(count);
            }
            Command::SelectUnitText => {
                self.select_unit_text(self.current_unit());
            }
            Command::Reveal { units } => {
                self.on_visible(&units).await;
            }
            Command::Retry => self.retry().await?,
            Command::DismissError => {
                self.dismiss_error();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use crate::error::ServiceError;
    use crate::types::{SearchHit, TextSpan};

    #[derive(Debug, Clone, PartialEq)]
    struct UnitCall {
        unit: UnitNumber,
        params: RenderParameters,
        with_text: bool,
    }

    struct FakeService {
        total: u32,
        failing_info_calls: Mutex<u32>,
        info_calls: AtomicUsize,
        unit_calls: Mutex<Vec<UnitCall>>,
        range_calls: Mutex<Vec<(UnitNumber, UnitNumber)>>,
        raw_calls: AtomicUsize,
        failing_units: Mutex<HashSet<UnitNumber>>,
        search_hits: Vec<SearchHit>,
        fail_search: bool,
        search_calls: AtomicUsize,
        search_hold: Mutex<Option<oneshot::Receiver<()>>>,
        hang_raw: bool,
        hold: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeService {
        fn new(total: u32) -> Self {
            Self {
                total,
                failing_info_calls: Mutex::new(0),
                info_calls: AtomicUsize::new(0),
                unit_calls: Mutex::new(Vec::new()),
                range_calls: Mutex::new(Vec::new()),
                raw_calls: AtomicUsize::new(0),
                failing_units: Mutex::new(HashSet::new()),
                search_hits: Vec::new(),
                fail_search: false,
                search_calls: AtomicUsize::new(0),
                search_hold: Mutex::new(None),
                hang_raw: false,
                hold: Mutex::new(None),
            }
        }

        fn unit_calls(&self) -> Vec<UnitCall> {
            self.unit_calls.lock().clone()
        }

        fn requested_units(&self) -> Vec<UnitNumber> {
            let mut units: Vec<_> = self.unit_calls().iter().map(|c| c.unit).collect();
            units.sort_unstable();
            units
        }

        fn record(&self, file: &FileRef, unit: UnitNumber, params: RenderParameters, with_text: bool) -> PageRecord {
            let content = match file.kind {
                DocumentKind::Pdf => PageContent::Encoded {
                    image_data: Bytes::from(format!("{unit}:{}:{}", params.quality, params.zoom())),
                    width: 100,
                    height: 200,
                },
                _ => PageContent::Markup {
                    html: format!("<p>unit {unit}</p>"),
                },
            };
            PageRecord {
                unit,
                content,
                text_layer: with_text.then(|| {
                    vec![TextSpan {
                        text: format!("text of {unit}"),
                        bbox: BoundingBox::new(5.0, 5.0, 50.0, 10.0),
                    }]
                }),
            }
        }
    }

    #[async_trait]
    impl DocumentService for FakeService {
        async fn info(&self, _file: &FileRef) -> Result<DocumentInfo, ServiceError> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut failing = self.failing_info_calls.lock();
                if *failing > 0 {
                    *failing -= 1;
                    return Err(ServiceError::Status {
                        status: 500,
                        detail: "conversion backend exploded".into(),
                    });
                }
            }
            Ok(DocumentInfo {
                title: Some("Quarterly report".into()),
                total_units: self.total,
                file_size_bytes: 4096,
                unit_labels: Vec::new(),
            })
        }

        async fn unit(
            &self,
            file: &FileRef,
            _info: &DocumentInfo,
            unit: UnitNumber,
            params: RenderParameters,
            with_text: bool,
        ) -> Result<PageRecord, ServiceError> {
            self.unit_calls.lock().push(UnitCall {
                unit,
                params,
                with_text,
            });
            let hold = self.hold.lock().take();
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            if self.failing_units.lock().contains(&unit) {
                return Err(ServiceError::Status {
                    status: 500,
                    detail: format!("cannot render {unit}"),
                });
            }
            Ok(self.record(file, unit, params, with_text))
        }

        async fn unit_range(
            &self,
            file: &FileRef,
            start: UnitNumber,
            end: UnitNumber,
            params: RenderParameters,
        ) -> Result<Vec<PageRecord>, ServiceError> {
            if file.kind != DocumentKind::Pdf {
                return Err(ServiceError::Unsupported {
                    operation: "range retrieval",
                    kind: file.kind,
                });
            }
            self.range_calls.lock().push((start, end));
            Ok((start..=end)
                .map(|unit| self.record(file, unit, params, false))
                .collect())
        }

        async fn search(&self, _file: &FileRef, query: &str) -> Result<SearchResults, ServiceError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let hold = self.search_hold.lock().take();
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            if self.fail_search {
                return Err(ServiceError::Transport("connection reset".into()));
            }
            Ok(SearchResults {
                query: query.to_string(),
                total_matches: self.search_hits.iter().map(|h| h.match_count).sum(),
                pages_with_matches: self.search_hits.len() as u32,
                hits: self.search_hits.clone(),
            })
        }

        async fn raw(&self, _file: &FileRef) -> Result<Bytes, ServiceError> {
            self.raw_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_raw {
                futures::future::pending::<()>().await;
            }
            Ok(Bytes::from_static(b"%PDF-1.7"))
        }
    }

    struct FakeEngine {
        renders: Mutex<Vec<(UnitNumber, f32)>>,
    }

    #[async_trait]
    impl ExternalEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn render(&self, document: Bytes, unit: UnitNumber, scale: f32) -> Result<Bitmap, ServiceError> {
            assert_eq!(&document[..], b"%PDF-1.7");
            self.renders.lock().push((unit, scale));
            Ok(Bitmap {
                width: 1,
                height: 1,
                rgba: vec![unit as u8, 0, 0, 255],
            })
        }
    }

    fn pdf() -> FileRef {
        FileRef::new("docs/report.pdf", DocumentKind::Pdf)
    }

    async fn opened(service: Arc<FakeService>) -> Viewer {
        let viewer = Viewer::builder(service).build();
        viewer.open(pdf()).await.unwrap();
        viewer
    }

    #[tokio::test]
    async fn get_twice_issues_one_request() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;

        let first = viewer.get(7).await.unwrap();
        let second = viewer.get(7).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.requested_units(), vec![7]);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        viewer.get(5).await.unwrap();

        viewer.invalidate_all();
        assert!(viewer.cached_units().is_empty());

        viewer.get(5).await.unwrap();
        assert_eq!(service.requested_units(), vec![5, 5]);
    }

    #[tokio::test]
    async fn zoom_changes_are_clamped_and_invalidate() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        assert!(!viewer.cached_units().is_empty());

        assert_eq!(viewer.set_zoom(5.0), 3.0);
        assert!(viewer.cached_units().is_empty());
        assert_eq!(viewer.set_zoom(0.1), 0.5);
        assert_eq!(viewer.zoom_by(-0.25), 0.5);
        assert_eq!(viewer.zoom_by(RenderParameters::ZOOM_STEP), 0.75);
    }

    #[tokio::test]
    async fn unchanged_parameters_keep_cache() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        let cached = viewer.cached_units();

        viewer.set_zoom(1.0);
        assert!(!viewer.set_quality(Quality::Medium));
        assert!(!viewer.set_view_mode(ViewMode::Image));
        assert_eq!(viewer.cached_units(), cached);
    }

    #[tokio::test]
    async fn first_unit_visible_fetches_only_its_successor() {
        let service = Arc::new(FakeService::new(10));
        let viewer = Viewer::builder(service.clone()).initial_range(1).build();
        viewer.open(pdf()).await.unwrap();
        viewer.invalidate_all();

        let requested = viewer.on_visible(&[1]).await;
        assert_eq!(requested, vec![1, 2]);
        assert_eq!(service.requested_units(), vec![1, 2]);
    }

    #[tokio::test]
    async fn initial_range_then_scrolling_fetches_neighbours() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;

        assert_eq!(*service.range_calls.lock(), vec![(1, 3)]);
        assert_eq!(viewer.cached_units(), vec![1, 2, 3]);
        assert!(service.unit_calls().is_empty());

        let requested = viewer.on_visible(&[5]).await;
        assert_eq!(requested, vec![4, 5, 6]);
        assert_eq!(service.requested_units(), vec![4, 5, 6]);

        // 3, 4 and 5 are all cached by now.
        assert!(viewer.on_visible(&[4]).await.is_empty());
        assert_eq!(viewer.state().visible.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
    }

    #[tokio::test]
    async fn quality_change_evicts_and_refetches_at_new_quality() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        assert!(viewer.cached(3).is_some());

        assert!(viewer.set_quality(Quality::High));
        assert!(viewer.cached(3).is_none());

        viewer.get(3).await.unwrap();
        let calls = service.unit_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].unit, 3);
        assert_eq!(calls[0].params.quality, Quality::High);
        assert!(viewer.drain_events().contains(&ViewerEvent::CacheInvalidated));
    }

    #[tokio::test]
    async fn search_hit_scrolls_to_unit() {
        let mut service = FakeService::new(10);
        service.search_hits = vec![
            SearchHit {
                unit: 7,
                match_count: 1,
            },
            SearchHit {
                unit: 2,
                match_count: 3,
            },
        ];
        let viewer = opened(Arc::new(service)).await;
        viewer.drain_events();

        let results = viewer.search("invoice").await.unwrap().unwrap();
        assert_eq!(results.hits.iter().map(|h| h.unit).collect::<Vec<_>>(), vec![2, 7]);

        assert_eq!(viewer.open_search_hit(1), Some(7));
        assert_eq!(viewer.current_unit(), 7);
        assert!(viewer.drain_events().contains(&ViewerEvent::ScrollTo(7)));

        assert_eq!(viewer.next_search_hit(1), Some(2));
        assert_eq!(viewer.prev_search_hit(1), Some(7));
    }

    #[tokio::test]
    async fn blank_search_is_not_sent() {
        let viewer = opened(Arc::new(FakeService::new(3))).await;
        assert_eq!(viewer.search("   ").await.unwrap(), None);
        assert!(viewer.state().search_results.is_none());
    }

    #[tokio::test]
    async fn failed_search_keeps_view_and_is_dismissible() {
        let mut service = FakeService::new(10);
        service.fail_search = true;
        let viewer = opened(Arc::new(service)).await;
        viewer.go_to(4);

        let err = viewer.search("invoice").await.unwrap_err();
        assert_eq!(err.scope, ErrorScope::Search);
        assert_eq!(viewer.current_unit(), 4);
        assert!(!viewer.state().searching);

        assert!(viewer.dismiss_error());
        assert!(viewer.state().last_error.is_none());
    }

    #[tokio::test]
    async fn metadata_failure_shows_error_and_retry_refetches() {
        let service = Arc::new(FakeService::new(10));
        *service.failing_info_calls.lock() = 1;
        let viewer = Viewer::builder(service.clone()).build();

        let err = viewer.open(pdf()).await.unwrap_err();
        assert_eq!(err.scope, ErrorScope::Metadata);
        assert!(err.message.contains("conversion backend exploded"));
        assert!(viewer.info().is_none());
        assert!(!viewer.dismiss_error());
        assert!(viewer.state().last_error.is_some());

        viewer.apply(Command::Retry).await.unwrap();
        assert_eq!(service.info_calls.load(Ordering::SeqCst), 2);
        assert_eq!(viewer.info().unwrap().total_units, 10);
        assert!(viewer.state().last_error.is_none());
        assert_eq!(viewer.cached_units(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn page_failure_is_scoped_to_that_page() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        service.failing_units.lock().insert(5);

        viewer.on_visible(&[5]).await;

        let state = viewer.state();
        assert!(state.page_errors.contains_key(&5));
        assert_eq!(state.last_error.unwrap().scope, ErrorScope::Page(5));
        assert!(viewer.cached(5).is_none());
        assert!(viewer.cached(4).is_some());
        assert!(viewer.cached(6).is_some());

        // Still absent, so the next visibility report retries it.
        service.failing_units.lock().clear();
        assert_eq!(viewer.on_visible(&[5]).await, vec![5]);
        assert!(viewer.cached(5).is_some());
        assert!(!viewer.state().page_errors.contains_key(&5));
    }

    #[tokio::test]
    async fn stale_response_after_invalidation_is_not_cached() {
        let service = Arc::new(FakeService::new(10));
        let viewer = Arc::new(opened(service.clone()).await);
        let (release, hold) = oneshot::channel();
        *service.hold.lock() = Some(hold);

        let task = {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.get(8).await })
        };
        while service.unit_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        viewer.set_quality(Quality::Low);
        release.send(()).unwrap();
        let record = task.await.unwrap().unwrap();

        assert_eq!(record.unit, 8);
        assert!(viewer.cached(8).is_none());
        assert!(!viewer.is_in_flight(8));

        viewer.get(8).await.unwrap();
        assert_eq!(service.unit_calls()[1].params.quality, Quality::Low);
        assert!(viewer.cached(8).is_some());
    }

    #[tokio::test]
    async fn out_of_range_units_are_never_requested() {
        let service = Arc::new(FakeService::new(3));
        let viewer = opened(service.clone()).await;

        assert!(viewer.get(0).await.is_err());
        assert!(viewer.get(4).await.is_err());
        assert!(service.unit_calls().is_empty());
        viewer.invalidate_all();
        assert_eq!(viewer.get_range(2, 9).await.unwrap(), vec![2, 3]);
        assert_eq!(service.range_calls.lock().last(), Some(&(2, 3)));
    }

    #[tokio::test]
    async fn markup_documents_fall_back_to_single_fetches() {
        let service = Arc::new(FakeService::new(5));
        let viewer = Viewer::builder(service.clone()).build();
        viewer
            .open(FileRef::new("deck.pptx", DocumentKind::Pptx))
            .await
            .unwrap();

        assert!(service.range_calls.lock().is_empty());
        assert_eq!(service.requested_units(), vec![1, 2, 3]);
        assert!(matches!(
            viewer.rendered(2),
            Some(RenderedUnit::Markup { ref html }) if html.contains("unit 2")
        ));
    }

    #[tokio::test]
    async fn text_overlay_mode_requests_text_layers() {
        let service = Arc::new(FakeService::new(4));
        let selections = Arc::new(Mutex::new(Vec::new()));
        let viewer = {
            let selections = Arc::clone(&selections);
            Viewer::builder(service.clone())
                .view_mode(ViewMode::TextOverlay)
                .on_text_selected(move |text, unit| selections.lock().push((text.to_string(), unit)))
                .build()
        };
        viewer.open(pdf()).await.unwrap();

        assert!(service.range_calls.lock().is_empty());
        assert!(service.unit_calls().iter().all(|call| call.with_text));
        match viewer.rendered(2) {
            Some(RenderedUnit::Overlay { overlay, width, .. }) => {
                assert_eq!(width, 100);
                assert_eq!(overlay.spans[0].text, "text of 2");
            }
            other => panic!("unexpected render: {:?}", other),
        }

        let selected = viewer.select_region(2, BoundingBox::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(selected.as_deref(), Some("text of 2"));
        assert!(viewer.select_region(2, BoundingBox::new(90.0, 150.0, 5.0, 5.0)).is_none());
        viewer.go_to(3);
        viewer.apply(Command::SelectUnitText).await.unwrap();

        assert_eq!(
            *selections.lock(),
            vec![("text of 2".to_string(), 2), ("text of 3".to_string(), 3)]
        );
        assert_eq!(viewer.state().selected_text.as_deref(), Some("text of 3"));
        viewer.clear_selection();
        assert!(viewer.state().selected_text.is_none());
    }

    #[tokio::test]
    async fn missing_engine_only_breaks_engine_mode() {
        let service = Arc::new(FakeService::new(4));
        let viewer = Viewer::builder(service.clone())
            .engine_unavailable("libpdfium.so not found")
            .build();
        viewer.open(pdf()).await.unwrap();

        assert!(viewer.set_view_mode(ViewMode::ExternalEngine));
        let error = viewer.state().last_error.unwrap();
        assert_eq!(error.scope, ErrorScope::Engine);
        assert!(error.message.contains("libpdfium.so"));
        assert_eq!(viewer.get(1).await.unwrap_err().scope, ErrorScope::Engine);

        // The unit keeps showing its failure after the error is dismissed.
        assert!(viewer.dismiss_error());
        let state = viewer.state();
        assert!(state.last_error.is_none());
        assert!(state.page_errors[&1].contains("libpdfium.so"));

        assert_eq!(viewer.cycle_view_mode(), ViewMode::Image);
        assert!(viewer.state().page_errors.is_empty());
        assert!(viewer.state().last_error.is_none());
        assert!(viewer.get(1).await.is_ok());
    }

    #[tokio::test]
    async fn engine_mode_downloads_document_once() {
        let service = Arc::new(FakeService::new(4));
        let engine = Arc::new(FakeEngine {
            renders: Mutex::new(Vec::new()),
        });
        let viewer = Viewer::builder(service.clone())
            .engine(engine.clone())
            .view_mode(ViewMode::ExternalEngine)
            .render_parameters(RenderParameters::new(2.0, Quality::Medium))
            .build();
        viewer.open(pdf()).await.unwrap();

        assert_eq!(service.raw_calls.load(Ordering::SeqCst), 1);
        assert!(service.unit_calls().is_empty());
        let renders = engine.renders.lock().clone();
        assert_eq!(renders.len(), 3);
        assert!(renders.iter().all(|(_, scale)| (*scale - 3.0).abs() < f32::EPSILON));
        assert!(matches!(viewer.rendered(1), Some(RenderedUnit::Bitmap(_))));
    }

    #[tokio::test]
    async fn released_viewer_ignores_visibility() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;
        viewer.release();
        assert!(viewer.on_visible(&[6]).await.is_empty());
        assert!(service.unit_calls().is_empty());
    }

    #[tokio::test]
    async fn navigation_clamps_to_document() {
        let viewer = opened(Arc::new(FakeService::new(5))).await;
        viewer.apply(Command::NextUnit { count: 3 }).await.unwrap();
        assert_eq!(viewer.current_unit(), 4);
        viewer.apply(Command::NextUnit { count: 10 }).await.unwrap();
        assert_eq!(viewer.current_unit(), 5);
        viewer.apply(Command::PrevUnit { count: 9 }).await.unwrap();
        assert_eq!(viewer.current_unit(), 1);
        viewer
            .apply(Command::GotoUnit { unit: u32::MAX })
            .await
            .unwrap();
        assert_eq!(viewer.current_unit(), 5);
    }

    #[tokio::test]
    async fn opening_another_file_resets_everything() {
        let service = Arc::new(FakeService::new(5));
        let viewer = opened(service.clone()).await;
        viewer.go_to(4);

        viewer
            .open(FileRef::new("docs/other.pdf", DocumentKind::Pdf))
            .await
            .unwrap();
        assert_eq!(viewer.current_unit(), 1);
        assert_eq!(viewer.file().unwrap().path, "docs/other.pdf");
        assert_eq!(*service.range_calls.lock(), vec![(1, 3), (1, 3)]);
    }

    #[tokio::test]
    async fn retry_skips_already_cached_units() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;

        viewer.retry().await.unwrap();
        assert_eq!(*service.range_calls.lock(), vec![(1, 3)]);

        assert_eq!(viewer.get_range(2, 5).await.unwrap(), vec![4, 5]);
        assert_eq!(service.range_calls.lock().last(), Some(&(4, 5)));
        assert!(service.unit_calls().is_empty());
    }

    #[tokio::test]
    async fn search_finishing_after_switching_files_is_dropped() {
        let mut service = FakeService::new(10);
        service.search_hits = vec![SearchHit {
            unit: 7,
            match_count: 1,
        }];
        let service = Arc::new(service);
        let viewer = Arc::new(opened(service.clone()).await);
        let (release, hold) = oneshot::channel();
        *service.search_hold.lock() = Some(hold);

        let task = {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.search("invoice").await })
        };
        while service.search_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        viewer
            .open(FileRef::new("docs/other.pdf", DocumentKind::Pdf))
            .await
            .unwrap();
        release.send(()).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), None);
        let state = viewer.state();
        assert!(state.search_results.is_none());
        assert!(!state.searching);
        assert_eq!(viewer.next_search_hit(1), None);
        assert_eq!(viewer.current_unit(), 1);
    }

    #[tokio::test]
    async fn hung_download_does_not_block_opening_another_file() {
        let mut service = FakeService::new(4);
        service.hang_raw = true;
        let service = Arc::new(service);
        let engine = Arc::new(FakeEngine {
            renders: Mutex::new(Vec::new()),
        });
        let viewer = Arc::new(Viewer::builder(service.clone()).engine(engine).build());
        viewer.open(pdf()).await.unwrap();
        viewer.set_view_mode(ViewMode::ExternalEngine);

        let task = {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.get(2).await })
        };
        while service.raw_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        viewer.set_view_mode(ViewMode::Image);
        let reopened = tokio::time::timeout(
            Duration::from_secs(2),
            viewer.open(FileRef::new("docs/other.pdf", DocumentKind::Pdf)),
        )
        .await;
        assert!(matches!(reopened, Ok(Ok(()))));
        assert_eq!(viewer.file().unwrap().path, "docs/other.pdf");
        assert_eq!(viewer.cached_units(), vec![1, 2, 3]);
        task.abort();
    }

    #[tokio::test]
    async fn explicit_commands_drive_the_controller() {
        let service = Arc::new(FakeService::new(10));
        let viewer = opened(service.clone()).await;

        viewer
            .apply(Command::SetQuality {
                quality: Quality::High,
            })
            .await
            .unwrap();
        assert_eq!(viewer.render_parameters().quality, Quality::High);
        assert!(viewer.cached_units().is_empty());

        viewer
            .apply(Command::Reveal { units: vec![8] })
            .await
            .unwrap();
        assert_eq!(service.requested_units(), vec![7, 8, 9]);
        assert!(service
            .unit_calls()
            .iter()
            .all(|call| call.params.quality == Quality::High));

        viewer
            .apply(Command::SetViewMode {
                mode: ViewMode::TextOverlay,
            })
            .await
            .unwrap();
        assert_eq!(viewer.view_mode(), ViewMode::TextOverlay);
        assert!(viewer.cached_units().is_empty());
    }
}
