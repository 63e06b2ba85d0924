use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use crate::{
    analysis::{
        buffer::buffer_query, nearest::nearest_query, polygon::polygon_query,
        proximity::vendors_near_events, AnalysisSummary,
    },
    api::live::{LiveUpdate, ReloadQueue},
    feature::{
        error::LoadError,
        feature::{Category, Feature, FeatureId, LatLng, RawCollection},
        store::FeatureStore,
    },
    filter::{
        debounce::Debouncer,
        visibility::{compute_visible, CategorySelection, FilterState},
    },
    session::{
        kv_store::KeyValueStore,
        state::{Progress, Session, Theme},
    },
    view::{
        banner::Banner,
        deep_link::MapView,
        render::{Highlight, RenderAdapter},
    },
};

use super::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Buffer,
    Polygon,
    Nearest,
    Proximity,
}

impl Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalysisKind::Buffer => "buffer",
            AnalysisKind::Polygon => "polygon",
            AnalysisKind::Nearest => "nearest",
            AnalysisKind::Proximity => "proximity",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one analysis, detached from the feature store so it outlives the next reload.
#[derive(Debug)]
pub struct AnalysisReport {
    pub kind: AnalysisKind,
    pub feature_ids: Vec<FeatureId>,
    pub summary: AnalysisSummary,
    pub self_intersecting: bool,
    /// Proximity only: every event with the vendors around it.
    pub groups: Vec<(FeatureId, Vec<FeatureId>)>,
    pub progress: Progress,
}

impl AnalysisReport {
    fn new(kind: AnalysisKind, matches: &[&Feature], summary: AnalysisSummary) -> Self {
        Self {
            kind,
            feature_ids: matches.iter().map(|feature| feature.id.clone()).collect(),
            summary,
            self_intersecting: false,
            groups: Vec::new(),
            progress: Progress::default(),
        }
    }
}

impl Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} of {} features matched",
            self.kind, self.summary.matched, self.summary.examined
        )?;
        if let (Some(nearest), Some(farthest)) = (self.summary.nearest_km, self.summary.farthest_km)
        {
            write!(f, " ({:.2} km to {:.2} km)", nearest, farthest)?;
        }
        if self.self_intersecting {
            write!(f, ", polygon intersects itself")?;
        }
        Ok(())
    }
}

pub struct ControllerSettings {
    pub debounce: Duration,
    pub banner_ttl: Duration,
    pub default_view: MapView,
    pub share_base_url: String,
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            banner_ttl: Duration::from_millis(config.banner_ms),
            default_view: config.default_view.clone(),
            share_base_url: config.share_base_url.clone(),
        }
    }
}

/// Glue between user interactions, the core components and the drawing surface. Owns every
/// component; they only ever see each other through the calls made here.
pub struct MapController<S: KeyValueStore, R: RenderAdapter> {
    store: FeatureStore,
    filter: FilterState,
    search: Debouncer<String>,
    session: Session<S>,
    renderer: R,
    reloads: ReloadQueue,
    banner: Option<Banner>,
    banner_ttl: Duration,
    view: MapView,
    /// Fit the view to the data after each load until the user picks a view.
    fit_on_load: bool,
    pending_popup: Option<FeatureId>,
    share_base_url: String,
}

impl<S: KeyValueStore, R: RenderAdapter> MapController<S, R> {
    pub fn new(session: Session<S>, renderer: R, settings: ControllerSettings) -> Self {
        Self {
            store: FeatureStore::new(),
            filter: FilterState::default(),
            search: Debouncer::new(settings.debounce),
            session,
            renderer,
            reloads: ReloadQueue::new(),
            banner: None,
            banner_ttl: settings.banner_ttl,
            view: settings.default_view,
            fit_on_load: true,
            pending_popup: None,
            share_base_url: settings.share_base_url,
        }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    pub fn visible(&self) -> Vec<&Feature> {
        compute_visible(self.store.all(), &self.filter)
    }

    pub fn banner(&self, now: Instant) -> Option<&Banner> {
        self.banner.as_ref().filter(|banner| banner.is_visible(now))
    }

    pub fn show_banner(&mut self, message: impl Into<String>, now: Instant) {
        let banner = Banner::new(message, now, self.banner_ttl);
        self.renderer.show_banner(&banner);
        self.banner = Some(banner);
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let visible = compute_visible(self.store.all(), &self.filter);
        self.renderer.redraw(&visible, self.session.bookmarks())
    }

    fn report_progress(&mut self, progress: &Progress, now: Instant) {
        for achievement in &progress.unlocked {
            self.show_banner(
                format!(
                    "Achievement unlocked: {} (+{} points)",
                    achievement.title, achievement.reward
                ),
                now,
            );
        }
        if progress.challenge_completed {
            self.show_banner("Daily challenge completed!", now);
        }
    }

    /// Apply the result of a fetch. On failure the previous collection stays on the map and the
    /// error is shown as a banner. Returns whether a new collection was loaded.
    pub fn apply_load(
        &mut self,
        result: Result<RawCollection, LoadError>,
        now: Instant,
    ) -> anyhow::Result<bool> {
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("Keeping {} previously loaded features: {}", self.store.len(), err);
                self.show_banner(format!("Failed to load events: {}", err), now);
                return Ok(false);
            }
        };
        self.store.load(raw);
        if self.fit_on_load {
            if let Some(bounds) = self.store.bounds() {
                self.view = MapView::fit_bounds(bounds);
                self.renderer.set_view(&self.view);
            }
        }
        self.redraw()?;

        if let Some(id) = self.pending_popup.take() {
            if self.store.get(&id).is_some() {
                self.open_feature(&id, now)?;
            } else {
                log::warn!("Linked feature {} is not in the loaded collection", id);
            }
        }
        Ok(true)
    }

    pub fn notify_live_update(&mut self, update: LiveUpdate) {
        match update {
            LiveUpdate::NewEvent(record) => {
                log::info!(
                    "New event {} announced, reloading",
                    record.id_string().unwrap_or_default()
                );
                self.reloads.request();
            }
        }
    }

    pub fn request_reload(&mut self) {
        self.reloads.request();
    }

    /// Run the pending reload, if any, with `fetch`. Returns the number of fetches made.
    pub fn drive_reloads(
        &mut self,
        mut fetch: impl FnMut() -> Result<RawCollection, LoadError>,
        now: Instant,
    ) -> anyhow::Result<usize> {
        let mut fetches = 0;
        while self.reloads.start_next() {
            let result = fetch();
            self.reloads.finish();
            fetches += 1;
            self.apply_load(result, now)?;
        }
        if fetches > 0 {
            log::debug!(
                "Ran {} reload(s), {} request(s) coalesced so far",
                fetches,
                self.reloads.coalesced()
            );
        }
        Ok(fetches)
    }

    /// Record new search input. The filter only picks it up once input has been quiet for the
    /// debounce window; see `tick`.
    pub fn set_search_input(&mut self, text: &str, now: Instant) {
        self.search.schedule(now, text.to_string());
    }

    /// Apply debounced input that is due. Returns whether the map was redrawn.
    pub fn tick(&mut self, now: Instant) -> anyhow::Result<bool> {
        match self.search.poll(now) {
            Some(query) => {
                self.filter.set_search_query(&query);
                log::debug!("Searching for '{}'", self.filter.search_query());
                self.redraw()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.search.next_deadline()
    }

    /// Apply the search query right away, bypassing the debounce window.
    pub fn search_now(&mut self, query: &str) -> anyhow::Result<()> {
        self.search.cancel();
        self.filter.set_search_query(query);
        self.redraw()
    }

    pub fn select_category(&mut self, selection: CategorySelection) -> anyhow::Result<()> {
        self.filter.selected_category = selection;
        self.redraw()
    }

    pub fn toggle_category(&mut self, category: Category, now: Instant) -> anyhow::Result<bool> {
        let visible = self.filter.toggle_category(category);
        let progress = self.session.record_filter_toggled()?;
        self.report_progress(&progress, now);
        self.redraw()?;
        Ok(visible)
    }

    fn finish_analysis(
        &mut self,
        mut report: AnalysisReport,
        completed: bool,
        now: Instant,
    ) -> anyhow::Result<AnalysisReport> {
        log::info!("{}", report);
        if completed {
            report.progress = self.session.record_analysis_completed()?;
            self.report_progress(&report.progress, now);
        }
        Ok(report)
    }

    /// Features of the whole collection within `radius_km` of `center`.
    pub fn run_buffer(
        &mut self,
        center: LatLng,
        radius_km: f64,
        now: Instant,
    ) -> anyhow::Result<AnalysisReport> {
        let result = buffer_query(self.store.all(), center.to_point(), radius_km);
        let highlight = Highlight {
            label: AnalysisKind::Buffer.to_string(),
            shapes: result.buffer.iter().cloned().map(geo::Geometry::Polygon).collect(),
        };
        self.renderer.highlight(&highlight, &result.matches)?;
        let report = AnalysisReport::new(AnalysisKind::Buffer, &result.matches, result.summary);
        let completed = result.buffer.is_some();
        self.finish_analysis(report, completed, now)
    }

    /// Features of the whole collection inside the drawn ring.
    pub fn run_polygon(&mut self, ring: &[LatLng], now: Instant) -> anyhow::Result<AnalysisReport> {
        let result = polygon_query(self.store.all(), ring);
        let highlight = Highlight {
            label: AnalysisKind::Polygon.to_string(),
            shapes: result.polygon.iter().cloned().map(geo::Geometry::Polygon).collect(),
        };
        self.renderer.highlight(&highlight, &result.matches)?;
        let mut report = AnalysisReport::new(AnalysisKind::Polygon, &result.matches, result.summary);
        report.self_intersecting = result.self_intersecting;
        let completed = result.polygon.is_some();
        if report.self_intersecting {
            self.show_banner(
                "The drawn polygon crosses itself; results may be incomplete",
                now,
            );
        }
        self.finish_analysis(report, completed, now)
    }

    /// The visible feature closest to `point`.
    pub fn run_nearest(&mut self, point: LatLng, now: Instant) -> anyhow::Result<AnalysisReport> {
        let visible = compute_visible(self.store.all(), &self.filter);
        let origin = point.to_point();
        let nearest = nearest_query(visible.iter().copied(), origin);
        let mut shapes = vec![geo::Geometry::Point(origin)];
        let mut matches = Vec::new();
        let mut distances = Vec::new();
        if let Some(nearest) = &nearest {
            let target = nearest.feature.point();
            shapes.push(geo::Geometry::LineString(geo::LineString::from(vec![
                (origin.x(), origin.y()),
                (target.x(), target.y()),
            ])));
            matches.push(nearest.feature);
            distances.push(nearest.distance_km);
        }
        self.renderer
            .highlight(&Highlight { label: AnalysisKind::Nearest.to_string(), shapes }, &matches)?;
        let summary = AnalysisSummary::from_distances(visible.len(), distances);
        let report = AnalysisReport::new(AnalysisKind::Nearest, &matches, summary);
        let completed = nearest.is_some();
        self.finish_analysis(report, completed, now)
    }

    /// Vendors within `radius_km` of every event.
    pub fn run_proximity(&mut self, radius_km: f64, now: Instant) -> anyhow::Result<AnalysisReport> {
        let hits = vendors_near_events(self.store.all(), radius_km);
        let mut matches: Vec<&Feature> = Vec::new();
        let mut groups = Vec::new();
        for hit in &hits {
            for vendor in &hit.vendors {
                if !matches.iter().any(|matched| matched.id == vendor.id) {
                    matches.push(vendor);
                }
            }
            groups.push((
                hit.event.id.clone(),
                hit.vendors.iter().map(|vendor| vendor.id.clone()).collect(),
            ));
        }
        let highlight = Highlight {
            label: AnalysisKind::Proximity.to_string(),
            shapes: hits
                .iter()
                .map(|hit| geo::Geometry::Polygon(hit.buffer.clone()))
                .collect(),
        };
        self.renderer.highlight(&highlight, &matches)?;
        let examined = self
            .store
            .all()
            .iter()
            .filter(|feature| feature.category == Category::Vendor)
            .count();
        let mut report = AnalysisReport::new(
            AnalysisKind::Proximity,
            &matches,
            AnalysisSummary::from_distances(examined, std::iter::empty()),
        );
        report.summary.matched = matches.len();
        report.groups = groups;
        let completed = !hits.is_empty();
        self.finish_analysis(report, completed, now)
    }

    pub fn clear_analysis(&mut self) -> anyhow::Result<()> {
        self.renderer.clear_highlight()
    }

    /// Open the popup of a loaded feature.
    pub fn open_feature(&mut self, id: &str, now: Instant) -> anyhow::Result<Option<Progress>> {
        let feature = match self.store.get(id) {
            Some(feature) => feature,
            None => {
                self.show_banner(format!("No feature with id {}", id), now);
                return Ok(None);
            }
        };
        self.renderer.open_popup(feature);
        self.view.feature = Some(id.to_string());
        let progress = self.session.record_popup_opened()?;
        self.report_progress(&progress, now);
        Ok(Some(progress))
    }

    /// Bookmark or un-bookmark a loaded feature. Returns whether it is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self, id: &str, now: Instant) -> anyhow::Result<bool> {
        if self.store.get(id).is_none() && !self.session.is_bookmarked(id) {
            self.show_banner(format!("No feature with id {}", id), now);
            return Ok(false);
        }
        let (bookmarked, progress) = self.session.toggle_bookmark(id)?;
        self.report_progress(&progress, now);
        self.redraw()?;
        Ok(bookmarked)
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<Theme> {
        let theme = self.session.toggle_theme()?;
        log::info!("Switched to the {} theme ({})", theme, theme.tile_url());
        Ok(theme)
    }

    /// Move the map to `view`, e.g. from a shared link. A linked feature opens once it is loaded.
    pub fn apply_view(&mut self, view: MapView, now: Instant) -> anyhow::Result<()> {
        self.fit_on_load = false;
        self.renderer.set_view(&view);
        let linked = view.feature.clone();
        self.view = view;
        if let Some(id) = linked {
            if self.store.get(&id).is_some() {
                self.open_feature(&id, now)?;
            } else {
                self.pending_popup = Some(id);
            }
        }
        Ok(())
    }

    /// Link to the current view, or to `feature` if given. Failures are shown as a banner.
    pub fn share_link(&mut self, feature: Option<&str>, now: Instant) -> Option<String> {
        let view = match feature {
            Some(id) => match self.store.get(id) {
                Some(feature) => MapView::on_feature(feature),
                None => {
                    self.show_banner(format!("Cannot share unknown feature {}", id), now);
                    return None;
                }
            },
            None => self.view.clone(),
        };
        match view.share_url(&self.share_base_url) {
            Ok(url) => Some(url),
            Err(err) => {
                self.show_banner(format!("Could not create share link: {}", err), now);
                None
            }
        }
    }
}
