extern crate log;
pub mod analysis;
pub mod api;
pub mod app;
pub mod feature;
pub mod filter;
pub mod geocode;
pub mod session;
pub mod view;
use crate::analysis::aggregate::{cluster, heat_cells};
use crate::analysis::proximity::DEFAULT_PROXIMITY_RADIUS_KM;
use crate::api::client::EventApiClient;
use crate::api::payloads::NewEvent;
use crate::app::config::Config;
use crate::app::controller::{ControllerSettings, MapController};
use crate::app::repl::{parse_ring, run_interactive};
use crate::app::source::FeatureSource;
use crate::feature::feature::{Category, LatLng};
use crate::filter::visibility::CategorySelection;
use crate::geocode::{features_near_place, IpLocator, NominatimGeocoder, IPAPI_URL, NOMINATIM_SEARCH_URL};
use crate::session::kv_store::{JsonFileStore, KeyValueStore};
use crate::session::state::Session;
use crate::view::deep_link::{MapView, DEFAULT_ZOOM};
use crate::view::render::{GeoJsonRenderer, RenderAdapter};
use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Instant;

/// Community information board on a map: load geotagged events, filter, analyse and share them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
    /// Shared link to open the map at.
    #[arg(long)]
    link: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter the features and write the visible ones to GeoJSON.
    Show {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
        /// Categories to hide; may be repeated.
        #[arg(long)]
        hide: Vec<Category>,
    },
    /// Features within a radius of a point.
    Buffer {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        radius_km: f64,
    },
    /// Features inside a ring written as "lat,lon;lat,lon;...".
    Polygon {
        #[arg(long, allow_hyphen_values = true)]
        ring: String,
    },
    /// The feature closest to a point.
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Vendors near each event.
    Proximity {
        #[arg(long, default_value_t = DEFAULT_PROXIMITY_RADIUS_KM)]
        radius_km: f64,
    },
    /// Marker clusters at a zoom level.
    Clusters {
        #[arg(long, default_value_t = DEFAULT_ZOOM)]
        zoom: u8,
    },
    /// Feature density per geohash cell.
    Heatmap {
        #[arg(long, default_value_t = 4)]
        precision: usize,
    },
    /// Features near a named place.
    Near {
        #[arg(long)]
        place: String,
        #[arg(long, default_value_t = 25.0)]
        radius_km: f64,
    },
    /// Center the map on this machine's approximate location.
    Locate,
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Create an event (admin login required).
    PostEvent {
        #[arg(long)]
        category: Category,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Bookmark {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Switch between the light and dark map theme.
    Theme,
    /// Print a link to the current view or to a feature.
    Share {
        #[arg(long)]
        feature: Option<String>,
    },
    /// Read commands from stdin.
    Interactive,
}

#[derive(Subcommand, Debug)]
enum BookmarkAction {
    Add { id: String },
    Remove { id: String },
    List,
}

fn api_client(source: &FeatureSource) -> anyhow::Result<&EventApiClient> {
    source
        .api()
        .ok_or_else(|| anyhow!("This command needs api_base_url in the config"))
}

fn login<S: KeyValueStore>(
    source: &FeatureSource,
    session: &mut Session<S>,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    match api_client(source)?.login(username, password) {
        Ok(response) => {
            session.set_auth_token(&response.token)?;
            println!("Logged in as {} ({:?})", username, response.role);
            Ok(())
        }
        Err(err) if err.is_auth_failure() || matches!(err, api::error::ApiError::Validation(_)) => {
            println!("Login failed: {}", err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn post_event<S: KeyValueStore>(
    source: &FeatureSource,
    session: &Session<S>,
    event: &NewEvent,
) -> anyhow::Result<()> {
    let token = session.auth_token().unwrap_or_default();
    match api_client(source)?.create_event(&token, event) {
        Ok(record) => {
            println!(
                "Created event {}",
                record.id_string().unwrap_or_else(|| "<no id>".to_string())
            );
            Ok(())
        }
        Err(err) if err.is_auth_failure() || matches!(err, api::error::ApiError::Validation(_)) => {
            println!("Event not created: {}", err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_map_command<S: KeyValueStore, R: RenderAdapter>(
    controller: &mut MapController<S, R>,
    command: Command,
    config: &Config,
    source: &FeatureSource,
) -> anyhow::Result<()> {
    let now = Instant::now();
    match command {
        Command::Show {
            category,
            search,
            hide,
        } => {
            if let Some(category) = category {
                controller.select_category(CategorySelection::Only(category))?;
            }
            for category in hide {
                if controller.filter().visible_categories.contains(&category) {
                    controller.toggle_category(category, now)?;
                }
            }
            if let Some(search) = search {
                controller.search_now(&search)?;
            }
            println!(
                "{} of {} features visible, written to {:?}",
                controller.visible().len(),
                controller.store().len(),
                config.output_dir.join(view::render::VISIBLE_FILENAME)
            );
        }
        Command::Buffer {
            lat,
            lon,
            radius_km,
        } => println!(
            "{}",
            controller.run_buffer(LatLng::new(lat, lon), radius_km, now)?
        ),
        Command::Polygon { ring } => {
            println!("{}", controller.run_polygon(&parse_ring(&ring)?, now)?)
        }
        Command::Nearest { lat, lon } => {
            let report = controller.run_nearest(LatLng::new(lat, lon), now)?;
            match (report.feature_ids.first(), report.summary.nearest_km) {
                (Some(id), Some(distance_km)) => {
                    println!("Nearest feature: {} at {:.2} km", id, distance_km)
                }
                _ => println!("No visible features"),
            }
        }
        Command::Proximity { radius_km } => {
            let report = controller.run_proximity(radius_km, now)?;
            for (event, vendors) in &report.groups {
                println!("{}: {}", event, vendors.join(", "));
            }
            println!("{}", report);
        }
        Command::Clusters { zoom } => {
            for cell in cluster(controller.visible(), zoom)? {
                println!(
                    "{}: {} features around ({:.4}, {:.4})",
                    cell.geohash,
                    cell.len(),
                    cell.center.lat,
                    cell.center.lng
                );
            }
        }
        Command::Heatmap { precision } => {
            for cell in heat_cells(controller.visible(), precision)? {
                println!(
                    "{} ({:.4}, {:.4}): {} features, weight {:.2}",
                    cell.geohash, cell.center.lat, cell.center.lng, cell.count, cell.weight
                );
            }
        }
        Command::Near { place, radius_km } => {
            let geocoder = NominatimGeocoder::new(
                config
                    .geocoder_url
                    .as_deref()
                    .unwrap_or(NOMINATIM_SEARCH_URL),
            )?;
            for feature in features_near_place(controller.store().all(), &geocoder, &place, radius_km)
            {
                println!("{}: {} [{}]", feature.id, feature.title, feature.category);
            }
        }
        Command::Locate => match IpLocator::new(IPAPI_URL)?.locate() {
            Ok(Some(center)) => {
                controller.apply_view(
                    MapView {
                        center,
                        zoom: 12,
                        feature: None,
                    },
                    now,
                )?;
                println!("You are near ({:.4}, {:.4})", center.lat, center.lng);
            }
            Ok(None) => controller.show_banner("Could not determine your location", now),
            Err(err) => {
                controller.show_banner(format!("Could not determine your location: {}", err), now)
            }
        },
        Command::Bookmark { action } => match action {
            BookmarkAction::Add { id } => {
                if !controller.session().is_bookmarked(&id) && controller.toggle_bookmark(&id, now)?
                {
                    println!("Bookmarked {}", id);
                }
            }
            BookmarkAction::Remove { id } => {
                if controller.session().is_bookmarked(&id) {
                    controller.toggle_bookmark(&id, now)?;
                    println!("Removed bookmark {}", id);
                }
            }
            BookmarkAction::List => {
                for id in controller.session().bookmarks() {
                    match controller.store().get(id) {
                        Some(feature) => println!("{}: {}", id, feature.title),
                        None => println!("{}: (not in the current collection)", id),
                    }
                }
            }
        },
        Command::Theme => {
            let theme = controller.toggle_theme()?;
            println!("Theme: {} ({})", theme, theme.tile_url());
            println!("Tiles {}", theme.attribution());
        }
        Command::Share { feature } => {
            if let Some(url) = controller.share_link(feature.as_deref(), now) {
                println!("{}", url);
            }
        }
        Command::Interactive => run_interactive(controller, source)?,
        Command::Login { .. } | Command::Logout | Command::PostEvent { .. } => {}
    }
    Ok(())
}

fn try_main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let args = Args::try_parse()?;
    let config = Config::from_file(Path::new(&args.config_filepath))?;
    let source = FeatureSource::from_config(&config)?;

    let session_store = JsonFileStore::open(&config.session_filepath)?;
    log::info!("Session stored in {:?}", session_store.filepath());
    let mut session = Session::load(session_store, &config.username);
    session.refresh_daily_challenge(chrono::Local::now().date_naive())?;

    match args.command {
        Command::Login { username, password } => {
            return login(&source, &mut session, &username, &password)
        }
        Command::Logout => {
            session.clear_auth_token()?;
            println!("Logged out");
            return Ok(());
        }
        Command::PostEvent {
            category,
            title,
            description,
            link,
            date,
            lat,
            lon,
        } => {
            let event = NewEvent {
                category,
                title,
                description,
                link,
                date,
                latitude: lat,
                longitude: lon,
            };
            return post_event(&source, &session, &event);
        }
        command => {
            let renderer = GeoJsonRenderer::new(&config.output_dir)?;
            let mut controller =
                MapController::new(session, renderer, ControllerSettings::from(&config));
            if let Some(link) = &args.link {
                controller.apply_view(MapView::from_url(link), Instant::now())?;
            }
            controller.apply_load(source.fetch(), Instant::now())?;
            run_map_command(&mut controller, command, &config, &source)
        }
    }
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
