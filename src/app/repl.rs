use std::{
    io::{self, BufRead},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Instant,
};

use anyhow::{anyhow, Context};

use crate::{
    analysis::proximity::DEFAULT_PROXIMITY_RADIUS_KM,
    api::live::{parse_live_message, NEW_EVENT},
    feature::feature::{Category, LatLng},
    filter::visibility::CategorySelection,
    session::kv_store::KeyValueStore,
    view::{deep_link::MapView, render::RenderAdapter},
};

use super::{controller::MapController, source::FeatureSource};

const HELP: &str = "\
Commands:
  search <text>                  filter by title or description (empty clears)
  category all|<category>        show one category only
  toggle <category>              hide or show a category
  buffer <lat> <lon> <km>        features within a radius
  polygon <lat,lon;lat,lon;...>  features inside a drawn ring
  nearest <lat> <lon>            closest visible feature
  proximity [km]                 vendors near each event
  clear                          remove the analysis overlay
  open <id>                      show a feature's details
  bookmark <id>                  bookmark or un-bookmark a feature
  link <url>                     go to a shared view
  share [id]                     link to the current view or a feature
  theme                          switch between light and dark tiles
  reload                         fetch the events again
  newEvent <json>                announce a created event
  status                         points, bookmarks and filters
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Search(String),
    Category(CategorySelection),
    Toggle(Category),
    Buffer { center: LatLng, radius_km: f64 },
    Polygon(Vec<LatLng>),
    Nearest(LatLng),
    Proximity(f64),
    Clear,
    Open(String),
    Bookmark(String),
    Link(String),
    Share(Option<String>),
    Theme,
    Reload,
    Notify { name: String, payload: String },
    Status,
    Help,
    Quit,
}

fn parse_number(value: Option<&str>, name: &str) -> anyhow::Result<f64> {
    let value = value.ok_or_else(|| anyhow!("Missing {}", name))?;
    value
        .parse::<f64>()
        .with_context(|| format!("Invalid {} '{}'", name, value))
}

fn parse_id(rest: &str, command: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        return Err(anyhow!("Usage: {} <id>", command));
    }
    Ok(rest.to_string())
}

/// Parse a ring written as `lat,lon;lat,lon;...`.
pub fn parse_ring(text: &str) -> anyhow::Result<Vec<LatLng>> {
    text.split(';')
        .map(str::trim)
        .filter(|vertex| !vertex.is_empty())
        .map(|vertex| {
            let mut parts = vertex.split(',').map(str::trim);
            let lat = parse_number(parts.next(), "latitude")?;
            let lng = parse_number(parts.next(), "longitude")?;
            if parts.next().is_some() {
                return Err(anyhow!("Vertex '{}' has more than two coordinates", vertex));
            }
            Ok(LatLng::new(lat, lng))
        })
        .collect()
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match name {
        "search" => ReplCommand::Search(rest.to_string()),
        "category" => match rest {
            "all" | "" => ReplCommand::Category(CategorySelection::All),
            category => ReplCommand::Category(CategorySelection::Only(category.parse()?)),
        },
        "toggle" => ReplCommand::Toggle(rest.parse()?),
        "buffer" => {
            let lat = parse_number(args.next(), "latitude")?;
            let lng = parse_number(args.next(), "longitude")?;
            let radius_km = parse_number(args.next(), "radius")?;
            ReplCommand::Buffer {
                center: LatLng::new(lat, lng),
                radius_km,
            }
        }
        "polygon" => ReplCommand::Polygon(parse_ring(rest)?),
        "nearest" => {
            let lat = parse_number(args.next(), "latitude")?;
            let lng = parse_number(args.next(), "longitude")?;
            ReplCommand::Nearest(LatLng::new(lat, lng))
        }
        "proximity" => match args.next() {
            Some(radius) => ReplCommand::Proximity(parse_number(Some(radius), "radius")?),
            None => ReplCommand::Proximity(DEFAULT_PROXIMITY_RADIUS_KM),
        },
        "clear" => ReplCommand::Clear,
        "open" => ReplCommand::Open(parse_id(rest, name)?),
        "bookmark" => ReplCommand::Bookmark(parse_id(rest, name)?),
        "link" => ReplCommand::Link(parse_id(rest, name)?),
        "share" => ReplCommand::Share(Some(rest.to_string()).filter(|id| !id.is_empty())),
        "theme" => ReplCommand::Theme,
        "reload" => ReplCommand::Reload,
        NEW_EVENT => ReplCommand::Notify {
            name: name.to_string(),
            payload: rest.to_string(),
        },
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => return Err(anyhow!("Unknown command '{}', try 'help'", name)),
    };
    Ok(Some(command))
}

fn execute<S: KeyValueStore, R: RenderAdapter>(
    controller: &mut MapController<S, R>,
    command: ReplCommand,
    now: Instant,
) -> anyhow::Result<()> {
    match command {
        ReplCommand::Search(text) => controller.set_search_input(&text, now),
        ReplCommand::Category(selection) => {
            controller.select_category(selection)?;
            println!("{} features visible", controller.visible().len());
        }
        ReplCommand::Toggle(category) => {
            let visible = controller.toggle_category(category, now)?;
            println!(
                "{} {}, {} features visible",
                category,
                if visible { "shown" } else { "hidden" },
                controller.visible().len()
            );
        }
        ReplCommand::Buffer { center, radius_km } => {
            println!("{}", controller.run_buffer(center, radius_km, now)?)
        }
        ReplCommand::Polygon(ring) => println!("{}", controller.run_polygon(&ring, now)?),
        ReplCommand::Nearest(point) => {
            let report = controller.run_nearest(point, now)?;
            match report.feature_ids.first() {
                Some(id) => println!(
                    "Nearest: {} at {:.2} km",
                    id,
                    report.summary.nearest_km.unwrap_or_default()
                ),
                None => println!("No visible features"),
            }
        }
        ReplCommand::Proximity(radius_km) => {
            let report = controller.run_proximity(radius_km, now)?;
            for (event, vendors) in &report.groups {
                println!("{}: {}", event, vendors.join(", "));
            }
            println!("{}", report);
        }
        ReplCommand::Clear => controller.clear_analysis()?,
        ReplCommand::Open(id) => {
            controller.open_feature(&id, now)?;
        }
        ReplCommand::Bookmark(id) => {
            let bookmarked = controller.toggle_bookmark(&id, now)?;
            println!("{} {}", id, if bookmarked { "bookmarked" } else { "not bookmarked" });
        }
        ReplCommand::Link(url) => controller.apply_view(MapView::from_url(&url), now)?,
        ReplCommand::Share(feature) => {
            if let Some(url) = controller.share_link(feature.as_deref(), now) {
                println!("{}", url);
            }
        }
        ReplCommand::Theme => {
            let theme = controller.toggle_theme()?;
            println!("Theme: {} ({})", theme, theme.tile_url());
            println!("Tiles {}", theme.attribution());
        }
        ReplCommand::Reload => controller.request_reload(),
        ReplCommand::Notify { name, payload } => {
            if let Some(update) = parse_live_message(&name, &payload)? {
                controller.notify_live_update(update);
            }
        }
        ReplCommand::Status => {
            let session = controller.session();
            println!(
                "{} points, {} achievements, bookmarks: [{}]",
                session.points(),
                session.unlocked().len(),
                session.bookmarks().join(", ")
            );
            if let Some(challenge) = session.challenge().and_then(|assigned| assigned.challenge()) {
                println!("Today's challenge: {}", challenge.description);
            }
            println!(
                "{} of {} features visible",
                controller.visible().len(),
                controller.store().len()
            );
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
    Ok(())
}

/// Read commands from stdin until `quit` or end of input. Stdin is read on a helper thread that
/// only forwards lines; everything else happens on this thread, which sleeps until either a line
/// arrives or pending search input is due.
pub fn run_interactive<S: KeyValueStore, R: RenderAdapter>(
    controller: &mut MapController<S, R>,
    source: &FeatureSource,
) -> anyhow::Result<()> {
    let (sender, receiver) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("Failed to read input: {}", err);
                    break;
                }
            }
        }
    });

    println!("{}", HELP);
    loop {
        let now = Instant::now();
        controller.tick(now)?;
        controller.drive_reloads(|| source.fetch(), now)?;

        let received = match controller.next_deadline() {
            Some(deadline) => receiver.recv_timeout(deadline.saturating_duration_since(now)),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let line = match received {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match parse_command(&line) {
            Ok(Some(ReplCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = execute(controller, command, Instant::now()) {
                    eprintln!("Error: {:?}", err);
                }
            }
            Ok(None) => {}
            Err(err) => eprintln!("{}", err),
        }
    }
    // Input that was still waiting out the debounce window.
    if let Some(deadline) = controller.next_deadline() {
        controller.tick(deadline)?;
    }
    Ok(())
}
