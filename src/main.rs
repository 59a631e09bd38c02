use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use travel_route::sdk::{
    config::MapConfig,
    events::{EndpointSlot, RouteMode, SessionStatus},
    map::SceneMap,
    pins::{JsonPinStore, PinCategory},
    routing::{
        ActiveRoute, ClickOutcome, Coordinate, NominatimGeocoder, OrsRouteClient, RouteOutcome,
        RoutePipeline, FALLBACK_NOTICE,
    },
    util::{
        log::init_logging,
        rate_limit::{geocode_limiter, ors_limiter},
    },
};

/// Route search and pin keeping for a personal travel map
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route between two addresses (or stored pins)
    Route {
        /// Departure address
        #[arg(long, required_unless_present = "from_pin")]
        from: Option<String>,
        /// Destination address
        #[arg(long, required_unless_present = "to_pin")]
        to: Option<String>,
        /// Use a stored pin's name as the departure address
        #[arg(long, conflicts_with = "from")]
        from_pin: Option<String>,
        /// Use a stored pin's name as the destination address
        #[arg(long, conflicts_with = "to")]
        to_pin: Option<String>,
        #[arg(long, default_value = "pins.json")]
        pins: PathBuf,
        #[arg(short, long, default_value = "route.json")]
        output: PathBuf,
    },
    /// Route between two coordinates, as if clicked on the map
    RoutePoints {
        /// Start as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        start: Coordinate,
        /// End as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        end: Coordinate,
        #[arg(short, long, default_value = "route.json")]
        output: PathBuf,
    },
    /// Free-text place search
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Manage stored pins
    Pins {
        #[arg(long, default_value = "pins.json")]
        file: PathBuf,
        #[command(subcommand)]
        action: PinAction,
    },
}

#[derive(Subcommand, Debug)]
enum PinAction {
    List,
    Add {
        name: String,
        /// Location as "lat,lng"
        #[arg(long, allow_hyphen_values = true)]
        at: Coordinate,
        #[arg(long, default_value = "tourist")]
        category: PinCategory,
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Change name, category or memo; omitted fields keep their value
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<PinCategory>,
        #[arg(long)]
        memo: Option<String>,
    },
    Remove {
        id: String,
    },
    /// Toggle the visited flag
    Visit {
        id: String,
    },
    Export {
        output: PathBuf,
    },
    Import {
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct RouteReport<'a> {
    status: SessionStatus,
    route: &'a ActiveRoute,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
    map: &'a SceneMap,
}

type Pipeline = RoutePipeline<NominatimGeocoder, OrsRouteClient, SceneMap>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Route {
            from,
            to,
            from_pin,
            to_pin,
            pins,
            output,
        } => {
            let pipeline = build_pipeline()?;
            if from_pin.is_some() || to_pin.is_some() {
                let store = JsonPinStore::load_from_file(&pins)
                    .with_context(|| format!("reading pins from {}", pins.display()))?;
                if let Some(id) = from_pin {
                    pipeline.select_pin_for_route(EndpointSlot::Start, &id, &store)?;
                }
                if let Some(id) = to_pin {
                    pipeline.select_pin_for_route(EndpointSlot::End, &id, &store)?;
                }
            }
            if let Some(text) = from {
                pipeline.set_address_draft(EndpointSlot::Start, &text);
            }
            if let Some(text) = to {
                pipeline.set_address_draft(EndpointSlot::End, &text);
            }
            let outcome = pipeline.search_route().await?;
            write_route(&pipeline, outcome, &output)
        }
        Command::RoutePoints { start, end, output } => {
            let pipeline = build_pipeline()?;
            pipeline.set_mode(RouteMode::MapClick);
            pipeline.register_map_click(start).await?;
            match pipeline.register_map_click(end).await? {
                ClickOutcome::RouteComputed(outcome) => write_route(&pipeline, outcome, &output),
                ClickOutcome::StartSet => bail!("click cycle did not complete"),
            }
        }
        Command::Search { query, limit } => {
            let config = MapConfig::from_env()?;
            let geocoder = NominatimGeocoder::new(
                &config.geocoder,
                config.timeout,
                geocode_limiter(config.geocoder.per_second),
            )?;
            let candidates = geocoder.search(&query, limit).await?;
            log::info!("{} result(s) for \"{}\"", candidates.len(), query);
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            Ok(())
        }
        Command::Pins { file, action } => run_pin_action(&file, action),
    }
}

fn build_pipeline() -> Result<Pipeline> {
    let config = MapConfig::from_env()?;
    let geocoder = NominatimGeocoder::new(
        &config.geocoder,
        config.timeout,
        geocode_limiter(config.geocoder.per_second),
    )?;
    let router = OrsRouteClient::new(
        &config.directions,
        config.timeout,
        ors_limiter(config.directions.per_minute),
    )?;
    log::debug!(
        "Directions from {} ({})",
        config.directions.ors.base_url(),
        config.directions.profile
    );
    Ok(RoutePipeline::new(geocoder, router, SceneMap::new()))
}

fn write_route(pipeline: &Pipeline, outcome: RouteOutcome, output: &Path) -> Result<()> {
    let (route, notice) = match outcome {
        RouteOutcome::Routed(route) => (route, None),
        RouteOutcome::FallbackRouted { route, cause } => {
            log::warn!("Directions failed ({}); wrote straight-line fallback", cause);
            (route, Some(FALLBACK_NOTICE.to_string()))
        }
        RouteOutcome::Superseded => bail!("route computation was superseded"),
    };

    log::info!(
        "{} / {}, {} step(s)",
        route.segment.distance_label(),
        route.segment.duration,
        route.steps.len()
    );
    for step in &route.steps {
        log::info!("  {}. {} ({})", step.ordinal, step.instruction, step.distance_label);
    }

    let json = pipeline.with_map(|map| {
        serde_json::to_string_pretty(&RouteReport {
            status: pipeline.status(),
            route: &route,
            notice,
            map,
        })
    })?;
    fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    log::info!("Route written to {}", output.display());
    Ok(())
}

fn run_pin_action(file: &Path, action: PinAction) -> Result<()> {
    let mut store = JsonPinStore::load_from_file(file)
        .with_context(|| format!("reading pins from {}", file.display()))?;

    match action {
        PinAction::List => {
            for pin in store.pins() {
                println!(
                    "{}  {}{}  [{}]  {}",
                    pin.id,
                    pin.name,
                    if pin.visited { " (visited)" } else { "" },
                    pin.category.display_name(),
                    pin.coordinate
                );
            }
            return Ok(());
        }
        PinAction::Add {
            name,
            at,
            category,
            memo,
        } => {
            if name.trim().is_empty() {
                bail!("pin name must not be empty");
            }
            let pin = store.add_pin(&name, at, category, &memo);
            log::info!("Added pin {} ({})", pin.name, pin.id);
        }
        PinAction::Edit {
            id,
            name,
            category,
            memo,
        } => {
            let current = store
                .get(&id)
                .with_context(|| format!("no pin with id {}", id))?;
            let name = name.unwrap_or_else(|| current.name.clone());
            let category = category.unwrap_or(current.category);
            let memo = memo.unwrap_or_else(|| current.memo.clone());
            let pin = store.update_pin(&id, &name, category, &memo)?;
            log::info!("Updated pin {} ({})", pin.name, pin.id);
        }
        PinAction::Remove { id } => match store.remove_pin(&id) {
            Some(pin) => log::info!("Removed pin {}", pin.name),
            None => bail!("no pin with id {}", id),
        },
        PinAction::Visit { id } => match store.toggle_visited(&id) {
            Some(visited) => log::info!("Pin {} visited: {}", id, visited),
            None => bail!("no pin with id {}", id),
        },
        PinAction::Export { output } => {
            fs::write(&output, store.export_json()?)
                .with_context(|| format!("writing {}", output.display()))?;
            log::info!("Exported pins to {}", output.display());
            return Ok(());
        }
        PinAction::Import { input } => {
            let data = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let count = store.import_json(&data)?;
            log::info!("Imported {} pin(s) from {}", count, input.display());
        }
    }

    store
        .save_to_file(file)
        .with_context(|| format!("saving pins to {}", file.display()))?;
    Ok(())
}
