use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use mapper::{
    api::ProfileApi,
    catalog::{description_for, label_for, FieldCatalogCache},
    config::MapperConfig,
    controller::{MapController, SearchStatus},
    filters::{RawFilters, START_ADDRESS_KEY, START_LAT_KEY, START_LON_KEY},
    gpx_export::write_route_gpx,
    models::RouteResult,
    replay::GpxReplayProvider,
    surface::TracingSurface,
};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Query the profiles optimizer and follow the returned route"
)]
struct Args {
    /// Backend base URL (overrides MAPPER_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request one optimized route and print the visiting order
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Start address, geocoded by the backend
        #[arg(long)]
        address: Option<String>,

        /// Explicit start as LAT,LON
        #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        start: Option<(f64, f64)>,

        /// Write the route and markers as GPX
        #[arg(long)]
        gpx_out: Option<PathBuf>,
    },
    /// List visible filterable fields
    Fields,
    /// Search from the first point of a GPX track, then replay it as live positions
    Track {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(long)]
        gpx: PathBuf,

        /// Seconds between replayed positions
        #[arg(long)]
        step_secs: Option<u64>,
    },
}

#[derive(Debug, clap::Args)]
struct QueryArgs {
    /// Filter as FIELD=VALUE, repeatable (e.g. ethnicity=Haitian, min_score_vote=7)
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,
}

impl QueryArgs {
    fn raw(&self) -> RawFilters {
        self.filters
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect()
    }
}

fn parse_filter(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got {input:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("filter field is empty".into());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn parse_lat_lon(input: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {input:?}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|err| err.to_string())?;
    let lon = lon.trim().parse::<f64>().map_err(|err| err.to_string())?;
    Ok((lat, lon))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = MapperConfig::from_env()?;
    if let Some(base) = args.api_base {
        config.api_base = base.trim_end_matches('/').to_string();
    }
    let api = Arc::new(ProfileApi::from_config(&config)?);
    tracing::info!("using backend {}", api.base());

    match args.command {
        Command::Search {
            query,
            address,
            start,
            gpx_out,
        } => {
            let mut raw = query.raw();
            if let Some(address) = address {
                raw.insert(START_ADDRESS_KEY.into(), Value::String(address));
            }
            if let Some((lat, lon)) = start {
                raw.insert(START_LAT_KEY.into(), lat.into());
                raw.insert(START_LON_KEY.into(), lon.into());
            }

            let mut controller =
                MapController::with_api(TracingSurface::default(), api.clone(), &config);
            load_known_fields(&mut controller, api).await;

            let status = controller.search(&raw).await;
            for notice in controller.drain_notices() {
                eprintln!("{notice}");
            }
            if let SearchStatus::Displayed { .. } = status {
                let result = RouteResult {
                    start: controller.start(),
                    path: controller.route().map(<[_]>::to_vec).unwrap_or_default(),
                    markers: controller.markers().to_vec(),
                };
                print_result(&result);
                if let Some(path) = gpx_out {
                    write_route_gpx(&result, &path)?;
                }
            }
        }
        Command::Fields => {
            let mut catalog = FieldCatalogCache::new(api);
            let names: Vec<String> = catalog.fields().await?.keys().cloned().collect();
            for field in names {
                let entries = catalog.metadata(&field, true).await;
                let Some(meta) = entries.first() else {
                    continue;
                };
                println!(
                    "{field:<24} {:<24} {}",
                    label_for(&field, Some(meta)),
                    description_for(Some(meta))
                );
            }
        }
        Command::Track { query, gpx, step_secs } => {
            let mut options = config.tracking.clone();
            if let Some(secs) = step_secs {
                options.min_interval = Duration::from_secs(secs);
            }
            let provider = GpxReplayProvider::from_path(&gpx, options.min_interval)?;

            let mut controller =
                MapController::with_api(TracingSurface::default(), api.clone(), &config);
            load_known_fields(&mut controller, api).await;
            controller.locate(&provider, &options).await;

            let status = controller.search(&query.raw()).await;
            for notice in controller.drain_notices() {
                eprintln!("{notice}");
            }
            if !matches!(status, SearchStatus::Displayed { .. }) {
                return Ok(());
            }

            controller.start_tracking(&provider, &options)?;
            while controller.next_tracking_update().await {
                let remaining = controller.route().map_or(0, <[_]>::len);
                tracing::info!("{remaining} route point(s) remaining");
                if remaining == 0 {
                    println!("route completed");
                    break;
                }
            }
            controller.teardown();
        }
    }

    Ok(())
}

async fn load_known_fields(controller: &mut MapController<TracingSurface>, api: Arc<ProfileApi>) {
    let mut catalog = FieldCatalogCache::new(api);
    match catalog.fields().await {
        Ok(fields) => {
            let known = fields.keys().cloned().collect::<Vec<_>>();
            controller.builder_mut().set_known_fields(known);
        }
        Err(err) => tracing::warn!("field catalog unavailable, filters are not validated: {err}"),
    }
}

fn print_result(result: &RouteResult) {
    println!(
        "start ({:.5}, {:.5}), {} path point(s)",
        result.start.lat,
        result.start.lon,
        result.path.len()
    );
    for marker in &result.markers {
        println!(
            "  {} at ({:.5}, {:.5})",
            marker.label(),
            marker.position.lat,
            marker.position.lon
        );
    }
}
