use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use foundation::geom::{Extent, ScreenPoint};
use foundation::ids::EntityKey;
use foundation::time::{Clock, ManualClock, Millis};
use metadata::cache::MetadataCache;
use metadata::directory::{DEFAULT_DIRECTORY_URL, DirectoryClient};
use metadata::provider::{DataProvider, StaticDirectory};
use overlay::{OverlayConfig, OverlayController, Snapshot};
use picking::markers::{Marker, MarkerLayer};
use picking::registry::EntityRegistry;
use picking::renderer::Renderer;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays pointer traces through the globe overlay controller")]
struct Args {
    /// Trace file: viewport, markers and the event list to replay
    #[arg(long)]
    trace: PathBuf,

    /// Country directory base URL (default: OVERLAY_DIRECTORY_URL or restcountries v3.1)
    #[arg(long, conflicts_with = "offline")]
    directory: Option<String>,

    /// Serve metadata from a local JSON array of descriptors instead of HTTP
    #[arg(long)]
    offline: Option<PathBuf>,

    /// Display-name to code table; defaults to the trace's `entities` or its markers
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Overlay config (JSON); missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hover pick interval in ms (default: OVERLAY_THROTTLE_MS or the config value)
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// Per-request timeout for the directory client
    #[arg(long, default_value_t = 8000)]
    timeout_ms: u64,

    /// Wait for outstanding metadata after every event. By default results are
    /// only applied on `tick`, `wait` and `settle` events, like a UI loop would.
    #[arg(long)]
    settle_each: bool,
}

#[derive(Debug, Deserialize)]
struct Trace {
    #[serde(default)]
    viewport: Option<Extent>,
    #[serde(default)]
    entities: Option<BTreeMap<String, String>>,
    markers: Vec<Marker>,
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event {
    /// Pointer move; `t` sets the clock first, otherwise the current time is used.
    Move {
        x: f64,
        y: f64,
        #[serde(default)]
        t: Option<u64>,
    },
    Click {
        x: f64,
        y: f64,
    },
    Close,
    Tick,
    /// Advances the clock and ticks.
    Wait {
        ms: u64,
    },
    /// Pans the globe and re-projects the hovered entity.
    Rotate {
        dx: f64,
        dy: f64,
    },
    Resize {
        w: f64,
        h: f64,
    },
    Invalidate {
        key: EntityKey,
    },
    Settle,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let trace: Trace = serde_json::from_str(&read_text(&args.trace).await?)?;

    let mut config = match &args.config {
        Some(path) => OverlayConfig::from_json(&read_text(path).await?)?,
        None => OverlayConfig::default(),
    };
    config.throttle_interval_ms = args
        .throttle_ms
        .unwrap_or_else(|| env_var_u64("OVERLAY_THROTTLE_MS", config.throttle_interval_ms));
    if let Some(viewport) = trace.viewport {
        config.viewport = viewport;
    }
    config.validate()?;

    let names = match (&args.entities, &trace.entities) {
        (Some(path), _) => serde_json::from_str::<BTreeMap<String, String>>(&read_text(path).await?)?,
        (None, Some(names)) => names.clone(),
        (None, None) => trace
            .markers
            .iter()
            .map(|m| (m.label.clone(), m.key.as_str().to_string()))
            .collect(),
    };
    let registry = Arc::new(EntityRegistry::from_names(names)?);

    let provider: Arc<dyn DataProvider> = match &args.offline {
        Some(path) => {
            let directory = StaticDirectory::from_json(&read_text(path).await?)?;
            info!(entries = directory.len(), "serving metadata offline");
            Arc::new(directory)
        }
        None => {
            let base_url = args.directory.clone().unwrap_or_else(|| {
                env::var("OVERLAY_DIRECTORY_URL").unwrap_or_else(|_| DEFAULT_DIRECTORY_URL.to_string())
            });
            info!(%base_url, "fetching metadata over HTTP");
            Arc::new(DirectoryClient::new(
                base_url,
                Duration::from_millis(args.timeout_ms),
            )?)
        }
    };

    let clock = ManualClock::new(Millis(0));
    let layer = MarkerLayer::with_markers(config.viewport, trace.markers);
    let mut controller = OverlayController::new(
        layer,
        registry,
        MetadataCache::new(provider),
        &config,
        Arc::new(clock.clone()),
    );

    controller.renderer_ready();
    info!(markers = controller.renderer().markers().len(), "renderer ready");

    let mut printer = SnapshotPrinter::default();
    printer.emit(controller.snapshot());

    info!(events = trace.events.len(), "replaying trace");
    replay(&mut controller, &clock, trace.events, args.settle_each, &mut printer).await;

    let stats = controller.cache().stats();
    println!(
        "{}",
        json!({
            "summary": {
                "generation": controller.generation().0,
                "picks": controller.pick_count(),
                "intents": controller.intents().total_recorded(),
                "stale_discards": controller.stale_discards(),
                "cache": {
                    "hits": stats.hits,
                    "misses": stats.misses,
                    "coalesced": stats.coalesced,
                    "fetches": stats.fetches_started,
                    "failures": stats.failures,
                },
            }
        })
    );
    Ok(())
}

/// Feeds `events` to the controller in order.
async fn replay(
    controller: &mut OverlayController<MarkerLayer>,
    clock: &ManualClock,
    events: Vec<Event>,
    settle_each: bool,
    printer: &mut SnapshotPrinter,
) {
    for event in events {
        debug!(?event, now = clock.now().0, "event");
        match event {
            Event::Move { x, y, t } => {
                if let Some(t) = t {
                    clock.set(Millis(t));
                }
                controller.handle_pointer_move(ScreenPoint::new(x, y), clock.now());
            }
            Event::Click { x, y } => controller.handle_click(ScreenPoint::new(x, y)),
            Event::Close => controller.close_panel(),
            Event::Tick => controller.tick(),
            Event::Wait { ms } => {
                clock.advance(ms);
                controller.tick();
            }
            Event::Rotate { dx, dy } => {
                controller.renderer_mut().pan(dx, dy);
                controller.reproject();
            }
            Event::Resize { w, h } => {
                let viewport = Extent::new(w, h);
                controller.renderer_mut().set_viewport(viewport);
                controller.set_viewport(viewport);
            }
            Event::Invalidate { key } => {
                controller.invalidate_cache(&key);
            }
            Event::Settle => settle_printing(controller, printer).await,
        }
        printer.emit(controller.snapshot());
        if settle_each {
            settle_printing(controller, printer).await;
        }
    }
    settle_printing(controller, printer).await;
}

/// Prints each distinct snapshot as one JSON line.
#[derive(Default)]
struct SnapshotPrinter {
    seq: u64,
    last: Option<Snapshot>,
}

impl SnapshotPrinter {
    fn emit(&mut self, snapshot: Snapshot) {
        if self.last.as_ref() == Some(&snapshot) {
            return;
        }
        match serde_json::to_value(&snapshot) {
            Ok(value) => println!("{}", json!({ "seq": self.seq, "snapshot": value })),
            Err(err) => warn!(%err, "snapshot serialization failed"),
        }
        self.seq += 1;
        self.last = Some(snapshot);
    }
}

/// Applies outstanding metadata one result at a time, printing each change.
async fn settle_printing<R: Renderer>(
    controller: &mut OverlayController<R>,
    printer: &mut SnapshotPrinter,
) {
    while controller.next_arrival().await.is_some() {
        printer.emit(controller.snapshot());
    }
}

async fn read_text(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("failed to read {}: {err}", path.display()).into())
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{SnapshotPrinter, Trace, replay};
    use foundation::time::{ManualClock, Millis};
    use metadata::cache::MetadataCache;
    use metadata::provider::StaticDirectory;
    use overlay::{Details, OverlayConfig, OverlayController};
    use picking::markers::MarkerLayer;
    use picking::registry::EntityRegistry;

    #[tokio::test]
    async fn europe_trace_discards_superseded_lookups() {
        let trace: Trace =
            serde_json::from_str(include_str!("../traces/europe.json")).expect("trace");
        let directory =
            StaticDirectory::from_json(include_str!("../traces/descriptors.json")).expect("json");
        let names = trace.entities.clone().expect("entities");
        let registry = EntityRegistry::from_names(names).expect("registry");
        let config = OverlayConfig {
            viewport: trace.viewport.expect("viewport"),
            ..OverlayConfig::default()
        };
        let clock = ManualClock::new(Millis(0));
        let mut controller = OverlayController::new(
            MarkerLayer::with_markers(config.viewport, trace.markers),
            Arc::new(registry),
            MetadataCache::new(Arc::new(directory)),
            &config,
            Arc::new(clock.clone()),
        );
        controller.renderer_ready();

        let mut printer = SnapshotPrinter::default();
        replay(&mut controller, &clock, trace.events, false, &mut printer).await;

        // France is superseded by Germany before its lookup is applied, and
        // Italy's panel is closed before its lookup lands.
        assert_eq!(controller.stale_discards(), 2);
        assert_eq!(
            controller.state().entity().map(|e| e.key.as_str()),
            Some("ES")
        );
        assert!(matches!(
            controller.state().details(),
            Some(Details::Unavailable(_))
        ));
        assert_eq!(controller.generation().0, 6);
        assert!(printer.seq > 6);
    }
}
