use axum::{response::IntoResponse, routing::get, Router};
use clap::{Parser, Subcommand, ValueEnum};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use spdflow::common::{check_access, DevPort};
use spdflow::config::{parse_address_list, DiscoveryMode};
use spdflow::smbus::tools::{i2c_detect, i2c_dump, DetectMode};
use spdflow::smbus::{BusDiscovery, ConfiguredDiscovery, I2cDevDiscovery, LinuxDiscovery};
use spdflow::spd::ModuleInfo;
use spdflow::{
    DimmMetricExporter, ExportConfig, MetricCollector, Result, SmbusBus, SmbusManager,
    SpdDetector, SpdflowError,
};

#[derive(Parser, Debug)]
#[command(name = "spdflow")]
#[command(about = "DDR4/DDR5 SPD and DIMM temperature reader over SMBus")]
struct Args {
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging (shows every SMBus transaction outcome)"
    )]
    verbose: bool,

    #[arg(long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long = "address",
        global = true,
        help = "SPD addresses to probe (supports ranges and comma-separated lists: --address 0x50-0x53,0x55)"
    )]
    addresses: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export DIMM sensor metrics over HTTP
    Serve {
        #[arg(long, help = "Listen address (default 0.0.0.0:9105)")]
        listen: Option<SocketAddr>,

        #[arg(long, help = "Collection interval in seconds")]
        interval: Option<u64>,
    },
    /// Print identification and sensor data of every detected module
    Scan {
        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },
    /// Print an i2cdetect-style address map of every bus
    Detect {
        #[arg(long, value_enum, default_value_t = ProbeMode::Auto)]
        mode: ProbeMode,
    },
    /// Dump the first 256 registers of one device
    Dump {
        #[arg(long, default_value_t = 0, help = "Bus index as listed by `detect`")]
        bus: usize,

        #[arg(long, value_parser = parse_hex_u8)]
        device: u8,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProbeMode {
    Auto,
    Quick,
    Read,
}

impl From<ProbeMode> for DetectMode {
    fn from(mode: ProbeMode) -> Self {
        match mode {
            ProbeMode::Auto => DetectMode::Auto,
            ProbeMode::Quick => DetectMode::Quick,
            ProbeMode::Read => DetectMode::Read,
        }
    }
}

fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s}: {e}"))
}

struct AppState {
    dimm_exporter: Arc<DimmMetricExporter>,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let families = state.dimm_exporter.registry().gather();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!("Failed to encode DIMM metrics: {e}");
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

fn check_permissions() {
    if let Err(e) = check_access() {
        eprintln!("\n⚠️  ERROR: Cannot access /dev/port: {e}\n\nRun as root or grant CAP_SYS_RAWIO.\n");
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<ExportConfig> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::auto_detect(),
    };

    if let Some(list) = &args.addresses {
        config.addresses = parse_address_list(list)?;
    }
    if let Command::Serve { listen, interval } = &args.command {
        if let Some(listen) = listen {
            config.listen = *listen;
        }
        if let Some(interval) = interval {
            config.interval_secs = *interval;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Controllers driven directly through `/dev/port`
fn open_port_buses(config: &ExportConfig) -> Result<SmbusManager> {
    check_permissions();
    let port = Arc::new(DevPort::open()?);

    let discovery: Box<dyn BusDiscovery> = match config.discovery {
        DiscoveryMode::Configured => Box::new(
            ConfiguredDiscovery::new(port, config.buses.clone())
                .with_lock_path(config.lock_path.clone()),
        ),
        _ => Box::new(LinuxDiscovery::new(port).with_lock_path(config.lock_path.clone())),
    };

    SmbusManager::detect(discovery.as_ref())
}

fn open_buses(config: &ExportConfig) -> Result<SmbusManager> {
    match config.discovery {
        DiscoveryMode::Kernel => SmbusManager::detect(&I2cDevDiscovery::new()),
        DiscoveryMode::Auto => match SmbusManager::detect(&I2cDevDiscovery::new()) {
            Err(SpdflowError::NoBus) => {
                tracing::info!("No i2c-dev SMBus adapter available, probing controllers directly");
                open_port_buses(config)
            }
            found => found,
        },
        DiscoveryMode::Port | DiscoveryMode::Configured => open_port_buses(config),
    }
}

fn bus_handles(manager: &SmbusManager) -> Vec<Arc<dyn SmbusBus>> {
    manager
        .buses()
        .iter()
        .map(|bus| Arc::clone(bus) as Arc<dyn SmbusBus>)
        .collect()
}

fn scan(config: &ExportConfig, manager: &SmbusManager, json: bool) -> Result<()> {
    let mut modules = Vec::new();

    for bus in bus_handles(manager) {
        for &address in &config.addresses {
            let mut detector = SpdDetector::detect(Arc::clone(&bus), address, None);
            if let Some(device) = detector.device() {
                modules.push(ModuleInfo::read(&bus.info().name, device));
            } else if detector.is_valid() {
                tracing::warn!(
                    "{}: 0x{address:02x} reports {} but could not be opened",
                    bus.info().name,
                    detector.memory_type().name()
                );
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    for module in &modules {
        println!("{} 0x{:02x}: {}", module.bus, module.address, module.memory_type);
        println!(
            "  manufacturer: {} (DRAM: {})",
            module.module_manufacturer.unwrap_or("unknown"),
            module.dram_manufacturer.unwrap_or("unknown")
        );
        println!("  part number:  {}", module.part_number);
        println!("  serial:       {}", module.serial_number);
        if let Some(date) = module.manufacturing_date {
            println!("  manufactured: {date}");
        }
        let sensor = &module.thermal_sensor;
        if sensor.present {
            println!(
                "  temperature:  {:.2} °C (high {:.2}, low {:.2}, status {:?})",
                sensor.temperature, sensor.high_limit, sensor.low_limit, sensor.status
            );
        }
    }
    if modules.is_empty() {
        println!("No DDR4/DDR5 modules found");
    }

    Ok(())
}

/// Resolve on SIGINT or SIGTERM and stop the collection loop
async fn shutdown_signal(cancel: CancellationToken) {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!("Cannot listen for SIGINT: {e}");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {e}");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };

    tracing::warn!("{received} received, stopping DIMM collection and the HTTP server");
    cancel.cancel();
}

async fn serve(config: ExportConfig, manager: SmbusManager) -> Result<()> {
    let collector = MetricCollector::new(&config, &bus_handles(&manager))?;
    let cancel_token = CancellationToken::new();

    let app_state = Arc::new(AppState {
        dimm_exporter: collector.dimm_exporter(),
    });
    let collection_handle = collector.start(cancel_token.clone());

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(app_state);

    tracing::warn!("Starting HTTP server on {}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("HTTP server stopped, waiting for the collection loop");
    if collection_handle.join().await {
        tracing::info!("Collection loop stopped");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = build_config(&args)?;

    let manager = open_buses(&config)?;
    for bus in manager.buses() {
        tracing::info!("Bus {}: {}", bus.info().port_id, bus.info().name);
    }

    match args.command {
        Command::Serve { .. } => serve(config, manager).await,
        Command::Scan { json } => scan(&config, &manager, json),
        Command::Detect { mode } => {
            for bus in manager.buses() {
                println!("{} ({}):", bus.info().name, bus.info().port_id);
                print!("{}", i2c_detect(bus.as_ref(), mode.into()));
            }
            Ok(())
        }
        Command::Dump { bus, device } => {
            let controller = manager.buses().get(bus).ok_or_else(|| {
                SpdflowError::InvalidConfiguration(format!("no bus with index {bus}"))
            })?;
            print!("{}", i2c_dump(controller.as_ref(), device));
            Ok(())
        }
    }
}
