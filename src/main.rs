//! AquaControl Firmware: Main Entry Point
//!
//! Hexagonal architecture: a fixed-period control loop on the main task,
//! the control API on the HTTP server task, both meeting at the shared
//! control stores.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Temp + Relays)   (EventSink)    (Config+Sched)(ClockPort)    │
//! │  WifiStation       EspHttpServer → ControlApi                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Arbiter · Safety latch · Heater · Overrides · Sched   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::http::Method;
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use aquacontrol::adapters::hardware::HardwareAdapter;
use aquacontrol::adapters::log_sink::LogEventSink;
use aquacontrol::adapters::nvs::{API_KEY_CRED, NvsAdapter};
use aquacontrol::adapters::time::Esp32TimeAdapter;
use aquacontrol::adapters::wifi::{ConnectivityPort, WifiStation};
use aquacontrol::api::{ApiKey, ApiRequest, ControlApi};
use aquacontrol::api::auth::MAX_KEY_LEN;
use aquacontrol::app::ports::{ClockPort, ConfigPort};
use aquacontrol::app::service::AppService;
use aquacontrol::config::SystemConfig;
use aquacontrol::drivers::relay::{RelayBank, RelayPin};
use aquacontrol::drivers::watchdog::Watchdog;
use aquacontrol::drivers::hw_init;
use aquacontrol::pins;
use aquacontrol::sensors::temperature::NtcThermometer;

/// Header carrying the API key on every request.
const API_KEY_HEADER: &str = "X-API-Key";

/// Used only when neither NVS nor the build environment supplies a key.
const FALLBACK_API_KEY: &str = "change-me";

type SharedApi = Arc<Mutex<ControlApi>>;

// ── API key resolution ────────────────────────────────────────

/// Stored key, else the build-time key (written through to NVS so it
/// survives later builds without one), else the built-in default.
fn load_api_key(nvs: &mut NvsAdapter) -> ApiKey {
    let mut buf = [0u8; MAX_KEY_LEN];
    match nvs.read_credential(API_KEY_CRED, &mut buf) {
        Ok(len) if len > 0 => {
            info!("API key loaded from NVS");
            return ApiKey::new(&buf[..len]);
        }
        Ok(_) => warn!("Stored API key is empty, ignoring"),
        Err(e) => info!("No stored API key ({})", e),
    }
    match option_env!("AQUA_API_KEY") {
        Some(key) if !key.is_empty() => {
            match nvs.store_credential(API_KEY_CRED, key.as_bytes()) {
                Ok(()) => info!("API key provisioned into NVS"),
                Err(e) => warn!("API key not provisioned ({}), using it for this boot", e),
            }
            ApiKey::new(key.as_bytes())
        }
        _ => {
            warn!("API key not configured, using built-in default");
            ApiKey::new(FALLBACK_API_KEY.as_bytes())
        }
    }
}

// ── HTTP glue ─────────────────────────────────────────────────

/// Read at most `limit + 1` bytes so oversize bodies are detectable.
fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunk = [0u8; 256];
    while body.len() <= limit {
        let n = req.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(limit + 1);
    Ok(body)
}

fn serve(
    mut req: Request<&mut EspHttpConnection<'_>>,
    api: &SharedApi,
    nvs: &NvsAdapter,
    clock: Esp32TimeAdapter,
    route: Route,
) -> Result<()> {
    let credential = req.header(API_KEY_HEADER).map(|k| k.as_bytes().to_vec());

    let limit = match api.lock() {
        Ok(api) => api.max_body_bytes(),
        Err(poisoned) => poisoned.into_inner().max_body_bytes(),
    };
    let body = if route.has_body() {
        read_body(&mut req, limit)?
    } else {
        Vec::new()
    };

    let request = match route {
        Route::Status => ApiRequest::Status,
        Route::Control => ApiRequest::Control(&body),
        Route::GetSchedules => ApiRequest::GetSchedules,
        Route::PutSchedules => ApiRequest::ReplaceSchedules(&body),
        Route::EmergencyReset => ApiRequest::EmergencyReset,
    };

    let response = {
        let mut api = match api.lock() {
            Ok(api) => api,
            Err(poisoned) => poisoned.into_inner(),
        };
        api.respond(credential.as_deref(), request, clock.now(), nvs)
    };

    let mut resp = req.into_response(
        response.status,
        None,
        &[("Content-Type", "application/json")],
    )?;
    resp.write_all(response.body.as_bytes())?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Status,
    Control,
    GetSchedules,
    PutSchedules,
    EmergencyReset,
}

impl Route {
    const ALL: [(&'static str, Method, Route); 5] = [
        ("/status", Method::Get, Route::Status),
        ("/control", Method::Post, Route::Control),
        ("/schedules", Method::Get, Route::GetSchedules),
        ("/schedules", Method::Put, Route::PutSchedules),
        ("/emergency/reset", Method::Post, Route::EmergencyReset),
    ];

    fn has_body(self) -> bool {
        matches!(self, Route::Control | Route::PutSchedules)
    }
}

fn start_http(api: SharedApi, nvs: Arc<NvsAdapter>, clock: Esp32TimeAdapter) -> Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfig::default())?;
    for (uri, method, route) in Route::ALL {
        let api = Arc::clone(&api);
        let nvs = Arc::clone(&nvs);
        server.fn_handler(uri, method, move |req| serve(req, &api, &nvs, clock, route))?;
    }
    info!("HTTP: control API listening on port 80");
    Ok(server)
}

// ── WiFi ──────────────────────────────────────────────────────

/// Bring up station mode from build-time credentials and keep it alive
/// on a background thread.
fn start_wifi(driver: BlockingWifi<EspWifi<'static>>, clock: Esp32TimeAdapter) -> Result<()> {
    let (Some(ssid), password) = (option_env!("AQUA_WIFI_SSID"), option_env!("AQUA_WIFI_PASS")) else {
        warn!("WiFi: no build-time credentials, control API unreachable");
        return Ok(());
    };

    let mut wifi = WifiStation::new();
    wifi.attach(driver);
    wifi.set_credentials(ssid, password.unwrap_or(""))
        .map_err(|e| anyhow::anyhow!("WiFi credentials: {}", e))?;

    std::thread::Builder::new()
        .name("wifi".into())
        .stack_size(6 * 1024)
        .spawn(move || {
            if let Err(e) = wifi.connect() {
                warn!("WiFi: initial connect failed ({}), retrying", e);
            }
            loop {
                wifi.poll(clock.uptime_ms());
                std::thread::sleep(Duration::from_secs(1));
            }
        })?;
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AquaControl v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let nvs_partition = EspDefaultNvsPartition::take()
        .inspect_err(|e| warn!("NVS partition unavailable ({}), running without persistence", e))
        .ok();
    let mut nvs = nvs_partition
        .clone()
        .map_or_else(NvsAdapter::default, NvsAdapter::new);
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let period = Duration::from_millis(u64::from(config.control_loop_interval_ms));
    let mut watchdog = Watchdog::new(config.watchdog_timeout_ms, period);

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, halting", e);
        watchdog.starve();
    }

    // ── 4. Construct adapters ─────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let relays = RelayBank::new(
        pins::RELAY_GPIOS.iter().take(config.appliances.len()).map(|&gpio| RelayPin::new(gpio)),
        pins::RELAY_ACTIVE_LOW,
    );
    let mut hw = HardwareAdapter::new(
        NtcThermometer::new(config.sensor_min_c, config.sensor_max_c),
        relays,
    );
    let mut log_sink = LogEventSink::new();

    // ── 5. Construct app service ──────────────────────────────
    let mut app = AppService::new(&config)?;
    let restored = app.restore_schedules(&nvs);
    info!("Schedules: {:?}", restored);
    app.start(&mut hw, &mut log_sink);

    // ── 6. Network + control API ──────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let driver = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), nvs_partition)?,
        sysloop,
    )?;
    start_wifi(driver, clock)?;
    let _sntp = EspSntp::new_default()?;

    let api = ControlApi::new(app.handle(), load_api_key(&mut nvs), &config);
    let _http = start_http(Arc::new(Mutex::new(api)), Arc::new(nvs), clock)?;

    info!("System ready. Entering control loop ({} ms).", config.control_loop_interval_ms);

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        let started = clock.uptime_ms();

        app.tick(&clock, &mut hw, &mut log_sink);

        let elapsed = Duration::from_millis(clock.uptime_ms().saturating_sub(started));
        watchdog.tick_completed(app.tick_count(), elapsed);
        std::thread::sleep(period.saturating_sub(elapsed));
    }
}
