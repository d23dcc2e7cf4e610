mod app_state;
mod cast_runtime;
mod command_interceptor;
mod config;
mod diagnostics;
mod event_relay;
mod headless_engine;
mod launch_params;
mod log_relay;
mod player_engine;
mod protocol;
mod receiver_context;
mod receiver_manager;
mod remote_control;
mod stdio_bridge;
mod subtitles;
mod track_reconciler;
mod ui_projection;
mod ui_timers;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use config::{default_config_path, load_or_create_config, ReceiverConfig};
use diagnostics::{lock_ring, LogRing, DEFAULT_LOG_CAPACITY};
use headless_engine::HeadlessEngine;
use launch_params::{debug_requested, LaunchParams};
use log::{error, info, warn, LevelFilter};
use log_relay::LogRelay;
use receiver_context::ReceiverContext;
use receiver_manager::ReceiverManager;
use stdio_bridge::{spawn_snapshot_printer, spawn_stdin_reader, StdioCastRuntime};
use subtitles::HttpDocumentFetcher;
use tokio::sync::broadcast;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn load_config(params: &LaunchParams) -> ReceiverConfig {
    let Some(path) = params.config_path.clone().or_else(default_config_path) else {
        warn!("No config directory available, using defaults");
        return ReceiverConfig::default();
    };
    match load_or_create_config(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!("{}. Using default config", err);
            ReceiverConfig::default()
        }
    }
}

/// Builds the terminal logger and the global max level to install with it.
/// `RUST_LOG` directives set the level; without them Debug stays off until
/// debug mode turns it on.
fn build_terminal_logger(rust_log: Option<&str>) -> (Box<dyn log::Log>, LevelFilter) {
    let mut clog = colog::basic_builder();
    clog.filter(None, LevelFilter::Debug);
    match rust_log {
        Some(filters) => {
            clog.parse_filters(filters);
            let logger = clog.build();
            let max_level = logger.filter();
            (Box::new(logger), max_level)
        }
        None => (Box::new(clog.build()), LevelFilter::Info),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_ring = LogRing::shared(DEFAULT_LOG_CAPACITY);
    let rust_log = std::env::var("RUST_LOG").ok();
    let (terminal_logger, max_level) = build_terminal_logger(rust_log.as_deref());
    LogRelay::new(terminal_logger, log_ring.clone()).install(max_level)?;

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let params = LaunchParams::from_args(std::env::args().skip(1))?;
    let config = load_config(&params);
    lock_ring(&log_ring).set_capacity(config.diagnostics.log_capacity);
    let url_debug = params.page_url.as_deref().is_some_and(debug_requested);

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    let manager_bus_receiver = bus_sender.subscribe();
    let printer_handle = spawn_snapshot_printer(bus_sender.subscribe());
    spawn_stdin_reader(bus_sender.clone(), config.receiver.custom_namespace.clone());

    let mut ctx = ReceiverContext::new(
        config,
        Box::new(HeadlessEngine::new()),
        Box::new(StdioCastRuntime::stdout()),
        Arc::new(HttpDocumentFetcher::new()),
        bus_sender.clone(),
    )
    .with_log_ring(log_ring);
    if url_debug {
        ctx.enable_debug_mode("page URL");
    }

    let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut manager = ReceiverManager::new(manager_bus_receiver, ctx);
        manager.run();
    }));
    if let Err(payload) = run_result {
        error!(
            "ReceiverManager terminated due to panic: {}",
            panic_payload_to_string(payload.as_ref())
        );
    }

    let _ = bus_sender.send(protocol::Message::Shutdown);
    let _ = printer_handle.join();
    info!("Receiver exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, Metadata};

    use super::build_terminal_logger;

    #[test]
    fn test_default_logger_caps_at_info() {
        let (logger, max_level) = build_terminal_logger(None);
        assert_eq!(max_level, LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).target("cast_receiver").build();
        assert!(logger.enabled(&debug));
    }

    #[test]
    fn test_rust_log_sets_max_level() {
        let (logger, max_level) = build_terminal_logger(Some("trace"));
        assert_eq!(max_level, LevelFilter::Trace);
        let trace = Metadata::builder().level(Level::Trace).target("cast_receiver").build();
        assert!(logger.enabled(&trace));

        let (logger, max_level) = build_terminal_logger(Some("warn"));
        assert_eq!(max_level, LevelFilter::Warn);
        let info = Metadata::builder().level(Level::Info).target("cast_receiver").build();
        assert!(!logger.enabled(&info));
    }
}
