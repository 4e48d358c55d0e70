//! snapquiz — hotkey-driven quiz answering from your tray.
//!
//! Capture → vision LLM → answer notification. Hold the capture hotkey,
//! the active provider (Gemini or Bedrock/Claude) reads the screen, the
//! extracted answers land in a notification and the local history file.
//!
//! Tray icon: green=idle, amber=working, red=error.

mod capture;
mod config;
mod credentials;
mod history;
mod hotkey;
mod logging;
mod orchestrator;
mod presenter;
mod provider;
mod setup;
mod tray;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use muda::MenuEvent;
use tray_icon::TrayIconEvent;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};

use capture::PrimaryScreenCapturer;
use config::Config;
use credentials::CredentialStore;
use history::HistoryStore;
use hotkey::{HotkeyAction, HotkeyMap};
use orchestrator::{AnalyzerFactory, Orchestrator, OrchestratorOptions, Phase, SwitchError};
use presenter::{NotificationPresenter, PopupPosition, Presenter, View};
use provider::{Provider, QuizAnalyzer};
use tray::TrayMenuIds;

// ── App handler for winit event loop ───────────────────────────────────────

struct App {
    orch: Arc<Orchestrator>,
    cfg: Config,
    tray: Option<tray_icon::TrayIcon>,
    menu_ids: TrayMenuIds,
    #[allow(dead_code)]
    hotkey_manager: Option<GlobalHotKeyManager>,
    hotkeys: HotkeyMap,
    /// Last (phase, provider) pushed to the tray, to skip redundant redraws.
    tray_shown: (Phase, Provider),
}

impl App {
    fn handle_action(&mut self, action: HotkeyAction, event_loop: &ActiveEventLoop) {
        match action {
            HotkeyAction::Capture => {
                self.orch.clone().trigger_capture();
            }
            HotkeyAction::ShowResults => {
                self.orch.show_results();
            }
            HotkeyAction::ShowHistory => {
                self.orch.show_history();
            }
            HotkeyAction::ResetHistory => {
                self.orch.reset_history();
            }
            HotkeyAction::SwitchProvider => {
                if let Ok(provider) = self.orch.switch_provider() {
                    self.cfg.provider.active = provider;
                    if let Err(e) = config::save_config(&self.cfg) {
                        log::warn!("Failed to persist provider switch: {e:#}");
                    }
                }
            }
            HotkeyAction::ClearAll => self.orch.clear_all(),
            HotkeyAction::Exit => {
                log::info!("Exit requested");
                event_loop.exit();
            }
        }
    }

    fn refresh_tray(&mut self) {
        let current = (self.orch.phase(), self.orch.active_provider());
        if current != self.tray_shown {
            if let Some(tray) = &self.tray {
                if let Err(e) = tray::update_tray(tray, current.0, current.1) {
                    log::debug!("Tray update failed: {e:#}");
                }
            }
            self.tray_shown = current;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        _event: WindowEvent,
    ) {
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Ok(event) = TrayIconEvent::receiver().try_recv() {
            log::trace!("Tray event: {:?}", event);
        }

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if let Some(action) = self.menu_ids.action(&event.id) {
                self.handle_action(action, event_loop);
            }
        }

        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.state == HotKeyState::Pressed {
                if let Some(action) = self.hotkeys.action(event.id) {
                    self.handle_action(action, event_loop);
                }
            }
        }

        self.refresh_tray();
        // Wake periodically so the tray reflects worker-thread phase changes.
        event_loop.set_control_flow(ControlFlow::WaitUntil(
            Instant::now() + Duration::from_millis(200),
        ));
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cfg = config::load_config().context("cannot start without a valid configuration")?;
    let diag = logging::init(&cfg.log.level, &cfg.log.file)?;

    log::info!("--- snapquiz v{} starting ---", env!("CARGO_PKG_VERSION"));

    if std::env::args().nth(1).as_deref() == Some("setup") {
        return setup::run(cfg);
    }

    let creds = CredentialStore::new(cfg.credentials.clone());
    let active = cfg.provider.active;
    if !creds.is_configured(active) {
        anyhow::bail!("active provider {active} is not configured; run `snapquiz setup` first");
    }

    let analyzer: Arc<dyn QuizAnalyzer> =
        Arc::from(provider::create_analyzer(active, &cfg.provider, &creds)?);
    log::info!("Active provider: {active}");

    let factory: Box<AnalyzerFactory> = {
        let provider_cfg = cfg.provider.clone();
        let creds = creds.clone();
        Box::new(move |target: Provider| {
            if !creds.is_configured(target) {
                return Err(SwitchError::ProviderNotConfigured(target));
            }
            provider::create_analyzer(target, &provider_cfg, &creds)
                .map(Arc::from)
                .map_err(|e| {
                    log::error!("Failed to build {target} client: {e:#}");
                    SwitchError::ProviderNotConfigured(target)
                })
        })
    };

    let presenter: Arc<dyn Presenter> = Arc::new(NotificationPresenter::new(
        PopupPosition::parse(&cfg.popup.position),
    ));
    let orch = Arc::new(Orchestrator::new(
        Box::new(PrimaryScreenCapturer::from_config(&cfg.capture)),
        active,
        analyzer,
        factory,
        HistoryStore::open(cfg.history.file.clone()),
        Arc::clone(&presenter),
        Some(diag),
        OrchestratorOptions {
            cooldown: Duration::from_secs_f64(cfg.capture.cooldown_secs.max(0.0)),
            answers_per_line: cfg.popup.answers_per_line,
        },
    ));

    // Event loop (must be on the main thread).
    let event_loop = EventLoop::new()?;

    let (tray, menu_ids) = tray::build_tray(active)?;
    log::info!("Tray icon created");

    let (hotkey_manager, hotkeys) = hotkey::setup_hotkeys(&cfg.hotkeys)?;
    log::info!("Global hotkeys registered");
    log::info!("Hotkeys:");
    log::info!("  Alt+{} : capture screen and analyze", cfg.hotkeys.capture.to_uppercase());
    log::info!("  Alt+{} : show last results", cfg.hotkeys.results.to_uppercase());
    log::info!("  Alt+{} : show answer history", cfg.hotkeys.history.to_uppercase());
    log::info!("  Alt+{} : reset answer history", cfg.hotkeys.reset.to_uppercase());
    log::info!("  Alt+{} : switch provider", cfg.hotkeys.switch.to_uppercase());
    log::info!("  Delete : clear answers and logs");
    log::info!("  ` (backquote) : exit");

    presenter.present(View::Status(format!(
        "snapquiz started.\nPress Alt+{} to capture the screen.",
        cfg.hotkeys.capture.to_uppercase()
    )));

    let mut app = App {
        orch,
        cfg,
        tray: Some(tray),
        menu_ids,
        hotkey_manager: Some(hotkey_manager),
        hotkeys,
        tray_shown: (Phase::Idle, active),
    };

    log::info!("Ready: green=idle  amber=working  red=error");
    event_loop.run_app(&mut app)?;

    log::info!("--- snapquiz stopped ---");
    Ok(())
}
