//! System tray — status-colored icon plus a menu mirroring the hotkey surface.

use anyhow::{Context, Result};
use muda::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::hotkey::HotkeyAction;
use crate::orchestrator::Phase;
use crate::provider::Provider;

/// Menu item ids returned by `build_tray()` for event matching in the event loop.
pub struct TrayMenuIds {
    pub capture: MenuId,
    pub show_results: MenuId,
    pub show_history: MenuId,
    pub switch_provider: MenuId,
    pub reset_history: MenuId,
    pub clear_all: MenuId,
    pub quit: MenuId,
}

impl TrayMenuIds {
    pub fn action(&self, id: &MenuId) -> Option<HotkeyAction> {
        if *id == self.capture {
            Some(HotkeyAction::Capture)
        } else if *id == self.show_results {
            Some(HotkeyAction::ShowResults)
        } else if *id == self.show_history {
            Some(HotkeyAction::ShowHistory)
        } else if *id == self.switch_provider {
            Some(HotkeyAction::SwitchProvider)
        } else if *id == self.reset_history {
            Some(HotkeyAction::ResetHistory)
        } else if *id == self.clear_all {
            Some(HotkeyAction::ClearAll)
        } else if *id == self.quit {
            Some(HotkeyAction::Exit)
        } else {
            None
        }
    }
}

/// Generate a 64x64 RGBA icon with a circle colored by pipeline phase.
pub fn make_icon(phase: Phase) -> Icon {
    let size = 64u32;
    let mut rgba = vec![0u8; (size * size * 4) as usize];

    let (r, g, b) = match phase {
        Phase::Idle | Phase::Displaying => (0x22, 0xBB, 0x44), // green
        Phase::Capturing | Phase::Analyzing => (0xCC, 0x99, 0x00), // amber
        Phase::Error => (0xCC, 0x22, 0x22),                    // red
    };

    let center = (size / 2) as f64;
    let radius = 30.0f64;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            if dx * dx + dy * dy <= radius * radius {
                let idx = ((y * size + x) * 4) as usize;
                rgba[idx] = r;
                rgba[idx + 1] = g;
                rgba[idx + 2] = b;
                rgba[idx + 3] = 255;
            }
        }
    }

    Icon::from_rgba(rgba, size, size).expect("failed to create icon")
}

fn tooltip(provider: Provider) -> String {
    format!("snapquiz ({})", provider.as_str().to_uppercase())
}

/// Build the tray icon with its menu.
pub fn build_tray(provider: Provider) -> Result<(TrayIcon, TrayMenuIds)> {
    let menu = Menu::new();
    let label = MenuItem::new("snapquiz", false, None);
    let capture = MenuItem::new("Capture Now", true, None);
    let show_results = MenuItem::new("Show Results", true, None);
    let show_history = MenuItem::new("Show Answer History", true, None);
    let switch_provider = MenuItem::new("Switch Provider", true, None);
    let reset_history = MenuItem::new("Reset Answer History", true, None);
    let clear_all = MenuItem::new("Clear Answers && Logs", true, None);
    let quit = MenuItem::new("Quit", true, None);

    let menu_ids = TrayMenuIds {
        capture: capture.id().clone(),
        show_results: show_results.id().clone(),
        show_history: show_history.id().clone(),
        switch_provider: switch_provider.id().clone(),
        reset_history: reset_history.id().clone(),
        clear_all: clear_all.id().clone(),
        quit: quit.id().clone(),
    };

    menu.append(&label).context("menu append label")?;
    menu.append(&PredefinedMenuItem::separator()).context("menu append separator")?;
    menu.append(&capture).context("menu append capture")?;
    menu.append(&show_results).context("menu append results")?;
    menu.append(&show_history).context("menu append history")?;
    menu.append(&PredefinedMenuItem::separator()).context("menu append separator 2")?;
    menu.append(&switch_provider).context("menu append switch")?;
    menu.append(&reset_history).context("menu append reset")?;
    menu.append(&clear_all).context("menu append clear")?;
    menu.append(&PredefinedMenuItem::separator()).context("menu append separator 3")?;
    menu.append(&quit).context("menu append quit")?;

    let tray = TrayIconBuilder::new()
        .with_icon(make_icon(Phase::Idle))
        .with_tooltip(tooltip(provider))
        .with_menu(Box::new(menu))
        .build()
        .context("build tray icon")?;

    Ok((tray, menu_ids))
}

/// Refresh the icon color and tooltip to the current phase and provider.
pub fn update_tray(tray: &TrayIcon, phase: Phase, provider: Provider) -> Result<()> {
    tray.set_icon(Some(make_icon(phase))).context("set tray icon")?;
    tray.set_tooltip(Some(tooltip(provider))).context("set tray tooltip")?;
    Ok(())
}
