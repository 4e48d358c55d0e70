//! Global hotkeys — Alt-chords from config, plus fixed Delete / Backquote.

use std::collections::HashSet;

use anyhow::{Context, Result};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::GlobalHotKeyManager;

use crate::config::HotkeyConfig;

/// What a hotkey (or tray menu item) asks the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Capture,
    ShowResults,
    ShowHistory,
    ResetHistory,
    SwitchProvider,
    ClearAll,
    Exit,
}

/// Registered hotkey ids mapped back to their actions.
pub struct HotkeyMap {
    bindings: Vec<(u32, HotkeyAction)>,
}

impl HotkeyMap {
    pub fn action(&self, id: u32) -> Option<HotkeyAction> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == id)
            .map(|(_, action)| *action)
    }
}

/// Build the bindings the config asks for. Pure, so it can be tested
/// without touching the OS hotkey table.
fn binding_plan(cfg: &HotkeyConfig) -> Vec<(HotKey, HotkeyAction)> {
    let configured = [
        (&cfg.capture, HotkeyAction::Capture),
        (&cfg.results, HotkeyAction::ShowResults),
        (&cfg.history, HotkeyAction::ShowHistory),
        (&cfg.reset, HotkeyAction::ResetHistory),
        (&cfg.switch, HotkeyAction::SwitchProvider),
    ];

    let mut plan = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    for (letter, action) in configured {
        let normalized = letter.trim().to_lowercase();
        match letter_code(&normalized) {
            Some(code) if used.insert(normalized) => {
                plan.push((HotKey::new(Some(Modifiers::ALT), code), action));
            }
            Some(_) => {
                log::warn!("Hotkey letter {letter:?} bound twice, keeping the first binding");
            }
            None => {
                log::warn!("Invalid hotkey letter {letter:?} for {action:?}, skipping");
            }
        }
    }

    // Fixed bindings, matching the console help text.
    plan.push((HotKey::new(None, Code::Delete), HotkeyAction::ClearAll));
    plan.push((HotKey::new(None, Code::Backquote), HotkeyAction::Exit));
    plan
}

/// Register every binding. Individual failures (another app already owns
/// the chord) are logged and skipped rather than aborting startup.
pub fn setup_hotkeys(cfg: &HotkeyConfig) -> Result<(GlobalHotKeyManager, HotkeyMap)> {
    let manager = GlobalHotKeyManager::new().context("create hotkey manager")?;
    let mut bindings = Vec::new();
    for (hotkey, action) in binding_plan(cfg) {
        let id = hotkey.id();
        match manager.register(hotkey) {
            Ok(()) => bindings.push((id, action)),
            Err(e) => log::warn!("Failed to register hotkey for {action:?}: {e}"),
        }
    }
    if bindings.is_empty() {
        anyhow::bail!("no hotkeys could be registered");
    }
    Ok((manager, HotkeyMap { bindings }))
}

fn letter_code(letter: &str) -> Option<Code> {
    let mut chars = letter.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = match c {
        'a' => Code::KeyA,
        'b' => Code::KeyB,
        'c' => Code::KeyC,
        'd' => Code::KeyD,
        'e' => Code::KeyE,
        'f' => Code::KeyF,
        'g' => Code::KeyG,
        'h' => Code::KeyH,
        'i' => Code::KeyI,
        'j' => Code::KeyJ,
        'k' => Code::KeyK,
        'l' => Code::KeyL,
        'm' => Code::KeyM,
        'n' => Code::KeyN,
        'o' => Code::KeyO,
        'p' => Code::KeyP,
        'q' => Code::KeyQ,
        'r' => Code::KeyR,
        's' => Code::KeyS,
        't' => Code::KeyT,
        'u' => Code::KeyU,
        'v' => Code::KeyV,
        'w' => Code::KeyW,
        'x' => Code::KeyX,
        'y' => Code::KeyY,
        'z' => Code::KeyZ,
        _ => return None,
    };
    Some(code)
}
