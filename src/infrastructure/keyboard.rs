//! Terminal keyboard input.
//!
//! Key events are read on a dedicated OS thread and fed straight into the
//! [`EventBridge`]; that thread never waits on Bluetooth I/O.

use crate::bridge::EventBridge;
use crate::domain::models::{Direction, RawKeyEvent};
use crate::infrastructure::logging;
use crate::session::Interrupt;
use async_trait::async_trait;
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Without release reporting a held key shows up as a stream of auto-repeat
/// presses. A key with no press for this long counts as released.
const LEGACY_HOLD_TIMEOUT: Duration = Duration::from_millis(700);

/// The input-source collaborator: installs the bridge as the key callback.
#[async_trait]
pub trait KeyInput: Send {
    fn install(&mut self, bridge: EventBridge, interrupt: Interrupt) -> anyhow::Result<()>;

    /// Remove the hook. Must be safe to call when nothing is installed.
    async fn uninstall(&mut self);
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    Forward(RawKeyEvent),
    Interrupt,
    Ignore,
}

/// Name reported for a key code, matching [`Direction::from_key_name`] for arrows.
pub fn key_name(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Up => Some("up".to_string()),
        KeyCode::Down => Some("down".to_string()),
        KeyCode::Left => Some("left".to_string()),
        KeyCode::Right => Some("right".to_string()),
        KeyCode::Enter => Some("enter".to_string()),
        KeyCode::Char(' ') => Some("space".to_string()),
        KeyCode::Char(c) => Some(c.to_lowercase().to_string()),
        _ => None,
    }
}

pub fn translate(event: &KeyEvent) -> KeyAction {
    let is_press = matches!(event.kind, KeyEventKind::Press | KeyEventKind::Repeat);

    // Raw mode turns Ctrl+C into an ordinary key event.
    if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
        return if is_press {
            KeyAction::Interrupt
        } else {
            KeyAction::Ignore
        };
    }
    if event.code == KeyCode::Esc {
        return if is_press {
            KeyAction::Interrupt
        } else {
            KeyAction::Ignore
        };
    }

    let Some(name) = key_name(event.code) else {
        return KeyAction::Ignore;
    };
    if is_press {
        KeyAction::Forward(RawKeyEvent::pressed(name))
    } else {
        KeyAction::Forward(RawKeyEvent::released(name))
    }
}

/// Synthesizes releases on terminals that only report presses.
#[derive(Debug, Default)]
pub struct ReleaseEmulator {
    last_press: [Option<Instant>; 4],
}

impl ReleaseEmulator {
    pub fn pressed(&mut self, direction: Direction, now: Instant) {
        self.last_press[direction.index()] = Some(now);
    }

    /// Directions whose presses stopped arriving, each reported once.
    pub fn expired(&mut self, now: Instant) -> Vec<Direction> {
        let mut released = Vec::new();
        for direction in Direction::ALL {
            let slot = &mut self.last_press[direction.index()];
            if let Some(at) = *slot {
                if now.duration_since(at) >= LEGACY_HOLD_TIMEOUT {
                    *slot = None;
                    released.push(direction);
                }
            }
        }
        released
    }
}

/// Raw mode plus optional release reporting, undone on drop.
struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        logging::set_raw_terminal(true);
        let mut guard = Self { enhanced: false };

        if matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            guard.enhanced = true;
        } else {
            warn!(
                "Terminal does not report key releases, a key counts as released {}ms after its last repeat",
                LEGACY_HOLD_TIMEOUT.as_millis()
            );
        }
        execute!(io::stdout(), EnableFocusChange)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = execute!(io::stdout(), DisableFocusChange);
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to restore terminal: {}", e);
        }
        logging::set_raw_terminal(false);
    }
}

/// crossterm-backed keyboard hook.
#[derive(Default)]
pub struct TerminalKeyboard {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stopped: Option<oneshot::Receiver<()>>,
}

impl TerminalKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Keyboard thread panicked");
            }
            debug!("Keyboard hook removed");
        }
    }
}

#[async_trait]
impl KeyInput for TerminalKeyboard {
    fn install(&mut self, bridge: EventBridge, interrupt: Interrupt) -> anyhow::Result<()> {
        if self.thread.is_some() {
            anyhow::bail!("keyboard hook already installed");
        }

        let guard = TerminalGuard::enter()?;
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = stop.clone();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        let handle = std::thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || {
                let legacy = !guard.enhanced;
                listen(bridge, &interrupt, &stop, legacy);
                drop(guard);
                let _ = stopped_tx.send(());
            })?;
        self.thread = Some(handle);
        self.stopped = Some(stopped_rx);

        info!("Use arrow keys to control robot (Esc or Ctrl+C to quit)");
        Ok(())
    }

    async fn uninstall(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Wait without blocking the runtime; the join below is then immediate.
        if let Some(stopped) = self.stopped.take() {
            let _ = stopped.await;
        }
        self.join();
    }
}

impl Drop for TerminalKeyboard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.join();
    }
}

fn listen(mut bridge: EventBridge, interrupt: &Interrupt, stop: &AtomicBool, legacy: bool) {
    let mut emulator = legacy.then(ReleaseEmulator::default);

    while !stop.load(Ordering::Acquire) {
        if let Some(emulator) = emulator.as_mut() {
            for direction in emulator.expired(Instant::now()) {
                bridge.on_event(RawKeyEvent::released(direction.key_name()));
            }
        }

        match event::poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                error!("Keyboard poll failed: {}", e);
                break;
            }
        }

        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                error!("Keyboard read failed: {}", e);
                break;
            }
        };

        match event {
            Event::Key(key) => match translate(&key) {
                KeyAction::Forward(raw) => {
                    if let (Some(emulator), Some(direction)) =
                        (emulator.as_mut(), Direction::from_key_name(&raw.key))
                    {
                        emulator.pressed(direction, Instant::now());
                    }
                    bridge.on_event(raw);
                }
                KeyAction::Interrupt => interrupt.trigger(),
                KeyAction::Ignore => {}
            },
            // Releases that happen while unfocused are never reported.
            Event::FocusLost => bridge.release_all(),
            _ => {}
        }
    }

    bridge.release_all();
    debug!("Keyboard listener stopped");
}
