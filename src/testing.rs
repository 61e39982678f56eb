//! In-memory transport and input used by the unit tests.

use crate::bridge::EventBridge;
use crate::domain::errors::ControlError;
use crate::domain::models::RawKeyEvent;
use crate::infrastructure::bluetooth::protocol::{DeviceAddress, DRIVE_CHAR_UUID, SERVICE_UUID};
use crate::infrastructure::keyboard::KeyInput;
use crate::session::Interrupt;
use crate::transport::{ConnectTarget, DriveLink, DriveTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub(crate) fn target() -> ConnectTarget {
    ConnectTarget {
        address: DeviceAddress::parse("c0:98:e5:49:00:01").unwrap(),
        timeout: Duration::from_secs(1),
        service: SERVICE_UUID,
        drive_characteristic: DRIVE_CHAR_UUID,
        write_with_response: false,
    }
}

/// Shared record of everything the fake link was asked to do.
#[derive(Default)]
pub(crate) struct LinkProbe {
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    started: AtomicUsize,
    disconnects: AtomicUsize,
    fail_writes: AtomicBool,
    gate: Option<Semaphore>,
}

impl LinkProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Writes block until [`open_gate`](Self::open_gate) is called.
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1000);
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn characteristics(&self) -> Vec<Uuid> {
        self.writes.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub async fn wait_for_started(&self, n: usize) {
        self.wait_until(|| self.started.load(Ordering::SeqCst) >= n)
            .await;
    }

    pub async fn wait_for_completed(&self, n: usize) {
        self.wait_until(|| self.writes.lock().unwrap().len() >= n)
            .await;
    }

    async fn wait_until(&self, done: impl Fn() -> bool) {
        tokio::time::timeout(WAIT_LIMIT, async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

struct FakeLink {
    probe: Arc<LinkProbe>,
}

#[async_trait]
impl DriveLink for FakeLink {
    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), ControlError> {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.probe.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ControlError::ConnectionLost(e.to_string()))?;
        }
        if self.probe.fail_writes.load(Ordering::SeqCst) {
            return Err(ControlError::ConnectionLost("simulated write failure".into()));
        }
        self.probe
            .writes
            .lock()
            .unwrap()
            .push((characteristic, bytes.to_vec()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ControlError> {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum Reachability {
    Reachable,
    TimingOut,
    /// Never finds the device; only an interrupt ends the attempt.
    Stalling,
}

pub(crate) struct FakeTransport {
    probe: Arc<LinkProbe>,
    reachability: Reachability,
    connects: AtomicUsize,
    cancelled: AtomicUsize,
}

impl FakeTransport {
    fn with(probe: Arc<LinkProbe>, reachability: Reachability) -> Self {
        Self {
            probe,
            reachability,
            connects: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn reachable(probe: Arc<LinkProbe>) -> Self {
        Self::with(probe, Reachability::Reachable)
    }

    pub fn timing_out(probe: Arc<LinkProbe>) -> Self {
        Self::with(probe, Reachability::TimingOut)
    }

    pub fn stalling(probe: Arc<LinkProbe>) -> Self {
        Self::with(probe, Reachability::Stalling)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriveTransport for FakeTransport {
    async fn connect(
        &self,
        target: &ConnectTarget,
        interrupt: &Interrupt,
    ) -> Result<Box<dyn DriveLink>, ControlError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.reachability {
            Reachability::Reachable => Ok(Box::new(FakeLink {
                probe: self.probe.clone(),
            })),
            Reachability::TimingOut => Err(ControlError::ConnectionTimeout {
                address: target.address.to_string(),
                timeout: target.timeout,
            }),
            Reachability::Stalling => {
                interrupt.wait().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(ControlError::Cancelled(target.address.to_string()))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum AfterScript {
    Hold,
    Close,
    Interrupt,
}

/// Replays a fixed list of key events from its own thread.
pub(crate) struct ScriptedInput {
    events: Vec<RawKeyEvent>,
    after: AfterScript,
    fail_install: bool,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    installs: usize,
    uninstalls: usize,
}

impl ScriptedInput {
    pub fn new(events: Vec<RawKeyEvent>) -> Self {
        Self {
            events,
            after: AfterScript::Hold,
            fail_install: false,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
            installs: 0,
            uninstalls: 0,
        }
    }

    /// Drop the bridge once the script is done, as a dead input source would.
    pub fn closing_when_done(mut self) -> Self {
        self.after = AfterScript::Close;
        self
    }

    /// Trigger the interrupt once the script is done, like Ctrl+C in raw mode.
    pub fn interrupting_when_done(mut self) -> Self {
        self.after = AfterScript::Interrupt;
        self
    }

    pub fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn installs(&self) -> usize {
        self.installs
    }

    pub fn uninstalls(&self) -> usize {
        self.uninstalls
    }

    pub fn is_installed(&self) -> bool {
        self.thread.is_some()
    }
}

#[async_trait]
impl KeyInput for ScriptedInput {
    fn install(&mut self, mut bridge: EventBridge, interrupt: Interrupt) -> anyhow::Result<()> {
        if self.fail_install {
            anyhow::bail!("no terminal attached");
        }
        self.installs += 1;

        let events = self.events.clone();
        let after = self.after;
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = stop.clone();

        self.thread = Some(std::thread::spawn(move || {
            for event in events {
                bridge.on_event(event);
            }
            match after {
                AfterScript::Close => {
                    bridge.release_all();
                    return;
                }
                AfterScript::Interrupt => interrupt.trigger(),
                AfterScript::Hold => {}
            }
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            bridge.release_all();
        }));
        Ok(())
    }

    async fn uninstall(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.join().expect("scripted input thread panicked");
            self.uninstalls += 1;
        }
    }
}
