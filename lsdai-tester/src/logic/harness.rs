use lsdai_core::{
    Catalog, Controller, ControllerConfig, MemoryPreferences, Notice, PreferenceStore,
    RenderBridge, SimulatedTransfer, SimulationConfig, Sleeper, ViewSnapshot,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use super::prefs::FilePreferences;

const CATALOG_JSON: &str = include_str!("../../../lsdai-web/static/data/catalog.json");

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep_ms(&self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
    }
}

/// Keeps every snapshot and notice the controller pushes.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    frames: Rc<RefCell<Vec<ViewSnapshot>>>,
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingBridge {
    pub fn frames(&self) -> Vec<ViewSnapshot> {
        self.frames.borrow().clone()
    }

    pub fn last(&self) -> Option<ViewSnapshot> {
        self.frames.borrow().last().cloned()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl RenderBridge for RecordingBridge {
    fn render(&self, snapshot: &ViewSnapshot) {
        self.frames.borrow_mut().push(snapshot.clone());
    }

    fn notify(&self, notice: &Notice) {
        log::debug!("notice: {}", notice.message());
        self.notices.borrow_mut().push(notice.clone());
    }
}

/// Preference backend chosen on the command line.
#[derive(Debug, Clone)]
pub enum HarnessPrefs {
    Memory(MemoryPreferences),
    File(FilePreferences),
}

impl PreferenceStore for HarnessPrefs {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self {
            Self::Memory(prefs) => prefs.get(key),
            Self::File(prefs) => prefs.get(key),
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> bool {
        match self {
            Self::Memory(prefs) => prefs.set(key, value),
            Self::File(prefs) => prefs.set(key, value),
        }
    }
}

pub type HarnessController = Controller<HarnessPrefs, RecordingBridge>;

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub tick_ms: u32,
    pub failure_rate: f64,
    pub prefs_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            tick_ms: 2,
            failure_rate: 0.0,
            prefs_file: None,
            verbose: false,
        }
    }
}

/// Builds controllers wired to the bundled catalog for one scenario iteration.
#[derive(Debug, Clone)]
pub struct LogicHarness {
    options: HarnessOptions,
    catalog: Rc<Catalog>,
    seed: u64,
    prefs: HarnessPrefs,
}

impl LogicHarness {
    /// # Errors
    ///
    /// Returns an error if the bundled catalog cannot be parsed.
    pub fn new(options: HarnessOptions, seed: u64) -> anyhow::Result<Self> {
        let catalog = Rc::new(Catalog::from_json(CATALOG_JSON)?);
        let prefs = match &options.prefs_file {
            Some(path) => HarnessPrefs::File(FilePreferences::open(path)?),
            None => HarnessPrefs::Memory(MemoryPreferences::default()),
        };
        Ok(Self {
            options,
            catalog,
            seed,
            prefs,
        })
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub const fn verbose(&self) -> bool {
        self.options.verbose
    }

    pub fn catalog(&self) -> Rc<Catalog> {
        Rc::clone(&self.catalog)
    }

    pub fn prefs(&self) -> &HarnessPrefs {
        &self.prefs
    }

    pub fn config(&self) -> ControllerConfig {
        ControllerConfig {
            simulation: self.simulation(self.options.failure_rate),
            ..ControllerConfig::default()
        }
    }

    pub fn simulation(&self, failure_rate: f64) -> SimulationConfig {
        SimulationConfig {
            tick_ms: self.options.tick_ms,
            failure_rate,
            ..SimulationConfig::default()
        }
    }

    /// Controller over this harness's preferences with the catalog attached.
    pub fn controller(&self) -> (HarnessController, RecordingBridge) {
        let bridge = RecordingBridge::default();
        let controller = Controller::new(self.config(), self.prefs.clone(), bridge.clone());
        controller.attach_catalog(self.catalog());
        (controller, bridge)
    }

    /// Controller over `catalog` with empty in-memory preferences.
    pub fn isolated_controller(&self, catalog: Rc<Catalog>) -> (HarnessController, RecordingBridge) {
        let bridge = RecordingBridge::default();
        let prefs = HarnessPrefs::Memory(MemoryPreferences::default());
        let controller = Controller::new(self.config(), prefs, bridge.clone());
        controller.attach_catalog(catalog);
        (controller, bridge)
    }

    pub fn transfer(&self) -> SimulatedTransfer<TokioSleeper> {
        SimulatedTransfer::new(TokioSleeper, self.config().simulation, self.seed)
    }

    pub fn transfer_with_failure_rate(&self, failure_rate: f64) -> SimulatedTransfer<TokioSleeper> {
        SimulatedTransfer::new(TokioSleeper, self.simulation(failure_rate), self.seed)
    }
}
