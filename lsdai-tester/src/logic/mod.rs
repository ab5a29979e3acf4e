pub mod harness;
pub mod prefs;
pub mod reports;
pub mod tester;

pub use harness::{HarnessController, HarnessOptions, LogicHarness};
pub use tester::{LogicTester, ScenarioResult};
