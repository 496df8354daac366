//! TAP (Test Anything Protocol) harness for running tests on the device.
//!
//! Unit tests run on the host with `cargo test`. The same state machines
//! also need checking on the board (or under QEMU), where libtest is not
//! available. Functions marked `#[tap_test]` are collected with
//! `inventory` and executed by the `device-tests` binary, which prints
//! TAP version 14 on the serial console.
//!
//! Only compiled with the `tap-tests` feature.
//!
//! ```ignore
//! #[cfg(feature = "tap-tests")]
//! mod tap_tests {
//!     use super::*;
//!     use reachability_rs_esp32_macros::tap_test;
//!
//!     #[tap_test]
//!     fn unknown_formats_as_na() {
//!         assert_eq!(format_duration(None), "NA");
//!     }
//!
//!     #[tap_test(should_panic)]
//!     fn jump_past_end_panics_when_unwrapped() {
//!         let ring = RotationRing::new([1, 2]).unwrap();
//!         ring.iterator().jump(2).unwrap();
//!     }
//! }
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe, UnwindSafe};

pub use inventory;

/// Return type of fallible TAP tests.
pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Runs one registered test against a runner.
pub type TestRegisterFn = fn(&mut TestRunner);

/// A test registered by `#[tap_test]`.
pub struct TapTestEntry {
    pub name: &'static str,
    pub register: TestRegisterFn,
}

impl TapTestEntry {
    pub const fn new(name: &'static str, register: TestRegisterFn) -> Self {
        Self { name, register }
    }
}

inventory::collect!(TapTestEntry);

/// Number of registered tests.
pub fn test_count() -> usize {
    inventory::iter::<TapTestEntry>.into_iter().count()
}

/// Run every registered test. Returns true if all passed.
pub fn run_all_tests() -> bool {
    let mut runner = TestRunner::new();
    runner.print_header(test_count());
    for entry in inventory::iter::<TapTestEntry> {
        (entry.register)(&mut runner);
    }
    runner.finish()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Counts results and prints TAP lines.
#[derive(Debug, Default)]
pub struct TestRunner {
    run: usize,
    passed: usize,
    failed: usize,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn pass(&mut self, name: &str) {
        self.run += 1;
        self.passed += 1;
        println!("ok {} - {}", self.run, name);
    }

    fn fail(&mut self, name: &str, diagnostic: &str) {
        self.run += 1;
        self.failed += 1;
        println!("not ok {} - {}", self.run, name);
        println!("# {}", diagnostic);
    }

    /// Run a fallible test. An `Err` or a panic is a failure.
    pub fn run<F>(&mut self, name: &str, test_fn: F)
    where
        F: FnOnce() -> TestResult + UnwindSafe,
    {
        match catch_unwind(AssertUnwindSafe(test_fn)) {
            Ok(Ok(())) => self.pass(name),
            Ok(Err(e)) => self.fail(name, &format!("Error: {}", e)),
            Err(payload) => self.fail(name, &format!("Panic: {}", panic_message(&*payload))),
        }
    }

    /// Run a test that signals failure by panicking.
    pub fn run_assert<F>(&mut self, name: &str, test_fn: F)
    where
        F: FnOnce() + UnwindSafe,
    {
        self.run(name, || {
            test_fn();
            Ok(())
        });
    }

    /// Run a test that must panic, optionally with a message containing
    /// `expected`.
    pub fn run_should_panic<F>(&mut self, name: &str, test_fn: F, expected: Option<&str>)
    where
        F: FnOnce() + UnwindSafe,
    {
        let payload = match catch_unwind(AssertUnwindSafe(test_fn)) {
            Ok(()) => return self.fail(name, "Expected panic but test completed normally"),
            Err(payload) => payload,
        };
        let message = panic_message(&*payload);
        match expected {
            Some(fragment) if !message.contains(fragment) => self.fail(
                name,
                &format!("Expected panic containing '{}', got '{}'", fragment, message),
            ),
            _ => self.pass(name),
        }
    }

    /// Print the TAP version line and plan.
    pub fn print_header(&self, planned: usize) {
        println!("TAP version 14");
        println!("1..{}", planned);
    }

    /// Print a diagnostic line.
    pub fn comment(msg: &str) {
        println!("# {}", msg);
    }

    /// Print the summary. Returns true if nothing failed.
    pub fn finish(&self) -> bool {
        println!("# -----------------------");
        println!("# Tests run: {}", self.run);
        println!("# Passed: {}", self.passed);
        println!("# Failed: {}", self.failed);
        let ok = self.failed == 0;
        println!("# Result: {}", if ok { "PASS" } else { "FAIL" });
        ok
    }

    pub fn tests_run(&self) -> usize {
        self.run
    }

    pub fn tests_passed(&self) -> usize {
        self.passed
    }

    pub fn tests_failed(&self) -> usize {
        self.failed
    }
}

// The harness checks itself.
mod tap_tests {
    use super::*;
    use reachability_rs_esp32_macros::tap_test;

    #[tap_test]
    fn runner_counts_results() {
        let mut runner = TestRunner::new();
        runner.run("pass", || Ok(()));
        runner.run("fail", || Err("boom".into()));
        runner.run_assert("panic", || panic!("intentional"));
        assert_eq!(runner.tests_run(), 3);
        assert_eq!(runner.tests_passed(), 1);
        assert_eq!(runner.tests_failed(), 2);
    }

    #[tap_test]
    fn runner_checks_panic_message() {
        let mut runner = TestRunner::new();
        runner.run_should_panic("matches", || panic!("index out of range"), Some("range"));
        runner.run_should_panic("mismatch", || panic!("other"), Some("range"));
        runner.run_should_panic("no panic", || {}, None);
        assert_eq!(runner.tests_passed(), 1);
        assert_eq!(runner.tests_failed(), 2);
    }
}
