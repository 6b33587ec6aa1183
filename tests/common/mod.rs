#![allow(dead_code)]

use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;

pub use stagerun_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Write `contents` to a fresh temporary `.toml` file.
pub fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    write!(file, "{contents}").expect("write temp config");
    file
}
