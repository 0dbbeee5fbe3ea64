//! Emit a warning when FUSE-dependent tests are skipped.
//!
//! The passthrough tests live in `passthrough_signals.rs` and are gated
//! behind `#[cfg(feature = "fuse")]`. This companion file ensures a
//! visible message is emitted when running `cargo test` without the
//! `fuse` feature, so the missing coverage is not silently hidden.

#[cfg(not(feature = "fuse"))]
#[test]
fn fuse_tests_skipped_warning() {
    eprintln!(
        "\n\x1b[33mwarning\x1b[0m: Skipping passthrough tests: built without `fuse` feature.\n\
         To run them, build with: cargo test --features fuse\n"
    );
}
