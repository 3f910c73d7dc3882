//! End-to-end tests against a live drive service.
//!
//! These tests upload real documents and need application credentials.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DRIVE_CONVERT_CLIENT_ID=… DRIVE_CONVERT_CLIENT_SECRET=… \
//!   DRIVE_CONVERT_TENANT=… DRIVE_CONVERT_DRIVE_URL=… \
//!   cargo test --test e2e -- --nocapture

use drive_convert::{convert_to_file, ConversionConfig, TransferMode};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no document at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn live_config() -> ConversionConfig {
    let var = |name: &str| std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    let mut builder = ConversionConfig::builder()
        .client_id(var("DRIVE_CONVERT_CLIENT_ID"))
        .client_secret(var("DRIVE_CONVERT_CLIENT_SECRET"))
        .tenant(var("DRIVE_CONVERT_TENANT"));
    if let Ok(url) = std::env::var("DRIVE_CONVERT_DRIVE_URL") {
        builder = builder.drive_base_url(url);
    }
    builder.build().expect("valid live config")
}

fn assert_pdf(path: &PathBuf, context: &str) {
    let bytes = std::fs::read(path).expect("output written");
    assert!(bytes.len() > 100, "[{context}] PDF suspiciously short");
    assert_eq!(&bytes[..4], b"%PDF", "[{context}] output is not a PDF");
    println!("[{context}] ✓  {} bytes", bytes.len());
}

// ── Live conversions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_small_docx() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("small.docx"));
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("small.pdf");

    let (written, stats) = convert_to_file(&path, Some(out.as_path()), &live_config())
        .await
        .expect("conversion should succeed");

    assert_eq!(stats.mode, TransferMode::Simple);
    assert!(stats.remote_deleted);
    assert_pdf(&written, "small.docx");
}

#[tokio::test]
async fn test_convert_large_docx() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("large.docx"));
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("large.pdf");

    let (written, stats) = convert_to_file(&path, Some(out.as_path()), &live_config())
        .await
        .expect("conversion should succeed");

    assert_eq!(stats.mode, TransferMode::Chunked);
    assert!(stats.upload_requests > 1);
    assert!(stats.remote_deleted);
    assert_pdf(&written, "large.docx");
}
