//! Concurrent import tests
//!
//! Several threads import into the same sheet file at once. Each one takes
//! the import lock, opens its own DuckDB sheet, commits and releases. No
//! import may be lost and no row may be duplicated.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use tempfile::TempDir;

use ledgerline_core::adapters::csv::read_batch;
use ledgerline_core::adapters::duckdb::DuckDbSheet;
use ledgerline_core::services::import::commit;
use ledgerline_core::services::ImportLock;
use ledgerline_core::{ImportContext, Rect, SheetStore, Value};

/// Number of concurrent importers
const THREAD_COUNT: usize = 4;

/// Imports per thread
const ITERATIONS_PER_THREAD: usize = 3;

/// Give up on the lock after this long
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

fn header() -> Vec<Value> {
    ["", "Date", "Amount", "Description", "Transaction ID", "Date Added"]
        .iter()
        .map(|s| Value::text(*s))
        .collect()
}

fn acquire_with_retry(dir: &std::path::Path) -> ImportLock {
    let start = Instant::now();
    loop {
        match ImportLock::acquire(dir) {
            Ok(lock) => return lock,
            Err(_) if start.elapsed() < LOCK_TIMEOUT => thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("Timed out waiting for the import lock: {}", e),
        }
    }
}

#[test]
fn test_concurrent_imports_are_serialized() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sheet.duckdb");
    DuckDbSheet::create(&db_path, "Transactions", Tz::UTC, &header(), 1)
        .expect("Failed to create sheet");

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let dir = Arc::new(temp_dir.path().to_path_buf());
    let error_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let dir = Arc::clone(&dir);
        let error_count = Arc::clone(&error_count);

        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD {
                let _lock = acquire_with_retry(&dir);
                let result = DuckDbSheet::open(&dir.join("sheet.duckdb"), "Transactions").and_then(|mut sheet| {
                    let csv = format!(
                        "Transaction ID,Date,Amount,Description\nt{thread_id}-{i},2024-01-{:02},-{i},COFFEE\n",
                        thread_id + 1
                    );
                    let batch = read_batch(csv.as_bytes())?;
                    let ctx = ImportContext::new(Tz::UTC, Tz::UTC, Utc::now());
                    commit(&mut sheet, batch, &ctx)
                });
                if let Err(e) = result {
                    eprintln!("Thread {}: import {} failed: {}", thread_id, i, e);
                    error_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(error_count.load(Ordering::SeqCst), 0);

    let sheet = DuckDbSheet::open(&db_path, "Transactions").unwrap();
    let expected = THREAD_COUNT * ITERATIONS_PER_THREAD;
    assert_eq!(sheet.last_row().unwrap(), expected + 1);

    let ids = sheet.get_values(Rect::new(1, 4, expected, 1)).unwrap();
    let mut ids: Vec<String> = ids.into_iter().map(|row| row[0].to_string()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), expected);

    // newest first after every commit
    let dates = sheet.get_values(Rect::new(1, 1, expected, 1)).unwrap();
    assert!(dates
        .windows(2)
        .all(|w| w[0][0].sort_cmp(&w[1][0]) != std::cmp::Ordering::Less));
    let first = Utc.with_ymd_and_hms(2024, 1, THREAD_COUNT as u32, 0, 0, 0).unwrap();
    assert_eq!(dates[0][0], Value::Timestamp(first));
}
