//! Benchmark utilities.

use driftsync_protocol::SyncRecord;
use driftsync_testkit::record;
use rand::Rng;
use serde_json::json;

/// Generate a batch of records for one user across the given device count.
pub fn generate_records(user_id: &str, count: usize, devices: usize) -> Vec<SyncRecord> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let device = format!("d{}", i % devices.max(1));
            record(user_id, &format!("r{}", i))
                .device(&device)
                .timestamp(rng.gen_range(1..1_000_000))
                .version(rng.gen_range(1..100))
                .data(json!({"text": random_text(&mut rng, 64)}))
                .build()
        })
        .collect()
}

/// Generate a random ASCII payload string.
pub fn random_text(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}
