//! Property-based tests (fuzzing) for forwarder resilience.
//!
//! Random interleavings of collector reachability, delivery outcomes and
//! store failures must never lose a sample, and garbage on the input bus
//! must never panic the adapter.
//!
//! Run with: `cargo test --test proptest_fuzz`

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use proptest::prelude::*;
use tokio::io::BufReader;

use telemetry_forwarder::{JsonLinesSource, SampleSource};

use common::{seqs, test_config, FailingStore, Harness};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// One tick's worth of environment.
#[derive(Debug, Clone, Copy)]
struct Step {
    reachable: bool,
    accepting: bool,
    append_ok: bool,
    read_ok: bool,
    clear_ok: bool,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (any::<bool>(), any::<bool>(), prop::bool::weighted(0.8), prop::bool::weighted(0.9), prop::bool::weighted(0.8))
        .prop_map(|(reachable, accepting, append_ok, read_ok, clear_ok)| Step {
            reachable,
            accepting,
            append_ok,
            read_ok,
            clear_ok,
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every sampled fix is, at every point, delivered, stored, or buffered;
    /// once conditions are good everything ends up delivered.
    #[test]
    fn prop_no_sample_is_ever_lost(
        buffer_size in 1usize..6,
        steps in prop::collection::vec(step_strategy(), 1..40),
    ) {
        runtime().block_on(async {
            let store = FailingStore::new();
            let mut h = Harness::new(test_config(buffer_size), store.clone()).await;

            let mut sampled = 0u32;
            for step in &steps {
                h.probe.set(step.reachable);
                h.collector.set_accepting(step.accepting);
                store.fail_append.store(!step.append_ok, Ordering::SeqCst);
                store.fail_read.store(!step.read_ok, Ordering::SeqCst);
                store.fail_clear.store(!step.clear_ok, Ordering::SeqCst);

                sampled += 1;
                h.send_fix(sampled);
                let _ = h.engine.tick().await;

                let mut seen: BTreeSet<u32> = h.collector.received_seqs().into_iter().collect();
                seen.extend(seqs(&store.samples()));
                prop_assert!(
                    seen.len() + h.engine.buffer_len() >= sampled as usize,
                    "samples went missing after tick {}", sampled
                );
            }

            // Everything healthy: one tick flushes memory, drains the store.
            h.probe.set(true);
            h.collector.set_accepting(true);
            store.fail_append.store(false, Ordering::SeqCst);
            store.fail_read.store(false, Ordering::SeqCst);
            store.fail_clear.store(false, Ordering::SeqCst);
            h.engine.tick().await.unwrap();

            let delivered: BTreeSet<u32> = h.collector.received_seqs().into_iter().collect();
            let expected: BTreeSet<u32> = (1..=sampled).collect();
            prop_assert_eq!(delivered, expected);
            prop_assert!(store.samples().is_empty());
            prop_assert_eq!(h.engine.buffer_len(), 0);
            Ok(())
        })?;
    }

    /// Stored rows are re-delivered oldest first, every time.
    #[test]
    fn prop_backlog_drains_in_insertion_order(
        count in 1u32..30,
        buffer_size in 1usize..5,
    ) {
        runtime().block_on(async {
            let mut h = Harness::in_memory(buffer_size).await;
            h.probe.set(false);

            for n in 1..=count {
                h.send_fix(n);
                h.engine.tick().await.unwrap();
            }
            let stored = h.stored_seqs().await;
            prop_assert!(stored.windows(2).all(|w| w[0] < w[1]));

            h.probe.set(true);
            h.engine.tick().await.unwrap();

            let received = h.collector.received_seqs();
            let buffered = count as usize - stored.len();
            // Memory flush first, then the backlog.
            prop_assert_eq!(&received[buffered..], &stored[..]);
            prop_assert_eq!(received.len(), count as usize);
            Ok(())
        })?;
    }

    /// Arbitrary bus input never panics and never yields a fix that was not sent.
    #[test]
    fn prop_json_lines_source_survives_garbage(lines in prop::collection::vec(".{0,80}", 0..20)) {
        runtime().block_on(async {
            let input = lines.join("\n");
            let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()), 1.0);

            source.device_mode().await;
            let sample = source.poll_sample(Duration::from_millis(5)).await;
            if let Some(sample) = sample {
                prop_assert!(sample.lat.is_some());
                prop_assert!(input.contains("fix"));
            }
            Ok(())
        })?;
    }
}
