// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end tests for the instance reader chain: range selection,
//! shard disjointness, sampling, and deterministic shuffling.

mod common;

use common::{drain_value_strings, numbered_line_store};
use mlfeed::{DataReader, ReaderOptions, TextLineReader};

fn read_all_lines(options: ReaderOptions) -> Vec<String> {
    let mut reader = TextLineReader::new(options).unwrap();

    drain_value_strings(&mut reader).into_iter().flatten().collect()
}

#[test]
fn test_skip_and_limit() {
    let options = ReaderOptions::new(vec![numbered_line_store(10)])
        .with_batch_size(2)
        .with_num_instances_to_skip(3)
        .with_num_instances_to_read(4);

    assert_eq!(
        read_all_lines(options),
        vec!["line-3", "line-4", "line-5", "line-6"]
    );
}

#[test]
fn test_shards_are_disjoint_and_complete() {
    const NUM_INSTANCES: usize = 100;
    const NUM_SHARDS: u64 = 4;

    let mut shards = Vec::new();
    for shard_index in 0..NUM_SHARDS {
        let options = ReaderOptions::new(vec![numbered_line_store(NUM_INSTANCES)])
            .with_batch_size(5)
            .with_shard(shard_index, NUM_SHARDS);

        let lines = read_all_lines(options);
        assert_eq!(lines.len(), NUM_INSTANCES / NUM_SHARDS as usize);

        shards.push(lines);
    }

    // Interleaving the shards round-robin reproduces the original
    // sequence, which also proves pairwise disjointness.
    let mut interleaved = Vec::new();
    for position in 0..NUM_INSTANCES / NUM_SHARDS as usize {
        for shard in &shards {
            interleaved.push(shard[position].clone());
        }
    }

    let expected: Vec<String> = (0..NUM_INSTANCES).map(|i| format!("line-{i}")).collect();
    assert_eq!(interleaved, expected);
}

#[test]
fn test_invalid_shard_index_fails_at_construction() {
    let options = ReaderOptions::new(vec![numbered_line_store(10)]).with_shard(4, 4);

    assert!(TextLineReader::new(options).is_err());
}

#[test]
fn test_sampling_keeps_the_configured_share() {
    let options = ReaderOptions::new(vec![numbered_line_store(200)])
        .with_batch_size(10)
        .with_sample_ratio(0.25);

    // Two full sampling blocks of 100, 25 kept from each.
    assert_eq!(read_all_lines(options).len(), 50);
}

#[test]
fn test_invalid_sample_ratio_fails_at_construction() {
    let options = ReaderOptions::new(vec![numbered_line_store(10)]).with_sample_ratio(1.0);

    assert!(TextLineReader::new(options).is_err());
}

#[test]
fn test_shuffle_with_fixed_seed_replays_identically() {
    let options = ReaderOptions::new(vec![numbered_line_store(64)])
        .with_batch_size(4)
        .with_shuffle_window(8)
        .with_shuffle_seed(42)
        .with_reshuffle_each_epoch(false);

    let mut reader = TextLineReader::new(options).unwrap();

    let first_epoch = drain_value_strings(&mut reader);
    reader.reset();
    let second_epoch = drain_value_strings(&mut reader);

    assert_eq!(first_epoch, second_epoch);

    // The shuffle emits a permutation of the input.
    let mut lines: Vec<String> = first_epoch.into_iter().flatten().collect();
    assert_eq!(lines.len(), 64);
    lines.sort();
    lines.dedup();
    assert_eq!(lines.len(), 64);
}

#[test]
fn test_reshuffle_each_epoch_changes_the_order() {
    let options = ReaderOptions::new(vec![numbered_line_store(128)])
        .with_batch_size(4)
        .with_shuffle_window(16)
        .with_shuffle_seed(42)
        .with_reshuffle_each_epoch(true);

    let mut reader = TextLineReader::new(options).unwrap();

    let first_epoch = drain_value_strings(&mut reader);
    reader.reset();
    let second_epoch = drain_value_strings(&mut reader);

    assert_ne!(first_epoch, second_epoch);
}

#[test]
fn test_layer_composition_order() {
    // Skip applies before sharding: shard 0 of 2 over lines 2..8.
    let options = ReaderOptions::new(vec![numbered_line_store(8)])
        .with_batch_size(3)
        .with_num_instances_to_skip(2)
        .with_shard(0, 2);

    assert_eq!(read_all_lines(options), vec!["line-2", "line-4", "line-6"]);
}
