// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use mlfeed::records::recordio::encode_record;
use mlfeed::{DataReader, DataStore, Example, File, InMemoryStore, RecordKind};

/// A unique temp-file path for a fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "mlfeed-test-{}-{}-{}",
        std::process::id(),
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Write `contents` to a fixture file and return a store over it.
pub fn file_store(name: &str, contents: &[u8]) -> (PathBuf, Arc<dyn DataStore>) {
    let path = fixture_path(name);
    std::fs::write(&path, contents).unwrap();

    let store: Arc<dyn DataStore> = Arc::new(File::new(&path));

    (path, store)
}

/// A store over bytes kept in memory.
pub fn memory_store(contents: &[u8]) -> Arc<dyn DataStore> {
    Arc::new(InMemoryStore::from_bytes(contents))
}

/// A store over `lines`, one text line each.
pub fn line_store(lines: &[&str]) -> Arc<dyn DataStore> {
    let mut bytes = Vec::new();
    for line in lines {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }

    memory_store(&bytes)
}

/// A store over `count` numbered text lines (`line-0` ... `line-N`).
pub fn numbered_line_store(count: usize) -> Arc<dyn DataStore> {
    let lines: Vec<String> = (0..count).map(|i| format!("line-{i}")).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

    line_store(&refs)
}

/// A store over RecordIO frames.
pub fn recordio_store(frames: &[(RecordKind, &[u8])]) -> Arc<dyn DataStore> {
    let mut bytes = Vec::new();
    for (kind, payload) in frames {
        bytes.extend_from_slice(&encode_record(*kind, payload));
    }

    memory_store(&bytes)
}

/// The strings of an example's single `value` feature.
pub fn value_strings(example: &Example) -> Vec<String> {
    example
        .feature("value")
        .expect("the example has no 'value' feature")
        .as_dense()
        .expect("the 'value' feature is not dense")
        .data()
        .as_strings()
        .expect("the 'value' feature is not a string tensor")
        .to_vec()
}

/// Drain a reader into the string batches of its `value` feature.
pub fn drain_value_strings(reader: &mut dyn mlfeed::DataReader) -> Vec<Vec<String>> {
    let mut batches = Vec::new();

    while let Some(example) = reader.read_example().unwrap() {
        batches.push(value_strings(&example));
    }

    batches
}
