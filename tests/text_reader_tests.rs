// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end tests for the text-line reader: batching, last-example
//! handling, reset identity, and byte accounting.

mod common;

use common::{drain_value_strings, file_store, line_store, value_strings};
use mlfeed::{DataReader, DataType, LastExampleHandling, ReaderOptions, TextLineReader};

const THREE_LINES: &[u8] = b"this is line 1\nthis is line 2\nthis is line 3\n";

fn three_line_reader(batch_size: usize, handling: LastExampleHandling) -> TextLineReader {
    let options = ReaderOptions::new(vec![line_store(&[
        "this is line 1",
        "this is line 2",
        "this is line 3",
    ])])
    .with_batch_size(batch_size)
    .with_last_example_handling(handling);

    TextLineReader::new(options).unwrap()
}

#[test]
fn test_batch_equals_dataset() {
    let mut reader = three_line_reader(3, LastExampleHandling::None);

    let example = reader.read_example().unwrap().unwrap();
    assert_eq!(
        value_strings(&example),
        vec!["this is line 1", "this is line 2", "this is line 3"]
    );

    assert!(reader.read_example().unwrap().is_none());

    // A new epoch replays the same output.
    reader.reset();

    let example = reader.read_example().unwrap().unwrap();
    assert_eq!(
        value_strings(&example),
        vec!["this is line 1", "this is line 2", "this is line 3"]
    );
    assert!(reader.read_example().unwrap().is_none());
}

#[test]
fn test_batch_larger_than_dataset() {
    let mut reader = three_line_reader(5, LastExampleHandling::None);

    let example = reader.read_example().unwrap().unwrap();
    assert_eq!(value_strings(&example).len(), 3);
    assert_eq!(example.padding(), 0);

    assert!(reader.read_example().unwrap().is_none());
}

#[test]
fn test_batch_smaller_than_dataset() {
    let mut reader = three_line_reader(2, LastExampleHandling::None);

    assert_eq!(
        drain_value_strings(&mut reader),
        vec![
            vec!["this is line 1".to_string(), "this is line 2".to_string()],
            vec!["this is line 3".to_string()],
        ]
    );
}

#[test]
fn test_drop_last_example() {
    let mut reader = three_line_reader(2, LastExampleHandling::Drop);

    let batches = drain_value_strings(&mut reader);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
}

#[test]
fn test_pad_last_example() {
    let mut reader = three_line_reader(2, LastExampleHandling::Pad);

    let first = reader.read_example().unwrap().unwrap();
    assert_eq!(first.padding(), 0);

    let last = reader.read_example().unwrap().unwrap();
    assert_eq!(last.padding(), 1);
    assert_eq!(
        value_strings(&last),
        vec!["this is line 3".to_string(), String::new()]
    );

    assert!(reader.read_example().unwrap().is_none());
}

#[test]
fn test_reading_from_a_file_store() {
    let (path, store) = file_store("text-reader", THREE_LINES);

    let options = ReaderOptions::new(vec![store]).with_batch_size(3);
    let mut reader = TextLineReader::new(options).unwrap();

    let example = reader.read_example().unwrap().unwrap();
    assert_eq!(value_strings(&example).len(), 3);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_schema_is_cached_and_stable() {
    let mut reader = three_line_reader(3, LastExampleHandling::None);

    let schema = reader.read_schema().unwrap();
    let attribute = schema.attribute("value").unwrap();
    assert_eq!(attribute.data_type(), DataType::String);
    assert_eq!(attribute.shape(), &[3, 1]);

    // Every emitted example carries the cached schema, across resets.
    let example = reader.read_example().unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(example.schema(), &schema));

    reader.reset();

    let example = reader.read_example().unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(example.schema(), &schema));
}

#[test]
fn test_peek_does_not_consume() {
    let mut reader = three_line_reader(3, LastExampleHandling::None);

    let peeked = reader.peek_example().unwrap().unwrap();
    let read = reader.read_example().unwrap().unwrap();
    assert_eq!(value_strings(&peeked), value_strings(&read));

    assert!(reader.peek_example().unwrap().is_none());
    assert!(reader.read_example().unwrap().is_none());
}

#[test]
fn test_byte_accounting() {
    let mut reader = three_line_reader(3, LastExampleHandling::None);

    assert_eq!(reader.num_bytes_read(), 0);

    reader.read_example().unwrap().unwrap();

    // Three lines of 14 characters, terminators excluded.
    assert_eq!(reader.num_bytes_read(), 42);

    reader.reset();
    assert_eq!(reader.num_bytes_read(), 0);
}

#[test]
fn test_multiple_stores_read_in_order() {
    let stores = vec![line_store(&["a", "b"]), line_store(&["c"])];
    let options = ReaderOptions::new(stores).with_batch_size(3);
    let mut reader = TextLineReader::new(options).unwrap();

    let example = reader.read_example().unwrap().unwrap();
    assert_eq!(value_strings(&example), vec!["a", "b", "c"]);
}

#[test]
fn test_empty_dataset() {
    let options = ReaderOptions::new(vec![line_store(&[])]).with_batch_size(2);
    let mut reader = TextLineReader::new(options).unwrap();

    assert!(reader.read_example().unwrap().is_none());
}
