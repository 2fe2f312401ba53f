// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! S3 object stores and prefix listing.

use std::fmt;
use std::sync::Arc;

use crate::data_stores::file_list::{compile_glob, natural_cmp};
use crate::data_stores::DataStore;
use crate::error::{DataReaderError, Result};
use crate::streams::{InputStream, S3Client, S3InputStream};

/// A dataset store backed by a single S3 object.
pub struct S3Object {
    client: Arc<dyn S3Client>,
    bucket: String,
    key: String,
    id: String,
}

impl S3Object {
    /// Create a store for `s3://bucket/key` accessed through `client`.
    pub fn new(client: Arc<dyn S3Client>, bucket: &str, key: &str) -> Result<Self> {
        if bucket.is_empty() || key.is_empty() {
            return Err(DataReaderError::invalid_argument(
                "the S3 bucket and key must be non-empty",
            ));
        }

        Ok(S3Object {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            id: format!("s3://{bucket}/{key}"),
        })
    }

    /// Create a store from an `s3://bucket/key` URI.
    pub fn from_uri(client: Arc<dyn S3Client>, uri: &str) -> Result<Self> {
        let (bucket, key) = parse_s3_uri(uri)?;

        S3Object::new(client, &bucket, &key)
    }
}

impl DataStore for S3Object {
    fn open_read(&self) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(S3InputStream::open(
            Arc::clone(&self.client),
            &self.bucket,
            &self.key,
        )?))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for S3Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Object").field("id", &self.id).finish()
    }
}

impl fmt::Display for S3Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Split an `s3://bucket/key-or-prefix` URI into bucket and key.
///
/// The scheme is required and both components must be non-empty.
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let rest = uri.strip_prefix("s3://").ok_or_else(|| {
        DataReaderError::invalid_argument(format!("the URI '{uri}' does not have the s3 scheme"))
    })?;

    let (bucket, key) = rest.split_once('/').ok_or_else(|| {
        DataReaderError::invalid_argument(format!("the URI '{uri}' does not contain an object key"))
    })?;

    if bucket.is_empty() || key.is_empty() {
        return Err(DataReaderError::invalid_argument(format!(
            "the URI '{uri}' must contain a non-empty bucket and key"
        )));
    }

    Ok((bucket.to_string(), key.to_string()))
}

/// Predicate deciding whether a listed key becomes a store.
pub type KeyPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Expand `s3://bucket/prefix` URIs into object stores.
///
/// Each prefix is listed through the client; keys are filtered by the
/// optional glob `pattern` and `predicate` and ordered by natural sort.
pub fn list_s3_objects(
    client: Arc<dyn S3Client>,
    uris: &[&str],
    pattern: Option<&str>,
    predicate: Option<&KeyPredicate>,
) -> Result<Vec<S3Object>> {
    let pattern = pattern.map(compile_glob).transpose()?;

    let mut found: Vec<(String, String)> = Vec::new();

    for uri in uris {
        let (bucket, prefix) = parse_s3_uri(uri)?;

        for key in client.list_objects(&bucket, &prefix)? {
            let full = format!("s3://{bucket}/{key}");

            if let Some(ref pattern) = pattern {
                if !pattern.is_match(&full) {
                    continue;
                }
            }

            if let Some(predicate) = predicate {
                if !predicate(&full) {
                    continue;
                }
            }

            found.push((bucket.clone(), key));
        }
    }

    found.sort_by(|(ab, ak), (bb, bk)| {
        natural_cmp(ab, bb).then_with(|| natural_cmp(ak, bk))
    });

    found
        .into_iter()
        .map(|(bucket, key)| S3Object::new(Arc::clone(&client), &bucket, &key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_parsing() {
        assert_eq!(
            parse_s3_uri("s3://bucket/key/part-0").unwrap(),
            ("bucket".to_string(), "key/part-0".to_string())
        );

        assert!(parse_s3_uri("file://bucket/key").is_err());
        assert!(parse_s3_uri("s3://bucket").is_err());
        assert!(parse_s3_uri("s3:///key").is_err());
        assert!(parse_s3_uri("s3://bucket/").is_err());
    }

    #[test]
    fn test_store_id() {
        struct NoopClient;

        impl S3Client for NoopClient {
            fn read_object(
                &self,
                _: &str,
                _: &str,
                _: u64,
                _: &mut [u8],
            ) -> crate::error::StreamResult<usize> {
                Ok(0)
            }

            fn object_size(&self, _: &str, _: &str) -> crate::error::StreamResult<u64> {
                Ok(0)
            }

            fn list_objects(&self, _: &str, _: &str) -> crate::error::StreamResult<Vec<String>> {
                Ok(vec![
                    "data/part-10".to_string(),
                    "data/part-2".to_string(),
                ])
            }
        }

        let client: Arc<dyn S3Client> = Arc::new(NoopClient);

        let store = S3Object::new(Arc::clone(&client), "bucket", "key").unwrap();
        assert_eq!(store.id(), "s3://bucket/key");

        let stores = list_s3_objects(client, &["s3://bucket/data/"], None, None).unwrap();
        let ids: Vec<&str> = stores.iter().map(|s| s.id()).collect();

        assert_eq!(ids, vec!["s3://bucket/data/part-2", "s3://bucket/data/part-10"]);
    }
}
