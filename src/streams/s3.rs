// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Object-storage stream over an external client.

use std::sync::Arc;

use crate::error::StreamResult;
use crate::streams::InputStream;

/// The object-storage operations the reader depends on.
///
/// The concrete client (credentials, transfer management, retries) lives
/// outside this crate; readers only issue ranged reads and listings
/// through this trait.
pub trait S3Client: Send + Sync {
    /// Read up to `dest.len()` bytes of `bucket/key` starting at `offset`,
    /// returning the number of bytes read. Zero means end-of-object.
    fn read_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        dest: &mut [u8],
    ) -> StreamResult<usize>;

    /// The size of `bucket/key` in bytes.
    fn object_size(&self, bucket: &str, key: &str) -> StreamResult<u64>;

    /// The keys under `prefix` in `bucket`.
    fn list_objects(&self, bucket: &str, prefix: &str) -> StreamResult<Vec<String>>;
}

/// A seekable stream over one S3 object.
pub struct S3InputStream {
    client: Arc<dyn S3Client>,
    bucket: String,
    key: String,
    size: u64,
    position: u64,
    closed: bool,
}

impl S3InputStream {
    /// Open `bucket/key` through `client`.
    pub fn open(client: Arc<dyn S3Client>, bucket: &str, key: &str) -> StreamResult<Self> {
        let size = client.object_size(bucket, key)?;

        Ok(S3InputStream {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            position: 0,
            closed: false,
        })
    }
}

impl InputStream for S3InputStream {
    fn read(&mut self, dest: &mut [u8]) -> StreamResult<usize> {
        if self.closed {
            return Err(crate::error::StreamError::Closed);
        }

        if self.position >= self.size {
            return Ok(0);
        }

        let num_bytes_read =
            self.client
                .read_object(&self.bucket, &self.key, self.position, dest)?;

        self.position += num_bytes_read as u64;

        Ok(num_bytes_read)
    }

    fn seek(&mut self, position: u64) -> StreamResult<()> {
        if self.closed {
            return Err(crate::error::StreamError::Closed);
        }

        self.position = position.min(self.size);

        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn closed(&self) -> bool {
        self.closed
    }

    fn seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory stand-in for an object-storage client.
    pub(crate) struct FakeS3Client {
        objects: HashMap<(String, String), Vec<u8>>,
    }

    impl FakeS3Client {
        pub(crate) fn new(objects: &[(&str, &str, &[u8])]) -> Self {
            let objects = objects
                .iter()
                .map(|(b, k, v)| ((b.to_string(), k.to_string()), v.to_vec()))
                .collect();

            FakeS3Client { objects }
        }

        fn object(&self, bucket: &str, key: &str) -> StreamResult<&Vec<u8>> {
            self.objects
                .get(&(bucket.to_string(), key.to_string()))
                .ok_or_else(|| {
                    crate::error::StreamError::Io(Arc::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no such object: s3://{bucket}/{key}"),
                    )))
                })
        }
    }

    impl S3Client for FakeS3Client {
        fn read_object(
            &self,
            bucket: &str,
            key: &str,
            offset: u64,
            dest: &mut [u8],
        ) -> StreamResult<usize> {
            let object = self.object(bucket, key)?;
            let remaining = &object[(offset as usize).min(object.len())..];
            let num_bytes_read = remaining.len().min(dest.len());

            dest[..num_bytes_read].copy_from_slice(&remaining[..num_bytes_read]);

            Ok(num_bytes_read)
        }

        fn object_size(&self, bucket: &str, key: &str) -> StreamResult<u64> {
            Ok(self.object(bucket, key)?.len() as u64)
        }

        fn list_objects(&self, bucket: &str, prefix: &str) -> StreamResult<Vec<String>> {
            let mut keys: Vec<String> = self
                .objects
                .keys()
                .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect();

            keys.sort();

            Ok(keys)
        }
    }

    #[test]
    fn test_ranged_reads() {
        let client = Arc::new(FakeS3Client::new(&[("bucket", "data/part-0", b"s3 object")]));
        let mut stream = S3InputStream::open(client, "bucket", "data/part-0").unwrap();

        assert_eq!(stream.size(), 9);

        let mut buf = [0u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"s3");

        stream.seek(3).unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(stream.read(&mut buf).unwrap(), 6);
        assert_eq!(&buf, b"object");

        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_missing_object_fails() {
        let client = Arc::new(FakeS3Client::new(&[]));

        assert!(S3InputStream::open(client, "bucket", "nope").is_err());
    }
}
