use log_combine_core::padding::ByteRange;

/// One source slice of a server-side multipart copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPart {
    pub source_bucket: String,
    pub source_key: String,
    pub range: Option<ByteRange>,
}

impl CopyPart {
    pub fn whole(source_bucket: &str, source_key: &str) -> Self {
        Self {
            source_bucket: source_bucket.to_string(),
            source_key: source_key.to_string(),
            range: None,
        }
    }

    pub fn ranged(source_bucket: &str, source_key: &str, range: ByteRange) -> Self {
        Self {
            source_bucket: source_bucket.to_string(),
            source_key: source_key.to_string(),
            range: Some(range),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDestination {
    pub bucket: String,
    pub key: String,
    pub storage_class: Option<String>,
}

pub trait ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;

    fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;

    fn object_length(&self, bucket: &str, key: &str) -> Result<u64, String>;

    /// Assembles a new object from the given parts via server-side copy.
    /// Atomic at the commit boundary: on any failure the destination keeps
    /// its prior content and no partial copy is ever visible.
    fn compose_object(
        &self,
        destination: &CopyDestination,
        parts: &[CopyPart],
    ) -> Result<(), String>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), String>;
}
