use wrgl_types::ObjectSum;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"wrgl-table-v1"`) that is
/// prepended to every hash computation, so a block and a table with identical
/// bytes never share a sum.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self::new("wrgl-commit-v1");
    /// Hasher for table objects.
    pub const TABLE: Self = Self::new("wrgl-table-v1");
    /// Hasher for block objects.
    pub const BLOCK: Self = Self::new("wrgl-block-v1");
    /// Hasher for block index objects.
    pub const BLOCK_INDEX: Self = Self::new("wrgl-block-index-v1");
    /// Hasher for row keys inside a block index.
    pub const ROW: Self = Self::new("wrgl-row-v1");

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectSum {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectSum::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected sum.
    pub fn verify(&self, data: &[u8], expected: &ObjectSum) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
