use arbor_types::ObjectId;

/// Object family a digest is computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashDomain {
    Blob,
    Tree,
    Commit,
}

impl HashDomain {
    /// Tag written ahead of the payload.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Blob => "arbor-blob-v1",
            Self::Tree => "arbor-tree-v1",
            Self::Commit => "arbor-commit-v1",
        }
    }
}

/// Incremental BLAKE3 hasher seeded with a domain tag.
///
/// Tree encoders feed entries one at a time instead of buffering the whole
/// listing; [`ContentHasher::digest`] covers the one-shot case.
pub struct ContentHasher {
    inner: blake3::Hasher,
    domain: HashDomain,
}

impl ContentHasher {
    /// Start a hasher for objects of `domain`.
    pub fn new(domain: HashDomain) -> Self {
        let mut inner = blake3::Hasher::new();
        inner.update(domain.tag().as_bytes());
        inner.update(b"\0");
        Self { inner, domain }
    }

    /// Hash `data` in one call.
    pub fn digest(domain: HashDomain, data: &[u8]) -> ObjectId {
        let mut hasher = Self::new(domain);
        hasher.update(data);
        hasher.finalize()
    }

    /// Append bytes to the running digest.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Append a length-prefixed field so adjacent fields cannot run together.
    pub fn update_field(&mut self, field: &[u8]) -> &mut Self {
        self.inner.update(&(field.len() as u64).to_le_bytes());
        self.inner.update(field);
        self
    }

    /// Domain this hasher was started with.
    pub fn domain(&self) -> HashDomain {
        self.domain
    }

    /// Finish hashing and return the content id.
    pub fn finalize(&self) -> ObjectId {
        ObjectId::from_hash(*self.inner.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        let a = ContentHasher::digest(HashDomain::Blob, b"{\"Name\":\"Customers\"}");
        let b = ContentHasher::digest(HashDomain::Blob, b"{\"Name\":\"Customers\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn domains_separate_identical_payloads() {
        let blob = ContentHasher::digest(HashDomain::Blob, b"payload");
        let tree = ContentHasher::digest(HashDomain::Tree, b"payload");
        let commit = ContentHasher::digest(HashDomain::Commit, b"payload");
        assert_ne!(blob, tree);
        assert_ne!(tree, commit);
        assert_ne!(blob, commit);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut hasher = ContentHasher::new(HashDomain::Tree);
        hasher.update(b"left").update(b"right");
        assert_eq!(
            hasher.finalize(),
            ContentHasher::digest(HashDomain::Tree, b"leftright")
        );
    }

    #[test]
    fn length_prefixed_fields_do_not_collide() {
        let mut a = ContentHasher::new(HashDomain::Tree);
        a.update_field(b"ab").update_field(b"c");
        let mut b = ContentHasher::new(HashDomain::Tree);
        b.update_field(b"a").update_field(b"bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn differs_from_untagged_hash() {
        let tagged = ContentHasher::digest(HashDomain::Blob, b"x");
        assert_ne!(tagged.to_hex(), hex::encode(blake3::hash(b"x").as_bytes()));
    }
}
