use std::path::{Path, PathBuf};

pub const POSTINGS_NAME: &str = "index.postings";
pub const TERMS_INDEX_NAME: &str = "index.terms.json";
pub const DOC_STORE_NAME: &str = "doc_store.jsonl";
pub const DOC_INDEX_NAME: &str = "doc_store.sled";
pub const META_NAME: &str = "index.meta.json";
pub const BLOCK_DIRNAME: &str = "blocks";
pub const DOC_STORE_PARTS_DIRNAME: &str = "doc_store_parts";

/// Resolves the fixed on-disk layout of one index directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn postings(&self) -> PathBuf {
        self.root.join(POSTINGS_NAME)
    }

    pub fn terms_index(&self) -> PathBuf {
        self.root.join(TERMS_INDEX_NAME)
    }

    pub fn doc_store(&self) -> PathBuf {
        self.root.join(DOC_STORE_NAME)
    }

    pub fn doc_index(&self) -> PathBuf {
        self.root.join(DOC_INDEX_NAME)
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join(META_NAME)
    }

    pub fn block_dir(&self) -> PathBuf {
        self.root.join(BLOCK_DIRNAME)
    }

    pub fn parts_dir(&self) -> PathBuf {
        self.root.join(DOC_STORE_PARTS_DIRNAME)
    }

    pub fn block_file(&self, batch_id: u64) -> PathBuf {
        self.block_dir().join(format!("block_{batch_id:06}.jsonl"))
    }

    pub fn part_file(&self, batch_id: u64) -> PathBuf {
        self.parts_dir()
            .join(format!("doc_store_{batch_id:06}.jsonl"))
    }
}
