//! Knowledge base ingestion.
//!
//! Walks a documentation tree, chunks every matching file, embeds each chunk
//! and upserts one batch per file into the vector store. A bad file is
//! logged and counted, never fatal to the run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use devmind_llm::SharedEmbedder;
use devmind_memory::{ChunkMetadata, ChunkRecord, DEFAULT_COLLECTION, SharedVectorStore};

use crate::chunker::TextChunker;
use crate::error::{AgentError, Result};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Chunks were written.
    Ingested { chunks: usize, skipped_chunks: usize },
    /// The file was empty or whitespace-only.
    Empty,
    /// No chunk could be embedded.
    NoEmbeddings { skipped_chunks: usize },
    /// Reading or storing the file failed.
    Failed { error: String },
}

/// Progress notification emitted after each file.
#[derive(Debug, Clone)]
pub struct IngestProgress<'a> {
    /// 1-based position of this file.
    pub index: usize,
    pub total: usize,
    pub path: &'a Path,
    pub outcome: &'a FileOutcome,
}

/// Totals for an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_ingested: usize,
    pub files_empty: usize,
    pub files_failed: usize,
    pub chunks_written: usize,
    /// Chunks dropped because embedding failed.
    pub chunks_skipped: usize,
    /// Records in the collection after the run, if it could be counted.
    pub total_in_store: Option<usize>,
}

impl IngestReport {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Ingested {
                chunks,
                skipped_chunks,
            } => {
                self.files_ingested += 1;
                self.chunks_written += chunks;
                self.chunks_skipped += skipped_chunks;
            }
            FileOutcome::Empty => self.files_empty += 1,
            FileOutcome::NoEmbeddings { skipped_chunks } => {
                self.chunks_skipped += skipped_chunks;
            }
            FileOutcome::Failed { .. } => self.files_failed += 1,
        }
    }
}

/// Loads a documentation tree into the vector store.
#[derive(Clone)]
pub struct Ingestor {
    store: SharedVectorStore,
    embedder: SharedEmbedder,
    chunker: TextChunker,
    collection: String,
    extensions: Vec<String>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("embedder", &self.embedder.name())
            .field("chunker", &self.chunker)
            .field("collection", &self.collection)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Ingestor {
    /// Create an ingestor for markdown files with default chunking.
    pub fn new(store: SharedVectorStore, embedder: SharedEmbedder) -> Self {
        Self {
            store,
            embedder,
            chunker: TextChunker::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            extensions: vec!["md".to_string()],
        }
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// File extensions to ingest, with or without a leading dot.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Matching files under `root`, in path order.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(AgentError::config(format!(
                "Document source is not a directory: {}",
                root.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.matches_extension(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|wanted| *wanted == ext)
            })
    }

    /// Ingest every matching file under `root`.
    pub async fn run(&self, root: &Path) -> Result<IngestReport> {
        self.run_with_progress(root, |_| {}).await
    }

    /// Ingest every matching file under `root`, reporting after each file.
    pub async fn run_with_progress<F>(&self, root: &Path, mut progress: F) -> Result<IngestReport>
    where
        F: FnMut(IngestProgress<'_>),
    {
        let files = self.scan(root)?;
        tracing::info!(root = %root.display(), files = files.len(), "Scanning documents");

        let mut report = IngestReport {
            files_found: files.len(),
            ..IngestReport::default()
        };

        for (i, path) in files.iter().enumerate() {
            let outcome = match self.ingest_file(path).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Error processing file");
                    FileOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.record(&outcome);
            progress(IngestProgress {
                index: i + 1,
                total: files.len(),
                path,
                outcome: &outcome,
            });
        }

        report.total_in_store = match self.store.count(&self.collection) {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Could not count stored documents");
                None
            }
        };

        tracing::info!(
            collection = %self.collection,
            files = report.files_ingested,
            chunks = report.chunks_written,
            failed = report.files_failed,
            total = ?report.total_in_store,
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Chunk, embed and store one file.
    pub async fn ingest_file(&self, path: &Path) -> Result<FileOutcome> {
        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            tracing::warn!(path = %path.display(), "Skipping empty file");
            return Ok(FileOutcome::Empty);
        }

        let base_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = path.display().to_string();

        let chunks = self.chunker.chunk(&content);
        let embeddings = self.embed_chunks(&source, &chunks).await;

        let mut records = Vec::new();
        let mut skipped = 0;
        for (i, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            match embedding {
                Some(embedding) => records.push(ChunkRecord::new(
                    format!("{}_{}", base_name, i),
                    chunk,
                    embedding,
                    ChunkMetadata::new(source.clone(), i),
                )),
                None => skipped += 1,
            }
        }

        if records.is_empty() {
            return Ok(FileOutcome::NoEmbeddings {
                skipped_chunks: skipped,
            });
        }

        let written = self.store.upsert(&self.collection, &records)?;
        tracing::debug!(path = %source, chunks = written, skipped, "File ingested");
        Ok(FileOutcome::Ingested {
            chunks: written,
            skipped_chunks: skipped,
        })
    }

    /// One embedding per chunk, `None` where it failed.
    ///
    /// The whole file goes out as one batch; if the batch fails or comes back
    /// short, chunks are retried one at a time so a single bad chunk only
    /// costs itself.
    async fn embed_chunks(&self, source: &str, chunks: &[String]) -> Vec<Option<Vec<f32>>> {
        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        match self.embedder.embed_batch(&texts).await {
            Ok(batch) if batch.len() == chunks.len() && batch.iter().all(|e| !e.is_empty()) => {
                return batch.into_iter().map(Some).collect();
            }
            Ok(batch) => {
                tracing::debug!(path = %source, got = batch.len(), expected = chunks.len(), "Incomplete embedding batch; embedding chunks one by one");
            }
            Err(e) => {
                tracing::debug!(path = %source, error = %e, "Embedding batch failed; embedding chunks one by one");
            }
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            match self.embedder.embed(chunk).await {
                Ok(embedding) if !embedding.is_empty() => embeddings.push(Some(embedding)),
                result => {
                    let error = result.err().map(|e| e.to_string()).unwrap_or_default();
                    tracing::warn!(path = %source, chunk = i, %error, "Failed to embed chunk");
                    embeddings.push(None);
                }
            }
        }
        embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmind_llm::MockEmbedder;
    use devmind_memory::{KnowledgeStore, MockVectorStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn ingestor(store: Arc<MockVectorStore>) -> Ingestor {
        Ingestor::new(store, Arc::new(MockEmbedder::new(8)))
            .with_chunker(TextChunker::new(10, 2).unwrap())
    }

    #[test]
    fn test_scan_filters_extensions_recursively() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "a");
        write(dir.path(), "nested/deep/b.MD", "b");
        write(dir.path(), "c.txt", "c");
        write(dir.path(), "d.rs", "d");

        let store = Arc::new(MockVectorStore::new());
        let files = ingestor(store.clone()).scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.MD"]);

        let files = ingestor(store)
            .with_extensions([".txt", "rs"])
            .scan(dir.path())
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = ingestor(Arc::new(MockVectorStore::new()))
            .scan(&dir.path().join("missing"))
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_ingest_assigns_ids_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "docs/guide.md", "0123456789abcdefgh");
        let store = Arc::new(MockVectorStore::new());

        let report = ingestor(store.clone()).run(dir.path()).await.unwrap();

        assert_eq!(report.files_found, 1);
        assert_eq!(report.files_ingested, 1);
        assert_eq!(report.chunks_written, 3);
        assert_eq!(report.total_in_store, Some(3));

        let records = store.records(DEFAULT_COLLECTION);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["guide.md_0", "guide.md_1", "guide.md_2"]);
        assert_eq!(records[1].document, "89abcdefgh");
        assert_eq!(records[1].metadata, ChunkMetadata::new(path.display().to_string(), 1));
    }

    #[tokio::test]
    async fn test_empty_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "blank.md", "  \n\t\n");
        write(dir.path(), "real.md", "content");
        let store = Arc::new(MockVectorStore::new());

        let report = ingestor(store.clone()).run(dir.path()).await.unwrap();

        assert_eq!(report.files_empty, 1);
        assert_eq!(report.files_ingested, 1);
        assert_eq!(store.records(DEFAULT_COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_embeddings_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "doc.md", "good chunkXXXXbad chunk");
        let store = Arc::new(MockVectorStore::new());
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(MockEmbedder::new(8).with_failure_on("bad")),
        )
        .with_chunker(TextChunker::new(11, 0).unwrap());

        let report = ingestor.run(dir.path()).await.unwrap();

        assert_eq!(report.chunks_written, 2);
        assert_eq!(report.chunks_skipped, 1);
        let ids: Vec<_> = store
            .records(DEFAULT_COLLECTION)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["doc.md_0", "doc.md_2"]);
    }

    /// Embeds only in batches, counting the calls.
    struct BatchOnlyEmbedder {
        batches: parking_lot::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl devmind_llm::Embedder for BatchOnlyEmbedder {
        async fn embed(&self, _text: &str) -> devmind_llm::Result<Vec<f32>> {
            Err(devmind_llm::LlmError::Backend("single embeds unsupported".to_string()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> devmind_llm::Result<Vec<Vec<f32>>> {
            self.batches.lock().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32; 4]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "batch-only"
        }
    }

    #[tokio::test]
    async fn test_each_file_is_embedded_in_one_batch() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "0123456789abcdefgh");
        write(dir.path(), "b.md", "short");
        let store = Arc::new(MockVectorStore::new());
        let embedder = Arc::new(BatchOnlyEmbedder {
            batches: parking_lot::Mutex::new(Vec::new()),
        });
        let ingestor = Ingestor::new(store.clone(), embedder.clone())
            .with_chunker(TextChunker::new(10, 2).unwrap());

        let report = ingestor.run(dir.path()).await.unwrap();

        assert_eq!(report.chunks_written, 4);
        assert_eq!(report.chunks_skipped, 0);
        assert_eq!(*embedder.batches.lock(), vec![3, 1]);
        assert_eq!(store.records(DEFAULT_COLLECTION)[0].embedding, vec![10.0; 4]);
    }

    #[tokio::test]
    async fn test_store_failure_is_counted_and_run_continues() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "alpha");
        write(dir.path(), "b.md", "beta");

        let ingestor = Ingestor::new(
            Arc::new(MockVectorStore::failing()),
            Arc::new(MockEmbedder::new(8)),
        );

        let mut seen = Vec::new();
        let report = ingestor
            .run_with_progress(dir.path(), |p| {
                seen.push((p.index, p.total, matches!(p.outcome, FileOutcome::Failed { .. })))
            })
            .await
            .unwrap();

        assert_eq!(report.files_failed, 2);
        assert_eq!(report.total_in_store, None);
        assert_eq!(seen, vec![(1, 2, true), (2, 2, true)]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_file_fails_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00]).unwrap();
        write(dir.path(), "text.md", "fine");
        let store = Arc::new(MockVectorStore::new());

        let report = ingestor(store).run(dir.path()).await.unwrap();
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_ingested, 1);
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunks_in_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "a.md", "first version");
        let store = Arc::new(KnowledgeStore::open(dir.path().join("db")).unwrap());
        let ingestor = Ingestor::new(store.clone(), Arc::new(MockEmbedder::new(8)));

        ingestor.run(&docs).await.unwrap();
        write(&docs, "a.md", "second version");
        let report = ingestor.run(&docs).await.unwrap();

        assert_eq!(report.total_in_store, Some(1));
        assert_eq!(store.count(DEFAULT_COLLECTION).unwrap(), 1);
    }
}
