//! Deterministic test doubles shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pdfqa_rag::{
    AnswerGenerator, EmbeddingProvider, GenerationOptions, RagConfig, RagError, RagPipeline,
    SnapshotStore,
};

// ---------------------------------------------------------------------------
// MockEmbeddingProvider - deterministic hash-based embeddings
// ---------------------------------------------------------------------------

pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let mut emb = vec![0.0f32; dimensions];
    for (i, v) in emb.iter_mut().enumerate() {
        // Top 24 bits mapped into [-1, 1).
        let bits = splitmix64(hash ^ (i as u64).wrapping_mul(0x9e37_79b9)) >> 40;
        *v = bits as f32 / (1u64 << 23) as f32 - 1.0;
    }
    let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    }
    emb
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock-embedding"
    }

    async fn embed(&self, text: &str) -> pdfqa_rag::Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// SlowEmbeddingProvider - delays batches containing a trigger string
// ---------------------------------------------------------------------------

pub struct SlowEmbeddingProvider {
    inner: MockEmbeddingProvider,
    trigger: String,
    delay: Duration,
}

impl SlowEmbeddingProvider {
    pub fn new(dimensions: usize, trigger: &str, delay: Duration) -> Self {
        Self { inner: MockEmbeddingProvider::new(dimensions), trigger: trigger.into(), delay }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbeddingProvider {
    fn name(&self) -> &str {
        "slow-embedding"
    }

    async fn embed(&self, text: &str) -> pdfqa_rag::Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> pdfqa_rag::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(&self.trigger)) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

// ---------------------------------------------------------------------------
// FlakyEmbeddingProvider - fails batches containing a trigger string
// ---------------------------------------------------------------------------

pub struct FlakyEmbeddingProvider {
    inner: MockEmbeddingProvider,
    trigger: String,
}

impl FlakyEmbeddingProvider {
    pub fn new(dimensions: usize, trigger: &str) -> Self {
        Self { inner: MockEmbeddingProvider::new(dimensions), trigger: trigger.into() }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbeddingProvider {
    fn name(&self) -> &str {
        "flaky-embedding"
    }

    async fn embed(&self, text: &str) -> pdfqa_rag::Result<Vec<f32>> {
        if text.contains(&self.trigger) {
            return Err(RagError::Provider {
                provider: "flaky-embedding".into(),
                message: "connection reset".into(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Returns vectors filled with a fixed, typically non-finite, value.
pub struct ConstantEmbeddingProvider {
    dimensions: usize,
    value: f32,
}

impl ConstantEmbeddingProvider {
    pub fn new(dimensions: usize, value: f32) -> Self {
        Self { dimensions, value }
    }
}

#[async_trait]
impl EmbeddingProvider for ConstantEmbeddingProvider {
    fn name(&self) -> &str {
        "constant-embedding"
    }

    async fn embed(&self, _text: &str) -> pdfqa_rag::Result<Vec<f32>> {
        Ok(vec![self.value; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// EchoGenerator - returns the prompt it was given
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EchoGenerator {
    calls: AtomicUsize,
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str, _options: GenerationOptions) -> pdfqa_rag::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(prompt.to_string())
    }
}

/// A generator that never answers in time.
pub struct StalledGenerator;

#[async_trait]
impl AnswerGenerator for StalledGenerator {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _prompt: &str, _options: GenerationOptions) -> pdfqa_rag::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// Pipeline helpers
// ---------------------------------------------------------------------------

pub const DIM: usize = 16;

pub fn config(dir: &Path, chunk_size: usize, chunk_overlap: usize) -> RagConfig {
    RagConfig::builder()
        .chunk_size(chunk_size)
        .chunk_overlap(chunk_overlap)
        .top_k(3)
        .data_dir(dir)
        .build()
        .expect("valid test config")
}

pub async fn pipeline_with(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
) -> RagPipeline {
    RagPipeline::builder()
        .store(SnapshotStore::new(&config.data_dir))
        .config(config)
        .embedding_provider(embedder)
        .generator(generator)
        .build()
        .await
        .expect("pipeline builds")
}

pub async fn mock_pipeline(dir: &Path, chunk_size: usize, chunk_overlap: usize) -> RagPipeline {
    pipeline_with(
        config(dir, chunk_size, chunk_overlap),
        Arc::new(MockEmbeddingProvider::new(DIM)),
        Arc::new(EchoGenerator::default()),
    )
    .await
}
