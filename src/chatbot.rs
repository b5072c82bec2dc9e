//! The question-answering façade.
//!
//! [`Chatbot`] is the single entry point UIs and the HTTP server talk to.
//! It owns the vector index and walks it through a small state machine:
//!
//! ```text
//! Uninitialized ──build──▶ Indexing ──ok──▶ Ready ◀──┐
//!                              │                │    │ ask / query
//!                              └─err──▶ Failed  └────┘
//! ```
//!
//! - A build runs Loader → Chunker → Embedding → Index once. Any error moves
//!   the assistant to `Failed`, which is terminal; no partial index is kept.
//! - Only one build runs at a time; a concurrent call gets
//!   [`BuildError::AlreadyBuilding`].
//! - Calling `build` again once `Ready` rebuilds from scratch. The previous
//!   index keeps serving until the new one is swapped in, and stays in place
//!   if the rebuild fails.
//! - Queries clone an `Arc` to the current index and search it without
//!   holding any lock, so any number of them may run concurrently. A failed
//!   query never changes the phase.
//!
//! Every call to an external service is bounded by an overall timeout that
//! leaves room for the provider's whole retry budget; each attempt is
//! bounded separately by the provider's HTTP timeout.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use docqa_core::chunk::{split_documents, ChunkParams, LexicalTokenizer, Tokenizer};
use docqa_core::embedding::{validate_embeddings, EmbeddingProvider};
use docqa_core::error::{EmbeddingError, GenerationError};
use docqa_core::generation::AnswerGenerator;
use docqa_core::index::VectorIndex;
use docqa_core::models::{Chunk, ScoredChunk};
use docqa_core::prompt::PromptTemplate;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{BuildError, LoadError, QueryError};
use crate::generation::create_generator;
use crate::{loader, snapshot};

/// Pipeline settings, decoupled from the TOML layout.
#[derive(Debug, Clone)]
pub struct ChatbotSettings {
    pub chunk_params: ChunkParams,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Chunks per embedding request during a build.
    pub embed_batch_size: usize,
    pub prompt: PromptTemplate,
    /// Bound on one embedding call, retries included.
    pub embed_timeout: Duration,
    /// Bound on one generation call, retries included.
    pub generate_timeout: Duration,
    pub snapshot_path: Option<PathBuf>,
}

impl ChatbotSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            chunk_params: config.chunk_params()?,
            top_k: config.retrieval.top_k,
            embed_batch_size: config.embedding.batch_size,
            prompt: config.prompt_template()?,
            embed_timeout: config.embedding.service.call_timeout(),
            generate_timeout: config.generation.service.call_timeout(),
            snapshot_path: config.index.snapshot_path.clone(),
        })
    }
}

/// Externally visible lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Uninitialized,
    Indexing,
    Ready,
    Failed,
}

enum Phase {
    Uninitialized,
    Indexing,
    Ready(Arc<VectorIndex>),
    Failed(String),
}

impl Phase {
    fn name(&self) -> PhaseName {
        match self {
            Phase::Uninitialized => PhaseName::Uninitialized,
            Phase::Indexing => PhaseName::Indexing,
            Phase::Ready(_) => PhaseName::Ready,
            Phase::Failed(_) => PhaseName::Failed,
        }
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    /// True when the index came from a snapshot instead of the embedding service.
    pub from_snapshot: bool,
    pub elapsed_ms: u128,
}

/// A generated answer plus the chunks its prompt was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generator's output, unmodified.
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

pub struct Chatbot {
    settings: ChatbotSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
    tokenizer: Arc<dyn Tokenizer>,
    phase: RwLock<Phase>,
    build_lock: tokio::sync::Mutex<()>,
}

impl Chatbot {
    pub fn new(
        settings: ChatbotSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            settings,
            embedder,
            generator,
            tokenizer: Arc::new(LexicalTokenizer),
            phase: RwLock::new(Phase::Uninitialized),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a chatbot with the providers named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = ChatbotSettings::from_config(config)?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::new(settings, embedder, generator))
    }

    /// Replace the default [`LexicalTokenizer`] used for chunking.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn phase(&self) -> PhaseName {
        self.phase.read().unwrap_or_else(PoisonError::into_inner).name()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn current_index(&self) -> Option<Arc<VectorIndex>> {
        match &*self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Ready(index) => Some(Arc::clone(index)),
            _ => None,
        }
    }

    /// Load, chunk, embed and index every document in `data_dir`.
    pub async fn build(&self, data_dir: impl AsRef<Path>) -> Result<BuildReport, BuildError> {
        let _guard = self
            .build_lock
            .try_lock()
            .map_err(|_| BuildError::AlreadyBuilding)?;

        let rebuilding = {
            let phase = self.phase.read().unwrap_or_else(PoisonError::into_inner);
            match &*phase {
                Phase::Failed(reason) => return Err(BuildError::Failed(reason.clone())),
                Phase::Ready(_) => true,
                Phase::Uninitialized | Phase::Indexing => false,
            }
        };
        if !rebuilding {
            self.set_phase(Phase::Indexing);
        }

        let data_dir = data_dir.as_ref().to_path_buf();
        info!(dir = %data_dir.display(), rebuilding, "building document index");

        match self.build_index(data_dir).await {
            Ok((index, report)) => {
                info!(
                    documents = report.documents,
                    chunks = report.chunks,
                    from_snapshot = report.from_snapshot,
                    elapsed_ms = report.elapsed_ms as u64,
                    "index ready"
                );
                self.set_phase(Phase::Ready(Arc::new(index)));
                Ok(report)
            }
            Err(e) if rebuilding => {
                warn!(error = %e, "rebuild failed; keeping the previous index");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "index build failed");
                self.set_phase(Phase::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn build_index(
        &self,
        data_dir: PathBuf,
    ) -> Result<(VectorIndex, BuildReport), BuildError> {
        let started = Instant::now();
        let params = self.settings.chunk_params.clone();
        let tokenizer = Arc::clone(&self.tokenizer);

        let (documents, chunks) = tokio::task::spawn_blocking(move || {
            let docs = loader::load(&data_dir)?;
            let chunks = split_documents(&docs, &params, tokenizer.as_ref());
            Ok::<_, LoadError>((docs.len(), chunks))
        })
        .await
        .map_err(|e| BuildError::Task(e.to_string()))??;
        debug!(documents, chunks = chunks.len(), "documents loaded and chunked");

        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dims();
        let chunk_count = chunks.len();
        let report = |from_snapshot| BuildReport {
            documents,
            chunks: chunk_count,
            from_snapshot,
            elapsed_ms: started.elapsed().as_millis(),
        };

        let snapshot_target = self.settings.snapshot_path.clone().map(|path| {
            let fp = snapshot::fingerprint(&chunks, &self.settings.chunk_params, &model, dims);
            (path, fp)
        });

        if let Some((path, fp)) = snapshot_target.clone() {
            let shown = path.display().to_string();
            let loaded = tokio::task::spawn_blocking(move || snapshot::load(&path, &fp))
                .await
                .map_err(|e| BuildError::Task(e.to_string()))?;
            match loaded {
                Ok(Some(index)) if index.ensure_compatible(&model, dims).is_ok() => {
                    info!(path = %shown, "loaded index snapshot");
                    return Ok((index, report(true)));
                }
                Ok(_) => {}
                Err(e) => warn!(path = %shown, error = %e, "ignoring unreadable snapshot"),
            }
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let mut index =
            VectorIndex::build(model, dims, chunks.into_iter().zip(vectors).collect())?;

        if let Some((path, fp)) = snapshot_target {
            let (built, saved) = tokio::task::spawn_blocking(move || {
                let saved = snapshot::save(&path, &fp, &index).map_err(|e| (path, e));
                (index, saved)
            })
            .await
            .map_err(|e| BuildError::Task(e.to_string()))?;
            if let Err((path, e)) = saved {
                warn!(path = %path.display(), error = %e, "could not write index snapshot");
            }
            index = built;
        }

        Ok((index, report(false)))
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = self.embedder.model_name();
        let dims = self.embedder.dims();
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.settings.embed_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = tokio::time::timeout(
                self.settings.embed_timeout,
                self.embedder.embed_batch(&texts),
            )
            .await
            .map_err(|_| EmbeddingError::Timeout {
                provider: model.to_string(),
                secs: self.settings.embed_timeout.as_secs(),
            })??;
            validate_embeddings(model, texts.len(), dims, &batch_vectors)?;
            vectors.extend(batch_vectors);
            debug!(embedded = vectors.len(), total = chunks.len(), "embedding progress");
        }

        Ok(vectors)
    }

    /// Answer `question` and return the generated text.
    pub async fn query(&self, question: &str) -> Result<String, QueryError> {
        self.ask(question).await.map(|answer| answer.text)
    }

    /// Answer `question`, returning the text together with its sources.
    pub async fn ask(&self, question: &str) -> Result<Answer, QueryError> {
        let index = self.current_index().ok_or(QueryError::NotReady)?;
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let query_vec = tokio::time::timeout(
            self.settings.embed_timeout,
            self.embedder.embed(question),
        )
        .await
        .map_err(|_| EmbeddingError::Timeout {
            provider: self.embedder.model_name().to_string(),
            secs: self.settings.embed_timeout.as_secs(),
        })??;

        let sources = index.search(&query_vec, self.settings.top_k)?;
        let prompt = self.settings.prompt.compose(&sources, question);
        debug!(hits = sources.len(), prompt_len = prompt.len(), "prompt composed");

        let text = tokio::time::timeout(
            self.settings.generate_timeout,
            self.generator.generate(&prompt),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            provider: self.generator.model_name().to_string(),
            secs: self.settings.generate_timeout.as_secs(),
        })??;

        Ok(Answer { text, sources })
    }
}
