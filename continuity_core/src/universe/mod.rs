//! Universe - an isolated namespace of documents and the knowledge graph derived from them.
//!
//! Readers take an `Arc` snapshot of the committed graph and never block writers. Writers
//! serialize on a per-universe async mutex, build the next graph on a private clone,
//! persist it and only then publish it, so a failed ingestion changes nothing and readers
//! see each document's effects in full or not at all.

mod storage;

pub use storage::*;

use lore_model::{DocumentId, EntityId, VersionSnapshot};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::canon::CanonRanking;
use crate::config::EngineConfig;
use crate::contradiction::{Contradiction, ContradictionDetector};
use crate::error::{IngestError, StorageError};
use crate::extraction::{ExtractionAdapter, ExtractionBundle, ExtractionOracle, ParseStage};
use crate::knowledge_base::{GraphStats, KnowledgeGraph, RemovalSummary};
use crate::merge::{CommitSummary, MergeEngine, ReconciledView};
use crate::speculation::SpeculationBoundaries;
use crate::subgraph::{export_neighborhood, Subgraph};

/// Source type reported to the oracle for documents without a category.
const UNCATEGORIZED: &str = "uncategorized";

/// A document to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub text: String,
}

impl IngestRequest {
    /// A request whose display name is its id.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: None,
            text: text.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document: DocumentId,
    pub ordinal: u64,
    pub parse_stage: ParseStage,
    pub chunks: usize,
    pub summary: CommitSummary,
}

/// Outcome of ingesting a directory of text files.
#[derive(Debug, Default)]
pub struct FolderReport {
    pub ingested: Vec<IngestReport>,
    /// Files whose document id was already part of the universe.
    pub skipped: Vec<DocumentId>,
    pub failed: Vec<(String, IngestError)>,
}

/// Handle to one universe. Cheap to share behind an `Arc`.
pub struct Universe {
    name: String,
    config: Arc<EngineConfig>,
    oracle: Arc<dyn ExtractionOracle>,
    adapter: ExtractionAdapter,
    detector: ContradictionDetector,
    store: UniverseStore,
    ranking: RwLock<CanonRanking>,
    committed: RwLock<Arc<KnowledgeGraph>>,
    writer: tokio::sync::Mutex<()>,
}

impl Universe {
    /// Open a universe, loading its persisted graph if there is one.
    pub fn open(
        name: impl Into<String>,
        config: Arc<EngineConfig>,
        oracle: Arc<dyn ExtractionOracle>,
    ) -> Result<Self, StorageError> {
        let name = name.into();
        let store = UniverseStore::new(&config.data_dir, &name)?;
        let graph = store.load_graph()?;
        info!(
            universe = %name,
            documents = graph.document_records().len(),
            entities = graph.entities().len(),
            "universe opened"
        );

        Ok(Self {
            adapter: ExtractionAdapter::new(oracle.clone(), config.extraction.clone(), config.oracle.clone()),
            detector: ContradictionDetector::new(config.detection.clone(), config.oracle.clone()),
            ranking: RwLock::new(CanonRanking::new(config.canon.ranking.clone())),
            committed: RwLock::new(Arc::new(graph)),
            writer: tokio::sync::Mutex::new(()),
            name,
            config,
            oracle,
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The committed graph as of now. Later commits do not affect the returned value.
    pub fn snapshot(&self) -> Arc<KnowledgeGraph> {
        self.committed.read().clone()
    }

    fn publish(&self, graph: KnowledgeGraph) {
        *self.committed.write() = Arc::new(graph);
    }

    /// Put a document's text file back the way it was before a write whose graph save failed.
    fn restore_text(&self, id: &DocumentId, previous: Option<&str>) {
        let restored = match previous {
            Some(text) => self.store.write_document(id, text),
            None => self.store.delete_document(id),
        };
        if let Err(err) = restored {
            warn!(universe = %self.name, document = %id, error = %err, "could not restore document text");
        }
    }

    /// Extract, merge and persist one document.
    ///
    /// Fails without touching the universe if the id is taken, the text is blank, the
    /// oracle cannot be reached or its output cannot be parsed.
    pub async fn ingest_document(&self, request: IngestRequest) -> Result<IngestReport, IngestError> {
        let id = DocumentId::new(request.id.as_str())?;
        if request.text.trim().is_empty() {
            return Err(IngestError::EmptyDocument(id));
        }

        let _writer = self.writer.lock().await;
        let current = self.snapshot();
        if current.has_document(&id) {
            return Err(IngestError::DuplicateDocument(id));
        }

        let bundle = self.extract(&id, &request).await?;
        let mut graph = (*current).clone();
        let report = Self::commit(&mut graph, &id, &request, &bundle)?;

        self.store.write_document(&id, &request.text)?;
        if let Err(err) = self.store.save_graph(&graph) {
            self.restore_text(&id, None);
            return Err(err.into());
        }
        self.publish(graph);

        info!(
            universe = %self.name,
            document = %id,
            entities = report.summary.entities_created,
            merged = report.summary.entities_merged,
            relationships = report.summary.relationships_added,
            events = report.summary.timeline_events_added,
            "document ingested"
        );
        Ok(report)
    }

    /// Swap a document's contributions for those of a new text, in one commit.
    pub async fn replace_document(&self, request: IngestRequest) -> Result<IngestReport, IngestError> {
        let id = DocumentId::new(request.id.as_str())?;
        if request.text.trim().is_empty() {
            return Err(IngestError::EmptyDocument(id));
        }

        let _writer = self.writer.lock().await;
        let current = self.snapshot();
        if !current.has_document(&id) {
            return Err(IngestError::UnknownDocument(id));
        }

        let bundle = self.extract(&id, &request).await?;
        let mut graph = (*current).clone();
        graph.remove_document(&id);
        let report = Self::commit(&mut graph, &id, &request, &bundle)?;

        let previous = self.store.read_document(&id)?;
        self.store.write_document(&id, &request.text)?;
        if let Err(err) = self.store.save_graph(&graph) {
            self.restore_text(&id, previous.as_deref());
            return Err(err.into());
        }
        self.publish(graph);

        info!(universe = %self.name, document = %id, "document replaced");
        Ok(report)
    }

    /// Remove a document and everything only it asserted.
    pub async fn remove_document(&self, id: &DocumentId) -> Result<RemovalSummary, IngestError> {
        let _writer = self.writer.lock().await;
        let mut graph = (*self.snapshot()).clone();
        let summary = graph
            .remove_document(id)
            .ok_or_else(|| IngestError::UnknownDocument(id.clone()))?;

        let previous = self.store.read_document(id)?;
        self.store.delete_document(id)?;
        if let Err(err) = self.store.save_graph(&graph) {
            self.restore_text(id, previous.as_deref());
            return Err(err.into());
        }
        self.publish(graph);

        info!(
            universe = %self.name,
            document = %id,
            entities_removed = summary.entities_removed,
            relationships_removed = summary.relationships_removed,
            "document removed"
        );
        Ok(summary)
    }

    /// Ingest every `*.txt` file in `dir`, using the file name as document id.
    ///
    /// Files are processed in name order. Already-ingested ids are skipped and a failing
    /// file does not stop the rest.
    pub async fn ingest_folder(
        &self,
        dir: impl AsRef<Path>,
        category: Option<&str>,
    ) -> Result<FolderReport, IngestError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref()).map_err(StorageError::from)? {
            let path = entry.map_err(StorageError::from)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = FolderReport::default();
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            let id = DocumentId::new(file_name.as_str())?;
            if self.snapshot().has_document(&id) {
                report.skipped.push(id);
                continue;
            }

            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    report.failed.push((file_name, StorageError::from(err).into()));
                    continue;
                }
            };
            let mut request = IngestRequest::new(file_name.as_str(), text);
            if let Some(category) = category {
                request = request.with_category(category);
            }

            match self.ingest_document(request).await {
                Ok(ingested) => report.ingested.push(ingested),
                Err(IngestError::DuplicateDocument(id)) => report.skipped.push(id),
                Err(err) => {
                    warn!(universe = %self.name, file = %file_name, error = %err, "folder ingestion skipped a file");
                    report.failed.push((file_name, err));
                }
            }
        }
        Ok(report)
    }

    /// The stored text of a document, if it was ingested.
    pub fn document_text(&self, id: &DocumentId) -> Result<Option<String>, StorageError> {
        if !self.snapshot().has_document(id) {
            return Ok(None);
        }
        self.store.read_document(id)
    }

    /// Store an alternate version of an entity (alternate timeline, reboot, retcon).
    pub async fn record_version(
        &self,
        entity: EntityId,
        label: impl Into<String>,
        snapshot: VersionSnapshot,
    ) -> Result<(), IngestError> {
        let _writer = self.writer.lock().await;
        let mut graph = (*self.snapshot()).clone();
        graph.record_version(entity, label, snapshot)?;
        self.store.save_graph(&graph)?;
        self.publish(graph);
        Ok(())
    }

    /// Bounded-depth neighborhood of `center`.
    pub fn subgraph(&self, center: EntityId, depth: u32) -> Subgraph {
        export_neighborhood(&self.snapshot(), center, depth)
    }

    /// Run every contradiction check against the current snapshot.
    pub async fn contradictions(&self) -> Vec<Contradiction> {
        let graph = self.snapshot();
        self.detector.detect(&graph, self.oracle.as_ref()).await
    }

    pub fn speculation_boundaries(&self) -> SpeculationBoundaries {
        SpeculationBoundaries::classify(&self.snapshot(), &self.config.speculation)
    }

    /// Canon-resolved view of facts disputed across documents.
    pub fn reconciled_view(&self) -> ReconciledView {
        let ranking = self.ranking.read().clone();
        ReconciledView::build(&self.snapshot(), &ranking, &self.config.detection.location_relations)
    }

    /// Replace the canon hierarchy for this universe's lifetime.
    pub fn set_canon_ranking(&self, ranking: BTreeMap<String, i64>) {
        *self.ranking.write() = CanonRanking::new(ranking);
    }

    pub fn canon_ranking(&self) -> CanonRanking {
        self.ranking.read().clone()
    }

    pub fn stats(&self) -> GraphStats {
        self.snapshot().stats()
    }

    async fn extract(&self, id: &DocumentId, request: &IngestRequest) -> Result<ExtractionBundle, IngestError> {
        let source_type = request.category.as_deref().unwrap_or(UNCATEGORIZED);
        let bundle = self
            .adapter
            .extract(id, &request.text, &request.name, source_type)
            .await?;
        Ok(bundle)
    }

    fn commit(
        graph: &mut KnowledgeGraph,
        id: &DocumentId,
        request: &IngestRequest,
        bundle: &ExtractionBundle,
    ) -> Result<IngestReport, IngestError> {
        let record = graph.register_document(id.clone(), request.name.as_str(), request.category.clone());
        let summary = MergeEngine::commit(graph, id, bundle)?;
        graph.check_integrity()?;
        Ok(IngestReport {
            document: id.clone(),
            ordinal: record.ordinal,
            parse_stage: bundle.parse_stage,
            chunks: bundle.chunks,
            summary,
        })
    }
}

/// Opens each universe at most once per process.
pub struct UniverseRegistry {
    config: Arc<EngineConfig>,
    oracle: Arc<dyn ExtractionOracle>,
    open: Mutex<HashMap<String, Arc<Universe>>>,
}

impl UniverseRegistry {
    pub fn new(config: Arc<EngineConfig>, oracle: Arc<dyn ExtractionOracle>) -> Self {
        Self {
            config,
            oracle,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Get the handle for `name`, opening it on first use.
    pub fn universe(&self, name: &str) -> Result<Arc<Universe>, StorageError> {
        let mut open = self.open.lock();
        if let Some(universe) = open.get(name) {
            return Ok(universe.clone());
        }
        let universe = Arc::new(Universe::open(name, self.config.clone(), self.oracle.clone())?);
        open.insert(name.to_string(), universe.clone());
        Ok(universe)
    }

    /// Universes persisted under the data directory, opened or not.
    pub fn persisted(&self) -> Result<Vec<String>, StorageError> {
        discover_universes(&self.config.data_dir)
    }
}
