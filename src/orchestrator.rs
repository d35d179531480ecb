//! Service wiring and index building for Copiloto.
//!
//! [`Services`] builds the assistants from settings and is what the CLI and HTTP API call.
//! [`Indexer`] turns JSON/JSONL row files into an embedded similarity index.

use crate::biodiversity::{BiodiversityChat, Identification, ImageIdentifier};
use crate::completion::{
    ChatCompletion, ChatCompletionAdapter, ChatMessage, CompletionInput, UnconfiguredCompletion,
};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{CopilotoError, Result};
use crate::interactions::{Interaction, InteractionKind, InteractionLog};
use crate::rag::{EmbeddedIndex, QaOrchestrator, QaResult, SimilarityIndex};
use crate::vector_store::{Document, SqliteVectorStore, VectorStore};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Number of rows embedded per request.
const EMBED_BATCH_SIZE: usize = 100;

/// The components a [`Services`] is assembled from.
pub struct Components {
    /// Sales completion, carrying the sales system prompt.
    pub sales: Arc<dyn ChatCompletion>,
    /// Vision completion for the classification step.
    pub classifier: Arc<dyn ChatCompletion>,
    /// Vision completion for the descriptive step.
    pub describer: Arc<dyn ChatCompletion>,
    /// Completion for free-text biodiversity questions.
    pub biodiversity: Arc<dyn ChatCompletion>,
    /// The loaded index, or the reason it could not be loaded.
    pub index: std::result::Result<Arc<dyn SimilarityIndex>, String>,
    pub interactions: Option<InteractionLog>,
}

/// All caller-facing operations, built once and shared.
pub struct Services {
    settings: Settings,
    prompts: Prompts,
    sales: Arc<dyn ChatCompletion>,
    qa: QaOrchestrator,
    identifier: ImageIdentifier,
    bio_chat: BiodiversityChat,
    interactions: Option<InteractionLog>,
}

impl Services {
    /// Build every service from settings.
    ///
    /// A missing or invalid index does not fail here; the QA path reports it per question.
    /// An endpoint without an API key is left unconfigured, so the other assistant still runs.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;

        let (sales, index) =
            match ChatCompletionAdapter::from_settings(&settings.completion, prompts.sales.system.clone()) {
                Ok(adapter) => {
                    info!("Sales completion model: {}", adapter.model());
                    (Arc::new(adapter) as Arc<dyn ChatCompletion>, Self::load_index(&settings))
                }
                Err(e) => {
                    warn!("Sales QA disabled: {}", e);
                    let reason = format!("sales completion is not configured: {}", e);
                    (Arc::new(UnconfiguredCompletion::new(e.to_string())) as Arc<dyn ChatCompletion>, Err(reason))
                }
            };

        let (classifier, describer, biodiversity) =
            match ChatCompletionAdapter::from_settings(
                &settings.vision.endpoint(),
                prompts.biodiversity.chat_system.clone(),
            ) {
                Ok(vision) => {
                    info!("Vision completion model: {}", vision.model());
                    let classifier: Arc<dyn ChatCompletion> =
                        Arc::new(vision.with_system_prompt(prompts.biodiversity.classify_system.clone()));
                    let describer: Arc<dyn ChatCompletion> =
                        Arc::new(vision.with_system_prompt(prompts.biodiversity.identify_system.clone()));
                    let chat: Arc<dyn ChatCompletion> = Arc::new(vision);
                    (classifier, describer, chat)
                }
                Err(e) => {
                    warn!("Biodiversity assistant disabled: {}", e);
                    let unconfigured: Arc<dyn ChatCompletion> = Arc::new(UnconfiguredCompletion::new(e.to_string()));
                    (unconfigured.clone(), unconfigured.clone(), unconfigured)
                }
            };

        let interactions = if settings.interactions.enabled {
            match InteractionLog::open(&settings.interactions_path()) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Interaction log disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let components = Components {
            sales,
            classifier,
            describer,
            biodiversity,
            index,
            interactions,
        };

        Self::with_components(settings, prompts, components)
    }

    /// Assemble services from explicit components.
    pub fn with_components(settings: Settings, prompts: Prompts, components: Components) -> Result<Self> {
        let template = prompts.sales.qa_template()?;

        let qa = match components.index {
            Ok(index) => QaOrchestrator::new(index, components.sales.clone(), template, settings.rag.top_k),
            Err(reason) => QaOrchestrator::without_index(reason, components.sales.clone(), template),
        };

        let identifier = ImageIdentifier::new(
            components.classifier,
            components.describer,
            &prompts.biodiversity,
        );
        let bio_chat = BiodiversityChat::new(components.biodiversity, settings.history.max_turns);

        Ok(Self {
            settings,
            prompts,
            sales: components.sales,
            qa,
            identifier,
            bio_chat,
            interactions: components.interactions,
        })
    }

    fn load_index(settings: &Settings) -> std::result::Result<Arc<dyn SimilarityIndex>, String> {
        let path = settings.index_path();
        let dimensions = settings.embedding.dimensions as usize;

        let loaded = SqliteVectorStore::open_existing(&path, dimensions).and_then(|store| {
            let embedder = OpenAIEmbedder::from_settings(&settings.embedding)?;
            Ok(Arc::new(EmbeddedIndex::new(Arc::new(store), Arc::new(embedder))) as Arc<dyn SimilarityIndex>)
        });

        loaded.map_err(|e| {
            warn!("Sales QA disabled: {}", e);
            e.to_string()
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn qa(&self) -> &QaOrchestrator {
        &self.qa
    }

    /// Answer a sales question and record it.
    pub async fn ask(&self, question: &str) -> Result<QaResult> {
        let result = self.qa.answer(question).await?;
        self.record(InteractionKind::Pregunta, question, &result.answer);
        Ok(result)
    }

    /// Identify an image and record it under `name` (file name or upload label).
    pub async fn identify(&self, name: &str, image_bytes: &[u8]) -> Result<Identification> {
        let identification = self.identifier.identify(image_bytes).await?;
        self.record(InteractionKind::IdentificacionImagen, name, identification.message());
        Ok(identification)
    }

    /// Answer a biodiversity question in the context of `history` and record it.
    pub async fn ask_biodiversity(&self, question: &str, history: &[ChatMessage]) -> Result<String> {
        let answer = self.bio_chat.ask(question, history).await?;
        self.record(InteractionKind::PreguntaBiodiversidad, question, &answer);
        Ok(answer)
    }

    /// Run a raw completion against the sales endpoint.
    pub async fn complete(&self, input: CompletionInput) -> Result<String> {
        self.sales.complete(input).await
    }

    /// Most recent logged interactions, newest first.
    pub fn recent_interactions(&self, limit: usize) -> Result<Vec<Interaction>> {
        match &self.interactions {
            Some(log) => log.recent(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Best effort: a failure is logged and never reaches the caller.
    fn record(&self, kind: InteractionKind, user_input: &str, ai_response: &str) {
        if let Some(log) = &self.interactions {
            if let Err(e) = log.record(&Interaction::new(kind, user_input, ai_response)) {
                warn!("Failed to record interaction: {}", e);
            }
        }
    }
}

/// Result of indexing one file.
#[derive(Debug)]
pub struct IndexResult {
    /// Source name stored with each row (the file name).
    pub source: String,
    /// Number of rows indexed.
    pub rows_indexed: usize,
    /// Whether indexing was skipped (already indexed).
    pub skipped: bool,
}

/// Builds the similarity index from row files.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Open (or create) the configured index file for writing.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = OpenAIEmbedder::from_settings(&settings.embedding)?;
        let store = SqliteVectorStore::create(
            &settings.index_path(),
            settings.embedding.dimensions as usize,
        )?;
        Ok(Self::new(Arc::new(embedder), Arc::new(store)))
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Index a `.json` (array of objects) or `.jsonl` file, one chunk per row.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn index_file(&self, path: &Path, force: bool) -> Result<IndexResult> {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CopilotoError::InvalidInput(format!("Invalid file path: {}", path.display())))?
            .to_string();

        if !force && self.store.is_source_indexed(&source).await? {
            info!("Source {} is already indexed, skipping", source);
            return Ok(IndexResult {
                source,
                rows_indexed: 0,
                skipped: true,
            });
        }

        let rows = read_rows(path)?;
        debug!("Read {} rows from {}", rows.len(), source);

        let mut documents = Vec::with_capacity(rows.len());
        for (batch_number, batch) in rows.chunks(EMBED_BATCH_SIZE).enumerate() {
            let embeddings = self.embedder.embed_batch(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(CopilotoError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            let offset = batch_number * EMBED_BATCH_SIZE;
            documents.extend(batch.iter().zip(embeddings).enumerate().map(
                |(i, (content, embedding))| {
                    Document::new(source.clone(), Some((offset + i) as u32), content.clone(), embedding)
                },
            ));
        }

        if force {
            self.store.delete_by_source(&source).await?;
        }

        let rows_indexed = self.store.upsert_batch(&documents).await?;
        info!("Indexed {} rows from {}", rows_indexed, source);

        Ok(IndexResult {
            source,
            rows_indexed,
            skipped: false,
        })
    }
}

/// Read a row file into chunk contents, one per row.
pub fn read_rows(path: &Path) -> Result<Vec<String>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let content = std::fs::read_to_string(path)?;

    let values: Vec<Value> = match extension.as_str() {
        "json" => match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => items,
            other => {
                return Err(CopilotoError::InvalidInput(format!(
                    "{} must contain an array of objects, found {}",
                    path.display(),
                    json_type(&other)
                )))
            }
        },
        "jsonl" | "ndjson" => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<Value>, _>>()?,
        _ => {
            return Err(CopilotoError::InvalidInput(format!(
                "Unsupported file type: {} (expected .json or .jsonl)",
                path.display()
            )))
        }
    };

    values
        .iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Object(row) => Ok(row_to_chunk(row)),
            other => Err(CopilotoError::InvalidInput(format!(
                "row {} of {} is {}, expected an object",
                i,
                path.display(),
                json_type(other)
            ))),
        })
        .collect()
}

/// Render one row as `key: value` lines, in column order.
pub fn row_to_chunk(row: &Map<String, Value>) -> String {
    row.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}: {}", key, value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biodiversity::OrganismLabel;
    use crate::completion::testing::ScriptedCompletion;
    use crate::embedding::testing::KeywordEmbedder;
    use crate::vector_store::MemoryVectorStore;
    use serde_json::json;

    fn indexer() -> (Indexer, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        let indexer = Indexer::new(
            Arc::new(KeywordEmbedder::new(&["salud", "recreación"])),
            store.clone(),
        );
        (indexer, store)
    }

    #[test]
    fn test_row_to_chunk_keeps_column_order() {
        let row = json!({"id": 3, "sector": "Salud", "activa": true, "notas": null});
        let Value::Object(map) = row else { unreachable!() };
        assert_eq!(row_to_chunk(&map), "id: 3\nsector: Salud\nactiva: true\nnotas: ");
    }

    #[tokio::test]
    async fn test_index_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empresas.json");
        std::fs::write(
            &path,
            json!([
                {"id": 1, "intereses": "recreación"},
                {"id": 2, "intereses": "salud"}
            ])
            .to_string(),
        )
        .unwrap();

        let (indexer, store) = indexer();
        let result = indexer.index_file(&path, false).await.unwrap();

        assert_eq!(result.source, "empresas.json");
        assert_eq!(result.rows_indexed, 2);
        assert!(!result.skipped);

        let hits = store.search(&indexer.embedder().embed("salud").await.unwrap(), 1).await.unwrap();
        assert_eq!(hits[0].document.content, "id: 2\nintereses: salud");
        assert_eq!(hits[0].document.row_index, Some(1));
    }

    #[tokio::test]
    async fn test_index_jsonl_skips_then_forces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arquetipos.jsonl");
        std::fs::write(&path, "{\"arquetipo\": \"cuidador\"}\n\n{\"arquetipo\": \"explorador\"}\n").unwrap();

        let (indexer, store) = indexer();
        assert_eq!(indexer.index_file(&path, false).await.unwrap().rows_indexed, 2);

        let again = indexer.index_file(&path, false).await.unwrap();
        assert!(again.skipped);
        assert_eq!(store.document_count().await.unwrap(), 2);

        std::fs::write(&path, "{\"arquetipo\": \"sabio\"}\n").unwrap();
        let forced = indexer.index_file(&path, true).await.unwrap();
        assert_eq!(forced.rows_indexed, 1);
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jsonl");
        std::fs::write(&path, "{\"id\": 1}\n").unwrap();

        let store = Arc::new(MemoryVectorStore::new());
        Indexer::new(Arc::new(KeywordEmbedder::new(&["id"])), store.clone())
            .index_file(&path, false)
            .await
            .unwrap();

        let broken = Indexer::new(Arc::new(KeywordEmbedder::failing()), store.clone());
        assert!(broken.index_file(&path, true).await.is_err());
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[test]
    fn test_read_rows_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();

        let csv = dir.path().join("datos.csv");
        std::fs::write(&csv, "id,nombre\n1,x\n").unwrap();
        assert!(matches!(read_rows(&csv), Err(CopilotoError::InvalidInput(_))));

        let scalar_rows = dir.path().join("numeros.json");
        std::fs::write(&scalar_rows, "[1, 2]").unwrap();
        assert!(matches!(read_rows(&scalar_rows), Err(CopilotoError::InvalidInput(_))));

        let object = dir.path().join("objeto.json");
        std::fs::write(&object, "{\"id\": 1}").unwrap();
        assert!(matches!(read_rows(&object), Err(CopilotoError::InvalidInput(_))));
    }

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn services(
        sales: Arc<ScriptedCompletion>,
        classifier: Arc<ScriptedCompletion>,
        index: std::result::Result<Arc<dyn SimilarityIndex>, String>,
    ) -> Services {
        Services::with_components(
            Settings::default(),
            Prompts::default(),
            Components {
                sales,
                classifier,
                describer: Arc::new(ScriptedCompletion::replying(&["Un **colibrí**."])),
                biodiversity: Arc::new(ScriptedCompletion::replying(&["Vive en bosques andinos."])),
                index,
                interactions: Some(InteractionLog::in_memory().unwrap()),
            },
        )
        .unwrap()
    }

    fn empty_index() -> Arc<dyn SimilarityIndex> {
        Arc::new(EmbeddedIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(KeywordEmbedder::new(&["salud"])),
        ))
    }

    #[tokio::test]
    async fn test_each_flow_is_recorded() {
        let services = services(
            Arc::new(ScriptedCompletion::replying(&["¡Hola! 😊"])),
            Arc::new(ScriptedCompletion::replying(&["animal"])),
            Ok(empty_index()),
        );

        services.ask("hola").await.unwrap();
        let identified = services.identify("foto.png", PNG).await.unwrap();
        assert_eq!(identified.label(), &OrganismLabel::Animal);
        services.ask_biodiversity("¿Dónde vive?", &[]).await.unwrap();

        let recent = services.recent_interactions(10).unwrap();
        let kinds: Vec<InteractionKind> = recent.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InteractionKind::PreguntaBiodiversidad,
                InteractionKind::IdentificacionImagen,
                InteractionKind::Pregunta
            ]
        );
        assert_eq!(recent[1].ai_response, "Un **colibrí**.");
    }

    #[tokio::test]
    async fn test_failed_answers_are_not_recorded() {
        let sales = Arc::new(ScriptedCompletion::replying(&[]));
        let services = services(
            sales.clone(),
            Arc::new(ScriptedCompletion::replying(&[])),
            Err("index file not found".to_string()),
        );

        assert!(!services.qa().is_available());
        let err = services.ask("¿Qué compra la empresa 3?").await.unwrap_err();
        assert!(matches!(err, CopilotoError::IndexUnavailable(_)));
        assert_eq!(sales.call_count(), 0);
        assert!(services.recent_interactions(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_uses_sales_endpoint() {
        let sales = Arc::new(ScriptedCompletion::replying(&["respuesta"]));
        let services = services(sales.clone(), Arc::new(ScriptedCompletion::replying(&[])), Ok(empty_index()));

        let answer = services.complete("texto libre".into()).await.unwrap();
        assert_eq!(answer, "respuesta");
        assert_eq!(sales.calls(), vec![CompletionInput::RawString("texto libre".to_string())]);
    }

    /// Serve a fixed reply from an OpenAI-compatible `/chat/completions` route.
    async fn spawn_vision_endpoint(reply: &'static str) -> String {
        use axum::{routing::post, Json, Router};

        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move {
                Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_biodiversity_runs_without_sales_key() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("COPILOTO_TEST_VISION_ONLY_KEY", "sk-vision-only");

        let mut settings = Settings::default();
        settings.completion.api_key_env = "COPILOTO_TEST_UNSET_SALES_KEY".to_string();
        settings.vision.api_key_env = "COPILOTO_TEST_VISION_ONLY_KEY".to_string();
        settings.vision.api_base = spawn_vision_endpoint("No organismo").await;
        settings.index.path = dir.path().join("index.db").display().to_string();
        settings.interactions.enabled = false;

        let services = Services::new(settings).unwrap();

        let identified = services.identify("foto.png", PNG).await.unwrap();
        assert_eq!(identified.label(), &OrganismLabel::NoOrganismo);

        assert!(!services.qa().is_available());
        assert!(services
            .qa()
            .unavailable_reason()
            .unwrap()
            .contains("COPILOTO_TEST_UNSET_SALES_KEY"));
        let err = services.ask("¿Qué compra la empresa 3?").await.unwrap_err();
        assert!(matches!(err, CopilotoError::IndexUnavailable(_)));
        let err = services.complete("hola".into()).await.unwrap_err();
        assert!(matches!(err, CopilotoError::Config(_)));
    }
}
