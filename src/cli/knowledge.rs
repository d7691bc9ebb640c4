//! Knowledge base commands - create, import, search and tag listing

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::ingestion::{ChunkingOptions, ImportRequest, ImportSource, RecursiveChunkingConfig};
use crate::domain::knowledge_base::{
    EmbeddingSettings, KnowledgeBaseConfig, KnowledgeBaseId, SearchScope,
};
use crate::infrastructure::ingestion::IngestionPipeline;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::services::{CreateKnowledgeBaseRequest, KnowledgeService};
use crate::infrastructure::storage::StoreFactory;

use super::{CreateKbArgs, ImportArgs, SearchArgs, Strategy, TagsArgs};

pub async fn create_kb(args: CreateKbArgs) -> anyhow::Result<()> {
    let (config, service) = bootstrap().await?;

    let mut kb_config = KnowledgeBaseConfig::default();
    if let Some(strategy) = args.strategy {
        kb_config = kb_config.with_chunking(match strategy {
            Strategy::Recursive => config.ingestion.recursive(),
            Strategy::Semantic => config.ingestion.semantic(),
        });
    }
    if let (Some(model), Some(dimensions)) = (args.embedding_model, args.dimensions) {
        kb_config = kb_config.with_embedding(EmbeddingSettings::new(model, dimensions));
    }

    let kb = service
        .create_knowledge_base(CreateKnowledgeBaseRequest {
            id: args.id,
            name: args.name,
            description: args.description,
            config: Some(kb_config),
        })
        .await?;

    print_json(&kb)
}

pub async fn import(args: ImportArgs) -> anyhow::Result<()> {
    let (_, service) = bootstrap().await?;
    let kb_id = KnowledgeBaseId::new(&args.kb)?;

    let source = match (args.file, args.text) {
        (Some(path), _) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            ImportSource::file(filename, bytes)
        }
        (None, Some(text)) => ImportSource::text(text),
        (None, None) => anyhow::bail!("either --file or --text is required"),
    };

    let mut request = ImportRequest::new(kb_id, source);
    if let Some(chunk_size) = args.chunk_size {
        request = request.with_chunking(ChunkingOptions::Recursive(RecursiveChunkingConfig::new(
            chunk_size,
            args.chunk_overlap.unwrap_or(0),
        )));
    }
    if let Some(title) = args.title {
        request = request.with_title(title);
    }

    let outcome = service.import_document(request).await?;
    print_json(&outcome)
}

pub async fn search(args: SearchArgs) -> anyhow::Result<()> {
    let (config, service) = bootstrap().await?;

    let scope = SearchScope::knowledge_base(KnowledgeBaseId::new(&args.kb)?).with_tags(args.tags);
    let top_k = args.top_k.unwrap_or(config.search.top_k);

    let response = service.search_full_text(scope, &args.query, top_k).await?;
    print_json(&response)
}

pub async fn tags(args: TagsArgs) -> anyhow::Result<()> {
    let (_, service) = bootstrap().await?;

    let tags = service.list_tags(&args.kb).await?;
    print_json(&tags)
}

/// Load configuration, start logging and wire the service
///
/// The binary ships no embedder: imports store chunks only and search is lexical.
async fn bootstrap() -> anyhow::Result<(AppConfig, KnowledgeService)> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    let store = StoreFactory::create(config.storage.backend, &config.database).await?;
    info!(store = store.store_type(), "Knowledge store ready");

    let mut pipeline =
        IngestionPipeline::new(store.clone()).with_default_chunking(config.ingestion.recursive());
    if let Some(timeout) = config.ingestion.stage_timeout() {
        pipeline = pipeline.with_stage_timeout(timeout);
    }

    let service = KnowledgeService::new(store, pipeline)
        .with_distance_function(config.search.distance_function);

    Ok((config, service))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
