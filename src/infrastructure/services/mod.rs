//! Infrastructure services

mod knowledge_service;

pub use knowledge_service::{
    CreateKnowledgeBaseRequest, CreateTagRequest, KnowledgeService, UpdateKnowledgeBaseRequest,
};
