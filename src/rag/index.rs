use async_trait::async_trait;
use chromadb::client::{ChromaClient, ChromaClientOptions};
use chromadb::collection::{ChromaCollection, QueryOptions};

use crate::llm::embeddings::EmbeddingsClient;

/// One retrieved text span and where it came from.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub source: String,
    pub text: String,
}

/// External document index collaborator.
///
/// Index construction and document ingestion happen outside this crate;
/// the assistant only reads top-k fragments through this contract.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Fragment>, String>;
}

/// Index over a ChromaDB collection, queried by embedding the question.
pub struct ChromaIndex {
    collection: ChromaCollection,
    embeddings: EmbeddingsClient,
}

impl ChromaIndex {
    /// Connects to a Chroma server and opens the named collection.
    pub async fn connect(
        url: &str,
        collection_name: &str,
        embeddings: EmbeddingsClient,
    ) -> Result<Self, String> {
        let client = ChromaClient::new(ChromaClientOptions {
            url: Some(url.to_string()),
            ..Default::default()
        })
        .await
        .map_err(|err| format!("cannot connect to Chroma at {url}: {err}"))?;

        let collection = client
            .get_or_create_collection(collection_name, None)
            .await
            .map_err(|err| format!("cannot open collection '{collection_name}': {err}"))?;

        Ok(Self {
            collection,
            embeddings,
        })
    }
}

#[async_trait]
impl DocumentIndex for ChromaIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Fragment>, String> {
        let embedding = self
            .embeddings
            .embed_query(query)
            .await
            .map_err(|err| format!("query embedding failed: {err}"))?;

        let options = QueryOptions {
            query_texts: None,
            query_embeddings: Some(vec![embedding]),
            where_metadata: None,
            where_document: None,
            n_results: Some(k),
            include: None,
        };

        let result = self
            .collection
            .query(options, None)
            .await
            .map_err(|err| format!("index query failed: {err}"))?;

        let documents = result
            .documents
            .and_then(|mut groups| {
                if groups.is_empty() {
                    None
                } else {
                    Some(groups.remove(0))
                }
            })
            .unwrap_or_default();
        let metadatas = result
            .metadatas
            .and_then(|mut groups| {
                if groups.is_empty() {
                    None
                } else {
                    Some(groups.remove(0))
                }
            })
            .unwrap_or_default();

        let mut fragments = Vec::with_capacity(documents.len());
        for (position, text) in documents.into_iter().enumerate() {
            let source = metadatas
                .get(position)
                .and_then(|metadata| metadata.as_ref())
                .and_then(|metadata| metadata.get("source"))
                .and_then(|value| value.as_str())
                .unwrap_or("document")
                .to_string();
            fragments.push(Fragment { source, text });
        }

        Ok(fragments)
    }
}
