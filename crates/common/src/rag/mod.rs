//! Retrieval-augmented generation chain
//!
//! Retrieve the nearest documents for a question, fill them into a prompt and
//! hand the prompt to a chat model. Without a chat model the chain answers
//! with a fixed message listing what was retrieved.
//!
//! Which of the two runs is decided once, when the chain is built.

use crate::errors::Result;
use crate::llm::ChatModel;
use crate::vectorstore::{Document, VectorStore};
use std::sync::Arc;
use tracing::debug;

/// Documents fed to the prompt per question
pub const RETRIEVER_TOP_K: usize = 2;

/// Prompt with `{context}` and `{question}` slots
pub const RAG_PROMPT_TEMPLATE: &str = "
Answer the question based on the following context:

Context: {context}

Question: {question}

Answer:
";

/// Minimal two-slot prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The default RAG prompt
    pub fn rag() -> Self {
        Self::new(RAG_PROMPT_TEMPLATE)
    }

    /// Substitute both slots in one pass, so slot markers inside the
    /// substituted values are left alone
    pub fn format(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Top-k similarity retriever over a vectorstore
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, k: usize) -> Self {
        Self { store, k }
    }

    pub async fn invoke(&self, question: &str) -> Result<Vec<Document>> {
        self.store.similarity_search(question, self.k).await
    }
}

/// The two ways a chain can answer
pub enum RagChain {
    /// Retrieve, fill the prompt, call the chat model once
    LlmBacked {
        retriever: Retriever,
        prompt: PromptTemplate,
        llm: Arc<dyn ChatModel>,
    },
    /// Retrieve and report the documents without generation
    Fallback { retriever: Retriever },
}

impl RagChain {
    /// Build the chain bound to `store`. `llm` decides the variant.
    pub fn new(store: Arc<dyn VectorStore>, llm: Option<Arc<dyn ChatModel>>) -> Self {
        let retriever = Retriever::new(store, RETRIEVER_TOP_K);
        match llm {
            Some(llm) => RagChain::LlmBacked {
                retriever,
                prompt: PromptTemplate::rag(),
                llm,
            },
            None => RagChain::Fallback { retriever },
        }
    }

    pub fn is_llm_backed(&self) -> bool {
        matches!(self, RagChain::LlmBacked { .. })
    }

    /// Answer a question
    pub async fn answer(&self, question: &str) -> Result<String> {
        match self {
            RagChain::LlmBacked {
                retriever,
                prompt,
                llm,
            } => {
                let docs = retriever.invoke(question).await?;
                let context = join_documents(&docs);
                let filled = prompt.format(&context, question);
                debug!(documents = docs.len(), model = llm.model_name(), "Invoking LLM");
                llm.invoke(&filled).await
            }
            RagChain::Fallback { retriever } => {
                let docs = retriever.invoke(question).await?;
                debug!(documents = docs.len(), "Answering without LLM");
                Ok(fallback_answer(question, &docs))
            }
        }
    }
}

fn join_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Deterministic answer used when no chat model is configured
pub fn fallback_answer(question: &str, docs: &[Document]) -> String {
    let context = docs
        .iter()
        .map(|d| format!("- {}", d.page_content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Retrieved documents:\n\
         {context}\n\
         \n\
         Fallback answer: the documents above are related to the question '{question}'.\n\
         Set OPENAI_API_KEY to receive generated answers.\n\
         Vector search itself is working normally."
    )
}
