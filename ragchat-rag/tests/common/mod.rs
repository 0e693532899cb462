//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ragchat_rag::{EmbeddingProvider, RagError};

pub const DIM: usize = 512;

/// Bag-of-words embedding: each lowercase word is hashed into one of `DIM`
/// buckets and the vector is L2-normalised. Texts sharing words end up close.
pub struct WordHashEmbedder;

pub fn word_hash_embedding(text: &str) -> Vec<f32> {
    let mut emb = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        // FNV-1a
        let hash = word.to_lowercase().bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100_0000_01b3)
        });
        emb[(hash % DIM as u64) as usize] += 1.0;
    }
    let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    } else {
        emb[0] = 1.0;
    }
    emb
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> ragchat_rag::Result<Vec<f32>> {
        Ok(word_hash_embedding(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Like [`WordHashEmbedder`] but fails for any text containing `FAIL`.
pub struct FlakyEmbedder;

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> ragchat_rag::Result<Vec<f32>> {
        if text.contains("FAIL") {
            return Err(RagError::EmbeddingError {
                provider: "flaky".to_string(),
                message: "refused".to_string(),
            });
        }
        Ok(word_hash_embedding(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Like [`WordHashEmbedder`] but sleeps before answering for the listed
/// texts, recording the order in which those delayed embeddings finish.
pub struct SlowEmbedder {
    delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
}

impl SlowEmbedder {
    pub fn new<'a>(delays_ms: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            delays: delays_ms
                .into_iter()
                .map(|(text, ms)| (text.to_string(), Duration::from_millis(ms)))
                .collect(),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Delayed texts in the order their embeddings finished.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> ragchat_rag::Result<Vec<f32>> {
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
            self.completed.lock().unwrap().push(text.to_string());
        }
        Ok(word_hash_embedding(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}
