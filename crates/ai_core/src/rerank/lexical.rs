//! In-process lexical cross-encoder
//!
//! Scores each (query, document) pair with BM25 statistics computed over
//! the candidate batch, squashed into `[0, 1)`. The model is immutable after
//! `load`, so one instance serves concurrent callers.
//!
//! Memory accounting mirrors a neural reranker: loading needs the model
//! footprint to fit on the device, and every batch needs
//! `footprint + tokens × activation_bytes_per_token`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::{
    config::{DeviceProfile, LexicalModelConfig},
    error::InferenceError,
};

/// Loaded lexical cross-encoder bound to one device
#[derive(Debug, Clone)]
pub struct LexicalCrossEncoder {
    config: LexicalModelConfig,
    device: DeviceProfile,
}

impl LexicalCrossEncoder {
    /// Load the model onto `device`
    ///
    /// Fails with [`InferenceError::ResourceExhausted`] when the model
    /// footprint does not fit the device memory.
    pub fn load(config: LexicalModelConfig, device: DeviceProfile) -> Result<Self, InferenceError> {
        if config.footprint_bytes > device.memory_bytes {
            warn!(
                device = %device.name,
                required = config.footprint_bytes,
                available = device.memory_bytes,
                "Rerank model does not fit on device"
            );
            return Err(InferenceError::ResourceExhausted {
                device: device.name,
                required: config.footprint_bytes,
                available: device.memory_bytes,
            });
        }

        info!(
            device = %device.name,
            footprint = config.footprint_bytes,
            "Lexical cross-encoder loaded"
        );
        Ok(Self { config, device })
    }

    /// Device the model is loaded on
    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    /// Score every document against `query`, in input order
    pub fn score<S: AsRef<str>>(&self, query: &str, documents: &[S]) -> Result<Vec<f32>, InferenceError> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        let docs: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let tokens = query_terms.len() as u64 + docs.iter().map(|d| d.len() as u64).sum::<u64>();
        let required = self.config.footprint_bytes.saturating_add(
            tokens.saturating_mul(self.config.activation_bytes_per_token),
        );
        if required > self.device.memory_bytes {
            warn!(
                device = %self.device.name,
                required,
                available = self.device.memory_bytes,
                "Rerank batch exceeds device memory"
            );
            return Err(InferenceError::ResourceExhausted {
                device: self.device.name.clone(),
                required,
                available: self.device.memory_bytes,
            });
        }

        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.bm25(&query_terms, &docs);
        debug!(documents = scores.len(), tokens, "Scored rerank batch");
        Ok(scores)
    }

    #[allow(clippy::cast_precision_loss)]
    fn bm25(&self, query_terms: &HashSet<String>, docs: &[Vec<String>]) -> Vec<f32> {
        let n = docs.len() as f32;
        let avg_len = (docs.iter().map(Vec::len).sum::<usize>() as f32 / n).max(1.0);

        let mut document_frequency: HashMap<&str, f32> = HashMap::new();
        for doc in docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                if query_terms.contains(term) {
                    *document_frequency.entry(term).or_default() += 1.0;
                }
            }
        }

        let (k1, b) = (self.config.k1, self.config.b);
        docs.iter()
            .map(|doc| {
                let mut term_frequency: HashMap<&str, f32> = HashMap::new();
                for term in doc {
                    if query_terms.contains(term) {
                        *term_frequency.entry(term.as_str()).or_default() += 1.0;
                    }
                }

                let length_norm = 1.0 - b + b * doc.len() as f32 / avg_len;
                let raw: f32 = term_frequency
                    .iter()
                    .map(|(term, tf)| {
                        let df = document_frequency.get(term).copied().unwrap_or(0.0);
                        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                        idf * tf * (k1 + 1.0) / (tf + k1 * length_norm)
                    })
                    .sum();
                1.0 - (-raw).exp()
            })
            .collect()
    }
}

/// Lowercase NFC word tokens
fn tokenize(text: &str) -> Vec<String> {
    domain::normalize_query(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
