//! Remote-first study material generation with a template fallback.

use std::str::FromStr;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::extract::preprocess_content;
use crate::models::{CardDraft, Difficulty, GenerationSource, Generated, QuizQuestion};
use crate::remote::{
    build_flashcard_prompt, build_question_prompt, parse_flashcards, parse_questions, RemoteClient, RemoteError,
};
use crate::templates::TemplateGenerator;

/// Whether the hosted model may be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Remote,
    Offline,
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(GenerationMode::Remote),
            "offline" => Ok(GenerationMode::Offline),
            other => Err(format!("unknown generation mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub content: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub count: usize,
}

pub struct ContentGenerator {
    mode: GenerationMode,
    remote: Option<RemoteClient>,
    templates: TemplateGenerator,
    cache: TtlCache<String>,
}

impl ContentGenerator {
    pub fn new(mode: GenerationMode, remote: Option<RemoteClient>, cache_ttl: chrono::Duration) -> Self {
        Self {
            mode,
            remote,
            templates: TemplateGenerator::new(),
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub fn offline() -> Self {
        Self::new(GenerationMode::Offline, None, chrono::Duration::seconds(300))
    }

    pub async fn flashcards(&mut self, req: &GenerationRequest) -> Generated<Vec<CardDraft>> {
        if self.mode == GenerationMode::Remote {
            let content = preprocess_content(&req.content);
            let prompt = build_flashcard_prompt(&content, &req.topic, req.difficulty, req.count);

            match self.remote_text(&prompt).await {
                Ok(text) => {
                    let mut cards = parse_flashcards(&text);
                    if !cards.is_empty() {
                        cards.truncate(req.count);
                        info!("generated {} flashcards for '{}' (source: remote)", cards.len(), req.topic);
                        return Generated {
                            source: GenerationSource::Remote,
                            items: cards,
                        };
                    }
                    self.cache.remove(&prompt);
                    warn!("model response contained no flashcards, falling back to templates");
                }
                Err(e) => warn!("remote flashcard generation failed, falling back to templates: {}", e),
            }
        }

        let cards = self.templates.flashcards(&req.content, &req.topic, req.difficulty, req.count);
        info!("generated {} flashcards for '{}' (source: template)", cards.len(), req.topic);
        Generated {
            source: GenerationSource::Template,
            items: cards,
        }
    }

    pub async fn questions<R: Rng + ?Sized>(
        &mut self,
        req: &GenerationRequest,
        rng: &mut R,
    ) -> Generated<Vec<QuizQuestion>> {
        if self.mode == GenerationMode::Remote {
            let content = preprocess_content(&req.content);
            let prompt = build_question_prompt(&content, &req.topic, req.difficulty, req.count);

            match self.remote_text(&prompt).await {
                Ok(text) => {
                    let mut questions = parse_questions(&text, &req.topic, req.difficulty);
                    if !questions.is_empty() {
                        questions.truncate(req.count);
                        info!("generated {} questions for '{}' (source: remote)", questions.len(), req.topic);
                        return Generated {
                            source: GenerationSource::Remote,
                            items: questions,
                        };
                    }
                    self.cache.remove(&prompt);
                    warn!("model response contained no questions, falling back to templates");
                }
                Err(e) => warn!("remote question generation failed, falling back to templates: {}", e),
            }
        }

        let questions = self
            .templates
            .questions(&req.content, &req.topic, req.difficulty, req.count, rng);
        info!("generated {} questions for '{}' (source: template)", questions.len(), req.topic);
        Generated {
            source: GenerationSource::Template,
            items: questions,
        }
    }

    async fn remote_text(&mut self, prompt: &str) -> Result<String, RemoteError> {
        if let Some(hit) = self.cache.get(prompt) {
            debug!("model response served from cache");
            return Ok(hit);
        }

        let remote = self.remote.as_ref().ok_or(RemoteError::MissingCredential)?;
        let text = remote.generate_text(prompt).await?;
        self.cache.insert(prompt, text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;
    use crate::test_support::serve;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const CONTENT: &str = "Photosynthesis converts light into chemical energy inside chloroplasts.";

    fn request(count: usize) -> GenerationRequest {
        GenerationRequest {
            content: CONTENT.to_string(),
            topic: "biology".to_string(),
            difficulty: Difficulty::Beginner,
            count,
        }
    }

    async fn model_server(reply: &'static str, hits: Arc<AtomicUsize>) -> String {
        let router = Router::new().route(
            "/model",
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!([{ "generated_text": reply }]))
                }
            }),
        );
        format!("{}/model", serve(router).await)
    }

    fn remote_generator(url: String) -> ContentGenerator {
        let client = RemoteClient::new(url, Some("key".to_string()), Duration::from_secs(5)).unwrap();
        ContentGenerator::new(GenerationMode::Remote, Some(client), chrono::Duration::seconds(300))
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Remote".parse::<GenerationMode>(), Ok(GenerationMode::Remote));
        assert_eq!("offline".parse::<GenerationMode>(), Ok(GenerationMode::Offline));
        assert!("mock".parse::<GenerationMode>().is_err());
    }

    #[tokio::test]
    async fn test_remote_flashcards() {
        let hits = Arc::new(AtomicUsize::new(0));
        let reply = "Q: What is photosynthesis?\nA: Turning light into chemical energy.\n---\n\
                     Q: Where does it happen?\nA: Inside the chloroplasts of plant cells.";
        let mut gen = remote_generator(model_server(reply, hits.clone()).await);

        let out = gen.flashcards(&request(1)).await;
        assert_eq!(out.source, GenerationSource::Remote);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].question, "What is photosynthesis?");

        // Same prompt is answered from the cache.
        let again = gen.flashcards(&request(1)).await;
        assert_eq!(again.source, GenerationSource::Remote);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut gen = remote_generator(model_server("I cannot help with that.", hits.clone()).await);

        let out = gen.flashcards(&request(3)).await;
        assert_eq!(out.source, GenerationSource::Template);
        assert_eq!(out.items.len(), 3);

        // Unusable replies are not cached.
        gen.flashcards(&request(3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_status_falls_back() {
        let router = Router::new().route("/model", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }));
        let url = format!("{}/model", serve(router).await);
        let mut gen = remote_generator(url);

        let out = gen.flashcards(&request(2)).await;
        assert_eq!(out.source, GenerationSource::Template);
        assert_eq!(out.items.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_client_falls_back() {
        let mut gen = ContentGenerator::new(GenerationMode::Remote, None, chrono::Duration::seconds(60));
        let out = gen.flashcards(&request(2)).await;
        assert_eq!(out.source, GenerationSource::Template);
    }

    #[tokio::test]
    async fn test_offline_mode_skips_network() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = model_server("Q: Unused question?\nA: Unused answer text.", hits.clone()).await;
        let client = RemoteClient::new(url, Some("key".to_string()), Duration::from_secs(5)).unwrap();
        let mut gen = ContentGenerator::new(GenerationMode::Offline, Some(client), chrono::Duration::seconds(60));

        let out = gen.flashcards(&request(2)).await;
        assert_eq!(out.source, GenerationSource::Template);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_questions() {
        let hits = Arc::new(AtomicUsize::new(0));
        let reply = "Q: Where does photosynthesis occur?\nA) Nucleus\nB) Chloroplast\nC) Vacuole\nD) Wall\nCorrect: B";
        let mut gen = remote_generator(model_server(reply, hits).await);
        let mut rng = StdRng::seed_from_u64(3);

        let out = gen.questions(&request(5), &mut rng).await;
        assert_eq!(out.source, GenerationSource::Remote);
        assert_eq!(out.items.len(), 1);
        assert!(matches!(out.items[0].kind, QuestionKind::MultipleChoice { correct: 1, .. }));
    }

    #[tokio::test]
    async fn test_offline_questions_never_empty() {
        let mut gen = ContentGenerator::offline();
        let mut rng = StdRng::seed_from_u64(3);
        let req = GenerationRequest {
            content: "The cat sat on the mat".to_string(),
            topic: String::new(),
            difficulty: Difficulty::Intermediate,
            count: 4,
        };

        let out = gen.questions(&req, &mut rng).await;
        assert_eq!(out.source, GenerationSource::Template);
        assert_eq!(out.items.len(), 4);
        assert!(out.items[0].question.contains("concept"));
    }
}
