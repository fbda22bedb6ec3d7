// src/services/generator.rs
//
// Question-set generation from a content file's extracted text. Generation
// runs once when an admin uploads a file; every later fetch is a plain
// database read. The trait keeps the seam open for an LLM-backed generator
// without touching the handlers.

use async_trait::async_trait;
use regex::Regex;

use crate::error::AppError;
use crate::models::quiz::QuizQuestion;

#[async_trait]
pub trait QuizGenerator: Send + Sync {
    /// Produces `count` multiple-choice questions for the given document.
    async fn generate(
        &self,
        title: &str,
        text: &str,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, AppError>;
}

/// Default generator: builds "which statement is accurate?" questions from
/// the document's own sentences, with templated distractors. Deterministic,
/// so repeated uploads of the same text produce the same set.
pub struct OutlineQuizGenerator {
    sentence_split: Regex,
}

/// Sentences shorter than this are too thin to anchor a question.
const MIN_SENTENCE_LEN: usize = 25;

/// Options are clipped so a run-on sentence doesn't flood the quiz UI.
const MAX_OPTION_LEN: usize = 180;

impl OutlineQuizGenerator {
    pub fn new() -> Self {
        OutlineQuizGenerator {
            sentence_split: Regex::new(r"[.!?]+\s+|\n+").expect("sentence split regex is valid"),
        }
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.sentence_split
            .split(text)
            .map(str::trim)
            .filter(|s| s.len() >= MIN_SENTENCE_LEN)
            .collect()
    }
}

impl Default for OutlineQuizGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn clip(s: &str) -> String {
    if s.len() <= MAX_OPTION_LEN {
        return s.to_string();
    }
    let mut end = MAX_OPTION_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn distractor(title: &str, ordinal: usize) -> String {
    match ordinal % 3 {
        0 => format!("The material in \"{}\" does not address this point.", title),
        1 => format!("\"{}\" recommends the opposite of this approach.", title),
        _ => format!("This claim is contradicted elsewhere in \"{}\".", title),
    }
}

#[async_trait]
impl QuizGenerator for OutlineQuizGenerator {
    async fn generate(
        &self,
        title: &str,
        text: &str,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let sentences = self.sentences(text);
        if sentences.is_empty() {
            return Err(AppError::BadRequest(
                "Extracted text is too short to generate a quiz".to_string(),
            ));
        }

        let mut questions = Vec::with_capacity(count);
        for i in 0..count {
            let sentence = sentences[i % sentences.len()];
            let correct = clip(sentence);

            // Deterministic option order: the correct answer rotates
            // through the four slots.
            let mut options = vec![
                distractor(title, i),
                distractor(title, i + 1),
                distractor(title, i + 2),
            ];
            options.insert(i % 4, correct.clone());

            questions.push(QuizQuestion {
                prompt: format!(
                    "Which of the following statements from \"{}\" is accurate?",
                    title
                ),
                options,
                answer: correct,
                analysis: Some(format!("Stated directly in \"{}\".", title)),
            });
        }

        Ok(questions)
    }
}
