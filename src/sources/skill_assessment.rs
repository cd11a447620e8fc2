use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;

use crate::models::{Claim, ClaimType, SourceResult};

use super::{within_deadline, SourceError, SourceKind, VerificationSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct: String,
}

/// Scores skill claims from the candidate's answers to a multiple-choice bank.
#[derive(Debug, Clone)]
pub struct SkillAssessmentSource {
    bank: HashMap<String, Vec<Question>>,
}

impl Default for SkillAssessmentSource {
    fn default() -> Self {
        Self::new(default_bank())
    }
}

impl SkillAssessmentSource {
    /// Bank keys are matched case-insensitively against the claim text.
    pub fn new(bank: HashMap<String, Vec<Question>>) -> Self {
        let bank = bank
            .into_iter()
            .map(|(skill, questions)| (skill.to_lowercase(), questions))
            .collect();
        Self { bank }
    }

    pub fn questions_for(&self, skill: &str) -> Option<&[Question]> {
        self.bank.get(&skill.trim().to_lowercase()).map(Vec::as_slice)
    }

    fn score(&self, claim: &Claim) -> Result<SourceResult, SourceError> {
        let questions = self
            .questions_for(&claim.text)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| SourceError::Unavailable(format!("no assessment for {}", claim.text)))?;
        let responses = &claim.context.assessment_responses;
        if responses.is_empty() {
            return Err(SourceError::MissingHandle("assessment responses"));
        }

        let correct = correct_answers(questions, responses);
        let score = correct as f64 / questions.len() as f64;
        // Short tests say less about the candidate.
        let confidence = (0.5 + 0.1 * questions.len() as f64).min(0.95);

        Ok(SourceResult::ok(
            SourceKind::SkillAssessment,
            &claim.id,
            score,
            confidence,
            json!({ "questions": questions.len(), "correct": correct }),
        ))
    }
}

#[async_trait]
impl VerificationSource for SkillAssessmentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SkillAssessment
    }

    fn supports(&self, claim_type: ClaimType) -> bool {
        claim_type == ClaimType::Skill
    }

    async fn verify(&self, claim: &Claim, deadline: Instant) -> SourceResult {
        within_deadline(self.kind(), claim, deadline, async { self.score(claim) }).await
    }
}

pub fn correct_answers(questions: &[Question], responses: &[String]) -> usize {
    questions
        .iter()
        .zip(responses)
        .filter(|(q, r)| q.correct.trim().eq_ignore_ascii_case(r.trim()))
        .count()
}

fn question(text: &str, options: &[&str], correct: &str) -> Question {
    Question {
        question: text.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct: correct.into(),
    }
}

pub fn default_bank() -> HashMap<String, Vec<Question>> {
    let mut bank = HashMap::new();
    bank.insert(
        "python".to_string(),
        vec![
            question("What is the output of len([1, 2, 3])?", &["2", "3", "4", "Error"], "3"),
            question("Which keyword defines a function?", &["function", "def", "lambda", "func"], "def"),
            question("Which type is immutable?", &["list", "dict", "tuple", "set"], "tuple"),
        ],
    );
    bank.insert(
        "javascript".to_string(),
        vec![
            question(
                "What does a function return by default?",
                &["null", "undefined", "0", "false"],
                "undefined",
            ),
            question("Which operator checks strict equality?", &["==", "===", "=", "!="], "==="),
        ],
    );
    bank.insert(
        "rust".to_string(),
        vec![
            question("Which trait enables the ? operator on a type?", &["Try", "From", "Into", "Error"], "Try"),
            question("What does Box<T> allocate on?", &["stack", "heap", "register", "static"], "heap"),
        ],
    );
    bank.insert(
        "sql".to_string(),
        vec![
            question("Which clause filters grouped rows?", &["WHERE", "HAVING", "ORDER BY", "LIMIT"], "HAVING"),
            question("Which join keeps all rows of the left table?", &["INNER", "LEFT", "CROSS", "SELF"], "LEFT"),
        ],
    );
    bank
}
