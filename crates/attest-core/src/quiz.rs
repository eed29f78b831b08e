//! # Quiz Engine
//!
//! Every module is quizzed with the same three multiple-choice questions.
//! A submission is graded by counting correct answers; the user passes with
//! `QUIZ_PASS_SCORE` or more.

use crate::AttestError;
use crate::primitives::{QUIZ_PASS_SCORE, QUIZ_QUESTION_COUNT};
use serde::{Deserialize, Serialize};

/// A multiple-choice question with one correct option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub correct: usize,
}

const STANDARD_QUESTIONS: [Question; QUIZ_QUESTION_COUNT] = [
    Question {
        prompt: "What is the main purpose of Know Your Customer (KYC) checks?",
        options: &[
            "To market new products to customers",
            "To verify customer identity and assess financial crime risk",
            "To speed up account opening",
            "To collect customer feedback",
        ],
        correct: 1,
    },
    Question {
        prompt: "You notice a transaction that looks like possible money laundering. What should you do?",
        options: &[
            "Ignore it unless it happens again",
            "Warn the customer about your suspicion",
            "Report it to the compliance officer without delay",
            "Reverse the transaction yourself",
        ],
        correct: 2,
    },
    Question {
        prompt: "Who is responsible for following the company's compliance policies?",
        options: &[
            "Only the compliance team",
            "Only senior management",
            "External auditors",
            "Every employee",
        ],
        correct: 3,
    },
];

/// A question as shown to the user: no correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Result of grading a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub score: u8,
    pub total: u8,
    pub passed: bool,
}

impl QuizOutcome {
    /// Outcome for a given number of correct answers.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        Self {
            score,
            total: QUIZ_QUESTION_COUNT as u8,
            passed: score >= QUIZ_PASS_SCORE,
        }
    }
}

/// A fixed set of questions for a module.
#[derive(Debug, Clone, Copy)]
pub struct Quiz {
    questions: &'static [Question; QUIZ_QUESTION_COUNT],
}

impl Quiz {
    /// The quiz for a module.
    ///
    /// Questions are identical across modules and not derived from the
    /// document content.
    #[must_use]
    pub fn for_module(_module: &str) -> Self {
        Self {
            questions: &STANDARD_QUESTIONS,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.questions
    }

    /// Questions without their answers.
    #[must_use]
    pub fn view(&self) -> Vec<QuestionView> {
        self.questions
            .iter()
            .map(|q| QuestionView {
                prompt: q.prompt.to_string(),
                options: q.options.iter().map(|o| (*o).to_string()).collect(),
            })
            .collect()
    }

    /// Grade a submission of option indices, one per question.
    ///
    /// Out-of-range indices count as wrong answers. A submission with the
    /// wrong number of answers is rejected.
    pub fn grade(&self, answers: &[usize]) -> Result<QuizOutcome, AttestError> {
        if answers.len() != self.questions.len() {
            return Err(AttestError::InvalidQuizSubmission(format!(
                "expected {} answers, got {}",
                self.questions.len(),
                answers.len()
            )));
        }
        let score = self
            .questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.correct == **answer)
            .count();
        Ok(QuizOutcome::from_score(score as u8))
    }
}
