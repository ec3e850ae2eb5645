use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 一道单选题
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    /// 正确选项下标；对外展示时不下发
    #[serde(skip_serializing)]
    pub correct: usize,
}

impl Question {
    fn new(prompt: &str, options: [&str; 4], correct: usize) -> Self {
        Self {
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnswerFeedback {
    pub question: usize,
    pub chosen: usize,
    pub correct: bool,
    /// 答错时给出正确答案
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizOutcome {
    pub score: u32,
    pub total: u32,
    pub answers: Vec<AnswerFeedback>,
}

/// 鉴别 AI 生成图片的科普测验
#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    questions: Vec<Question>,
}

impl Default for Quiz {
    fn default() -> Self {
        Self::new(vec![
            Question::new(
                "What is a common sign of a deepfake image?",
                ["High resolution", "Inconsistent lighting", "Bright colors", "Large file size"],
                1,
            ),
            Question::new(
                "Which metadata field can help identify AI-generated images?",
                ["File size", "Camera model", "Creation software", "All of the above"],
                3,
            ),
            Question::new(
                "What should you do when you suspect an image is fake?",
                [
                    "Share it immediately",
                    "Ignore it",
                    "Verify through multiple sources",
                    "Delete it",
                ],
                2,
            ),
        ])
    }
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// 判分。每题必须作答且选项下标有效，否则整份答卷作废
    pub fn grade(&self, answers: &[usize]) -> Result<QuizOutcome> {
        if answers.len() != self.questions.len() {
            return Err(Error::InvalidQuiz(format!(
                "expected {} answers, got {}",
                self.questions.len(),
                answers.len()
            )));
        }

        let mut feedback = Vec::with_capacity(answers.len());
        for (i, (question, &chosen)) in self.questions.iter().zip(answers).enumerate() {
            if chosen >= question.options.len() {
                return Err(Error::InvalidQuiz(format!(
                    "answer {} for question {} is out of range",
                    chosen,
                    i + 1
                )));
            }
            let correct = chosen == question.correct;
            feedback.push(AnswerFeedback {
                question: i,
                chosen,
                correct,
                right_answer: (!correct).then(|| question.options[question.correct].clone()),
            });
        }

        Ok(QuizOutcome {
            score: feedback.iter().filter(|f| f.correct).count() as u32,
            total: self.questions.len() as u32,
            answers: feedback,
        })
    }
}
