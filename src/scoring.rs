use crate::models::{Attempt, QuestionResult, QuizDefinition, ValidationIssue};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A question counts only when the selected set equals the correct set.
/// Order and repeated indices are ignored; an empty selection never counts.
pub fn is_answer_correct(selection: &[u32], correct: &[u32]) -> bool {
    let selected: BTreeSet<u32> = selection.iter().copied().collect();
    let expected: BTreeSet<u32> = correct.iter().copied().collect();
    !selected.is_empty() && selected == expected
}

/// Questions that have no selection yet. Sessions must not submit until this
/// is empty.
pub fn unanswered_questions(quiz: &QuizDefinition) -> Vec<ValidationIssue> {
    quiz.questions
        .iter()
        .enumerate()
        .filter(|(_, question)| question.selection.is_empty())
        .map(|(index, _)| ValidationIssue::question(index, "selection", "no answer selected"))
        .collect()
}

pub fn score_attempt(quiz: &QuizDefinition, duration: u64, completed_at: DateTime<Utc>) -> Attempt {
    let questions: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|question| {
            let selection: BTreeSet<u32> = question.selection.iter().copied().collect();
            QuestionResult {
                question_num: question.question_num,
                is_correct: is_answer_correct(&question.selection, &question.correct),
                selection: selection.into_iter().collect(),
                correct: question.correct.clone(),
            }
        })
        .collect();

    let score = questions.iter().filter(|q| q.is_correct).count() as u32;
    let total_questions = questions.len() as u32;
    let percentage = percentage(score, total_questions);

    Attempt {
        quiz_id: quiz.id,
        title: quiz.title.clone(),
        completed_at,
        questions,
        score,
        total_questions,
        percentage,
        grade: grade_letter(percentage).to_string(),
        duration,
    }
}

/// Rounded half up; an empty quiz scores 0.
pub fn percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (score, total) = (u64::from(score), u64::from(total));
    ((score * 200 + total) / (total * 2)) as u32
}

pub fn grade_letter(percentage: u32) -> &'static str {
    match percentage {
        90..=u32::MAX => "A",
        80..=89 => "B",
        70..=79 => "C",
        60..=69 => "D",
        _ => "F",
    }
}
