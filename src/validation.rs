use crate::models::{NewQuiz, ValidationIssue};
use crate::parser::{QuizDraft, MAX_ANSWERS};
use serde_json::Value;

/// Checks a quiz candidate and returns every defect found. An empty list means
/// the candidate may be stored.
///
/// The candidate is untyped so that submissions with missing or mistyped
/// fields are reported instead of being rejected by deserialization.
pub fn validate_quiz(candidate: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let has_title = candidate
        .get("title")
        .and_then(Value::as_str)
        .is_some_and(|title| !title.trim().is_empty());
    if !has_title {
        issues.push(ValidationIssue::new("title", "Quiz must have a title field"));
    }

    let questions = match candidate.get("questions") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::new("questions", "Quiz must have a questions array"));
            return issues;
        }
        Some(Value::Array(questions)) => questions,
        Some(_) => {
            issues.push(ValidationIssue::new("questions", "'questions' must be an array"));
            return issues;
        }
    };
    if questions.is_empty() {
        issues.push(ValidationIssue::new(
            "questions",
            "Quiz must have at least one question",
        ));
        return issues;
    }

    for (index, question) in questions.iter().enumerate() {
        validate_question(index, question, &mut issues);
    }
    issues
}

/// Untyped view of a parsed draft, in the same shape a JSON submission has.
pub fn draft_candidate(draft: &QuizDraft) -> serde_json::Result<Value> {
    serde_json::to_value(draft)
}

pub fn validate_draft(draft: &QuizDraft) -> serde_json::Result<Vec<ValidationIssue>> {
    Ok(validate_quiz(&draft_candidate(draft)?))
}

fn non_blank_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn validate_question(index: usize, question: &Value, issues: &mut Vec<ValidationIssue>) {
    if !question.is_object() {
        issues.push(ValidationIssue::question(index, "", "must be an object"));
        return;
    }

    if !non_blank_str(question.get("question")) {
        issues.push(ValidationIssue::question(index, "question", "missing 'question' field"));
    }
    if !non_blank_str(question.get("instructions")) {
        issues.push(ValidationIssue::question(
            index,
            "instructions",
            "missing 'instructions' field",
        ));
    }

    let answers = question.get("answers").and_then(Value::as_array);

    match question.get("correct") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::question(index, "correct", "missing 'correct' field"));
        }
        Some(Value::Array(correct)) if correct.is_empty() => {
            issues.push(ValidationIssue::question(
                index,
                "correct",
                "'correct' array must have at least one answer",
            ));
        }
        Some(Value::Array(correct)) => {
            for entry in correct {
                let Some(choice) = entry.as_i64() else {
                    issues.push(ValidationIssue::question(
                        index,
                        "correct",
                        format!("'correct' entries must be whole numbers (found {entry})"),
                    ));
                    continue;
                };
                if let Some(answers) = answers {
                    if choice < 1 || choice as u64 > answers.len() as u64 {
                        issues.push(ValidationIssue::question(
                            index,
                            "correct",
                            format!(
                                "correct answer {choice} is out of range (1-{})",
                                answers.len()
                            ),
                        ));
                    }
                }
            }
        }
        Some(_) => {
            issues.push(ValidationIssue::question(index, "correct", "'correct' must be an array"));
        }
    }

    match answers {
        Some(answers) => {
            let filled = answers
                .iter()
                .filter(|answer| non_blank_str(Some(*answer)))
                .count();
            if filled < 2 {
                issues.push(ValidationIssue::question(
                    index,
                    "answers",
                    format!("must have at least 2 answers (found {filled})"),
                ));
            }
            if answers.len() > MAX_ANSWERS {
                issues.push(ValidationIssue::question(
                    index,
                    "answers",
                    format!("must have at most {MAX_ANSWERS} answers (found {})", answers.len()),
                ));
            }
        }
        None => {
            issues.push(ValidationIssue::question(index, "answers", "missing 'answers' array"));
        }
    }

    let unsupported = question.get("unsupportedAnswers").and_then(Value::as_array);
    for key in unsupported.into_iter().flatten().filter_map(Value::as_str) {
        issues.push(ValidationIssue::question(
            index,
            "answers",
            format!("'{key}' is outside answer1-answer{MAX_ANSWERS}"),
        ));
    }
}

/// Validates `candidate` and converts it into a storable quiz. Question numbers
/// are reassigned in order and any test-taker state is dropped.
pub fn accept(candidate: &Value) -> Result<NewQuiz, Vec<ValidationIssue>> {
    let issues = validate_quiz(candidate);
    if !issues.is_empty() {
        return Err(issues);
    }

    let mut quiz: NewQuiz = serde_json::from_value(candidate.clone()).map_err(|err| {
        vec![ValidationIssue::new(
            "quiz",
            format!("Quiz does not match the expected shape: {err}"),
        )]
    })?;
    quiz.title = quiz.title.trim().to_string();
    for (index, question) in quiz.questions.iter_mut().enumerate() {
        question.question_num = index as u32 + 1;
        question.selection.clear();
        question.is_correct = None;
    }
    Ok(quiz)
}
