//! Line-oriented `key: value` quiz authoring format.
//!
//! ```text
//! title: "Sample"
//! question: "2+2?"
//! questionType: SingleAnswer
//! answer1: "3"
//! answer2: "4"
//! correct: 2
//! ```
//!
//! A question ends when a separator line (`---`, `---question---` or a
//! `questionNum:` key) appears, or when a second `question:` key arrives for a
//! question that already has a prompt. Both styles are accepted; whether the
//! implicit style stays supported is still undecided.

use crate::models::QuestionType;
use serde::Serialize;

const SEPARATOR: &str = "---";
const QUESTION_SEPARATOR: &str = "---question---";
const QUESTION_NUM: &str = "questionNum";

/// Highest `answerN` slot. Keys outside `answer1..=answerMAX` are kept aside
/// and reported by validation.
pub const MAX_ANSWERS: usize = 100;

const QUOTES: [char; 6] = ['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Quiz must have a title")]
    MissingTitle,
    #[error("Quiz must have at least one question")]
    NoQuestions,
}

/// Parsed but not yet validated question. Absent fields stay `None` so the
/// validator can report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub answers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unsupported_answers: Vec<String>,
}

impl QuestionDraft {
    fn has_prompt(&self) -> bool {
        self.question.as_deref().is_some_and(|q| !q.is_empty())
    }

    fn finalized(mut self) -> Self {
        if self.instructions.as_deref().map_or(true, str::is_empty) {
            let derived = QuestionType::default_instructions(self.question_type.as_ref());
            self.instructions = Some(derived.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizDraft {
    pub title: String,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Default)]
struct ParseState {
    title: Option<String>,
    current: Option<QuestionDraft>,
    finished: Vec<QuestionDraft>,
}

impl ParseState {
    fn finish_current(mut self) -> Self {
        if let Some(question) = self.current.take() {
            self.finished.push(question.finalized());
        }
        self
    }

    fn apply(mut self, (key, value): (String, String)) -> Self {
        if key == "title" {
            self.title = Some(value);
            return self;
        }

        if starts_new_question(&key, self.current.as_ref()) {
            self = self.finish_current();
        }

        match key.as_str() {
            SEPARATOR | QUESTION_SEPARATOR => return self,
            // Source numbering is advisory; questions are renumbered at the end.
            QUESTION_NUM => {
                self.current = Some(QuestionDraft::default());
                return self;
            }
            _ => {}
        }

        match key.as_str() {
            "questionType" => self.in_progress().question_type = Some(QuestionType::from(value)),
            "question" => self.in_progress().question = Some(value),
            "instructions" => self.in_progress().instructions = Some(value),
            "correct" => self.in_progress().correct = Some(parse_indices(&value)),
            other => match answer_slot(other) {
                Some(Some(slot)) => {
                    let answers = &mut self.in_progress().answers;
                    if answers.len() < slot {
                        answers.resize(slot, String::new());
                    }
                    answers[slot - 1] = value;
                }
                Some(None) => self.in_progress().unsupported_answers.push(other.to_string()),
                None => {}
            },
        }
        self
    }

    fn in_progress(&mut self) -> &mut QuestionDraft {
        self.current.get_or_insert_with(QuestionDraft::default)
    }

    fn into_draft(self) -> Result<QuizDraft, ParseError> {
        let mut state = self.finish_current();
        for (index, question) in state.finished.iter_mut().enumerate() {
            question.question_num = index as u32 + 1;
        }

        let title = state
            .title
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingTitle)?;
        if state.finished.is_empty() {
            return Err(ParseError::NoQuestions);
        }
        Ok(QuizDraft {
            title,
            questions: state.finished,
        })
    }
}

/// The single place deciding whether `key` closes the question in progress.
fn starts_new_question(key: &str, current: Option<&QuestionDraft>) -> bool {
    match key {
        SEPARATOR | QUESTION_SEPARATOR | QUESTION_NUM => true,
        "question" => current.is_some_and(QuestionDraft::has_prompt),
        _ => false,
    }
}

/// `None` for keys that are not `answer<digits>`; `Some(None)` for answer keys
/// outside the supported range.
fn answer_slot(key: &str) -> Option<Option<usize>> {
    let digits = key.strip_prefix("answer")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(
        digits
            .parse::<usize>()
            .ok()
            .filter(|slot| (1..=MAX_ANSWERS).contains(slot)),
    )
}

fn parse_indices(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|token| token.trim().parse().ok())
        .collect()
}

pub fn parse_quiz(text: &str) -> Result<QuizDraft, ParseError> {
    text.lines()
        .filter_map(split_entry)
        .fold(ParseState::default(), ParseState::apply)
        .into_draft()
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let bare = strip_quotes(line);
    if bare == SEPARATOR || bare == QUESTION_SEPARATOR {
        return Some((bare.to_string(), String::new()));
    }

    let (key, value) = line.split_once(':')?;
    let key: String = key.chars().filter(|c| !QUOTES.contains(c)).collect();
    let key = key.trim().trim_end_matches('\\').trim().to_string();
    let value = unescape(&normalize_smart_quotes(strip_quotes(value.trim()).trim()));
    Some((key, value))
}

/// Drops one leading and one trailing quote character. A trailing quote that
/// is itself escaped (odd run of backslashes before it) is kept.
fn strip_quotes(text: &str) -> &str {
    let text = text.strip_prefix(QUOTES).unwrap_or(text);
    match text.strip_suffix(QUOTES) {
        Some(rest) => {
            let backslashes = rest.chars().rev().take_while(|c| *c == '\\').count();
            if backslashes % 2 == 0 {
                rest
            } else {
                text
            }
        }
        None => text,
    }
}

fn normalize_smart_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

/// `\\` becomes `\`, `\"` and `\'` lose their backslash, anything else is kept.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('\\') | Some('"') | Some('\'') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "title: \"Sample\"\nquestion: \"2+2?\"\ninstructions: \"Pick one\"\nanswer1: \"3\"\nanswer2: \"4\"\ncorrect: 2\nquestion: \"Sky color?\"\nanswer1: \"Blue\"\nanswer2: \"Green\"\ncorrect: 1";

    fn value_of(raw: &str) -> String {
        split_entry(&format!("question: {raw}")).unwrap().1
    }

    #[test]
    fn implicit_boundaries_split_questions() {
        let quiz = parse_quiz(SAMPLE).unwrap();
        assert_eq!(quiz.title, "Sample");
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[0].question.as_deref(), Some("2+2?"));
        assert_eq!(quiz.questions[0].instructions.as_deref(), Some("Pick one"));
        assert_eq!(quiz.questions[0].answers, vec!["3", "4"]);
        assert_eq!(quiz.questions[0].correct, Some(vec![2]));
        assert_eq!(quiz.questions[1].question.as_deref(), Some("Sky color?"));
        assert_eq!(quiz.questions[1].correct, Some(vec![1]));
    }

    #[test]
    fn explicit_separators_and_question_num_are_boundaries() {
        let text = "title: T\nquestionNum: 7\nquestion: A\nanswer1: x\nanswer2: y\ncorrect: 1\n---\nquestion: B\n---question---\nquestionNum: 7\nquestion: C";
        let quiz = parse_quiz(text).unwrap();
        let prompts: Vec<_> = quiz
            .questions
            .iter()
            .map(|q| q.question.clone().unwrap_or_default())
            .collect();
        assert_eq!(prompts, vec!["A", "B", "C"]);
    }

    #[test]
    fn question_numbers_are_reassigned_in_order() {
        let text = "title: T\nquestionNum: 5\nquestion: A\nquestionNum: 5\nquestion: B\nquestion: C\nquestionNum: 1\nquestion: D";
        let quiz = parse_quiz(text).unwrap();
        let nums: Vec<_> = quiz.questions.iter().map(|q| q.question_num).collect();
        assert_eq!(nums, vec![1, 2, 3, 4]);
    }

    #[test]
    fn instructions_follow_question_type() {
        let text = "title: T\nquestion: A\nquestionType: MultipleChoice\nquestion: B\nquestionType: TrueFalse\nquestion: C\nquestionType: SingleAnswer\nquestion: D\nquestionType: Essay\nquestion: E\ninstructions: Write it";
        let quiz = parse_quiz(text).unwrap();
        let instructions: Vec<_> = quiz
            .questions
            .iter()
            .map(|q| q.instructions.clone().unwrap())
            .collect();
        assert_eq!(
            instructions,
            vec![
                "Please select all that apply:",
                "Please select the correct answer:",
                "Please select the correct answer:",
                "Please answer the question:",
                "Write it",
            ]
        );
        assert_eq!(
            quiz.questions[3].question_type,
            Some(QuestionType::Other("Essay".into()))
        );
    }

    #[test]
    fn answers_are_padded_to_highest_index() {
        let quiz = parse_quiz("title: T\nquestion: A\nanswer3: c\nanswer1: a\nanswer0: z").unwrap();
        assert_eq!(quiz.questions[0].answers, vec!["a", "", "c"]);
        assert_eq!(quiz.questions[0].unsupported_answers, vec!["answer0"]);
    }

    #[test]
    fn answer_keys_past_the_limit_are_kept_aside() {
        let quiz = parse_quiz(
            "title: T\nquestion: A\nanswer1: a\nanswer100: last\nanswer101: x\nanswer99999999999999999999999: y",
        )
        .unwrap();
        let question = &quiz.questions[0];
        assert_eq!(question.answers.len(), MAX_ANSWERS);
        assert_eq!(question.answers[MAX_ANSWERS - 1], "last");
        assert_eq!(
            question.unsupported_answers,
            vec!["answer101", "answer99999999999999999999999"]
        );
    }

    #[test]
    fn correct_discards_non_integer_tokens() {
        let quiz = parse_quiz("title: T\nquestion: A\ncorrect: 1, two, 3,,-4").unwrap();
        assert_eq!(quiz.questions[0].correct, Some(vec![1, 3, -4]));
    }

    #[test]
    fn escapes_are_resolved_in_order() {
        assert_eq!(value_of(r#"say \"hi\""#), r#"say "hi""#);
        assert_eq!(value_of(r"back\\slash"), r"back\slash");
        assert_eq!(value_of(r#"a\\"b"#), r#"a\"b"#);
        assert_eq!(value_of(r"it\'s"), "it's");
        assert_eq!(value_of(r#""He said \"hi\"""#), r#"He said "hi""#);
    }

    #[test]
    fn quotes_are_stripped_from_keys_and_values() {
        assert_eq!(
            split_entry("\"title\": \u{201C}Smart\u{201D}"),
            Some(("title".to_string(), "Smart".to_string()))
        );
        assert_eq!(
            split_entry("answer1: It\u{2019}s fine"),
            Some(("answer1".to_string(), "It's fine".to_string()))
        );
        assert_eq!(split_entry("no colon here"), None);
    }

    #[test]
    fn value_keeps_everything_after_first_colon() {
        assert_eq!(
            split_entry("question: Ratio 1:2?"),
            Some(("question".to_string(), "Ratio 1:2?".to_string()))
        );
    }

    #[test]
    fn missing_title_or_questions_fail() {
        assert_eq!(parse_quiz("question: A"), Err(ParseError::MissingTitle));
        assert_eq!(parse_quiz("title: T\nfoo: bar"), Err(ParseError::NoQuestions));
        assert_eq!(parse_quiz(""), Err(ParseError::MissingTitle));
    }

    #[test]
    fn last_title_wins() {
        let quiz = parse_quiz("title: One\nquestion: A\ntitle: Two").unwrap();
        assert_eq!(quiz.title, "Two");
    }
}
