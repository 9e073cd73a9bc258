//! `QAEngine` — scans accumulated output against compiled regex questions
//! and writes scripted answers back through the process adapter.

use crate::adapter::PipeBackend;
use crate::error::RunError;
use crate::loop_driver::{ChunkHook, LoopSignal};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

const LOOP_MAX_MISS_COUNT: u32 = 20;

/// One or more scripted answers for a question.
#[derive(Debug, Clone)]
pub enum Answers {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for Answers {
    fn from(s: &str) -> Self {
        Answers::One(s.to_string())
    }
}

impl From<String> for Answers {
    fn from(s: String) -> Self {
        Answers::One(s)
    }
}

impl From<Vec<String>> for Answers {
    fn from(v: Vec<String>) -> Self {
        Answers::Many(v)
    }
}

impl From<Vec<&str>> for Answers {
    fn from(v: Vec<&str>) -> Self {
        Answers::Many(v.into_iter().map(String::from).collect())
    }
}

struct QaEntry {
    regex: Regex,
    answers: VecDeque<String>,
}

/// Compiled dialogue table: literal questions, caller-supplied regex
/// questions, and "still progressing" patterns.
pub struct QaTable {
    exact: Vec<QaEntry>,
    reg: Vec<QaEntry>,
    noqa: Vec<Regex>,
}

impl QaTable {
    pub fn build(
        qa: &HashMap<String, Answers>,
        qa_reg: &HashMap<String, Answers>,
        no_qa: &[String],
        add_newline: bool,
    ) -> Result<Self, RunError> {
        let mut exact = Vec::new();
        let mut keys: Vec<&String> = qa.keys().collect();
        keys.sort();
        for key in keys {
            let answers = normalize_answers(&qa[key], key, add_newline)?;
            let pattern = exact_pattern(key);
            let regex =
                Regex::new(&pattern).map_err(|source| RunError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
            if !regex.is_match(key) {
                return Err(RunError::QuestionSelfMatchFailed {
                    pattern: key.clone(),
                    converted: pattern,
                });
            }
            exact.push(QaEntry { regex, answers });
        }

        let mut reg = Vec::new();
        let mut reg_keys: Vec<&String> = qa_reg.keys().collect();
        reg_keys.sort();
        for key in reg_keys {
            let answers = normalize_answers(&qa_reg[key], key, add_newline)?;
            let pattern = format!("{key}[\\s\\n]*$");
            let regex =
                Regex::new(&pattern).map_err(|source| RunError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
            reg.push(QaEntry { regex, answers });
        }

        let mut noqa = Vec::with_capacity(no_qa.len());
        for pattern in no_qa {
            let anchored = format!("{pattern}[\\s\\n]*$");
            noqa.push(Regex::new(&anchored).map_err(|source| RunError::InvalidRegex {
                pattern: anchored.clone(),
                source,
            })?);
        }

        Ok(Self { exact, reg, noqa })
    }
}

/// Collapse whitespace runs in a literal question to `[\s\n]+`, escaping
/// every other piece, then anchor the end against trailing whitespace.
fn exact_pattern(question: &str) -> String {
    let pieces: Vec<String> = question.split_whitespace().map(regex::escape).collect();
    format!("{}[\\s\\n]*$", pieces.join("[\\s\\n]+"))
}

fn normalize_answers(
    answers: &Answers,
    question: &str,
    add_newline: bool,
) -> Result<VecDeque<String>, RunError> {
    let mut list: Vec<String> = match answers {
        Answers::One(s) => vec![s.clone()],
        Answers::Many(v) if !v.is_empty() => v.clone(),
        Answers::Many(_) => {
            return Err(RunError::InvalidAnswerType {
                question: question.to_string(),
            })
        }
    };
    if add_newline {
        for answer in &mut list {
            if !answer.ends_with('\n') {
                answer.push('\n');
            }
        }
    }
    Ok(list.into())
}

fn named_values(regex: &Regex, caps: &Captures<'_>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for name in regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            map.insert(name.to_string(), m.as_str().to_string());
        }
    }
    map
}

pub struct QaEngine {
    table: QaTable,
    hit_position: usize,
    prev_output_len: usize,
    miss_count: u32,
}

impl QaEngine {
    pub fn new(table: QaTable) -> Self {
        Self {
            table,
            hit_position: 0,
            prev_output_len: 0,
            miss_count: 0,
        }
    }
}

#[async_trait]
impl ChunkHook for QaEngine {
    async fn on_chunk(
        &mut self,
        _chunk: &[u8],
        output_so_far: &[u8],
        backend: &mut PipeBackend,
    ) -> Option<LoopSignal> {
        let text = crate::ascii::ensure_ascii_string(output_so_far);
        let tail_start = self.hit_position.min(text.len());
        let tail = &text[tail_start..];

        let mut exact_hit: Option<usize> = None;
        for (idx, entry) in self.table.exact.iter().enumerate() {
            if entry.regex.is_match(tail) {
                exact_hit = Some(idx);
                break;
            }
        }
        let mut reg_hit: Option<usize> = None;
        if exact_hit.is_none() {
            for (idx, entry) in self.table.reg.iter().enumerate() {
                if entry.regex.is_match(tail) {
                    reg_hit = Some(idx);
                    break;
                }
            }
        }

        if let Some(idx) = exact_hit {
            self.answer(idx, true, tail, backend).await;
            self.hit_position = text.len();
            self.miss_count = 0;
            return None;
        }
        if let Some(idx) = reg_hit {
            self.answer(idx, false, tail, backend).await;
            self.hit_position = text.len();
            self.miss_count = 0;
            return None;
        }

        if text.len() > self.prev_output_len {
            self.prev_output_len = text.len();
            return None;
        }
        if self.table.noqa.iter().any(|re| re.is_match(tail)) {
            return None;
        }
        self.miss_count += 1;
        if self.miss_count > LOOP_MAX_MISS_COUNT {
            crate::kill::stop_tasks(backend).await;
            return Some(LoopSignal::QaMissLimit);
        }
        None
    }
}

impl QaEngine {
    async fn answer(&mut self, idx: usize, exact: bool, tail: &str, backend: &mut PipeBackend) {
        let entry = if exact {
            &mut self.table.exact[idx]
        } else {
            &mut self.table.reg[idx]
        };
        let Some(caps) = entry.regex.captures(tail) else {
            return;
        };
        let values = named_values(&entry.regex, &caps);
        let Some(template) = entry.answers.front().cloned() else {
            return;
        };
        let rendered = crate::subst::percent_format(&template, &values);

        match backend.send_all(rendered.as_bytes()).await {
            Ok(written) if written < rendered.len() => {
                warn!(
                    expected = rendered.len(),
                    actual = written,
                    "QA answer write was short"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "QA answer write failed"),
        }

        if entry.answers.len() > 1 {
            let head = entry.answers.pop_front().unwrap();
            entry.answers.push_back(head);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_question_self_matches() {
        let pattern = exact_pattern("password: ");
        let regex = Regex::new(&pattern).unwrap();
        assert!(regex.is_match("password: "));
    }

    #[test]
    fn exact_pattern_collapses_whitespace() {
        let pattern = exact_pattern("enter   name:");
        let regex = Regex::new(&pattern).unwrap();
        assert!(regex.is_match("enter\nname:"));
    }

    #[test]
    fn normalize_answers_appends_missing_newline() {
        let list = normalize_answers(&Answers::One("hunter2".to_string()), "q", true).unwrap();
        assert_eq!(list.front().unwrap(), "hunter2\n");
    }

    #[test]
    fn normalize_answers_rejects_empty_list() {
        let err = normalize_answers(&Answers::Many(vec![]), "q", true).unwrap_err();
        assert!(matches!(err, RunError::InvalidAnswerType { .. }));
    }

    #[test]
    fn build_rejects_invalid_regex() {
        let mut qa_reg = HashMap::new();
        qa_reg.insert("(unclosed".to_string(), Answers::One("x".to_string()));
        let err = QaTable::build(&HashMap::new(), &qa_reg, &[], true).unwrap_err();
        assert!(matches!(err, RunError::InvalidRegex { .. }));
    }

    #[test]
    fn no_qa_pattern_is_anchored_to_tail_end() {
        let no_qa = vec!["still working".to_string()];
        let table = QaTable::build(&HashMap::new(), &HashMap::new(), &no_qa, true).unwrap();
        assert!(table.noqa[0].is_match("still working"));
        assert!(table.noqa[0].is_match("still working\n"));
        assert!(!table.noqa[0].is_match("still working on it"));
    }
}
