//! Arithmetic CAPTCHA deck.
//!
//! The deck is built once at start-up and never mutated. Which challenge a
//! visitor sees next is decided by a [`DeckCursor`] that travels in their
//! session, so concurrent requests never race on shared state.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Answers to `9 + 2` through `9 + 10`
const STANDARD_ANSWERS: [&str; 9] = [
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

/// First challenge id; the rest follow sequentially
const FIRST_TASK_ID: usize = 700;

/// One challenge/answer pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaTask {
    /// Opaque identifier sent to the client
    pub id: String,
    /// Prompt shown to the visitor
    pub task: String,
    /// Expected answer (server-side only)
    pub answer: String,
}

/// Position of the next challenge to hand out, carried per session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckCursor(usize);

impl DeckCursor {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Fixed, non-empty sequence of challenges
#[derive(Debug, Clone)]
pub struct CaptchaDeck {
    tasks: Vec<CaptchaTask>,
}

impl CaptchaDeck {
    pub fn tasks(&self) -> &[CaptchaTask] {
        &self.tasks
    }

    /// Challenge at the cursor. Does not advance anything.
    pub fn next_task(&self, cursor: DeckCursor) -> &CaptchaTask {
        &self.tasks[cursor.0 % self.tasks.len()]
    }

    /// Challenge with the given id, or the first one for unknown ids
    pub fn task_by_id(&self, id: &str) -> &CaptchaTask {
        self.tasks.iter().find(|t| t.id == id).unwrap_or(&self.tasks[0])
    }

    /// Cursor for the next challenge.
    ///
    /// A negative index picks a uniformly random task. An index past the end
    /// wraps around the deck.
    pub fn set_next_task(&self, index: isize) -> DeckCursor {
        let len = self.tasks.len();
        match usize::try_from(index) {
            Ok(i) => DeckCursor(i % len),
            Err(_) => DeckCursor(rand::rng().random_range(0..len)),
        }
    }
}

impl Default for CaptchaDeck {
    fn default() -> Self {
        let tasks = STANDARD_ANSWERS
            .iter()
            .enumerate()
            .map(|(i, answer)| CaptchaTask {
                id: (FIRST_TASK_ID + i).to_string(),
                task: format!("9 + {} =", i + 2),
                answer: answer.to_string(),
            })
            .collect();
        Self { tasks }
    }
}

/// Exact, case-sensitive answer comparison
pub fn check_answer(task: &CaptchaTask, input: &str) -> bool {
    input == task.answer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_deck() {
        let deck = CaptchaDeck::default();
        assert_eq!(deck.tasks().len(), 9);
        assert_eq!(deck.tasks()[0].task, "9 + 2 =");
        assert_eq!(deck.tasks()[8].answer, "nineteen");

        let ids: std::collections::HashSet<_> = deck.tasks().iter().map(|t| &t.id).collect();
        assert_eq!(ids.len(), 9);
    }

    #[test]
    fn test_unknown_id_falls_back_to_first() {
        let deck = CaptchaDeck::default();
        let first = &deck.tasks()[0];
        for id in ["", "nope", "699", "-1", "7000"] {
            assert_eq!(deck.task_by_id(id), first);
        }
        let third = &deck.tasks()[2];
        assert_eq!(deck.task_by_id(&third.id), third);
    }

    #[test]
    fn test_check_answer_exact() {
        let deck = CaptchaDeck::default();
        for task in deck.tasks() {
            assert!(check_answer(task, &task.answer));
            assert!(!check_answer(task, &task.answer.to_uppercase()));
            assert!(!check_answer(task, &task.answer[..task.answer.len() - 1]));
            assert!(!check_answer(task, &format!(" {}", task.answer)));
            assert!(!check_answer(task, ""));
        }
    }

    #[test]
    fn test_cursor_selection() {
        let deck = CaptchaDeck::default();
        let cursor = deck.set_next_task(3);
        assert_eq!(deck.next_task(cursor), &deck.tasks()[3]);
        // reading the next task is side-effect free
        assert_eq!(deck.next_task(cursor), &deck.tasks()[3]);

        // past the end wraps
        assert_eq!(deck.set_next_task(10).index(), 1);

        for _ in 0..100 {
            assert!(deck.set_next_task(-1).index() < deck.tasks().len());
        }
        assert_eq!(deck.next_task(DeckCursor::default()), &deck.tasks()[0]);
    }
}
