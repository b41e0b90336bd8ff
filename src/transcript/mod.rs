//! Append-only conversation transcript.
//!
//! Role order is fixed: one `user` turn, then one `assistant` turn from the
//! primary model, then any number of `critic` turns with strictly increasing
//! critique iterations. Turns are never edited or removed.

mod turn;

pub use turn::{NewTurn, Turn, TurnRole};

use crate::error::{CritiqueError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the user's prompt as turn 1
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                index: 1,
                role: TurnRole::User,
                content: user_prompt.into(),
                reasoning: None,
                model: None,
                critique_iteration: None,
            }],
        }
    }

    /// Append a turn, assigning the next index
    pub fn append(&mut self, turn: NewTurn) -> Result<&Turn> {
        self.check_sequence(&turn)?;

        let index = self.turns.len() as u32 + 1;
        self.turns.push(Turn {
            index,
            role: turn.role,
            content: turn.content,
            reasoning: turn.reasoning,
            model: turn.model,
            critique_iteration: turn.critique_iteration,
        });

        Ok(&self.turns[self.turns.len() - 1])
    }

    fn check_sequence(&self, turn: &NewTurn) -> Result<()> {
        let expected = if self.turns.len() == 1 {
            TurnRole::Assistant
        } else {
            TurnRole::Critic
        };
        if turn.role != expected {
            return Err(CritiqueError::InvalidTurn(format!(
                "turn {} must be {}, got {}",
                self.turns.len() + 1,
                expected,
                turn.role
            )));
        }

        if turn.model.as_deref().is_none_or(|m| m.trim().is_empty()) {
            return Err(CritiqueError::InvalidTurn(format!(
                "{} turn is missing its producing model",
                turn.role
            )));
        }

        match (turn.role, turn.critique_iteration) {
            (TurnRole::Assistant, None) => Ok(()),
            (TurnRole::Assistant, Some(_)) => Err(CritiqueError::InvalidTurn(
                "assistant turn cannot carry a critique iteration".to_string(),
            )),
            (TurnRole::Critic, Some(iteration)) => {
                let floor = self.latest_critique_iteration().unwrap_or(1);
                if iteration <= floor {
                    Err(CritiqueError::InvalidTurn(format!(
                        "critique iteration {} does not follow iteration {}",
                        iteration, floor
                    )))
                } else {
                    Ok(())
                }
            }
            (TurnRole::Critic, None) => Err(CritiqueError::InvalidTurn(
                "critic turn is missing its critique iteration".to_string(),
            )),
            (TurnRole::User, _) => Err(CritiqueError::InvalidTurn(
                "only the opening turn may come from the user".to_string(),
            )),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; a transcript starts with the user turn
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn user_prompt(&self) -> &str {
        &self.turns[0].content
    }

    /// The primary model's answer, once it exists
    pub fn assistant_turn(&self) -> Option<&Turn> {
        self.turns.get(1)
    }

    pub fn critic_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role == TurnRole::Critic)
    }

    pub fn latest_critique_iteration(&self) -> Option<u32> {
        self.critic_turns().filter_map(|t| t.critique_iteration).last()
    }

    /// Owned copy of every turn so far
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
