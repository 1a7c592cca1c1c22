// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::errors::PipelineError;

/// Stage of a single query's processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Searching,
    Embedding,
    Retrieving,
    Generating,
    Completed,
    Error,
}

impl PipelineState {
    /// Progress reported when entering this state; `None` for `Error`,
    /// which re-reports the last value
    pub fn progress_percent(&self) -> Option<u8> {
        match self {
            PipelineState::Idle => Some(0),
            PipelineState::Searching => Some(20),
            PipelineState::Embedding => Some(40),
            PipelineState::Retrieving => Some(60),
            PipelineState::Generating => Some(80),
            PipelineState::Completed => Some(100),
            PipelineState::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Error)
    }

    fn ordinal(&self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Searching => 1,
            PipelineState::Embedding => 2,
            PipelineState::Retrieving => 3,
            PipelineState::Generating => 4,
            PipelineState::Completed => 5,
            PipelineState::Error => 6,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Searching => "searching",
            PipelineState::Embedding => "embedding",
            PipelineState::Retrieving => "retrieving",
            PipelineState::Generating => "generating",
            PipelineState::Completed => "completed",
            PipelineState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Forward-only state machine for one query
///
/// States may be skipped (e.g. `idle -> generating` when retrieval is
/// disabled) but never revisited. `error` is reachable from any non-terminal
/// state, and nothing leaves a terminal state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: PipelineState,
    history: Vec<PipelineState>,
    last_percent: u8,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            last_percent: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Move to `next`, returning the progress percentage to report
    pub fn transition(&mut self, next: PipelineState) -> Result<u8, PipelineError> {
        let allowed = !self.state.is_terminal()
            && (next == PipelineState::Error || next.ordinal() > self.state.ordinal());
        if !allowed {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        debug!(from = %self.state, state = %next, "Pipeline transition");
        self.state = next;
        self.history.push(next);
        if let Some(percent) = next.progress_percent() {
            self.last_percent = percent;
        }
        Ok(self.last_percent)
    }

    /// Enter `error` unless already terminal; returns the percentage to report
    pub fn fail(&mut self) -> u8 {
        if !self.state.is_terminal() {
            self.state = PipelineState::Error;
            self.history.push(PipelineState::Error);
            debug!(state = %PipelineState::Error, "Pipeline transition");
        }
        self.last_percent
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
