//! Frame pacing gate for simulation steps

use std::collections::VecDeque;

use crate::error::SimulationError;
use crate::fence::CompletionToken;

/// Where a step currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    /// Flushing the injection queue
    Draining,
    /// Uploading uniforms and recording the physics dispatch
    Dispatching,
    /// Flipping the state buffers and moving to the next frame slot
    Advancing,
}

/// Serializes steps and bounds how many of them may be unfinished on the GPU
#[derive(Debug)]
pub struct FramePacer {
    phase: StepPhase,
    in_flight: VecDeque<CompletionToken>,
    max_in_flight: usize,
}

impl FramePacer {
    pub fn new(max_in_flight: usize) -> Self {
        debug_assert!(max_in_flight > 0);
        let max_in_flight = max_in_flight.max(1);
        Self {
            phase: StepPhase::Idle,
            in_flight: VecDeque::with_capacity(max_in_flight),
            max_in_flight,
        }
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Tokens of submitted steps that have not been observed complete yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Enter `Draining`, first waiting on the oldest unfinished step if the limit is reached.
    pub fn begin(&mut self) -> Result<(), SimulationError> {
        if self.phase != StepPhase::Idle {
            return Err(SimulationError::StepInProgress(self.phase));
        }

        self.in_flight.retain(|token| !token.is_complete());
        while self.in_flight.len() >= self.max_in_flight {
            if let Some(oldest) = self.in_flight.front() {
                oldest.wait()?;
            }
            self.in_flight.pop_front();
        }

        self.phase = StepPhase::Draining;
        Ok(())
    }

    pub fn enter(&mut self, phase: StepPhase) {
        debug_assert!(
            matches!(
                (self.phase, phase),
                (StepPhase::Draining, StepPhase::Dispatching)
                    | (StepPhase::Dispatching, StepPhase::Advancing)
            ),
            "invalid step transition {:?} -> {:?}",
            self.phase,
            phase
        );
        self.phase = phase;
    }

    /// Record the finished step's token and return to `Idle`.
    pub fn finish(&mut self, token: CompletionToken) {
        self.in_flight.push_back(token);
        self.phase = StepPhase::Idle;
    }

    /// Record the submitted step's token, then hand it to `advance`.
    ///
    /// The token is kept and the gate returns to `Idle` even when `advance` fails, since the
    /// work it tracks is already on the queue.
    pub fn retire<E>(
        &mut self,
        token: &CompletionToken,
        advance: impl FnOnce(CompletionToken) -> Result<(), E>,
    ) -> Result<(), E> {
        let result = advance(token.clone());
        self.finish(token.clone());
        result
    }

    /// Return to `Idle` after a failed step.
    pub fn abort(&mut self) {
        self.phase = StepPhase::Idle;
    }
}
