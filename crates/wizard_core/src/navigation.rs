use std::{fmt, sync::Arc};

use serde::Serialize;
use shared::protocol::{ValidationIssue, ValidationReport};

use crate::error::NavigationError;

pub type Validator = Arc<dyn Fn() -> ValidationReport + Send + Sync>;

pub struct StepDescriptor<K> {
    key: K,
    validator: Validator,
}

impl<K: Copy> StepDescriptor<K> {
    pub fn new<F>(key: K, validator: F) -> Self
    where
        F: Fn() -> ValidationReport + Send + Sync + 'static,
    {
        Self {
            key,
            validator: Arc::new(validator),
        }
    }

    pub fn always_valid(key: K) -> Self {
        Self::new(key, ValidationReport::ok)
    }

    pub fn key(&self) -> K {
        self.key
    }

    pub fn validate(&self) -> ValidationReport {
        (self.validator)()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance<K> {
    Moved(K),
    /// The last step validated; the caller should run the stage's completion
    /// operation and then call [`StepNavigator::acknowledge_completion`].
    ReadyToComplete,
    AlreadyComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat<K> {
    Moved(K),
    DelegateToParent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed_count: usize,
    pub total_count: usize,
    pub percentage: u8,
}

impl Progress {
    pub fn new(completed_count: usize, total_count: usize) -> Self {
        let percentage = if total_count == 0 {
            0
        } else {
            ((completed_count.min(total_count) * 100 + total_count / 2) / total_count) as u8
        };
        Self {
            completed_count,
            total_count,
            percentage,
        }
    }

    pub fn combine(self, other: Progress) -> Progress {
        Progress::new(
            self.completed_count + other.completed_count,
            self.total_count + other.total_count,
        )
    }
}

pub struct StepNavigator<K> {
    steps: Vec<StepDescriptor<K>>,
    current: usize,
    completed: Vec<bool>,
    awaiting_completion: bool,
    stage_complete: bool,
}

impl<K> StepNavigator<K>
where
    K: Copy + Eq + fmt::Display,
{
    pub fn new(steps: Vec<StepDescriptor<K>>) -> Result<Self, NavigationError> {
        if steps.is_empty() {
            return Err(NavigationError::EmptySequence);
        }
        for (index, step) in steps.iter().enumerate() {
            if steps[..index].iter().any(|earlier| earlier.key == step.key) {
                return Err(NavigationError::DuplicateStep(step.key.to_string()));
            }
        }
        let completed = vec![false; steps.len()];
        Ok(Self {
            steps,
            current: 0,
            completed,
            awaiting_completion: false,
            stage_complete: false,
        })
    }

    pub fn current(&self) -> K {
        self.steps[self.current].key
    }

    pub fn order_of(&self, step: K) -> Option<usize> {
        self.steps.iter().position(|descriptor| descriptor.key == step)
    }

    pub fn steps(&self) -> impl Iterator<Item = K> + '_ {
        self.steps.iter().map(|descriptor| descriptor.key)
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.steps.len()
    }

    pub fn is_step_completed(&self, step: K) -> bool {
        self.order_of(step)
            .is_some_and(|index| self.stage_complete || self.completed[index])
    }

    /// A step can be shown as reachable when it is not ahead of the current
    /// step or every step before it has been completed.
    pub fn is_reachable(&self, step: K) -> bool {
        match self.order_of(step) {
            Some(index) => index <= self.current || self.completed[..index].iter().all(|done| *done),
            None => false,
        }
    }

    pub fn validate_current(&self) -> ValidationReport {
        self.steps[self.current].validate()
    }

    /// Re-runs every validator in order; readiness recorded by `advance` can
    /// go stale when the data behind an earlier step changes.
    pub fn first_invalid(&self) -> Option<(K, ValidationErrors)> {
        self.steps.iter().find_map(|descriptor| {
            let report = descriptor.validate();
            (!report.valid).then(|| (descriptor.key, ValidationErrors(report.errors)))
        })
    }

    pub fn can_advance(&self) -> bool {
        !self.stage_complete && self.validate_current().valid
    }

    pub fn advance(&mut self) -> Result<Advance<K>, ValidationErrors> {
        if self.stage_complete {
            return Ok(Advance::AlreadyComplete);
        }

        let report = self.validate_current();
        if !report.valid {
            return Err(ValidationErrors(report.errors));
        }

        self.completed[self.current] = true;
        if self.is_last() {
            self.awaiting_completion = true;
            return Ok(Advance::ReadyToComplete);
        }

        self.current += 1;
        self.awaiting_completion = false;
        Ok(Advance::Moved(self.current()))
    }

    pub fn retreat(&mut self) -> Retreat<K> {
        self.awaiting_completion = false;
        if self.stage_complete {
            self.stage_complete = false;
            return Retreat::Moved(self.current());
        }
        if self.current == 0 {
            return Retreat::DelegateToParent;
        }
        self.current -= 1;
        Retreat::Moved(self.current())
    }

    pub fn jump_to(&mut self, step: K) -> Result<K, NavigationError> {
        let index = self
            .order_of(step)
            .ok_or_else(|| NavigationError::UnknownStep(step.to_string()))?;
        if index > self.current {
            return Err(NavigationError::ForwardJump {
                requested: step.to_string(),
                current: self.current().to_string(),
            });
        }
        self.current = index;
        self.awaiting_completion = false;
        self.stage_complete = false;
        Ok(step)
    }

    pub fn acknowledge_completion(&mut self) -> Result<(), NavigationError> {
        if !self.awaiting_completion {
            return Err(NavigationError::NotReadyForCompletion {
                current: self.current().to_string(),
            });
        }
        self.awaiting_completion = false;
        self.stage_complete = true;
        Ok(())
    }

    pub fn is_ready_to_complete(&self) -> bool {
        self.awaiting_completion
    }

    pub fn is_complete(&self) -> bool {
        self.stage_complete
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.completed.iter_mut().for_each(|done| *done = false);
        self.awaiting_completion = false;
        self.stage_complete = false;
    }

    pub fn progress(&self) -> Progress {
        let completed = if self.stage_complete {
            self.steps.len()
        } else {
            self.completed.iter().filter(|done| **done).count()
        };
        Progress::new(completed, self.steps.len())
    }
}

#[cfg(test)]
#[path = "tests/navigation_tests.rs"]
mod tests;
