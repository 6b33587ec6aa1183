// src/output/coordinator.rs

//! Declaration-order arbiter for step progress.
//!
//! Only the *active* step (the first one in declaration order that has not
//! been shown as finished) streams live. Everything produced by later steps
//! is buffered per step and flushed, in one piece, when that step becomes
//! active. A step that finished while waiting for its turn is shown and
//! passed over immediately, so a run of already-finished steps drains at
//! once.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::output::event::{ProgressEvent, StepEvent};
use crate::report::StepSummary;
use crate::types::{OutputLine, StepName};

#[derive(Debug, Default)]
struct Slot {
    /// The step reported that it started.
    started: bool,
    /// `Start` has been handed to the sink.
    start_shown: bool,
    /// Output waiting for the step's turn.
    buffer: Vec<OutputLine>,
    /// Terminal summary, once known.
    finish: Option<StepSummary>,
}

/// Pure ordering state machine. Feed it [`StepEvent`]s in any interleaving
/// and it returns the [`ProgressEvent`]s that may be shown now.
#[derive(Debug)]
pub struct OutputCoordinator {
    steps: Vec<StepName>,
    index: HashMap<StepName, usize>,
    slots: Vec<Slot>,
    active: usize,
}

impl OutputCoordinator {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepName>,
    {
        let steps: Vec<StepName> = steps.into_iter().map(Into::into).collect();
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        let slots = steps.iter().map(|_| Slot::default()).collect();
        Self {
            steps,
            index,
            slots,
            active: 0,
        }
    }

    /// The step currently allowed to stream live.
    pub fn active_step(&self) -> Option<&str> {
        self.steps.get(self.active).map(|s| s.as_str())
    }

    /// Every step has been shown as finished.
    pub fn is_complete(&self) -> bool {
        self.active >= self.steps.len()
    }

    /// Lines held back for `step`, not yet shown.
    pub fn buffered(&self, step: &str) -> usize {
        self.index
            .get(step)
            .map(|&i| self.slots[i].buffer.len())
            .unwrap_or(0)
    }

    pub fn handle(&mut self, event: StepEvent) -> Vec<ProgressEvent> {
        let Some(&i) = self.index.get(event.step()) else {
            warn!(step = %event.step(), "event for unknown step; dropping");
            return Vec::new();
        };

        if i < self.active {
            warn!(step = %event.step(), "event for step already shown as finished; dropping");
            return Vec::new();
        }

        if self.slots[i].finish.is_some() {
            warn!(step = %event.step(), "event after step finished; dropping");
            return Vec::new();
        }

        if i > self.active {
            let slot = &mut self.slots[i];
            match event {
                StepEvent::Started { .. } => slot.started = true,
                StepEvent::Output { line, .. } => slot.buffer.push(line),
                StepEvent::Finished { summary, .. } => slot.finish = Some(summary),
            }
            return Vec::new();
        }

        let mut shown = Vec::new();
        match event {
            StepEvent::Started { .. } => self.show_start(i, &mut shown),
            StepEvent::Output { line, .. } => {
                self.show_start(i, &mut shown);
                shown.push(ProgressEvent::Output {
                    step: self.steps[i].clone(),
                    line,
                });
            }
            StepEvent::Finished { summary, .. } => {
                self.slots[i].finish = Some(summary);
                self.drain(&mut shown);
            }
        }
        shown
    }

    /// End of the run: show everything still held back. Steps that never
    /// reported a terminal status are finished as terminated, so every step
    /// ends up with exactly one final line.
    pub fn finish(&mut self) -> Vec<ProgressEvent> {
        let mut shown = Vec::new();
        for i in self.active..self.slots.len() {
            if self.slots[i].finish.is_none() {
                debug!(step = %self.steps[i], "no terminal status at end of run; marking terminated");
                self.slots[i].finish = Some(StepSummary::terminated());
            }
        }
        self.drain(&mut shown);
        shown
    }

    fn show_start(&mut self, i: usize, shown: &mut Vec<ProgressEvent>) {
        if !self.slots[i].start_shown {
            self.slots[i].start_shown = true;
            shown.push(ProgressEvent::Start {
                step: self.steps[i].clone(),
            });
        }
    }

    /// Show the active step's buffer; while it is finished, show its final
    /// line and move on to the next step.
    fn drain(&mut self, shown: &mut Vec<ProgressEvent>) {
        while self.active < self.slots.len() {
            let i = self.active;
            let slot = &self.slots[i];
            if slot.started || !slot.buffer.is_empty() || slot.finish.is_some() {
                self.show_start(i, shown);
            }

            let step = &self.steps[i];
            for line in std::mem::take(&mut self.slots[i].buffer) {
                shown.push(ProgressEvent::Output {
                    step: step.clone(),
                    line,
                });
            }

            let Some(summary) = self.slots[i].finish.clone() else {
                break;
            };
            shown.push(ProgressEvent::Finish {
                step: step.clone(),
                summary,
            });
            self.active += 1;
        }
    }
}
