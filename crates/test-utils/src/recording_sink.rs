use stagerun::output::{ProgressEvent, ProgressSink};
use stagerun::report::StageResult;
use stagerun::types::StepStatus;

/// `ProgressSink` that keeps everything it is shown.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub stages_started: Vec<(String, usize)>,
    pub events: Vec<ProgressEvent>,
    pub results: Vec<StageResult>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step names in the order their `Start` was shown.
    pub fn start_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Start { step } => Some(step.clone()),
                _ => None,
            })
            .collect()
    }

    /// Step names in the order their `Finish` was shown.
    pub fn finish_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Finish { step, .. } => Some(step.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn final_status(&self, step: &str) -> Option<StepStatus> {
        self.events.iter().find_map(|e| match e {
            ProgressEvent::Finish { step: s, summary } if s == step => Some(summary.status),
            _ => None,
        })
    }

    pub fn lines_for(&self, step: &str) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Output { step: s, line } if s == step => Some(line.text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every step's events form one contiguous block.
    pub fn is_contiguous(&self) -> bool {
        let mut closed: Vec<&str> = Vec::new();
        let mut current: Option<&str> = None;
        for event in &self.events {
            let step = event.step();
            if closed.contains(&step) {
                return false;
            }
            match current {
                Some(c) if c != step => return false,
                _ => {}
            }
            current = Some(step);
            if matches!(event, ProgressEvent::Finish { .. }) {
                closed.push(step);
                current = None;
            }
        }
        true
    }
}

impl ProgressSink for RecordingSink {
    fn stage_started(&mut self, stage: &str, steps: usize) {
        self.stages_started.push((stage.to_string(), steps));
    }

    fn event(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }

    fn stage_finished(&mut self, result: &StageResult) {
        self.results.push(result.clone());
    }
}
