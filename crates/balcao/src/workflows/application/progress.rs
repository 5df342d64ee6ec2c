use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMarker {
    pub index: usize,
    /// 1-based number shown inside the step circle.
    pub number: usize,
    pub label: String,
    pub state: StepState,
}

/// Stepper rendering state derived from the wizard position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub current_step: usize,
    pub total_steps: usize,
    pub percent: f32,
    pub markers: Vec<StepMarker>,
}

pub fn derive_progress(current_step: usize, labels: &[String]) -> ProgressState {
    let total_steps = labels.len();
    if total_steps == 0 {
        return ProgressState {
            current_step: 0,
            total_steps,
            percent: 0.0,
            markers: Vec::new(),
        };
    }

    let current_step = current_step.min(total_steps - 1);
    let percent = if total_steps == 1 {
        100.0
    } else {
        current_step as f32 / (total_steps - 1) as f32 * 100.0
    };

    let markers = labels
        .iter()
        .enumerate()
        .map(|(index, label)| StepMarker {
            index,
            number: index + 1,
            label: label.clone(),
            state: match index.cmp(&current_step) {
                std::cmp::Ordering::Less => StepState::Completed,
                std::cmp::Ordering::Equal => StepState::Current,
                std::cmp::Ordering::Greater => StepState::Upcoming,
            },
        })
        .collect();

    ProgressState {
        current_step,
        total_steps,
        percent,
        markers,
    }
}
