//! Progress accounting for a running batch.

use serde::Serialize;

/// Completed versus total items. `completed_count` only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub completed_count: usize,
    pub total_count: usize,
}

impl ProgressState {
    pub fn new(total_count: usize) -> Self {
        Self { completed_count: 0, total_count }
    }

    /// Count one more item as attempted. Never runs past `total_count`.
    pub fn advance(&mut self) {
        if self.completed_count < self.total_count {
            self.completed_count += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total_count
    }

    pub fn fraction(&self) -> f32 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.completed_count as f32 / self.total_count as f32
    }

    /// Progress in whole percent (0-100), rounded down.
    pub fn percentage(&self) -> usize {
        if self.total_count == 0 {
            return 0;
        }
        (self.completed_count * 100) / self.total_count
    }
}

/// Notification emitted after every item, whether it succeeded or not.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent<'a> {
    #[serde(flatten)]
    pub progress: ProgressState,
    pub index: usize,
    pub filename: &'a str,
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_saturates_at_total() {
        let mut state = ProgressState::new(2);
        state.advance();
        assert_eq!(state.percentage(), 50);
        state.advance();
        state.advance();
        assert_eq!(state.completed_count, 2);
        assert!(state.is_complete());
        assert_eq!(state.fraction(), 1.0);
    }

    #[test]
    fn percentage_rounds_down() {
        let state = ProgressState { completed_count: 1, total_count: 3 };
        assert_eq!(state.percentage(), 33);
        assert_eq!(ProgressState::new(0).percentage(), 0);
    }

    #[test]
    fn event_serializes_flat() {
        let event = ProgressEvent {
            progress: ProgressState { completed_count: 1, total_count: 4 },
            index: 0,
            filename: "a_resize.jpg",
            succeeded: true,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["completedCount"], 1);
        assert_eq!(json["totalCount"], 4);
        assert_eq!(json["filename"], "a_resize.jpg");
    }
}
