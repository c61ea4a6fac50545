//! Analysis steps and their output frames.

use crate::error::{ModelError, Result};

/// Default analysis domain of an exported step
pub const TIME_DOMAIN: &str = "TIME";

/// A discrete output point within a step
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Ordinal index, sequential from 0 within the step
    pub index: usize,
    /// Frame time (native frame value)
    pub time: f64,
    pub description: String,
}

/// An analysis step with its frames in ascending index order
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    description: String,
    domain: String,
    frames: Vec<Frame>,
}

impl Step {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            domain: TIME_DOMAIN.to_string(),
            frames: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Build a step from frames that already carry their indices.
    ///
    /// Indices must be exactly `0, 1, 2, ...` in the given order.
    pub fn from_frames(
        name: impl Into<String>,
        description: impl Into<String>,
        domain: impl Into<String>,
        frames: Vec<Frame>,
    ) -> Result<Self> {
        let name = name.into();
        for (position, frame) in frames.iter().enumerate() {
            if frame.index != position {
                return Err(ModelError::FrameIndex {
                    step: name,
                    position,
                    index: frame.index,
                });
            }
        }
        Ok(Self {
            name,
            description: description.into(),
            domain: domain.into(),
            frames,
        })
    }

    /// Append the next frame and return its index
    pub fn push_frame(&mut self, time: f64, description: impl Into<String>) -> usize {
        let index = self.frames.len();
        self.frames.push(Frame {
            index,
            time,
            description: description.into(),
        });
        index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Step time period: the last frame time, never negative
    pub fn time_period(&self) -> f64 {
        self.frames.last().map_or(0.0, |f| f.time.max(0.0))
    }
}

/// Ordered collection of uniquely named steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Steps {
    steps: Vec<Step>,
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: Step) -> Result<()> {
        if self.get(step.name()).is_some() {
            return Err(ModelError::DuplicateStep(step.name().to_string()));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn frame(&self, step: &str, index: usize) -> Option<&Frame> {
        self.get(step).and_then(|s| s.frame(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_frames(&self) -> usize {
        self.steps.iter().map(|s| s.frames().len()).sum()
    }
}

impl<'a> IntoIterator for &'a Steps {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_numbered_sequentially() {
        let mut step = Step::new("Thermal_Step", "heat up");
        assert_eq!(step.push_frame(0.0, "Increment 0"), 0);
        assert_eq!(step.push_frame(0.5, ""), 1);
        assert_eq!(step.push_frame(1.0, ""), 2);
        assert_eq!(step.frame(1).unwrap().time, 0.5);
        assert_eq!(step.domain(), TIME_DOMAIN);
        assert_eq!(step.time_period(), 1.0);
    }

    #[test]
    fn from_frames_rejects_gaps_and_reordering() {
        let frame = |index, time| Frame {
            index,
            time,
            description: String::new(),
        };
        assert!(Step::from_frames("S", "", "TIME", vec![frame(0, 0.0), frame(1, 1.0)]).is_ok());

        let err = Step::from_frames("S", "", "TIME", vec![frame(0, 0.0), frame(2, 1.0)])
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::FrameIndex {
                step: "S".into(),
                position: 1,
                index: 2
            }
        );
        assert!(Step::from_frames("S", "", "TIME", vec![frame(1, 0.0), frame(0, 1.0)]).is_err());
    }

    #[test]
    fn empty_step_has_zero_time_period() {
        assert_eq!(Step::new("Empty", "").time_period(), 0.0);
        let mut step = Step::new("Negative", "");
        step.push_frame(-1.0, "");
        assert_eq!(step.time_period(), 0.0);
    }

    #[test]
    fn step_names_are_unique() {
        let mut steps = Steps::new();
        steps.add_step(Step::new("A", "")).unwrap();
        steps.add_step(Step::new("B", "")).unwrap();
        assert_eq!(
            steps.add_step(Step::new("A", "again")).unwrap_err(),
            ModelError::DuplicateStep("A".into())
        );
        let names: Vec<_> = steps.iter().map(Step::name).collect();
        assert_eq!(names, ["A", "B"]);
        assert!(steps.frame("A", 0).is_none());
        assert!(steps.frame("C", 0).is_none());
    }
}
