//! Lazy NT11 bucket extraction.
//!
//! Frames are read one at a time as the iterator advances, so at most one
//! frame worth of buckets is held in memory.

use std::collections::{HashMap, VecDeque};

use odbx_model::{
    BucketScope, FieldBucket, Label, LabelKind, PositionKind, SectionPoint, Steps, label_from_i64,
};
use odbx_native::{NativeFieldValue, SourceRepository};

use crate::error::{Error, ExtractionError, NativeResultExt, Result};

/// (step, frame index, frame time) in iteration order
type FrameCursor = (String, usize, f64);

/// Iterator over the field buckets of a source container.
///
/// Buckets come out ordered by step (Steps order), frame (ascending
/// index), instance (native order), position kind and section point
/// (first appearance). Frames without the field are skipped. After the
/// first error the iterator is exhausted.
pub struct BucketExtractor<'a, S: SourceRepository> {
    source: &'a S,
    field: String,
    instance_rank: HashMap<String, usize>,
    frames: VecDeque<FrameCursor>,
    pending: VecDeque<FieldBucket>,
    failed: bool,
}

impl<'a, S: SourceRepository> BucketExtractor<'a, S> {
    pub fn new(source: &'a S, steps: &Steps, field: impl Into<String>) -> Self {
        let instance_rank = source
            .instance_names()
            .into_iter()
            .enumerate()
            .map(|(rank, name)| (name, rank))
            .collect();
        let frames = steps
            .iter()
            .flat_map(|step| {
                step.frames()
                    .iter()
                    .map(|f| (step.name().to_string(), f.index, f.time))
            })
            .collect();
        Self {
            source,
            field: field.into(),
            instance_rank,
            frames,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    fn load_frame(&self, step: &str, index: usize, time: f64) -> Result<Vec<FieldBucket>> {
        let values = self
            .source
            .field_values(step, index, &self.field)
            .during(format!("read {} of step '{step}' frame {index}", self.field))?;
        let Some(values) = values else {
            tracing::debug!(step, frame = index, field = %self.field, "frame has no field output; skipped");
            return Ok(Vec::new());
        };

        let mut groups: Vec<Group> = Vec::new();
        let mut lookup: HashMap<GroupKey, usize> = HashMap::new();
        for value in &values {
            let (key, label, datum) = self.classify(step, index, value)?;
            let slot = *lookup.entry(key.clone()).or_insert_with(|| {
                groups.push(Group {
                    key,
                    first_seen: groups.len(),
                    labels: Vec::new(),
                    values: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].labels.push(label);
            groups[slot].values.push([datum]);
        }
        groups.sort_by_key(|g| (g.key.instance_rank, g.key.position, g.first_seen));

        let buckets = groups
            .into_iter()
            .map(|group| {
                let scope = BucketScope {
                    step: step.to_string(),
                    frame_index: index,
                    frame_value: time,
                    instance: group.key.instance,
                    position: group.key.position,
                    section_point: group.key.section_point,
                };
                FieldBucket::new(scope, group.labels, group.values).map_err(|e| {
                    Error::from(ExtractionError::InvalidFieldValue {
                        step: step.to_string(),
                        frame: index,
                        message: e.to_string(),
                    })
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(step, frame = index, buckets = buckets.len(), "frame extracted");
        Ok(buckets)
    }

    /// Resolve the group, label and scalar of one native value
    fn classify(
        &self,
        step: &str,
        frame: usize,
        value: &NativeFieldValue,
    ) -> Result<(GroupKey, Label, f64)> {
        let invalid = |message: String| ExtractionError::InvalidFieldValue {
            step: step.to_string(),
            frame,
            message,
        };
        let position =
            PositionKind::from_name(&value.position).map_err(|_| ExtractionError::UnknownPosition {
                step: step.to_string(),
                frame,
                position: value.position.clone(),
            })?;
        let instance_rank = *self
            .instance_rank
            .get(&value.instance)
            .ok_or_else(|| invalid(format!("value refers to unknown instance '{}'", value.instance)))?;

        let (raw, kind) = match position.label_kind() {
            LabelKind::Node => (value.node_label, "node"),
            LabelKind::Element => (value.element_label, "element"),
        };
        let raw = raw.ok_or_else(|| invalid(format!("{position} value without a {kind} label")))?;
        let label = label_from_i64(raw).map_err(|e| invalid(e.to_string()))?;

        let &[datum] = value.data.as_slice() else {
            return Err(invalid(format!(
                "label {label} carries {} components, expected one",
                value.data.len()
            ))
            .into());
        };
        if !datum.is_finite() {
            return Err(ExtractionError::NonFiniteValue {
                step: step.to_string(),
                frame,
                instance: value.instance.clone(),
                label,
                value: datum,
            }
            .into());
        }

        let section_point = match &value.section_point {
            Some(sp) if position.admits_section_point() => Some(SectionPoint::new(
                sp.number.unwrap_or(1),
                sp.description.clone().unwrap_or_default(),
            )),
            Some(sp) => {
                return Err(invalid(format!(
                    "{position} value for label {label} of '{}' carries section point {}",
                    value.instance,
                    sp.number.unwrap_or(1)
                ))
                .into());
            }
            None => None,
        };
        let key = GroupKey {
            instance: value.instance.clone(),
            instance_rank,
            position,
            section_point,
        };
        Ok((key, label, datum))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    instance: String,
    instance_rank: usize,
    position: PositionKind,
    section_point: Option<SectionPoint>,
}

struct Group {
    key: GroupKey,
    first_seen: usize,
    labels: Vec<Label>,
    values: Vec<[f64; 1]>,
}

impl<S: SourceRepository> Iterator for BucketExtractor<'_, S> {
    type Item = Result<FieldBucket>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(bucket) = self.pending.pop_front() {
                return Some(Ok(bucket));
            }
            if self.failed {
                return None;
            }
            let (step, index, time) = self.frames.pop_front()?;
            match self.load_frame(&step, index, time) {
                Ok(buckets) => self.pending.extend(buckets),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
