//! `steps.json`: ordered steps with their frame metadata.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use odbx_model::{Frame, Step, Steps, TIME_DOMAIN};
use serde::{Deserialize, Serialize};

use crate::error::{Artifact, FormatError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct FrameRecord {
    index: usize,
    time: f64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StepRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_domain")]
    domain: String,
    #[serde(default)]
    frames: Vec<FrameRecord>,
}

fn default_domain() -> String {
    TIME_DOMAIN.to_string()
}

fn to_records(steps: &Steps) -> Vec<StepRecord> {
    steps
        .iter()
        .map(|step| StepRecord {
            name: step.name().to_string(),
            description: step.description().to_string(),
            domain: step.domain().to_string(),
            frames: step
                .frames()
                .iter()
                .map(|f| FrameRecord {
                    index: f.index,
                    time: f.time,
                    description: f.description.clone(),
                })
                .collect(),
        })
        .collect()
}

fn from_records(records: Vec<StepRecord>) -> std::result::Result<Steps, FormatError> {
    let mut steps = Steps::new();
    for (i, record) in records.into_iter().enumerate() {
        let frames = record
            .frames
            .into_iter()
            .map(|f| Frame {
                index: f.index,
                time: f.time,
                description: f.description,
            })
            .collect();
        let step = Step::from_frames(record.name, record.description, record.domain, frames)
            .map_err(|e| invalid(format!("[{i}].frames"), e))?;
        steps
            .add_step(step)
            .map_err(|e| invalid(format!("[{i}].name"), e))?;
    }
    Ok(steps)
}

fn invalid(field: String, message: impl ToString) -> FormatError {
    FormatError::new(Artifact::Steps, message.to_string()).in_field(field)
}

pub fn write_steps_to<W: Write>(mut writer: W, steps: &Steps) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &to_records(steps)).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_steps(path: impl AsRef<Path>, steps: &Steps) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_steps_to(BufWriter::new(file), steps)?;
    tracing::debug!(path = %path.as_ref().display(), "wrote steps document");
    Ok(())
}

/// Parse and validate a steps document: unique names, frame indices
/// `0..n` in order
pub fn read_steps_from<R: Read>(reader: R) -> Result<Steps> {
    let records: Vec<StepRecord> = serde_json::from_reader(reader)
        .map_err(|e| FormatError::from_json(Artifact::Steps, &e))?;
    Ok(from_records(records)?)
}

pub fn read_steps(path: impl AsRef<Path>) -> Result<Steps> {
    let file = File::open(path)?;
    read_steps_from(BufReader::new(file))
}
