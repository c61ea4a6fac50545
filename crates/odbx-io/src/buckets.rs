//! `nt11.jsonl`: one self-contained JSON record per field bucket.
//!
//! ```text
//! {"step":"Thermal_Step","frame_index":0,"frame_value":0.0,"instance":"PART-1-1","position":"NODAL","section_point":null,"labels":[1,2],"values":[[20.0],[21.5]]}
//! ```
//!
//! Records are written and read one at a time; nothing here holds more
//! than a single bucket in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use odbx_model::{
    BucketScope, FieldBucket, Label, ModelError, PositionKind, SectionPoint, Steps, label_from_i64,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Artifact, FormatError, IoError, Result};

#[derive(Serialize)]
struct SectionPointLine<'a> {
    number: i32,
    description: &'a str,
}

#[derive(Serialize)]
struct BucketLine<'a> {
    step: &'a str,
    frame_index: usize,
    frame_value: f64,
    instance: &'a str,
    position: &'static str,
    section_point: Option<SectionPointLine<'a>>,
    labels: &'a [Label],
    values: &'a [[f64; 1]],
}

/// Encode one bucket as a single line, without the trailing newline
pub fn encode_bucket(bucket: &FieldBucket) -> serde_json::Result<String> {
    let line = BucketLine {
        step: bucket.step(),
        frame_index: bucket.frame_index(),
        frame_value: bucket.frame_value(),
        instance: bucket.instance(),
        position: bucket.position().as_str(),
        section_point: bucket.section_point().map(|sp| SectionPointLine {
            number: sp.number,
            description: &sp.description,
        }),
        labels: bucket.labels(),
        values: bucket.values(),
    };
    serde_json::to_string(&line)
}

/// Streaming writer for the bucket artifact
pub struct BucketWriter<W: Write> {
    writer: W,
    written: usize,
}

impl BucketWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> BucketWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write(&mut self, bucket: &FieldBucket) -> Result<()> {
        let line = encode_bucket(bucket).map_err(std::io::Error::from)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of records written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// Decode and validate one record; `line` is 1-based and only used for
/// error context.
pub fn decode_bucket(text: &str, line: usize) -> std::result::Result<FieldBucket, FormatError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        FormatError::new(Artifact::Buckets, format!("invalid JSON: {e}")).at_line(line)
    })?;
    let Value::Object(record) = value else {
        return Err(FormatError::new(Artifact::Buckets, "record must be a JSON object").at_line(line));
    };
    let fields = RecordFields { record: &record, line };

    let step = fields.string("step")?;
    let frame_index = fields.index("frame_index")?;
    let frame_value = fields.number("frame_value")?;
    let instance = fields.string("instance")?;
    let position = PositionKind::from_name(&fields.string("position")?)
        .map_err(|e| fields.error("position", e))?;
    let section_point = fields.section_point("section_point")?;
    let labels = fields.labels("labels")?;
    let values = fields.values("values")?;

    let scope = BucketScope {
        step,
        frame_index,
        frame_value,
        instance,
        position,
        section_point,
    };
    FieldBucket::new(scope, labels, values).map_err(|e| {
        let field = match e {
            ModelError::SectionPointNotAdmitted(_) => "section_point",
            ModelError::LengthMismatch { .. } => "values",
            _ => "labels",
        };
        fields.error(field, e)
    })
}

struct RecordFields<'a> {
    record: &'a Map<String, Value>,
    line: usize,
}

impl RecordFields<'_> {
    fn error(&self, field: &str, message: impl ToString) -> FormatError {
        FormatError::new(Artifact::Buckets, message.to_string())
            .at_line(self.line)
            .in_field(field)
    }

    fn required(&self, field: &str) -> std::result::Result<&Value, FormatError> {
        self.record
            .get(field)
            .ok_or_else(|| self.error(field, "missing required field"))
    }

    fn string(&self, field: &str) -> std::result::Result<String, FormatError> {
        self.required(field)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(field, "expected a string"))
    }

    fn index(&self, field: &str) -> std::result::Result<usize, FormatError> {
        self.required(field)?
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| self.error(field, "expected a non-negative integer"))
    }

    fn number(&self, field: &str) -> std::result::Result<f64, FormatError> {
        self.required(field)?
            .as_f64()
            .ok_or_else(|| self.error(field, "expected a number"))
    }

    fn section_point(&self, field: &str) -> std::result::Result<Option<SectionPoint>, FormatError> {
        let value = match self.record.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };
        let Value::Object(sp) = value else {
            return Err(self.error(field, "expected an object or null"));
        };
        // A missing number falls back to the first section point.
        let number = match sp.get("number") {
            None | Some(Value::Null) => 1,
            Some(n) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| self.error("section_point.number", "expected an integer"))?,
        };
        let description = match sp.get("description") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(self.error("section_point.description", "expected a string")),
        };
        Ok(Some(SectionPoint::new(number, description)))
    }

    fn labels(&self, field: &str) -> std::result::Result<Vec<Label>, FormatError> {
        let Value::Array(items) = self.required(field)? else {
            return Err(self.error(field, "expected an array"));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_i64()
                    .ok_or_else(|| self.error(&format!("{field}[{i}]"), "expected an integer"))
                    .and_then(|raw| {
                        label_from_i64(raw).map_err(|e| self.error(&format!("{field}[{i}]"), e))
                    })
            })
            .collect()
    }

    fn values(&self, field: &str) -> std::result::Result<Vec<[f64; 1]>, FormatError> {
        let Value::Array(items) = self.required(field)? else {
            return Err(self.error(field, "expected an array"));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item.as_array().map(Vec::as_slice) {
                Some([v]) => v
                    .as_f64()
                    .map(|v| [v])
                    .ok_or_else(|| self.error(&format!("{field}[{i}]"), "expected a number")),
                _ => Err(self.error(&format!("{field}[{i}]"), "expected a 1-element array")),
            })
            .collect()
    }
}

/// Lazy reader over a bucket stream.
///
/// Blank lines are skipped. The first invalid record ends the stream with
/// an error; callers are expected to abort rather than continue.
pub struct BucketReader<'s, R: BufRead> {
    reader: R,
    line: usize,
    steps: Option<&'s Steps>,
    failed: bool,
    buffer: Vec<u8>,
}

impl BucketReader<'static, BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<'s, R: BufRead> BucketReader<'s, R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            steps: None,
            failed: false,
            buffer: Vec::new(),
        }
    }

    /// Also require each record's step and frame index to exist in `steps`
    pub fn resolve_against<'t>(self, steps: &'t Steps) -> BucketReader<'t, R> {
        BucketReader {
            reader: self.reader,
            line: self.line,
            steps: Some(steps),
            failed: self.failed,
            buffer: self.buffer,
        }
    }

    /// Line number of the last record returned
    pub fn line(&self) -> usize {
        self.line
    }

    /// Pair every bucket with its line number
    pub fn numbered(self) -> NumberedBuckets<'s, R> {
        NumberedBuckets { reader: self }
    }

    fn check_resolves(&self, bucket: &FieldBucket) -> std::result::Result<(), FormatError> {
        let Some(steps) = self.steps else {
            return Ok(());
        };
        let error = |field: &str, message: String| {
            FormatError::new(Artifact::Buckets, message)
                .at_line(self.line)
                .in_field(field)
        };
        let step = steps
            .get(bucket.step())
            .ok_or_else(|| error("step", format!("unknown step '{}'", bucket.step())))?;
        if step.frame(bucket.frame_index()).is_none() {
            return Err(error(
                "frame_index",
                format!(
                    "step '{}' has {} frames, no frame {}",
                    step.name(),
                    step.frames().len(),
                    bucket.frame_index()
                ),
            ));
        }
        Ok(())
    }
}

impl<R: BufRead> Iterator for BucketReader<'_, R> {
    type Item = Result<FieldBucket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(IoError::Io(err)));
                }
            }
            self.line += 1;
            let text = match std::str::from_utf8(&self.buffer) {
                Ok(text) => text.trim(),
                Err(err) => {
                    self.failed = true;
                    let error = FormatError::new(
                        Artifact::Buckets,
                        format!("invalid UTF-8 at byte {}", err.valid_up_to()),
                    )
                    .at_line(self.line);
                    return Some(Err(error.into()));
                }
            };
            if text.is_empty() {
                continue;
            }
            let result = decode_bucket(text, self.line).and_then(|bucket| {
                self.check_resolves(&bucket)?;
                Ok(bucket)
            });
            if result.is_err() {
                self.failed = true;
            }
            return Some(result.map_err(IoError::from));
        }
    }
}

/// Buckets of a [`BucketReader`] with the line each came from
pub struct NumberedBuckets<'s, R: BufRead> {
    reader: BucketReader<'s, R>,
}

impl<R: BufRead> Iterator for NumberedBuckets<'_, R> {
    type Item = Result<(usize, FieldBucket)>;

    fn next(&mut self) -> Option<Self::Item> {
        let bucket = self.reader.next()?;
        Some(bucket.map(|bucket| (self.reader.line(), bucket)))
    }
}

/// Write every bucket of `buckets` to `path`, returning the record count
pub fn write_buckets<I>(path: impl AsRef<Path>, buckets: I) -> Result<usize>
where
    I: IntoIterator<Item = FieldBucket>,
{
    let mut writer = BucketWriter::create(path)?;
    for bucket in buckets {
        writer.write(&bucket)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use odbx_model::Step;

    const SAMPLE: &str = r#"{"step":"Thermal_Step","frame_index":0,"frame_value":0.0,"instance":"PART-1-1","position":"NODAL","section_point":null,"labels":[1,2],"values":[[20.0],[21.5]]}"#;

    fn nodal_bucket() -> FieldBucket {
        FieldBucket::new(
            BucketScope {
                step: "Thermal_Step".into(),
                frame_index: 0,
                frame_value: 0.0,
                instance: "PART-1-1".into(),
                position: PositionKind::Nodal,
                section_point: None,
            },
            vec![1, 2],
            vec![[20.0], [21.5]],
        )
        .unwrap()
    }

    fn format_err(text: &str) -> FormatError {
        decode_bucket(text, 7).expect_err("record should be rejected")
    }

    #[test]
    fn encodes_the_documented_line_exactly() {
        assert_eq!(encode_bucket(&nodal_bucket()).unwrap(), SAMPLE);
        assert_eq!(decode_bucket(SAMPLE, 1).unwrap(), nodal_bucket());
    }

    #[test]
    fn section_point_is_encoded_as_object() {
        let bucket = FieldBucket::new(
            BucketScope {
                position: PositionKind::IntegrationPoint,
                section_point: Some(SectionPoint::new(5, "Top")),
                ..nodal_bucket().scope().clone()
            },
            vec![3],
            vec![[1.25]],
        )
        .unwrap();
        let line = encode_bucket(&bucket).unwrap();
        assert!(line.contains(r#""section_point":{"number":5,"description":"Top"}"#));
        assert_eq!(decode_bucket(&line, 1).unwrap(), bucket);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let err = format_err(&SAMPLE.replace(r#""instance":"PART-1-1","#, ""));
        assert_eq!(err.line, Some(7));
        assert_eq!(err.field.as_deref(), Some("instance"));
    }

    #[test]
    fn unknown_position_is_rejected() {
        let err = format_err(&SAMPLE.replace("NODAL", "CENTROID"));
        assert_eq!(err.field.as_deref(), Some("position"));
        assert!(err.message.contains("CENTROID"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = format_err(&SAMPLE.replace("[[20.0],[21.5]]", "[[20.0]]"));
        assert_eq!(err.field.as_deref(), Some("values"));
    }

    #[test]
    fn values_must_be_single_element_arrays() {
        let err = format_err(&SAMPLE.replace("[[20.0],[21.5]]", "[[20.0],[21.5, 1.0]]"));
        assert_eq!(err.field.as_deref(), Some("values[1]"));
        let err = format_err(&SAMPLE.replace("[[20.0],[21.5]]", "[20.0, 21.5]"));
        assert_eq!(err.field.as_deref(), Some("values[0]"));
    }

    #[test]
    fn section_point_on_nodal_is_rejected() {
        let err = format_err(&SAMPLE.replace("null", r#"{"number":1,"description":"Bottom"}"#));
        assert_eq!(err.field.as_deref(), Some("section_point"));
    }

    #[test]
    fn reader_numbers_lines_and_skips_blanks() {
        let text = format!("{SAMPLE}\n\n{SAMPLE}\n{{not json\n{SAMPLE}\n");
        let mut reader = BucketReader::new(text.as_bytes());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert_eq!(reader.line(), 3);
        match reader.next().unwrap() {
            Err(IoError::Format(err)) => assert_eq!(err.line, Some(4)),
            other => panic!("expected format error, got {other:?}"),
        }
        assert!(reader.next().is_none(), "reader stops after the first error");
    }

    #[test]
    fn numbered_buckets_carry_their_line() {
        let text = format!("\n{SAMPLE}\n\n\n{SAMPLE}\n");
        let lines: Vec<usize> = BucketReader::new(text.as_bytes())
            .numbered()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(lines, vec![2, 5]);
    }

    #[test]
    fn invalid_utf8_is_a_format_error_with_line() {
        let mut bytes = format!("{SAMPLE}\n").into_bytes();
        bytes.extend_from_slice(b"{\"step\":\"\xff\xfe\"}\n");
        let mut reader = BucketReader::new(bytes.as_slice());
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(IoError::Format(err)) => {
                assert_eq!(err.line, Some(2));
                assert_eq!(err.artifact, Artifact::Buckets);
            }
            other => panic!("expected format error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn resolution_against_steps_reports_unknown_frames() {
        let mut step = Step::new("Thermal_Step", "");
        step.push_frame(0.0, "");
        let mut steps = Steps::new();
        steps.add_step(step).unwrap();

        let text = format!("{SAMPLE}\n{}\n", SAMPLE.replace(r#""frame_index":0"#, r#""frame_index":5"#));
        let mut reader = BucketReader::new(text.as_bytes()).resolve_against(&steps);
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(IoError::Format(err)) => {
                assert_eq!(err.line, Some(2));
                assert_eq!(err.field.as_deref(), Some("frame_index"));
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn writes_one_line_per_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nt11.jsonl");
        let count = write_buckets(&path, vec![nodal_bucket(), nodal_bucket()]).unwrap();
        assert_eq!(count, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{SAMPLE}\n{SAMPLE}\n"));
        let read: Vec<_> = BucketReader::open(&path).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(read.len(), 2);
    }
}
