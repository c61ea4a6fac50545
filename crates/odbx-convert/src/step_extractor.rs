//! Step and frame metadata extraction.

use odbx_model::{Frame, Step, Steps};
use odbx_native::SourceRepository;

use crate::error::{ExtractionError, NativeResultExt, Result};

/// Read steps and their frames in native order.
///
/// With a filter, only the named steps are kept (still in native order);
/// a name the source does not define is an error.
pub fn extract_steps<S: SourceRepository>(source: &S, filter: Option<&[String]>) -> Result<Steps> {
    let native = source.steps();
    if let Some(names) = filter
        && let Some(missing) = names
            .iter()
            .find(|name| !native.iter().any(|s| &s.name == *name))
    {
        return Err(ExtractionError::UnknownStep(missing.clone()).into());
    }

    let mut steps = Steps::new();
    for step in native
        .iter()
        .filter(|s| filter.is_none_or(|names| names.contains(&s.name)))
    {
        let frames = source
            .frames(&step.name)
            .during(format!("enumerate frames of step '{}'", step.name))?
            .into_iter()
            .enumerate()
            .map(|(index, frame)| Frame {
                index,
                time: frame.frame_value,
                description: frame.description,
            })
            .collect();
        let invalid = |e: odbx_model::ModelError| ExtractionError::InvalidStep {
            step: step.name.clone(),
            message: e.to_string(),
        };
        let extracted = Step::from_frames(
            step.name.clone(),
            step.description.clone(),
            step.domain.clone(),
            frames,
        )
        .map_err(invalid)?;
        steps.add_step(extracted).map_err(invalid)?;
    }
    tracing::info!(
        steps = steps.len(),
        frames = steps.total_frames(),
        "steps extracted"
    );
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use odbx_native::{LegacyArchive, LegacyDocument};

    fn source() -> LegacyArchive {
        let mut doc = LegacyDocument::new();
        let heat = doc.add_step("Heat", "heating");
        heat.add_frame(0.0, "Increment 0");
        heat.add_frame(0.5, "Increment 1");
        heat.add_frame(1.0, "Increment 2");
        doc.add_step("Cool", "").add_frame(0.0, "");
        LegacyArchive::from_document(doc).unwrap()
    }

    #[test]
    fn all_steps_by_default() {
        let steps = extract_steps(&source(), None).unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Heat", "Cool"]);
        let heat = steps.get("Heat").unwrap();
        assert_eq!(heat.frames().len(), 3);
        assert_eq!(heat.frames()[2].time, 1.0);
        assert_eq!(heat.frames()[1].description, "Increment 1");
    }

    #[test]
    fn filter_keeps_native_order() {
        let filter = vec!["Cool".to_string(), "Heat".to_string()];
        let steps = extract_steps(&source(), Some(&filter)).unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Heat", "Cool"]);

        let only = vec!["Cool".to_string()];
        assert_eq!(extract_steps(&source(), Some(&only)).unwrap().len(), 1);
    }

    #[test]
    fn unknown_filter_name_fails() {
        let filter = vec!["Nope".to_string()];
        assert!(matches!(
            extract_steps(&source(), Some(&filter)),
            Err(Error::Extraction(ExtractionError::UnknownStep(name))) if name == "Nope"
        ));
    }
}
