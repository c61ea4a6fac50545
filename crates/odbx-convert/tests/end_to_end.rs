/// End-to-end tests for the export and import pipelines
///
/// Tests complete workflow: legacy archive → artifacts → current archive
/// Covers the single-instance thermal scenario, failure paths and
/// determinism of repeated exports.

use std::fs;
use std::path::Path;

use odbx_convert::{
    Error, ExportConfig, ImportConfig, ReconstructionError, check, export, import, target_archive,
};
use odbx_io::{Artifact, ArtifactPaths, read_mesh, read_steps};
use odbx_model::PositionKind;
use odbx_native::{
    ArchiveDocument, LegacyArchive, LegacyDocument, NativeFieldValue, NativeSectionPoint,
};

const SAMPLE_LINE: &str = r#"{"step":"Thermal_Step","frame_index":0,"frame_value":0.0,"instance":"PART-1-1","position":"NODAL","section_point":null,"labels":[1,2],"values":[[20.0],[21.5]]}"#;

/// Instance PART-1-1 with nodes 1 and 2, one thermal step with one frame
fn thermal_source() -> LegacyArchive {
    let mut doc = LegacyDocument::new();
    doc.add_instance("PART-1-1")
        .node(1, &[0.0, 0.0, 0.0])
        .node(2, &[1.0, 0.0, 0.0])
        .element(1, "DC1D2", &[1, 2]);
    doc.add_step("Thermal_Step", "Heat transfer")
        .add_frame(0.0, "Increment 0: Step Time = 0.0")
        .field_output("NT11")
        .nodal("PART-1-1", 1, 20.0)
        .nodal("PART-1-1", 2, 21.5);
    LegacyArchive::from_document(doc).unwrap()
}

/// Two instances, shell section points and several frames
fn layered_source() -> LegacyArchive {
    let mut doc = LegacyDocument::new();
    doc.add_instance("BLOCK-1")
        .node(1, &[0.0, 0.0])
        .node(2, &[1.0, 0.0])
        .node(3, &[1.0, 1.0])
        .node(4, &[0.0, 1.0])
        .element(1, "DC2D4", &[1, 2, 3, 4]);
    doc.add_instance("SHELL-1")
        .node(10, &[0.0, 0.0, 2.0])
        .node(11, &[1.0, 0.0, 2.0])
        .node(12, &[1.0, 1.0, 2.0])
        .node(13, &[0.0, 1.0, 2.0])
        .element(100, "DS4", &[10, 11, 12, 13]);
    let step = doc.add_step("Heat", "");
    for (i, t) in [0.0, 0.25, 1.0].into_iter().enumerate() {
        let output = step.add_frame(t, format!("Increment {i}")).field_output("NT11");
        for node in 1..=4 {
            output.nodal("BLOCK-1", node, 20.0 + t * node as f64);
        }
        for (sp, offset) in [(1, 0.0), (5, 0.5)] {
            output.push(NativeFieldValue {
                instance: "SHELL-1".to_string(),
                position: "INTEGRATION_POINT".to_string(),
                section_point: Some(NativeSectionPoint {
                    number: Some(sp),
                    description: Some(format!("Layer {sp}")),
                }),
                node_label: None,
                element_label: Some(100),
                data: vec![30.0 + t + offset],
            });
        }
    }
    LegacyArchive::from_document(doc).unwrap()
}

fn export_to(source: &LegacyArchive, dir: &Path) -> ArtifactPaths {
    let paths = ArtifactPaths::in_dir(dir);
    export(source, &paths, &ExportConfig::default()).unwrap();
    paths
}

#[test]
fn test_thermal_scenario_export() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&thermal_source(), dir.path());

    let mesh = read_mesh(&paths.mesh).unwrap();
    let instance = mesh.instance("PART-1-1").unwrap();
    let labels: Vec<u32> = instance.nodes().iter().map(|n| n.label).collect();
    assert_eq!(labels, vec![1, 2]);

    let steps = read_steps(&paths.steps).unwrap();
    assert_eq!(steps.len(), 1);
    let step = steps.get("Thermal_Step").unwrap();
    assert_eq!(step.frames().len(), 1);
    assert_eq!(step.frames()[0].time, 0.0);

    let jsonl = fs::read_to_string(&paths.buckets).unwrap();
    let lines: Vec<&str> = jsonl.lines().collect();
    assert_eq!(lines, vec![SAMPLE_LINE]);
}

#[test]
fn test_thermal_scenario_import() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&thermal_source(), &dir.path().join("export"));

    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    let report = import(&target_archive(&target, &config), &paths, &config).unwrap();
    assert_eq!(report.instances, 1);
    assert_eq!(report.frames, 1);
    assert_eq!(report.buckets, 1);
    assert_eq!(report.values, 2);

    let doc = ArchiveDocument::load(&target).unwrap();
    assert_eq!(doc.header.name, "derivedNT11");
    assert_eq!(doc.header.analysis_title, "Imported from JSON(L)");
    let value = |node| {
        doc.field_value("Thermal_Step", 0, "NT11", "PART-1-1", PositionKind::Nodal, node, None)
    };
    assert_eq!(value(1), Some(20.0));
    assert_eq!(value(2), Some(21.5));
    let output = doc.field_output("Thermal_Step", 0, "NT11").unwrap();
    assert_eq!(output.description, "Imported temperature");
    assert_eq!(output.field_type, "SCALAR");
}

#[test]
fn test_geometry_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = layered_source();
    let paths = export_to(&source, &dir.path().join("export"));
    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    import(&target_archive(&target, &config), &paths, &config).unwrap();

    let doc = ArchiveDocument::load(&target).unwrap();
    let names: Vec<&str> = doc
        .root_assembly
        .instances
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["BLOCK-1", "SHELL-1"]);

    for original in &source.document().root_assembly.instances {
        let part = doc.part(&format!("PART_FROM_{}", original.name)).unwrap();
        let node_labels: Vec<i64> = part.nodes.iter().map(|n| n.label).collect();
        let original_labels: Vec<i64> = original.nodes.iter().map(|n| n.label).collect();
        assert_eq!(node_labels, original_labels);

        let elements: Vec<_> = part.element_blocks.iter().flat_map(|b| &b.elements).collect();
        assert_eq!(elements.len(), original.elements.len());
        for (written, expected) in elements.iter().zip(&original.elements) {
            assert_eq!(written.label, expected.label);
            assert_eq!(written.type_name, expected.type_name);
            assert_eq!(written.connectivity, expected.connectivity);
        }
    }
    // Planar coordinates are padded
    assert_eq!(doc.parts[0].nodes[2].coordinates, vec![1.0, 1.0, 0.0]);
}

#[test]
fn test_section_points_survive_import() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&layered_source(), &dir.path().join("export"));
    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    let report = import(&target_archive(&target, &config), &paths, &config).unwrap();
    // per frame: BLOCK-1 nodal + two SHELL-1 section point buckets
    assert_eq!(report.buckets, 9);
    assert_eq!(report.field_outputs, 3);

    let doc = ArchiveDocument::load(&target).unwrap();
    assert_eq!(doc.section_categories.len(), 1);
    assert_eq!(doc.section_categories[0].name, "GEN_SEC_CAT");
    assert_eq!(doc.section_categories[0].section_points.len(), 2);
    let layer5 = odbx_model::SectionPoint::new(5, "Layer 5");
    assert_eq!(
        doc.field_value(
            "Heat",
            2,
            "NT11",
            "SHELL-1",
            PositionKind::IntegrationPoint,
            100,
            Some(&layer5)
        ),
        Some(31.5)
    );
    assert_eq!(doc.steps[0].time_period, 1.0);
}

#[test]
fn test_export_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let source = layered_source();
    let first = export_to(&source, &dir.path().join("a"));
    let second = export_to(&source, &dir.path().join("b"));
    for artifact in [Artifact::Mesh, Artifact::Steps, Artifact::Buckets] {
        assert_eq!(
            fs::read(first.path(artifact)).unwrap(),
            fs::read(second.path(artifact)).unwrap(),
            "{artifact} differs between runs"
        );
    }
    // Re-running into the same directory overwrites identically
    let again = export_to(&source, &dir.path().join("a"));
    assert_eq!(
        fs::read(&again.buckets).unwrap(),
        fs::read(&second.buckets).unwrap()
    );
}

#[test]
fn test_step_filter_restricts_export() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let config = ExportConfig::default().with_step_list("Missing");
    let err = export(&thermal_source(), &paths, &config).unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(!paths.mesh.exists());
}

/// Steps with frames 0..=2 and a bucket on frame 5
fn write_frame_five_artifacts(dir: &Path) -> ArtifactPaths {
    let paths = export_to(&thermal_source(), dir);
    fs::write(
        &paths.steps,
        r#"[{"name": "Thermal_Step", "frames": [
            {"index": 0, "time": 0.0}, {"index": 1, "time": 0.5}, {"index": 2, "time": 1.0}]}]"#,
    )
    .unwrap();
    let line = SAMPLE_LINE.replace(r#""frame_index":0"#, r#""frame_index":5"#);
    fs::write(&paths.buckets, format!("{SAMPLE_LINE}\n{line}\n")).unwrap();
    paths
}

#[test]
fn test_unknown_frame_is_reconstruction_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_frame_five_artifacts(&dir.path().join("export"));
    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    let err = import(&target_archive(&target, &config), &paths, &config).unwrap_err();
    assert!(matches!(
        err,
        Error::Reconstruction(ReconstructionError::UnknownFrame {
            line: 2,
            frame_index: 5,
            ..
        })
    ));
    // Geometry was committed, but no results were saved
    let doc = ArchiveDocument::load(&target).unwrap();
    assert!(doc.geometry_committed);
    assert!(doc.steps.is_empty());
}

/// Import the thermal export with `stray` appended after two blank lines
fn import_with_stray_bucket(dir: &Path, stray: &str) -> (Error, ArchiveDocument) {
    let paths = export_to(&thermal_source(), &dir.join("export"));
    fs::write(&paths.buckets, format!("{SAMPLE_LINE}\n\n\n{stray}\n")).unwrap();
    let config = ImportConfig::default();
    let target = dir.join("derived.json");
    let err = import(&target_archive(&target, &config), &paths, &config).unwrap_err();
    (err, ArchiveDocument::load(&target).unwrap())
}

#[test]
fn test_unknown_step_is_reconstruction_error() {
    let dir = tempfile::tempdir().unwrap();
    let stray = SAMPLE_LINE.replace("Thermal_Step", "Cooling_Step");
    let (err, doc) = import_with_stray_bucket(dir.path(), &stray);
    match err {
        Error::Reconstruction(ReconstructionError::UnknownStep {
            line,
            step,
            frame_index,
            instance,
        }) => {
            assert_eq!(line, 4);
            assert_eq!(step, "Cooling_Step");
            assert_eq!(frame_index, 0);
            assert_eq!(instance, "PART-1-1");
        }
        other => panic!("expected unknown step, got {other}"),
    }
    assert!(doc.steps.is_empty());
}

#[test]
fn test_unknown_instance_is_reconstruction_error() {
    let dir = tempfile::tempdir().unwrap();
    let stray = SAMPLE_LINE.replace("PART-1-1", "NOPE");
    let (err, doc) = import_with_stray_bucket(dir.path(), &stray);
    match &err {
        Error::Reconstruction(ReconstructionError::UnknownInstance {
            line,
            step,
            frame_index,
            instance,
        }) => {
            assert_eq!(*line, 4);
            assert_eq!(step, "Thermal_Step");
            assert_eq!(*frame_index, 0);
            assert_eq!(instance, "NOPE");
        }
        other => panic!("expected unknown instance, got {other}"),
    }
    assert!(err.to_string().contains("line 4"));
    assert!(doc.steps.is_empty());
}

#[test]
fn test_check_reports_unresolvable_frame_with_line() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_frame_five_artifacts(dir.path());
    match check(&paths).unwrap_err() {
        Error::Format(err) => {
            assert_eq!(err.line, Some(2));
            assert_eq!(err.field.as_deref(), Some("frame_index"));
        }
        other => panic!("expected format error, got {other}"),
    }
}

#[test]
fn test_check_accepts_clean_export() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&layered_source(), dir.path());
    let report = check(&paths).unwrap();
    assert_eq!(report.buckets, 9);
    assert_eq!(report.frames, 3);
}

#[test]
fn test_length_mismatch_aborts_import() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&thermal_source(), &dir.path().join("export"));
    let broken = SAMPLE_LINE.replace(r#"[[20.0],[21.5]]"#, r#"[[20.0]]"#);
    fs::write(&paths.buckets, format!("{broken}\n")).unwrap();

    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    let err = import(&target_archive(&target, &config), &paths, &config).unwrap_err();
    match err {
        Error::Format(err) => assert_eq!(err.line, Some(1)),
        other => panic!("expected format error, got {other}"),
    }
}

#[test]
fn test_import_requires_fresh_target() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export_to(&thermal_source(), &dir.path().join("export"));
    let config = ImportConfig::default();
    let target = dir.path().join("derived.json");
    import(&target_archive(&target, &config), &paths, &config).unwrap();
    let err = import(&target_archive(&target, &config), &paths, &config).unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
}
