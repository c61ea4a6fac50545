/// File-level tests for both archive generations
///
/// Covers persistence through the filesystem: legacy archives written and
/// reopened, and the current archive's commit/reopen cycle observed from
/// the stored document.

use odbx_model::{PositionKind, SectionPoint};
use odbx_native::{
    ArchiveDocument, ArchiveHeader, CurrentArchive, FieldBlock, LegacyArchive, LegacyDocument,
    NativeError, NativeFrame, NativeNode, NativeStep, SourceRepository, TargetBackend,
    TargetRepository,
};

#[test]
fn test_legacy_archive_survives_save_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.json");

    let mut doc = LegacyDocument::new();
    doc.add_instance("PLATE-1")
        .node(1, &[0.0, 0.0])
        .node(2, &[1.0, 0.0])
        .node(3, &[1.0, 1.0])
        .element(1, "DC2D3", &[1, 2, 3]);
    doc.add_step("Heat", "transient")
        .add_frame(0.0, "Increment 0")
        .field_output("NT11")
        .nodal("PLATE-1", 1, 20.0)
        .nodal("PLATE-1", 2, 25.0)
        .nodal("PLATE-1", 3, 30.0);
    LegacyArchive::from_document(doc.clone())
        .unwrap()
        .save(&path)
        .unwrap();

    let archive = LegacyArchive::open(&path).unwrap();
    assert_eq!(archive.document(), &doc);
    let elements = archive.elements("PLATE-1").unwrap();
    assert_eq!(elements[0].type_name, "DC2D3");
    let values = archive.field_values("Heat", 0, "NT11").unwrap().unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values[2].node_label, Some(3));
}

#[test]
fn test_legacy_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = LegacyArchive::open(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, NativeError::NotFound(_)));
}

#[test]
fn test_legacy_open_garbage_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        LegacyArchive::open(&path),
        Err(NativeError::Corrupt(_))
    ));
}

#[test]
fn test_current_archive_commit_then_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("target.json");
    let archive = CurrentArchive::new(
        &path,
        ArchiveHeader::new("derived").with_title("title"),
    );

    let mut session = archive.create().unwrap();
    session.create_part("PART").unwrap();
    session
        .add_nodes(
            "PART",
            &[
                NativeNode {
                    label: 1,
                    coordinates: vec![0.0, 0.0, 0.0],
                },
                NativeNode {
                    label: 2,
                    coordinates: vec![1.0, 0.0, 0.0],
                },
            ],
        )
        .unwrap();
    session.create_instance("PART-1", "PART").unwrap();
    session.save().unwrap();
    session.close().unwrap();

    let stored = ArchiveDocument::load(&path).unwrap();
    assert!(stored.geometry_committed);
    assert!(stored.header.created.is_some());
    assert!(stored.steps.is_empty());

    let mut session = archive.open().unwrap();
    session
        .create_step(
            &NativeStep {
                name: "S".into(),
                description: String::new(),
                domain: "TIME".into(),
            },
            2.0,
        )
        .unwrap();
    for (i, t) in [0.0, 2.0].into_iter().enumerate() {
        session
            .create_frame(
                "S",
                &NativeFrame {
                    increment_number: i,
                    frame_value: t,
                    description: String::new(),
                },
            )
            .unwrap();
    }
    session.create_field_output("S", 1, "NT11", "temp").unwrap();
    session.create_section_category("CAT", "cat").unwrap();
    let point = session.create_section_point("CAT", 1, "bottom").unwrap();
    let again = session.create_section_point("CAT", 1, "bottom").unwrap();
    assert_eq!(point, again);
    session
        .add_field_data(
            "S",
            1,
            "NT11",
            FieldBlock {
                instance: "PART-1",
                position: PositionKind::Nodal,
                section_point: None,
                labels: &[2, 1],
                data: &[[7.5], [3.0]],
            },
        )
        .unwrap();
    session.save().unwrap();
    session.close().unwrap();

    let stored = ArchiveDocument::load(&path).unwrap();
    assert_eq!(stored.section_categories[0].section_points.len(), 1);
    assert_eq!(
        stored.field_value("S", 1, "NT11", "PART-1", PositionKind::Nodal, 1, None),
        Some(3.0)
    );
    assert_eq!(
        stored.field_value(
            "S",
            1,
            "NT11",
            "PART-1",
            PositionKind::Nodal,
            1,
            Some(&SectionPoint::new(1, "bottom"))
        ),
        None
    );
    let summary = stored.summary();
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.values, 2);
    assert!(summary.format().contains("Values: 2"));
}

#[test]
fn test_open_requires_existing_container() {
    let dir = tempfile::tempdir().unwrap();
    let archive = CurrentArchive::new(dir.path().join("none.json"), ArchiveHeader::new("x"));
    assert!(matches!(archive.open(), Err(NativeError::NotFound(_))));
}
