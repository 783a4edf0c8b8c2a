use quick_xml::events::Event;
use quick_xml::Reader;
use reportwriter::report_config::CompanyInfo;
use reportwriter::{generate, generate_all, snapshot, OutputFormat, RenderOptions, Report};
use serde_json::json;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

fn write_png(path: &Path) {
    image::RgbImage::from_pixel(8, 6, image::Rgb([200, 30, 30]))
        .save(path)
        .unwrap();
}

/// Two findings (Low listed first), one image and one text evidence file
fn write_report(dir: &Path) -> std::path::PathBuf {
    write_png(&dir.join("login.png"));
    std::fs::write(dir.join("scan.txt"), "PORT   STATE\n22/tcp open\n").unwrap();

    let report = json!({
        "id": 42,
        "title": "Q3 External Assessment",
        "client": { "name": "Acme Corporation", "short_name": "ACME" },
        "project": { "project_type": "Penetration Test", "start_date": "2024-03-04" },
        "findings": [
            {
                "id": 2,
                "title": "Verbose Banner",
                "severity": { "name": "Low" },
                "description": "<p>The banner of {{.client}} leaks versions.</p><p>{{.scan}}</p>",
                "mitigation": "<p>Hide the banner.</p>",
                "evidence": [
                    { "id": 20, "friendly_name": "scan", "document": "scan.txt", "caption": "Port scan" }
                ]
            },
            {
                "id": 1,
                "title": "SQL Injection",
                "severity": { "name": "Critical" },
                "description": "<p>Login form is injectable.</p><p>{{.login}}</p><p>{{.nonexistent}}</p>",
                "impact": "<ul><li>Data theft</li><li>Account takeover</li></ul>",
                "mitigation": "<p>Use parameterised queries.</p>",
                "evidence": [
                    { "id": 10, "friendly_name": "login", "document": "login.png", "caption": "Login page" }
                ]
            }
        ]
    });

    let path = dir.join("report.json");
    std::fs::write(&path, serde_json::to_string_pretty(&report).unwrap()).unwrap();
    path
}

fn load_snapshot(dir: &Path) -> reportwriter::ReportSnapshot {
    let report = Report::load(write_report(dir)).unwrap();
    snapshot::build_with_evidence_root(&report, &CompanyInfo::default(), dir)
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut contents = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    contents
}

fn part_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn assert_well_formed(xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("malformed XML at {}: {}", reader.buffer_position(), e),
        }
    }
}

#[test]
fn test_findings_are_ordered_by_severity() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act
    let snap = load_snapshot(dir.path());

    // Assert
    let titles: Vec<&str> = snap.findings.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["SQL Injection", "Verbose Banner"]);
    assert_eq!(snap.client.display_name(), "ACME");
}

#[test]
fn test_docx_renders_one_section_per_finding() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());

    // Act
    let rendered = generate(&snap, OutputFormat::Docx, &RenderOptions::default()).unwrap();

    // Assert
    let document = read_part(&rendered.bytes, "word/document.xml");
    assert_well_formed(&document);
    assert_eq!(document.matches(r#"<w:pStyle w:val="Heading2"/>"#).count(), 2);
    assert_eq!(document.matches(r#"w:type="page""#).count(), 1);
    assert!(document.find("SQL Injection") < document.find("Verbose Banner"));
    assert!(document.contains("The banner of ACME leaks versions."));
    assert!(document.contains("22/tcp open"));
    assert!(document.contains("{{.nonexistent}}"));
    assert!(document.contains("Q3 External Assessment"));
    assert!(part_names(&rendered.bytes)
        .iter()
        .any(|name| name.starts_with("word/media/")));
    assert!(rendered.warnings.is_empty());
}

#[test]
fn test_pptx_deck_has_fixed_slides_plus_findings() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());

    // Act
    let rendered = generate(&snap, OutputFormat::Pptx, &RenderOptions::default()).unwrap();

    // Assert
    let names = part_names(&rendered.bytes);
    let slides = names
        .iter()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .count();
    assert_eq!(slides, 12);

    let finding_slide = read_part(&rendered.bytes, "ppt/slides/slide8.xml");
    assert_well_formed(&finding_slide);
    assert!(finding_slide.contains("SQL Injection [Critical]"));

    let text_slide = read_part(&rendered.bytes, "ppt/slides/slide9.xml");
    assert_well_formed(&text_slide);
    let capture_shape = text_slide
        .split("<p:sp>")
        .find(|shape| shape.contains("22/tcp open"))
        .unwrap();
    assert!(capture_shape.contains(r#"txBox="1""#));
    assert!(!capture_shape.contains("<p:ph"));
    assert!(text_slide.contains("Caption – Port scan"));

    let presentation = read_part(&rendered.bytes, "ppt/presentation.xml");
    assert_eq!(presentation.matches("<p:sldId ").count(), 12);
}

#[test]
fn test_xlsx_colours_severity_cells() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());

    // Act
    let rendered = generate(&snap, OutputFormat::Xlsx, &RenderOptions::default()).unwrap();

    // Assert
    let sheet = read_part(&rendered.bytes, "xl/worksheets/sheet1.xml");
    assert_well_formed(&sheet);
    assert_eq!(sheet.matches("<row ").count(), 3);
    assert!(sheet.contains(r#"<c r="B2" s="3" t="inlineStr">"#));
    assert!(sheet.contains(r#"<c r="B3" s="4" t="inlineStr">"#));

    let styles = read_part(&rendered.bytes, "xl/styles.xml");
    let critical = styles.find(r#"<fgColor rgb="FF966FD6"/>"#).unwrap();
    let low = styles.find(r#"<fgColor rgb="FFA8D08D"/>"#).unwrap();
    assert!(critical < low);
}

#[test]
fn test_bordered_evidence_is_idempotent() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());
    let options = RenderOptions::default();

    // Act
    generate(&snap, OutputFormat::Docx, &options).unwrap();
    let first = std::fs::read(dir.path().join("border_login.png")).unwrap();
    generate(&snap, OutputFormat::Docx, &options).unwrap();
    let second = std::fs::read(dir.path().join("border_login.png")).unwrap();

    // Assert
    assert_eq!(first, second);
    let bordered = image::load_from_memory(&second).unwrap();
    assert_eq!((bordered.width(), bordered.height()), (10, 8));
    assert!(!dir.path().join("border_border_login.png").exists());
}

#[test]
fn test_control_characters_never_reach_the_xml() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let mut snap = load_snapshot(dir.path());
    snap.findings[0].title = "Broken\u{1}Title <script>".to_string();
    snap.findings[0].description = "<p>Bad\u{8} byte &amp; more</p>".to_string();

    // Act
    let docx = generate(&snap, OutputFormat::Docx, &RenderOptions::default()).unwrap();
    let xlsx = generate(&snap, OutputFormat::Xlsx, &RenderOptions::default()).unwrap();

    // Assert
    let document = read_part(&docx.bytes, "word/document.xml");
    assert_well_formed(&document);
    assert!(!document.contains('\u{1}'));
    assert!(!document.contains('\u{8}'));
    assert!(document.contains("BrokenTitle &lt;script&gt;"));

    let sheet = read_part(&xlsx.bytes, "xl/worksheets/sheet1.xml");
    assert_well_formed(&sheet);
    assert!(!sheet.contains('\u{1}'));
}

#[test]
fn test_missing_evidence_is_a_warning() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());
    std::fs::remove_file(dir.path().join("login.png")).unwrap();

    // Act
    let rendered = generate(&snap, OutputFormat::Docx, &RenderOptions::default()).unwrap();

    // Assert
    assert_eq!(rendered.warnings.len(), 1);
    assert!(rendered.warnings[0].contains("login"));
}

#[test]
fn test_generate_all_writes_every_document() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let snap = load_snapshot(dir.path());
    let options = RenderOptions {
        filename_template: "{client} {assessment_type}".to_string(),
        ..RenderOptions::default()
    };

    // Act
    let rendered = generate_all(&snap, &options).unwrap();

    // Assert
    let mut names = part_names(&rendered.bytes);
    names.sort();
    assert_eq!(
        names,
        vec![
            "ACME Penetration Test.docx",
            "ACME Penetration Test.json",
            "ACME Penetration Test.pptx",
            "ACME Penetration Test.xlsx",
        ]
    );

    let json = read_part(&rendered.bytes, "ACME Penetration Test.json");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["findings"][0]["severity"], "Critical");
}
