//! SVG overlay writer for `--viz`.

use speedreader_core::OcrResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// `page.png` -> `page_viz.svg`, in the same directory.
pub fn viz_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}_viz.svg"))
}

/// Render the recognized words as outlined quadrilaterals with text labels.
pub fn render_svg(width: u32, height: u32, result: &OcrResult) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}">"#
    );
    let _ = writeln!(
        svg,
        r#"  <rect x="0" y="0" width="{width}" height="{height}" fill="white"/>"#
    );

    for word in &result.words {
        let corners = word.bounding_box.rotated_rectangle.corners();
        let points: Vec<String> = corners
            .iter()
            .map(|p| format!("{:.1},{:.1}", p.x, p.y))
            .collect();
        let _ = writeln!(
            svg,
            r#"  <polygon points="{}" fill="none" stroke="crimson" stroke-width="1.5"/>"#,
            points.join(" ")
        );
        let anchor = &corners[0];
        let _ = writeln!(
            svg,
            r#"  <text x="{:.1}" y="{:.1}" font-size="12" fill="navy">{} ({:.2})</text>"#,
            anchor.x,
            (anchor.y - 3.0).max(10.0),
            escape_xml(&word.text),
            word.confidence
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedreader_core::{
        BoundingBox, OcrResult, Point, Polygon, RotatedRectangle, Word,
    };

    fn result_with_word(text: &str) -> OcrResult {
        let rect = RotatedRectangle::new(50.0, 20.0, 40.0, 10.0, 0.0);
        OcrResult {
            page_number: 0,
            words: vec![Word {
                bounding_box: BoundingBox {
                    axis_aligned_rectangle: rect.axis_aligned(),
                    rotated_rectangle: rect,
                    polygon: Polygon::new(vec![Point::new(30.0, 15.0)]),
                },
                text: text.into(),
                confidence: 0.87,
            }],
        }
    }

    #[test]
    fn sidecar_path_keeps_directory() {
        let path = viz_path(Path::new("/tmp/scans/page1.png"));
        assert_eq!(path, Path::new("/tmp/scans/page1_viz.svg"));
    }

    #[test]
    fn svg_contains_polygon_and_label() {
        let svg = render_svg(200, 100, &result_with_word("hello"));
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<polygon"));
        assert!(svg.contains("hello (0.87)"));
        assert!(svg.contains(r#"viewBox="0 0 200 100""#));
    }

    #[test]
    fn labels_are_xml_escaped() {
        let svg = render_svg(200, 100, &result_with_word("a<b&c"));
        assert!(svg.contains("a&lt;b&amp;c"));
        assert!(!svg.contains("a<b&c"));
    }
}
