use std::fmt::Write;

use crate::summary::Summary;

/// Static upload form served at `/`.
pub fn index_page() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Minescan - Sonar Mine Detection</title>
</head>
<body>
    <h1>Sonar Mine Detection</h1>
    <p>Upload a side-scan sonar image to check for mine-like contacts.</p>
    <form action="/predict" method="post" enctype="multipart/form-data">
        <input type="file" name="file" accept="image/*">
        <button type="submit">Detect</button>
    </form>
</body>
</html>
"#
}

/// Result page: notices, annotated image, detections table, class counts.
/// `img_path` is relative to the static root.
pub fn result_page(summary: &Summary, img_path: &str) -> String {
    let mut body = String::new();

    for notice in &summary.notices {
        let _ = writeln!(body, r#"    <p class="notice">{}</p>"#, escape(&notice.to_string()));
    }

    let _ = writeln!(
        body,
        r#"    <img src="/static/{}" alt="detection result" style="max-width: 100%;">"#,
        escape(img_path)
    );

    if !summary.predictions.is_empty() {
        body.push_str("    <h2>Detections</h2>\n    <table border=\"1\">\n");
        body.push_str("        <tr><th>Label</th><th>Confidence (%)</th></tr>\n");
        for prediction in &summary.predictions {
            let _ = writeln!(
                body,
                "        <tr><td>{}</td><td>{:.2}</td></tr>",
                escape(&prediction.label),
                prediction.confidence
            );
        }
        body.push_str("    </table>\n");

        body.push_str("    <h2>Counts</h2>\n    <ul>\n");
        for (label, count) in &summary.class_counts {
            let _ = writeln!(body, "        <li>{}: {}</li>", escape(label), count);
        }
        body.push_str("    </ul>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Minescan - Result</title>
</head>
<body>
    <h1>Detection Result</h1>
{body}    <p><a href="/">Upload another image</a></p>
</body>
</html>
"#
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
