//! Server-rendered HTML for the upload page.
//!
//! The page has three states: idle (upload form), result (original and
//! enhanced players) and message (warning or error). A busy indicator is
//! shown while the form submission is in flight.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::audio::{encode_wav, WavError};
use crate::pipeline::EnhancementResult;
use crate::validation::ALLOWED_EXTENSIONS;

const PAGE_TITLE: &str = "Speech Enhancement";

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2rem 4rem; }
.warning { background: #fff4d6; border-left: 4px solid #f0ad00; padding: 0.75rem 1rem; }
.error { background: #fde2e2; border-left: 4px solid #d33; padding: 0.75rem 1rem; }
#spinner { display: none; margin-top: 1rem; }
.player { margin: 1rem 0; }
.player audio { width: 100%; }
"#;

/// Idle state: just the uploader
pub fn render_index(model_name: &str) -> String {
    page(model_name, "")
}

/// Result state: original and enhanced audio players
pub fn render_result(model_name: &str, result: &EnhancementResult) -> Result<String, WavError> {
    let original = wav_data_uri(&encode_wav(&result.original)?);
    let enhanced = wav_data_uri(&encode_wav(&result.enhanced)?);

    let body = format!(
        r#"<div class="player" id="original">
  <p>Original audio</p>
  <audio controls src="{original}" data-sample-rate="{original_rate}"></audio>
</div>
<div class="player" id="enhanced">
  <p>Enhanced audio</p>
  <audio controls src="{enhanced}" data-sample-rate="{enhanced_rate}"></audio>
</div>
<p><small>{duration:.2}s of audio, uploaded at {source_rate} Hz, processed in {ms} ms</small></p>"#,
        original_rate = result.original.sample_rate,
        enhanced_rate = result.enhanced.sample_rate,
        duration = result.original.duration_secs(),
        source_rate = result.source_sample_rate,
        ms = result.processing_ms,
    );

    Ok(page(model_name, &body))
}

/// Message state for rejected uploads
pub fn render_warning(model_name: &str, message: &str) -> String {
    page(
        model_name,
        &format!(r#"<div class="warning">{}</div>"#, escape_html(message)),
    )
}

/// Message state for uploads that failed during processing
pub fn render_error(model_name: &str, message: &str) -> String {
    page(
        model_name,
        &format!(r#"<div class="error">{}</div>"#, escape_html(message)),
    )
}

fn page(model_name: &str, body: &str) -> String {
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{PAGE_TITLE} | {model}</title>
<style>{STYLE}</style>
</head>
<body>
<h1>{PAGE_TITLE} - {model}</h1>
<form method="post" action="/enhance" enctype="multipart/form-data"
      onsubmit="document.getElementById('spinner').style.display='block'">
  <label for="file">Upload an audio file</label>
  <input type="file" id="file" name="file" accept="{accept}" required>
  <button type="submit">Enhance</button>
</form>
<div id="spinner">Processing...</div>
{body}
</body>
</html>
"#,
        model = escape_html(model_name),
    )
}

fn wav_data_uri(wav: &[u8]) -> String {
    format!("data:audio/wav;base64,{}", STANDARD.encode(wav))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
