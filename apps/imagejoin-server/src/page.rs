//! HTML rendering
//!
//! The page is a pure function of the session: handlers mutate state and
//! the browser redraws by fetching the page again.
//!
//! Every button submits `options-form`, so typed option values reach the
//! server with each action and survive the redraw.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use html_escape::{encode_double_quoted_attribute, encode_text};
use imagejoin_core::{ConversionResult, Quality};
use uuid::Uuid;

use crate::state::UiSession;

pub const NO_INPUT_MESSAGE: &str = "Please upload at least one image to convert.";
pub const SUCCESS_MESSAGE: &str = "PDF created successfully! Ready for download.";

/// Outcome of the request being answered, shown above the form
pub enum Notice {
    None,
    Error(String),
    Converted(ConversionResult),
}

const STYLE: &str = r#"
  body { margin: 0; background-color: #F8F9FA; color: #212529;
         font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; }
  .layout { display: flex; min-height: 100vh; }
  aside { width: 280px; padding: 24px; background-color: #EEF1F4; box-sizing: border-box; }
  main { flex: 1; max-width: 760px; margin: 0 auto; padding: 24px; }
  h1 { text-align: center; color: #007BFF; margin-bottom: 0.5rem; }
  h2 { color: #495057; }
  .subtitle { text-align: center; color: #555555; }
  .card { border: 1px solid #DEE2E6; border-radius: 8px; padding: 20px; background: white; }
  .row { display: flex; align-items: center; gap: 16px; padding: 8px 0; border-bottom: 1px solid #E9ECEF; }
  .row .pos { width: 32px; font-weight: bold; }
  .row img { width: 150px; }
  .row .name { flex: 1; color: #495057; }
  button, .download { border-radius: 25px; border: none; padding: 10px 20px; cursor: pointer;
                      background-color: #007BFF; color: white; font-weight: bold; text-decoration: none;
                      box-shadow: 0 4px 10px rgba(0, 123, 255, 0.25); transition: all 0.3s ease; }
  button:hover { background-color: #0056b3; transform: translateY(-3px); }
  button.secondary { background-color: #E9ECEF; color: #495057; box-shadow: 0 2px 5px rgba(0, 0, 0, 0.1); }
  button.move { padding: 6px 12px; background-color: #E9ECEF; box-shadow: none; }
  .download { display: inline-block; background-color: #28A745; box-shadow: 0 4px 10px rgba(40, 167, 69, 0.25); }
  .info { background-color: #E6F3FF; border: 1px solid #B3D9FF; border-radius: 6px; padding: 10px 14px; }
  .success { background-color: #D4EDDA; border: 1px solid #C3E6CB; border-radius: 6px; padding: 10px 14px; }
  .error { background-color: #F8D7DA; border: 1px solid #F5C6CB; border-radius: 6px; padding: 10px 14px; }
  .field { margin: 12px 0; }
  .field label { display: block; font-weight: 600; margin-bottom: 4px; }
  .field input[type=text] { width: 100%; padding: 8px; box-sizing: border-box; }
  .options { display: flex; gap: 24px; }
  .options > div { flex: 1; }
  .actions { display: flex; justify-content: flex-end; gap: 12px; margin-top: 16px; }
  .footer { text-align: center; font-size: 0.8rem; color: #888888; margin-top: 2rem; }
  .balloons { position: fixed; inset: 0; pointer-events: none; overflow: hidden; }
  .balloons span { position: absolute; bottom: -80px; font-size: 48px; animation: rise 4s ease-in forwards; }
  @keyframes rise { to { transform: translateY(-120vh); opacity: 0.6; } }
"#;

const HOW_TO_USE: &str = r#"<ol>
      <li>Upload images in the main section.</li>
      <li><strong>Use the ⬆️ and ⬇️ buttons to reorder pages.</strong></li>
      <li>Adjust settings like quality in this sidebar.</li>
      <li>Enter a custom filename.</li>
      <li>Click 'Convert to PDF'.</li>
      <li>Download your file!</li>
    </ol>"#;

/// Combined size in megabytes with two decimals
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

/// Render the full page for one session
pub fn render(id: Uuid, session: &UiSession, notice: &Notice) -> String {
    let base = format!("/s/{}", id);
    let options = &session.options;

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Pro-Max PDF Converter</title>
  <style>{style}</style>
</head>
<body>
<div class="layout">
<main>
  <h1>Pro-Max PDF Converter</h1>
  <p class="subtitle">Quickly convert images to a single, high-quality PDF with advanced controls.</p>
  <div class="card">
    <div class="field">
      <label for="images">📂 Select your images:</label>
      <input id="images" type="file" name="images" form="options-form" accept=".jpg,.jpeg,.png" multiple>
      <button type="submit" class="secondary" form="options-form" formaction="{base}/upload"
              formenctype="multipart/form-data">Upload</button>
    </div>
    {image_list}
    <hr>
    <form id="options-form" method="post" action="{base}/convert">
      <div class="field">
        <label for="filename">📝 PDF Filename:</label>
        <input id="filename" type="text" name="filename" value="{filename}"
               title="Enter a name for your PDF. The '.pdf' extension will be added automatically.">
      </div>
      <h2>PDF Options</h2>
      <div class="options">
        <div class="field">
          <label for="title">PDF Title:</label>
          <input id="title" type="text" name="title" value="{title}" title="Add a title to the PDF metadata.">
        </div>
        <div class="field">
          <label>
            <input type="checkbox" name="compress"{compress_checked}
                   title="This will reduce the file size, which might slightly reduce quality.">
            Compress PDF for smaller size
          </label>
        </div>
      </div>
      <div class="actions">
        <button type="submit">✨ Convert to PDF</button>
        <button type="submit" class="secondary" form="options-form" formaction="{base}/clear">🗑️ Clear Files</button>
      </div>
    </form>
    {notice}
  </div>
  <div class="footer">Created with axum | Powered by imagejoin &amp; lopdf</div>
</main>
<aside>
  <h2>⚙️ Advanced Settings</h2>
  <p>Adjust these options for custom results.</p>
  <div class="field">
    <label for="quality">Image Quality</label>
    <input id="quality" type="range" name="quality" form="options-form"
           min="{q_min}" max="{q_max}" step="{q_step}" value="{quality}"
           title="Lower quality reduces file size. Higher quality results in a larger file.">
  </div>
  <p class="info">Current quality: {quality}%</p>
  <button type="submit" class="secondary" form="options-form" formaction="{base}/options">Apply settings</button>
  <hr>
  <h2>How to Use</h2>
  <div class="info">
    {how_to_use}
  </div>
</aside>
</div>
</body>
</html>"#,
        style = STYLE,
        base = base,
        image_list = render_image_list(&base, session),
        filename = encode_double_quoted_attribute(&options.filename),
        title = encode_double_quoted_attribute(&options.title),
        compress_checked = if options.compress { " checked" } else { "" },
        notice = render_notice(notice),
        q_min = Quality::MIN,
        q_max = Quality::MAX,
        q_step = Quality::STEP,
        quality = options.quality.value(),
        how_to_use = HOW_TO_USE,
    )
}

fn render_image_list(base: &str, session: &UiSession) -> String {
    let list = match session.images.list() {
        Some(list) if !list.is_empty() => list,
        _ => return String::new(),
    };

    let mut rows = String::new();
    for (i, image) in list.iter().enumerate() {
        let up = if list.can_move_up(i) {
            format!(
                r#"<button type="submit" class="move" title="Move up" form="options-form" formaction="{base}/move/{i}/up">⬆️</button>"#
            )
        } else {
            String::new()
        };
        let down = if list.can_move_down(i) {
            format!(
                r#"<button type="submit" class="move" title="Move down" form="options-form" formaction="{base}/move/{i}/down">⬇️</button>"#
            )
        } else {
            String::new()
        };

        rows.push_str(&format!(
            r#"
      <div class="row">
        <span class="pos">{pos}.</span>
        <img src="{base}/image/{i}" alt="{alt}">
        <span class="name">{name}</span>
        {up}
        {down}
      </div>"#,
            pos = i + 1,
            alt = encode_double_quoted_attribute(image.name()),
            name = encode_text(image.name()),
        ));
    }

    format!(
        r#"
    <h2>Reorder your pages:</h2>
    <div class="pages">{rows}
    </div>
    <p class="info">Total files: <strong>{count}</strong> | Combined size: <strong>{size} MB</strong></p>"#,
        count = list.len(),
        size = format_megabytes(list.total_size_bytes()),
    )
}

fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::None => String::new(),
        Notice::Error(message) => {
            format!(r#"<p class="error">{}</p>"#, encode_text(message))
        }
        Notice::Converted(result) => {
            let balloons: String = (0..12)
                .map(|i| {
                    format!(
                        r#"<span style="left: {}%; animation-delay: {:.1}s">🎈</span>"#,
                        4 + i * 8,
                        (i % 4) as f32 * 0.3
                    )
                })
                .collect();

            format!(
                r#"<p class="success">{message}</p>
    <div class="balloons">{balloons}</div>
    <p><a class="download" download="{filename}" href="data:{content_type};base64,{data}">⬇️ Download PDF</a></p>"#,
                message = SUCCESS_MESSAGE,
                balloons = balloons,
                filename = encode_double_quoted_attribute(&result.filename),
                content_type = ConversionResult::CONTENT_TYPE,
                data = BASE64.encode(&result.bytes),
            )
        }
    }
}
