//! Client for the upload endpoint and the audio-processing service.

use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::http_client;

const MAX_UPLOAD_RESPONSE_BYTES: usize = 64 * 1024;
const MAX_ARTWORK_BYTES: usize = 8 * 1024 * 1024;

/// Errors raised by the service client.
///
/// Callers surface these as a generic failure notice; the distinction only
/// matters for logging. No retries happen at this layer — every failure is
/// terminal for the current run.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Failed to decode artwork: {0}")]
    Artwork(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponseWire {
    // The service returns the whole generation record; only the URL is used.
    #[serde(rename = "audioUrl")]
    audio_url: String,
}

/// Upload an audio file as multipart form data; returns the stored file's URL.
pub fn upload_audio(
    upload_url: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let boundary = multipart_boundary();
    let body = multipart_file_body(&boundary, file_name, bytes);
    let content_type = format!("multipart/form-data; boundary={boundary}");

    let response = match http_client::agent()
        .post(upload_url)
        .set("Content-Type", &content_type)
        .send_bytes(&body)
    {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let body = read_body_limited(response, MAX_UPLOAD_RESPONSE_BYTES)
                .unwrap_or_else(|err| err);
            return Err(ApiError::Status { code, body });
        }
        Err(ureq::Error::Transport(err)) => {
            return Err(ApiError::Transport(err.to_string()));
        }
    };

    let body = read_body_limited(response, MAX_UPLOAD_RESPONSE_BYTES)
        .map_err(ApiError::InvalidResponse)?;
    let parsed: UploadResponseWire = serde_json::from_str(body.trim())
        .map_err(|err| ApiError::InvalidResponse(format!("{err}: {}", body.trim())))?;
    Ok(parsed.audio_url)
}

/// Ask the processing service to analyze an uploaded file.
///
/// Returns the streaming response body; the caller owns draining it through
/// the line assembler. The body is not buffered here — events must reach the
/// UI as the service emits them.
pub fn process_audio(
    process_url: &str,
    audio_url: &str,
) -> Result<Box<dyn Read + Send + Sync + 'static>, ApiError> {
    let response = match http_client::agent()
        .post(process_url)
        .set("Accept", "application/x-ndjson")
        .send_json(serde_json::json!({ "audio_url": audio_url }))
    {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let body = read_body_limited(response, MAX_UPLOAD_RESPONSE_BYTES)
                .unwrap_or_else(|err| err);
            return Err(ApiError::Status { code, body });
        }
        Err(ureq::Error::Transport(err)) => {
            return Err(ApiError::Transport(err.to_string()));
        }
    };
    Ok(response.into_reader())
}

/// Fetch and decode a chunk's generated artwork into pixels for the UI.
pub fn fetch_artwork(image_url: &str) -> Result<egui::ColorImage, ApiError> {
    let response = match http_client::agent().get(image_url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let body = read_body_limited(response, MAX_UPLOAD_RESPONSE_BYTES)
                .unwrap_or_else(|err| err);
            return Err(ApiError::Status { code, body });
        }
        Err(ureq::Error::Transport(err)) => {
            return Err(ApiError::Transport(err.to_string()));
        }
    };
    let bytes = http_client::read_response_bytes(response, MAX_ARTWORK_BYTES)
        .map_err(|err| ApiError::Artwork(err.to_string()))?;
    decode_artwork(&bytes)
}

fn decode_artwork(bytes: &[u8]) -> Result<egui::ColorImage, ApiError> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| ApiError::Artwork(err.to_string()))?
        .to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        image.as_raw(),
    ))
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    format!("----moodwave-{nanos:x}")
}

fn multipart_file_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let content_type = guess_audio_content_type(file_name);
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            sanitize_file_name(file_name)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Best-effort content type from the file extension; the upload endpoint
/// only records it.
fn guess_audio_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Strip characters that would break the multipart header line.
fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|ch| match ch {
            '"' | '\r' | '\n' | '\\' => '_',
            other => other,
        })
        .collect()
}

fn read_body_limited(response: ureq::Response, max_bytes: usize) -> Result<String, String> {
    let bytes = http_client::read_response_bytes(response, max_bytes)
        .map_err(|err| err.to_string())?;
    String::from_utf8(bytes).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 64 * 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn upload_returns_audio_url_and_ignores_record_fields() {
        let body = r#"{"id":"abc","audioUrl":"http://cdn.example/a.mp3","fileName":"a.mp3"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response);
        let audio_url = upload_audio(&url, "a.mp3", b"RIFF").unwrap();
        assert_eq!(audio_url, "http://cdn.example/a.mp3");
    }

    #[test]
    fn upload_maps_non_success_status() {
        let response = "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n".to_string();
        let url = serve_once(response);
        let err = upload_audio(&url, "a.mp3", b"RIFF").unwrap_err();
        assert!(matches!(err, ApiError::Status { code: 401, .. }));
    }

    #[test]
    fn multipart_body_frames_the_file_part() {
        let body = multipart_file_body("----b", "song.mp3", b"DATA");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("------b\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"song.mp3\""));
        assert!(text.contains("Content-Type: audio/mpeg\r\n\r\nDATA"));
        assert!(text.ends_with("\r\n------b--\r\n"));
    }

    #[test]
    fn file_names_are_sanitized_for_the_header() {
        let body = multipart_file_body("----b", "we\"ird\r\n.wav", b"");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"we_ird__.wav\""));
    }

    #[test]
    fn content_type_guesses_cover_common_extensions() {
        assert_eq!(guess_audio_content_type("a.MP3"), "audio/mpeg");
        assert_eq!(guess_audio_content_type("a.flac"), "audio/flac");
        assert_eq!(guess_audio_content_type("a.m4a"), "audio/mp4");
        assert_eq!(guess_audio_content_type("noext"), "application/octet-stream");
    }

    #[test]
    fn artwork_decoding_rejects_garbage() {
        let err = decode_artwork(b"not an image").unwrap_err();
        assert!(matches!(err, ApiError::Artwork(_)));
    }
}
