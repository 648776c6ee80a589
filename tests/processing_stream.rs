//! End-to-end run against a fake upload and analysis service.
//!
//! A loopback server plays both endpoints and streams newline-delimited
//! JSON with deliberate mid-line splits; the controller is driven the way
//! the frame loop drives it, by polling until the run settles.

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use moodwave::config::AppConfig;
use moodwave::egui_app::controller::EguiController;
use moodwave::egui_app::state::{RunPhase, SelectedFile, StatusTone};

struct FakeService {
    addr: std::net::SocketAddr,
    _handle: thread::JoinHandle<()>,
}

impl FakeService {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            for connection in listener.incoming() {
                let Ok(mut socket) = connection else { break };
                let request = read_request(&mut socket);
                if request.starts_with("POST /upload") {
                    respond_upload(&mut socket, addr);
                } else if request.starts_with("POST /process") {
                    respond_stream(&mut socket, addr);
                } else if request.starts_with("GET /art.png") {
                    respond_artwork(&mut socket);
                    break;
                } else {
                    let _ = socket.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
                }
            }
        });
        Self {
            addr,
            _handle: handle,
        }
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            upload_url: format!("http://{}/upload", self.addr),
            process_url: format!("http://{}/process", self.addr),
            volume: 1.0,
        }
    }
}

fn read_request(socket: &mut TcpStream) -> String {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let read = socket.read(&mut buf).expect("read request");
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..read]);
        if let Some(header_end) = find_header_end(&bytes) {
            let headers = String::from_utf8_lossy(&bytes[..header_end]).into_owned();
            let body_len = content_length(&headers);
            let have = bytes.len() - header_end;
            if have >= body_len {
                return headers;
            }
            let mut remaining = body_len - have;
            while remaining > 0 {
                let read = socket.read(&mut buf).expect("read body");
                if read == 0 {
                    break;
                }
                remaining = remaining.saturating_sub(read);
            }
            return headers;
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn find_header_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(headers: &str) -> usize {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}

fn respond_upload(socket: &mut TcpStream, addr: std::net::SocketAddr) {
    let body = format!(r#"{{"id":"gen-1","audioUrl":"http://{addr}/files/track.mp3"}}"#);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).expect("write upload response");
}

fn respond_stream(socket: &mut TcpStream, addr: std::net::SocketAddr) {
    socket
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n",
        )
        .expect("write stream headers");
    let lines = [
        r#"{"status":"starting","progress":0}"#.to_string(),
        r#"{"status":"loading_audio","progress":10}"#.to_string(),
        concat!(
            r##"{"status":"waveform_ready","progress":30,"waveform":["##,
            r##"{"time":0.0,"amplitude":0.2,"color":"#a882ff"},"##,
            r##"{"time":0.5,"amplitude":0.6,"color":"#b090ff"},"##,
            r##"{"time":1.0,"amplitude":0.4,"color":"#c0a0ff"}]}"##
        )
        .to_string(),
        concat!(
            r#"{"status":"processing_chunk","progress":60,"chunk_number":1,"total_chunks":2,"#,
            r#""data":{"energy":0.0421,"tempo":121.0,"key":"D minor","#,
            r#""emotion":{"sad":70.0,"calm":30.0,"reasoning":"slow and sparse"}}}"#
        )
        .to_string(),
        format!(
            concat!(
                r#"{{"status":"processing_chunk","progress":90,"chunk_number":2,"total_chunks":2,"#,
                r#""data":{{"energy":0.0833,"tempo":124.0,"key":"D minor","#,
                r#""emotion":{{"energetic":55.0,"happy":45.0,"reasoning":"building up"}},"#,
                r#""image_url":"http://{addr}/art.png"}}}}"#
            ),
            addr = addr
        ),
        r#"{"status":"complete","progress":100}"#.to_string(),
    ];
    for line in &lines {
        // Split each record mid-line so the client has to reassemble.
        let bytes = line.as_bytes();
        let split = bytes.len() / 2;
        socket.write_all(&bytes[..split]).expect("write line head");
        socket.flush().expect("flush");
        thread::sleep(Duration::from_millis(5));
        socket.write_all(&bytes[split..]).expect("write line tail");
        socket.write_all(b"\n").expect("write newline");
        socket.flush().expect("flush");
    }
}

fn respond_artwork(socket: &mut TcpStream) {
    let pixels = image::RgbaImage::from_pixel(2, 2, image::Rgba([180, 120, 255, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(pixels)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        png.len()
    );
    socket.write_all(header.as_bytes()).expect("write art headers");
    socket.write_all(&png).expect("write art body");
}

fn poll_until(controller: &mut EguiController, mut done: impl FnMut(&EguiController) -> bool) {
    for _ in 0..600 {
        controller.poll_jobs();
        if done(controller) {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("run did not settle in time");
}

#[test]
fn full_run_reaches_complete_with_final_segment() {
    let service = FakeService::start();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("track.mp3");
    std::fs::write(&path, b"not really mpeg audio").expect("write audio file");

    let mut controller = EguiController::new(service.config());
    controller.run.select_file(SelectedFile {
        path,
        name: "track.mp3".into(),
        size_bytes: 21,
    });
    controller.submit();

    poll_until(&mut controller, |c| c.run.phase == RunPhase::Complete);

    assert_eq!(controller.run.progress, 100.0);
    assert_eq!(controller.run.stage_label, "Complete!");
    assert_eq!(controller.status.tone, StatusTone::Success);

    let times: Vec<f32> = controller.run.frames.iter().map(|f| f.time).collect();
    assert_eq!(times, vec![0.0, 0.5, 1.0]);

    // Completion promotes the parked final segment even if its artwork is
    // still in flight.
    let chunk = controller
        .run
        .display_chunk
        .as_ref()
        .expect("final segment displayed");
    assert_eq!(chunk.chunk_number, 2);
    assert_eq!(chunk.total_chunks, 2);
    assert_eq!(chunk.data.key, "D minor");
    assert_eq!(chunk.data.emotion.energetic, 55.0);
    assert_eq!(chunk.data.emotion.reasoning, "building up");

    // The late artwork result still lands on the completed run.
    poll_until(&mut controller, |c| c.artwork().1.is_some());
    let (_, image) = controller.artwork();
    assert_eq!(image.expect("artwork pixels").size, [2, 2]);
}

#[test]
fn cancelled_run_returns_to_idle_without_an_error() {
    let service = FakeService::start();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("track.mp3");
    std::fs::write(&path, b"bytes").expect("write audio file");

    let mut controller = EguiController::new(service.config());
    controller.run.select_file(SelectedFile {
        path,
        name: "track.mp3".into(),
        size_bytes: 5,
    });
    controller.submit();
    controller.cancel_run();

    // Give the worker time to wind down, then confirm nothing leaked back.
    thread::sleep(Duration::from_millis(200));
    controller.poll_jobs();
    assert_eq!(controller.run.phase, RunPhase::Idle);
    assert!(controller.run.error.is_none());
    assert!(controller.status.message.is_empty());
    assert_eq!(
        controller.run.selected.as_ref().map(|f| f.name.as_str()),
        Some("track.mp3")
    );
}
