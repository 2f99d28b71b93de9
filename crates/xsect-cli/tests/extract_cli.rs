use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

const HEADER_LINE: &str = "model,stage,x,y,utot,ux,uy,sigxxe,sigyye,eff_normal_stress,tot_normal_stress,tot_shear_stress";

fn run_cli(args: &[&str], configure: impl FnOnce(&mut Command)) -> Output {
    let binary_path = env!("CARGO_BIN_EXE_plaxis-xsect");
    let mut command = Command::new(binary_path);
    command
        .args(args)
        .env_remove("PLAXIS_XSECT_EXECUTABLE")
        .env("RUST_LOG", "warn");
    configure(&mut command);
    command.output().expect("binary should run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path should be UTF-8")
}

/// Starts stub scripting servers on a port and the one after it. Each
/// request is answered with `status_line` and a successful command reply.
fn answering_servers(status_line: &'static str) -> u16 {
    loop {
        let controller = TcpListener::bind("127.0.0.1:0").expect("ephemeral port should bind");
        let port = controller
            .local_addr()
            .expect("listener should have an address")
            .port();
        let Some(next_port) = port.checked_add(1) else {
            continue;
        };
        let Ok(reader) = TcpListener::bind(("127.0.0.1", next_port)) else {
            continue;
        };
        for listener in [controller, reader] {
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { continue };
                    answer_request(stream, status_line);
                }
            });
        }
        return port;
    }
}

fn answer_request(mut stream: TcpStream, status_line: &str) {
    let mut reader = BufReader::new(stream.try_clone().expect("stream should be cloneable"));
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    let _ = reader.read_exact(&mut body);

    let reply = r#"{"success": true, "returned": null}"#;
    let response = format!(
        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port should bind");
    let port = listener
        .local_addr()
        .expect("listener should have an address")
        .port();
    drop(listener);
    port
}

#[test]
fn missing_root_exits_with_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("absent");

    let output = run_cli(&[path_arg(&missing), "--no-launch"], |_| {});

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.ROOT_DIR]"), "stderr: {stderr}");
}

#[test]
fn unresolvable_executable_exits_before_writing_results() {
    let temp = TempDir::new().expect("tempdir should be created");
    fs::write(temp.path().join("wall.p2dx"), b"").expect("model should be written");
    let missing_exe = temp.path().join("Plaxis2DXInput.exe");

    let output = run_cli(&[path_arg(temp.path())], |command| {
        command.env("PLAXIS_XSECT_EXECUTABLE", &missing_exe);
    });

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.EXECUTABLE]"), "stderr: {stderr}");
    assert!(!temp.path().join("soil_cross_section_results.csv").exists());
}

#[test]
fn invalid_config_file_is_rejected() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("xsect.json");
    fs::write(&config_path, r#"{ "port": "ten thousand" }"#).expect("config should be written");

    let output = run_cli(
        &[
            path_arg(temp.path()),
            "--no-launch",
            "--config",
            path_arg(&config_path),
        ],
        |_| {},
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.CONFIG]"), "stderr: {stderr}");
}

#[test]
fn empty_root_in_attach_mode_writes_header_only() {
    let temp = TempDir::new().expect("tempdir should be created");
    let port = answering_servers("HTTP/1.1 200 OK").to_string();
    let report_path = temp.path().join("reports/run.json");

    let output = run_cli(
        &[
            path_arg(temp.path()),
            "--no-launch",
            "--host",
            "127.0.0.1",
            "--port",
            &port,
            "--report",
            path_arg(&report_path),
        ],
        |_| {},
    );

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Model files: 0 total"), "stdout: {stdout}");
    assert!(stdout.contains("Results saved to: "), "stdout: {stdout}");
    assert!(stdout.contains("soil_cross_section_results.csv"), "stdout: {stdout}");

    let content = fs::read_to_string(temp.path().join("soil_cross_section_results.csv"))
        .expect("results should be written");
    assert_eq!(content, format!("{HEADER_LINE}\n"));

    let report: Value = serde_json::from_str(
        &fs::read_to_string(&report_path).expect("report should be written"),
    )
    .expect("report should be JSON");
    assert_eq!(report["file_count"], 0);
    assert_eq!(report["walk_errors"], serde_json::json!([]));
}

#[test]
fn unreachable_server_stops_the_run_and_keeps_previous_results() {
    let temp = TempDir::new().expect("tempdir should be created");
    fs::write(temp.path().join("a.p2dx"), b"").expect("model should be written");
    fs::create_dir_all(temp.path().join("phase2")).expect("subdirectory should be created");
    fs::write(temp.path().join("phase2/b.p2dx"), b"").expect("model should be written");
    let results_path = temp.path().join("soil_cross_section_results.csv");
    let previous = format!("{HEADER_LINE}\n/m/a.p2dx,Phase_1,0,0,1,1,1,1,1,1,1,1\n");
    fs::write(&results_path, &previous).expect("previous results should be written");
    let report_path = temp.path().join("reports/run.json");
    let port = closed_port().to_string();

    let output = run_cli(
        &[
            path_arg(temp.path()),
            "--no-launch",
            "--host",
            "127.0.0.1",
            "--port",
            &port,
            "--report",
            path_arg(&report_path),
        ],
        |_| {},
    );

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [IO.SESSION]"), "stderr: {stderr}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Processing file: "), "stdout: {stdout}");
    assert!(!stdout.contains("Results saved to: "), "stdout: {stdout}");

    let content = fs::read_to_string(&results_path).expect("previous results should remain");
    assert_eq!(content, previous);
    assert!(!report_path.exists());
}

#[test]
fn rejected_password_exits_with_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    fs::write(temp.path().join("a.p2dx"), b"").expect("model should be written");
    let port = answering_servers("HTTP/1.1 401 Unauthorized").to_string();

    let output = run_cli(
        &[
            path_arg(temp.path()),
            "--no-launch",
            "--host",
            "127.0.0.1",
            "--port",
            &port,
            "--password",
            "wrong",
        ],
        |_| {},
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [INPUT.SESSION_PASSWORD]"), "stderr: {stderr}");
    assert!(!temp.path().join("soil_cross_section_results.csv").exists());
}

#[test]
fn help_exits_successfully() {
    let output = run_cli(&["--help"], |_| {});

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--no-launch"));
    assert!(stdout.contains("<ROOT>"));
}
