use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(model_path: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoolhubd");
    let mut child = Command::new(exe)
        .env("SCHOOLHUBD_MODEL_PATH", model_path)
        .env_remove("SCHOOLHUBD_PAGE_SIZE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoolhubd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn reports_build_list_get_delete_and_dashboard() {
    let workspace = temp_dir("schoolhub-reports");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace.join("no-model.json"));
    let (si, rd) = (&mut stdin, &mut reader);

    request_ok(si, rd, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let lina = request_ok(
        si,
        rd,
        "2",
        "students.create",
        json!({
            "fullName": "Lina Haddad",
            "email": "lina@example.org",
            "gender": "Female",
            "dateOfBirth": "2008-03-02",
            "attendancePercentage": 90,
            "guardianName": "Samir Haddad"
        }),
    );
    let lina_id = lina["student"]["id"].as_str().expect("id").to_string();
    let omar = request_ok(
        si,
        rd,
        "3",
        "students.create",
        json!({ "fullName": "Omar", "email": "omar@example.org", "isActive": false }),
    );
    let omar_id = omar["student"]["id"].as_str().expect("id").to_string();

    // students.create leaves one personal report each.
    let personal = request_ok(si, rd, "4", "reports.list", json!({ "category": "personal" }));
    assert_eq!(personal["reports"].as_array().map(|a| a.len()), Some(2));
    let auto = request_ok(
        si,
        rd,
        "5",
        "reports.list",
        json!({ "category": "personal", "studentId": lina_id }),
    );
    assert_eq!(auto["reports"][0]["reportType"], json!("Automatic"));
    assert_eq!(auto["reports"][0]["data"]["Date of Birth"], json!("2008-03-02"));
    assert_eq!(auto["reports"][0]["data"]["Gender"], json!("Female"));

    let health = request_ok(
        si,
        rd,
        "6",
        "reports.build",
        json!({ "studentId": lina_id, "category": "health" }),
    );
    assert_eq!(health["data"], json!({ "Health Information": "Not Available" }));
    let health_id = health["report"]["id"].as_str().expect("report id").to_string();

    let guardian = request_ok(
        si,
        rd,
        "7",
        "reports.build",
        json!({ "studentId": lina_id, "category": "Guardian", "persist": false }),
    );
    assert!(guardian["report"].is_null());
    assert_eq!(guardian["data"]["Guardian Name"], json!("Samir Haddad"));
    assert_eq!(guardian["data"]["Guardian Monthly Income"], json!("N/A"));

    let unknown = request_ok(
        si,
        rd,
        "8",
        "reports.build",
        json!({ "studentId": lina_id, "category": "unknown_category" }),
    );
    assert_eq!(unknown["data"], json!({}));
    assert!(unknown["report"].is_null());

    let generated = request_ok(si, rd, "9", "reports.generateAll", json!({ "category": "academic" }));
    assert_eq!(generated["generated"], json!(1));
    let academic = request_ok(si, rd, "10", "reports.list", json!({ "category": "academic" }));
    let rows = academic["reports"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentId"], json!(lina_id));
    assert_eq!(rows[0]["data"]["Attendance"], json!("90%"));
    assert_eq!(rows[0]["data"]["Academic Performance"], json!("Needs Improvement"));

    let bad = request(si, rd, "11", "reports.generateAll", json!({ "category": "finance" }));
    assert_eq!(error_code(&bad), "bad_params");

    let got = request_ok(si, rd, "12", "reports.get", json!({ "reportId": health_id }));
    assert_eq!(got["report"]["category"], json!("health"));
    assert_eq!(got["categoryDisplay"], json!("Health Information Report"));

    let dash = request_ok(si, rd, "13", "reports.dashboard", json!({}));
    assert_eq!(dash["totalReports"], json!(4));
    assert_eq!(dash["reportsByCategory"]["personal"], json!(2));
    assert_eq!(dash["reportsByCategory"]["academic"], json!(1));
    assert_eq!(dash["totalStudents"], json!(2));
    assert_eq!(dash["performanceDistribution"]["Needs Improvement"], json!(2));
    assert!(dash["evaluation"].is_null());

    request_ok(si, rd, "14", "reports.delete", json!({ "reportId": health_id }));
    let gone = request(si, rd, "15", "reports.get", json!({ "reportId": health_id }));
    assert_eq!(error_code(&gone), "not_found");

    let omar_reports = request_ok(si, rd, "16", "reports.list", json!({ "studentId": omar_id }));
    assert_eq!(omar_reports["reports"].as_array().map(|a| a.len()), Some(1));

    let _ = std::fs::remove_dir_all(workspace);
}
