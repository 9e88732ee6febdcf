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

fn label(result: &serde_json::Value) -> String {
    result["performance"]["label"]
        .as_str()
        .expect("performance label")
        .to_string()
}

fn index(result: &serde_json::Value) -> f64 {
    result["performance"]["index"].as_f64().expect("performance index")
}

#[test]
fn student_label_follows_every_write() {
    let workspace = temp_dir("schoolhub-students-scoring");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace.join("no-model.json"));
    let (si, rd) = (&mut stdin, &mut reader);

    request_ok(si, rd, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let math = request_ok(si, rd, "2", "subjects.create", json!({ "name": "Math", "creditHours": 2 }));
    let math_id = math["subject"]["id"].as_str().expect("subject id").to_string();

    let created = request_ok(
        si,
        rd,
        "3",
        "students.create",
        json!({
            "fullName": "Student A",
            "email": "a@example.org",
            "attendancePercentage": 90
        }),
    );
    let student_id = created["student"]["id"].as_str().expect("student id").to_string();
    assert_eq!(label(&created), "Needs Improvement");
    assert!((index(&created) - 0.26).abs() < 1e-9);
    assert_eq!(created["student"]["guardianName"], json!("Unknown Guardian"));
    assert!(created["reportId"].as_str().is_some());

    let graded = request_ok(
        si,
        rd,
        "4",
        "grades.record",
        json!({ "studentId": student_id, "subjectId": math_id, "score": 85 }),
    );
    assert_eq!(graded["grade"]["letter"], json!("B"));
    assert_eq!(graded["grade"]["gpaPoints"], json!(3.0));
    assert_eq!(graded["grade"]["examType"], json!("Final"));
    assert_eq!(graded["grade"]["semester"], json!("Fall"));
    assert_eq!(label(&graded), "Average");

    let health = request_ok(
        si,
        rd,
        "5",
        "profiles.health.set",
        json!({ "studentId": student_id, "profile": { "motivation": "High" } }),
    );
    assert_eq!(health["profile"]["academicStress"], json!("Moderate"));
    assert!((index(&health) - 0.6825).abs() < 1e-9);
    assert_eq!(label(&health), "Good");

    let fetched = request_ok(si, rd, "6", "students.get", json!({ "studentId": student_id }));
    assert_eq!(fetched["student"]["academicPerformance"], json!("Good"));
    assert_eq!(fetched["subjects"], json!(["Math"]));
    assert!(fetched["economic"].is_null());

    let updated = request_ok(
        si,
        rd,
        "7",
        "students.update",
        json!({ "studentId": student_id, "patch": { "attendancePercentage": 100 } }),
    );
    assert_eq!(label(&updated), "Very Good");
    assert_eq!(updated["student"]["academicPerformance"], json!("Very Good"));

    let retake = request_ok(
        si,
        rd,
        "8",
        "grades.record",
        json!({
            "studentId": student_id,
            "subjectId": math_id,
            "score": 95,
            "isRetake": true
        }),
    );
    assert_eq!(retake["grade"]["improvedScore"], json!(10.0));
    assert_eq!(retake["trend"]["gradeCount"], json!(2));
    assert_eq!(retake["trend"]["averagePercentage"], json!(90.0));
    assert!((index(&retake) - 0.72).abs() < 1e-9);

    let trends = request_ok(si, rd, "9", "trends.list", json!({ "studentId": student_id }));
    assert_eq!(trends["trends"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(trends["trends"][0]["gpa"], json!(3.5));

    let features = request_ok(si, rd, "10", "performance.features", json!({ "studentId": student_id }));
    assert_eq!(features["vector"].as_array().map(|a| a.len()), Some(26));
    assert_eq!(features["named"]["average_score"], json!(90.0));
    assert_eq!(features["named"]["motivation_high"], json!(1.0));

    let score = request_ok(si, rd, "11", "performance.score", json!({ "studentId": student_id }));
    assert_eq!(score["stored"], json!("Very Good"));
    assert_eq!(score["score"]["label"], json!("Very Good"));

    let cleared = request_ok(
        si,
        rd,
        "12",
        "profiles.clear",
        json!({ "studentId": student_id, "kind": "health" }),
    );
    assert_eq!(cleared["cleared"], json!(true));
    assert_eq!(label(&cleared), "Average");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn validation_and_not_found_errors() {
    let workspace = temp_dir("schoolhub-students-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace.join("no-model.json"));
    let (si, rd) = (&mut stdin, &mut reader);

    let no_ws = request(si, rd, "1", "students.list", json!({}));
    assert_eq!(error_code(&no_ws), "no_workspace");

    request_ok(si, rd, "2", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(
        si,
        rd,
        "3",
        "students.create",
        json!({ "fullName": "Mona", "email": "mona@example.org" }),
    );

    let dup = request(
        si,
        rd,
        "4",
        "students.create",
        json!({ "fullName": "Mona Two", "email": "MONA@example.org" }),
    );
    assert_eq!(error_code(&dup), "bad_params");

    let missing = request(si, rd, "5", "students.create", json!({ "email": "x@example.org" }));
    assert_eq!(error_code(&missing), "bad_params");

    let bad_att = request(
        si,
        rd,
        "6",
        "students.create",
        json!({ "fullName": "Sami", "email": "sami@example.org", "attendancePercentage": 150 }),
    );
    assert_eq!(error_code(&bad_att), "bad_params");

    let ghost = request(si, rd, "7", "students.get", json!({ "studentId": "nope" }));
    assert_eq!(error_code(&ghost), "not_found");

    let bad_choice = request(
        si,
        rd,
        "8",
        "profiles.health.set",
        json!({ "studentId": "nope", "profile": { "motivation": "Extreme" } }),
    );
    assert_eq!(error_code(&bad_choice), "bad_params");

    let bad_kind = request(
        si,
        rd,
        "9",
        "profiles.clear",
        json!({ "studentId": "nope", "kind": "finance" }),
    );
    assert_eq!(error_code(&bad_kind), "bad_params");

    let subj = request_ok(si, rd, "10", "subjects.create", json!({ "name": "Science" }));
    assert_eq!(subj["subject"]["creditHours"], json!(1));
    let dup_subj = request(si, rd, "11", "subjects.create", json!({ "name": "science" }));
    assert_eq!(error_code(&dup_subj), "bad_params");

    let bad_grade = request(
        si,
        rd,
        "12",
        "grades.record",
        json!({ "studentId": "nope", "subjectId": "nope", "score": 50, "semester": "Winter" }),
    );
    assert_eq!(error_code(&bad_grade), "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn list_pages_follow_workspace_setting_and_delete_cascades() {
    let workspace = temp_dir("schoolhub-students-paging");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&workspace.join("no-model.json"));
    let (si, rd) = (&mut stdin, &mut reader);

    request_ok(si, rd, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let mut ids = Vec::new();
    for (i, name) in ["Dana", "Adam", "Carla", "Bilal", "Eman"].iter().enumerate() {
        let r = request_ok(
            si,
            rd,
            &format!("c{i}"),
            "students.create",
            json!({ "fullName": name, "email": format!("{}@example.org", name.to_lowercase()) }),
        );
        ids.push(r["student"]["id"].as_str().expect("id").to_string());
    }

    let bad_setting = request(
        si,
        rd,
        "2",
        "settings.set",
        json!({ "key": "predictor.pageSize", "value": 0 }),
    );
    assert_eq!(error_code(&bad_setting), "bad_params");
    request_ok(si, rd, "3", "settings.set", json!({ "key": "predictor.pageSize", "value": 2 }));
    let got = request_ok(si, rd, "4", "settings.get", json!({ "key": "predictor.pageSize" }));
    assert_eq!(got["value"], json!(2));

    let first = request_ok(si, rd, "5", "students.list", json!({}));
    assert_eq!(first["page"]["numPages"], json!(3));
    assert_eq!(first["students"][0]["fullName"], json!("Adam"));
    assert_eq!(first["students"][1]["fullName"], json!("Bilal"));

    let past_end = request_ok(si, rd, "6", "students.list", json!({ "page": 99 }));
    assert_eq!(past_end["page"]["number"], json!(3));
    assert_eq!(past_end["students"][0]["fullName"], json!("Eman"));

    let junk = request_ok(si, rd, "7", "students.list", json!({ "page": "abc" }));
    assert_eq!(junk["page"]["number"], json!(1));

    request_ok(si, rd, "8", "students.delete", json!({ "studentId": ids[0] }));
    let reports = request_ok(si, rd, "9", "reports.list", json!({ "studentId": ids[0] }));
    assert_eq!(reports["reports"], json!([]));
    let again = request(si, rd, "10", "students.delete", json!({ "studentId": ids[0] }));
    assert_eq!(error_code(&again), "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}
