use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Answers the Meilisearch document and task endpoints. Every task succeeds
/// on the first poll unless `fail_tasks` is set.
pub struct SearchStub {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SearchStub {
    pub fn spawn(fail_tasks: bool) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start search stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let next_task = AtomicU64::new(1);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url).to_string();
                let method = request.method().to_string();
                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.to_string());

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

                recorded.lock().expect("lock requests").push(Recorded {
                    method: method.clone(),
                    path: path.clone(),
                    authorization,
                    body,
                });

                let (status, response_body) = if method == "POST" && path.starts_with("/indexes/") {
                    let uid = next_task.fetch_add(1, Ordering::SeqCst);
                    (202, serde_json::json!({ "taskUid": uid, "status": "enqueued" }))
                } else if method == "GET" && path.starts_with("/tasks/") {
                    if fail_tasks {
                        (
                            200,
                            serde_json::json!({
                                "status": "failed",
                                "error": { "message": "document id is invalid" }
                            }),
                        )
                    } else {
                        (200, serde_json::json!({ "status": "succeeded" }))
                    }
                } else {
                    (404, serde_json::json!({ "message": format!("no route for {path}") }))
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn take_requests(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.requests.lock().expect("lock requests"))
    }
}

impl Drop for SearchStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
