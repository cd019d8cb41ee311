//! In-process REST artifact server

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tiny_http::{Method, Request, Response, Server};

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    requests: Vec<String>,
}

/// A fake artifact server speaking PUT/GET/HEAD/DELETE
///
/// Objects live in memory keyed by request path. The server thread stops when
/// the value is dropped.
pub struct FakeRestServer {
    server: Arc<Server>,
    state: Arc<Mutex<State>>,
    url: String,
    handle: Option<JoinHandle<()>>,
}

impl FakeRestServer {
    pub fn start() -> Self {
        Self::spawn(None)
    }

    /// A server that answers every request with `status`
    pub fn failing(status: u16) -> Self {
        Self::spawn(Some(status))
    }

    fn spawn(fail_with: Option<u16>) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    handle(request, &state, fail_with);
                }
            })
        };

        Self {
            server,
            state,
            url: format!("http://{addr}"),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn insert(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), body.into());
    }

    /// Requests served so far, as `"METHOD /path"`
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Drop for FakeRestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle(mut request: Request, state: &Mutex<State>, fail_with: Option<u16>) {
    let path = request.url().to_string();
    let method = request.method().clone();
    state
        .lock()
        .unwrap()
        .requests
        .push(format!("{} {}", method, path));

    if let Some(status) = fail_with {
        let _ = request.respond(Response::empty(status));
        return;
    }

    let response = match method {
        Method::Put => {
            let mut body = Vec::new();
            if request.as_reader().read_to_end(&mut body).is_err() {
                Response::empty(400)
            } else {
                state.lock().unwrap().objects.insert(path, body);
                Response::empty(201)
            }
        }
        Method::Get => {
            let body = state.lock().unwrap().objects.get(&path).cloned();
            if let Some(body) = body {
                let _ = request.respond(Response::from_data(body));
                return;
            }
            Response::empty(404)
        }
        Method::Head => {
            if state.lock().unwrap().objects.contains_key(&path) {
                Response::empty(200)
            } else {
                Response::empty(404)
            }
        }
        Method::Delete => {
            if state.lock().unwrap().objects.remove(&path).is_some() {
                Response::empty(204)
            } else {
                Response::empty(404)
            }
        }
        _ => Response::empty(405),
    };
    let _ = request.respond(response);
}
