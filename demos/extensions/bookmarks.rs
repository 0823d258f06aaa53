//! Serves a bookmark list as JSON on http://127.0.0.1:5005.
//!
//! Bookmarks are read from `bookmarks.json` in the working directory, an
//! array of `{"title": ..., "url": ...}` objects.

// Dependencies:
//   serde_json

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use hotbed_sdk::prelude::*;
use serde_json::{Value, json};

const ADDRESS: &str = "127.0.0.1:5005";
const BOOKMARKS_FILE: &str = "bookmarks.json";

#[derive(Default)]
pub struct Bookmarks {
    bookmarks: Vec<Value>,
    listener: Option<TcpListener>,
}

impl Bookmarks {
    fn load() -> Result<Vec<Value>, ExtensionError> {
        let text = match std::fs::read_to_string(BOOKMARKS_FILE) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(ExtensionError::msg(format!("{BOOKMARKS_FILE} must hold an array"))),
            Err(e) => Err(ExtensionError::msg(e.to_string())),
        }
    }

    fn respond(&self, stream: TcpStream) -> std::io::Result<()> {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        let query = request_line
            .split_whitespace()
            .nth(1)
            .and_then(|target| target.split_once("?q="))
            .map(|(_, q)| q.to_lowercase());

        let matches: Vec<&Value> = self
            .bookmarks
            .iter()
            .filter(|b| match &query {
                Some(q) => b["title"]
                    .as_str()
                    .is_some_and(|t| t.to_lowercase().contains(q)),
                None => true,
            })
            .collect();

        let body = json!({ "count": matches.len(), "bookmarks": matches });
        let body = body.to_string();
        let mut stream = stream;
        write!(
            stream,
            concat!(
                "HTTP/1.1 200 OK\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: {}\r\n",
                "Connection: close\r\n\r\n{}",
            ),
            body.len(),
            body
        )
    }
}

impl Extension for Bookmarks {
    fn name(&self) -> &str {
        "Bookmarks Viewer"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Serves bookmarks.json over HTTP on port 5005"
    }

    fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        self.bookmarks = Self::load()?;
        logger.info(&format!("Loaded {} bookmark(s)", self.bookmarks.len()));

        self.listener = Some(TcpListener::bind(ADDRESS)?);
        Ok(())
    }

    fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        let Some(listener) = self.listener.take() else {
            return Err(ExtensionError::msg("listener not bound"));
        };
        logger.info(&format!("Serving bookmarks on http://{ADDRESS}"));

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.respond(stream) {
                        logger.error_with("Request failed", &e);
                    }
                }
                Err(e) => logger.warn(&format!("Accept failed: {e}")),
            }
        }
        Ok(())
    }

    fn menu_items(&self) -> Vec<MenuItem> {
        vec![
            MenuItem::new("Show Bookmarks").with_action(|| {
                println!("Bookmarks: http://{ADDRESS}");
            }),
            MenuItem::separator(),
        ]
    }
}

hotbed_sdk::export_extensions!(Bookmarks);
