//! Fixtures shared by the unit tests: in-memory PNG tiles and a scripted
//! transport.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::decode::Encoding;
use crate::transport::{TileTransport, TransportError, TransportResponse};

/// Encode a `size × size` PNG whose pixel (col, row) decodes to
/// `elevation(col, row)` under `encoding`.
pub(crate) fn encode_png(size: u32, encoding: Encoding, elevation: impl Fn(u32, u32) -> f32) -> Vec<u8> {
    let img = RgbaImage::from_fn(size, size, |x, y| Rgba(encoding.encode(elevation(x, y))));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A PNG tile with the same elevation everywhere.
pub(crate) fn flat_png(size: u32, elevation: f32) -> Vec<u8> {
    encode_png(size, Encoding::TerrainRgb, |_, _| elevation)
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(TransportResponse),
    Fail(TransportError),
}

/// Transport that answers from a script and records every request.
///
/// URLs without a script entry answer with a plain `Not Found` body, which is
/// not an empty-tile placeholder.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    script: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_tile(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.script
            .insert(url.to_string(), Scripted::Respond(TransportResponse::Found(bytes)));
        self
    }

    pub(crate) fn with_not_found(mut self, url: &str, body: &[u8]) -> Self {
        self.script.insert(
            url.to_string(),
            Scripted::Respond(TransportResponse::NotFound(body.to_vec())),
        );
        self
    }

    pub(crate) fn with_error(mut self, url: &str, error: TransportError) -> Self {
        self.script.insert(url.to_string(), Scripted::Fail(error));
        self
    }

    /// Delay the answer for `url`, to force a completion order.
    pub(crate) fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TileTransport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        match self.script.get(url) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail(error)) => Err(error.clone()),
            None => Ok(TransportResponse::NotFound(b"Not Found".to_vec())),
        }
    }
}
