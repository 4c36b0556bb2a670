//! Re-emits a finished answer word by word, with a short pause between
//! words, so callers see it arrive as if it were being generated.
//!
//! Framing splits on the space character only. Every frame is the token
//! plus one trailing space, so the concatenated body minus its final space
//! is exactly the original text. An empty answer produces no frames.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rand::Rng;
use tokio_stream::{Stream, StreamExt};

/// Supplies the pause taken before each frame after the first.
pub trait Pacer: Send + Sync {
  fn delay(&self) -> Duration;
}

/// Uniformly random whole-millisecond delay in `min_ms..=max_ms`.
#[derive(Clone, Copy, Debug)]
pub struct JitterPacer {
  min_ms: u64,
  max_ms: u64,
}

impl JitterPacer {
  pub fn new(min_ms: u64, max_ms: u64) -> Self {
    Self {
      min_ms: min_ms.min(max_ms),
      max_ms: max_ms.max(min_ms),
    }
  }
}

impl Pacer for JitterPacer {
  fn delay(&self) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
  }
}

#[cfg(test)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedPacer(pub Duration);

#[cfg(test)]
impl Pacer for FixedPacer {
  fn delay(&self) -> Duration {
    self.0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EmitState {
  Idle,
  Emitting,
  Closed,
}

// Lives inside the generator; dropped early when the caller goes away.
struct Progress {
  state: EmitState,
  sent: usize,
  total: usize,
}

impl Progress {
  fn new() -> Self {
    Self {
      state: EmitState::Idle,
      sent: 0,
      total: 0,
    }
  }

  fn begin(&mut self, total: usize) {
    self.total = total;
    self.state = if total == 0 { EmitState::Closed } else { EmitState::Emitting };
  }

  fn sent_one(&mut self) {
    self.sent += 1;
    if self.sent == self.total {
      self.state = EmitState::Closed;
    }
  }
}

impl Drop for Progress {
  fn drop(&mut self) {
    if self.state != EmitState::Closed {
      tracing::debug!(sent = self.sent, total = self.total, "caller disconnected mid-stream");
    }
  }
}

/// Splits an answer into frames: each space-separated token plus one space.
pub fn frames(text: &str) -> Vec<String> {
  if text.is_empty() {
    return Vec::new();
  }
  text.split(' ').map(|token| format!("{token} ")).collect()
}

/// Lazily yields one chunk per frame, in order, pausing before every frame
/// but the first. Dropping the stream stops emission at once.
pub fn emit(text: String, pacer: Arc<dyn Pacer>) -> impl Stream<Item = Bytes> + Send + 'static {
  stream! {
    let mut progress = Progress::new();
    let queue = frames(&text);
    progress.begin(queue.len());

    for (idx, frame) in queue.into_iter().enumerate() {
      if idx > 0 {
        let pause = pacer.delay();
        if !pause.is_zero() {
          tokio::time::sleep(pause).await;
        }
      }
      // Counted before the hand-off: the generator is not resumed after its last yield.
      progress.sent_one();
      yield Bytes::from(frame);
    }
  }
}

/// Wraps [`emit`] as a streamed `text/plain` response.
pub fn text_stream_response(text: String, pacer: Arc<dyn Pacer>) -> Response {
  let body = Body::from_stream(emit(text, pacer).map(Ok::<_, Infallible>));
  (
    StatusCode::OK,
    [
      (CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
      (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
    ],
    body,
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use tokio::time::Instant;

  fn no_delay() -> Arc<dyn Pacer> {
    Arc::new(FixedPacer(Duration::ZERO))
  }

  async fn collect(text: &str, pacer: Arc<dyn Pacer>) -> Vec<String> {
    emit(text.to_string(), pacer)
      .map(|b| String::from_utf8(b.to_vec()).unwrap())
      .collect()
      .await
  }

  #[tokio::test]
  async fn one_chunk_per_token_in_order() {
    let chunks = collect("This is an example response from the Claude model.", no_delay()).await;
    assert_eq!(
      chunks,
      vec!["This ", "is ", "an ", "example ", "response ", "from ", "the ", "Claude ", "model. "]
    );
  }

  #[tokio::test]
  async fn empty_text_closes_without_chunks() {
    assert!(collect("", no_delay()).await.is_empty());
  }

  #[tokio::test]
  async fn text_without_spaces_is_one_chunk() {
    assert_eq!(collect("🤔\nHmm...", no_delay()).await, vec!["🤔\nHmm... "]);
  }

  #[tokio::test]
  async fn concatenation_minus_final_space_restores_the_text() {
    for text in ["a", "a b", "  leading", "trailing  ", "multi\nline text\twith tabs", "x  y"] {
      let body: String = collect(text, no_delay()).await.concat();
      assert_eq!(body.strip_suffix(' ').unwrap(), text);
    }
  }

  #[tokio::test]
  async fn repeated_spaces_keep_empty_tokens() {
    assert_eq!(collect("a  b", no_delay()).await, vec!["a ", " ", "b "]);
  }

  #[test]
  fn jitter_stays_within_inclusive_bounds() {
    let pacer = JitterPacer::new(10, 29);
    let mut seen_min = false;
    let mut seen_max = false;
    for _ in 0..10_000 {
      let ms = pacer.delay().as_millis();
      assert!((10..=29).contains(&ms), "{ms}");
      seen_min |= ms == 10;
      seen_max |= ms == 29;
    }
    assert!(seen_min && seen_max);
  }

  #[test]
  fn jitter_with_inverted_bounds_is_normalised() {
    let pacer = JitterPacer::new(30, 5);
    let ms = pacer.delay().as_millis();
    assert!((5..=30).contains(&ms));
  }

  struct RecordingPacer {
    next: Mutex<Vec<Duration>>,
  }

  impl Pacer for RecordingPacer {
    fn delay(&self) -> Duration {
      self.next.lock().unwrap().remove(0)
    }
  }

  #[tokio::test(start_paused = true)]
  async fn each_gap_matches_the_pacer_and_none_precedes_the_first_chunk() {
    let delays = vec![Duration::from_millis(12), Duration::from_millis(27)];
    let pacer = Arc::new(RecordingPacer {
      next: Mutex::new(delays.clone()),
    });
    let start = Instant::now();
    let mut stream = Box::pin(emit("one two three".to_string(), pacer));

    let mut stamps = Vec::new();
    while stream.next().await.is_some() {
      stamps.push(Instant::now() - start);
    }
    assert_eq!(
      stamps,
      vec![Duration::ZERO, delays[0], delays[0] + delays[1]]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_streams_do_not_wait_on_each_other() {
    let pacer: Arc<dyn Pacer> = Arc::new(FixedPacer(Duration::from_millis(20)));
    let start = Instant::now();
    let (a, b) = tokio::join!(
      collect("a b c d e", pacer.clone()),
      collect("v w x y z", pacer.clone())
    );
    assert_eq!(a.len(), 5);
    assert_eq!(b.len(), 5);
    let elapsed = Instant::now() - start;
    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_millis(160), "{elapsed:?}");
  }

  struct CountingPacer(AtomicUsize);

  impl Pacer for CountingPacer {
    fn delay(&self) -> Duration {
      self.0.fetch_add(1, Ordering::SeqCst);
      Duration::from_millis(10)
    }
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_stream_stops_emission() {
    let pacer = Arc::new(CountingPacer(AtomicUsize::new(0)));
    let mut stream = Box::pin(emit("one two three four five".to_string(), pacer.clone()));
    assert_eq!(stream.next().await.as_deref(), Some(&b"one "[..]));
    assert_eq!(stream.next().await.as_deref(), Some(&b"two "[..]));
    drop(stream);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pacer.0.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn progress_closes_as_the_last_frame_is_handed_over() {
    let mut progress = Progress::new();
    progress.begin(2);
    progress.sent_one();
    assert_eq!(progress.state, EmitState::Emitting);
    progress.sent_one();
    assert_eq!(progress.state, EmitState::Closed);
  }

  #[test]
  fn empty_answer_starts_closed() {
    let mut progress = Progress::new();
    assert_eq!(progress.state, EmitState::Idle);
    progress.begin(0);
    assert_eq!(progress.state, EmitState::Closed);
  }

  #[tokio::test]
  async fn response_is_streamed_plain_text() {
    let resp = text_stream_response("Isso é um fato.".to_string(), no_delay());
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], "Isso é um fato. ".as_bytes());
  }
}
