use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// 入力が `delay` の間止まってから値を確定させる
///
/// `push` のたびにタイマーを張り直す。確定するのは最後に `push` された値だけ。
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<T>,
    timer: Pin<Box<Sleep>>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            timer: Box::pin(tokio::time::sleep(delay)),
        }
    }

    pub fn push(&mut self, value: T) {
        self.pending = Some(value);
        self.timer.as_mut().reset(Instant::now() + self.delay);
    }

    /// 保留中の値を捨てる。以後 `settled` は次の `push` まで完了しない
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 値が確定するまで待つ
    ///
    /// 途中で drop しても保留中の値は失われない (`select!` で使える)。
    pub async fn settled(&mut self) -> T {
        loop {
            if self.pending.is_some() {
                self.timer.as_mut().await;
                if let Some(value) = self.pending.take() {
                    return value;
                }
            }
            std::future::pending::<()>().await;
        }
    }
}
