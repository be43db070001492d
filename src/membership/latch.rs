use tokio::sync::watch;

/// Countdown latch: `wait` resolves once `count_down` has been called
/// `count` times. Extra count-downs are ignored.
pub struct CountdownLatch {
    remaining: watch::Sender<usize>,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        let (remaining, _) = watch::channel(count);
        Self { remaining }
    }

    pub fn count_down(&self) {
        self.remaining.send_modify(|n| *n = n.saturating_sub(1));
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
