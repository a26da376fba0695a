use tokio::task::JoinSet;
use tracing::error;

/// Task group for one page's downloads. Everything spawned here is awaited
/// by [`TaskManager::wait`] before the crawl moves to the next page.
pub struct TaskManager<R: Send + 'static> {
    tasks: JoinSet<R>,
}

impl<R: Send + 'static> Default for TaskManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> TaskManager<R> {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = R> + Send + 'static,
    {
        self.tasks.spawn(future);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Results in completion order. A task that panicked is logged and left out.
    pub async fn wait(&mut self) -> Vec<R> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(value) => results.push(value),
                Err(e) => error!("Download task failed to complete: {}", e),
            }
        }
        results
    }
}
