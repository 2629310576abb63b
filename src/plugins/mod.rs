pub mod server;

use tokio::{
  task::{AbortHandle, JoinSet},
  time::Instant,
};

use crate::{prelude::*, state::AppState};

const BACKOFF_MIN: Duration = Duration::from_secs(5);
const BACKOFF_MAX: Duration = Duration::from_secs(60);
/// A run lasting this long counts as healthy and resets the backoff.
const HEALTHY_RUN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

/// Running plugins. Dropping it or calling [`Supervisor::shutdown`] stops them.
pub struct Supervisor {
  tasks: JoinSet<()>,
}

impl Supervisor {
  pub async fn shutdown(mut self) {
    self.tasks.shutdown().await;
    info!("SYSTEM: All services stopped");
  }
}

/// Stops the plugin task together with its supervisor.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
  fn drop(&mut self) {
    self.0.abort();
  }
}

fn next_backoff(current: Duration, ran_for: Duration) -> Duration {
  if ran_for >= HEALTHY_RUN { BACKOFF_MIN } else { (current * 2).min(BACKOFF_MAX) }
}

async fn supervise(plugin: Arc<dyn Plugin>, app: Arc<AppState>) {
  let name = plugin.name();
  let mut backoff = BACKOFF_MIN;
  info!("SYSTEM: Service `{}` initialized", name);

  loop {
    let started = Instant::now();
    let handle = tokio::spawn({
      let (plugin, app) = (plugin.clone(), app.clone());
      async move { plugin.start(app).await }
    });
    let _guard = AbortOnDrop(handle.abort_handle());

    match handle.await {
      Ok(Ok(())) => warn!("Service `{name}` stopped unexpectedly (Ok)."),
      Ok(Err(err)) => error!("Service `{name}` crashed with error: {err:#}."),
      Err(err) if err.is_cancelled() => {
        info!("Service `{}` shutdown.", name);
        break;
      }
      Err(_) => error!("Service `{}` PANICKED!", name),
    }

    backoff = next_backoff(backoff, started.elapsed());
    time::sleep(backoff).await;
    info!("SYSTEM: Restarting service `{}` after {:?}...", name, backoff);
  }
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub fn run(self, app: Arc<AppState>) -> Supervisor {
    let mut tasks = JoinSet::new();
    for plugin in self.plugins {
      tasks.spawn(supervise(plugin, app.clone()));
    }
    Supervisor { tasks }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backoff_grows_and_resets() {
    let quick = Duration::from_secs(1);

    let mut backoff = BACKOFF_MIN;
    for _ in 0..10 {
      backoff = next_backoff(backoff, quick);
    }
    assert_eq!(backoff, BACKOFF_MAX);

    assert_eq!(next_backoff(BACKOFF_MIN, quick), BACKOFF_MIN * 2);
    assert_eq!(next_backoff(backoff, HEALTHY_RUN), BACKOFF_MIN);
  }
}
