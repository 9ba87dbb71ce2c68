use fraggrow::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders core progress events on stderr: a spinner per phase, switching to
/// a bar over steps `0..=N` once the first growing iteration starts.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(target);
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };
            Self::apply(&mut pb_guard, progress);
        })
    }

    fn apply(pb: &mut ProgressBar, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                pb.reset();
                pb.set_length(0);
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                pb.set_message(name.to_string());
            }
            Progress::PhaseFinish => {
                pb.disable_steady_tick();
                pb.finish_with_message("✓ Done");
            }
            Progress::IterationStart { index, total } => {
                Self::ensure_bar(pb, total);
                pb.set_position(index as u64);
                pb.set_message(format!("Iteration {}/{}", index, total));
            }
            Progress::IterationSkipped { index } => {
                pb.set_position((index + 1) as u64);
                pb.println(format!("  Iteration {} already complete", index));
            }
            Progress::IterationFinish { index } => {
                pb.set_position((index + 1) as u64);
            }
            Progress::Message(msg) => {
                if !pb.is_finished() {
                    pb.println(format!("  {}", msg));
                } else {
                    pb.set_message(msg);
                }
            }
        }
    }

    /// Switches from the phase spinner to a bar covering steps `0..=total`.
    fn ensure_bar(pb: &mut ProgressBar, total: usize) {
        let length = (total + 1) as u64;
        if pb.length() != Some(length) {
            pb.disable_steady_tick();
            pb.set_length(length);
            pb.set_style(Self::bar_style());
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "elapsed",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.0}s", state.elapsed().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
