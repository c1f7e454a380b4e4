//! Session statistics and summary output.

use std::fmt;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use sync_engine::SessionReport;

/// Why the session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Quit,
    Signal,
    Timeout,
    MaxFrames,
    EngineClosed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quit => "operator quit",
            Self::Signal => "shutdown signal",
            Self::Timeout => "timeout",
            Self::MaxFrames => "frame limit reached",
            Self::EngineClosed => "engine closed",
        })
    }
}

/// Statistics from a session run
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Display frames forwarded to the dispatcher
    pub frames: u64,
    pub duration: Duration,
    pub end_reason: EndReason,
    pub report: SessionReport,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl SessionStats {
    /// Frames per minute
    pub fn frame_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 * 60.0 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Session Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let report = &self.report;
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ended by: {}", self.end_reason);
        println!("   ├─ Frames: {} ({:.1}/min)", self.frames, self.frame_rate());
        println!("   ├─ Final state: {:?}", report.final_state);
        println!("   ├─ Window: {} samples", report.window_len);
        match &report.last_error {
            Some(err) => println!("   └─ Last error: {}", err),
            None => println!("   └─ Last error: none"),
        }

        let engine = &report.engine;
        println!("\n📈 Sync Engine");
        println!(
            "   ├─ Polls: {} ok, {} failed",
            engine.polls_ok, engine.polls_failed
        );
        println!(
            "   ├─ Merges: {} replaced, {} appended, {} unchanged",
            engine.merges_replaced, engine.merges_appended, engine.merges_unchanged
        );
        println!("   ├─ Reconciliations: {}", engine.reconciliations);
        println!("   └─ Poll latency (ms): {}", report.metrics.poll_latency_ms);

        if !engine.discarded.is_empty() {
            println!("\n🗑  Discarded Results");
            for (reason, count) in &engine.discarded {
                println!("   ├─ {}: {}", reason, count);
            }
        }

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (name, m) in &self.sinks {
                println!(
                    "   ├─ {}: {} rendered, {} failed, {} skipped",
                    name, m.render_count, m.failure_count, m.coalesced_count
                );
            }
        }

        println!();
    }
}
