//! Pipeline statistics.

use std::time::Duration;

use contracts::SensorProfile;
use dispatcher::{DispatchReport, ProducerReport};
use phase_engine::SensorReadout;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub experiment: String,
    pub source: String,
    pub sensor: SensorProfile,
    pub producer: ProducerReport,
    pub dispatch: DispatchReport,
    pub duration: Duration,
}

impl PipelineStats {
    /// Samples delivered per second of wall time
    pub fn samples_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.dispatch.summary.samples as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of accepted events that produced a sample, in percent
    pub fn yield_rate(&self) -> f64 {
        if self.producer.events_accepted > 0 {
            self.producer.samples as f64 / self.producer.events_accepted as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let producer = &self.producer;
        let engine = &producer.engine;

        println!("\n=== Pipeline Statistics: {} ===\n", self.experiment);
        println!("Overview");
        println!("   ├─ Source: {}", self.source);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Exit: {:?}", producer.exit);
        println!("   └─ Samples/s: {:.2}", self.samples_per_sec());

        println!("\nProducer");
        println!("   ├─ Events read: {}", producer.events_read);
        println!(
            "   ├─ Events accepted: {} ({} foreign, {} malformed)",
            producer.events_accepted, engine.events_foreign, engine.events_malformed
        );
        println!(
            "   ├─ Samples: {} ({:.1}% of accepted)",
            producer.samples,
            self.yield_rate()
        );
        println!("   ├─ Windows skipped: {}", engine.windows_skipped);
        println!("   ├─ Alignment errors: {}", engine.alignment_errors);
        println!("   ├─ Batches sent: {}", producer.batches_sent);
        println!("   ├─ Backpressure waits: {}", producer.send_waits);
        println!("   └─ Discarded on cancel: {}", producer.partial_discarded);

        print!("\n{}", self.dispatch.summary);
        if let Some(latest) = self.dispatch.summary.latest {
            println!(
                "Latest readout ({:?}): {}",
                self.sensor,
                SensorReadout::new(self.sensor).apply(latest)
            );
        }
        if self.dispatch.sequence_gaps > 0 {
            println!("Sequence gaps: {}", self.dispatch.sequence_gaps);
        }

        if !self.dispatch.sinks.is_empty() {
            println!("\nSinks");
            let last = self.dispatch.sinks.len() - 1;
            for (i, (name, metrics)) in self.dispatch.sinks.iter().enumerate() {
                let prefix = if i == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} batches, {} samples, {} failures",
                    prefix, name, metrics.batch_count, metrics.sample_count, metrics.failure_count
                );
            }
        }

        println!();
    }
}
