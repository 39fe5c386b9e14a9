//! The two actors of a transfer.
//!
//! The sender waits, prepares its buffer, then posts one asynchronous send per flow and waits
//! for all of them. The receiver posts one asynchronous receive per flow, waits for all of
//! them, and processes each buffer in the order it arrived. They only meet on the channel.

use crate::job::{Flow, JobDescriptor};
use crate::sim::{ActivitySet, Channel, Context, Payload};
use crate::units::{Bytes, Flops, Nanosecs};

/// Default idle time before the sender starts.
pub const DEFAULT_INITIAL_DELAY: Nanosecs = Nanosecs::from_secs(10);

fn work(size: Bytes, flops_per_byte: f64) -> Flops {
    Flops::new(size.into_f64() * flops_per_byte)
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Sender {
    job: JobDescriptor,
    channel: Channel,
    #[builder(default = DEFAULT_INITIAL_DELAY)]
    initial_delay: Nanosecs,
    /// Computation charged per byte for buffer preparation and copies.
    #[builder(default = 1.0)]
    flops_per_byte: f64,
}

impl Sender {
    /// Runs the sender to completion and returns the flows it dispatched.
    pub async fn run(self, ctx: Context) -> Vec<Flow> {
        log::info!(
            "Sending {} bytes in {} flows",
            self.job.total_bytes().into_u64(),
            self.job.flow_count()
        );
        ctx.sleep(self.initial_delay).await;

        ctx.execute(work(self.job.total_bytes(), self.flops_per_byte))
            .await;
        log::info!("Buffer preparation completed");

        let flows = self.job.flows();
        let mut comms = ActivitySet::new();
        for flow in &flows {
            ctx.execute(work(flow.size, self.flops_per_byte)).await;
            log::info!("Flow {} sending {} bytes", flow.index, flow.size.into_u64());
            comms.push(
                self.channel
                    .put_async(&ctx, Payload::new(flow.index, flow.size)),
            );
        }

        comms.wait_all().await;
        log::info!("Sender finished sending all flows");
        flows
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Receiver {
    flow_count: usize,
    channel: Channel,
    /// Computation charged per received byte.
    #[builder(default = 1.0)]
    flops_per_byte: f64,
}

impl Receiver {
    /// Runs the receiver to completion and returns the received sizes in arrival order.
    pub async fn run(self, ctx: Context) -> Vec<Bytes> {
        log::info!("Receiving {} flows", self.flow_count);
        let mut comms = ActivitySet::new();
        for _ in 0..self.flow_count {
            comms.push(self.channel.get_async(&ctx));
        }

        // Buffers are consumed here and released as soon as they are processed
        let buffers = comms.wait_all().await;
        let mut sizes = Vec::with_capacity(buffers.len());
        for (i, buffer) in buffers.into_iter().enumerate() {
            let size = buffer.size();
            ctx.execute(work(size, self.flops_per_byte)).await;
            log::info!(
                "Flow {i} received {} bytes (sent as flow {})",
                size.into_u64(),
                buffer.flow()
            );
            sizes.push(size);
        }

        log::info!("Receiver finished receiving all flows");
        sizes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::{Engine, SimError, Unmatched};
    use crate::testing;
    use crate::units::Joules;

    fn spawn_pair(
        engine: &mut Engine,
        sent: usize,
        received: usize,
        total: u64,
    ) -> anyhow::Result<()> {
        let a = engine.platform().host_id("nodeA").unwrap();
        let b = engine.platform().host_id("nodeB").unwrap();
        let channel = engine.channel("message");
        let sender = Sender::builder()
            .job(JobDescriptor::new("job", sent, Bytes::new(total))?)
            .channel(channel.clone())
            .initial_delay(Nanosecs::ZERO)
            .flops_per_byte(0.0)
            .build();
        let receiver = Receiver::builder()
            .flow_count(received)
            .channel(channel)
            .flops_per_byte(0.0)
            .build();
        engine.spawn("sender", a, |ctx| sender.run(ctx));
        engine.spawn("receiver", b, |ctx| receiver.run(ctx));
        Ok(())
    }

    #[test]
    fn four_flows_arrive_whole() -> anyhow::Result<()> {
        let mut engine = Engine::new(Arc::new(testing::point_to_point_platform()));
        let a = engine.platform().host_id("nodeA").unwrap();
        let b = engine.platform().host_id("nodeB").unwrap();
        let channel = engine.channel("message");
        let sender = Sender::builder()
            .job(JobDescriptor::new("job", 4, Bytes::new(1000))?)
            .channel(channel.clone())
            .build();
        let receiver = Receiver::builder().flow_count(4).channel(channel).build();
        let sent = engine.spawn("sender", a, |ctx| sender.run(ctx));
        let received = engine.spawn("receiver", b, |ctx| receiver.run(ctx));
        engine.run()?;
        let sent = sent.join().unwrap();
        assert_eq!(
            sent.iter().map(|f| f.size.into_u64()).collect::<Vec<_>>(),
            [250, 250, 250, 250]
        );
        let received = received.join().unwrap();
        assert_eq!(received, [Bytes::new(250); 4]);
        Ok(())
    }

    #[test]
    fn transfer_energy_matches_power_model() -> anyhow::Result<()> {
        // 1 MB over an 8 Mbps link: one second at full utilization
        let mut engine = Engine::new(Arc::new(testing::point_to_point_platform()));
        spawn_pair(&mut engine, 1, 1, 1_000_000)?;
        let settled = engine.run()?;
        assert_eq!(settled.clock(), Nanosecs::from_secs(1));
        assert_eq!(settled.link_energy("ab"), Some(Joules::new(20.0)));
        assert_eq!(settled.host_energy("nodeA"), Some(Joules::new(100.0)));
        assert_eq!(settled.host_energy("nodeB"), Some(Joules::new(100.0)));
        Ok(())
    }

    #[test]
    fn computation_is_charged_to_both_hosts() -> anyhow::Result<()> {
        // Hosts compute 1e6 flops/s, so each byte costs a microsecond at one flop per byte
        let mut engine = Engine::new(Arc::new(testing::point_to_point_platform()));
        let a = engine.platform().host_id("nodeA").unwrap();
        let b = engine.platform().host_id("nodeB").unwrap();
        let channel = engine.channel("message");
        let sender = Sender::builder()
            .job(JobDescriptor::new("job", 1, Bytes::new(1_000_000))?)
            .channel(channel.clone())
            .build();
        let receiver = Receiver::builder().flow_count(1).channel(channel).build();
        engine.spawn("sender", a, |ctx| sender.run(ctx));
        engine.spawn("receiver", b, |ctx| receiver.run(ctx));
        let settled = engine.run()?;
        // 10 s idle, 1 s preparation, 1 s copy, 1 s on the wire, 1 s processing
        assert_eq!(settled.clock(), Nanosecs::from_secs(14));
        // Busy for 2 of 14 seconds
        assert_eq!(settled.host_energy("nodeA"), Some(Joules::new(1600.0)));
        // Busy for 1 of 14 seconds
        assert_eq!(settled.host_energy("nodeB"), Some(Joules::new(1500.0)));
        // Saturated for 1 of 14 seconds
        assert_eq!(settled.link_energy("ab"), Some(Joules::new(150.0)));
        Ok(())
    }

    #[test]
    fn missing_sender_flow_stalls_receiver() -> anyhow::Result<()> {
        let mut engine = Engine::new(Arc::new(testing::point_to_point_platform()));
        spawn_pair(&mut engine, 4, 5, 1000)?;
        match engine.run() {
            Err(SimError::Stalled {
                blocked, unmatched, ..
            }) => {
                assert_eq!(blocked, ["receiver"]);
                assert_eq!(
                    unmatched,
                    [Unmatched {
                        channel: "message".to_owned(),
                        sends: 0,
                        receives: 1,
                    }]
                );
            }
            other => panic!("expected a stall, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_receive_stalls_sender() -> anyhow::Result<()> {
        let mut engine = Engine::new(Arc::new(testing::point_to_point_platform()));
        spawn_pair(&mut engine, 5, 4, 1000)?;
        match engine.run() {
            Err(SimError::Stalled {
                blocked, unmatched, ..
            }) => {
                assert_eq!(blocked, ["sender"]);
                assert_eq!(unmatched[0].sends, 1);
                assert_eq!(unmatched[0].receives, 0);
            }
            other => panic!("expected a stall, got {other:?}"),
        }
        Ok(())
    }
}
