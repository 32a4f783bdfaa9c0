// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::record::Record;

/// Delivery mode for records forwarded by a poll loop
///
/// ## Channel Mode (Default)
///
/// A dedicated bounded MPSC channel with exactly one receiver:
///
/// ```text
/// PollLoop → [Channel] → Consumer
/// ```
///
/// Delivery waits when the channel is full, so a slow consumer slows the loop
/// instead of losing records. Creating a second receiver fails.
///
/// ## Broadcast Mode
///
/// A single shared channel with any number of receivers (1-to-N fanout):
///
/// ```text
/// PollLoop → [Broadcast Channel] → Consumer 1
///                                → Consumer 2
/// ```
///
/// Delivery fails while nobody is subscribed, so subscribe before the source
/// is materialized. A receiver that falls behind by more than the buffer
/// capacity gets an error from `recv` naming the number of records it missed;
/// the next `recv` continues with the oldest record still buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Broadcast mode: single channel with multiple receivers (1-to-N fanout)
    Broadcast,
    /// Channel mode: dedicated channel with one receiver (1-to-1)
    #[default]
    Channel,
}

/// Downstream consumer handle a poll loop forwards records to.
pub type Downstream<T> = Arc<dyn RecordDispatcher<T>>;

/// Trait for delivering records to a downstream consumer
#[async_trait]
pub trait RecordDispatcher<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Deliver a single record
    async fn dispatch_record(&self, record: Arc<Record<T>>) -> Result<()>;

    /// Deliver several records, stopping at the first failure
    async fn dispatch_records(&self, records: Vec<Arc<Record<T>>>) -> Result<()> {
        for record in records {
            self.dispatch_record(record).await?;
        }
        Ok(())
    }

    /// Create a new receiver for this dispatcher
    async fn create_receiver(&self) -> Result<Box<dyn RecordReceiver<T>>>;
}

/// Trait for receiving records from a dispatcher
#[async_trait]
pub trait RecordReceiver<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Receive the next record
    async fn recv(&mut self) -> Result<Arc<Record<T>>>;
}

/// Build a dispatcher for the given mode and buffer capacity.
pub fn create_dispatcher<T>(mode: DispatchMode, capacity: usize) -> Downstream<T>
where
    T: Send + Sync + 'static,
{
    match mode {
        DispatchMode::Broadcast => Arc::new(BroadcastRecordDispatcher::<T>::new(capacity)),
        DispatchMode::Channel => Arc::new(ChannelRecordDispatcher::<T>::new(capacity)),
    }
}

/// Broadcast-based implementation of RecordDispatcher
pub struct BroadcastRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    tx: broadcast::Sender<Arc<Record<T>>>,
}

impl<T> BroadcastRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new broadcast dispatcher with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

#[async_trait]
impl<T> RecordDispatcher<T> for BroadcastRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    async fn dispatch_record(&self, record: Arc<Record<T>>) -> Result<()> {
        self.tx
            .send(record)
            .map_err(|_| anyhow::anyhow!("Broadcast channel has no receivers"))?;
        Ok(())
    }

    async fn create_receiver(&self) -> Result<Box<dyn RecordReceiver<T>>> {
        let rx = self.tx.subscribe();
        Ok(Box::new(BroadcastRecordReceiver { rx }))
    }
}

/// Broadcast-based implementation of RecordReceiver
pub struct BroadcastRecordReceiver<T>
where
    T: Send + Sync + 'static,
{
    rx: broadcast::Receiver<Arc<Record<T>>>,
}

#[async_trait]
impl<T> RecordReceiver<T> for BroadcastRecordReceiver<T>
where
    T: Send + Sync + 'static,
{
    /// Receive the next record from the broadcast channel.
    ///
    /// Records overwritten before this receiver read them are reported as an
    /// error; calling `recv` again resumes at the oldest record still buffered.
    async fn recv(&mut self) -> Result<Arc<Record<T>>> {
        match self.rx.recv().await {
            Ok(record) => Ok(record),
            Err(broadcast::error::RecvError::Closed) => {
                Err(anyhow::anyhow!("Broadcast channel closed"))
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("Broadcast receiver lagged by {n} records");
                Err(anyhow::anyhow!("Broadcast receiver lagged, {n} records lost"))
            }
        }
    }
}

/// Channel-based (MPSC) implementation of RecordDispatcher
pub struct ChannelRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    tx: mpsc::Sender<Arc<Record<T>>>,
    rx: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<Arc<Record<T>>>>>>,
}

impl<T> ChannelRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new channel dispatcher with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(Some(rx))),
        }
    }
}

#[async_trait]
impl<T> RecordDispatcher<T> for ChannelRecordDispatcher<T>
where
    T: Send + Sync + 'static,
{
    async fn dispatch_record(&self, record: Arc<Record<T>>) -> Result<()> {
        self.tx
            .send(record)
            .await
            .map_err(|_| anyhow::anyhow!("Channel closed"))?;
        Ok(())
    }

    async fn create_receiver(&self) -> Result<Box<dyn RecordReceiver<T>>> {
        // Only one receiver can exist for a channel dispatcher
        let mut rx_opt = self.rx.lock().await;
        let rx = rx_opt.take().ok_or_else(|| {
            anyhow::anyhow!("Receiver already created for this channel dispatcher")
        })?;
        Ok(Box::new(ChannelRecordReceiver { rx }))
    }
}

/// Channel-based (MPSC) implementation of RecordReceiver
pub struct ChannelRecordReceiver<T>
where
    T: Send + Sync + 'static,
{
    rx: mpsc::Receiver<Arc<Record<T>>>,
}

#[async_trait]
impl<T> RecordReceiver<T> for ChannelRecordReceiver<T>
where
    T: Send + Sync + 'static,
{
    async fn recv(&mut self) -> Result<Arc<Record<T>>> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str) -> Arc<Record<String>> {
        Arc::new(Record::of(value.to_string()))
    }

    #[tokio::test]
    async fn test_broadcast_dispatcher_multiple_receivers() {
        let dispatcher = BroadcastRecordDispatcher::<String>::new(100);
        let mut receiver1 = dispatcher.create_receiver().await.unwrap();
        let mut receiver2 = dispatcher.create_receiver().await.unwrap();

        dispatcher.dispatch_record(record("broadcast")).await.unwrap();

        assert_eq!(receiver1.recv().await.unwrap().value(), "broadcast");
        assert_eq!(receiver2.recv().await.unwrap().value(), "broadcast");
    }

    #[tokio::test]
    async fn test_broadcast_dispatch_without_receivers_fails() {
        let dispatcher = BroadcastRecordDispatcher::<String>::new(4);

        let result = dispatcher.dispatch_record(record("nobody")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no receivers"));
    }

    #[tokio::test]
    async fn test_broadcast_dispatch_fails_after_last_receiver_dropped() {
        let dispatcher = BroadcastRecordDispatcher::<String>::new(4);
        let receiver = dispatcher.create_receiver().await.unwrap();

        assert!(dispatcher.dispatch_record(record("seen")).await.is_ok());
        drop(receiver);
        assert!(dispatcher.dispatch_record(record("lost")).await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_receiver_reports_lag() {
        let dispatcher = BroadcastRecordDispatcher::<u32>::new(2);
        let mut receiver = dispatcher.create_receiver().await.unwrap();

        for i in 0..5u32 {
            dispatcher
                .dispatch_record(Arc::new(Record::of(i)))
                .await
                .unwrap();
        }

        let lagged = receiver.recv().await;
        assert!(lagged.unwrap_err().to_string().contains("3 records lost"));

        // Only the last two records are still buffered
        assert_eq!(*receiver.recv().await.unwrap().value(), 3);
        assert_eq!(*receiver.recv().await.unwrap().value(), 4);
    }

    #[tokio::test]
    async fn test_channel_dispatcher_preserves_order() {
        let dispatcher = ChannelRecordDispatcher::<String>::new(10);
        let mut receiver = dispatcher.create_receiver().await.unwrap();

        dispatcher
            .dispatch_records(vec![record("a"), record("b"), record("c")])
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().value(), "a");
        assert_eq!(receiver.recv().await.unwrap().value(), "b");
        assert_eq!(receiver.recv().await.unwrap().value(), "c");
    }

    #[tokio::test]
    async fn test_channel_dispatcher_only_one_receiver() {
        let dispatcher = ChannelRecordDispatcher::<String>::new(10);
        let _receiver = dispatcher.create_receiver().await.unwrap();

        let second = dispatcher.create_receiver().await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_channel_dispatch_fails_after_receiver_dropped() {
        let dispatcher = ChannelRecordDispatcher::<String>::new(10);
        let receiver = dispatcher.create_receiver().await.unwrap();
        drop(receiver);

        let result = dispatcher.dispatch_record(record("lost")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Channel closed"));
    }

    #[tokio::test]
    async fn test_create_dispatcher_honours_mode() {
        let channel = create_dispatcher::<u8>(DispatchMode::Channel, 4);
        let _rx = channel.create_receiver().await.unwrap();
        assert!(channel.create_receiver().await.is_err());

        let broadcast = create_dispatcher::<u8>(DispatchMode::Broadcast, 4);
        let _rx1 = broadcast.create_receiver().await.unwrap();
        assert!(broadcast.create_receiver().await.is_ok());
    }

    #[test]
    fn test_dispatch_mode_serialization() {
        assert_eq!(DispatchMode::default(), DispatchMode::Channel);
        let json = serde_json::to_string(&DispatchMode::Broadcast).unwrap();
        assert_eq!(json, "\"broadcast\"");
        let mode: DispatchMode = serde_json::from_str("\"channel\"").unwrap();
        assert_eq!(mode, DispatchMode::Channel);
    }
}
