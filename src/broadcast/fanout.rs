use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::draft::BroadcastPayload;
use crate::directory::UserDirectory;
use crate::gateway::{self, Delivery, MessageGateway, OutboundMessage};
use crate::texts;
use crate::types::ChatIdentity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub sent: usize,
    pub failed: usize,
}

/// Send `payload` to every recipient in order, one at a time, pausing
/// `delay` between sends. A failed recipient never stops the loop.
pub async fn fan_out(
    gateway: &dyn MessageGateway,
    recipients: &[ChatIdentity],
    payload: &BroadcastPayload,
    delay: Duration,
) -> Tally {
    let message = payload.message();
    let mut tally = Tally::default();

    for (i, recipient) in recipients.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match gateway.send(*recipient, &message).await {
            Ok(()) => tally.sent += 1,
            Err(e) => {
                debug!("Broadcast to {} failed: {}", recipient, e);
                tally.failed += 1;
            }
        }
    }

    tally
}

/// Full broadcast job: load recipients, fan out, report the tally to `admin`.
pub async fn run(
    gateway: Arc<dyn MessageGateway>,
    directory: Arc<dyn UserDirectory>,
    admin: ChatIdentity,
    payload: BroadcastPayload,
    delay: Duration,
) -> Tally {
    let recipients = match directory.list_all().await {
        Ok(recipients) => recipients,
        Err(e) => {
            warn!("Failed to load broadcast recipients: {:#}", e);
            Vec::new()
        }
    };

    info!(
        "Broadcast from {} starting for {} recipients",
        admin,
        recipients.len()
    );
    let tally = fan_out(gateway.as_ref(), &recipients, &payload, delay).await;
    info!(
        "Broadcast from {} finished: sent={} failed={}",
        admin, tally.sent, tally.failed
    );

    let report = Delivery::new(
        admin,
        OutboundMessage::text(texts::broadcast_tally(tally.sent, tally.failed)),
    );
    if let Err(e) = gateway::deliver(gateway.as_ref(), &report).await {
        warn!("Failed to report broadcast tally to {}: {}", admin, e);
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SqliteDirectory;
    use crate::gateway::testing::RecordingGateway;

    const ADMIN: ChatIdentity = ChatIdentity(1);

    fn hello() -> BroadcastPayload {
        BroadcastPayload::Text {
            body: "Hello all".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let gateway = RecordingGateway::new();
        gateway.fail_for(ChatIdentity(11)).await;
        let recipients: Vec<_> = (10..15).map(ChatIdentity).collect();

        let tally = fan_out(&gateway, &recipients, &hello(), Duration::ZERO).await;

        assert_eq!(tally, Tally { sent: 4, failed: 1 });
        assert_eq!(tally.sent + tally.failed, recipients.len());
        assert_eq!(gateway.send_count().await, 4);
    }

    #[tokio::test]
    async fn test_media_payload_goes_out_as_media() {
        let gateway = RecordingGateway::new();
        let payload = BroadcastPayload::Photo {
            media: crate::types::MediaRef::new("AgAC"),
            caption: None,
        };
        let tally = fan_out(&gateway, &[ChatIdentity(5)], &payload, Duration::ZERO).await;

        assert_eq!(tally.sent, 1);
        assert!(matches!(
            gateway.messages_to(ChatIdentity(5)).await[0],
            OutboundMessage::Photo { caption: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_delay_separates_sends() {
        let gateway = RecordingGateway::new();
        let recipients: Vec<_> = (1..=3).map(ChatIdentity).collect();

        let started = tokio::time::Instant::now();
        fan_out(&gateway, &recipients, &hello(), Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_empty_directory_reports_zero() {
        let gateway = Arc::new(RecordingGateway::new());
        let directory = Arc::new(SqliteDirectory::open_in_memory().unwrap());

        let tally = run(
            gateway.clone(),
            directory,
            ADMIN,
            hello(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(tally, Tally::default());
        assert_eq!(
            gateway.texts_to(ADMIN).await,
            vec![texts::broadcast_tally(0, 0)]
        );
    }

    #[tokio::test]
    async fn test_run_reaches_every_directory_entry() {
        let gateway = Arc::new(RecordingGateway::new());
        let directory = Arc::new(SqliteDirectory::open_in_memory().unwrap());
        for id in [100, 200, 300] {
            directory.upsert(ChatIdentity(id)).await.unwrap();
        }

        let tally = run(
            gateway.clone(),
            directory,
            ADMIN,
            hello(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(tally, Tally { sent: 3, failed: 0 });
        for id in [100, 200, 300] {
            assert_eq!(
                gateway.texts_to(ChatIdentity(id)).await,
                vec!["Hello all".to_string()]
            );
        }
    }
}
